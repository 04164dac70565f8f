use std::collections::HashSet;
use std::sync::Arc;

use rand::{thread_rng, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};

use crate::ckks::{CkksParameters, KeySwitchingKey};
use crate::{Error, Result};

use super::CommonRandomPoly;

/// A fixed set of parties running the multiparty protocols together.
///
/// The parties are identified by their index in `0..num_parties`, and share a
/// seed from which all the common random polynomials are derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Committee {
    num_parties: usize,
    seed: <ChaCha8Rng as SeedableRng>::Seed,
}

impl Committee {
    /// Create a committee of `num_parties` parties sharing `seed`.
    pub fn new(num_parties: usize, seed: <ChaCha8Rng as SeedableRng>::Seed) -> Result<Self> {
        if num_parties < 2 {
            return Err(Error::protocol(format!(
                "A committee needs at least 2 parties, got {num_parties}"
            )));
        }
        Ok(Self { num_parties, seed })
    }

    /// Create a committee with a fresh random seed.
    pub fn random(num_parties: usize) -> Result<Self> {
        Self::new(num_parties, thread_rng().gen())
    }

    /// Returns the number of parties.
    pub fn num_parties(&self) -> usize {
        self.num_parties
    }

    /// Returns the shared seed.
    pub fn seed(&self) -> <ChaCha8Rng as SeedableRng>::Seed {
        self.seed
    }

    pub(crate) fn check_party(&self, party_id: usize) -> Result<()> {
        if party_id >= self.num_parties {
            Err(Error::invalid_party_id(party_id, self.num_parties))
        } else {
            Ok(())
        }
    }

    /// Collect the shares of a protocol run by this committee, checking that
    /// exactly one share from each of its parties is present.
    pub(crate) fn collect_shares<S: Share, T: IntoIterator<Item = S>>(
        &self,
        iter: T,
    ) -> Result<Vec<S>> {
        let shares = collect_shares(iter)?;
        if shares.len() != self.num_parties {
            return Err(Error::protocol(format!(
                "Expected {} shares, got {}",
                self.num_parties,
                shares.len()
            )));
        }
        Ok(shares)
    }

    /// Derive the seed of a common random polynomial from its label and index.
    fn derive_seed(&self, label: &str, index: u64) -> <ChaCha8Rng as SeedableRng>::Seed {
        let mut hasher = Sha256::new();
        hasher.update(self.seed);
        hasher.update(label.as_bytes());
        hasher.update(index.to_le_bytes());
        hasher.finalize().into()
    }

    /// The common random polynomial of the public key generation protocol.
    pub fn public_key_crp(&self, par: &Arc<CkksParameters>) -> Result<CommonRandomPoly> {
        CommonRandomPoly::new_deterministic(&par.ctx[0], self.derive_seed("public key", 0))
    }

    /// The common random polynomials of the relinearization key generation
    /// protocol, one per decomposition digit.
    pub fn relin_crps(&self, par: &Arc<CkksParameters>) -> Result<Vec<CommonRandomPoly>> {
        let ctx_qp = KeySwitchingKey::ctx_qp(par)?;
        (0..par.digits.len())
            .map(|j| {
                CommonRandomPoly::new_deterministic(
                    ctx_qp,
                    self.derive_seed("relinearization", j as u64),
                )
            })
            .collect()
    }

    /// The common random polynomials of the Galois key generation protocol for
    /// the Galois element `exponent`, one per decomposition digit.
    pub fn galois_crps(
        &self,
        par: &Arc<CkksParameters>,
        exponent: usize,
    ) -> Result<Vec<CommonRandomPoly>> {
        let ctx_qp = KeySwitchingKey::ctx_qp(par)?;
        (0..par.digits.len())
            .map(|j| {
                let index = ((exponent as u64) << 16) | j as u64;
                CommonRandomPoly::new_deterministic(ctx_qp, self.derive_seed("galois", index))
            })
            .collect()
    }
}

/// The public information attached to every share.
pub(crate) trait Share {
    fn par(&self) -> &Arc<CkksParameters>;
    fn party_id(&self) -> usize;
    fn num_parties(&self) -> usize;
}

/// Validate the party index and committee size read from a serialized share.
pub(crate) fn check_metadata(party_id: u32, num_parties: u32) -> Result<(usize, usize)> {
    let (party_id, num_parties) = (party_id as usize, num_parties as usize);
    if num_parties < 2 {
        return Err(Error::protocol(format!(
            "A share claims a committee of {num_parties} parties"
        )));
    }
    if party_id >= num_parties {
        return Err(Error::invalid_party_id(party_id, num_parties));
    }
    Ok((party_id, num_parties))
}

/// Collect the shares of a protocol, checking that exactly one share from
/// each party of the committee is present, all created under the same
/// parameters.
pub(crate) fn collect_shares<S: Share, T: IntoIterator<Item = S>>(iter: T) -> Result<Vec<S>> {
    let shares = iter.into_iter().collect::<Vec<_>>();
    let first = shares
        .first()
        .ok_or_else(|| Error::protocol("No share was provided"))?;
    let num_parties = first.num_parties();
    if num_parties < 2 {
        return Err(Error::protocol(format!(
            "Shares claim a committee of {num_parties} parties"
        )));
    }
    let par = first.par().clone();

    let mut seen = HashSet::with_capacity(num_parties);
    for share in &shares {
        if share.par() != &par {
            return Err(Error::protocol("Shares were created under different parameters"));
        }
        if share.num_parties() != num_parties {
            return Err(Error::protocol("Shares were created for different committees"));
        }
        if share.party_id() >= num_parties {
            return Err(Error::invalid_party_id(share.party_id(), num_parties));
        }
        if !seen.insert(share.party_id()) {
            return Err(Error::duplicate_party(share.party_id()));
        }
    }
    if shares.len() != num_parties {
        return Err(Error::protocol(format!(
            "Expected {num_parties} shares, got {}",
            shares.len()
        )));
    }
    Ok(shares)
}
