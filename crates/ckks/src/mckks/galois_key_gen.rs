use std::collections::BTreeMap;
use std::sync::Arc;

use fhe_math::rq::SubstitutionExponent;
use fhe_traits::{DeserializeParametrized, FheParametrized, Serialize};
use itertools::Itertools;
use prost::Message;
use rand::{CryptoRng, RngCore};
use zeroize::Zeroizing;

use crate::ckks::{
    traits::TryConvertFrom, CkksParameters, GaloisKey, KeySwitchingKey, RotationSet, SecretKey,
};
use crate::proto::ckks::{GaloisKey as GaloisKeyProto, GaloisKeyShare as GaloisKeyShareProto};
use crate::{Error, Result};

use super::committee::{check_metadata, collect_shares, Share};
use super::{Aggregate, Committee};

/// A party's share in the Galois key generation protocol.
///
/// For every Galois element, each party encrypts `s_i(X^k)` under the common
/// random polynomials of the element. The shares sum to a key switching key
/// from `s(X^k)` to `s`. Use the [`Aggregate`] impl to combine the shares
/// into a [`GaloisKey`].
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct GaloisKeyShare {
    pub(crate) par: Arc<CkksParameters>,
    pub(crate) party_id: usize,
    pub(crate) num_parties: usize,
    pub(crate) rotations: RotationSet,
    /// The key share of each Galois element, whose elements c1 are the common
    /// random polynomials.
    pub(crate) keys: BTreeMap<usize, KeySwitchingKey>,
}

impl GaloisKeyShare {
    /// Participate in a new Galois key generation protocol for the rotations
    /// by `steps`. An empty slice of steps generates keys for every power of
    /// two.
    pub fn new<R: RngCore + CryptoRng>(
        sk_share: &SecretKey,
        committee: &Committee,
        party_id: usize,
        steps: &[i32],
        rng: &mut R,
    ) -> Result<Self> {
        committee.check_party(party_id)?;
        let par = sk_share.par.clone();
        let rotations = if steps.is_empty() {
            RotationSet::PowersOfTwo
        } else {
            RotationSet::Steps(steps.to_vec())
        };
        let exponents = GaloisKey::new(&par, rotations.clone()).exponents();

        let ctx = &par.ctx[0];
        let s = sk_share.poly_at(ctx)?;
        let mut keys = BTreeMap::new();
        for exponent in exponents {
            let s_k = Zeroizing::new(s.substitute(&SubstitutionExponent::new(ctx, exponent)?)?);
            let crps = committee
                .galois_crps(&par, exponent)?
                .into_iter()
                .map(|crp| crp.poly)
                .collect_vec();
            keys.insert(
                exponent,
                KeySwitchingKey::new_with_c1(sk_share, &s_k, crps, rng)?,
            );
        }

        Ok(Self {
            par,
            party_id,
            num_parties: committee.num_parties(),
            rotations,
            keys,
        })
    }
}

impl Share for GaloisKeyShare {
    fn par(&self) -> &Arc<CkksParameters> {
        &self.par
    }

    fn party_id(&self) -> usize {
        self.party_id
    }

    fn num_parties(&self) -> usize {
        self.num_parties
    }
}

impl FheParametrized for GaloisKeyShare {
    type Parameters = CkksParameters;
}

impl Serialize for GaloisKeyShare {
    fn to_bytes(&self) -> Vec<u8> {
        // The keys of a share hold every element of its rotation set.
        let mut key = GaloisKey::new(&self.par, self.rotations.clone());
        key.keys = self.keys.clone();
        key.generated = true;
        GaloisKeyShareProto {
            party_id: self.party_id as u32,
            num_parties: self.num_parties as u32,
            key: Some(GaloisKeyProto::from(&key)),
            fingerprint: self.par.fingerprint().to_vec(),
        }
        .encode_to_vec()
    }
}

impl DeserializeParametrized for GaloisKeyShare {
    type Error = Error;

    fn from_bytes(bytes: &[u8], par: &Arc<CkksParameters>) -> Result<Self> {
        let proto: GaloisKeyShareProto =
            Message::decode(bytes).map_err(|_| Error::SerializationError)?;
        par.check_fingerprint(&proto.fingerprint)?;
        let (party_id, num_parties) = check_metadata(proto.party_id, proto.num_parties)?;
        let key = proto.key.as_ref().ok_or(Error::SerializationError)?;
        let key = GaloisKey::try_convert_from(key, par)?;
        if !key.generated {
            return Err(Error::SerializationError);
        }
        Ok(Self {
            par: par.clone(),
            party_id,
            num_parties,
            rotations: key.rotations,
            keys: key.keys,
        })
    }
}

impl Aggregate<GaloisKeyShare> for GaloisKey {
    fn from_shares<T>(iter: T) -> Result<Self>
    where
        T: IntoIterator<Item = GaloisKeyShare>,
    {
        let mut shares = collect_shares(iter)?.into_iter();
        let share = shares.next().ok_or(Error::TooFewValues(0, 1))?;
        let mut keys = share.keys;
        for sh in shares {
            if sh.rotations != share.rotations {
                return Err(Error::protocol("Shares support different rotations"));
            }
            for (exponent, ksk) in keys.iter_mut() {
                let other = sh
                    .keys
                    .get(exponent)
                    .ok_or_else(|| Error::protocol("Shares support different rotations"))?;
                if other.c1 != ksk.c1 {
                    return Err(Error::protocol(
                        "Shares use different common random polynomials",
                    ));
                }
                ksk.c0
                    .iter_mut()
                    .zip(other.c0.iter())
                    .for_each(|(c0, c0_i)| *c0 += c0_i);
            }
        }

        let mut gk = GaloisKey::new(&share.par, share.rotations);
        gk.keys = keys;
        gk.generated = true;
        Ok(gk)
    }
}

#[cfg(test)]
mod tests {
    use super::GaloisKeyShare;
    use crate::ckks::{CkksParameters, GaloisKey, KeyGenerator, RotationSet};
    use crate::mckks::{Aggregate, Committee};
    use crate::proto::ckks::GaloisKeyShare as GaloisKeyShareProto;
    use crate::{Error, ErrorCategory};
    use fhe_traits::{DeserializeParametrized, Serialize};
    use prost::Message;
    use rand::thread_rng;
    use std::error::Error as StdError;

    #[test]
    fn aggregate() -> Result<(), Box<dyn StdError>> {
        let mut rng = thread_rng();
        let par = CkksParameters::default_arc(2, 16);
        let committee = Committee::random(3)?;
        let sks = (0..3)
            .map(|_| KeyGenerator::new(&par).generate_secret_key(0))
            .collect::<crate::Result<Vec<_>>>()?;

        let shares = sks
            .iter()
            .enumerate()
            .map(|(i, sk)| GaloisKeyShare::new(sk, &committee, i, &[], &mut rng))
            .collect::<crate::Result<Vec<_>>>()?;
        let gk = GaloisKey::from_shares(shares.clone())?;
        assert!(gk.is_generated());
        assert_eq!(gk.rotations(), &RotationSet::PowersOfTwo);
        assert_eq!(gk.keys.keys().copied().collect::<Vec<_>>(), gk.exponents());

        let mismatched = vec![
            shares[0].clone(),
            shares[1].clone(),
            GaloisKeyShare::new(&sks[2], &committee, 2, &[3], &mut rng)?,
        ];
        assert_eq!(
            GaloisKey::from_shares(mismatched).unwrap_err().category(),
            ErrorCategory::Protocol
        );
        Ok(())
    }

    #[test]
    fn serialize() -> Result<(), Box<dyn StdError>> {
        let mut rng = thread_rng();
        let par = CkksParameters::default_arc(2, 16);
        let committee = Committee::random(2)?;
        let sks = (0..2)
            .map(|_| KeyGenerator::new(&par).generate_secret_key(0))
            .collect::<crate::Result<Vec<_>>>()?;
        let shares = sks
            .iter()
            .enumerate()
            .map(|(i, sk)| GaloisKeyShare::new(sk, &committee, i, &[1, -2], &mut rng))
            .collect::<crate::Result<Vec<_>>>()?;

        let restored = shares
            .iter()
            .map(|share| GaloisKeyShare::from_bytes(&share.to_bytes(), &par))
            .collect::<crate::Result<Vec<_>>>()?;
        assert_eq!(restored, shares);
        let gk = GaloisKey::from_shares(restored)?;
        assert_eq!(gk, GaloisKey::from_shares(shares.clone())?);
        assert_eq!(gk.rotations(), &RotationSet::Steps(vec![1, -2]));

        let bytes = shares[0].to_bytes();
        assert_eq!(
            GaloisKeyShare::from_bytes(&bytes, &CkksParameters::default_arc(3, 16)).unwrap_err(),
            Error::ContextMismatch
        );
        let mut proto = GaloisKeyShareProto::decode(bytes.as_slice())?;
        proto.party_id = 2;
        assert_eq!(
            GaloisKeyShare::from_bytes(&proto.encode_to_vec(), &par).unwrap_err(),
            Error::invalid_party_id(2, 2)
        );
        proto.party_id = 0;
        proto.key = None;
        assert_eq!(
            GaloisKeyShare::from_bytes(&proto.encode_to_vec(), &par).unwrap_err(),
            Error::SerializationError
        );
        Ok(())
    }
}
