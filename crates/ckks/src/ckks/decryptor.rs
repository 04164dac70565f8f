//! Decryption in the CKKS encryption scheme.

use crate::ckks::{Ciphertext, CkksParameters, Plaintext, PrngState, SecretKey};
use crate::mckks::{Aggregate, Committee, DecryptionShare};
use crate::{Error, Result};
use fhe_math::rq::{Poly, Representation};
use fhe_traits::{FheDecrypter, FheParametrized};
use num_bigint::BigUint;
use num_traits::Zero;
use std::sync::Arc;
use zeroize::Zeroizing;

/// Decryptor of ciphertexts under a secret key, or under a secret key share
/// in the multiparty setting.
///
/// The smudging noise of the decryption shares is drawn from the
/// decryptor's [`PrngState`].
#[derive(Debug, Clone)]
pub struct Decryptor<'a> {
    sk: &'a SecretKey,
    state: PrngState,
}

impl<'a> Decryptor<'a> {
    /// Create a decryptor for a secret key.
    pub fn new(sk: &'a SecretKey) -> Result<Self> {
        sk.coefficients()?;
        Ok(Self {
            sk,
            state: PrngState::random(),
        })
    }

    /// Returns the current state of the decryptor.
    pub fn state(&self) -> PrngState {
        self.state
    }

    /// Set the state of the decryptor.
    pub fn set_state(&mut self, state: PrngState) {
        self.state = state;
    }

    /// Decrypt a ciphertext of any size, at its level and scale.
    pub fn decrypt(&self, ct: &Ciphertext) -> Result<Plaintext> {
        self.sk.try_decrypt(ct)
    }

    /// Returns ⌊log2(Q / (2·‖c0 + c1·s‖∞))⌋, the number of bits of room left
    /// before the decrypted value wraps around the modulus, or -1 when less
    /// than one bit remains.
    pub fn noise_budget(&self, ct: &Ciphertext) -> Result<i64> {
        let m = self.sk.dot_product(ct)?;
        let norm = m
            .to_centered_bigints()
            .into_iter()
            .map(|c| c.magnitude().clone())
            .max()
            .unwrap_or_default();
        let modulus = m.ctx().modulus();
        let denominator = norm << 1usize;
        if denominator.is_zero() {
            return Ok(modulus.bits() as i64 - 1);
        }
        let ratio: BigUint = modulus / denominator;
        if ratio.is_zero() {
            Ok(-1)
        } else {
            Ok(ratio.bits() as i64 - 1)
        }
    }

    /// Compute the share of this party in the threshold decryption of a
    /// ciphertext, the secret key of the decryptor being a share of the
    /// secret key of the committee. Advances the state.
    pub fn partial_decrypt(
        &mut self,
        ct: &Arc<Ciphertext>,
        committee: &Committee,
        party_id: usize,
    ) -> Result<DecryptionShare> {
        let mut state = self.state;
        let share = self.partial_decrypt_with_state(ct, committee, party_id, &mut state)?;
        self.state = state;
        Ok(share)
    }

    /// Compute a decryption share using and advancing an explicit state,
    /// leaving the state of the decryptor untouched.
    pub fn partial_decrypt_with_state(
        &self,
        ct: &Arc<Ciphertext>,
        committee: &Committee,
        party_id: usize,
        state: &mut PrngState,
    ) -> Result<DecryptionShare> {
        let mut rng = state.rng();
        let share = DecryptionShare::new(self.sk, ct, committee, party_id, &mut rng)?;
        state.advance(&rng);
        Ok(share)
    }

    /// Combine the decryption shares of every party of `committee` into the
    /// plaintext. The shares must come from distinct parties of the committee
    /// and decrypt the same ciphertext.
    pub fn decrypt_fusion<I: IntoIterator<Item = DecryptionShare>>(
        committee: &Committee,
        shares: I,
    ) -> Result<Plaintext> {
        Plaintext::from_shares(committee.collect_shares(shares)?)
    }
}

impl FheParametrized for Decryptor<'_> {
    type Parameters = CkksParameters;
}

impl SecretKey {
    /// Computes c0 + c1·s + c2·s² + ... in Ntt representation.
    fn dot_product(&self, ct: &Ciphertext) -> Result<Poly> {
        if self.par != ct.par {
            return Err(Error::ContextMismatch);
        }
        let ctx = ct.c[0].ctx();
        let s = self.poly_at(ctx)?;
        let mut si = Zeroizing::new(s.as_ref().clone());

        let mut m = ct.c[0].clone();
        for (i, ci) in ct.c.iter().enumerate().skip(1) {
            if i > 1 {
                *si *= s.as_ref();
            }
            m += &(ci * si.as_ref());
        }
        debug_assert_eq!(m.representation(), &Representation::Ntt);
        Ok(m)
    }
}

impl FheDecrypter<Plaintext, Ciphertext> for SecretKey {
    type Error = Error;

    fn try_decrypt(&self, ct: &Ciphertext) -> Result<Plaintext> {
        let m = self.dot_product(ct)?;
        let mut pt = Plaintext::from_parts(&self.par, m, ct.scale, ct.level);
        pt.storage = ct.storage;
        Ok(pt)
    }
}
