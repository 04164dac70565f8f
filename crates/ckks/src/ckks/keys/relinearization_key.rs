//! Relinearization keys for the CKKS encryption scheme
//!
//! A relinearization key is a key switching key from s² to s. Applied to the
//! third element c₂ of the product of two ciphertexts, it returns (d₀, d₁)
//! with d₀ + d₁·s ≈ c₂·s², so that (c₀ + d₀, c₁ + d₁) decrypts to the same
//! message as (c₀, c₁, c₂).

use crate::ckks::{traits::TryConvertFrom, Ciphertext, CkksParameters, SecretKey};
use crate::proto::ckks::{
    KeySwitchingKey as KeySwitchingKeyProto, RelinearizationKey as RelinearizationKeyProto,
};
use crate::{Error, Result};
use fhe_math::rq::Poly;
use fhe_traits::{DeserializeParametrized, FheParametrized, Serialize};
use prost::Message;
use rand::{CryptoRng, RngCore};
use std::sync::Arc;
use zeroize::Zeroizing;

use super::KeySwitchingKey;

/// Relinearization key for the CKKS encryption scheme.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct RelinearizationKey {
    pub(crate) par: Arc<CkksParameters>,
    pub(crate) ksk: Option<KeySwitchingKey>,
}

impl RelinearizationKey {
    /// Create an ungenerated relinearization key.
    pub fn new(par: &Arc<CkksParameters>) -> Self {
        Self {
            par: par.clone(),
            ksk: None,
        }
    }

    pub(crate) fn from_secret_key<R: RngCore + CryptoRng>(
        sk: &SecretKey,
        rng: &mut R,
    ) -> Result<Self> {
        let s = sk.poly_at(&sk.par.ctx[0])?;
        let s2 = Zeroizing::new(s.as_ref() * s.as_ref());
        Ok(Self {
            par: sk.par.clone(),
            ksk: Some(KeySwitchingKey::new(sk, &s2, rng)?),
        })
    }

    /// Returns whether the key has been generated.
    pub fn is_generated(&self) -> bool {
        self.ksk.is_some()
    }

    pub(crate) fn key_switching_key(&self) -> Result<&KeySwitchingKey> {
        self.ksk
            .as_ref()
            .ok_or_else(|| Error::key_not_generated("relinearization key"))
    }

    /// Relinearize a ciphertext of size 3 in place.
    pub(crate) fn relinearizes(&self, ct: &mut Ciphertext) -> Result<()> {
        if ct.c.len() != 3 {
            return Err(Error::UnspecifiedInput(
                "Only ciphertexts with 3 parts can be relinearized".to_string(),
            ));
        }
        let (c0, c1) = self.relinearizes_poly(&ct.c[2])?;
        ct.c[0] += &c0;
        ct.c[1] += &c1;
        ct.c.truncate(2);
        Ok(())
    }

    pub(crate) fn relinearizes_poly(&self, c2: &Poly) -> Result<(Poly, Poly)> {
        self.key_switching_key()?.key_switch(c2)
    }
}

impl FheParametrized for RelinearizationKey {
    type Parameters = CkksParameters;
}

impl From<&RelinearizationKey> for RelinearizationKeyProto {
    fn from(value: &RelinearizationKey) -> Self {
        RelinearizationKeyProto {
            ksk: value.ksk.as_ref().map(KeySwitchingKeyProto::from),
            fingerprint: value.par.fingerprint().to_vec(),
        }
    }
}

impl TryConvertFrom<&RelinearizationKeyProto> for RelinearizationKey {
    fn try_convert_from(
        value: &RelinearizationKeyProto,
        par: &Arc<CkksParameters>,
    ) -> Result<Self> {
        par.check_fingerprint(&value.fingerprint)?;
        Ok(Self {
            par: par.clone(),
            ksk: value
                .ksk
                .as_ref()
                .map(|ksk| KeySwitchingKey::try_convert_from(ksk, par))
                .transpose()?,
        })
    }
}

impl Serialize for RelinearizationKey {
    fn to_bytes(&self) -> Vec<u8> {
        RelinearizationKeyProto::from(self).encode_to_vec()
    }
}

impl DeserializeParametrized for RelinearizationKey {
    type Error = Error;

    fn from_bytes(bytes: &[u8], par: &Arc<Self::Parameters>) -> Result<Self> {
        let rk: RelinearizationKeyProto =
            Message::decode(bytes).map_err(|_| Error::SerializationError)?;
        RelinearizationKey::try_convert_from(&rk, par)
    }
}

#[cfg(test)]
mod tests {
    use super::RelinearizationKey;
    use crate::ckks::{Ciphertext, CkksParameters, SecretKey};
    use crate::Error;
    use fhe_math::rq::{Poly, Representation};
    use fhe_traits::{DeserializeParametrized, Serialize};
    use rand::thread_rng;
    use std::error::Error as StdError;

    #[test]
    fn relinearization() -> Result<(), Box<dyn StdError>> {
        let mut rng = thread_rng();
        let par = CkksParameters::default_arc(3, 16);
        let sk = SecretKey::random(&par, 0, &mut rng)?;
        let rk = RelinearizationKey::from_secret_key(&sk, &mut rng)?;

        for level in 0..=par.max_level() {
            let ctx = par.ctx_at_level(level)?;
            let s = sk.poly_at(ctx)?;
            let s2 = s.as_ref() * s.as_ref();

            // An "extended" ciphertext (c₀ = e − c₁·s − c₂·s², c₁, c₂) encrypting 0.
            let c2 = Poly::random(ctx, Representation::Ntt, &mut rng);
            let c1 = Poly::random(ctx, Representation::Ntt, &mut rng);
            let mut c0 = Poly::small(ctx, Representation::Ntt, 16, &mut rng)?;
            c0 -= &(&c1 * s.as_ref());
            c0 -= &(&c2 * &s2);
            let mut ct = Ciphertext::new(vec![c0, c1, c2], 1.0, &par)?;

            rk.relinearizes(&mut ct)?;
            assert_eq!(ct.size(), 2);

            let mut e = &ct.c[1] * s.as_ref();
            e += &ct.c[0];
            e.change_representation(Representation::PowerBasis);
            assert!(e.infinity_norm_bits() < 30);
        }
        Ok(())
    }

    #[test]
    fn ungenerated() -> Result<(), Box<dyn StdError>> {
        let mut rng = thread_rng();
        let par = CkksParameters::default_arc(2, 16);
        let rk = RelinearizationKey::new(&par);
        let ctx = par.ctx_at_level(0)?;
        let c = Poly::random(ctx, Representation::Ntt, &mut rng);
        let mut ct = Ciphertext::new(vec![c.clone(), c.clone(), c], 1.0, &par)?;
        assert_eq!(
            rk.relinearizes(&mut ct).unwrap_err(),
            Error::KeyNotGenerated("relinearization key".to_string())
        );
        assert_eq!(RelinearizationKey::from_bytes(&rk.to_bytes(), &par)?, rk);
        Ok(())
    }

    #[test]
    fn serialize() -> Result<(), Box<dyn StdError>> {
        let mut rng = thread_rng();
        let par = CkksParameters::default_arc(2, 16);
        let sk = SecretKey::random(&par, 0, &mut rng)?;
        let rk = RelinearizationKey::from_secret_key(&sk, &mut rng)?;
        let bytes = rk.to_bytes();
        assert_eq!(RelinearizationKey::from_bytes(&bytes, &par)?, rk);
        assert_eq!(
            RelinearizationKey::from_bytes(&bytes, &CkksParameters::default_arc(3, 16))
                .unwrap_err(),
            Error::ContextMismatch
        );
        Ok(())
    }
}
