//! Secret keys for the CKKS encryption scheme

use crate::ckks::CkksParameters;
use crate::proto::ckks::SecretKey as SecretKeyProto;
use crate::{Error, Result};
use fhe_math::rq::{traits::TryConvertFrom, Context, Poly, Representation};
use fhe_traits::{DeserializeParametrized, FheParametrized, Serialize};
use fhe_util::{sample_vec_cbd_f32, sample_vec_hamming};
use prost::Message;
use rand::{CryptoRng, RngCore};
use std::sync::Arc;
use zeroize::{Zeroize as _, Zeroizing};
use zeroize_derive::{Zeroize, ZeroizeOnDrop};

/// Secret key for the CKKS encryption scheme.
///
/// A secret key is created empty with [`SecretKey::new`] and filled by the
/// key generator.
#[derive(Debug, PartialEq, Eq, Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey {
    /// The CKKS parameters
    #[zeroize(skip)]
    pub(crate) par: Arc<CkksParameters>,
    /// The ternary secret key coefficients
    pub(crate) coeffs: Option<Box<[i64]>>,
    /// The number of non-zero coefficients, or 0 for a dense key
    #[zeroize(skip)]
    pub(crate) hamming_weight: usize,
}

impl SecretKey {
    /// The variance used for sampling dense secret keys
    pub const SK_VARIANCE: f32 = 0.5;

    /// Create an ungenerated secret key.
    pub fn new(par: &Arc<CkksParameters>) -> Self {
        Self {
            par: par.clone(),
            coeffs: None,
            hamming_weight: 0,
        }
    }

    /// Sample a ternary secret key. A `hamming_weight` of 0 samples each
    /// coefficient independently, otherwise exactly `hamming_weight`
    /// coefficients are non-zero.
    pub(crate) fn random<R: RngCore + CryptoRng>(
        par: &Arc<CkksParameters>,
        hamming_weight: usize,
        rng: &mut R,
    ) -> Result<Self> {
        let coeffs = if hamming_weight == 0 {
            sample_vec_cbd_f32(par.degree(), Self::SK_VARIANCE, rng)
        } else {
            sample_vec_hamming(par.degree(), hamming_weight, rng)
        }
        .map_err(|e| Error::UnspecifiedInput(e.to_string()))?;
        Ok(Self {
            par: par.clone(),
            coeffs: Some(coeffs.into_boxed_slice()),
            hamming_weight,
        })
    }

    /// Returns whether the key has been generated.
    pub fn is_generated(&self) -> bool {
        self.coeffs.is_some()
    }

    /// Returns the Hamming weight requested at generation, 0 for a dense key.
    pub fn hamming_weight(&self) -> usize {
        self.hamming_weight
    }

    pub(crate) fn coefficients(&self) -> Result<&[i64]> {
        self.coeffs
            .as_deref()
            .ok_or_else(|| Error::key_not_generated("secret key"))
    }

    /// Returns the key as a polynomial in Ntt representation in `ctx`.
    pub(crate) fn poly_at(&self, ctx: &Arc<Context>) -> Result<Zeroizing<Poly>> {
        let mut s = Zeroizing::new(Poly::try_convert_from(
            self.coefficients()?,
            ctx,
            Representation::PowerBasis,
        )?);
        s.change_representation(Representation::Ntt);
        Ok(s)
    }

    /// Encrypt a polynomial in Ntt representation, returning (−a·s + e + m, a).
    pub(crate) fn encrypt_poly<R: RngCore + CryptoRng>(
        &self,
        m: &Poly,
        rng: &mut R,
    ) -> Result<Vec<Poly>> {
        if m.representation() != &Representation::Ntt {
            return Err(Error::MathError(fhe_math::Error::IncorrectRepresentation(
                *m.representation(),
                Representation::Ntt,
            )));
        }
        let s = self.poly_at(m.ctx())?;

        let a = Poly::random(m.ctx(), Representation::Ntt, rng);
        let a_s = Zeroizing::new(&a * s.as_ref());

        let mut b = Poly::small(m.ctx(), Representation::Ntt, self.par.variance(), rng)?;
        b -= &a_s;
        b += m;

        Ok(vec![b, a])
    }
}

impl FheParametrized for SecretKey {
    type Parameters = CkksParameters;
}

impl From<&SecretKey> for SecretKeyProto {
    fn from(sk: &SecretKey) -> Self {
        SecretKeyProto {
            coeffs: sk.coeffs.as_deref().map(|c| c.to_vec()).unwrap_or_default(),
            hamming_weight: sk.hamming_weight as u32,
            fingerprint: sk.par.fingerprint().to_vec(),
        }
    }
}

impl Serialize for SecretKey {
    fn to_bytes(&self) -> Vec<u8> {
        let mut proto = SecretKeyProto::from(self);
        let bytes = proto.encode_to_vec();
        proto.coeffs.zeroize();
        bytes
    }
}

impl DeserializeParametrized for SecretKey {
    type Error = Error;

    fn from_bytes(bytes: &[u8], par: &Arc<CkksParameters>) -> Result<Self> {
        let mut proto: SecretKeyProto =
            Message::decode(bytes).map_err(|_| Error::SerializationError)?;
        par.check_fingerprint(&proto.fingerprint)?;
        let coeffs = Zeroizing::new(std::mem::take(&mut proto.coeffs));
        let mut sk = SecretKey::new(par);
        sk.hamming_weight = proto.hamming_weight as usize;
        if !coeffs.is_empty() {
            if coeffs.len() != par.degree() || coeffs.iter().any(|c| c.abs() > 1) {
                return Err(Error::SerializationError);
            }
            sk.coeffs = Some(coeffs.to_vec().into_boxed_slice());
        }
        Ok(sk)
    }
}

#[cfg(test)]
mod tests {
    use super::SecretKey;
    use crate::ckks::CkksParameters;
    use crate::Error;
    use fhe_traits::{DeserializeParametrized, Serialize};
    use rand::thread_rng;
    use std::error::Error as StdError;

    #[test]
    fn keygen() -> Result<(), Box<dyn StdError>> {
        let mut rng = thread_rng();
        let par = CkksParameters::default_arc(2, 16);

        let sk = SecretKey::random(&par, 0, &mut rng)?;
        assert!(sk.is_generated());
        assert!(sk.coefficients()?.iter().all(|c| c.abs() <= 1));

        let sk = SecretKey::random(&par, 5, &mut rng)?;
        assert_eq!(sk.hamming_weight(), 5);
        assert_eq!(sk.coefficients()?.iter().filter(|c| **c != 0).count(), 5);

        assert!(SecretKey::random(&par, 17, &mut rng).is_err());
        Ok(())
    }

    #[test]
    fn ungenerated() {
        let par = CkksParameters::default_arc(2, 16);
        let sk = SecretKey::new(&par);
        assert!(!sk.is_generated());
        assert_eq!(
            sk.poly_at(par.ctx_at_level(0).unwrap()).unwrap_err(),
            Error::KeyNotGenerated("secret key".to_string())
        );
    }

    #[test]
    fn serialize() -> Result<(), Box<dyn StdError>> {
        let mut rng = thread_rng();
        let par = CkksParameters::default_arc(2, 16);
        let sk = SecretKey::random(&par, 4, &mut rng)?;
        let sk2 = SecretKey::from_bytes(&sk.to_bytes(), &par)?;
        assert_eq!(sk, sk2);

        let empty = SecretKey::new(&par);
        assert_eq!(SecretKey::from_bytes(&empty.to_bytes(), &par)?, empty);

        let other = CkksParameters::default_arc(3, 16);
        assert_eq!(
            SecretKey::from_bytes(&sk.to_bytes(), &other).unwrap_err(),
            Error::ContextMismatch
        );
        Ok(())
    }
}
