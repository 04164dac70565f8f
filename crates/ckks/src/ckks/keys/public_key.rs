//! Public keys for the CKKS encryption scheme

use crate::ckks::{traits::TryConvertFrom, Ciphertext, CkksParameters, Plaintext, SecretKey};
use crate::proto::ckks::{Ciphertext as CiphertextProto, PublicKey as PublicKeyProto};
use crate::{Error, Result};
use fhe_math::rq::{traits::TryConvertFrom as TryConvertFromPoly, Poly, Representation};
use fhe_traits::{DeserializeParametrized, FheParametrized, Serialize};
use fhe_util::sample_vec_cbd_f32;
use prost::Message;
use rand::{CryptoRng, RngCore};
use std::sync::Arc;
use zeroize::Zeroizing;

/// Public key for the CKKS encryption scheme, an encryption of zero
/// (b = −a·s + e, a) at the first level.
#[derive(Debug, PartialEq, Clone)]
pub struct PublicKey {
    /// The CKKS parameters
    pub(crate) par: Arc<CkksParameters>,
    /// The public key ciphertext
    pub(crate) c: Option<Ciphertext>,
}

impl PublicKey {
    /// Create an ungenerated public key.
    pub fn new(par: &Arc<CkksParameters>) -> Self {
        Self {
            par: par.clone(),
            c: None,
        }
    }

    /// Generate a public key from a secret key.
    pub(crate) fn from_secret_key<R: RngCore + CryptoRng>(
        sk: &SecretKey,
        rng: &mut R,
    ) -> Result<Self> {
        let zero = Plaintext::zero(&sk.par, 1.0, 0)?;
        let c = sk.encrypt_poly(&zero.poly, rng)?;
        Ok(Self {
            par: sk.par.clone(),
            c: Some(Ciphertext::new(c, 1.0, &sk.par)?),
        })
    }

    /// Returns whether the key has been generated.
    pub fn is_generated(&self) -> bool {
        self.c.is_some()
    }

    pub(crate) fn ciphertext(&self) -> Result<&Ciphertext> {
        self.c
            .as_ref()
            .ok_or_else(|| Error::key_not_generated("public key"))
    }

    /// Encrypt a polynomial in Ntt representation, at the level of its
    /// context: (b·u + e0 + m, a·u + e1) with u ternary.
    pub(crate) fn encrypt_poly<R: RngCore + CryptoRng>(
        &self,
        m: &Poly,
        rng: &mut R,
    ) -> Result<Vec<Poly>> {
        let mut ct = self.ciphertext()?.clone();
        ct.mod_drop_to_level(self.par.level_of_ctx(m.ctx())?)?;
        let ctx = m.ctx();

        let u_coeffs = Zeroizing::new(
            sample_vec_cbd_f32(self.par.degree(), SecretKey::SK_VARIANCE, rng)
                .map_err(|e| Error::UnspecifiedInput(e.to_string()))?,
        );
        let u = Zeroizing::new(Poly::try_convert_from(
            u_coeffs.as_slice(),
            ctx,
            Representation::Ntt,
        )?);
        let e0 = Zeroizing::new(Poly::small(
            ctx,
            Representation::Ntt,
            self.par.variance(),
            rng,
        )?);
        let e1 = Zeroizing::new(Poly::small(
            ctx,
            Representation::Ntt,
            self.par.variance(),
            rng,
        )?);

        let mut c0 = u.as_ref() * &ct.c[0];
        c0 += &e0;
        c0 += m;
        let mut c1 = u.as_ref() * &ct.c[1];
        c1 += &e1;

        Ok(vec![c0, c1])
    }
}

impl FheParametrized for PublicKey {
    type Parameters = CkksParameters;
}

impl From<&PublicKey> for PublicKeyProto {
    fn from(pk: &PublicKey) -> Self {
        PublicKeyProto {
            c: pk.c.as_ref().map(CiphertextProto::from),
            fingerprint: pk.par.fingerprint().to_vec(),
        }
    }
}

impl Serialize for PublicKey {
    fn to_bytes(&self) -> Vec<u8> {
        PublicKeyProto::from(self).encode_to_vec()
    }
}

impl DeserializeParametrized for PublicKey {
    type Error = Error;

    fn from_bytes(bytes: &[u8], par: &Arc<Self::Parameters>) -> Result<Self> {
        let proto: PublicKeyProto =
            Message::decode(bytes).map_err(|_| Error::SerializationError)?;
        par.check_fingerprint(&proto.fingerprint)?;
        let c = proto
            .c
            .as_ref()
            .map(|c| Ciphertext::try_convert_from(c, par))
            .transpose()?;
        if c.as_ref().is_some_and(|c| c.level != 0 || c.size() != 2) {
            return Err(Error::SerializationError);
        }
        Ok(Self {
            par: par.clone(),
            c,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::PublicKey;
    use crate::ckks::{CkksParameters, Decryptor, KeyGenerator};
    use crate::Error;
    use fhe_math::rq::Representation;
    use fhe_traits::{DeserializeParametrized, Serialize};
    use std::error::Error as StdError;

    #[test]
    fn keygen() -> Result<(), Box<dyn StdError>> {
        let par = CkksParameters::default_arc(2, 16);
        let mut keygen = KeyGenerator::new(&par);
        let sk = keygen.generate_secret_key(0)?;
        let pk = keygen.generate_public_key(&sk)?;
        assert!(pk.is_generated());

        // The public key decrypts to a small error.
        let pt = Decryptor::new(&sk)?.decrypt(pk.ciphertext()?)?;
        let mut e = pt.poly.clone();
        e.change_representation(Representation::PowerBasis);
        assert!(e.infinity_norm_bits() < 10);
        Ok(())
    }

    #[test]
    fn serialize() -> Result<(), Box<dyn StdError>> {
        let par = CkksParameters::default_arc(2, 16);
        let mut keygen = KeyGenerator::new(&par);
        let sk = keygen.generate_secret_key(0)?;
        let pk = keygen.generate_public_key(&sk)?;
        assert_eq!(PublicKey::from_bytes(&pk.to_bytes(), &par)?, pk);

        let empty = PublicKey::new(&par);
        assert_eq!(PublicKey::from_bytes(&empty.to_bytes(), &par)?, empty);
        assert_eq!(
            empty.ciphertext().unwrap_err(),
            Error::KeyNotGenerated("public key".to_string())
        );
        Ok(())
    }
}
