//! Plaintext type in the CKKS encryption scheme.

use crate::ckks::{CkksEncoding, CkksParameters, Storage};
use crate::proto::ckks::Plaintext as PlaintextProto;
use crate::{Error, Result};
use fhe_math::rq::{Poly, Representation};
use fhe_traits::{
    DeserializeParametrized, DeserializeWithContext, FheParametrized, FhePlaintext, Serialize,
};
use prost::Message;
use std::sync::Arc;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A plaintext object, that encodes a vector at a given scale.
#[derive(Debug, Clone, PartialEq)]
pub struct Plaintext {
    /// The parameters of the underlying CKKS encryption scheme.
    pub(crate) par: Arc<CkksParameters>,
    /// The encoded polynomial, in Ntt representation.
    pub(crate) poly: Poly,
    /// The scale of the encoding.
    pub(crate) scale: f64,
    /// The level of the plaintext.
    pub(crate) level: usize,
    pub(crate) storage: Storage,
}

impl FheParametrized for Plaintext {
    type Parameters = CkksParameters;
}

impl FhePlaintext for Plaintext {
    type Encoding = CkksEncoding;
}

impl Zeroize for Plaintext {
    fn zeroize(&mut self) {
        self.poly.zeroize();
    }
}

impl Drop for Plaintext {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl ZeroizeOnDrop for Plaintext {}

impl Plaintext {
    pub(crate) fn from_parts(
        par: &Arc<CkksParameters>,
        poly: Poly,
        scale: f64,
        level: usize,
    ) -> Self {
        Self {
            par: par.clone(),
            poly,
            scale,
            level,
            storage: Storage::Host,
        }
    }

    /// Generate a zero plaintext at a given scale and level.
    pub fn zero(par: &Arc<CkksParameters>, scale: f64, level: usize) -> Result<Self> {
        let ctx = par.ctx_at_level(level)?;
        Ok(Self::from_parts(
            par,
            Poly::zero(ctx, Representation::Ntt),
            scale,
            level,
        ))
    }

    /// Returns the scale.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Returns the level.
    pub fn level(&self) -> usize {
        self.level
    }

    /// Returns the storage in which the plaintext resides.
    pub fn storage(&self) -> Storage {
        self.storage
    }

    /// Returns whether the coefficients are in Ntt representation.
    pub fn is_ntt(&self) -> bool {
        self.poly.representation() == &Representation::Ntt
    }

    /// Move the plaintext to another storage.
    pub fn move_to(&mut self, storage: Storage) {
        self.storage = storage;
    }

    /// Returns the underlying polynomial.
    pub(crate) fn to_poly(&self) -> Poly {
        self.poly.clone()
    }

    /// Drop the last modulus, without changing the scale.
    pub fn mod_drop_to_next_level(&mut self) -> Result<()> {
        if self.level >= self.par.max_level() {
            return Err(Error::LevelExhausted(self.level));
        }
        self.poly.drop_last_modulus()?;
        self.level += 1;
        Ok(())
    }

    /// Drop moduli down to a given level, without changing the scale.
    pub fn mod_drop_to_level(&mut self, level: usize) -> Result<()> {
        if level < self.level {
            return Err(Error::InvalidLevel(level, self.level));
        }
        let ctx = self.par.ctx_at_level(level)?;
        self.poly.drop_to(ctx)?;
        self.level = level;
        Ok(())
    }

    /// Copy the coefficients, one modulus after the other, in the current
    /// representation. Returns the number of values written.
    pub fn copy_coefficients(&self, out: &mut [u64]) -> Result<usize> {
        let coefficients = self.poly.coefficients();
        let len = coefficients.len();
        if out.len() < len {
            return Err(Error::BufferTooSmall(out.len(), len));
        }
        out.iter_mut()
            .zip(coefficients.iter())
            .for_each(|(o, c)| *o = *c);
        Ok(len)
    }
}

impl From<&Plaintext> for PlaintextProto {
    fn from(pt: &Plaintext) -> Self {
        PlaintextProto {
            poly: pt.poly.to_bytes(),
            scale: pt.scale,
            level: pt.level as u32,
            fingerprint: pt.par.fingerprint().to_vec(),
            storage: pt.storage.to_u32(),
        }
    }
}

impl Serialize for Plaintext {
    fn to_bytes(&self) -> Vec<u8> {
        PlaintextProto::from(self).encode_to_vec()
    }
}

impl DeserializeParametrized for Plaintext {
    type Error = Error;

    fn from_bytes(bytes: &[u8], par: &Arc<CkksParameters>) -> Result<Self> {
        let proto: PlaintextProto =
            Message::decode(bytes).map_err(|_| Error::SerializationError)?;
        par.check_fingerprint(&proto.fingerprint)?;
        let level = proto.level as usize;
        let ctx = par
            .ctx_at_level(level)
            .map_err(|_| Error::SerializationError)?;
        let poly = Poly::from_bytes(&proto.poly, ctx).map_err(|_| Error::SerializationError)?;
        if poly.representation() != &Representation::Ntt || !proto.scale.is_finite() {
            return Err(Error::SerializationError);
        }
        let mut pt = Self::from_parts(par, poly, proto.scale, level);
        pt.storage = Storage::try_from_u32(proto.storage)?;
        Ok(pt)
    }
}

#[cfg(test)]
mod tests {
    use super::Plaintext;
    use crate::ckks::{CkksParameters, Encoder, Storage};
    use crate::Error;
    use fhe_traits::{DeserializeParametrized, Serialize};
    use std::error::Error as StdError;
    use zeroize::{Zeroize, ZeroizeOnDrop};

    #[test]
    fn zero() -> Result<(), Box<dyn StdError>> {
        let par = CkksParameters::default_arc(2, 16);
        let pt = Plaintext::zero(&par, par.scale(), 1)?;
        assert_eq!(pt.level(), 1);
        assert!(pt.is_ntt());
        assert!(Encoder::new(&par).decode(&pt)?.iter().all(|v| *v == 0.0));
        Ok(())
    }

    #[test]
    fn mod_drop() -> Result<(), Box<dyn StdError>> {
        let par = CkksParameters::default_arc(3, 16);
        let encoder = Encoder::new(&par);
        let mut pt = encoder.encode(&[1.0, 2.0, 3.0], par.scale(), 0)?;
        pt.mod_drop_to_next_level()?;
        assert_eq!(pt.level(), 1);
        pt.mod_drop_to_level(2)?;
        assert_eq!(pt.level(), 2);
        assert_eq!(pt.scale(), par.scale());
        let decoded = encoder.decode(&pt)?;
        assert!((decoded[2] - 3.0).abs() < 1e-9);
        assert_eq!(pt.mod_drop_to_next_level().unwrap_err(), Error::LevelExhausted(2));
        assert_eq!(pt.mod_drop_to_level(1).unwrap_err(), Error::InvalidLevel(1, 2));
        Ok(())
    }

    #[test]
    fn copy_coefficients() -> Result<(), Box<dyn StdError>> {
        let par = CkksParameters::default_arc(2, 16);
        let pt = Encoder::new(&par).encode(&[1.0], par.scale(), 0)?;
        let mut small = vec![0u64; 31];
        assert_eq!(
            pt.copy_coefficients(&mut small).unwrap_err(),
            Error::BufferTooSmall(31, 32)
        );
        let mut out = vec![0u64; 40];
        assert_eq!(pt.copy_coefficients(&mut out)?, 32);
        assert_eq!(&out[..32], pt.poly.coefficients().iter().copied().collect::<Vec<_>>());
        Ok(())
    }

    #[test]
    fn serialize() -> Result<(), Box<dyn StdError>> {
        let par = CkksParameters::default_arc(3, 16);
        let mut pt = Encoder::new(&par).encode(&[0.25, -1.5], par.scale(), 1)?;
        pt.move_to(Storage::Device);
        let bytes = pt.to_bytes();
        let pt2 = Plaintext::from_bytes(&bytes, &par)?;
        assert_eq!(pt2.level(), pt.level());
        assert_eq!(pt2.scale(), pt.scale());
        assert_eq!(pt2.poly, pt.poly);
        assert_eq!(pt2.storage(), Storage::Device);
        assert_eq!(pt2, pt);
        assert_eq!(
            Plaintext::from_bytes(&Plaintext::zero(&par, 1.0, 0)?.to_bytes(), &par)?.storage(),
            Storage::Host
        );

        let other = CkksParameters::default_arc(4, 16);
        assert_eq!(
            Plaintext::from_bytes(&bytes, &other).unwrap_err(),
            Error::ContextMismatch
        );
        Ok(())
    }

    #[test]
    fn zeroize() -> Result<(), Box<dyn StdError>> {
        fn zeroized_on_drop<T: ZeroizeOnDrop>(_: &T) {}

        let par = CkksParameters::default_arc(2, 16);
        let mut pt = Encoder::new(&par).encode(&[3.0, -2.0], par.scale(), 0)?;
        zeroized_on_drop(&pt);
        assert!(pt.poly.coefficients().iter().any(|c| *c != 0));
        pt.zeroize();
        assert!(pt.poly.coefficients().iter().all(|c| *c == 0));
        Ok(())
    }
}
