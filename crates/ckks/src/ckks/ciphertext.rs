//! Ciphertext type in the CKKS encryption scheme.

use crate::ckks::{traits::TryConvertFrom, CkksParameters, Storage};
use crate::proto::ckks::Ciphertext as CiphertextProto;
use crate::{Error, Result};
use fhe_math::rq::{Poly, Representation};
use fhe_traits::{
    DeserializeParametrized, DeserializeWithContext, FheCiphertext, FheParametrized, Serialize,
};
use prost::Message;
use std::sync::Arc;

/// A ciphertext encrypting a plaintext.
#[derive(Debug, Clone, PartialEq)]
pub struct Ciphertext {
    /// The parameters of the underlying CKKS encryption scheme.
    pub(crate) par: Arc<CkksParameters>,

    /// The ciphertext elements.
    pub c: Vec<Poly>,

    /// The scale of the encrypted message.
    pub(crate) scale: f64,

    /// The ciphertext level
    pub(crate) level: usize,

    pub(crate) storage: Storage,
}

impl Ciphertext {
    /// Create a ciphertext from a vector of polynomials.
    /// A ciphertext must contain at least two polynomials, and all polynomials
    /// must be in Ntt representation and with the same context.
    pub fn new(c: Vec<Poly>, scale: f64, par: &Arc<CkksParameters>) -> Result<Self> {
        if c.len() < 2 {
            return Err(Error::TooFewValues(c.len(), 2));
        }

        let ctx = c[0].ctx();
        let level = par.level_of_ctx(ctx)?;

        // Check that all polynomials have the expected representation and context.
        for ci in c.iter() {
            if ci.representation() != &Representation::Ntt {
                return Err(Error::MathError(fhe_math::Error::IncorrectRepresentation(
                    *ci.representation(),
                    Representation::Ntt,
                )));
            }
            if ci.ctx() != ctx {
                return Err(Error::MathError(fhe_math::Error::InvalidContext));
            }
        }

        Ok(Self {
            par: par.clone(),
            c,
            scale,
            level,
            storage: Storage::Host,
        })
    }

    /// Returns the number of polynomials of the ciphertext.
    pub fn size(&self) -> usize {
        self.c.len()
    }

    /// Get the i-th polynomial of the ciphertext.
    pub fn get(&self, i: usize) -> Option<&Poly> {
        self.c.get(i)
    }

    /// Returns the scale.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Returns the level.
    pub fn level(&self) -> usize {
        self.level
    }

    /// Returns the storage in which the ciphertext resides.
    pub fn storage(&self) -> Storage {
        self.storage
    }

    /// Returns whether the polynomials are in Ntt representation.
    pub fn is_ntt(&self) -> bool {
        self.c
            .iter()
            .all(|ci| ci.representation() == &Representation::Ntt)
    }

    /// Move the ciphertext to another storage.
    pub fn move_to(&mut self, storage: Storage) {
        self.storage = storage;
    }

    /// Drop the last modulus, without changing the scale.
    pub fn mod_drop_to_next_level(&mut self) -> Result<()> {
        if self.level >= self.par.max_level() {
            return Err(Error::LevelExhausted(self.level));
        }
        for ci in self.c.iter_mut() {
            ci.drop_last_modulus()?;
        }
        self.level += 1;
        Ok(())
    }

    /// Drop moduli down to a given level, without changing the scale.
    pub fn mod_drop_to_level(&mut self, level: usize) -> Result<()> {
        if level < self.level {
            return Err(Error::InvalidLevel(level, self.level));
        }
        let ctx = self.par.ctx_at_level(level)?;
        for ci in self.c.iter_mut() {
            ci.drop_to(ctx)?;
        }
        self.level = level;
        Ok(())
    }

    /// Divide by the last modulus and round, dividing the scale accordingly.
    pub(crate) fn rescale_to_next_level(&mut self) -> Result<()> {
        if self.level >= self.par.max_level() {
            return Err(Error::LevelExhausted(self.level));
        }
        let q_last = *self.par.ctx[self.level]
            .moduli()
            .last()
            .ok_or(Error::MathError(fhe_math::Error::InvalidContext))?;
        for ci in self.c.iter_mut() {
            ci.mod_switch_down_next()?;
        }
        self.scale /= q_last as f64;
        self.level += 1;
        Ok(())
    }

    /// Copy the coefficients of the i-th polynomial, one modulus after the
    /// other, in the current representation. Returns the number of values
    /// written.
    pub fn copy_coefficients(&self, i: usize, out: &mut [u64]) -> Result<usize> {
        let ci = self
            .c
            .get(i)
            .ok_or(Error::TooFewValues(self.c.len(), i + 1))?;
        let coefficients = ci.coefficients();
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

impl FheCiphertext for Ciphertext {}

impl FheParametrized for Ciphertext {
    type Parameters = CkksParameters;
}

impl Serialize for Ciphertext {
    fn to_bytes(&self) -> Vec<u8> {
        CiphertextProto::from(self).encode_to_vec()
    }
}

impl DeserializeParametrized for Ciphertext {
    type Error = Error;

    fn from_bytes(bytes: &[u8], par: &Arc<CkksParameters>) -> Result<Self> {
        let ctp = Message::decode(bytes).map_err(|_| Error::SerializationError)?;
        Ciphertext::try_convert_from(&ctp, par)
    }
}

impl From<&Ciphertext> for CiphertextProto {
    fn from(ct: &Ciphertext) -> Self {
        CiphertextProto {
            c: ct.c.iter().map(|ci| ci.to_bytes()).collect(),
            scale: ct.scale,
            level: ct.level as u32,
            fingerprint: ct.par.fingerprint().to_vec(),
            storage: ct.storage.to_u32(),
        }
    }
}

impl TryConvertFrom<&CiphertextProto> for Ciphertext {
    fn try_convert_from(value: &CiphertextProto, par: &Arc<CkksParameters>) -> Result<Self> {
        par.check_fingerprint(&value.fingerprint)?;
        if value.c.len() < 2 || !value.scale.is_finite() {
            return Err(Error::SerializationError);
        }

        let level = value.level as usize;
        let ctx = par
            .ctx_at_level(level)
            .map_err(|_| Error::SerializationError)?;

        let c = value
            .c
            .iter()
            .map(|cip| Poly::from_bytes(cip, ctx).map_err(|_| Error::SerializationError))
            .collect::<Result<Vec<Poly>>>()?;

        let storage = Storage::try_from_u32(value.storage)?;
        let mut ct = Ciphertext::new(c, value.scale, par).map_err(|_| Error::SerializationError)?;
        ct.storage = storage;
        Ok(ct)
    }
}
