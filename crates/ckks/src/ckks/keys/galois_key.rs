//! Galois keys for the CKKS encryption scheme
//!
//! A Galois key holds one key switching key from s(X^k) to s(X) for each
//! Galois element k it supports. The element 5^r mod 2N rotates the slots r
//! positions to the left, and 2N − 1 conjugates them.

use crate::ckks::{traits::TryConvertFrom, Ciphertext, CkksParameters, SecretKey};
use crate::proto::ckks::{
    GaloisElementKey as GaloisElementKeyProto, GaloisKey as GaloisKeyProto,
    KeySwitchingKey as KeySwitchingKeyProto,
};
use crate::{Error, Result};
use fhe_math::rq::SubstitutionExponent;
use fhe_traits::{DeserializeParametrized, FheParametrized, Serialize};
use itertools::Itertools;
use prost::Message;
use rand::{CryptoRng, RngCore};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use zeroize::Zeroizing;

use super::KeySwitchingKey;

/// The rotations supported by a Galois key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RotationSet {
    /// Keys for the rotations by every power of two below the number of
    /// slots, from which any rotation is composed.
    PowersOfTwo,
    /// Keys for the listed rotation steps only. Negative steps rotate to the
    /// right.
    Steps(Vec<i32>),
}

/// Galois key for the CKKS encryption scheme.
///
/// The conjugation key is always part of a Galois key.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct GaloisKey {
    pub(crate) par: Arc<CkksParameters>,
    pub(crate) rotations: RotationSet,
    pub(crate) keys: BTreeMap<usize, KeySwitchingKey>,
    pub(crate) generated: bool,
}

impl GaloisKey {
    /// Create an ungenerated Galois key supporting the given rotations.
    pub fn new(par: &Arc<CkksParameters>, rotations: RotationSet) -> Self {
        Self {
            par: par.clone(),
            rotations,
            keys: BTreeMap::new(),
            generated: false,
        }
    }

    /// Create an ungenerated Galois key supporting the rotations by `steps`.
    pub fn with_steps(par: &Arc<CkksParameters>, steps: &[i32]) -> Self {
        Self::new(par, RotationSet::Steps(steps.to_vec()))
    }

    /// Create an ungenerated Galois key supporting every rotation.
    pub fn with_powers_of_two(par: &Arc<CkksParameters>) -> Self {
        Self::new(par, RotationSet::PowersOfTwo)
    }

    /// Returns the supported rotations.
    pub fn rotations(&self) -> &RotationSet {
        &self.rotations
    }

    /// Returns whether the key has been generated.
    pub fn is_generated(&self) -> bool {
        self.generated
    }

    /// The Galois element of the conjugation.
    pub(crate) fn conjugation_exponent(par: &CkksParameters) -> usize {
        2 * par.degree() - 1
    }

    /// The Galois elements for which keys are generated.
    pub(crate) fn exponents(&self) -> Vec<usize> {
        let slots = self.par.slots();
        let steps = match &self.rotations {
            RotationSet::PowersOfTwo => (0..slots.trailing_zeros())
                .map(|i| 1usize << i)
                .collect_vec(),
            RotationSet::Steps(steps) => steps.iter().map(|s| self.normalize(*s)).collect_vec(),
        };
        steps
            .into_iter()
            .filter(|s| *s != 0)
            .map(|s| self.par.fft.rotation_exponent(s))
            .chain(std::iter::once(Self::conjugation_exponent(&self.par)))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn normalize(&self, step: i32) -> usize {
        (step as i64).rem_euclid(self.par.slots() as i64) as usize
    }

    /// Returns the Galois elements to apply successively to rotate by `step`.
    pub(crate) fn rotation_exponents(&self, step: i32) -> Result<Vec<usize>> {
        let k = self.normalize(step);
        if k == 0 {
            return Ok(vec![]);
        }
        match &self.rotations {
            RotationSet::Steps(steps) => {
                if steps.iter().any(|s| self.normalize(*s) == k) {
                    Ok(vec![self.par.fft.rotation_exponent(k)])
                } else {
                    Err(Error::MissingRotation(step as i64))
                }
            }
            RotationSet::PowersOfTwo => Ok((0..usize::BITS)
                .filter(|i| (k >> i) & 1 == 1)
                .map(|i| self.par.fft.rotation_exponent(1 << i))
                .collect()),
        }
    }

    pub(crate) fn from_secret_key<R: RngCore + CryptoRng>(
        &mut self,
        sk: &SecretKey,
        rng: &mut R,
    ) -> Result<()> {
        let ctx = &sk.par.ctx[0];
        let s = sk.poly_at(ctx)?;
        let mut keys = BTreeMap::new();
        for exponent in self.exponents() {
            let s_k = Zeroizing::new(s.substitute(&SubstitutionExponent::new(ctx, exponent)?)?);
            keys.insert(exponent, KeySwitchingKey::new(sk, &s_k, rng)?);
        }
        self.keys = keys;
        self.generated = true;
        Ok(())
    }

    /// Apply the automorphism X → X^exponent to a ciphertext of size 2.
    pub(crate) fn apply(&self, ct: &Ciphertext, exponent: usize) -> Result<Ciphertext> {
        if !self.generated {
            return Err(Error::key_not_generated("Galois key"));
        }
        if ct.c.len() != 2 {
            return Err(Error::UnspecifiedInput(
                "Only ciphertexts with 2 parts can be rotated".to_string(),
            ));
        }
        let ksk = self.keys.get(&exponent).ok_or_else(|| {
            Error::UnspecifiedInput(format!("No key for the Galois element {exponent}"))
        })?;
        let sub = SubstitutionExponent::new(ct.c[0].ctx(), exponent)?;
        let c1 = ct.c[1].substitute(&sub)?;
        let (k0, k1) = ksk.key_switch(&c1)?;
        let mut c0 = ct.c[0].substitute(&sub)?;
        c0 += &k0;

        let mut out = ct.clone();
        out.c = vec![c0, k1];
        Ok(out)
    }
}

impl FheParametrized for GaloisKey {
    type Parameters = CkksParameters;
}

impl From<&GaloisKey> for GaloisKeyProto {
    fn from(value: &GaloisKey) -> Self {
        let (powers_of_two, steps) = match &value.rotations {
            RotationSet::PowersOfTwo => (true, vec![]),
            RotationSet::Steps(steps) => (false, steps.clone()),
        };
        GaloisKeyProto {
            powers_of_two,
            steps,
            generated: value.generated,
            keys: value
                .keys
                .iter()
                .map(|(exponent, ksk)| GaloisElementKeyProto {
                    exponent: *exponent as u32,
                    ksk: Some(KeySwitchingKeyProto::from(ksk)),
                })
                .collect(),
            fingerprint: value.par.fingerprint().to_vec(),
        }
    }
}

impl TryConvertFrom<&GaloisKeyProto> for GaloisKey {
    fn try_convert_from(value: &GaloisKeyProto, par: &Arc<CkksParameters>) -> Result<Self> {
        par.check_fingerprint(&value.fingerprint)?;
        let rotations = if value.powers_of_two {
            RotationSet::PowersOfTwo
        } else {
            RotationSet::Steps(value.steps.clone())
        };
        let mut gk = GaloisKey::new(par, rotations);
        for key in &value.keys {
            let ksk = key.ksk.as_ref().ok_or(Error::SerializationError)?;
            gk.keys.insert(
                key.exponent as usize,
                KeySwitchingKey::try_convert_from(ksk, par)?,
            );
        }
        if value.generated && gk.keys.keys().copied().collect_vec() != gk.exponents() {
            return Err(Error::SerializationError);
        }
        gk.generated = value.generated;
        Ok(gk)
    }
}

impl Serialize for GaloisKey {
    fn to_bytes(&self) -> Vec<u8> {
        GaloisKeyProto::from(self).encode_to_vec()
    }
}

impl DeserializeParametrized for GaloisKey {
    type Error = Error;

    fn from_bytes(bytes: &[u8], par: &Arc<Self::Parameters>) -> Result<Self> {
        let gk: GaloisKeyProto = Message::decode(bytes).map_err(|_| Error::SerializationError)?;
        GaloisKey::try_convert_from(&gk, par)
    }
}

#[cfg(test)]
mod tests {
    use super::{GaloisKey, RotationSet};
    use crate::ckks::{CkksParameters, SecretKey};
    use crate::Error;
    use fhe_traits::{DeserializeParametrized, Serialize};
    use rand::thread_rng;
    use std::error::Error as StdError;

    #[test]
    fn exponents() {
        let par = CkksParameters::default_arc(2, 16);
        // 8 slots, 2N = 32.
        let gk = GaloisKey::with_powers_of_two(&par);
        assert_eq!(gk.exponents(), vec![5, 17, 25, 31]);
        assert_eq!(gk.rotation_exponents(3).unwrap(), vec![5, 25]);
        assert_eq!(gk.rotation_exponents(-1).unwrap(), vec![5, 25, 17]);
        assert!(gk.rotation_exponents(8).unwrap().is_empty());

        let gk = GaloisKey::with_steps(&par, &[1, -1, 0]);
        assert_eq!(gk.exponents(), vec![5, 13, 31]);
        assert_eq!(gk.rotation_exponents(7).unwrap(), vec![13]);
        assert_eq!(gk.rotation_exponents(2), Err(Error::MissingRotation(2)));
        assert_eq!(gk.rotations(), &RotationSet::Steps(vec![1, -1, 0]));
    }

    #[test]
    fn serialize() -> Result<(), Box<dyn StdError>> {
        let mut rng = thread_rng();
        let par = CkksParameters::default_arc(2, 16);
        let sk = SecretKey::random(&par, 0, &mut rng)?;
        let mut gk = GaloisKey::with_steps(&par, &[2]);
        assert!(!gk.is_generated());
        assert_eq!(GaloisKey::from_bytes(&gk.to_bytes(), &par)?, gk);

        gk.from_secret_key(&sk, &mut rng)?;
        assert!(gk.is_generated());
        assert_eq!(gk.keys.len(), 2);
        assert_eq!(GaloisKey::from_bytes(&gk.to_bytes(), &par)?, gk);
        Ok(())
    }
}
