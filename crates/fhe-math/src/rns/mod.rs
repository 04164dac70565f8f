//! Residue-Number System operations.

mod converter;

pub use converter::BaseConverter;

use crate::{zq::Modulus, Error, Result};
use itertools::izip;
use ndarray::ArrayView1;
use num_bigint::BigUint;
use num_traits::{One, ToPrimitive, Zero};
use std::fmt::Debug;

/// Context for a Residue Number System.
#[derive(Default, Clone, PartialEq, Eq)]
pub struct RnsContext {
    moduli_u64: Vec<u64>,
    moduli: Vec<Modulus>,
    q_tilde: Vec<u64>,
    q_tilde_shoup: Vec<u64>,
    q_star: Vec<BigUint>,
    garner: Vec<BigUint>,
    product: BigUint,
}

impl Debug for RnsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RnsContext")
            .field("moduli_u64", &self.moduli_u64)
            .field("product", &self.product)
            .finish()
    }
}

impl RnsContext {
    /// Create a RNS context from a list of distinct prime moduli.
    ///
    /// Returns an error if the list is empty, or if the moduli are not
    /// distinct primes of at most 62 bits.
    pub fn new(moduli_u64: &[u64]) -> Result<Self> {
        if moduli_u64.is_empty() {
            return Err(Error::Default("The list of moduli is empty".to_string()));
        }
        for (i, qi) in moduli_u64.iter().enumerate() {
            if moduli_u64[..i].contains(qi) {
                return Err(Error::Default("The moduli are not coprime".to_string()));
            }
        }

        let moduli = moduli_u64
            .iter()
            .map(|qi| Modulus::new(*qi))
            .collect::<Result<Vec<_>>>()?;
        let product = moduli_u64
            .iter()
            .fold(BigUint::one(), |acc, qi| acc * *qi);

        let mut q_tilde = Vec::with_capacity(moduli.len());
        let mut q_tilde_shoup = Vec::with_capacity(moduli.len());
        let mut q_star = Vec::with_capacity(moduli.len());
        let mut garner = Vec::with_capacity(moduli.len());
        for qi in &moduli {
            let q_star_i = &product / qi.modulus();
            let q_star_i_mod = (&q_star_i % qi.modulus())
                .to_u64()
                .ok_or_else(|| Error::Default("Conversion error".to_string()))?;
            let q_tilde_i = qi
                .inv(q_star_i_mod)
                .ok_or(Error::InvalidModulus(qi.modulus()))?;
            garner.push(&q_star_i * q_tilde_i);
            q_star.push(q_star_i);
            q_tilde_shoup.push(qi.shoup(q_tilde_i));
            q_tilde.push(q_tilde_i);
        }

        Ok(Self {
            moduli_u64: moduli_u64.to_owned(),
            moduli,
            q_tilde,
            q_tilde_shoup,
            q_star,
            garner,
            product,
        })
    }

    /// Returns the product of the moduli used when creating the RNS context.
    pub const fn modulus(&self) -> &BigUint {
        &self.product
    }

    /// Returns the moduli of the RNS context.
    pub fn moduli(&self) -> &[u64] {
        &self.moduli_u64
    }

    /// Returns the modulus operators of the RNS context.
    pub fn moduli_operators(&self) -> &[Modulus] {
        &self.moduli
    }

    /// Project a BigUint into its rests.
    pub fn project(&self, a: &BigUint) -> Vec<u64> {
        self.moduli_u64
            .iter()
            .map(|qi| {
                (a % qi)
                    .to_u64()
                    .unwrap_or_default()
            })
            .collect()
    }

    /// Lift rests into a BigUint.
    ///
    /// Aborts if the number of rests is different than the number of moduli in
    /// debug mode.
    pub fn lift(&self, rests: ArrayView1<u64>) -> BigUint {
        debug_assert_eq!(rests.len(), self.moduli_u64.len());

        let mut result = BigUint::zero();
        izip!(rests.iter(), self.garner.iter())
            .for_each(|(r_i, garner_i)| result += garner_i * *r_i);
        result % &self.product
    }

    /// Getter for the i-th garner coefficient.
    pub fn get_garner(&self, i: usize) -> Option<&BigUint> {
        self.garner.get(i)
    }

    /// Getter for Q / q_i.
    pub fn get_q_star(&self, i: usize) -> Option<&BigUint> {
        self.q_star.get(i)
    }

    pub(crate) fn q_tilde(&self) -> (&[u64], &[u64]) {
        (&self.q_tilde, &self.q_tilde_shoup)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::RnsContext;
    use ndarray::ArrayView1;
    use num_bigint::BigUint;
    use rand::{thread_rng, RngCore};

    #[test]
    fn constructor() {
        assert!(RnsContext::new(&[2]).is_ok());
        assert!(RnsContext::new(&[2, 3]).is_ok());
        assert!(RnsContext::new(&[4, 15, 1153]).is_err());
        assert!(RnsContext::new(&[1153, 1153]).is_err());

        let e = RnsContext::new(&[]);
        assert!(e.is_err());
        assert_eq!(
            e.unwrap_err(),
            crate::Error::Default("The list of moduli is empty".to_string())
        );
    }

    #[test]
    fn garner() -> Result<(), Box<dyn Error>> {
        let rns = RnsContext::new(&[4611686018326724609, 4611686018309947393, 1153])?;

        for i in 0..3 {
            let gi = rns.get_garner(i).unwrap();
            let mut rests = vec![0u64; 3];
            rests[i] = 1;
            let expected = rns.project(gi);
            assert_eq!(rns.lift(ArrayView1::from(&expected)), gi.clone() % rns.modulus());
            assert_eq!(rns.project(&rns.lift(ArrayView1::from(&rests))), rests);
        }
        assert!(rns.get_garner(3).is_none());

        Ok(())
    }

    #[test]
    fn project_lift() -> Result<(), Box<dyn Error>> {
        let ntests = 100;
        let rns = RnsContext::new(&[
            4611686018326724609,
            4611686018309947393,
            4611686018232352769,
        ])?;
        let product = BigUint::from(4611686018326724609u64)
            * BigUint::from(4611686018309947393u64)
            * BigUint::from(4611686018232352769u64);

        let mut rng = thread_rng();
        for _ in 0..ntests {
            let mut bytes = [0u8; 24];
            rng.fill_bytes(&mut bytes);
            let a = BigUint::from_bytes_le(&bytes) % &product;
            let rests = rns.project(&a);
            assert_eq!(rns.lift(ArrayView1::from(&rests)), a);
        }

        Ok(())
    }
}
