use itertools::Itertools;
use num_bigint::BigUint;
use std::{fmt::Debug, sync::Arc};

use crate::{ntt::NttOperator, rns::RnsContext, zq::Modulus, Error, Result};

/// Struct that holds the context associated with elements in rq.
///
/// A context built with [`Context::new`] carries the whole modulus chain:
/// `next_context` points to the context with the last modulus removed.
#[derive(Clone)]
pub struct Context {
    /// List of prime moduli
    pub moduli: Box<[u64]>,
    /// Modulus operators for each prime
    pub q: Box<[Modulus]>,
    /// RNS context for CRT operations
    pub rns: Arc<RnsContext>,
    /// NTT operators for each prime, shared with the other contexts built on
    /// the same primes
    pub ops: Box<[Arc<NttOperator>]>,
    /// Polynomial degree (must be power of 2)
    pub degree: usize,
    /// Inverse of last qi modulo qj for modulus switching
    pub inv_last_qi_mod_qj: Box<[u64]>,
    /// Shoup representation of inv_last_qi_mod_qj
    pub inv_last_qi_mod_qj_shoup: Box<[u64]>,
    /// Link to context with one less modulus (for level management)
    pub next_context: Option<Arc<Context>>,
}

impl Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("moduli", &self.moduli)
            .field("degree", &self.degree)
            .finish()
    }
}

impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        self.degree == other.degree && self.moduli == other.moduli
    }
}

impl Eq for Context {}

impl Context {
    /// Creates a context from a list of moduli and a polynomial degree.
    ///
    /// Returns an error if the moduli are not primes less than 62 bits which
    /// supports the NTT of size `degree`.
    pub fn new(moduli: &[u64], degree: usize) -> Result<Self> {
        let ops = Self::operators(moduli, degree)?;
        Self::from_operators(&ops, degree, true)
    }

    /// Creates a context in an `Arc`.
    pub fn new_arc(moduli: &[u64], degree: usize) -> Result<Arc<Self>> {
        Self::new(moduli, degree).map(Arc::new)
    }

    /// Creates a context without modulus chain from existing NTT operators.
    ///
    /// This is used to assemble extended bases (such as Q ∪ P) without
    /// recomputing the NTT tables.
    pub fn single_level(ops: &[Arc<NttOperator>], degree: usize) -> Result<Self> {
        if ops.iter().any(|op| op.size() != degree) {
            return Err(Error::Default(
                "The NTT operators do not match the degree".to_string(),
            ));
        }
        Self::from_operators(ops, degree, false)
    }

    /// Build the NTT operators for a list of moduli.
    pub fn operators(moduli: &[u64], degree: usize) -> Result<Vec<Arc<NttOperator>>> {
        if !degree.is_power_of_two() || degree < 8 {
            return Err(Error::Default(
                "The degree is not a power of two larger or equal to 8".to_string(),
            ));
        }
        moduli
            .iter()
            .map(|modulus| {
                let qi = Modulus::new(*modulus)?;
                NttOperator::new(&qi, degree).map(Arc::new).ok_or_else(|| {
                    Error::Default("Impossible to construct a Ntt operator".to_string())
                })
            })
            .collect()
    }

    fn from_operators(ops: &[Arc<NttOperator>], degree: usize, chain: bool) -> Result<Self> {
        if ops.is_empty() {
            return Err(Error::Default("The list of moduli is empty".to_string()));
        }

        let moduli = ops.iter().map(|op| op.modulus().modulus()).collect_vec();
        let q = ops.iter().map(|op| op.modulus().clone()).collect_vec();
        let rns = Arc::new(RnsContext::new(&moduli)?);

        let mut inv_last_qi_mod_qj = vec![];
        let mut inv_last_qi_mod_qj_shoup = vec![];
        let q_last = moduli[moduli.len() - 1];
        for qi in &q[..q.len() - 1] {
            let inv = qi
                .inv(qi.reduce(q_last))
                .ok_or(Error::InvalidModulus(qi.modulus()))?;
            inv_last_qi_mod_qj.push(inv);
            inv_last_qi_mod_qj_shoup.push(qi.shoup(inv));
        }

        let next_context = if chain && ops.len() >= 2 {
            Some(Arc::new(Self::from_operators(
                &ops[..ops.len() - 1],
                degree,
                true,
            )?))
        } else {
            None
        };

        Ok(Self {
            moduli: moduli.into_boxed_slice(),
            q: q.into_boxed_slice(),
            rns,
            ops: ops.to_vec().into_boxed_slice(),
            degree,
            inv_last_qi_mod_qj: inv_last_qi_mod_qj.into_boxed_slice(),
            inv_last_qi_mod_qj_shoup: inv_last_qi_mod_qj_shoup.into_boxed_slice(),
            next_context,
        })
    }

    /// Returns the modulus as a BigUint.
    pub fn modulus(&self) -> &BigUint {
        self.rns.modulus()
    }

    /// Returns a reference to the moduli in this context.
    pub fn moduli(&self) -> &[u64] {
        &self.moduli
    }

    /// Returns a reference to the moduli as Modulus in this context.
    pub fn moduli_operators(&self) -> &[Modulus] {
        &self.q
    }

    /// Returns the degree of the polynomials.
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Returns the number of iterations to switch to a children context.
    /// Returns an error if the context provided is not a child context.
    pub fn niterations_to(&self, context: &Arc<Context>) -> Result<usize> {
        if context.as_ref() == self {
            return Ok(0);
        }

        let mut niterations = 0;
        let mut current_ctx = self.next_context.as_ref();
        while let Some(ctx) = current_ctx {
            niterations += 1;
            if ctx == context {
                return Ok(niterations);
            }
            current_ctx = ctx.next_context.as_ref();
        }
        Err(Error::InvalidContext)
    }

    /// Returns the context after `i` iterations.
    pub fn context_at_level(self: &Arc<Self>, i: usize) -> Result<Arc<Self>> {
        let mut current_ctx = self.clone();
        for _ in 0..i {
            current_ctx = current_ctx
                .next_context
                .clone()
                .ok_or(Error::NoMoreContext)?;
        }
        Ok(current_ctx)
    }
}

#[cfg(test)]
mod tests {
    use std::{error::Error, sync::Arc};

    use crate::ntt::supports_ntt;
    use crate::rq::Context;

    const MODULI: &[u64; 5] = &[
        1153,
        4611686018326724609,
        4611686018309947393,
        4611686018232352769,
        4611686018171535361,
    ];

    #[test]
    fn context_constructor() {
        for modulus in MODULI {
            // modulus is = 1 modulo 2 * 8
            assert!(Context::new(&[*modulus], 8).is_ok());

            if supports_ntt(*modulus, 128) {
                assert!(Context::new(&[*modulus], 128).is_ok());
            } else {
                assert!(Context::new(&[*modulus], 128).is_err());
            }
        }

        // All moduli in MODULI are = 1 modulo 2 * 8
        assert!(Context::new(MODULI, 8).is_ok());

        // This should fail since 1153 != 1 moduli 2 * 128
        assert!(Context::new(MODULI, 128).is_err());

        assert!(Context::new(MODULI, 12).is_err());
        assert!(Context::new(&[], 8).is_err());
    }

    #[test]
    fn next_context() -> Result<(), Box<dyn Error>> {
        // A context should have a children pointing to a context with one less modulus.
        let context = Arc::new(Context::new(MODULI, 8)?);
        assert_eq!(
            context.next_context,
            Some(Arc::new(Context::new(&MODULI[..MODULI.len() - 1], 8)?))
        );

        // We can go down the chain of the MODULI.len() - 1 context's.
        let mut number_of_children = 0;
        let mut current = context;
        while let Some(next) = current.next_context.clone() {
            number_of_children += 1;
            current = next;
        }
        assert_eq!(number_of_children, MODULI.len() - 1);

        Ok(())
    }

    #[test]
    fn niterations_to() -> Result<(), Box<dyn Error>> {
        let context = Arc::new(Context::new(MODULI, 8)?);

        assert_eq!(context.niterations_to(&context).ok(), Some(0));

        assert_eq!(
            context
                .niterations_to(&Arc::new(Context::new(&MODULI[1..], 8)?))
                .err(),
            Some(crate::Error::InvalidContext)
        );

        for i in 1..MODULI.len() {
            let child = Arc::new(Context::new(&MODULI[..MODULI.len() - i], 8)?);
            assert_eq!(context.niterations_to(&child).ok(), Some(i));
            assert_eq!(context.context_at_level(i)?, child);
        }
        assert!(context.context_at_level(MODULI.len()).is_err());

        Ok(())
    }

    #[test]
    fn single_level_shares_operators() -> Result<(), Box<dyn Error>> {
        let context = Context::new(&MODULI[1..], 16)?;
        let extended = Context::single_level(&context.ops[..2], 16)?;
        assert!(extended.next_context.is_none());
        assert_eq!(extended.moduli(), &MODULI[1..3]);
        assert!(Arc::ptr_eq(&extended.ops[0], &context.ops[0]));
        assert!(Context::single_level(&context.ops, 32).is_err());

        Ok(())
    }
}
