#![warn(missing_docs, unused_imports)]

//! Polynomials in R_q\[x\] = (ZZ_q1 x ... x ZZ_qn)\[x\] where the qi's are
//! prime moduli in zq.

mod context;
mod convert;
mod ops;
mod serialize;

pub mod normal;
pub mod traits;

pub use context::Context;
pub use ops::dot_product;

use crate::{rns::BaseConverter, Error, Result};
use ndarray::{s, Array2, ArrayView2, Axis};
use rand::{CryptoRng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::sync::Arc;
use traits::TryConvertFrom;
use zeroize::Zeroize;

/// Possible representations of the underlying polynomial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Representation {
    /// This is the list of coefficients ci, such that the polynomial is c0 + c1
    /// * x + ... + c_(degree - 1) * x^(degree - 1)
    #[default]
    PowerBasis,
    /// This is the NTT representation of the PowerBasis representation.
    Ntt,
}

/// An exponent for a substitution x -> x^k.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct SubstitutionExponent {
    /// The value of the exponent, reduced modulo 2 * degree.
    pub exponent: usize,
    degree: usize,
}

impl SubstitutionExponent {
    /// Creates a substitution element from an exponent.
    /// Returns an error if the exponent is even modulo 2 * degree.
    pub fn new(ctx: &Arc<Context>, exponent: usize) -> Result<Self> {
        let exponent = exponent % (2 * ctx.degree);
        if exponent & 1 == 0 {
            return Err(Error::Default(
                "The exponent should be odd modulo 2 * degree".to_string(),
            ));
        }
        Ok(Self {
            exponent,
            degree: ctx.degree,
        })
    }
}

/// Struct that holds a polynomial for a specific context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Poly {
    ctx: Arc<Context>,
    representation: Representation,
    coefficients: Array2<u64>,
}

impl Zeroize for Poly {
    fn zeroize(&mut self) {
        self.coefficients.iter_mut().for_each(|c| c.zeroize());
    }
}

impl AsRef<Poly> for Poly {
    fn as_ref(&self) -> &Poly {
        self
    }
}

impl AsMut<Poly> for Poly {
    fn as_mut(&mut self) -> &mut Poly {
        self
    }
}

impl Poly {
    /// Creates a polynomial holding the constant 0.
    pub fn zero(ctx: &Arc<Context>, representation: Representation) -> Self {
        Self {
            ctx: ctx.clone(),
            representation,
            coefficients: Array2::zeros((ctx.q.len(), ctx.degree)),
        }
    }

    /// Returns the context of the polynomial.
    pub fn ctx(&self) -> &Arc<Context> {
        &self.ctx
    }

    /// Returns the current representation of the polynomial.
    pub const fn representation(&self) -> &Representation {
        &self.representation
    }

    /// Returns a view of the coefficients, one row per modulus.
    pub fn coefficients(&self) -> ArrayView2<u64> {
        self.coefficients.view()
    }

    /// Apply `f` to every residue polynomial, in parallel.
    fn for_each_limb<F>(&mut self, f: F)
    where
        F: Fn(usize, &mut [u64]) + Send + Sync,
    {
        let degree = self.ctx.degree;
        if !self.coefficients.is_standard_layout() {
            self.coefficients = self.coefficients.as_standard_layout().into_owned();
        }
        if let Some(slice) = self.coefficients.as_slice_mut() {
            slice
                .par_chunks_mut(degree)
                .enumerate()
                .for_each(|(i, row)| f(i, row));
        }
    }

    /// Change the representation of the underlying polynomial.
    pub fn change_representation(&mut self, to: Representation) {
        match (self.representation, to) {
            (Representation::PowerBasis, Representation::Ntt) => {
                let ops = self.ctx.ops.clone();
                self.for_each_limb(|i, row| ops[i].forward(row));
            }
            (Representation::Ntt, Representation::PowerBasis) => {
                let ops = self.ctx.ops.clone();
                self.for_each_limb(|i, row| ops[i].backward(row));
            }
            _ => {}
        }
        self.representation = to;
    }

    /// Generate a random polynomial.
    pub fn random<R: RngCore + CryptoRng>(
        ctx: &Arc<Context>,
        representation: Representation,
        rng: &mut R,
    ) -> Self {
        let mut p = Poly::zero(ctx, representation);
        for (mut row, qi) in p.coefficients.outer_iter_mut().zip(ctx.q.iter()) {
            let values = qi.random_vec(ctx.degree, rng);
            row.iter_mut().zip(values).for_each(|(c, v)| *c = v);
        }
        p
    }

    /// Generate a random polynomial deterministically from a seed.
    pub fn random_from_seed(
        ctx: &Arc<Context>,
        representation: Representation,
        seed: <ChaCha8Rng as SeedableRng>::Seed,
    ) -> Self {
        let mut rng = ChaCha8Rng::from_seed(seed);
        Self::random(ctx, representation, &mut rng)
    }

    /// Generate a small polynomial with coefficients sampled from a centered
    /// binomial distribution of the given variance.
    ///
    /// Returns an error if the variance does not belong to [1, ..., 16].
    pub fn small<R: RngCore + CryptoRng>(
        ctx: &Arc<Context>,
        representation: Representation,
        variance: usize,
        rng: &mut R,
    ) -> Result<Self> {
        let coeffs = fhe_util::sample_vec_cbd(ctx.degree, variance, rng)
            .map_err(|e| Error::Default(e.to_string()))?;
        let mut p = Poly::try_convert_from(coeffs.as_slice(), ctx, Representation::PowerBasis)?;
        p.change_representation(representation);
        Ok(p)
    }

    /// Substitute x by x^k in a polynomial.
    pub fn substitute(&self, i: &SubstitutionExponent) -> Result<Poly> {
        if i.degree != self.ctx.degree {
            return Err(Error::Default(
                "The substitution exponent does not match the degree".to_string(),
            ));
        }
        let mut source = self.clone();
        source.change_representation(Representation::PowerBasis);

        let degree = self.ctx.degree;
        let mut q = Poly::zero(&self.ctx, Representation::PowerBasis);
        for ((src, mut dst), qi) in source
            .coefficients
            .outer_iter()
            .zip(q.coefficients.outer_iter_mut())
            .zip(self.ctx.q.iter())
        {
            let mut power = 0usize;
            for c in src.iter() {
                if power < degree {
                    dst[power] = *c;
                } else {
                    dst[power - degree] = qi.neg(*c);
                }
                power = (power + i.exponent) % (2 * degree);
            }
        }
        q.change_representation(self.representation);
        Ok(q)
    }

    /// Multiply a polynomial by the monomial x^power, for power < 2 * degree.
    pub fn multiply_by_monomial(&mut self, power: usize) -> Result<()> {
        let degree = self.ctx.degree;
        if power >= 2 * degree {
            return Err(Error::Default(
                "The power should be smaller than 2 * degree".to_string(),
            ));
        }
        match self.representation {
            Representation::PowerBasis => {
                let q = self.ctx.q.clone();
                self.for_each_limb(|i, row| {
                    let mut out = vec![0u64; degree];
                    for (j, c) in row.iter().enumerate() {
                        let k = (j + power) % (2 * degree);
                        if k < degree {
                            out[k] = *c;
                        } else {
                            out[k - degree] = q[i].neg(*c);
                        }
                    }
                    row.copy_from_slice(&out);
                });
            }
            Representation::Ntt => {
                let mut monomial = Poly::zero(&self.ctx, Representation::PowerBasis);
                for (mut row, qi) in monomial.coefficients.outer_iter_mut().zip(self.ctx.q.iter()) {
                    if power < degree {
                        row[power] = 1;
                    } else {
                        row[power - degree] = qi.neg(1);
                    }
                }
                monomial.change_representation(Representation::Ntt);
                *self *= &monomial;
            }
        }
        Ok(())
    }

    /// Multiply every residue polynomial by the corresponding scalar.
    ///
    /// Aborts if the number of scalars differs from the number of moduli.
    pub fn mul_scalar_rns(&mut self, scalars: &[u64]) {
        assert_eq!(scalars.len(), self.ctx.q.len());
        let q = self.ctx.q.clone();
        self.for_each_limb(|i, row| q[i].scalar_mul_vec(row, q[i].reduce(scalars[i])));
    }

    /// Divide the polynomial by the last modulus and round, switching to the
    /// next context in the chain.
    pub fn mod_switch_down_next(&mut self) -> Result<()> {
        let next = self
            .ctx
            .next_context
            .clone()
            .ok_or(Error::NoMoreContext)?;

        let last_index = self.ctx.q.len() - 1;
        let q_last = self.ctx.moduli[last_index];
        let half = q_last >> 1;
        let mut last = self.coefficients.row(last_index).to_vec();
        if self.representation == Representation::Ntt {
            self.ctx.ops[last_index].backward(&mut last);
        }

        let ctx = self.ctx.clone();
        let representation = self.representation;
        let mut coefficients = self.coefficients.slice(s![..last_index, ..]).to_owned();
        if let Some(slice) = coefficients.as_slice_mut() {
            slice
                .par_chunks_mut(ctx.degree)
                .enumerate()
                .for_each(|(i, row)| {
                    let qi = &ctx.q[i];
                    let mut t = last
                        .iter()
                        .map(|c| {
                            if *c > half {
                                qi.neg(qi.reduce(q_last - *c))
                            } else {
                                qi.reduce(*c)
                            }
                        })
                        .collect::<Vec<_>>();
                    if representation == Representation::Ntt {
                        ctx.ops[i].forward(&mut t);
                    }
                    qi.sub_vec(row, &t);
                    let (inv, inv_shoup) =
                        (ctx.inv_last_qi_mod_qj[i], ctx.inv_last_qi_mod_qj_shoup[i]);
                    row.iter_mut()
                        .for_each(|r| *r = qi.mul_shoup(*r, inv, inv_shoup));
                });
        }

        self.coefficients = coefficients;
        self.ctx = next;
        Ok(())
    }

    /// Rescale down to a descendant context.
    pub fn mod_switch_down_to(&mut self, context: &Arc<Context>) -> Result<()> {
        let niterations = self.ctx.niterations_to(context)?;
        for _ in 0..niterations {
            self.mod_switch_down_next()?;
        }
        debug_assert_eq!(&self.ctx, context);
        Ok(())
    }

    /// Remove the last modulus without rescaling.
    pub fn drop_last_modulus(&mut self) -> Result<()> {
        let next = self
            .ctx
            .next_context
            .clone()
            .ok_or(Error::NoMoreContext)?;
        let last_index = self.ctx.q.len() - 1;
        self.coefficients = self.coefficients.slice(s![..last_index, ..]).to_owned();
        self.ctx = next;
        Ok(())
    }

    /// Remove moduli without rescaling, down to a descendant context.
    pub fn drop_to(&mut self, context: &Arc<Context>) -> Result<()> {
        let niterations = self.ctx.niterations_to(context)?;
        if niterations > 0 {
            let rows = context.q.len();
            self.coefficients = self.coefficients.slice(s![..rows, ..]).to_owned();
            self.ctx = context.clone();
        }
        Ok(())
    }

    /// Select the residues at `indices` to form a polynomial in `ctx`.
    ///
    /// Returns an error if the selected moduli do not match the moduli of
    /// `ctx`.
    pub fn select_moduli(&self, indices: &[usize], ctx: &Arc<Context>) -> Result<Poly> {
        if indices.len() != ctx.q.len()
            || indices
                .iter()
                .zip(ctx.moduli.iter())
                .any(|(i, qi)| self.ctx.moduli.get(*i) != Some(qi))
            || ctx.degree != self.ctx.degree
        {
            return Err(Error::InvalidContext);
        }
        Ok(Poly {
            ctx: ctx.clone(),
            representation: self.representation,
            coefficients: self.coefficients.select(Axis(0), indices),
        })
    }

    /// Convert a polynomial in power basis to the basis of `ctx` using a
    /// (centered) fast base conversion.
    pub fn convert_basis(&self, converter: &BaseConverter, ctx: &Arc<Context>) -> Result<Poly> {
        if self.representation != Representation::PowerBasis {
            return Err(Error::IncorrectRepresentation(
                self.representation,
                Representation::PowerBasis,
            ));
        }
        if converter.from_context().moduli() != self.ctx.moduli()
            || converter.to_context().moduli() != ctx.moduli()
        {
            return Err(Error::InvalidContext);
        }
        Ok(Poly {
            ctx: ctx.clone(),
            representation: Representation::PowerBasis,
            coefficients: converter.convert(self.coefficients.view()),
        })
    }
}
