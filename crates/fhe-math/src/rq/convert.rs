//! Implementation of conversions from and to polynomials.

use super::{traits::TryConvertFrom, Context, Poly, Representation};
use crate::{Error, Result};
use ndarray::Array2;
use num_bigint::{BigInt, BigUint};
use num_traits::{Signed, ToPrimitive};
use std::sync::Arc;

impl TryConvertFrom<Array2<u64>> for Poly {
    fn try_convert_from<R>(
        a: Array2<u64>,
        ctx: &Arc<Context>,
        representation: R,
    ) -> Result<Self>
    where
        R: Into<Option<Representation>>,
    {
        let repr = representation
            .into()
            .ok_or_else(|| Error::Default("A representation needs to be specified".to_string()))?;
        if a.shape() != [ctx.q.len(), ctx.degree] {
            return Err(Error::Default(
                "The array of coefficients does not have the correct shape".to_string(),
            ));
        }
        if a
            .outer_iter()
            .zip(ctx.moduli.iter())
            .any(|(row, qi)| row.iter().any(|c| c >= qi))
        {
            return Err(Error::Default(
                "The coefficients are not reduced".to_string(),
            ));
        }
        Ok(Self {
            ctx: ctx.clone(),
            representation: repr,
            coefficients: a,
        })
    }
}

impl<'a> TryConvertFrom<&'a [i64]> for Poly {
    /// Convert signed coefficients in power basis; the polynomial is then
    /// changed to the requested representation (power basis by default).
    fn try_convert_from<R>(v: &'a [i64], ctx: &Arc<Context>, representation: R) -> Result<Self>
    where
        R: Into<Option<Representation>>,
    {
        if v.len() > ctx.degree {
            return Err(Error::Default(
                "The vector of coefficients is too long".to_string(),
            ));
        }
        let mut out = Poly::zero(ctx, Representation::PowerBasis);
        for (mut row, qi) in out.coefficients.outer_iter_mut().zip(ctx.q.iter()) {
            row.iter_mut()
                .zip(v)
                .for_each(|(c, vi)| *c = qi.reduce_i64(*vi));
        }
        out.change_representation(representation.into().unwrap_or_default());
        Ok(out)
    }
}

impl<'a> TryConvertFrom<&'a [BigInt]> for Poly {
    fn try_convert_from<R>(v: &'a [BigInt], ctx: &Arc<Context>, representation: R) -> Result<Self>
    where
        R: Into<Option<Representation>>,
    {
        if v.len() > ctx.degree {
            return Err(Error::Default(
                "The vector of coefficients is too long".to_string(),
            ));
        }
        let modulus = BigInt::from(ctx.modulus().clone());
        let mut out = Poly::zero(ctx, Representation::PowerBasis);
        for (j, vj) in v.iter().enumerate() {
            let mut vj = vj % &modulus;
            if vj.is_negative() {
                vj += &modulus;
            }
            let vj = vj
                .to_biguint()
                .ok_or_else(|| Error::Default("Conversion error".to_string()))?;
            for (i, r) in ctx.rns.project(&vj).into_iter().enumerate() {
                out.coefficients[[i, j]] = r;
            }
        }
        out.change_representation(representation.into().unwrap_or_default());
        Ok(out)
    }
}

impl From<&Poly> for Vec<BigUint> {
    fn from(p: &Poly) -> Self {
        let mut p = p.clone();
        p.change_representation(Representation::PowerBasis);
        p.coefficients
            .columns()
            .into_iter()
            .map(|column| p.ctx.rns.lift(column))
            .collect()
    }
}

impl Poly {
    /// Returns the coefficients lifted to integers in (-Q/2, Q/2].
    pub fn to_centered_bigints(&self) -> Vec<BigInt> {
        let modulus = BigInt::from(self.ctx.modulus().clone());
        let half = self.ctx.modulus() >> 1usize;
        Vec::<BigUint>::from(self)
            .into_iter()
            .map(|c| {
                if c > half {
                    BigInt::from(c) - &modulus
                } else {
                    BigInt::from(c)
                }
            })
            .collect()
    }

    /// Returns the largest absolute value of the centered coefficients, as a
    /// number of bits.
    pub fn infinity_norm_bits(&self) -> u64 {
        self.to_centered_bigints()
            .iter()
            .map(|c| c.abs().bits())
            .max()
            .unwrap_or_default()
    }

    /// Returns the centered coefficients as floating point values, which is
    /// lossy for values beyond 2^53.
    pub fn to_centered_f64(&self) -> Vec<f64> {
        self.to_centered_bigints()
            .iter()
            .map(|c| c.to_f64().unwrap_or(f64::NAN))
            .collect()
    }
}
