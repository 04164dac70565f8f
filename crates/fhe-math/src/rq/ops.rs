//! Implementation of operations over polynomials.

use super::{Poly, Representation};
use itertools::izip;
use num_bigint::BigUint;
use std::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};

impl AddAssign<&Poly> for Poly {
    fn add_assign(&mut self, p: &Poly) {
        assert_eq!(self.ctx, p.ctx, "Incompatible contexts");
        assert_eq!(
            self.representation, p.representation,
            "Incompatible representations"
        );
        let q = self.ctx.q.clone();
        let other = p.coefficients.as_standard_layout();
        let degree = self.ctx.degree;
        if let Some(other) = other.as_slice() {
            self.for_each_limb(|i, row| {
                q[i].add_vec(row, &other[i * degree..(i + 1) * degree])
            });
        }
    }
}

impl Add<&Poly> for &Poly {
    type Output = Poly;
    fn add(self, p: &Poly) -> Poly {
        let mut q = self.clone();
        q += p;
        q
    }
}

impl Add for Poly {
    type Output = Poly;
    fn add(mut self, p: Poly) -> Poly {
        self += &p;
        self
    }
}

impl SubAssign<&Poly> for Poly {
    fn sub_assign(&mut self, p: &Poly) {
        assert_eq!(self.ctx, p.ctx, "Incompatible contexts");
        assert_eq!(
            self.representation, p.representation,
            "Incompatible representations"
        );
        let q = self.ctx.q.clone();
        let other = p.coefficients.as_standard_layout();
        let degree = self.ctx.degree;
        if let Some(other) = other.as_slice() {
            self.for_each_limb(|i, row| {
                q[i].sub_vec(row, &other[i * degree..(i + 1) * degree])
            });
        }
    }
}

impl Sub<&Poly> for &Poly {
    type Output = Poly;
    fn sub(self, p: &Poly) -> Poly {
        let mut q = self.clone();
        q -= p;
        q
    }
}

impl MulAssign<&Poly> for Poly {
    fn mul_assign(&mut self, p: &Poly) {
        assert_eq!(self.ctx, p.ctx, "Incompatible contexts");
        assert_eq!(
            self.representation,
            Representation::Ntt,
            "Multiplication requires an Ntt representation."
        );
        assert_eq!(
            p.representation,
            Representation::Ntt,
            "Multiplication requires an Ntt representation."
        );
        let q = self.ctx.q.clone();
        let other = p.coefficients.as_standard_layout();
        let degree = self.ctx.degree;
        if let Some(other) = other.as_slice() {
            self.for_each_limb(|i, row| {
                q[i].mul_vec(row, &other[i * degree..(i + 1) * degree])
            });
        }
    }
}

impl MulAssign<&BigUint> for Poly {
    fn mul_assign(&mut self, p: &BigUint) {
        let scalars = self.ctx.rns.project(p);
        self.mul_scalar_rns(&scalars);
    }
}

impl Mul<&Poly> for &Poly {
    type Output = Poly;
    fn mul(self, p: &Poly) -> Poly {
        let mut q = self.clone();
        q *= p;
        q
    }
}

impl Mul<&BigUint> for &Poly {
    type Output = Poly;
    fn mul(self, p: &BigUint) -> Poly {
        let mut q = self.clone();
        q *= p;
        q
    }
}

impl Neg for &Poly {
    type Output = Poly;

    fn neg(self) -> Poly {
        let mut out = self.clone();
        let q = self.ctx.q.clone();
        out.for_each_limb(|i, row| q[i].neg_vec(row));
        out
    }
}

impl Neg for Poly {
    type Output = Poly;

    fn neg(mut self) -> Poly {
        let q = self.ctx.q.clone();
        self.for_each_limb(|i, row| q[i].neg_vec(row));
        self
    }
}

/// Computes the sum of the products `p[i] * q[i]` of polynomials in Ntt
/// representation. Returns None when the iterators are empty.
pub fn dot_product<'a, I, J>(p: I, q: J) -> Option<Poly>
where
    I: Iterator<Item = &'a Poly>,
    J: Iterator<Item = &'a Poly>,
{
    let mut out: Option<Poly> = None;
    for (pi, qi) in izip!(p, q) {
        let prod = pi * qi;
        match out.as_mut() {
            Some(acc) => *acc += &prod,
            None => out = Some(prod),
        }
    }
    out
}
