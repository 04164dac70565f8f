//! Key-switching keys for the CKKS encryption scheme
//!
//! A key-switching key from s' to s holds, for each decomposition digit j,
//! an encryption (b_j, a_j) over Q ∪ P of P·g_j·s', where g_j is 1 modulo
//! the primes of the digit and 0 modulo the other primes of Q. Switching a
//! polynomial d decomposes it into digits, extends each digit to Q_l ∪ P,
//! takes the inner product with the key and divides the result by P.

use crate::ckks::{parameters::KeySwitchParameters, CkksParameters, KeySwitchMethod, SecretKey};
use crate::proto::ckks::KeySwitchingKey as KeySwitchingKeyProto;
use crate::{Error, ParametersError, Result};
use fhe_math::rq::{traits::TryConvertFrom, Context, Poly, Representation};
use fhe_traits::{DeserializeWithContext, Serialize};
use itertools::Itertools;
use ndarray::Array2;
use rand::{CryptoRng, RngCore};
use rayon::prelude::*;
use std::sync::Arc;
use tracing::trace;
use zeroize::Zeroizing;

/// Key switching key for the CKKS encryption scheme.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct KeySwitchingKey {
    /// The CKKS parameters.
    pub(crate) par: Arc<CkksParameters>,

    /// The method for which the key was generated.
    pub(crate) method: KeySwitchMethod,

    /// The key switching elements c0.
    pub(crate) c0: Box<[Poly]>,

    /// The key switching elements c1.
    pub(crate) c1: Box<[Poly]>,
}

impl KeySwitchingKey {
    /// Generate a key switching key from `from` (a polynomial in Ntt
    /// representation at the first level) to the secret key `sk`.
    pub(crate) fn new<R: RngCore + CryptoRng>(
        sk: &SecretKey,
        from: &Poly,
        rng: &mut R,
    ) -> Result<Self> {
        let ctx_qp = Self::ctx_qp(&sk.par)?;
        let c1 = (0..sk.par.digits.len())
            .map(|_| Poly::random(ctx_qp, Representation::Ntt, rng))
            .collect_vec();
        Self::new_with_c1(sk, from, c1, rng)
    }

    /// Generate a key switching key using the provided polynomials as the
    /// elements c1, one per digit.
    pub(crate) fn new_with_c1<R: RngCore + CryptoRng>(
        sk: &SecretKey,
        from: &Poly,
        c1: Vec<Poly>,
        rng: &mut R,
    ) -> Result<Self> {
        let par = &sk.par;
        let ctx_qp = Self::ctx_qp(par)?;
        if c1.len() != par.digits.len() {
            return Err(Error::TooFewValues(c1.len(), par.digits.len()));
        }
        if c1
            .iter()
            .any(|a| a.ctx() != ctx_qp || a.representation() != &Representation::Ntt)
        {
            return Err(Error::MathError(fhe_math::Error::InvalidContext));
        }

        let s = sk.poly_at(ctx_qp)?;
        let c0 = c1
            .iter()
            .enumerate()
            .map(|(j, a)| -> Result<Poly> {
                let g = Zeroizing::new(Self::gadget(par, from, j)?);
                let a_s = Zeroizing::new(a * s.as_ref());
                let mut b = Poly::small(ctx_qp, Representation::Ntt, par.variance(), rng)?;
                b -= &a_s;
                b += &g;
                Ok(b)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            par: par.clone(),
            method: par.keyswitch_method(),
            c0: c0.into_boxed_slice(),
            c1: c1.into_boxed_slice(),
        })
    }

    /// Returns the polynomial over Q ∪ P equal to P·s' modulo the primes of
    /// digit `j`, and to 0 modulo every other prime.
    pub(crate) fn gadget(par: &CkksParameters, from: &Poly, j: usize) -> Result<Poly> {
        let ctx_qp = Self::ctx_qp(par)?;
        if from.ctx() != &par.ctx[0] || from.representation() != &Representation::Ntt {
            return Err(Error::MathError(fhe_math::Error::InvalidContext));
        }
        let mut coefficients = Array2::zeros((ctx_qp.moduli().len(), par.degree()));
        for i in par.digits[j].clone() {
            let qi = &ctx_qp.moduli_operators()[i];
            let mut row = from.coefficients().row(i).to_vec();
            qi.scalar_mul_vec(&mut row, par.p_mod_q[i]);
            coefficients
                .row_mut(i)
                .iter_mut()
                .zip(row)
                .for_each(|(c, v)| *c = v);
        }
        Ok(Poly::try_convert_from(
            coefficients,
            ctx_qp,
            Representation::Ntt,
        )?)
    }

    pub(crate) fn ctx_qp(par: &CkksParameters) -> Result<&Arc<Context>> {
        par.ctx_qp.as_ref().ok_or_else(|| {
            Error::ParametersError(ParametersError::InvalidKeySwitchMethod(
                "no special moduli were specified".to_string(),
            ))
        })
    }

    /// Returns the method for which the key was generated.
    pub fn method(&self) -> KeySwitchMethod {
        self.method
    }

    /// Key switch a polynomial at any level, returning (k0, k1) in Ntt
    /// representation such that k0 + k1·s ≈ d·s'.
    pub(crate) fn key_switch(&self, d: &Poly) -> Result<(Poly, Poly)> {
        if self.method != self.par.keyswitch_method() {
            return Err(Error::KeySwitchMethodMismatch(
                self.method.to_string(),
                self.par.keyswitch_method().to_string(),
            ));
        }
        let level = self.par.level_of_ctx(d.ctx())?;
        let ks = self.par.key_switch_at(level)?;
        trace!(
            level,
            digits = ks.digit_ctx.len(),
            method = %self.method,
            "key switching"
        );

        let mut d = d.clone();
        d.change_representation(Representation::PowerBasis);

        // The digits are extended and multiplied in parallel.
        let products = (0..ks.digit_ctx.len())
            .into_par_iter()
            .map(|j| -> Result<(Poly, Poly)> {
                let mut dj = d
                    .select_moduli(&ks.digit_rows[j], &ks.digit_ctx[j])?
                    .convert_basis(&ks.extenders[j], &ks.ctx_qp)?;
                dj.change_representation(Representation::Ntt);
                let mut t0 = self.c0[j].select_moduli(&ks.key_rows, &ks.ctx_qp)?;
                t0 *= &dj;
                let mut t1 = self.c1[j].select_moduli(&ks.key_rows, &ks.ctx_qp)?;
                t1 *= &dj;
                Ok((t0, t1))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut acc0 = Poly::zero(&ks.ctx_qp, Representation::Ntt);
        let mut acc1 = Poly::zero(&ks.ctx_qp, Representation::Ntt);
        for (t0, t1) in &products {
            acc0 += t0;
            acc1 += t1;
        }

        Ok((
            Self::mod_down(ks, acc0, d.ctx())?,
            Self::mod_down(ks, acc1, d.ctx())?,
        ))
    }

    /// Divide a polynomial over Q_l ∪ P by P and round, returning a
    /// polynomial in Ntt representation over Q_l.
    fn mod_down(ks: &KeySwitchParameters, mut x: Poly, ctx: &Arc<Context>) -> Result<Poly> {
        x.change_representation(Representation::PowerBasis);
        let q_count = ctx.moduli().len();
        let p_count = ks.ctx_p.moduli().len();
        let q_rows = (0..q_count).collect_vec();
        let p_rows = (q_count..q_count + p_count).collect_vec();

        let mut x_q = x.select_moduli(&q_rows, ctx)?;
        let x_p = x
            .select_moduli(&p_rows, &ks.ctx_p)?
            .convert_basis(&ks.mod_down, ctx)?;
        x_q -= &x_p;
        x_q.mul_scalar_rns(&ks.p_inv);
        x_q.change_representation(Representation::Ntt);
        Ok(x_q)
    }
}

impl From<&KeySwitchingKey> for KeySwitchingKeyProto {
    fn from(value: &KeySwitchingKey) -> Self {
        KeySwitchingKeyProto {
            c0: value.c0.iter().map(|p| p.to_bytes()).collect(),
            c1: value.c1.iter().map(|p| p.to_bytes()).collect(),
            method: value.method.to_u32(),
        }
    }
}

impl crate::ckks::traits::TryConvertFrom<&KeySwitchingKeyProto> for KeySwitchingKey {
    fn try_convert_from(value: &KeySwitchingKeyProto, par: &Arc<CkksParameters>) -> Result<Self> {
        let ctx_qp = Self::ctx_qp(par).map_err(|_| Error::SerializationError)?;
        let method = KeySwitchMethod::try_from_u32(value.method)?;
        if value.c0.len() != par.digits.len() || value.c1.len() != par.digits.len() {
            return Err(Error::SerializationError);
        }
        let parse = |polys: &[Vec<u8>]| -> Result<Box<[Poly]>> {
            polys
                .iter()
                .map(|bytes| {
                    let p = Poly::from_bytes(bytes, ctx_qp).map_err(|_| Error::SerializationError)?;
                    if p.representation() != &Representation::Ntt {
                        return Err(Error::SerializationError);
                    }
                    Ok(p)
                })
                .collect()
        };
        Ok(Self {
            par: par.clone(),
            method,
            c0: parse(&value.c0)?,
            c1: parse(&value.c1)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::KeySwitchingKey;
    use crate::ckks::{
        traits::TryConvertFrom, CkksParameters, CkksParametersBuilder, KeySwitchMethod,
        SecretKey, SecurityLevel,
    };
    use crate::proto::ckks::KeySwitchingKey as KeySwitchingKeyProto;
    use crate::Error;
    use fhe_math::rq::{Poly, Representation};
    use rand::thread_rng;
    use std::error::Error as StdError;
    use std::sync::Arc;

    fn parameters(method: KeySwitchMethod) -> Result<Arc<CkksParameters>, Box<dyn StdError>> {
        Ok(CkksParametersBuilder::new()
            .set_degree(16)
            .set_moduli_sizes(&[50, 40, 40, 40])
            .set_special_moduli_sizes(&[60, 60])
            .set_keyswitch_method(method)
            .set_security_level(SecurityLevel::None)
            .build_arc()?)
    }

    #[test]
    fn key_switch() -> Result<(), Box<dyn StdError>> {
        let mut rng = thread_rng();
        for method in [KeySwitchMethod::II, KeySwitchMethod::III] {
            let par = parameters(method)?;
            let sk = SecretKey::random(&par, 0, &mut rng)?;
            let from = Poly::small(&par.ctx[0], Representation::Ntt, 1, &mut rng)?;
            let ksk = KeySwitchingKey::new(&sk, &from, &mut rng)?;
            assert_eq!(ksk.method(), method);

            for level in 0..=par.max_level() {
                let ctx = par.ctx_at_level(level)?;
                let d = Poly::random(ctx, Representation::Ntt, &mut rng);
                let (k0, k1) = ksk.key_switch(&d)?;

                // k0 + k1·s − d·from is small.
                let s = sk.poly_at(ctx)?;
                let mut from_l = from.clone();
                from_l.drop_to(ctx)?;
                let mut e = &k1 * s.as_ref();
                e += &k0;
                e -= &(&d * &from_l);
                e.change_representation(Representation::PowerBasis);
                assert!(e.infinity_norm_bits() < 30);
            }
        }
        Ok(())
    }

    #[test]
    fn method_mismatch() -> Result<(), Box<dyn StdError>> {
        let mut rng = thread_rng();
        let par = parameters(KeySwitchMethod::II)?;
        let sk = SecretKey::random(&par, 0, &mut rng)?;
        let from = Poly::small(&par.ctx[0], Representation::Ntt, 1, &mut rng)?;
        let mut ksk = KeySwitchingKey::new(&sk, &from, &mut rng)?;
        ksk.method = KeySwitchMethod::III;
        let d = Poly::random(&par.ctx[0], Representation::Ntt, &mut rng);
        assert_eq!(
            ksk.key_switch(&d).unwrap_err(),
            Error::KeySwitchMethodMismatch("method III".to_string(), "method II".to_string())
        );
        Ok(())
    }

    #[test]
    fn proto_conversion() -> Result<(), Box<dyn StdError>> {
        let mut rng = thread_rng();
        let par = parameters(KeySwitchMethod::III)?;
        let sk = SecretKey::random(&par, 0, &mut rng)?;
        let from = Poly::small(&par.ctx[0], Representation::Ntt, 1, &mut rng)?;
        let ksk = KeySwitchingKey::new(&sk, &from, &mut rng)?;
        let proto = KeySwitchingKeyProto::from(&ksk);
        assert_eq!(KeySwitchingKey::try_convert_from(&proto, &par)?, ksk);
        Ok(())
    }
}
