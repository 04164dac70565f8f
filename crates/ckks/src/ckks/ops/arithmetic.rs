use std::borrow::Cow;
use std::sync::Arc;

use num_complex::Complex64;
use tracing::trace;

use crate::ckks::{
    Ciphertext, CkksParameters, Encoder, ExecutionOptions, GaloisKey, Plaintext,
    RelinearizationKey, Storage,
};
use crate::{Error, Result};

use super::scales_match;

/// Evaluator of the homomorphic arithmetic of the CKKS encryption scheme.
///
/// Binary operations accept operands at different levels: the operand at the
/// higher level is first brought down to the lower one. Additions require the
/// scales of their operands to agree.
#[derive(Debug, Clone)]
pub struct ArithmeticOperator {
    par: Arc<CkksParameters>,
    encoder: Encoder,
    options: ExecutionOptions,
}

impl ArithmeticOperator {
    /// Create an operator with the default execution options.
    pub fn new(par: &Arc<CkksParameters>) -> Self {
        Self::with_options(par, ExecutionOptions::default())
    }

    /// Create an operator with the given execution options.
    pub fn with_options(par: &Arc<CkksParameters>, options: ExecutionOptions) -> Self {
        Self {
            par: par.clone(),
            encoder: Encoder::new(par),
            options,
        }
    }

    /// Returns the execution options.
    pub fn options(&self) -> ExecutionOptions {
        self.options
    }

    /// Set the execution options.
    pub fn set_options(&mut self, options: ExecutionOptions) {
        self.options = options;
    }

    fn check(&self, par: &Arc<CkksParameters>) -> Result<()> {
        if par != &self.par {
            Err(Error::ContextMismatch)
        } else {
            Ok(())
        }
    }

    /// Ciphertexts have at least the two elements c0 and c1.
    fn check_size(ct: &Ciphertext) -> Result<()> {
        if ct.c.len() < 2 {
            Err(Error::TooFewValues(ct.c.len(), 2))
        } else {
            Ok(())
        }
    }

    fn check_scales(a: f64, b: f64) -> Result<()> {
        if scales_match(a, b) {
            Ok(())
        } else {
            Err(Error::scale_mismatch(a, b))
        }
    }

    /// Returns the ciphertext dropped to `level` if it is above it.
    fn aligned(ct: &Ciphertext, level: usize) -> Result<Cow<'_, Ciphertext>> {
        if ct.level < level {
            let mut ct = ct.clone();
            ct.mod_drop_to_level(level)?;
            Ok(Cow::Owned(ct))
        } else {
            Ok(Cow::Borrowed(ct))
        }
    }

    fn aligned_plain(pt: &Plaintext, level: usize) -> Result<Cow<'_, Plaintext>> {
        if pt.level < level {
            let mut pt = pt.clone();
            pt.mod_drop_to_level(level)?;
            Ok(Cow::Owned(pt))
        } else {
            Ok(Cow::Borrowed(pt))
        }
    }

    fn finish(&self, ct: &mut Ciphertext, storage: Storage, operation: &str) {
        ct.storage = storage;
        trace!(
            stream = self.options.stream().id(),
            level = ct.level,
            size = ct.c.len(),
            operation,
            "evaluated"
        );
    }

    fn combine_inplace(
        &self,
        lhs: &mut Ciphertext,
        rhs: &Ciphertext,
        subtract: bool,
    ) -> Result<()> {
        self.check(&lhs.par)?;
        self.check(&rhs.par)?;
        Self::check_scales(lhs.scale, rhs.scale)?;
        let storage = self.options.resolve(&[lhs.storage, rhs.storage])?;

        let level = lhs.level.max(rhs.level);
        if lhs.level < level {
            lhs.mod_drop_to_level(level)?;
        }
        let rhs = Self::aligned(rhs, level)?;
        for (i, ri) in rhs.c.iter().enumerate() {
            match (lhs.c.get_mut(i), subtract) {
                (Some(li), false) => *li += ri,
                (Some(li), true) => *li -= ri,
                (None, false) => lhs.c.push(ri.clone()),
                (None, true) => lhs.c.push(-ri),
            }
        }
        self.finish(lhs, storage, if subtract { "sub" } else { "add" });
        Ok(())
    }

    /// Add `rhs` to `lhs`.
    pub fn add_inplace(&self, lhs: &mut Ciphertext, rhs: &Ciphertext) -> Result<()> {
        self.combine_inplace(lhs, rhs, false)
    }

    /// Returns `lhs + rhs`.
    pub fn add(&self, lhs: &Ciphertext, rhs: &Ciphertext) -> Result<Ciphertext> {
        let mut out = lhs.clone();
        self.add_inplace(&mut out, rhs)?;
        Ok(out)
    }

    /// Subtract `rhs` from `lhs`.
    pub fn sub_inplace(&self, lhs: &mut Ciphertext, rhs: &Ciphertext) -> Result<()> {
        self.combine_inplace(lhs, rhs, true)
    }

    /// Returns `lhs - rhs`.
    pub fn sub(&self, lhs: &Ciphertext, rhs: &Ciphertext) -> Result<Ciphertext> {
        let mut out = lhs.clone();
        self.sub_inplace(&mut out, rhs)?;
        Ok(out)
    }

    /// Negate a ciphertext.
    pub fn negate_inplace(&self, ct: &mut Ciphertext) -> Result<()> {
        self.check(&ct.par)?;
        let storage = self.options.resolve(&[ct.storage])?;
        ct.c.iter_mut().for_each(|ci| *ci = -&*ci);
        self.finish(ct, storage, "negate");
        Ok(())
    }

    /// Returns `-ct`.
    pub fn negate(&self, ct: &Ciphertext) -> Result<Ciphertext> {
        let mut out = ct.clone();
        self.negate_inplace(&mut out)?;
        Ok(out)
    }

    fn combine_plain_inplace(
        &self,
        ct: &mut Ciphertext,
        pt: &Plaintext,
        subtract: bool,
    ) -> Result<()> {
        self.check(&ct.par)?;
        self.check(&pt.par)?;
        Self::check_size(ct)?;
        Self::check_scales(ct.scale, pt.scale)?;
        let storage = self.options.resolve(&[ct.storage, pt.storage])?;

        let level = ct.level.max(pt.level);
        if ct.level < level {
            ct.mod_drop_to_level(level)?;
        }
        let pt = Self::aligned_plain(pt, level)?;
        if subtract {
            ct.c[0] -= &pt.poly;
        } else {
            ct.c[0] += &pt.poly;
        }
        self.finish(ct, storage, if subtract { "sub_plain" } else { "add_plain" });
        Ok(())
    }

    /// Add a plaintext to a ciphertext.
    pub fn add_plain_inplace(&self, ct: &mut Ciphertext, pt: &Plaintext) -> Result<()> {
        self.combine_plain_inplace(ct, pt, false)
    }

    /// Returns `ct + pt`.
    pub fn add_plain(&self, ct: &Ciphertext, pt: &Plaintext) -> Result<Ciphertext> {
        let mut out = ct.clone();
        self.add_plain_inplace(&mut out, pt)?;
        Ok(out)
    }

    /// Subtract a plaintext from a ciphertext.
    pub fn sub_plain_inplace(&self, ct: &mut Ciphertext, pt: &Plaintext) -> Result<()> {
        self.combine_plain_inplace(ct, pt, true)
    }

    /// Returns `ct - pt`.
    pub fn sub_plain(&self, ct: &Ciphertext, pt: &Plaintext) -> Result<Ciphertext> {
        let mut out = ct.clone();
        self.sub_plain_inplace(&mut out, pt)?;
        Ok(out)
    }

    /// Multiply a ciphertext by a plaintext. The scale of the result is the
    /// product of the scales.
    pub fn multiply_plain_inplace(&self, ct: &mut Ciphertext, pt: &Plaintext) -> Result<()> {
        self.check(&ct.par)?;
        self.check(&pt.par)?;
        let storage = self.options.resolve(&[ct.storage, pt.storage])?;

        let level = ct.level.max(pt.level);
        if ct.level < level {
            ct.mod_drop_to_level(level)?;
        }
        let pt = Self::aligned_plain(pt, level)?;
        ct.c.iter_mut().for_each(|ci| *ci *= &pt.poly);
        ct.scale *= pt.scale;
        self.finish(ct, storage, "multiply_plain");
        Ok(())
    }

    /// Returns `ct * pt`.
    pub fn multiply_plain(&self, ct: &Ciphertext, pt: &Plaintext) -> Result<Ciphertext> {
        let mut out = ct.clone();
        self.multiply_plain_inplace(&mut out, pt)?;
        Ok(out)
    }

    /// Add a constant to every slot of a ciphertext.
    pub fn add_constant_inplace<V: Into<Complex64>>(
        &self,
        ct: &mut Ciphertext,
        value: V,
    ) -> Result<()> {
        self.check(&ct.par)?;
        Self::check_size(ct)?;
        let storage = self.options.resolve(&[ct.storage])?;
        let pt = self.encoder.encode_constant(value.into(), ct.scale, ct.level)?;
        ct.c[0] += &pt.poly;
        self.finish(ct, storage, "add_constant");
        Ok(())
    }

    /// Returns `ct + value`.
    pub fn add_constant<V: Into<Complex64>>(
        &self,
        ct: &Ciphertext,
        value: V,
    ) -> Result<Ciphertext> {
        let mut out = ct.clone();
        self.add_constant_inplace(&mut out, value)?;
        Ok(out)
    }

    /// Multiply every slot of a ciphertext by a constant encoded at `scale`.
    pub(crate) fn multiply_by_constant_at_scale(
        &self,
        ct: &mut Ciphertext,
        value: Complex64,
        scale: f64,
    ) -> Result<()> {
        self.check(&ct.par)?;
        let storage = self.options.resolve(&[ct.storage])?;
        let pt = self.encoder.encode_constant(value, scale, ct.level)?;
        ct.c.iter_mut().for_each(|ci| *ci *= &pt.poly);
        ct.scale *= scale;
        self.finish(ct, storage, "multiply_by_constant");
        Ok(())
    }

    /// Multiply every slot of a ciphertext by a constant. The constant is
    /// encoded at the scale of the last modulus of the ciphertext, so that
    /// a subsequent rescale restores the scale of the ciphertext.
    pub fn multiply_by_constant_inplace<V: Into<Complex64>>(
        &self,
        ct: &mut Ciphertext,
        value: V,
    ) -> Result<()> {
        let q_last = Self::last_modulus(ct)?;
        self.multiply_by_constant_at_scale(ct, value.into(), q_last)
    }

    /// Returns `ct * value`.
    pub fn multiply_by_constant<V: Into<Complex64>>(
        &self,
        ct: &Ciphertext,
        value: V,
    ) -> Result<Ciphertext> {
        let mut out = ct.clone();
        self.multiply_by_constant_inplace(&mut out, value)?;
        Ok(out)
    }

    fn last_modulus(ct: &Ciphertext) -> Result<f64> {
        Self::check_size(ct)?;
        Ok(ct.c[0]
            .ctx()
            .moduli()
            .last()
            .map(|q| *q as f64)
            .unwrap_or(1.0))
    }

    /// Multiply a ciphertext by an integer, without changing its scale.
    pub fn multiply_by_integer_inplace(&self, ct: &mut Ciphertext, value: i64) -> Result<()> {
        self.check(&ct.par)?;
        Self::check_size(ct)?;
        let storage = self.options.resolve(&[ct.storage])?;
        let scalars = ct.c[0]
            .ctx()
            .moduli_operators()
            .iter()
            .map(|qi| qi.reduce_i64(value))
            .collect::<Vec<_>>();
        ct.c.iter_mut().for_each(|ci| ci.mul_scalar_rns(&scalars));
        self.finish(ct, storage, "multiply_by_integer");
        Ok(())
    }

    /// Returns `ct * value`.
    pub fn multiply_by_integer(&self, ct: &Ciphertext, value: i64) -> Result<Ciphertext> {
        let mut out = ct.clone();
        self.multiply_by_integer_inplace(&mut out, value)?;
        Ok(out)
    }

    /// Multiply every slot by the imaginary unit, which is a multiplication
    /// by the monomial X^(N/2) and consumes no level.
    pub fn multiply_by_i_inplace(&self, ct: &mut Ciphertext) -> Result<()> {
        self.check(&ct.par)?;
        let storage = self.options.resolve(&[ct.storage])?;
        let power = self.par.degree() / 2;
        for ci in ct.c.iter_mut() {
            ci.multiply_by_monomial(power)?;
        }
        self.finish(ct, storage, "multiply_by_i");
        Ok(())
    }

    /// Returns `i * ct`.
    pub fn multiply_by_i(&self, ct: &Ciphertext) -> Result<Ciphertext> {
        let mut out = ct.clone();
        self.multiply_by_i_inplace(&mut out)?;
        Ok(out)
    }

    /// Multiply two ciphertexts of size 2 into a ciphertext of size 3, whose
    /// scale is the product of the scales.
    pub fn multiply(&self, lhs: &Ciphertext, rhs: &Ciphertext) -> Result<Ciphertext> {
        self.check(&lhs.par)?;
        self.check(&rhs.par)?;
        for ct in [lhs, rhs] {
            if ct.c.len() != 2 {
                return Err(Error::TooManyValues(ct.c.len(), 2));
            }
        }
        let storage = self.options.resolve(&[lhs.storage, rhs.storage])?;

        let level = lhs.level.max(rhs.level);
        let lhs = Self::aligned(lhs, level)?;
        let rhs = Self::aligned(rhs, level)?;
        let c0 = &lhs.c[0] * &rhs.c[0];
        let mut c1 = &lhs.c[0] * &rhs.c[1];
        c1 += &(&lhs.c[1] * &rhs.c[0]);
        let c2 = &lhs.c[1] * &rhs.c[1];

        let mut out = Ciphertext::new(vec![c0, c1, c2], lhs.scale * rhs.scale, &self.par)?;
        self.finish(&mut out, storage, "multiply");
        Ok(out)
    }

    /// Returns `ct * ct`.
    pub fn square(&self, ct: &Ciphertext) -> Result<Ciphertext> {
        self.multiply(ct, ct)
    }

    /// Relinearize a ciphertext of size 3 into a ciphertext of size 2.
    pub fn relinearize_inplace(&self, ct: &mut Ciphertext, rk: &RelinearizationKey) -> Result<()> {
        self.check(&ct.par)?;
        self.check(&rk.par)?;
        let storage = self.options.resolve(&[ct.storage])?;
        rk.relinearizes(ct)?;
        self.finish(ct, storage, "relinearize");
        Ok(())
    }

    /// Returns the relinearization of a ciphertext of size 3.
    pub fn relinearize(&self, ct: &Ciphertext, rk: &RelinearizationKey) -> Result<Ciphertext> {
        let mut out = ct.clone();
        self.relinearize_inplace(&mut out, rk)?;
        Ok(out)
    }

    /// Divide a ciphertext and its scale by the last modulus, moving it to the
    /// next level.
    pub fn rescale_inplace(&self, ct: &mut Ciphertext) -> Result<()> {
        self.check(&ct.par)?;
        let storage = self.options.resolve(&[ct.storage])?;
        ct.rescale_to_next_level()?;
        self.finish(ct, storage, "rescale");
        Ok(())
    }

    /// Returns the rescaling of a ciphertext.
    pub fn rescale(&self, ct: &Ciphertext) -> Result<Ciphertext> {
        let mut out = ct.clone();
        self.rescale_inplace(&mut out)?;
        Ok(out)
    }

    /// Multiply, relinearize and rescale.
    pub(crate) fn multiply_relinearize_rescale(
        &self,
        lhs: &Ciphertext,
        rhs: &Ciphertext,
        rk: &RelinearizationKey,
    ) -> Result<Ciphertext> {
        let mut out = self.multiply(lhs, rhs)?;
        self.relinearize_inplace(&mut out, rk)?;
        self.rescale_inplace(&mut out)?;
        Ok(out)
    }

    /// Move a ciphertext to the next level with a scale of `target_scale`,
    /// by multiplying by the constant 1 and rescaling.
    pub fn rescale_to(&self, ct: &Ciphertext, target_scale: f64) -> Result<Ciphertext> {
        if ct.level >= self.par.max_level() {
            return Err(Error::LevelExhausted(ct.level));
        }
        let factor = target_scale * Self::last_modulus(ct)? / ct.scale;
        if !factor.is_finite() || factor < 1.0 {
            return Err(Error::UnspecifiedInput(format!(
                "Cannot rescale from {:e} to {target_scale:e}",
                ct.scale
            )));
        }
        let mut out = ct.clone();
        self.multiply_by_constant_at_scale(&mut out, Complex64::new(1.0, 0.0), factor)?;
        self.rescale_inplace(&mut out)?;
        out.scale = target_scale;
        Ok(out)
    }

    /// Drop the last modulus of a ciphertext, keeping its scale.
    pub fn mod_drop_inplace(&self, ct: &mut Ciphertext) -> Result<()> {
        self.check(&ct.par)?;
        ct.mod_drop_to_next_level()
    }

    /// Drop the moduli of a ciphertext down to `level`, keeping its scale.
    pub fn mod_drop_to_inplace(&self, ct: &mut Ciphertext, level: usize) -> Result<()> {
        self.check(&ct.par)?;
        ct.mod_drop_to_level(level)
    }

    /// Returns the ciphertext at the next level.
    pub fn mod_drop(&self, ct: &Ciphertext) -> Result<Ciphertext> {
        let mut out = ct.clone();
        self.mod_drop_inplace(&mut out)?;
        Ok(out)
    }

    /// Returns the ciphertext at `level`.
    pub fn mod_drop_to(&self, ct: &Ciphertext, level: usize) -> Result<Ciphertext> {
        let mut out = ct.clone();
        self.mod_drop_to_inplace(&mut out, level)?;
        Ok(out)
    }

    /// Drop the last modulus of a plaintext, keeping its scale.
    pub fn mod_drop_plain_inplace(&self, pt: &mut Plaintext) -> Result<()> {
        self.check(&pt.par)?;
        pt.mod_drop_to_next_level()
    }

    /// Drop the moduli of a plaintext down to `level`, keeping its scale.
    pub fn mod_drop_plain_to_inplace(&self, pt: &mut Plaintext, level: usize) -> Result<()> {
        self.check(&pt.par)?;
        pt.mod_drop_to_level(level)
    }

    /// Rotate the slots of a ciphertext `step` positions to the left; a
    /// negative step rotates to the right.
    pub fn rotate_inplace(&self, ct: &mut Ciphertext, step: i32, gk: &GaloisKey) -> Result<()> {
        self.check(&ct.par)?;
        self.check(&gk.par)?;
        if !gk.is_generated() {
            return Err(Error::key_not_generated("Galois key"));
        }
        let storage = self.options.resolve(&[ct.storage])?;
        for exponent in gk.rotation_exponents(step)? {
            *ct = gk.apply(ct, exponent)?;
        }
        self.finish(ct, storage, "rotate");
        Ok(())
    }

    /// Returns the rotation of a ciphertext by `step` positions to the left.
    pub fn rotate(&self, ct: &Ciphertext, step: i32, gk: &GaloisKey) -> Result<Ciphertext> {
        let mut out = ct.clone();
        self.rotate_inplace(&mut out, step, gk)?;
        Ok(out)
    }

    /// Conjugate the slots of a ciphertext.
    pub fn conjugate_inplace(&self, ct: &mut Ciphertext, gk: &GaloisKey) -> Result<()> {
        self.check(&ct.par)?;
        self.check(&gk.par)?;
        if !gk.is_generated() {
            return Err(Error::key_not_generated("Galois key"));
        }
        let storage = self.options.resolve(&[ct.storage])?;
        *ct = gk.apply(ct, GaloisKey::conjugation_exponent(&self.par))?;
        self.finish(ct, storage, "conjugate");
        Ok(())
    }

    /// Returns the conjugation of a ciphertext.
    pub fn conjugate(&self, ct: &Ciphertext, gk: &GaloisKey) -> Result<Ciphertext> {
        let mut out = ct.clone();
        self.conjugate_inplace(&mut out, gk)?;
        Ok(out)
    }
}
