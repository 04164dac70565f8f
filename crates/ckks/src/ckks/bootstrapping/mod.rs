//! Bootstrapping of CKKS ciphertexts.
//!
//! Bootstrapping refreshes a ciphertext at the last level into a ciphertext
//! with levels left, in four stages:
//! 1. ModRaise reinterprets the residues modulo q0 over the whole chain,
//!    which adds a multiple of q0 to every coefficient;
//! 2. CoeffToSlot moves the coefficients into the slots;
//! 3. EvalMod removes the multiples of q0 by evaluating a sine, computed from
//!    a Taylor expansion of the complex exponential followed by repeated
//!    squarings;
//! 4. SlotToCoeff moves the slots back into the coefficients.
//!
//! The slim variant starts with SlotToCoeff and only handles real slots. The
//! bit and gate variants build upon it to clean up or combine encrypted bits.

mod config;
mod matrices;

pub use config::BootstrappingConfig;

use std::f64::consts::{FRAC_1_SQRT_2, PI};
use std::sync::Arc;

use fhe_math::rq::{traits::TryConvertFrom, Poly, Representation};
use fhe_util::ilog2;
use num_complex::Complex64;
use rayon::prelude::*;
use tracing::debug;

use crate::ckks::ops::scales_match;
use crate::ckks::{
    ArithmeticOperator, Ciphertext, CkksParameters, Encoder, ExecutionOptions, GaloisKey,
    RelinearizationKey, RotationSet,
};
use crate::{Error, ParametersError, Result};

use matrices::Diagonals;

/// Number of squarings doubling the angle after the Taylor expansion.
const DOUBLE_ANGLE_STEPS: usize = 8;

/// The variants of bootstrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BootstrappingVariant {
    /// Complex slots.
    Standard,
    /// Real slots.
    Slim,
    /// Slots holding bits, cleaned up after the refresh.
    Bit,
    /// Two ciphertexts holding bits, combined by a gate during the refresh.
    Gate,
}

/// The gates evaluated by gate bootstrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicGate {
    #[allow(missing_docs)]
    And,
    #[allow(missing_docs)]
    Or,
    #[allow(missing_docs)]
    Xor,
    #[allow(missing_docs)]
    Nand,
    #[allow(missing_docs)]
    Nor,
    #[allow(missing_docs)]
    Xnor,
}

impl LogicGate {
    /// Returns (ω, α, A) such that the gate maps the sum x ∈ {0, 1, 2} of its
    /// inputs to 1/2 + A·sin(ω·(x + α)).
    fn sine(self) -> (f64, f64, f64) {
        let (omega, shift, amplitude) = match self {
            LogicGate::And | LogicGate::Nand => (PI / 2.0, 0.5, -FRAC_1_SQRT_2),
            LogicGate::Or | LogicGate::Nor => (PI / 2.0, -0.5, FRAC_1_SQRT_2),
            LogicGate::Xor | LogicGate::Xnor => (PI, 0.5, -0.5),
        };
        match self {
            LogicGate::Nand | LogicGate::Nor | LogicGate::Xnor => (omega, shift, -amplitude),
            _ => (omega, shift, amplitude),
        }
    }
}

/// The keys used by bootstrapping. The same Galois key may serve for the
/// conjugation and the rotations.
#[derive(Debug, Clone, Copy)]
pub struct BootstrappingKeys<'a> {
    /// Relinearization key.
    pub relin: &'a RelinearizationKey,
    /// Galois key for the conjugation.
    pub conjugation: &'a GaloisKey,
    /// Galois key supporting the rotations reported by
    /// [`Bootstrapper::bootstrapping_rotation_indices`].
    pub rotation: &'a GaloisKey,
}

impl<'a> BootstrappingKeys<'a> {
    /// Group the keys used by bootstrapping.
    pub fn new(
        relin: &'a RelinearizationKey,
        conjugation: &'a GaloisKey,
        rotation: &'a GaloisKey,
    ) -> Self {
        Self {
            relin,
            conjugation,
            rotation,
        }
    }
}

#[derive(Debug, Clone)]
struct BootstrappingPlan {
    scale: f64,
    cts: Vec<Diagonals>,
    stc: Vec<Diagonals>,
}

/// Evaluator of the bootstrapping procedure.
///
/// The parameters of the procedure must be generated with
/// [`Bootstrapper::generate_bootstrapping_params`] before use.
#[derive(Debug, Clone)]
pub struct Bootstrapper {
    par: Arc<CkksParameters>,
    config: BootstrappingConfig,
    arithmetic: ArithmeticOperator,
    encoder: Encoder,
    plan: Option<BootstrappingPlan>,
}

impl Bootstrapper {
    /// Create a bootstrapper with the default execution options.
    pub fn new(par: &Arc<CkksParameters>, config: BootstrappingConfig) -> Self {
        Self::with_options(par, config, ExecutionOptions::default())
    }

    /// Create a bootstrapper with the given execution options.
    pub fn with_options(
        par: &Arc<CkksParameters>,
        config: BootstrappingConfig,
        options: ExecutionOptions,
    ) -> Self {
        Self {
            par: par.clone(),
            config,
            arithmetic: ArithmeticOperator::with_options(par, options),
            encoder: Encoder::new(par),
            plan: None,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &BootstrappingConfig {
        &self.config
    }

    /// Returns whether the bootstrapping parameters have been generated.
    pub fn is_configured(&self) -> bool {
        self.plan.is_some()
    }

    fn taylor_depth(&self) -> usize {
        ilog2(self.config.taylor_number() - 1) + 1
    }

    fn eval_mod_depth(&self) -> usize {
        self.taylor_depth() + DOUBLE_ANGLE_STEPS + 2
    }

    /// Number of levels consumed by a variant, from the level at which the
    /// ciphertext is raised. The slot-to-coefficient transform of the slim
    /// variants is evaluated before the raise and is not counted.
    pub fn levels_consumed(&self, variant: BootstrappingVariant) -> usize {
        let raised = self.config.cts_piece() + self.eval_mod_depth();
        match variant {
            BootstrappingVariant::Standard => raised + self.config.stc_piece(),
            BootstrappingVariant::Slim | BootstrappingVariant::Gate => raised,
            BootstrappingVariant::Bit => raised + 2,
        }
    }

    fn check_budget(&self, variant: BootstrappingVariant) -> Result<()> {
        let available = self.par.max_level();
        // At least one level must remain after bootstrapping.
        let required = self.levels_consumed(variant) + 1;
        if required > available {
            return Err(ParametersError::InsufficientLevels(required, available).into());
        }
        if variant != BootstrappingVariant::Standard && self.config.stc_piece() > available {
            return Err(
                ParametersError::InsufficientLevels(self.config.stc_piece(), available).into(),
            );
        }
        Ok(())
    }

    /// Generate the parameters of bootstrapping for ciphertexts at `scale`,
    /// checking that the moduli chain accommodates the standard variant.
    pub fn generate_bootstrapping_params(&mut self, scale: f64) -> Result<()> {
        if !scale.is_finite() || scale <= 1.0 {
            return Err(ParametersError::InvalidScale(format!("{scale:e}")).into());
        }
        let stages = self.par.slots().trailing_zeros() as usize;
        for pieces in [self.config.cts_piece(), self.config.stc_piece()] {
            if pieces > stages {
                return Err(ParametersError::InvalidBootstrappingConfig(format!(
                    "{pieces} pieces for {stages} butterfly stages"
                ))
                .into());
            }
        }
        self.check_budget(BootstrappingVariant::Standard)?;

        let cts = matrices::coeff_to_slot(&self.par.fft, self.config.cts_piece());
        let stc = matrices::slot_to_coeff(&self.par.fft, self.config.stc_piece());
        debug!(
            scale,
            cts_diagonals = cts.iter().map(|d| d.len()).sum::<usize>(),
            stc_diagonals = stc.iter().map(|d| d.len()).sum::<usize>(),
            levels = self.levels_consumed(BootstrappingVariant::Standard),
            "generated bootstrapping parameters"
        );
        self.plan = Some(BootstrappingPlan { scale, cts, stc });
        Ok(())
    }

    fn plan(&self) -> Result<&BootstrappingPlan> {
        self.plan.as_ref().ok_or(Error::BootstrappingNotConfigured)
    }

    /// Returns the rotation steps for which the rotation key must be
    /// generated. In less key mode, these are the powers of two.
    pub fn bootstrapping_rotation_indices(&self) -> Result<Vec<i32>> {
        let plan = self.plan()?;
        let steps = if self.config.less_key_mode() {
            (0..self.par.slots().trailing_zeros())
                .map(|i| 1usize << i)
                .collect()
        } else {
            matrices::rotation_steps(plan.cts.iter().chain(plan.stc.iter()))
        };
        Ok(steps.into_iter().map(|k| k as i32).collect())
    }

    /// Returns the rotations of the Galois key used by bootstrapping.
    pub fn rotation_set(&self) -> Result<RotationSet> {
        if self.config.less_key_mode() {
            self.plan()?;
            Ok(RotationSet::PowersOfTwo)
        } else {
            Ok(RotationSet::Steps(self.bootstrapping_rotation_indices()?))
        }
    }

    fn check_input(&self, ct: &Ciphertext, plan: &BootstrappingPlan) -> Result<()> {
        if ct.par != self.par {
            return Err(Error::ContextMismatch);
        }
        if ct.c.len() != 2 {
            return Err(Error::TooManyValues(ct.c.len(), 2));
        }
        if !scales_match(ct.scale, plan.scale) {
            return Err(Error::scale_mismatch(ct.scale, plan.scale));
        }
        Ok(())
    }

    /// The last modulus at a level.
    fn prime_at(&self, level: usize) -> f64 {
        self.par.moduli()[self.par.max_level() - level] as f64
    }

    /// The scale at which the slots of the raised ciphertext, once moved to
    /// the slots and doubled, hold the angle 2π·t/q0 divided by
    /// 2^DOUBLE_ANGLE_STEPS.
    fn raised_scale(&self) -> f64 {
        self.prime_at(self.par.max_level()) * (1u64 << DOUBLE_ANGLE_STEPS) as f64 / PI
    }

    /// Lift the residues modulo q0 of a ciphertext to the first level.
    fn mod_raise(&self, ct: &Ciphertext) -> Result<Ciphertext> {
        let max_level = self.par.max_level();
        let ct = if ct.level < max_level {
            self.arithmetic.mod_drop_to(ct, max_level)?
        } else {
            ct.clone()
        };
        let ctx = self.par.ctx_at_level(0)?;
        let c = ct
            .c
            .iter()
            .map(|ci| {
                let coefficients = ci.to_centered_bigints();
                let mut raised = Poly::try_convert_from(
                    coefficients.as_slice(),
                    ctx,
                    Representation::PowerBasis,
                )?;
                raised.change_representation(Representation::Ntt);
                Ok(raised)
            })
            .collect::<Result<Vec<_>>>()?;
        let mut raised = Ciphertext::new(c, self.raised_scale(), &self.par)?;
        raised.storage = ct.storage;
        debug!(level = raised.level, "ModRaise");
        Ok(raised)
    }

    /// Evaluate the matrices in sequence, the first one being multiplied by
    /// `factor`. The scale reaches `target_scale` after the last matrix.
    fn linear_transform(
        &self,
        ct: &Ciphertext,
        matrices: &[Diagonals],
        factor: f64,
        target_scale: f64,
        gk: &GaloisKey,
    ) -> Result<Ciphertext> {
        let mut ct = ct.clone();
        for (g, diagonals) in matrices.iter().enumerate() {
            let remaining = (matrices.len() - g) as f64;
            let pt_scale =
                self.prime_at(ct.level) * (target_scale / ct.scale).powf(1.0 / remaining);
            let terms = diagonals
                .par_iter()
                .map(|(k, diagonal)| -> Result<Ciphertext> {
                    let values = if g == 0 {
                        diagonal.iter().map(|x| x * factor).collect::<Vec<_>>()
                    } else {
                        diagonal.clone()
                    };
                    let pt = self.encoder.encode_complex(&values, pt_scale, ct.level)?;
                    let rotated = self.arithmetic.rotate(&ct, *k as i32, gk)?;
                    self.arithmetic.multiply_plain(&rotated, &pt)
                })
                .collect::<Result<Vec<_>>>()?;
            let mut terms = terms.into_iter();
            let mut sum = terms
                .next()
                .ok_or_else(|| Error::UnspecifiedInput("Empty matrix".to_string()))?;
            for term in terms {
                self.arithmetic.add_inplace(&mut sum, &term)?;
            }
            ct = sum;
            self.arithmetic.rescale_inplace(&mut ct)?;
        }
        ct.scale = target_scale;
        Ok(ct)
    }

    fn coeff_to_slot(&self, raised: &Ciphertext, keys: &BootstrappingKeys) -> Result<Ciphertext> {
        let plan = self.plan()?;
        let ct = self.linear_transform(raised, &plan.cts, 1.0, self.par.scale(), keys.rotation)?;
        debug!(level = ct.level, "CoeffToSlot");
        Ok(ct)
    }

    fn slot_to_coeff(
        &self,
        ct: &Ciphertext,
        factor: f64,
        target_scale: f64,
        keys: &BootstrappingKeys,
    ) -> Result<Ciphertext> {
        let plan = self.plan()?;
        let ct = self.linear_transform(ct, &plan.stc, factor, target_scale, keys.rotation)?;
        debug!(level = ct.level, "SlotToCoeff");
        Ok(ct)
    }

    /// Returns e^(iθ) - e^(-iθ) = 2i·sin θ, where the slots of `ct` hold
    /// θ / 2^DOUBLE_ANGLE_STEPS.
    fn sine_numerator(&self, ct: &Ciphertext, keys: &BootstrappingKeys) -> Result<Ciphertext> {
        let scale = ct.scale;

        // powers[k - 1] = x^k, at depth ⌈log2 k⌉.
        let mut powers = vec![ct.clone()];
        for k in 2..=self.config.taylor_number() {
            let high = 1usize << ilog2(k);
            let (a, b) = if high == k { (k / 2, k / 2) } else { (high, k - high) };
            let power = self.arithmetic.multiply_relinearize_rescale(
                &powers[a - 1],
                &powers[b - 1],
                keys.relin,
            )?;
            powers.push(power);
        }

        // Σ (ix)^k / k!, every term brought to the same level and scale.
        let level = powers.iter().map(|p| p.level).max().unwrap_or(ct.level);
        let q = self.prime_at(level);
        let mut factorial = 1.0;
        let mut exp = None;
        for (k, power) in (1..).zip(powers.iter()) {
            factorial *= k as f64;
            let coefficient = Complex64::i().powu(k) / factorial;
            let mut term = self.arithmetic.mod_drop_to(power, level)?;
            let pt_scale = scale * q / term.scale;
            self.arithmetic
                .multiply_by_constant_at_scale(&mut term, coefficient, pt_scale)?;
            self.arithmetic.rescale_inplace(&mut term)?;
            term.scale = scale;
            match exp.as_mut() {
                Some(exp) => self.arithmetic.add_inplace(exp, &term)?,
                None => exp = Some(term),
            }
        }
        let mut exp =
            exp.ok_or_else(|| Error::UnspecifiedInput("Empty Taylor expansion".to_string()))?;
        self.arithmetic.add_constant_inplace(&mut exp, 1.0)?;

        for _ in 0..DOUBLE_ANGLE_STEPS {
            exp = self
                .arithmetic
                .multiply_relinearize_rescale(&exp, &exp, keys.relin)?;
        }
        let conjugate = self.arithmetic.conjugate(&exp, keys.conjugation)?;
        let numerator = self.arithmetic.sub(&exp, &conjugate)?;
        debug!(level = numerator.level, "EvalMod");
        Ok(numerator)
    }

    /// Multiply 2i·sin θ by -i·amplitude/2, reaching `target_scale`.
    fn scale_sine(
        &self,
        numerator: &Ciphertext,
        amplitude: f64,
        target_scale: f64,
    ) -> Result<Ciphertext> {
        let mut ct = numerator.clone();
        let pt_scale = target_scale * self.prime_at(ct.level) / ct.scale;
        self.arithmetic.multiply_by_constant_at_scale(
            &mut ct,
            Complex64::new(0.0, -amplitude / 2.0),
            pt_scale,
        )?;
        self.arithmetic.rescale_inplace(&mut ct)?;
        ct.scale = target_scale;
        Ok(ct)
    }

    /// The amplitude turning sin(2π·t/q0) back into t / scale.
    fn inverse_sine_amplitude(&self, scale: f64) -> f64 {
        self.prime_at(self.par.max_level()) / (2.0 * PI * scale)
    }

    /// Bootstrap a ciphertext with complex slots.
    pub fn bootstrapping(&self, ct: &Ciphertext, keys: &BootstrappingKeys) -> Result<Ciphertext> {
        let plan = self.plan()?;
        self.check_budget(BootstrappingVariant::Standard)?;
        self.check_input(ct, plan)?;

        let raised = self.mod_raise(ct)?;
        let slots = self.coeff_to_slot(&raised, keys)?;
        let conjugate = self.arithmetic.conjugate(&slots, keys.conjugation)?;
        // Twice the real and the imaginary parts.
        let re = self.arithmetic.add(&slots, &conjugate)?;
        let mut im = self.arithmetic.sub(&slots, &conjugate)?;
        self.arithmetic.multiply_by_i_inplace(&mut im)?;
        self.arithmetic.negate_inplace(&mut im)?;

        let numerator_re = self.sine_numerator(&re, keys)?;
        let mut numerator = self.sine_numerator(&im, keys)?;
        self.arithmetic.multiply_by_i_inplace(&mut numerator)?;
        self.arithmetic.add_inplace(&mut numerator, &numerator_re)?;
        let amplitude = self.inverse_sine_amplitude(plan.scale);
        let coefficients = self.scale_sine(&numerator, amplitude, plan.scale)?;

        self.slot_to_coeff(&coefficients, 1.0, plan.scale, keys)
    }

    /// Evaluate the slim pipeline on a ciphertext whose slots, multiplied by
    /// `factor`, form the real part of the message, and return amplitude·sin θ.
    fn slim(
        &self,
        ct: &Ciphertext,
        factor: f64,
        amplitude: f64,
        keys: &BootstrappingKeys,
    ) -> Result<Ciphertext> {
        let plan = self.plan()?;
        let start = self.par.max_level() - self.config.stc_piece();
        if ct.level > start {
            return Err(Error::InvalidLevel(ct.level, start));
        }
        let ct = self.arithmetic.mod_drop_to(ct, start)?;
        let coefficients = self.slot_to_coeff(&ct, factor, ct.scale, keys)?;

        let raised = self.mod_raise(&coefficients)?;
        let slots = self.coeff_to_slot(&raised, keys)?;
        let conjugate = self.arithmetic.conjugate(&slots, keys.conjugation)?;
        let re = self.arithmetic.add(&slots, &conjugate)?;
        let numerator = self.sine_numerator(&re, keys)?;
        self.scale_sine(&numerator, amplitude, plan.scale)
    }

    /// Bootstrap a ciphertext with real slots. The ciphertext must have at
    /// least `stc_piece` levels left.
    pub fn slim_bootstrapping(
        &self,
        ct: &Ciphertext,
        keys: &BootstrappingKeys,
    ) -> Result<Ciphertext> {
        let plan = self.plan()?;
        self.check_budget(BootstrappingVariant::Slim)?;
        self.check_input(ct, plan)?;
        self.slim(ct, 1.0, self.inverse_sine_amplitude(ct.scale), keys)
    }

    /// Bootstrap a ciphertext whose slots hold bits, and pull the result
    /// towards 0 and 1 with 3y² - 2y³.
    pub fn bit_bootstrapping(
        &self,
        ct: &Ciphertext,
        keys: &BootstrappingKeys,
    ) -> Result<Ciphertext> {
        let plan = self.plan()?;
        self.check_budget(BootstrappingVariant::Bit)?;
        self.check_input(ct, plan)?;
        let y = self.slim(ct, 1.0, self.inverse_sine_amplitude(ct.scale), keys)?;

        let y2 = self.arithmetic.multiply_relinearize_rescale(&y, &y, keys.relin)?;
        let y3 = self
            .arithmetic
            .multiply_relinearize_rescale(&y2, &y, keys.relin)?;
        let mut out = self.arithmetic.rescale_to(&y2, y3.scale)?;
        self.arithmetic.multiply_by_integer_inplace(&mut out, 3)?;
        let y3 = self.arithmetic.multiply_by_integer(&y3, 2)?;
        self.arithmetic.sub_inplace(&mut out, &y3)?;
        debug!(level = out.level, "bit cleanup");
        Ok(out)
    }

    /// Evaluate a gate on two ciphertexts whose slots hold bits, while
    /// bootstrapping them.
    pub fn gate_bootstrapping(
        &self,
        gate: LogicGate,
        lhs: &Ciphertext,
        rhs: &Ciphertext,
        keys: &BootstrappingKeys,
    ) -> Result<Ciphertext> {
        let plan = self.plan()?;
        self.check_budget(BootstrappingVariant::Gate)?;
        self.check_input(lhs, plan)?;
        self.check_input(rhs, plan)?;

        let (omega, shift, amplitude) = gate.sine();
        let mut x = self.arithmetic.add(lhs, rhs)?;
        self.arithmetic.add_constant_inplace(&mut x, shift)?;
        // The coefficients become ω·q0/(2π)·(x + α), so that the angle is ω·(x + α).
        let factor = omega * self.prime_at(self.par.max_level()) / (2.0 * PI * x.scale);
        let mut out = self.slim(&x, factor, amplitude, keys)?;
        self.arithmetic.add_constant_inplace(&mut out, 0.5)?;
        debug!(?gate, level = out.level, "gate bootstrapping");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Bootstrapper, BootstrappingConfig, BootstrappingKeys, BootstrappingVariant, LogicGate,
    };
    use crate::ckks::{
        Ciphertext, CkksParameters, CkksParametersBuilder, Decryptor, Encoder, Encryptor,
        GaloisKey, KeyGenerator, RelinearizationKey, SecretKey, SecurityLevel,
    };
    use crate::{Error, ErrorCategory};
    use num_complex::Complex64;
    use std::error::Error as StdError;
    use std::sync::Arc;

    const TOLERANCE: f64 = 1e-2;

    struct Fixture {
        par: Arc<CkksParameters>,
        sk: SecretKey,
        rk: RelinearizationKey,
        gk: GaloisKey,
        bootstrapper: Bootstrapper,
        encoder: Encoder,
    }

    impl Fixture {
        fn new(less_key_mode: bool) -> Result<Self, Box<dyn StdError>> {
            let mut sizes = vec![50];
            sizes.extend([40; 24]);
            let par = CkksParametersBuilder::new()
                .set_degree(32)
                .set_moduli_sizes(&sizes)
                .set_special_moduli_sizes(&[60])
                .set_log_scale(40)
                .set_security_level(SecurityLevel::None)
                .build_arc()?;

            let mut bootstrapper =
                Bootstrapper::new(&par, BootstrappingConfig::new(2, 2, 11, less_key_mode)?);
            bootstrapper.generate_bootstrapping_params(par.scale())?;

            let mut keygen = KeyGenerator::new(&par);
            let sk = keygen.generate_secret_key(16)?;
            let rk = keygen.generate_relin_key(&sk)?;
            let mut gk = GaloisKey::new(&par, bootstrapper.rotation_set()?);
            keygen.generate_galois_key(&sk, &mut gk)?;
            Ok(Self {
                encoder: Encoder::new(&par),
                par,
                sk,
                rk,
                gk,
                bootstrapper,
            })
        }

        fn keys(&self) -> BootstrappingKeys<'_> {
            BootstrappingKeys::new(&self.rk, &self.gk, &self.gk)
        }

        fn encrypt(&self, values: &[f64], level: usize) -> Result<Ciphertext, Box<dyn StdError>> {
            let pt = self.encoder.encode(values, self.par.scale(), level)?;
            Ok(Encryptor::with_secret_key(&self.sk)?.encrypt(&pt)?)
        }

        fn decrypt(&self, ct: &Ciphertext) -> Result<Vec<Complex64>, Box<dyn StdError>> {
            Ok(self
                .encoder
                .decode_complex(&Decryptor::new(&self.sk)?.decrypt(ct)?)?)
        }

        fn assert_real(&self, ct: &Ciphertext, expected: &[f64]) -> Result<(), Box<dyn StdError>> {
            self.decrypt(ct)?
                .iter()
                .zip(expected)
                .for_each(|(z, x)| assert!((z.re - x).abs() < TOLERANCE, "{z} != {x}"));
            Ok(())
        }
    }

    #[test]
    fn standard() -> Result<(), Box<dyn StdError>> {
        let f = Fixture::new(false)?;
        let values = (0..f.par.slots())
            .map(|i| Complex64::new((i as f64 * 0.7).sin(), (i as f64 * 0.3).cos() / 2.0))
            .collect::<Vec<_>>();
        let pt = f
            .encoder
            .encode_complex(&values, f.par.scale(), f.par.max_level())?;
        let ct = Encryptor::with_secret_key(&f.sk)?.encrypt(&pt)?;

        let refreshed = f.bootstrapper.bootstrapping(&ct, &f.keys())?;
        assert_eq!(
            refreshed.level(),
            f.bootstrapper.levels_consumed(BootstrappingVariant::Standard)
        );
        assert!(refreshed.level() < f.par.max_level());
        assert_eq!(refreshed.scale(), f.par.scale());
        f.decrypt(&refreshed)?
            .iter()
            .zip(&values)
            .for_each(|(z, v)| assert!((z - v).norm() < TOLERANCE, "{z} != {v}"));
        Ok(())
    }

    #[test]
    fn slim_and_bit() -> Result<(), Box<dyn StdError>> {
        let f = Fixture::new(true)?;
        let level = f.par.max_level() - f.bootstrapper.config().stc_piece();

        let values = (0..f.par.slots())
            .map(|i| (i as f64 * 0.45).cos())
            .collect::<Vec<_>>();
        let ct = f.encrypt(&values, level)?;
        let refreshed = f.bootstrapper.slim_bootstrapping(&ct, &f.keys())?;
        assert_eq!(
            refreshed.level(),
            f.bootstrapper.levels_consumed(BootstrappingVariant::Slim)
        );
        f.assert_real(&refreshed, &values)?;

        let bits = (0..f.par.slots())
            .map(|i| ((i * 7) % 3 == 0) as u8 as f64)
            .collect::<Vec<_>>();
        let ct = f.encrypt(&bits, level)?;
        let refreshed = f.bootstrapper.bit_bootstrapping(&ct, &f.keys())?;
        assert_eq!(
            refreshed.level(),
            f.bootstrapper.levels_consumed(BootstrappingVariant::Bit)
        );
        f.assert_real(&refreshed, &bits)?;

        let last = f.encrypt(&bits, f.par.max_level())?;
        assert_eq!(
            f.bootstrapper
                .slim_bootstrapping(&last, &f.keys())
                .unwrap_err(),
            Error::InvalidLevel(f.par.max_level(), level)
        );
        Ok(())
    }

    #[test]
    fn gates() -> Result<(), Box<dyn StdError>> {
        let f = Fixture::new(false)?;
        let level = f.par.max_level() - f.bootstrapper.config().stc_piece();
        let a = (0..f.par.slots()).map(|i| (i % 2) as f64).collect::<Vec<_>>();
        let b = (0..f.par.slots())
            .map(|i| ((i / 2) % 2) as f64)
            .collect::<Vec<_>>();
        let ct_a = f.encrypt(&a, level)?;
        let ct_b = f.encrypt(&b, level)?;

        let gates: [(LogicGate, fn(bool, bool) -> bool); 6] = [
            (LogicGate::And, |x, y| x & y),
            (LogicGate::Or, |x, y| x | y),
            (LogicGate::Xor, |x, y| x ^ y),
            (LogicGate::Nand, |x, y| !(x & y)),
            (LogicGate::Nor, |x, y| !(x | y)),
            (LogicGate::Xnor, |x, y| !(x ^ y)),
        ];
        for (gate, truth) in gates {
            let ct = f
                .bootstrapper
                .gate_bootstrapping(gate, &ct_a, &ct_b, &f.keys())?;
            let expected = a
                .iter()
                .zip(&b)
                .map(|(x, y)| truth(*x == 1.0, *y == 1.0) as u8 as f64)
                .collect::<Vec<_>>();
            f.assert_real(&ct, &expected)?;
        }
        Ok(())
    }

    #[test]
    fn rotation_indices() -> Result<(), Box<dyn StdError>> {
        let par = CkksParameters::default_arc(2, 64);
        let mut bootstrapper = Bootstrapper::new(&par, BootstrappingConfig::new(2, 2, 6, false)?);
        assert_eq!(
            bootstrapper.bootstrapping_rotation_indices().unwrap_err(),
            Error::BootstrappingNotConfigured
        );
        // Two moduli leave one level, far from enough.
        let err = bootstrapper
            .generate_bootstrapping_params(par.scale())
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert!(!bootstrapper.is_configured());

        let f = Fixture::new(true)?;
        assert_eq!(
            f.bootstrapper.bootstrapping_rotation_indices()?,
            vec![1, 2, 4, 8]
        );
        let mut too_many_pieces =
            Bootstrapper::new(&f.par, BootstrappingConfig::new(5, 2, 11, false)?);
        assert_eq!(
            too_many_pieces
                .generate_bootstrapping_params(f.par.scale())
                .unwrap_err()
                .category(),
            ErrorCategory::Configuration
        );
        Ok(())
    }

    #[test]
    fn not_configured() -> Result<(), Box<dyn StdError>> {
        let f = Fixture::new(false)?;
        let bootstrapper = Bootstrapper::new(&f.par, BootstrappingConfig::default());
        let ct = f.encrypt(&[0.5], f.par.max_level())?;
        let err = bootstrapper.bootstrapping(&ct, &f.keys()).unwrap_err();
        assert_eq!(err, Error::BootstrappingNotConfigured);
        assert_eq!(err.category(), ErrorCategory::Precondition);
        Ok(())
    }
}
