//! Create parameters for the CKKS encryption scheme

use super::encoder::SpecialFft;
use crate::proto::ckks::Parameters;
use crate::{Error, ParametersError, Result};
use fhe_math::{
    ntt::NttOperator,
    rns::BaseConverter,
    rq::Context,
    zq::{
        primes::{generate_prime, generate_prime_above},
        Modulus,
    },
};
use fhe_traits::{Deserialize, FheParameters, Serialize};
use itertools::Itertools;
use prost::Message;
use sha2::{Digest, Sha256};
use std::fmt::{Debug, Display};
use std::ops::Range;
use std::sync::Arc;
use tracing::debug;

/// Security levels, following the homomorphic encryption standard bounds on
/// the total modulus size for a ternary secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SecurityLevel {
    /// No bound is enforced; only suitable for tests.
    None,
    /// 128 bits of classical security.
    #[default]
    Sec128,
    /// 192 bits of classical security.
    Sec192,
    /// 256 bits of classical security.
    Sec256,
}

const SECURITY_DEGREES: [usize; 7] = [1024, 2048, 4096, 8192, 16384, 32768, 65536];
const SECURITY_128: [usize; 7] = [27, 54, 109, 218, 438, 881, 1761];
const SECURITY_192: [usize; 7] = [19, 37, 75, 152, 305, 611, 1220];
const SECURITY_256: [usize; 7] = [14, 29, 58, 118, 237, 476, 950];

impl SecurityLevel {
    /// Maximum number of bits of the total modulus (Q and P) for a degree.
    /// Returns None when the degree is not covered by the bounds.
    pub fn max_modulus_bits(&self, degree: usize) -> Option<usize> {
        let table = match self {
            SecurityLevel::None => return Some(usize::MAX),
            SecurityLevel::Sec128 => &SECURITY_128,
            SecurityLevel::Sec192 => &SECURITY_192,
            SecurityLevel::Sec256 => &SECURITY_256,
        };
        SECURITY_DEGREES
            .iter()
            .position(|d| *d == degree)
            .map(|i| table[i])
    }

    fn to_u32(self) -> u32 {
        match self {
            SecurityLevel::None => 0,
            SecurityLevel::Sec128 => 128,
            SecurityLevel::Sec192 => 192,
            SecurityLevel::Sec256 => 256,
        }
    }

    fn try_from_u32(value: u32) -> Result<Self> {
        match value {
            0 => Ok(SecurityLevel::None),
            128 => Ok(SecurityLevel::Sec128),
            192 => Ok(SecurityLevel::Sec192),
            256 => Ok(SecurityLevel::Sec256),
            _ => Err(Error::SerializationError),
        }
    }
}

/// Decomposition used by the key-switching keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KeySwitchMethod {
    /// A single digit spanning all the ciphertext moduli; the special modulus
    /// must be at least as large as the ciphertext modulus.
    I,
    /// One digit per ciphertext modulus.
    #[default]
    II,
    /// Digits made of as many consecutive ciphertext moduli as there are
    /// special moduli.
    III,
}

impl Display for KeySwitchMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeySwitchMethod::I => write!(f, "method I"),
            KeySwitchMethod::II => write!(f, "method II"),
            KeySwitchMethod::III => write!(f, "method III"),
        }
    }
}

impl KeySwitchMethod {
    pub(crate) fn to_u32(self) -> u32 {
        match self {
            KeySwitchMethod::I => 1,
            KeySwitchMethod::II => 2,
            KeySwitchMethod::III => 3,
        }
    }

    pub(crate) fn try_from_u32(value: u32) -> Result<Self> {
        match value {
            1 => Ok(KeySwitchMethod::I),
            2 => Ok(KeySwitchMethod::II),
            3 => Ok(KeySwitchMethod::III),
            _ => Err(Error::SerializationError),
        }
    }

    /// Ranges of ciphertext moduli forming the digits.
    fn digits(&self, num_moduli: usize, num_special: usize) -> Vec<Range<usize>> {
        let width = match self {
            KeySwitchMethod::I => num_moduli,
            KeySwitchMethod::II => 1,
            KeySwitchMethod::III => num_special.max(1),
        };
        (0..num_moduli)
            .step_by(width)
            .map(|start| start..(start + width).min(num_moduli))
            .collect()
    }
}

/// A coefficient modulus, as exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModulusInfo {
    /// Value of the prime.
    pub value: u64,
    /// Number of bits of the prime.
    pub bits: usize,
    /// Barrett constant floor(2^128 / value).
    pub barrett: u128,
}

/// Parameters for the CKKS encryption scheme.
pub struct CkksParameters {
    /// Number of coefficients in a polynomial.
    polynomial_degree: usize,

    /// Vector of coprime moduli q_i for the ciphertext.
    pub(crate) moduli: Box<[u64]>,

    /// Sizes of the moduli q_i.
    moduli_sizes: Box<[usize]>,

    /// Special moduli, only used during key switching.
    pub(crate) special_moduli: Box<[u64]>,

    /// Default scale of the encodings.
    scale: f64,

    security_level: SecurityLevel,

    keyswitch_method: KeySwitchMethod,

    /// Error variance
    pub(crate) variance: usize,

    /// Context for the underlying polynomials, indexed by level.
    pub ctx: Vec<Arc<Context>>,

    /// Digits of the key switching decomposition, as ranges of moduli.
    pub(crate) digits: Box<[Range<usize>]>,

    /// Context over Q ∪ P in which the key-switching keys live.
    pub(crate) ctx_qp: Option<Arc<Context>>,

    /// P modulo q_i.
    pub(crate) p_mod_q: Box<[u64]>,

    /// Key switching precomputations, indexed by level.
    pub(crate) key_switch: Box<[KeySwitchParameters]>,

    /// Tables of the canonical embedding.
    pub(crate) fft: SpecialFft,

    fingerprint: [u8; 32],
}

impl Debug for CkksParameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CkksParameters")
            .field("polynomial_degree", &self.polynomial_degree)
            .field("moduli", &self.moduli)
            .field("special_moduli", &self.special_moduli)
            .field("scale", &self.scale)
            .field("security_level", &self.security_level)
            .field("keyswitch_method", &self.keyswitch_method)
            .finish()
    }
}

impl PartialEq for CkksParameters {
    fn eq(&self, other: &Self) -> bool {
        self.fingerprint == other.fingerprint
    }
}

impl Eq for CkksParameters {}

impl FheParameters for CkksParameters {}

impl CkksParameters {
    /// Returns the underlying polynomial degree
    pub const fn degree(&self) -> usize {
        self.polynomial_degree
    }

    /// Returns the number of slots of a plaintext.
    pub const fn slots(&self) -> usize {
        self.polynomial_degree >> 1
    }

    /// Returns a reference to the ciphertext moduli
    pub fn moduli(&self) -> &[u64] {
        &self.moduli
    }

    /// Returns a reference to the sizes of the ciphertext moduli
    pub fn moduli_sizes(&self) -> &[usize] {
        &self.moduli_sizes
    }

    /// Returns a reference to the special moduli
    pub fn special_moduli(&self) -> &[u64] {
        &self.special_moduli
    }

    /// Returns the default scale
    pub const fn scale(&self) -> f64 {
        self.scale
    }

    /// Returns the number of ciphertext moduli.
    pub fn coeff_modulus_count(&self) -> usize {
        self.moduli.len()
    }

    /// Returns the security level
    pub const fn security_level(&self) -> SecurityLevel {
        self.security_level
    }

    /// Returns the key switching method
    pub const fn keyswitch_method(&self) -> KeySwitchMethod {
        self.keyswitch_method
    }

    /// Returns the variance
    pub const fn variance(&self) -> usize {
        self.variance
    }

    /// Returns the SHA-256 fingerprint of the serialized parameters.
    pub const fn fingerprint(&self) -> &[u8; 32] {
        &self.fingerprint
    }

    /// Returns the maximum level allowed by these parameters.
    pub fn max_level(&self) -> usize {
        self.moduli.len() - 1
    }

    /// Returns the context corresponding to the level.
    pub fn ctx_at_level(&self, level: usize) -> Result<&Arc<Context>> {
        self.ctx
            .get(level)
            .ok_or_else(|| Error::InvalidLevel(level, self.max_level()))
    }

    /// Returns the level of a given context
    pub(crate) fn level_of_ctx(&self, ctx: &Arc<Context>) -> Result<usize> {
        self.ctx[0].niterations_to(ctx).map_err(Error::MathError)
    }

    /// Returns whether key-switching keys can be generated.
    pub fn supports_key_switching(&self) -> bool {
        !self.key_switch.is_empty()
    }

    pub(crate) fn key_switch_at(&self, level: usize) -> Result<&KeySwitchParameters> {
        if self.key_switch.is_empty() {
            return Err(Error::ParametersError(
                ParametersError::InvalidKeySwitchMethod(
                    "no special moduli were specified".to_string(),
                ),
            ));
        }
        self.key_switch
            .get(level)
            .ok_or_else(|| Error::InvalidLevel(level, self.max_level()))
    }

    /// Returns the ciphertext moduli with their sizes and Barrett constants.
    pub fn coefficient_moduli(&self) -> Vec<ModulusInfo> {
        self.ctx[0]
            .moduli_operators()
            .iter()
            .map(|q| ModulusInfo {
                value: q.modulus(),
                bits: q.bits(),
                barrett: q.barrett(),
            })
            .collect()
    }

    /// Copies the ciphertext moduli into `out`, and returns the number of
    /// moduli copied. Fails if `out` is too small.
    pub fn copy_coefficient_moduli(&self, out: &mut [ModulusInfo]) -> Result<usize> {
        let moduli = self.coefficient_moduli();
        if out.len() < moduli.len() {
            return Err(Error::BufferTooSmall(out.len(), moduli.len()));
        }
        out[..moduli.len()].copy_from_slice(&moduli);
        Ok(moduli.len())
    }

    /// Fails unless `fingerprint` identifies these parameters.
    pub(crate) fn check_fingerprint(&self, fingerprint: &[u8]) -> Result<()> {
        if fingerprint == self.fingerprint.as_slice() {
            Ok(())
        } else {
            Err(Error::ContextMismatch)
        }
    }

    #[cfg(test)]
    #[allow(missing_docs)]
    pub fn default_arc(num_moduli: usize, degree: usize) -> Arc<Self> {
        let mut sizes = vec![60];
        sizes.extend(vec![40; num_moduli - 1]);
        CkksParametersBuilder::new()
            .set_degree(degree)
            .set_moduli_sizes(&sizes)
            .set_special_moduli_sizes(&[60])
            .set_log_scale(40)
            .set_security_level(SecurityLevel::None)
            .build_arc()
            .unwrap()
    }
}

/// Key switching precomputations for one level.
#[derive(Debug)]
pub(crate) struct KeySwitchParameters {
    /// Contexts of the digits active at this level.
    pub(crate) digit_ctx: Box<[Arc<Context>]>,
    /// Rows of the level context forming each digit.
    pub(crate) digit_rows: Box<[Vec<usize>]>,
    /// Converters from each digit to Q_l ∪ P.
    pub(crate) extenders: Box<[BaseConverter]>,
    /// Context over Q_l ∪ P.
    pub(crate) ctx_qp: Arc<Context>,
    /// Rows of the top-level keys forming Q_l ∪ P.
    pub(crate) key_rows: Box<[usize]>,
    /// Context over P.
    pub(crate) ctx_p: Arc<Context>,
    /// Converter from P to Q_l.
    pub(crate) mod_down: BaseConverter,
    /// P^(-1) modulo q_i.
    pub(crate) p_inv: Box<[u64]>,
}

impl KeySwitchParameters {
    fn new(
        ctx: &Arc<Context>,
        p_ops: &[Arc<NttOperator>],
        digits: &[Range<usize>],
        num_moduli: usize,
    ) -> Result<Self> {
        let level_moduli = ctx.moduli().len();
        let degree = ctx.degree();
        let qp_ops = ctx.ops.iter().chain(p_ops.iter()).cloned().collect_vec();
        let ctx_qp = Arc::new(Context::single_level(&qp_ops, degree)?);
        let ctx_p = Arc::new(Context::single_level(p_ops, degree)?);

        let mut digit_ctx = vec![];
        let mut digit_rows = vec![];
        let mut extenders = vec![];
        for digit in digits {
            let rows = (digit.start..digit.end.min(level_moduli)).collect_vec();
            if rows.is_empty() {
                break;
            }
            let c = Arc::new(Context::single_level(
                &ctx.ops[rows[0]..rows[0] + rows.len()],
                degree,
            )?);
            extenders.push(BaseConverter::new(&c.rns, &ctx_qp.rns)?);
            digit_ctx.push(c);
            digit_rows.push(rows);
        }

        let p_inv = ctx
            .moduli_operators()
            .iter()
            .map(|qi| {
                let p = p_ops
                    .iter()
                    .fold(1u64, |acc, op| qi.mul(acc, qi.reduce(op.modulus().modulus())));
                qi.inv(p)
                    .ok_or(Error::MathError(fhe_math::Error::InvalidModulus(qi.modulus())))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            digit_ctx: digit_ctx.into_boxed_slice(),
            digit_rows: digit_rows.into_boxed_slice(),
            extenders: extenders.into_boxed_slice(),
            key_rows: (0..level_moduli)
                .chain(num_moduli..num_moduli + p_ops.len())
                .collect(),
            mod_down: BaseConverter::new(&ctx_p.rns, &ctx.rns)?,
            ctx_qp,
            ctx_p,
            p_inv: p_inv.into_boxed_slice(),
        })
    }
}

/// Builder for parameters for the CKKS encryption scheme.
#[derive(Debug)]
pub struct CkksParametersBuilder {
    degree: usize,
    variance: usize,
    scale: Option<f64>,
    exact_modulus: bool,
    security_level: SecurityLevel,
    keyswitch_method: KeySwitchMethod,
    ciphertext_moduli: Vec<u64>,
    ciphertext_moduli_sizes: Vec<usize>,
    special_moduli: Vec<u64>,
    special_moduli_sizes: Vec<usize>,
    default_moduli: Option<(usize, usize)>,
}

impl CkksParametersBuilder {
    /// Creates a new instance of the builder
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            degree: Default::default(),
            variance: 10,
            scale: None,
            exact_modulus: false,
            security_level: SecurityLevel::default(),
            keyswitch_method: KeySwitchMethod::default(),
            ciphertext_moduli: Default::default(),
            ciphertext_moduli_sizes: Default::default(),
            special_moduli: Default::default(),
            special_moduli_sizes: Default::default(),
            default_moduli: None,
        }
    }

    /// Sets the polynomial degree. Building fails if the degree is not a
    /// power of two between 8 and 65536.
    pub fn set_degree(&mut self, degree: usize) -> &mut Self {
        self.degree = degree;
        self
    }

    /// Sets the sizes of the ciphertext moduli.
    /// Only one of `set_moduli_sizes`, `set_moduli` and `set_default_moduli`
    /// can be specified.
    pub fn set_moduli_sizes(&mut self, sizes: &[usize]) -> &mut Self {
        self.ciphertext_moduli_sizes = sizes.to_owned();
        self
    }

    /// Sets the ciphertext moduli to use.
    /// Only one of `set_moduli_sizes`, `set_moduli` and `set_default_moduli`
    /// can be specified.
    pub fn set_moduli(&mut self, moduli: &[u64]) -> &mut Self {
        self.ciphertext_moduli = moduli.to_owned();
        self
    }

    /// Sets the sizes of the special moduli used for key switching.
    pub fn set_special_moduli_sizes(&mut self, sizes: &[usize]) -> &mut Self {
        self.special_moduli_sizes = sizes.to_owned();
        self
    }

    /// Sets the special moduli used for key switching.
    pub fn set_special_moduli(&mut self, moduli: &[u64]) -> &mut Self {
        self.special_moduli = moduli.to_owned();
        self
    }

    /// Generates `num_moduli` ciphertext moduli and `num_special` special
    /// moduli from the scale: the first modulus has 20 more bits than the
    /// scale (capped to 60 bits), the others as many bits as the scale, and
    /// the special moduli 60 bits.
    pub fn set_default_moduli(&mut self, num_moduli: usize, num_special: usize) -> &mut Self {
        self.default_moduli = Some((num_moduli, num_special));
        self
    }

    /// Chooses the ciphertext moduli after the first one as close as possible
    /// to the scale, alternately above and below it.
    pub fn set_exact_modulus(&mut self, exact: bool) -> &mut Self {
        self.exact_modulus = exact;
        self
    }

    /// Sets the default scale.
    pub fn set_scale(&mut self, scale: f64) -> &mut Self {
        self.scale = Some(scale);
        self
    }

    /// Sets the default scale to 2^log_scale.
    pub fn set_log_scale(&mut self, log_scale: usize) -> &mut Self {
        self.scale = Some((log_scale as f64).exp2());
        self
    }

    /// Sets the security level.
    pub fn set_security_level(&mut self, level: SecurityLevel) -> &mut Self {
        self.security_level = level;
        self
    }

    /// Sets the key switching method.
    pub fn set_keyswitch_method(&mut self, method: KeySwitchMethod) -> &mut Self {
        self.keyswitch_method = method;
        self
    }

    /// Sets the error variance. Building fails if the variance is not between
    /// one and sixteen.
    pub fn set_variance(&mut self, variance: usize) -> &mut Self {
        self.variance = variance;
        self
    }

    /// Generate moduli with the specified sizes, distinct from `exclude`.
    fn generate_moduli(sizes: &[usize], degree: usize, exclude: &mut Vec<u64>) -> Result<Vec<u64>> {
        let mut moduli = vec![];
        for size in sizes {
            if *size > 62 || *size < 10 {
                return Err(Error::ParametersError(ParametersError::InvalidModulusSize(
                    *size, 10, 62,
                )));
            }

            let mut upper_bound = 1 << size;
            loop {
                if let Some(prime) = generate_prime(*size, 2 * degree as u64, upper_bound) {
                    if !exclude.contains(&prime) {
                        exclude.push(prime);
                        moduli.push(prime);
                        break;
                    } else {
                        upper_bound = prime;
                    }
                } else {
                    return Err(Error::ParametersError(ParametersError::NotEnoughPrimes(
                        *size, degree,
                    )));
                }
            }
        }
        Ok(moduli)
    }

    /// Generate `count` moduli as close as possible to 2^log_scale, starting
    /// below it and then alternating.
    fn generate_exact_moduli(
        count: usize,
        log_scale: usize,
        degree: usize,
        exclude: &mut Vec<u64>,
    ) -> Result<Vec<u64>> {
        if !(10..62).contains(&log_scale) {
            return Err(Error::ParametersError(ParametersError::InvalidModulusSize(
                log_scale, 10, 61,
            )));
        }
        let modulo = 2 * degree as u64;
        let mut below = 1u64 << log_scale;
        let mut above = 1u64 << log_scale;
        let mut moduli = vec![];
        while moduli.len() < count {
            let candidate = if moduli.len() % 2 == 0 {
                let p = generate_prime(log_scale, modulo, below);
                below = p.unwrap_or(below);
                p
            } else {
                let p = generate_prime_above(modulo, above, 1 << 62);
                above = p.unwrap_or(above);
                p
            };
            let prime = candidate.ok_or(Error::ParametersError(
                ParametersError::NotEnoughPrimes(log_scale, degree),
            ))?;
            if !exclude.contains(&prime) {
                exclude.push(prime);
                moduli.push(prime);
            }
        }
        Ok(moduli)
    }

    /// Resolve the ciphertext and special moduli.
    fn resolve_moduli(&self, log_scale: usize) -> Result<(Vec<u64>, Vec<u64>)> {
        let explicit = [
            !self.ciphertext_moduli.is_empty(),
            !self.ciphertext_moduli_sizes.is_empty(),
            self.default_moduli.is_some(),
        ];
        match explicit.iter().filter(|b| **b).count() {
            0 => {
                return Err(Error::ParametersError(ParametersError::TooFewSpecified(
                    "One of `moduli`, `moduli_sizes` and `default_moduli` must be specified"
                        .to_string(),
                )))
            }
            1 => {}
            _ => {
                return Err(Error::ParametersError(ParametersError::TooManySpecified(
                    "Only one of `moduli`, `moduli_sizes` and `default_moduli` can be specified"
                        .to_string(),
                )))
            }
        }
        if !self.special_moduli.is_empty()
            && (!self.special_moduli_sizes.is_empty() || self.default_moduli.is_some())
        {
            return Err(Error::ParametersError(ParametersError::TooManySpecified(
                "Only one of `special_moduli`, `special_moduli_sizes` and `default_moduli` can be specified"
                    .to_string(),
            )));
        }
        if self.default_moduli.is_some() && !self.special_moduli_sizes.is_empty() {
            return Err(Error::ParametersError(ParametersError::TooManySpecified(
                "Only one of `special_moduli_sizes` and `default_moduli` can be specified"
                    .to_string(),
            )));
        }

        let (q_sizes, p_sizes) = match self.default_moduli {
            Some((num_moduli, num_special)) => {
                if num_moduli == 0 {
                    return Err(Error::ParametersError(ParametersError::TooFewSpecified(
                        "At least one ciphertext modulus is required".to_string(),
                    )));
                }
                let mut sizes = vec![(log_scale + 20).min(60)];
                sizes.extend(vec![log_scale; num_moduli - 1]);
                (sizes, vec![60; num_special])
            }
            None => (
                self.ciphertext_moduli_sizes.clone(),
                self.special_moduli_sizes.clone(),
            ),
        };

        let mut used = self
            .ciphertext_moduli
            .iter()
            .chain(self.special_moduli.iter())
            .copied()
            .collect_vec();

        let moduli = if !self.ciphertext_moduli.is_empty() {
            self.ciphertext_moduli.clone()
        } else if self.exact_modulus {
            let mut moduli = Self::generate_moduli(&q_sizes[..1], self.degree, &mut used)?;
            moduli.extend(Self::generate_exact_moduli(
                q_sizes.len() - 1,
                log_scale,
                self.degree,
                &mut used,
            )?);
            moduli
        } else {
            Self::generate_moduli(&q_sizes, self.degree, &mut used)?
        };

        let special = if !self.special_moduli.is_empty() {
            self.special_moduli.clone()
        } else {
            Self::generate_moduli(&p_sizes, self.degree, &mut used)?
        };

        if moduli.iter().chain(special.iter()).duplicates().next().is_some() {
            return Err(Error::ParametersError(ParametersError::TooManySpecified(
                "The moduli must be distinct".to_string(),
            )));
        }
        Ok((moduli, special))
    }

    /// Build a new `CkksParameters` inside an `Arc`.
    pub fn build_arc(&self) -> Result<Arc<CkksParameters>> {
        self.build().map(Arc::new)
    }

    /// Build a new `CkksParameters`.
    pub fn build(&self) -> Result<CkksParameters> {
        // Check that the degree is a power of 2 (and large enough).
        if self.degree < 8 || self.degree > 65536 || !self.degree.is_power_of_two() {
            return Err(Error::ParametersError(ParametersError::InvalidDegree(
                self.degree,
            )));
        }
        let max_bits = self
            .security_level
            .max_modulus_bits(self.degree)
            .ok_or(Error::ParametersError(ParametersError::InvalidDegree(
                self.degree,
            )))?;

        if !(1..=16).contains(&self.variance) {
            return Err(Error::ParametersError(ParametersError::InvalidVariance(
                self.variance,
            )));
        }

        let scale = self.scale.unwrap_or((40f64).exp2());
        if !scale.is_finite() || scale < 1.0 {
            return Err(Error::ParametersError(ParametersError::InvalidScale(
                format!("{scale}"),
            )));
        }
        let log_scale = scale.log2().round() as usize;

        let (moduli, special_moduli) = self.resolve_moduli(log_scale)?;

        let moduli_sizes = moduli
            .iter()
            .map(|m| 64 - m.leading_zeros() as usize)
            .collect_vec();
        let special_sizes = special_moduli
            .iter()
            .map(|m| 64 - m.leading_zeros() as usize)
            .collect_vec();

        let total_bits = moduli_sizes.iter().chain(special_sizes.iter()).sum::<usize>();
        if total_bits > max_bits {
            return Err(Error::ParametersError(
                ParametersError::InsufficientSecurity(total_bits, max_bits),
            ));
        }

        let digits = self
            .keyswitch_method
            .digits(moduli.len(), special_moduli.len());
        if !special_moduli.is_empty() {
            let special_bits = special_sizes.iter().sum::<usize>();
            if let Some(digit_bits) = digits
                .iter()
                .map(|d| moduli_sizes[d.clone()].iter().sum::<usize>())
                .max()
                .filter(|bits| *bits > special_bits)
            {
                return Err(Error::ParametersError(
                    ParametersError::InvalidKeySwitchMethod(format!(
                        "{}: the special modulus has {special_bits} bits, below the {digit_bits} bits of a digit",
                        self.keyswitch_method
                    )),
                ));
            }
        }

        let top = Context::new_arc(&moduli, self.degree)?;
        let ctx = (0..moduli.len())
            .map(|i| top.context_at_level(i))
            .collect::<fhe_math::Result<Vec<_>>>()?;

        let (ctx_qp, p_mod_q, key_switch) = if special_moduli.is_empty() {
            (None, vec![], vec![])
        } else {
            let p_ops = Context::operators(&special_moduli, self.degree)?;
            let qp_ops = top.ops.iter().chain(p_ops.iter()).cloned().collect_vec();
            let ctx_qp = Arc::new(Context::single_level(&qp_ops, self.degree)?);
            let p_mod_q = moduli
                .iter()
                .map(|qi| -> Result<u64> {
                    let q = Modulus::new(*qi)?;
                    Ok(special_moduli
                        .iter()
                        .fold(1u64, |acc, pj| q.mul(acc, q.reduce(*pj))))
                })
                .collect::<Result<Vec<_>>>()?;
            let key_switch = ctx
                .iter()
                .map(|c| KeySwitchParameters::new(c, &p_ops, &digits, moduli.len()))
                .collect::<Result<Vec<_>>>()?;
            (Some(ctx_qp), p_mod_q, key_switch)
        };

        let mut par = CkksParameters {
            polynomial_degree: self.degree,
            moduli: moduli.into_boxed_slice(),
            moduli_sizes: moduli_sizes.into_boxed_slice(),
            special_moduli: special_moduli.into_boxed_slice(),
            scale,
            security_level: self.security_level,
            keyswitch_method: self.keyswitch_method,
            variance: self.variance,
            ctx,
            digits: digits.into_boxed_slice(),
            ctx_qp,
            p_mod_q: p_mod_q.into_boxed_slice(),
            key_switch: key_switch.into_boxed_slice(),
            fft: SpecialFft::new(self.degree),
            fingerprint: [0u8; 32],
        };
        par.fingerprint = Sha256::digest(par.to_bytes()).into();

        debug!(
            degree = par.polynomial_degree,
            moduli = par.moduli.len(),
            special_moduli = par.special_moduli.len(),
            total_bits,
            method = %par.keyswitch_method,
            "generated CKKS parameters"
        );
        Ok(par)
    }
}

impl Serialize for CkksParameters {
    fn to_bytes(&self) -> Vec<u8> {
        Parameters {
            degree: self.polynomial_degree as u32,
            moduli: self.moduli.to_vec(),
            special_moduli: self.special_moduli.to_vec(),
            scale: self.scale,
            security_level: self.security_level.to_u32(),
            keyswitch_method: self.keyswitch_method.to_u32(),
            variance: self.variance as u32,
        }
        .encode_to_vec()
    }
}

impl Deserialize for CkksParameters {
    fn try_deserialize(bytes: &[u8]) -> Result<Self> {
        let params: Parameters = Message::decode(bytes).map_err(|_| Error::SerializationError)?;
        let mut builder = CkksParametersBuilder::new();
        builder
            .set_degree(params.degree as usize)
            .set_moduli(&params.moduli)
            .set_scale(params.scale)
            .set_security_level(SecurityLevel::try_from_u32(params.security_level)?)
            .set_keyswitch_method(KeySwitchMethod::try_from_u32(params.keyswitch_method)?)
            .set_variance(params.variance as usize);
        if !params.special_moduli.is_empty() {
            builder.set_special_moduli(&params.special_moduli);
        }
        builder.build()
    }
    type Error = Error;
}

#[cfg(test)]
mod tests {
    use super::{CkksParameters, CkksParametersBuilder, KeySwitchMethod, ModulusInfo, SecurityLevel};
    use crate::{Error, ErrorCategory, ParametersError};
    use fhe_traits::{Deserialize, Serialize};
    use std::error::Error as StdError;

    #[test]
    fn default() {
        let params = CkksParameters::default_arc(3, 16);
        assert_eq!(params.moduli.len(), 3);
        assert_eq!(params.moduli_sizes(), &[60, 40, 40]);
        assert_eq!(params.special_moduli().len(), 1);
        assert_eq!(params.degree(), 16);
        assert_eq!(params.slots(), 8);
        assert_eq!(params.max_level(), 2);
        assert_eq!(params.scale(), (40f64).exp2());
        assert!(params.supports_key_switching());
    }

    #[test]
    fn ciphertext_moduli() -> Result<(), Box<dyn StdError>> {
        let params = CkksParametersBuilder::new()
            .set_degree(8)
            .set_moduli_sizes(&[62, 62, 62, 61, 60, 11])
            .set_security_level(SecurityLevel::None)
            .build()?;
        assert_eq!(
            params.moduli.to_vec(),
            &[
                4611686018427387761,
                4611686018427387617,
                4611686018427387409,
                2305843009213693921,
                1152921504606846577,
                2017
            ]
        );

        let params = CkksParametersBuilder::new()
            .set_degree(8)
            .set_moduli(&[
                4611686018427387761,
                4611686018427387617,
                4611686018427387409,
                2305843009213693921,
                1152921504606846577,
                2017,
            ])
            .set_security_level(SecurityLevel::None)
            .build()?;
        assert_eq!(params.moduli_sizes.to_vec(), &[62, 62, 62, 61, 60, 11]);
        assert!(!params.supports_key_switching());
        Ok(())
    }

    #[test]
    fn builder_errors() {
        let mut builder = CkksParametersBuilder::new();
        builder
            .set_moduli_sizes(&[60, 40])
            .set_security_level(SecurityLevel::None);
        assert_eq!(
            builder.set_degree(0).build().unwrap_err(),
            Error::ParametersError(ParametersError::InvalidDegree(0))
        );
        assert_eq!(
            builder.set_degree(24).build().unwrap_err(),
            Error::ParametersError(ParametersError::InvalidDegree(24))
        );
        assert_eq!(
            builder.set_degree(1 << 17).build().unwrap_err(),
            Error::ParametersError(ParametersError::InvalidDegree(1 << 17))
        );

        builder.set_degree(16);
        assert!(builder.build().is_ok());
        assert_eq!(
            builder.set_moduli(&[1153]).build().unwrap_err(),
            Error::ParametersError(ParametersError::TooManySpecified(
                "Only one of `moduli`, `moduli_sizes` and `default_moduli` can be specified"
                    .to_string()
            ))
        );
        assert_eq!(
            builder.set_moduli(&[]).set_moduli_sizes(&[]).build().unwrap_err(),
            Error::ParametersError(ParametersError::TooFewSpecified(
                "One of `moduli`, `moduli_sizes` and `default_moduli` must be specified"
                    .to_string()
            ))
        );
        assert_eq!(
            builder.set_moduli_sizes(&[63]).build().unwrap_err(),
            Error::ParametersError(ParametersError::InvalidModulusSize(63, 10, 62))
        );
        assert_eq!(
            builder.set_moduli_sizes(&[9]).build().unwrap_err(),
            Error::ParametersError(ParametersError::InvalidModulusSize(9, 10, 62))
        );
        assert_eq!(
            builder.set_moduli_sizes(&[40]).set_variance(0).build().unwrap_err(),
            Error::ParametersError(ParametersError::InvalidVariance(0))
        );
        assert_eq!(
            builder.set_variance(10).set_scale(-1.0).build().unwrap_err(),
            Error::ParametersError(ParametersError::InvalidScale("-1".to_string()))
        );
    }

    #[test]
    fn security() {
        // A degree below the table cannot be used with a security level.
        let err = CkksParametersBuilder::new()
            .set_degree(512)
            .set_moduli_sizes(&[20])
            .set_security_level(SecurityLevel::Sec128)
            .build()
            .unwrap_err();
        assert_eq!(err, Error::ParametersError(ParametersError::InvalidDegree(512)));
        assert_eq!(err.category(), ErrorCategory::Configuration);

        let err = CkksParametersBuilder::new()
            .set_degree(1024)
            .set_moduli_sizes(&[20, 20])
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            Error::ParametersError(ParametersError::InsufficientSecurity(40, 27))
        );

        assert!(CkksParametersBuilder::new()
            .set_degree(2048)
            .set_moduli_sizes(&[27])
            .set_special_moduli_sizes(&[27])
            .set_log_scale(20)
            .build()
            .is_ok());

        assert_eq!(SecurityLevel::Sec192.max_modulus_bits(32768), Some(611));
        assert_eq!(SecurityLevel::Sec256.max_modulus_bits(8192), Some(118));
        assert_eq!(SecurityLevel::Sec128.max_modulus_bits(8), None);
    }

    #[test]
    fn default_moduli() -> Result<(), Box<dyn StdError>> {
        let params = CkksParametersBuilder::new()
            .set_degree(16)
            .set_log_scale(30)
            .set_default_moduli(4, 2)
            .set_security_level(SecurityLevel::None)
            .set_keyswitch_method(KeySwitchMethod::III)
            .build()?;
        assert_eq!(params.moduli_sizes(), &[50, 30, 30, 30]);
        assert_eq!(params.special_moduli().len(), 2);
        assert!(params
            .special_moduli()
            .iter()
            .all(|p| 64 - p.leading_zeros() == 60));
        assert_eq!(params.digits.len(), 2);
        assert_eq!(params.key_switch[0].digit_ctx.len(), 2);
        assert_eq!(params.key_switch[2].digit_ctx.len(), 1);
        assert_eq!(params.key_switch[2].digit_rows[0], vec![0, 1]);
        assert_eq!(params.key_switch[3].digit_rows[0], vec![0]);

        assert!(CkksParametersBuilder::new()
            .set_degree(16)
            .set_log_scale(30)
            .set_default_moduli(4, 2)
            .set_special_moduli(&[1153])
            .set_security_level(SecurityLevel::None)
            .build()
            .is_err());
        Ok(())
    }

    #[test]
    fn exact_modulus() -> Result<(), Box<dyn StdError>> {
        let params = CkksParametersBuilder::new()
            .set_degree(32)
            .set_log_scale(40)
            .set_default_moduli(5, 1)
            .set_exact_modulus(true)
            .set_security_level(SecurityLevel::None)
            .build()?;
        let target = 1u64 << 40;
        let moduli = params.moduli();
        assert!(moduli[1] < target);
        assert!(moduli[2] > target);
        assert!(moduli[3] < moduli[1]);
        assert!(moduli[4] > moduli[2]);
        for q in &moduli[1..] {
            assert_eq!(q % 64, 1);
            assert!(q.abs_diff(target) < 1 << 20);
        }
        Ok(())
    }

    #[test]
    fn keyswitch_method() {
        let err = CkksParametersBuilder::new()
            .set_degree(16)
            .set_moduli_sizes(&[60, 40, 40])
            .set_special_moduli_sizes(&[60])
            .set_keyswitch_method(KeySwitchMethod::I)
            .set_security_level(SecurityLevel::None)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ParametersError(ParametersError::InvalidKeySwitchMethod(_))
        ));

        let params = CkksParametersBuilder::new()
            .set_degree(16)
            .set_moduli_sizes(&[50, 40])
            .set_special_moduli_sizes(&[50, 50])
            .set_keyswitch_method(KeySwitchMethod::I)
            .set_security_level(SecurityLevel::None)
            .build();
        assert!(params.is_ok());
        let params = params.unwrap();
        assert_eq!(params.digits.len(), 1);
        assert_eq!(params.key_switch[0].key_rows.to_vec(), &[0, 1, 2, 3]);
        assert_eq!(params.key_switch[1].key_rows.to_vec(), &[0, 2, 3]);
    }

    #[test]
    fn coefficient_moduli() -> Result<(), Box<dyn StdError>> {
        let params = CkksParameters::default_arc(3, 16);
        let moduli = params.coefficient_moduli();
        assert_eq!(moduli.len(), 3);
        for (info, q) in moduli.iter().zip(params.moduli()) {
            assert_eq!(info.value, *q);
            assert_eq!(info.barrett, u128::MAX / (*q as u128));
        }

        let mut short = [ModulusInfo::default(); 2];
        let err = params.copy_coefficient_moduli(&mut short).unwrap_err();
        assert_eq!(err, Error::BufferTooSmall(2, 3));
        assert_eq!(err.category(), ErrorCategory::Resource);

        let mut buffer = [ModulusInfo::default(); 4];
        assert_eq!(params.copy_coefficient_moduli(&mut buffer)?, 3);
        assert_eq!(&buffer[..3], moduli.as_slice());
        Ok(())
    }

    #[test]
    fn levels() -> Result<(), Box<dyn StdError>> {
        let params = CkksParameters::default_arc(4, 16);
        for level in 0..=params.max_level() {
            let ctx = params.ctx_at_level(level)?;
            assert_eq!(ctx.moduli().len(), 4 - level);
            assert_eq!(params.level_of_ctx(ctx)?, level);
        }
        assert_eq!(
            params.ctx_at_level(4).unwrap_err(),
            Error::InvalidLevel(4, 3)
        );
        Ok(())
    }

    #[test]
    fn serialize() -> Result<(), Box<dyn StdError>> {
        for params in [
            CkksParameters::default_arc(1, 16),
            CkksParameters::default_arc(4, 32),
        ] {
            let bytes = params.to_bytes();
            let params_deserialized = CkksParameters::try_deserialize(&bytes)?;
            assert_eq!(params.as_ref(), &params_deserialized);
            assert_eq!(params.moduli(), params_deserialized.moduli());
            assert_eq!(params.special_moduli(), params_deserialized.special_moduli());
            assert_eq!(params.scale(), params_deserialized.scale());
            assert_eq!(params.fingerprint(), params_deserialized.fingerprint());
        }
        assert_eq!(
            CkksParameters::try_deserialize(&[1, 2, 3]).unwrap_err(),
            Error::SerializationError
        );
        Ok(())
    }
}
