//! Encoding of complex vectors into plaintexts through the canonical
//! embedding.

use crate::ckks::{CkksParameters, Plaintext};
use crate::{Error, Result};
use fhe_math::rq::{traits::TryConvertFrom, Context, Poly, Representation};
use fhe_traits::{FheDecoder, FheEncoder};
use itertools::Itertools;
use num_bigint::BigInt;
use num_complex::Complex64;
use num_traits::{FromPrimitive, Zero};
use std::f64::consts::PI;
use std::sync::Arc;

/// Values whose magnitude is below this bound are rounded through i64.
const I64_BOUND: f64 = 4611686018427387904.0;

/// Special FFT over the rotation group generated by 5 modulo 2N.
///
/// Slot j of a polynomial m holds m(ζ^(5^j)) where ζ is a primitive 2N-th root
/// of unity.
#[derive(Debug, Clone)]
pub(crate) struct SpecialFft {
    slots: usize,
    m: usize,
    rot_group: Box<[usize]>,
    roots: Box<[Complex64]>,
}

impl SpecialFft {
    pub(crate) fn new(degree: usize) -> Self {
        let slots = degree >> 1;
        let m = degree << 1;
        let mut rot_group = Vec::with_capacity(slots);
        let mut g = 1usize;
        for _ in 0..slots {
            rot_group.push(g);
            g = (g * 5) % m;
        }
        let roots = (0..=m)
            .map(|k| Complex64::from_polar(1.0, 2.0 * PI * (k as f64) / (m as f64)))
            .collect();
        Self {
            slots,
            m,
            rot_group: rot_group.into_boxed_slice(),
            roots,
        }
    }

    pub(crate) fn slots(&self) -> usize {
        self.slots
    }

    /// Returns 5^step modulo 2N.
    pub(crate) fn rotation_exponent(&self, step: usize) -> usize {
        self.rot_group[step % self.slots]
    }

    /// Twiddle factor of the butterfly `j` in blocks of length `len`.
    pub(crate) fn twiddle(&self, len: usize, j: usize, inverse: bool) -> Complex64 {
        let quarter = len << 2;
        let gap = self.m / quarter;
        let r = self.rot_group[j] % quarter;
        if inverse {
            self.roots[(quarter - r) * gap]
        } else {
            self.roots[r * gap]
        }
    }

    /// Forward butterflies, on input in bit-reversed order.
    pub(crate) fn forward_stages(&self, v: &mut [Complex64]) {
        let mut len = 2;
        while len <= self.slots {
            let half = len >> 1;
            for i in (0..self.slots).step_by(len) {
                for j in 0..half {
                    let u = v[i + j];
                    let w = v[i + j + half] * self.twiddle(len, j, false);
                    v[i + j] = u + w;
                    v[i + j + half] = u - w;
                }
            }
            len <<= 1;
        }
    }

    /// Inverse butterflies, with output in bit-reversed order and not
    /// normalized.
    pub(crate) fn inverse_stages(&self, v: &mut [Complex64]) {
        let mut len = self.slots;
        while len >= 2 {
            let half = len >> 1;
            for i in (0..self.slots).step_by(len) {
                for j in 0..half {
                    let u = v[i + j] + v[i + j + half];
                    let w = (v[i + j] - v[i + j + half]) * self.twiddle(len, j, true);
                    v[i + j] = u;
                    v[i + j + half] = w;
                }
            }
            len >>= 1;
        }
    }

    /// Evaluate the packed coefficients at the slots.
    pub(crate) fn forward(&self, v: &mut [Complex64]) {
        debug_assert_eq!(v.len(), self.slots);
        bit_reverse(v);
        self.forward_stages(v);
    }

    /// Interpolate the packed coefficients from the slots.
    pub(crate) fn inverse(&self, v: &mut [Complex64]) {
        debug_assert_eq!(v.len(), self.slots);
        self.inverse_stages(v);
        bit_reverse(v);
        let n = self.slots as f64;
        v.iter_mut().for_each(|x| *x /= n);
    }
}

/// Permute a slice of power-of-two length into bit-reversed order.
pub(crate) fn bit_reverse<T>(v: &mut [T]) {
    let n = v.len();
    if n <= 1 {
        return;
    }
    let shift = usize::BITS - n.trailing_zeros();
    for i in 0..n {
        let j = i.reverse_bits() >> shift;
        if i < j {
            v.swap(i, j);
        }
    }
}

/// Scale and level at which values are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CkksEncoding {
    scale: Option<f64>,
    level: usize,
}

impl CkksEncoding {
    /// An encoding at a given scale and level.
    pub fn new(scale: f64, level: usize) -> Self {
        Self {
            scale: Some(scale),
            level,
        }
    }

    /// An encoding at the default scale of the parameters and at the given
    /// level.
    pub fn at_level(level: usize) -> Self {
        Self { scale: None, level }
    }

    /// Returns the scale, if one was set.
    pub fn scale(&self) -> Option<f64> {
        self.scale
    }

    /// Returns the level.
    pub fn level(&self) -> usize {
        self.level
    }
}

/// Encoder and decoder of complex or real vectors.
#[derive(Debug, Clone)]
pub struct Encoder {
    par: Arc<CkksParameters>,
}

impl Encoder {
    /// Create an encoder for the parameters.
    pub fn new(par: &Arc<CkksParameters>) -> Self {
        Self { par: par.clone() }
    }

    /// Returns the number of slots.
    pub fn slots(&self) -> usize {
        self.par.slots()
    }

    /// Encode complex values at a given scale and level. Fewer values than
    /// slots are padded with zeros.
    pub fn encode_complex(
        &self,
        values: &[Complex64],
        scale: f64,
        level: usize,
    ) -> Result<Plaintext> {
        let n = self.par.slots();
        if values.len() > n {
            return Err(Error::TooManyValues(values.len(), n));
        }
        check_scale(scale)?;
        let ctx = self.par.ctx_at_level(level)?;

        let mut u = values.to_vec();
        u.resize(n, Complex64::zero());
        self.par.fft.inverse(&mut u);

        let mut coeffs = vec![0f64; self.par.degree()];
        for (i, ui) in u.iter().enumerate() {
            coeffs[i] = ui.re * scale;
            coeffs[i + n] = ui.im * scale;
        }
        let poly = rounded_poly(&coeffs, ctx)?;
        Ok(Plaintext::from_parts(&self.par, poly, scale, level))
    }

    /// Encode real values at a given scale and level.
    pub fn encode(&self, values: &[f64], scale: f64, level: usize) -> Result<Plaintext> {
        let values = values
            .iter()
            .map(|v| Complex64::new(*v, 0.0))
            .collect_vec();
        self.encode_complex(&values, scale, level)
    }

    /// Encode a constant in every slot.
    pub fn encode_constant(&self, value: Complex64, scale: f64, level: usize) -> Result<Plaintext> {
        check_scale(scale)?;
        let ctx = self.par.ctx_at_level(level)?;
        let n = self.par.slots();
        let mut coeffs = vec![0f64; n + 1];
        coeffs[0] = value.re * scale;
        coeffs[n] = value.im * scale;
        let poly = rounded_poly(&coeffs, ctx)?;
        Ok(Plaintext::from_parts(&self.par, poly, scale, level))
    }

    /// Decode the slots of a plaintext.
    pub fn decode_complex(&self, pt: &Plaintext) -> Result<Vec<Complex64>> {
        if pt.par != self.par {
            return Err(Error::ContextMismatch);
        }
        let mut poly = pt.poly.clone();
        poly.change_representation(Representation::PowerBasis);
        let coeffs = poly.to_centered_f64();
        let n = self.par.slots();
        let mut u = (0..n)
            .map(|i| Complex64::new(coeffs[i] / pt.scale, coeffs[i + n] / pt.scale))
            .collect_vec();
        self.par.fft.forward(&mut u);
        Ok(u)
    }

    /// Decode the real part of the slots of a plaintext.
    pub fn decode(&self, pt: &Plaintext) -> Result<Vec<f64>> {
        Ok(self.decode_complex(pt)?.into_iter().map(|z| z.re).collect())
    }
}

fn check_scale(scale: f64) -> Result<()> {
    if scale.is_finite() && scale > 0.0 {
        Ok(())
    } else {
        Err(Error::UnspecifiedInput(format!("Invalid scale: {scale}")))
    }
}

/// Round scaled coefficients to a polynomial in Ntt representation.
fn rounded_poly(values: &[f64], ctx: &Arc<Context>) -> Result<Poly> {
    if values.iter().any(|v| !v.is_finite()) {
        return Err(Error::UnspecifiedInput(
            "Cannot encode non-finite values".to_string(),
        ));
    }
    let mut poly = if values.iter().all(|v| v.abs() < I64_BOUND) {
        let coeffs = values.iter().map(|v| v.round() as i64).collect_vec();
        Poly::try_convert_from(coeffs.as_slice(), ctx, Representation::PowerBasis)?
    } else {
        let coeffs = values
            .iter()
            .map(|v| BigInt::from_f64(v.round()).unwrap_or_default())
            .collect_vec();
        Poly::try_convert_from(coeffs.as_slice(), ctx, Representation::PowerBasis)?
    };
    poly.change_representation(Representation::Ntt);
    Ok(poly)
}

impl FheEncoder<&[Complex64]> for Plaintext {
    type Error = Error;

    fn try_encode(
        value: &[Complex64],
        encoding: CkksEncoding,
        par: &Arc<CkksParameters>,
    ) -> Result<Self> {
        let scale = encoding.scale.unwrap_or(par.scale());
        Encoder::new(par).encode_complex(value, scale, encoding.level)
    }
}

impl FheEncoder<&[f64]> for Plaintext {
    type Error = Error;

    fn try_encode(
        value: &[f64],
        encoding: CkksEncoding,
        par: &Arc<CkksParameters>,
    ) -> Result<Self> {
        let scale = encoding.scale.unwrap_or(par.scale());
        Encoder::new(par).encode(value, scale, encoding.level)
    }
}

fn check_encoding(pt: &Plaintext, encoding: Option<CkksEncoding>) -> Result<()> {
    if let Some(encoding) = encoding {
        if encoding.level != pt.level || encoding.scale.is_some_and(|s| s != pt.scale) {
            return Err(Error::EncodingMismatch(
                format!("{encoding:?}"),
                format!("{:?}", CkksEncoding::new(pt.scale, pt.level)),
            ));
        }
    }
    Ok(())
}

impl FheDecoder<Plaintext> for Vec<Complex64> {
    type Error = Error;

    fn try_decode<O>(pt: &Plaintext, encoding: O) -> Result<Self>
    where
        O: Into<Option<CkksEncoding>>,
    {
        check_encoding(pt, encoding.into())?;
        Encoder::new(&pt.par).decode_complex(pt)
    }
}

impl FheDecoder<Plaintext> for Vec<f64> {
    type Error = Error;

    fn try_decode<O>(pt: &Plaintext, encoding: O) -> Result<Self>
    where
        O: Into<Option<CkksEncoding>>,
    {
        check_encoding(pt, encoding.into())?;
        Encoder::new(&pt.par).decode(pt)
    }
}

#[cfg(test)]
mod tests {
    use super::{bit_reverse, CkksEncoding, Encoder, SpecialFft};
    use crate::ckks::{CkksParameters, Plaintext};
    use crate::Error;
    use fhe_traits::{FheDecoder, FheEncoder};
    use num_complex::Complex64;
    use proptest::collection::vec as prop_vec;
    use rand::{thread_rng, Rng};
    use std::error::Error as StdError;

    fn random_values(n: usize) -> Vec<Complex64> {
        let mut rng = thread_rng();
        (0..n)
            .map(|_| Complex64::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)))
            .collect()
    }

    fn max_error(a: &[Complex64], b: &[Complex64]) -> f64 {
        a.iter()
            .zip(b)
            .map(|(x, y)| (x - y).norm())
            .fold(0.0, f64::max)
    }

    #[test]
    fn bit_reversal() {
        let mut v = (0..8).collect::<Vec<_>>();
        bit_reverse(&mut v);
        assert_eq!(v, &[0, 4, 2, 6, 1, 5, 3, 7]);
    }

    #[test]
    fn special_fft() {
        let fft = SpecialFft::new(32);
        let z = random_values(16);
        let mut v = z.clone();
        fft.inverse(&mut v);
        fft.forward(&mut v);
        assert!(max_error(&v, &z) < 1e-12);
        assert_eq!(fft.rotation_exponent(0), 1);
        assert_eq!(fft.rotation_exponent(2), 25);
        assert_eq!(fft.rotation_exponent(16), 1);
    }

    proptest! {
        #[test]
        fn automorphism_rotates_slots(
            values in prop_vec((-1.0f64..1.0, -1.0f64..1.0), 16),
            step in 0usize..16,
        ) {
            let n = 32;
            let fft = SpecialFft::new(n);
            let z = values.iter().map(|(re, im)| Complex64::new(*re, *im)).collect::<Vec<_>>();
            let mut u = z.clone();
            fft.inverse(&mut u);
            let m = (0..n)
                .map(|i| if i < n / 2 { u[i].re } else { u[i - n / 2].im })
                .collect::<Vec<_>>();

            // m(X) -> m(X^g) in Z[X]/(X^n + 1).
            let g = fft.rotation_exponent(step);
            let mut rotated = vec![0.0; n];
            for (i, mi) in m.iter().enumerate() {
                let j = (i * g) % (2 * n);
                if j < n {
                    rotated[j] += mi;
                } else {
                    rotated[j - n] -= mi;
                }
            }

            let mut v = (0..n / 2)
                .map(|i| Complex64::new(rotated[i], rotated[i + n / 2]))
                .collect::<Vec<_>>();
            fft.forward(&mut v);
            for (j, vj) in v.iter().enumerate() {
                prop_assert!((vj - z[(j + step) % (n / 2)]).norm() < 1e-9);
            }
        }
    }

    #[test]
    fn canonical_embedding() -> Result<(), Box<dyn StdError>> {
        // Slot j holds the evaluation of the message at ζ^(5^j).
        let fft = SpecialFft::new(16);
        let z = random_values(8);
        let mut u = z.clone();
        fft.inverse(&mut u);
        let coeffs = (0..16)
            .map(|i| if i < 8 { u[i].re } else { u[i - 8].im })
            .collect::<Vec<_>>();
        for (j, zj) in z.iter().enumerate() {
            let root = Complex64::from_polar(
                1.0,
                2.0 * std::f64::consts::PI * fft.rotation_exponent(j) as f64 / 32.0,
            );
            let eval = coeffs
                .iter()
                .rev()
                .fold(Complex64::new(0.0, 0.0), |acc, c| acc * root + c);
            assert!((eval - zj).norm() < 1e-12);
        }
        Ok(())
    }

    #[test]
    fn encode_decode() -> Result<(), Box<dyn StdError>> {
        let par = CkksParameters::default_arc(3, 32);
        let encoder = Encoder::new(&par);
        for level in 0..=par.max_level() {
            let z = random_values(16);
            let pt = encoder.encode_complex(&z, par.scale(), level)?;
            assert_eq!(pt.level(), level);
            assert_eq!(pt.scale(), par.scale());
            let decoded = encoder.decode_complex(&pt)?;
            assert!(max_error(&decoded, &z) < 1e-9);
        }

        // Shorter inputs are padded with zeros.
        let pt = encoder.encode(&[0.5, -0.25], par.scale(), 0)?;
        let decoded = encoder.decode(&pt)?;
        assert_eq!(decoded.len(), 16);
        assert!((decoded[0] - 0.5).abs() < 1e-9);
        assert!((decoded[1] + 0.25).abs() < 1e-9);
        assert!(decoded[2..].iter().all(|v| v.abs() < 1e-9));
        Ok(())
    }

    #[test]
    fn large_scale() -> Result<(), Box<dyn StdError>> {
        // The scaled coefficients exceed 64 bits.
        let par = CkksParameters::default_arc(3, 16);
        let encoder = Encoder::new(&par);
        let z = random_values(8);
        let scale = 80f64.exp2();
        let pt = encoder.encode_complex(&z, scale, 0)?;
        assert!(max_error(&encoder.decode_complex(&pt)?, &z) < 1e-9);
        Ok(())
    }

    #[test]
    fn constants() -> Result<(), Box<dyn StdError>> {
        let par = CkksParameters::default_arc(2, 16);
        let encoder = Encoder::new(&par);
        let c = Complex64::new(0.3, -0.7);
        let pt = encoder.encode_constant(c, par.scale(), 1)?;
        let decoded = encoder.decode_complex(&pt)?;
        assert!(decoded.iter().all(|z| (z - c).norm() < 1e-9));
        Ok(())
    }

    #[test]
    fn encoding_errors() {
        let par = CkksParameters::default_arc(2, 16);
        let encoder = Encoder::new(&par);
        assert_eq!(
            encoder.encode(&[0.0; 9], par.scale(), 0).unwrap_err(),
            Error::TooManyValues(9, 8)
        );
        assert_eq!(
            encoder.encode(&[1.0], par.scale(), 2).unwrap_err(),
            Error::InvalidLevel(2, 1)
        );
        assert!(encoder.encode(&[1.0], -1.0, 0).is_err());
        assert!(encoder.encode(&[f64::NAN], par.scale(), 0).is_err());
    }

    #[test]
    fn traits() -> Result<(), Box<dyn StdError>> {
        let par = CkksParameters::default_arc(2, 16);
        let values = [0.1, 0.2, -0.3];
        let pt = Plaintext::try_encode(values.as_slice(), CkksEncoding::at_level(1), &par)?;
        assert_eq!(pt.level(), 1);
        let decoded = Vec::<f64>::try_decode(&pt, CkksEncoding::at_level(1))?;
        for (a, b) in values.iter().zip(&decoded) {
            assert!((a - b).abs() < 1e-9);
        }
        assert!(Vec::<f64>::try_decode(&pt, CkksEncoding::at_level(0)).is_err());
        let decoded = Vec::<Complex64>::try_decode(&pt, Option::<CkksEncoding>::None)?;
        assert_eq!(decoded.len(), 8);
        Ok(())
    }
}
