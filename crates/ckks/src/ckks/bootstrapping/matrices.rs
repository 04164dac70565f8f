//! The butterfly stages of the special FFT as sparse matrices over the slots.
//!
//! A matrix M is stored by its nonzero diagonals: diagonal k holds
//! M[p][(p + k) mod n], so that M·v = Σ_k diag_k ⊙ rot_k(v) where rot_k
//! rotates v by k positions to the left. The bit reversal of the FFT is not
//! part of the transforms: coefficient-to-slot leaves the values in
//! bit-reversed order, which slot-to-coefficient expects.

use std::collections::BTreeMap;

use num_complex::Complex64;
use num_traits::{One, Zero};

use crate::ckks::encoder::SpecialFft;

/// The nonzero diagonals of a matrix over the slots.
pub(crate) type Diagonals = BTreeMap<usize, Vec<Complex64>>;

fn add_entry(d: &mut Diagonals, n: usize, k: usize, p: usize, value: Complex64) {
    d.entry(k % n).or_insert_with(|| vec![Complex64::zero(); n])[p] += value;
}

fn identity(n: usize) -> Diagonals {
    Diagonals::from([(0, vec![Complex64::one(); n])])
}

/// Stage of `forward_stages` over blocks of length `len`.
fn forward_stage(fft: &SpecialFft, len: usize) -> Diagonals {
    let n = fft.slots();
    let half = len >> 1;
    let mut d = Diagonals::new();
    for i in (0..n).step_by(len) {
        for j in 0..half {
            let w = fft.twiddle(len, j, false);
            let (lo, hi) = (i + j, i + j + half);
            add_entry(&mut d, n, 0, lo, Complex64::one());
            add_entry(&mut d, n, half, lo, w);
            add_entry(&mut d, n, n - half, hi, Complex64::one());
            add_entry(&mut d, n, 0, hi, -w);
        }
    }
    d
}

/// Stage of `inverse_stages` over blocks of length `len`.
fn inverse_stage(fft: &SpecialFft, len: usize) -> Diagonals {
    let n = fft.slots();
    let half = len >> 1;
    let mut d = Diagonals::new();
    for i in (0..n).step_by(len) {
        for j in 0..half {
            let w = fft.twiddle(len, j, true);
            let (lo, hi) = (i + j, i + j + half);
            add_entry(&mut d, n, 0, lo, Complex64::one());
            add_entry(&mut d, n, half, lo, Complex64::one());
            add_entry(&mut d, n, n - half, hi, w);
            add_entry(&mut d, n, 0, hi, -w);
        }
    }
    d
}

/// Returns the diagonals of `outer · inner`.
fn compose(outer: &Diagonals, inner: &Diagonals, n: usize) -> Diagonals {
    let mut d = Diagonals::new();
    for (s, outer_s) in outer {
        for (k, inner_k) in inner {
            for p in 0..n {
                let value = outer_s[p] * inner_k[(p + s) % n];
                if !value.is_zero() {
                    add_entry(&mut d, n, s + k, p, value);
                }
            }
        }
    }
    d.retain(|_, diag| diag.iter().any(|x| x.norm() > 1e-12));
    d
}

/// Compose consecutive stages into `pieces` matrices, in application order.
fn group(stages: Vec<Diagonals>, pieces: usize, n: usize) -> Vec<Diagonals> {
    let pieces = pieces.clamp(1, stages.len().max(1));
    let (base, extra) = (stages.len() / pieces, stages.len() % pieces);
    let mut stages = stages.into_iter();
    (0..pieces)
        .map(|g| {
            let size = base + usize::from(g < extra);
            stages
                .by_ref()
                .take(size)
                .fold(identity(n), |acc, stage| compose(&stage, &acc, n))
        })
        .collect()
}

/// The coefficient-to-slot transform, normalized by the number of slots.
pub(crate) fn coeff_to_slot(fft: &SpecialFft, pieces: usize) -> Vec<Diagonals> {
    let n = fft.slots();
    let stages = std::iter::successors(Some(n), |len| (*len > 2).then_some(len >> 1))
        .map(|len| inverse_stage(fft, len))
        .collect();
    let mut groups = group(stages, pieces, n);
    let scale = 1.0 / n as f64;
    if let Some(first) = groups.first_mut() {
        first
            .values_mut()
            .flat_map(|diag| diag.iter_mut())
            .for_each(|x| *x *= scale);
    }
    groups
}

/// The slot-to-coefficient transform.
pub(crate) fn slot_to_coeff(fft: &SpecialFft, pieces: usize) -> Vec<Diagonals> {
    let n = fft.slots();
    let stages = std::iter::successors(Some(2), |len| (*len < n).then_some(len << 1))
        .map(|len| forward_stage(fft, len))
        .collect();
    group(stages, pieces, n)
}

/// The rotations needed to evaluate the matrices.
pub(crate) fn rotation_steps<'a, I: IntoIterator<Item = &'a Diagonals>>(matrices: I) -> Vec<usize> {
    let mut steps = matrices
        .into_iter()
        .flat_map(|d| d.keys().copied())
        .filter(|k| *k != 0)
        .collect::<Vec<_>>();
    steps.sort_unstable();
    steps.dedup();
    steps
}

#[cfg(test)]
mod tests {
    use super::{coeff_to_slot, rotation_steps, slot_to_coeff, Diagonals};
    use crate::ckks::encoder::{bit_reverse, SpecialFft};
    use num_complex::Complex64;
    use rand::{thread_rng, Rng};

    fn apply(d: &Diagonals, v: &[Complex64]) -> Vec<Complex64> {
        let n = v.len();
        (0..n)
            .map(|p| d.iter().map(|(k, diag)| diag[p] * v[(p + k) % n]).sum())
            .collect()
    }

    fn assert_close(a: &[Complex64], b: &[Complex64]) {
        a.iter()
            .zip(b)
            .for_each(|(x, y)| assert!((x - y).norm() < 1e-9, "{x} != {y}"));
    }

    #[test]
    fn transforms_invert_the_fft() {
        let mut rng = thread_rng();
        for degree in [16, 64, 256] {
            let fft = SpecialFft::new(degree);
            let n = fft.slots();
            let u = (0..n)
                .map(|_| Complex64::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)))
                .collect::<Vec<_>>();
            let mut z = u.clone();
            fft.forward(&mut z);
            let mut u_reversed = u.clone();
            bit_reverse(&mut u_reversed);

            for pieces in 1..=n.trailing_zeros() as usize {
                let cts = coeff_to_slot(&fft, pieces);
                assert_eq!(cts.len(), pieces);
                let slots = cts.iter().fold(z.clone(), |v, d| apply(d, &v));
                assert_close(&slots, &u_reversed);

                let stc = slot_to_coeff(&fft, pieces);
                assert_eq!(stc.len(), pieces);
                let slots = stc.iter().fold(u_reversed.clone(), |v, d| apply(d, &v));
                assert_close(&slots, &z);
            }
        }
    }

    #[test]
    fn fewer_pieces_need_more_rotations() {
        let fft = SpecialFft::new(64);
        let one = rotation_steps(&coeff_to_slot(&fft, 1));
        let five = rotation_steps(&coeff_to_slot(&fft, 5));
        assert_eq!(one.len(), fft.slots() - 1);
        assert!(five.len() < one.len());
        assert!(five.iter().all(|k| *k < fft.slots()));
    }
}
