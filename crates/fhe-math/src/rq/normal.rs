//! Sampling of large integers from a centered normal distribution, used to
//! smudge decryption shares.

use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};
use rand::{CryptoRng, Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use rayon::prelude::*;

const CHUNK_SIZE: usize = 256;

/// Draw `n` samples from the centered normal distribution N(0, variance).
///
/// The work is split in chunks, each driven by a generator seeded from `rng`,
/// so that the output only depends on the state of `rng`.
pub fn sample_bigint_normal_vec<R: RngCore + CryptoRng>(
    variance: &BigInt,
    n: usize,
    rng: &mut R,
) -> Vec<BigInt> {
    if variance.is_zero() {
        return vec![BigInt::zero(); n];
    }
    let std_dev = variance.sqrt();
    let seeds = (0..n.div_ceil(CHUNK_SIZE))
        .map(|_| rng.gen::<<ChaCha8Rng as SeedableRng>::Seed>())
        .collect::<Vec<_>>();

    seeds
        .into_par_iter()
        .enumerate()
        .flat_map_iter(|(chunk, seed)| {
            let mut chunk_rng = ChaCha8Rng::from_seed(seed);
            let len = CHUNK_SIZE.min(n - chunk * CHUNK_SIZE);
            let std_dev = &std_dev;
            (0..len)
                .map(move |_| scale(chunk_rng.sample(StandardNormal), std_dev))
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Sample a single value from N(0, variance).
pub fn sample_bigint_normal<R: RngCore + CryptoRng>(variance: &BigInt, rng: &mut R) -> BigInt {
    if variance.is_zero() {
        return BigInt::zero();
    }
    scale(rng.sample(StandardNormal), &variance.sqrt())
}

/// Compute round(z * std_dev).
fn scale(z: f64, std_dev: &BigInt) -> BigInt {
    if let Some(s) = std_dev.to_f64().filter(|s| *s < 1e15) {
        if let Some(v) = (z * s).round().to_i128() {
            return BigInt::from(v);
        }
    }

    // Fixed-point product for large deviations.
    const FP_BITS: u32 = 53;
    let z_fp = BigInt::from((z * (1u64 << FP_BITS) as f64).round() as i64);
    (z_fp * std_dev) >> FP_BITS
}
