#![crate_name = "fhe_util"]
#![crate_type = "lib"]
#![warn(missing_docs, unused_imports)]

//! Utilities for the fhe-ckks library.

#[cfg(test)]
#[macro_use]
extern crate proptest;

use num_bigint_dig::{prime::probably_prime, BigUint};
use num_traits::{PrimInt, ToPrimitive};
use rand::{seq::index::sample, CryptoRng, Rng, RngCore};

/// Returns whether the modulus p is prime; this function is 100% accurate.
pub fn is_prime(p: u64) -> bool {
    probably_prime(&BigUint::from(p), 0)
}

/// Sample a vector of independent centered binomial distributions of a given
/// variance. Returns an error if the variance is strictly larger than 16.
pub fn sample_vec_cbd<R: RngCore + CryptoRng>(
    vector_size: usize,
    variance: usize,
    rng: &mut R,
) -> Result<Vec<i64>, &'static str> {
    if !(1..=16).contains(&variance) {
        return Err("The variance should be between 1 and 16");
    }
    Ok(sample_cbd_eta(vector_size, 2 * variance, rng))
}

/// Sample a vector of independent centered binomial distributions of a
/// variance that may be fractional, as long as twice the variance is an
/// integer. A variance of 0.5 yields ternary coefficients.
pub fn sample_vec_cbd_f32<R: RngCore + CryptoRng>(
    vector_size: usize,
    variance: f32,
    rng: &mut R,
) -> Result<Vec<i64>, &'static str> {
    let eta = 2.0 * variance;
    if !(1.0..=32.0).contains(&eta) || eta.fract() != 0.0 {
        return Err("The variance should be a multiple of 0.5 between 0.5 and 16");
    }
    Ok(sample_cbd_eta(vector_size, eta as usize, rng))
}

fn sample_cbd_eta<R: RngCore + CryptoRng>(vector_size: usize, eta: usize, rng: &mut R) -> Vec<i64> {
    (0..vector_size)
        .map(|_| {
            let mut acc = 0i64;
            for _ in 0..eta {
                acc += rng.gen::<bool>() as i64;
                acc -= rng.gen::<bool>() as i64;
            }
            acc
        })
        .collect()
}

/// Sample a ternary vector with exactly `hamming_weight` non-zero
/// coefficients, placed uniformly at random and each equal to ±1.
pub fn sample_vec_hamming<R: RngCore + CryptoRng>(
    vector_size: usize,
    hamming_weight: usize,
    rng: &mut R,
) -> Result<Vec<i64>, &'static str> {
    if hamming_weight == 0 || hamming_weight > vector_size {
        return Err("The Hamming weight should be between 1 and the vector size");
    }
    let mut v = vec![0i64; vector_size];
    for i in sample(rng, vector_size, hamming_weight).into_iter() {
        v[i] = if rng.gen::<bool>() { 1 } else { -1 };
    }
    Ok(v)
}

/// Compute the variance of a list of values.
pub fn variance<T: ToPrimitive>(values: &[T]) -> f64 {
    assert!(values.len() > 1);
    let values = values
        .iter()
        .map(|v| v.to_f64().unwrap_or_default())
        .collect::<Vec<_>>();
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (values.len() as f64 - 1.0)
}

/// Returns the floor of log2(x).
pub fn ilog2<T: PrimInt>(x: T) -> usize {
    assert!(x > T::zero());
    8 * std::mem::size_of::<T>() - 1 - x.leading_zeros() as usize
}
