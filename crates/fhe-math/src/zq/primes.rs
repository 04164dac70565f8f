//! Generation of NTT-friendly primes.

use fhe_util::is_prime;

/// Generate a `num_bits`-bit prime, congruent to 1 mod `modulo`, strictly
/// smaller than `upper_bound`. Note that `num_bits` must belong to (10..=62),
/// and upper_bound must be <= 1 << num_bits.
pub fn generate_prime(num_bits: usize, modulo: u64, upper_bound: u64) -> Option<u64> {
    if !(10..=62).contains(&num_bits) {
        None
    } else {
        debug_assert!(
            (1u64 << num_bits) >= upper_bound,
            "upper_bound larger than number of bits"
        );

        let leading_zeros = (64 - num_bits) as u32;

        let mut tentative_prime = upper_bound - 1;
        while tentative_prime % modulo != 1 && tentative_prime.leading_zeros() == leading_zeros {
            tentative_prime -= 1
        }

        while !is_prime(tentative_prime)
            && tentative_prime >= modulo
            && tentative_prime.leading_zeros() == leading_zeros
        {
            tentative_prime -= modulo
        }

        if is_prime(tentative_prime) && tentative_prime.leading_zeros() == leading_zeros {
            Some(tentative_prime)
        } else {
            None
        }
    }
}

/// Generate the smallest prime congruent to 1 mod `modulo` that is strictly
/// larger than `lower_bound` and strictly smaller than `limit`.
pub fn generate_prime_above(modulo: u64, lower_bound: u64, limit: u64) -> Option<u64> {
    let limit = limit.min(1 << 62);
    let mut tentative_prime = lower_bound.checked_add(1)?;
    let r = tentative_prime % modulo;
    if r != 1 {
        tentative_prime = tentative_prime.checked_add((modulo + 1 - r) % modulo)?;
    }
    while tentative_prime < limit {
        if is_prime(tentative_prime) {
            return Some(tentative_prime);
        }
        tentative_prime = tentative_prime.checked_add(modulo)?;
    }
    None
}
