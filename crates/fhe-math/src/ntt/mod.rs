//! Number-Theoretic Transform in ZZ_q.

mod native;

pub use native::NttOperator;

/// Returns whether a modulus p is prime and supports the Number Theoretic
/// Transform of size n.
///
/// Aborts if n is not a power of 2 that is >= 8.
pub fn supports_ntt(p: u64, n: usize) -> bool {
    assert!(n >= 8 && n.is_power_of_two());

    p % ((n as u64) << 1) == 1 && fhe_util::is_prime(p)
}

#[cfg(test)]
mod tests {
    use rand::thread_rng;

    use super::{supports_ntt, NttOperator};
    use crate::zq::{primes::generate_prime, Modulus};

    #[test]
    fn constructor() {
        for size in [8, 1024] {
            for p in [1153, 4611686018326724609] {
                let q = Modulus::new(p).unwrap();
                let supports_ntt = supports_ntt(p, size);

                let op = NttOperator::new(&q, size);

                if supports_ntt {
                    assert!(op.is_some());
                } else {
                    assert!(op.is_none());
                }
            }
        }
    }

    #[test]
    fn bijection() {
        let ntests = 20;
        let mut rng = thread_rng();

        for size in [8, 1024] {
            for p in [1153, 4611686018326724609] {
                if supports_ntt(p, size) {
                    let q = Modulus::new(p).unwrap();
                    let op = NttOperator::new(&q, size).unwrap();

                    for _ in 0..ntests {
                        let mut a = q.random_vec(size, &mut rng);
                        let a_clone = a.clone();

                        op.forward(&mut a);
                        assert_ne!(a, a_clone);

                        op.backward(&mut a);
                        assert_eq!(a, a_clone);
                    }
                }
            }
        }
    }

    #[test]
    fn negacyclic_product() {
        let mut rng = thread_rng();
        let size = 32;
        let p = generate_prime(50, 2 * size as u64, 1 << 50).unwrap();
        let q = Modulus::new(p).unwrap();
        let op = NttOperator::new(&q, size).unwrap();

        let a = q.random_vec(size, &mut rng);
        let b = q.random_vec(size, &mut rng);

        // Schoolbook product in ZZ_q[X] / (X^size + 1).
        let mut expected = vec![0u64; size];
        for i in 0..size {
            for j in 0..size {
                let prod = q.mul(a[i], b[j]);
                let k = (i + j) % size;
                expected[k] = if i + j >= size {
                    q.sub(expected[k], prod)
                } else {
                    q.add(expected[k], prod)
                };
            }
        }

        let mut a_ntt = a.clone();
        let mut b_ntt = b.clone();
        op.forward(&mut a_ntt);
        op.forward(&mut b_ntt);
        q.mul_vec(&mut a_ntt, &b_ntt);
        op.backward(&mut a_ntt);
        assert_eq!(a_ntt, expected);
    }
}
