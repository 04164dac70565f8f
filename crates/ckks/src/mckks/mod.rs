#![warn(missing_docs, unused_imports)]

//! The Multiparty CKKS scheme, in the spirit of [Multiparty Homomorphic
//! Encryption from Ring-Learning-With-Errors](https://eprint.iacr.org/2020/304.pdf).
//!
//! A [`Committee`] of parties derives every common random polynomial from a
//! shared seed. Each party holds an additive share of the secret key and
//! contributes one share per protocol; the shares are combined with the
//! [`Aggregate`] trait.

mod committee;
mod crp;
mod decryption;
mod galois_key_gen;
mod public_key_gen;
mod relin_key_gen;

pub use committee::Committee;
pub use crp::CommonRandomPoly;
pub use decryption::DecryptionShare;
pub use galois_key_gen::GaloisKeyShare;
pub use public_key_gen::PublicKeyShare;
pub use relin_key_gen::{RelinKeyGenerator, RelinKeyShare, Round, R1Aggregated, R1, R2};

use crate::Result;

/// Aggregate shares in an MPC protocol.
pub trait Aggregate<S>: Sized {
    /// Aggregate shares in an MPC protocol.
    fn from_shares<T>(iter: T) -> Result<Self>
    where
        T: IntoIterator<Item = S>;
}
