#![crate_name = "fhe_ckks"]
#![crate_type = "lib"]
#![warn(missing_docs, unused_imports)]

//! Leveled CKKS homomorphic encryption: encoding of real and complex
//! vectors, encryption, homomorphic arithmetic, multiparty key generation
//! and threshold decryption, and bootstrapping.

mod errors;
mod proto;

pub mod ckks;
pub mod mckks;

pub use errors::{Error, ErrorCategory, ParametersError, Result};

#[cfg(test)]
#[macro_use]
extern crate proptest;

// Test the source code included in the README.
#[macro_use]
extern crate doc_comment;
doctest!("../README.md");
