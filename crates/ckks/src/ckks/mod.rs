#![warn(missing_docs, unused_imports)]

//! The Cheon-Kim-Kim-Song homomorphic encryption scheme for approximate
//! arithmetic.

mod bootstrapping;
mod ciphertext;
mod decryptor;
mod encoder;
mod encryptor;
mod execution;
mod keygen;
mod ops;
mod parameters;
mod plaintext;
mod prng;

pub mod keys;
pub(crate) mod traits;

pub use bootstrapping::{
    Bootstrapper, BootstrappingConfig, BootstrappingKeys, BootstrappingVariant, LogicGate,
};
pub use ciphertext::Ciphertext;
pub use decryptor::Decryptor;
pub use encoder::{CkksEncoding, Encoder};
pub use encryptor::Encryptor;
pub use execution::{ExecutionOptions, ResidencyPolicy, Storage, Stream};
pub use keygen::KeyGenerator;
pub use keys::{
    GaloisKey, KeySwitchingKey, PublicKey, RelinearizationKey, RotationSet, SecretKey,
};
pub use ops::{ArithmeticOperator, LogicOperator};
pub use parameters::{
    CkksParameters, CkksParametersBuilder, KeySwitchMethod, ModulusInfo, SecurityLevel,
};
pub use plaintext::Plaintext;
pub use prng::PrngState;
