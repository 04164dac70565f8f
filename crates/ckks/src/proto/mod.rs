//! Protobuf definitions and serialization for CKKS types.

/// Protobuf for the CKKS encryption scheme.
pub mod ckks;
