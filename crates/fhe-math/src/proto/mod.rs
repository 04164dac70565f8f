//! Protobuf messages for the polynomials.

pub mod rq;
