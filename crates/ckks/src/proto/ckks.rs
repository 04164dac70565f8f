#![allow(missing_docs)]
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Parameters {
    #[prost(uint32, tag = "1")]
    pub degree: u32,
    #[prost(uint64, repeated, tag = "2")]
    pub moduli: ::prost::alloc::vec::Vec<u64>,
    #[prost(uint64, repeated, tag = "3")]
    pub special_moduli: ::prost::alloc::vec::Vec<u64>,
    #[prost(double, tag = "4")]
    pub scale: f64,
    #[prost(uint32, tag = "5")]
    pub security_level: u32,
    #[prost(uint32, tag = "6")]
    pub keyswitch_method: u32,
    #[prost(uint32, tag = "7")]
    pub variance: u32,
}
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Plaintext {
    #[prost(bytes = "vec", tag = "1")]
    pub poly: ::prost::alloc::vec::Vec<u8>,
    #[prost(double, tag = "2")]
    pub scale: f64,
    #[prost(uint32, tag = "3")]
    pub level: u32,
    #[prost(bytes = "vec", tag = "4")]
    pub fingerprint: ::prost::alloc::vec::Vec<u8>,
    #[prost(uint32, tag = "5")]
    pub storage: u32,
}
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Ciphertext {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub c: ::prost::alloc::vec::Vec<::prost::alloc::vec::Vec<u8>>,
    #[prost(double, tag = "2")]
    pub scale: f64,
    #[prost(uint32, tag = "3")]
    pub level: u32,
    #[prost(bytes = "vec", tag = "4")]
    pub fingerprint: ::prost::alloc::vec::Vec<u8>,
    #[prost(uint32, tag = "5")]
    pub storage: u32,
}
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SecretKey {
    #[prost(sint64, repeated, tag = "1")]
    pub coeffs: ::prost::alloc::vec::Vec<i64>,
    #[prost(uint32, tag = "2")]
    pub hamming_weight: u32,
    #[prost(bytes = "vec", tag = "3")]
    pub fingerprint: ::prost::alloc::vec::Vec<u8>,
}
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PublicKey {
    #[prost(message, optional, tag = "1")]
    pub c: ::core::option::Option<Ciphertext>,
    #[prost(bytes = "vec", tag = "2")]
    pub fingerprint: ::prost::alloc::vec::Vec<u8>,
}
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct KeySwitchingKey {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub c0: ::prost::alloc::vec::Vec<::prost::alloc::vec::Vec<u8>>,
    #[prost(bytes = "vec", repeated, tag = "2")]
    pub c1: ::prost::alloc::vec::Vec<::prost::alloc::vec::Vec<u8>>,
    #[prost(uint32, tag = "3")]
    pub method: u32,
}
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RelinearizationKey {
    #[prost(message, optional, tag = "1")]
    pub ksk: ::core::option::Option<KeySwitchingKey>,
    #[prost(bytes = "vec", tag = "2")]
    pub fingerprint: ::prost::alloc::vec::Vec<u8>,
}
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GaloisElementKey {
    #[prost(uint32, tag = "1")]
    pub exponent: u32,
    #[prost(message, optional, tag = "2")]
    pub ksk: ::core::option::Option<KeySwitchingKey>,
}
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GaloisKey {
    #[prost(bool, tag = "1")]
    pub powers_of_two: bool,
    #[prost(sint32, repeated, tag = "2")]
    pub steps: ::prost::alloc::vec::Vec<i32>,
    #[prost(bool, tag = "3")]
    pub generated: bool,
    #[prost(message, repeated, tag = "4")]
    pub keys: ::prost::alloc::vec::Vec<GaloisElementKey>,
    #[prost(bytes = "vec", tag = "5")]
    pub fingerprint: ::prost::alloc::vec::Vec<u8>,
}
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DecryptionShare {
    #[prost(uint32, tag = "1")]
    pub party_id: u32,
    #[prost(uint32, tag = "2")]
    pub num_parties: u32,
    #[prost(bytes = "vec", tag = "3")]
    pub h: ::prost::alloc::vec::Vec<u8>,
    #[prost(bytes = "vec", tag = "4")]
    pub fingerprint: ::prost::alloc::vec::Vec<u8>,
}
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PublicKeyShare {
    #[prost(uint32, tag = "1")]
    pub party_id: u32,
    #[prost(uint32, tag = "2")]
    pub num_parties: u32,
    #[prost(bytes = "vec", tag = "3")]
    pub p0_share: ::prost::alloc::vec::Vec<u8>,
    #[prost(bytes = "vec", tag = "4")]
    pub crp: ::prost::alloc::vec::Vec<u8>,
    #[prost(bytes = "vec", tag = "5")]
    pub fingerprint: ::prost::alloc::vec::Vec<u8>,
}
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RelinKeyShare {
    #[prost(uint32, tag = "1")]
    pub party_id: u32,
    #[prost(uint32, tag = "2")]
    pub num_parties: u32,
    #[prost(uint32, tag = "3")]
    pub round: u32,
    #[prost(bytes = "vec", repeated, tag = "4")]
    pub h0: ::prost::alloc::vec::Vec<::prost::alloc::vec::Vec<u8>>,
    #[prost(bytes = "vec", repeated, tag = "5")]
    pub h1: ::prost::alloc::vec::Vec<::prost::alloc::vec::Vec<u8>>,
    #[prost(bytes = "vec", tag = "6")]
    pub fingerprint: ::prost::alloc::vec::Vec<u8>,
}
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GaloisKeyShare {
    #[prost(uint32, tag = "1")]
    pub party_id: u32,
    #[prost(uint32, tag = "2")]
    pub num_parties: u32,
    #[prost(message, optional, tag = "3")]
    pub key: ::core::option::Option<GaloisKey>,
    #[prost(bytes = "vec", tag = "4")]
    pub fingerprint: ::prost::alloc::vec::Vec<u8>,
}
