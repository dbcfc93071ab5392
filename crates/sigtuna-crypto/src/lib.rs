#![forbid(unsafe_code)]

//! Cryptographic primitives for sigtuna, built on RustCrypto.
//!
//! Verification only: the library never signs. Every algorithm is looked up
//! by its XML-DSig URI and unknown or weak URIs are refused.

pub mod digest;
pub mod sign;

pub use sign::PublicKey;
