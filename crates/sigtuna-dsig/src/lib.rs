#![forbid(unsafe_code)]

//! XML Digital Signature handling for SAML assertions.
//!
//! Verification happens in two steps. [`bind::bind`] decides *which*
//! signature covers the assertion being processed and proves its Reference
//! resolves to that exact element. [`verify::verify`] then checks the
//! algorithms, digest and signature value against the trust certificate.

pub mod bind;
pub mod signature;
pub mod verify;

pub use bind::{bind, BoundSignature};
pub use signature::{ReferenceInfo, SignatureInfo, TransformInfo};
pub use verify::verify;
