#![forbid(unsafe_code)]

//! Trust store for sigtuna.
//!
//! A service provider trusts exactly one identity provider certificate. It is
//! loaded once (PEM, DER or the bare base64 body found in IdP settings) and
//! is immutable afterwards.

pub mod loader;
pub mod trust;

pub use trust::TrustCertificate;
