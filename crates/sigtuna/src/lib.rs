#![forbid(unsafe_code)]

pub use sigtuna_core as core;
pub use sigtuna_xml as xml;
pub use sigtuna_c14n as c14n;
pub use sigtuna_crypto as crypto;
pub use sigtuna_keys as keys;
pub use sigtuna_dsig as dsig;
pub use sigtuna_saml as saml;

pub use sigtuna_keys::TrustCertificate;
pub use sigtuna_saml::{Accepted, Outcome, RejectReason, ResponseValidator, SpConfig};
