#![forbid(unsafe_code)]

//! SAML 2.0 Response validation for a service provider.
//!
//! [`ResponseValidator`] owns the service provider's configuration and the
//! identity provider's trust certificate. Each call validates one Response:
//!
//! 1. [`validator`]: structure, status, destination, audience, subject
//!    confirmation and conditions window
//! 2. [`sigtuna_dsig::bind`]: the signature covering this exact assertion
//! 3. [`sigtuna_dsig::verify`]: algorithms, digest and signature value
//! 4. [`claims`]: NameID and attributes
//!
//! The first failing step rejects the Response with a [`RejectReason`].

pub mod claims;
pub mod config;
pub mod response;
pub mod time;
pub mod types;
pub mod validator;

pub use config::SpConfig;
pub use response::ResponseValidator;
pub use sigtuna_core::{Boundary, ReferenceFault, RejectReason};
pub use types::{Accepted, AssuranceFlags, Attributes, NameId, Outcome, ReplayInfo, ValidatedAssertion};
