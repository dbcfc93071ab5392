#![forbid(unsafe_code)]

//! XML document abstraction for sigtuna.
//!
//! Provides lookup helpers over `roxmltree`, an ID index that detects
//! duplicate IDs, and the `NodeSet` used for document-subset canonicalization.

pub mod document;
pub mod nodeset;

pub use document::{IdIndex, IdLookup};
pub use nodeset::NodeSet;

/// roxmltree parsing options used for every untrusted document.
///
/// DTDs are refused: a SAML response has no legitimate use for one, and
/// refusing them rules out entity tricks before any other processing.
pub fn parsing_options() -> roxmltree::ParsingOptions {
    roxmltree::ParsingOptions {
        allow_dtd: false,
        ..roxmltree::ParsingOptions::default()
    }
}
