#![forbid(unsafe_code)]

//! XML Canonicalization for sigtuna.
//!
//! Only Exclusive Canonical XML 1.0 (with and without comments) is
//! implemented; it is the only family the signature verifier accepts.

pub mod escape;
pub mod exclusive;
pub mod render;

use sigtuna_core::{algorithm, Error};
use sigtuna_xml::NodeSet;

/// The canonicalization mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum C14nMode {
    /// Exclusive Canonical XML 1.0
    Exclusive,
    /// Exclusive Canonical XML 1.0 with comments
    ExclusiveWithComments,
}

impl C14nMode {
    /// Get the algorithm URI for this mode.
    pub fn uri(&self) -> &'static str {
        match self {
            Self::Exclusive => algorithm::EXC_C14N,
            Self::ExclusiveWithComments => algorithm::EXC_C14N_WITH_COMMENTS,
        }
    }

    /// Parse a C14N mode from an algorithm URI.
    ///
    /// Inclusive C14N URIs return `None`.
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            algorithm::EXC_C14N => Some(Self::Exclusive),
            algorithm::EXC_C14N_WITH_COMMENTS => Some(Self::ExclusiveWithComments),
            _ => None,
        }
    }

    pub fn with_comments(&self) -> bool {
        matches!(self, Self::ExclusiveWithComments)
    }
}

/// Canonicalize a parsed document, or the subset of it selected by `node_set`.
///
/// `inclusive_prefixes` is the InclusiveNamespaces PrefixList (`#default`
/// names the default namespace).
pub fn canonicalize_doc(
    doc: &roxmltree::Document<'_>,
    mode: C14nMode,
    node_set: Option<&NodeSet>,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>, Error> {
    exclusive::canonicalize(doc, mode.with_comments(), node_set, inclusive_prefixes)
}
