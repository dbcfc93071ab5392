#![forbid(unsafe_code)]

//! Namespace declarations and attributes as they appear in a canonical start tag.

use crate::escape;
use std::cmp::Ordering;

/// A namespace declaration to be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NsDecl {
    /// The prefix ("" for the default namespace).
    pub prefix: String,
    /// The namespace URI ("" to undeclare the default namespace).
    pub uri: String,
}

impl NsDecl {
    pub fn write_to(&self, out: &mut Vec<u8>) {
        if self.prefix.is_empty() {
            out.extend_from_slice(b" xmlns=\"");
        } else {
            out.extend_from_slice(b" xmlns:");
            out.extend_from_slice(self.prefix.as_bytes());
            out.extend_from_slice(b"=\"");
        }
        escape::write_attr(out, &self.uri);
        out.push(b'"');
    }
}

/// Default namespace first, then by prefix.
impl Ord for NsDecl {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.prefix.is_empty(), other.prefix.is_empty()) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => self.prefix.cmp(&other.prefix),
        }
    }
}

impl PartialOrd for NsDecl {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// An attribute to be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    /// Namespace URI ("" for no namespace).
    pub ns_uri: String,
    pub local_name: String,
    /// `prefix:local` or just `local`.
    pub qualified_name: String,
    pub value: String,
}

impl Attr {
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.push(b' ');
        out.extend_from_slice(self.qualified_name.as_bytes());
        out.extend_from_slice(b"=\"");
        escape::write_attr(out, &self.value);
        out.push(b'"');
    }
}

/// Unqualified attributes first by local name, then qualified ones by
/// (namespace URI, local name).
impl Ord for Attr {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.ns_uri.is_empty(), other.ns_uri.is_empty()) {
            (true, true) => self.local_name.cmp(&other.local_name),
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self
                .ns_uri
                .cmp(&other.ns_uri)
                .then_with(|| self.local_name.cmp(&other.local_name)),
        }
    }
}

impl PartialOrd for Attr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
