#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};
use std::fmt;

/// Errors produced by the sigtuna building blocks (parsing, keys, crypto).
///
/// These are not verdicts. The response pipeline maps them onto
/// [`RejectReason`] at its seams.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    #[error("invalid XML structure: {0}")]
    XmlStructure(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("cryptographic error: {0}")]
    Crypto(String),

    #[error("key error: {0}")]
    Key(String),

    #[error("canonicalization error: {0}")]
    Canonicalization(String),

    #[error("base64 decode error: {0}")]
    Base64(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing required element: {0}")]
    MissingElement(String),

    #[error("missing required attribute: {0}")]
    MissingAttribute(String),

    #[error("invalid URI reference: {0}")]
    InvalidUri(String),

    #[error("certificate error: {0}")]
    Certificate(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Which edge of a validity window was crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// `now` is before the window opens.
    NotBefore,
    /// `now` is at or past the window's exclusive end.
    NotOnOrAfter,
    /// `now` is past a certificate's inclusive `notAfter`.
    NotAfter,
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Boundary::NotBefore => f.write_str("NotBefore"),
            Boundary::NotOnOrAfter => f.write_str("NotOnOrAfter"),
            Boundary::NotAfter => f.write_str("NotAfter"),
        }
    }
}

/// Why a signature could not be bound to the assertion being validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ReferenceFault {
    #[error("no signature covers the assertion")]
    MissingSignature,
    #[error("more than one signature claims the assertion")]
    MultipleSignatures,
    #[error("signature must carry exactly one reference")]
    MultipleReferences,
    #[error("reference is not a same-document fragment")]
    NotSameDocument,
    #[error("reference does not resolve to the assertion")]
    WrongTarget,
    #[error("referenced ID is not unique in the document")]
    AmbiguousId,
    #[error("signature is not enveloped by the assertion")]
    NotEnveloped,
}

/// The reason a Response was rejected.
///
/// Display strings are fixed text plus, for status failures, sanitized
/// fragments. They never echo arbitrary document content.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    /// The document does not have the shape of a SAML 2.0 Response.
    #[error("malformed response: {0}")]
    MalformedDocument(&'static str),

    /// The identity provider reported a non-success status.
    #[error("identity provider returned status {code}{}{}", sub_code_suffix(.sub_code), message_suffix(.message))]
    StatusFailure {
        /// Trailing fragment of the top-level status code (e.g. `Responder`).
        code: String,
        /// Trailing fragment of the nested status code, if any.
        sub_code: Option<String>,
        /// StatusMessage text, if any.
        message: Option<String>,
    },

    /// The assertion's Conditions window does not contain `now`.
    #[error("assertion is outside its validity window ({boundary} {at})")]
    TemporalValidity { boundary: Boundary, at: DateTime<Utc> },

    #[error("assertion audience does not match this service provider")]
    AudienceMismatch,

    #[error("response destination does not match this service provider")]
    DestinationMismatch,

    #[error("no bearer subject confirmation is currently valid for this recipient")]
    NoValidSubjectConfirmation,

    #[error("signature reference mismatch: {0}")]
    SignatureReferenceMismatch(ReferenceFault),

    #[error("signature verification failed")]
    SignatureInvalid,

    #[error("signature uses an algorithm outside the allow-list")]
    UnsupportedAlgorithm,

    /// The trust certificate is not valid at `now`.
    #[error("trust certificate is not valid ({boundary} {at})")]
    CertificateExpired { boundary: Boundary, at: DateTime<Utc> },

    #[error("internal validation error")]
    Internal,
}

/// Longest status fragment or message carried in a rejection.
const MAX_STATUS_TEXT: usize = 256;

impl RejectReason {
    /// Build a [`RejectReason::StatusFailure`] from raw document values.
    ///
    /// Codes are reduced to the fragment after the last `:`; all values are
    /// stripped of control characters and truncated.
    pub fn status_failure(code_uri: &str, sub_code_uri: Option<&str>, message: Option<&str>) -> Self {
        RejectReason::StatusFailure {
            code: sanitize(status_fragment(code_uri)),
            sub_code: sub_code_uri.map(|s| sanitize(status_fragment(s))),
            message: message
                .map(|m| sanitize(m.trim()))
                .filter(|m| !m.is_empty()),
        }
    }

    /// True for rejections that indicate a forged or tampered document
    /// rather than an ordinary policy failure.
    pub fn is_tampering(&self) -> bool {
        matches!(
            self,
            RejectReason::SignatureReferenceMismatch(_) | RejectReason::SignatureInvalid
        )
    }
}

impl From<Error> for RejectReason {
    fn from(e: Error) -> Self {
        match e {
            Error::XmlParse(_) => RejectReason::MalformedDocument("document is not well-formed XML"),
            Error::XmlStructure(_)
            | Error::MissingElement(_)
            | Error::MissingAttribute(_)
            | Error::InvalidUri(_) => RejectReason::MalformedDocument("unexpected document structure"),
            Error::Canonicalization(_) => RejectReason::MalformedDocument("document cannot be canonicalized"),
            Error::Base64(_) => RejectReason::MalformedDocument("invalid base64 content"),
            Error::UnsupportedAlgorithm(_) => RejectReason::UnsupportedAlgorithm,
            Error::Crypto(_) | Error::Key(_) | Error::Certificate(_) => RejectReason::SignatureInvalid,
            Error::Io(_) | Error::Other(_) => RejectReason::Internal,
        }
    }
}

fn sub_code_suffix(sub_code: &Option<String>) -> String {
    sub_code.as_deref().map(|s| format!("/{s}")).unwrap_or_default()
}

fn message_suffix(message: &Option<String>) -> String {
    message.as_deref().map(|m| format!(": {m}")).unwrap_or_default()
}

fn status_fragment(uri: &str) -> &str {
    let uri = uri.trim();
    uri.rsplit(':').next().unwrap_or(uri)
}

fn sanitize(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_control())
        .take(MAX_STATUS_TEXT)
        .collect()
}
