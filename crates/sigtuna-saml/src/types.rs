#![forbid(unsafe_code)]

//! Values produced by Response validation.

use chrono::{DateTime, Utc};
use roxmltree::Node;
use serde::Serialize;
use sigtuna_core::RejectReason;
use std::collections::BTreeMap;

/// Facts about how the Response was addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AssuranceFlags {
    /// `false` when the Response carried no `Destination` attribute.
    pub destination_present: bool,
}

/// An assertion that passed the structural and semantic checks, before any
/// signature work. Borrows the parsed document.
#[derive(Debug, Clone)]
pub struct ValidatedAssertion<'a, 'input> {
    pub response_id: String,
    pub assertion: Node<'a, 'input>,
    pub assertion_id: String,
    pub issue_instant: DateTime<Utc>,
    pub issuer: Option<String>,
    pub in_response_to: Option<String>,
    /// Latest instant at which this assertion could still be accepted,
    /// including clock skew. `None` when no window closes.
    pub usable_until: Option<DateTime<Utc>>,
    pub assurance: AssuranceFlags,
}

/// `<saml:NameID>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameId {
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// Attribute name to values, in document order within each name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, Vec<String>>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append values under `name`, merging with any already present.
    pub fn extend(&mut self, name: &str, values: impl IntoIterator<Item = String>) {
        self.0.entry(name.to_owned()).or_default().extend(values);
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.0.get(name).map(Vec::as_slice)
    }

    pub fn first(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| v.first()).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// What a replay cache needs to remember about an accepted assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplayInfo {
    pub assertion_id: String,
    /// After this instant the assertion is rejected on time alone, so the
    /// ID may be forgotten.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// A Response that passed every check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Accepted {
    pub response_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    pub issue_instant: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_response_to: Option<String>,
    pub name_id: NameId,
    pub attributes: Attributes,
    pub assurance: AssuranceFlags,
    pub replay: ReplayInfo,
}

/// Result of [`crate::ResponseValidator::evaluate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Accepted(Accepted),
    Rejected {
        reason: RejectReason,
        /// Human readable detail, safe to log. Never shown to end users.
        diagnostic: String,
    },
}

impl Outcome {
    pub fn rejected(reason: RejectReason) -> Self {
        let diagnostic = reason.to_string();
        Self::Rejected { reason, diagnostic }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    pub fn accepted(&self) -> Option<&Accepted> {
        match self {
            Self::Accepted(a) => Some(a),
            Self::Rejected { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<&RejectReason> {
        match self {
            Self::Accepted(_) => None,
            Self::Rejected { reason, .. } => Some(reason),
        }
    }

    pub fn into_result(self) -> Result<Accepted, RejectReason> {
        match self {
            Self::Accepted(a) => Ok(a),
            Self::Rejected { reason, .. } => Err(reason),
        }
    }
}

impl From<Result<Accepted, RejectReason>> for Outcome {
    fn from(result: Result<Accepted, RejectReason>) -> Self {
        match result {
            Ok(a) => Self::Accepted(a),
            Err(reason) => Self::rejected(reason),
        }
    }
}
