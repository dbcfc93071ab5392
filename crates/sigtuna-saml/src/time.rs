#![forbid(unsafe_code)]

//! `xs:dateTime` parsing and half-open validity windows.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use roxmltree::Node;
use sigtuna_core::{ns, Boundary, RejectReason};

/// Parse a SAML timestamp.
///
/// SAML requires UTC with a trailing `Z`; a missing zone designator is
/// read as UTC as well.
pub fn parse_instant(value: &str) -> Result<DateTime<Utc>, RejectReason> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| RejectReason::MalformedDocument("invalid xs:dateTime value"))
}

/// Read an optional timestamp attribute.
pub fn instant_attr(node: Node<'_, '_>, name: &str) -> Result<Option<DateTime<Utc>>, RejectReason> {
    node.attribute(name).map(parse_instant).transpose()
}

/// `[NotBefore, NotOnOrAfter)`. Either end may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Window {
    pub not_before: Option<DateTime<Utc>>,
    pub not_on_or_after: Option<DateTime<Utc>>,
}

impl Window {
    /// Read `NotBefore` / `NotOnOrAfter` from an element.
    pub fn from_element(node: Node<'_, '_>) -> Result<Self, RejectReason> {
        Ok(Self {
            not_before: instant_attr(node, ns::attr::NOT_BEFORE)?,
            not_on_or_after: instant_attr(node, ns::attr::NOT_ON_OR_AFTER)?,
        })
    }

    /// Is `now` inside the window, widened by `skew` on both ends?
    ///
    /// On failure, returns the boundary crossed and its value as written.
    pub fn check(&self, now: DateTime<Utc>, skew: Duration) -> Result<(), (Boundary, DateTime<Utc>)> {
        if let Some(nb) = self.not_before {
            if now < nb - skew {
                return Err((Boundary::NotBefore, nb));
            }
        }
        if let Some(noa) = self.not_on_or_after {
            if now >= noa + skew {
                return Err((Boundary::NotOnOrAfter, noa));
            }
        }
        Ok(())
    }

    pub fn contains(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        self.check(now, skew).is_ok()
    }
}
