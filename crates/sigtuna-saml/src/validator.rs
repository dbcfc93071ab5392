#![forbid(unsafe_code)]

//! Structural and semantic checks on a SAML Response.
//!
//! Runs before any signature work. Checks are ordered and the first failure
//! wins:
//!
//! 1. shape: `samlp:Response` root, version 2.0, exactly one Assertion as a
//!    direct child
//! 2. status: top-level StatusCode is Success
//! 3. destination (when present)
//! 4. audience restrictions
//! 5. at least one usable bearer subject confirmation
//! 6. Conditions validity window

use crate::config::SpConfig;
use crate::time::{self, Window};
use crate::types::{AssuranceFlags, ValidatedAssertion};
use chrono::{DateTime, Duration, Utc};
use roxmltree::{Document, Node};
use sigtuna_core::{ns, RejectReason};
use sigtuna_xml::document::{find_child_element, find_child_elements, find_elements, is_element, text_content};

/// Validate everything about `doc` that does not involve the signature.
pub fn validate<'a, 'input>(
    doc: &'a Document<'input>,
    config: &SpConfig,
    now: DateTime<Utc>,
) -> Result<ValidatedAssertion<'a, 'input>, RejectReason> {
    let skew = config.clock_skew();
    let response = doc.root_element();

    let response_id = check_response_shape(response)?;
    check_status(response)?;
    let assertion = single_assertion(doc, response)?;
    let assertion_id = required_id(assertion, "assertion ID missing")?;
    check_version(assertion)?;
    let issue_instant = time::parse_instant(
        assertion
            .attribute(ns::attr::ISSUE_INSTANT)
            .ok_or(RejectReason::MalformedDocument("assertion IssueInstant missing"))?,
    )?;

    let destination_present = check_destination(response, config)?;
    check_audience(assertion, config)?;
    let confirmation = check_subject_confirmation(assertion, config, now, skew)?;
    let conditions = check_conditions(assertion, now, skew)?;

    let usable_until = earliest(conditions.not_on_or_after, confirmation.usable_until).map(|t| t + skew);

    Ok(ValidatedAssertion {
        response_id,
        assertion,
        assertion_id,
        issue_instant,
        issuer: find_child_element(assertion, ns::SAML, ns::node::ISSUER)
            .map(|n| text_content(n).trim().to_owned())
            .filter(|s| !s.is_empty()),
        in_response_to: response
            .attribute(ns::attr::IN_RESPONSE_TO)
            .or(confirmation.in_response_to)
            .map(str::to_owned),
        usable_until,
        assurance: AssuranceFlags { destination_present },
    })
}

fn check_response_shape(response: Node<'_, '_>) -> Result<String, RejectReason> {
    if !is_element(response, ns::SAMLP, ns::node::RESPONSE) {
        return Err(RejectReason::MalformedDocument("root element is not samlp:Response"));
    }
    check_version(response)?;
    required_id(response, "response ID missing")
}

fn check_version(node: Node<'_, '_>) -> Result<(), RejectReason> {
    match node.attribute(ns::attr::VERSION) {
        Some(ns::SAML_VERSION) => Ok(()),
        Some(_) => Err(RejectReason::MalformedDocument("unsupported SAML version")),
        None => Err(RejectReason::MalformedDocument("SAML version missing")),
    }
}

fn required_id(node: Node<'_, '_>, missing: &'static str) -> Result<String, RejectReason> {
    node.attribute(ns::attr::ID)
        .filter(|id| !id.trim().is_empty())
        .map(str::to_owned)
        .ok_or(RejectReason::MalformedDocument(missing))
}

fn check_status(response: Node<'_, '_>) -> Result<(), RejectReason> {
    let status = find_child_element(response, ns::SAMLP, ns::node::STATUS)
        .ok_or(RejectReason::MalformedDocument("status missing"))?;
    let code_node = find_child_element(status, ns::SAMLP, ns::node::STATUS_CODE)
        .ok_or(RejectReason::MalformedDocument("status code missing"))?;
    let code = code_node
        .attribute(ns::attr::VALUE)
        .ok_or(RejectReason::MalformedDocument("status code value missing"))?;

    if code.trim() == ns::STATUS_SUCCESS {
        return Ok(());
    }

    let sub_code = find_child_element(code_node, ns::SAMLP, ns::node::STATUS_CODE)
        .and_then(|n| n.attribute(ns::attr::VALUE));
    let message = find_child_element(status, ns::SAMLP, ns::node::STATUS_MESSAGE).map(text_content);
    Err(RejectReason::status_failure(code, sub_code, message.as_deref()))
}

/// Exactly one Assertion anywhere in the document, and it must be a direct
/// child of the Response.
fn single_assertion<'a, 'input>(
    doc: &'a Document<'input>,
    response: Node<'a, 'input>,
) -> Result<Node<'a, 'input>, RejectReason> {
    match find_elements(doc, ns::SAML, ns::node::ASSERTION).as_slice() {
        [one] if one.parent() == Some(response) => Ok(*one),
        [_] => Err(RejectReason::MalformedDocument("assertion is not a child of the response")),
        [] => Err(RejectReason::MalformedDocument("response contains no assertion")),
        _ => Err(RejectReason::MalformedDocument("response contains more than one assertion")),
    }
}

/// Returns whether the Response named a destination at all.
fn check_destination(response: Node<'_, '_>, config: &SpConfig) -> Result<bool, RejectReason> {
    match response.attribute(ns::attr::DESTINATION) {
        Some(d) if d == config.destination => Ok(true),
        Some(_) => Err(RejectReason::DestinationMismatch),
        None => {
            tracing::debug!("response carries no Destination");
            Ok(false)
        }
    }
}

/// At least one AudienceRestriction, and every one of them lists our audience.
fn check_audience(assertion: Node<'_, '_>, config: &SpConfig) -> Result<(), RejectReason> {
    let restrictions = find_child_element(assertion, ns::SAML, ns::node::CONDITIONS)
        .map(|c| find_child_elements(c, ns::SAML, ns::node::AUDIENCE_RESTRICTION))
        .unwrap_or_default();
    if restrictions.is_empty() {
        return Err(RejectReason::AudienceMismatch);
    }

    let expected = config.audience();
    let all_match = restrictions.iter().all(|r| {
        find_child_elements(*r, ns::SAML, ns::node::AUDIENCE)
            .into_iter()
            .any(|a| text_content(a).trim() == expected)
    });
    if all_match {
        Ok(())
    } else {
        Err(RejectReason::AudienceMismatch)
    }
}

/// The bearer confirmations that qualified.
struct Confirmation<'a> {
    usable_until: Option<DateTime<Utc>>,
    in_response_to: Option<&'a str>,
}

fn check_subject_confirmation<'a>(
    assertion: Node<'a, '_>,
    config: &SpConfig,
    now: DateTime<Utc>,
    skew: Duration,
) -> Result<Confirmation<'a>, RejectReason> {
    let Some(subject) = find_child_element(assertion, ns::SAML, ns::node::SUBJECT) else {
        return Err(RejectReason::NoValidSubjectConfirmation);
    };

    let mut usable: Vec<(Option<DateTime<Utc>>, Option<&'a str>)> = Vec::new();
    for sc in find_child_elements(subject, ns::SAML, ns::node::SUBJECT_CONFIRMATION) {
        if sc.attribute(ns::attr::METHOD).map(str::trim) != Some(ns::CM_BEARER) {
            continue;
        }
        let Some(data) = find_child_element(sc, ns::SAML, ns::node::SUBJECT_CONFIRMATION_DATA) else {
            continue;
        };
        if data.attribute(ns::attr::RECIPIENT) != Some(config.recipient()) {
            continue;
        }
        let in_response_to = data.attribute(ns::attr::IN_RESPONSE_TO);
        if let Some(expected) = config.in_response_to.as_deref() {
            if in_response_to != Some(expected) {
                continue;
            }
        }
        let window = Window::from_element(data)?;
        if !window.contains(now, skew) {
            continue;
        }
        usable.push((window.not_on_or_after, in_response_to));
    }

    if usable.is_empty() {
        return Err(RejectReason::NoValidSubjectConfirmation);
    }

    // Any confirmation without an end keeps the assertion usable forever.
    let usable_until = if usable.iter().any(|(end, _)| end.is_none()) {
        None
    } else {
        usable.iter().filter_map(|(end, _)| *end).max()
    };
    Ok(Confirmation {
        usable_until,
        in_response_to: usable.iter().find_map(|(_, irt)| *irt),
    })
}

fn check_conditions(
    assertion: Node<'_, '_>,
    now: DateTime<Utc>,
    skew: Duration,
) -> Result<Window, RejectReason> {
    let window = match find_child_element(assertion, ns::SAML, ns::node::CONDITIONS) {
        Some(conditions) => Window::from_element(conditions)?,
        None => Window::default(),
    };
    window
        .check(now, skew)
        .map_err(|(boundary, at)| RejectReason::TemporalValidity { boundary, at })?;
    Ok(window)
}

fn earliest(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}
