#![forbid(unsafe_code)]

//! Subject and attribute extraction from a verified assertion.
//!
//! Text is taken from every descendant text node, so a comment inside a
//! NameID cannot truncate the value the way first-text-child readers do.

use crate::types::{Attributes, NameId};
use roxmltree::Node;
use sigtuna_core::{ns, RejectReason};
use sigtuna_xml::document::{find_child_element, find_child_elements, text_content};

/// `Subject/NameID`, required.
pub fn extract_name_id(assertion: Node<'_, '_>) -> Result<NameId, RejectReason> {
    let name_id = find_child_element(assertion, ns::SAML, ns::node::SUBJECT)
        .and_then(|s| find_child_element(s, ns::SAML, ns::node::NAME_ID))
        .ok_or(RejectReason::MalformedDocument("subject NameID missing"))?;

    let value = text_content(name_id).trim().to_owned();
    if value.is_empty() {
        return Err(RejectReason::MalformedDocument("subject NameID is empty"));
    }
    Ok(NameId {
        value,
        format: name_id.attribute(ns::attr::FORMAT).map(str::to_owned),
    })
}

/// Every `AttributeStatement/Attribute` of the assertion.
///
/// Attributes without a `Name` are skipped. Values keep document order and
/// repeated names are merged.
pub fn extract_attributes(assertion: Node<'_, '_>) -> Attributes {
    let mut attributes = Attributes::new();
    for statement in find_child_elements(assertion, ns::SAML, ns::node::ATTRIBUTE_STATEMENT) {
        for attr in find_child_elements(statement, ns::SAML, ns::node::ATTRIBUTE) {
            let Some(name) = attr.attribute(ns::attr::NAME) else {
                tracing::debug!("skipping attribute without Name");
                continue;
            };
            let values = find_child_elements(attr, ns::SAML, ns::node::ATTRIBUTE_VALUE)
                .into_iter()
                .map(text_content);
            attributes.extend(name, values);
        }
    }
    attributes
}
