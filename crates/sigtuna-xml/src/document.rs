#![forbid(unsafe_code)]

//! XML document wrapper over roxmltree with ID resolution.

use sigtuna_core::{ns, Error};
use std::collections::HashMap;

/// Parse untrusted XML text with [`crate::parsing_options`].
pub fn parse(text: &str) -> Result<roxmltree::Document<'_>, Error> {
    roxmltree::Document::parse_with_options(text, crate::parsing_options())
        .map_err(|e| Error::XmlParse(e.to_string()))
}

/// Does `node` have the given local name and namespace?
pub fn is_element(node: roxmltree::Node<'_, '_>, ns_uri: &str, local_name: &str) -> bool {
    node.is_element()
        && node.tag_name().name() == local_name
        && node.tag_name().namespace().unwrap_or("") == ns_uri
}

/// Find all descendant elements with the given local name and namespace.
pub fn find_elements<'a, 'input>(
    doc: &'a roxmltree::Document<'input>,
    ns_uri: &str,
    local_name: &str,
) -> Vec<roxmltree::Node<'a, 'input>> {
    doc.descendants()
        .filter(|n| is_element(*n, ns_uri, local_name))
        .collect()
}

pub fn find_child_element<'a, 'input>(
    parent: roxmltree::Node<'a, 'input>,
    ns_uri: &str,
    local_name: &str,
) -> Option<roxmltree::Node<'a, 'input>> {
    parent.children().find(|n| is_element(*n, ns_uri, local_name))
}

pub fn find_child_elements<'a, 'input>(
    parent: roxmltree::Node<'a, 'input>,
    ns_uri: &str,
    local_name: &str,
) -> Vec<roxmltree::Node<'a, 'input>> {
    parent
        .children()
        .filter(|n| is_element(*n, ns_uri, local_name))
        .collect()
}

/// Concatenated text of every descendant text node.
///
/// `roxmltree::Node::text` only returns the first text child, which would let
/// an injected comment (`user@evil.com<!---->.example.org`) truncate a value.
pub fn text_content(node: roxmltree::Node<'_, '_>) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect()
}

/// Base64 text content with all whitespace removed.
pub fn base64_content(node: roxmltree::Node<'_, '_>) -> String {
    text_content(node)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

/// Result of resolving a same-document ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdLookup {
    Missing,
    Unique(roxmltree::NodeId),
    /// More than one element carries the ID; holds how many.
    Ambiguous(usize),
}

/// Map from ID value to every element carrying it.
///
/// The attributes in [`ns::attr::ID_ATTRS`] are ID-typed. Unlike a plain
/// `HashMap<String, NodeId>`, a later duplicate never silently replaces an
/// earlier element: both are kept and lookups report the ambiguity.
#[derive(Debug, Default)]
pub struct IdIndex {
    map: HashMap<String, Vec<roxmltree::NodeId>>,
}

impl IdIndex {
    /// Index every ID-typed attribute in the document.
    pub fn build(doc: &roxmltree::Document<'_>) -> Self {
        let mut map: HashMap<String, Vec<roxmltree::NodeId>> = HashMap::new();
        for node in doc.descendants().filter(|n| n.is_element()) {
            for attr_name in ns::attr::ID_ATTRS {
                if let Some(val) = node.attribute(attr_name) {
                    let nodes = map.entry(val.to_owned()).or_default();
                    // One element with both `ID` and `Id` set to the same value
                    // still counts once.
                    if nodes.last() != Some(&node.id()) {
                        nodes.push(node.id());
                    }
                }
            }
        }
        Self { map }
    }

    pub fn resolve(&self, id: &str) -> IdLookup {
        match self.map.get(id).map(Vec::as_slice) {
            None | Some([]) => IdLookup::Missing,
            Some([only]) => IdLookup::Unique(*only),
            Some(many) => IdLookup::Ambiguous(many.len()),
        }
    }
}
