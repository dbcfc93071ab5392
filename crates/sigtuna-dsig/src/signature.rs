#![forbid(unsafe_code)]

//! Read a `<ds:Signature>` element into a typed description.
//!
//! Parsing checks structure only. Algorithm URIs are carried as written and
//! judged later by the verifier.

use roxmltree::Node;
use sigtuna_core::{ns, Error};
use sigtuna_xml::document::{base64_content, find_child_element, find_child_elements};

/// One `<ds:Transform>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformInfo {
    pub algorithm: String,
    /// InclusiveNamespaces PrefixList, for exclusive C14N transforms.
    pub inclusive_prefixes: Vec<String>,
}

/// One `<ds:Reference>`.
#[derive(Debug, Clone)]
pub struct ReferenceInfo {
    /// The URI attribute; `None` when absent.
    pub uri: Option<String>,
    pub transforms: Vec<TransformInfo>,
    pub digest_method: String,
    /// Base64 digest with whitespace removed.
    pub digest_value: String,
}

/// A parsed `<ds:Signature>`.
#[derive(Debug, Clone)]
pub struct SignatureInfo<'a, 'input> {
    pub node: Node<'a, 'input>,
    pub signed_info: Node<'a, 'input>,
    pub canonicalization_method: String,
    pub inclusive_prefixes: Vec<String>,
    pub signature_method: String,
    pub references: Vec<ReferenceInfo>,
    /// Base64 signature value with whitespace removed.
    pub signature_value: String,
    /// Embedded `X509Certificate`, base64. Informational only.
    pub certificate_hint: Option<String>,
}

impl<'a, 'input> SignatureInfo<'a, 'input> {
    pub fn parse(sig_node: Node<'a, 'input>) -> Result<Self, Error> {
        let signed_info = find_child_element(sig_node, ns::DSIG, ns::node::SIGNED_INFO)
            .ok_or_else(|| Error::MissingElement("SignedInfo".into()))?;

        let c14n_method_node =
            find_child_element(signed_info, ns::DSIG, ns::node::CANONICALIZATION_METHOD)
                .ok_or_else(|| Error::MissingElement("CanonicalizationMethod".into()))?;
        let canonicalization_method = algorithm_of(c14n_method_node, "CanonicalizationMethod")?;

        let sig_method_node = find_child_element(signed_info, ns::DSIG, ns::node::SIGNATURE_METHOD)
            .ok_or_else(|| Error::MissingElement("SignatureMethod".into()))?;
        let signature_method = algorithm_of(sig_method_node, "SignatureMethod")?;

        let references = find_child_elements(signed_info, ns::DSIG, ns::node::REFERENCE)
            .into_iter()
            .map(parse_reference)
            .collect::<Result<Vec<_>, _>>()?;

        let sig_value_node = find_child_element(sig_node, ns::DSIG, ns::node::SIGNATURE_VALUE)
            .ok_or_else(|| Error::MissingElement("SignatureValue".into()))?;

        let certificate_hint = find_child_element(sig_node, ns::DSIG, ns::node::KEY_INFO)
            .and_then(|ki| find_child_element(ki, ns::DSIG, ns::node::X509_DATA))
            .and_then(|xd| find_child_element(xd, ns::DSIG, ns::node::X509_CERTIFICATE))
            .map(base64_content);

        Ok(Self {
            node: sig_node,
            signed_info,
            canonicalization_method,
            inclusive_prefixes: read_inclusive_prefixes(c14n_method_node),
            signature_method,
            references,
            signature_value: base64_content(sig_value_node),
            certificate_hint,
        })
    }
}

/// The URI attribute of every Reference in a Signature's SignedInfo.
///
/// Used to pick candidate signatures before committing to a full parse.
pub fn reference_uris(sig_node: Node<'_, '_>) -> Vec<Option<String>> {
    find_child_element(sig_node, ns::DSIG, ns::node::SIGNED_INFO)
        .map(|si| {
            find_child_elements(si, ns::DSIG, ns::node::REFERENCE)
                .into_iter()
                .map(|r| r.attribute(ns::attr::URI).map(str::to_owned))
                .collect()
        })
        .unwrap_or_default()
}

fn parse_reference(reference: Node<'_, '_>) -> Result<ReferenceInfo, Error> {
    let digest_method_node = find_child_element(reference, ns::DSIG, ns::node::DIGEST_METHOD)
        .ok_or_else(|| Error::MissingElement("DigestMethod".into()))?;
    let digest_value_node = find_child_element(reference, ns::DSIG, ns::node::DIGEST_VALUE)
        .ok_or_else(|| Error::MissingElement("DigestValue".into()))?;

    let mut transforms = Vec::new();
    if let Some(transforms_node) = find_child_element(reference, ns::DSIG, ns::node::TRANSFORMS) {
        for t in find_child_elements(transforms_node, ns::DSIG, ns::node::TRANSFORM) {
            transforms.push(TransformInfo {
                algorithm: algorithm_of(t, "Transform")?,
                inclusive_prefixes: read_inclusive_prefixes(t),
            });
        }
    }

    Ok(ReferenceInfo {
        uri: reference.attribute(ns::attr::URI).map(str::to_owned),
        transforms,
        digest_method: algorithm_of(digest_method_node, "DigestMethod")?,
        digest_value: base64_content(digest_value_node),
    })
}

fn algorithm_of(node: Node<'_, '_>, element: &str) -> Result<String, Error> {
    node.attribute(ns::attr::ALGORITHM)
        .map(|a| a.trim().to_owned())
        .ok_or_else(|| Error::MissingAttribute(format!("Algorithm on {element}")))
}

/// `<ec:InclusiveNamespaces PrefixList="...">` under a C14N method or transform.
fn read_inclusive_prefixes(node: Node<'_, '_>) -> Vec<String> {
    find_child_element(node, ns::EXC_C14N, ns::node::INCLUSIVE_NAMESPACES)
        .and_then(|n| n.attribute(ns::attr::PREFIX_LIST))
        .map(|list| list.split_whitespace().map(str::to_owned).collect())
        .unwrap_or_default()
}
