#![forbid(unsafe_code)]

//! Bind a signature to the assertion being processed.
//!
//! "Some signature in the document verifies" is not enough: an attacker can
//! wrap a genuinely signed element next to a forged assertion. The binder
//! only accepts a signature that
//! 1. is the only one whose single Reference is `#<assertion ID>`,
//! 2. refers to an ID carried by exactly one element in the whole document,
//! 3. resolves to the Assertion element itself, and
//! 4. is a direct child of that Assertion (enveloped).

use crate::signature::{reference_uris, SignatureInfo};
use roxmltree::{Document, Node};
use sigtuna_core::{ns, ReferenceFault, RejectReason};
use sigtuna_xml::document::{find_child_elements, find_elements};
use sigtuna_xml::{IdIndex, IdLookup};

/// A signature proven to cover exactly one assertion.
#[derive(Debug, Clone)]
pub struct BoundSignature<'a, 'input> {
    pub assertion: Node<'a, 'input>,
    pub signature: SignatureInfo<'a, 'input>,
}

/// Locate and bind the signature covering the Assertion whose `ID` is `assertion_id`.
pub fn bind<'a, 'input>(
    doc: &'a Document<'input>,
    assertion_id: &str,
) -> Result<BoundSignature<'a, 'input>, RejectReason> {
    let result = bind_inner(doc, assertion_id);
    if let Err(RejectReason::SignatureReferenceMismatch(fault)) = &result {
        tracing::error!(%fault, "signature is not bound to the assertion");
    }
    result
}

fn bind_inner<'a, 'input>(
    doc: &'a Document<'input>,
    assertion_id: &str,
) -> Result<BoundSignature<'a, 'input>, RejectReason> {
    let mismatch = RejectReason::SignatureReferenceMismatch;

    let assertion = find_elements(doc, ns::SAML, ns::node::ASSERTION)
        .into_iter()
        .find(|a| a.attribute(ns::attr::ID) == Some(assertion_id))
        .ok_or(RejectReason::MalformedDocument("assertion not found"))?;

    // Checked before looking at any signature: a duplicated ID makes every
    // same-document reference to it meaningless.
    let ids = IdIndex::build(doc);
    match ids.resolve(assertion_id) {
        IdLookup::Unique(id) if id == assertion.id() => {}
        IdLookup::Ambiguous(_) => return Err(mismatch(ReferenceFault::AmbiguousId)),
        IdLookup::Unique(_) | IdLookup::Missing => return Err(mismatch(ReferenceFault::WrongTarget)),
    }

    let fragment = format!("#{assertion_id}");
    let candidates: Vec<(Node<'a, 'input>, Vec<Option<String>>)> =
        find_elements(doc, ns::DSIG, ns::node::SIGNATURE)
            .into_iter()
            .map(|sig| (sig, reference_uris(sig)))
            .filter(|(_, uris)| uris.iter().any(|u| u.as_deref() == Some(fragment.as_str())))
            .collect();

    let (sig_node, uris) = match candidates.as_slice() {
        [] => return Err(mismatch(explain_missing(assertion))),
        [one] => one,
        _ => return Err(mismatch(ReferenceFault::MultipleSignatures)),
    };

    if uris.len() != 1 {
        return Err(mismatch(ReferenceFault::MultipleReferences));
    }
    if sig_node.parent() != Some(assertion) {
        return Err(mismatch(ReferenceFault::NotEnveloped));
    }

    let signature = SignatureInfo::parse(*sig_node)?;
    tracing::debug!("signature bound to assertion");
    Ok(BoundSignature { assertion, signature })
}

/// No signature claims the assertion. If the assertion carries one anyway,
/// say what is wrong with its reference.
fn explain_missing(assertion: Node<'_, '_>) -> ReferenceFault {
    let own = find_child_elements(assertion, ns::DSIG, ns::node::SIGNATURE);
    let Some(sig) = own.first() else {
        return ReferenceFault::MissingSignature;
    };
    match reference_uris(*sig).as_slice() {
        [] => ReferenceFault::MissingSignature,
        [Some(uri)] if uri.starts_with('#') => ReferenceFault::WrongTarget,
        [_] => ReferenceFault::NotSameDocument,
        _ => ReferenceFault::MultipleReferences,
    }
}
