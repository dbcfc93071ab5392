#![forbid(unsafe_code)]

//! XML-DSig verification of a bound assertion signature.
//!
//! Processing order:
//! 1. Check every algorithm against the allow-list
//! 2. Check the trust certificate is valid at `now`
//! 3. Apply the Reference transforms to the assertion, digest, compare
//! 4. Canonicalize `<SignedInfo>`
//! 5. Verify `<SignatureValue>` with the trust certificate's key
//!
//! The `<KeyInfo>` certificate is never used to verify anything.

use crate::bind::BoundSignature;
use crate::signature::{ReferenceInfo, TransformInfo};
use base64::Engine;
use chrono::{DateTime, Utc};
use sigtuna_c14n::C14nMode;
use sigtuna_core::{algorithm, Error, RejectReason};
use sigtuna_crypto::digest;
use sigtuna_keys::TrustCertificate;
use sigtuna_xml::NodeSet;

/// Verify `bound` with `trust` at time `now`.
pub fn verify(
    bound: &BoundSignature<'_, '_>,
    trust: &TrustCertificate,
    now: DateTime<Utc>,
) -> Result<(), RejectReason> {
    let sig = &bound.signature;
    let [reference] = sig.references.as_slice() else {
        return Err(RejectReason::MalformedDocument("signature must carry exactly one reference"));
    };

    let c14n_mode = check_algorithms(&sig.canonicalization_method, &sig.signature_method, reference)?;
    trust.check_validity(now)?;

    let digest_input = apply_transforms(bound, &reference.transforms)?;
    let computed = digest::digest(&reference.digest_method, &digest_input)?;
    let expected = decode_base64(&reference.digest_value, "DigestValue")?;
    if !digest::constant_time_eq(&computed, &expected) {
        tracing::warn!("assertion digest does not match DigestValue");
        return Err(RejectReason::SignatureInvalid);
    }

    let doc = sig.signed_info.document();
    let signed_info_set = NodeSet::tree_without_comments(sig.signed_info);
    let c14n_signed_info =
        sigtuna_c14n::canonicalize_doc(doc, c14n_mode, Some(&signed_info_set), &sig.inclusive_prefixes)?;

    let sig_value = decode_base64(&sig.signature_value, "SignatureValue")?;
    let sig_alg = sigtuna_crypto::sign::from_uri(&sig.signature_method)?;
    match sig_alg.verify(trust.public_key(), &c14n_signed_info, &sig_value) {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!(algorithm = sig_alg.uri(), "signature value does not verify");
            return Err(RejectReason::SignatureInvalid);
        }
        Err(e) => {
            tracing::warn!(algorithm = sig_alg.uri(), error = %e, "signature value unusable with trust key");
            return Err(RejectReason::SignatureInvalid);
        }
    }

    log_certificate_hint(sig.certificate_hint.as_deref(), trust);
    tracing::debug!(algorithm = sig_alg.uri(), "assertion signature verified");
    Ok(())
}

/// Reject anything outside the allow-list before any cryptography runs.
///
/// The Reference must end with an exclusive C14N transform: otherwise the
/// implicit default (inclusive C14N) would apply, and it is not accepted.
fn check_algorithms(
    c14n_method: &str,
    signature_method: &str,
    reference: &ReferenceInfo,
) -> Result<C14nMode, RejectReason> {
    let unsupported = |what: &str, uri: &str| {
        tracing::warn!(kind = what, uri, "algorithm outside the allow-list");
        RejectReason::UnsupportedAlgorithm
    };

    let mode = C14nMode::from_uri(c14n_method)
        .filter(|_| algorithm::is_allowed_c14n(c14n_method))
        .ok_or_else(|| unsupported("canonicalization", c14n_method))?;
    if !algorithm::is_allowed_signature(signature_method) {
        return Err(unsupported("signature", signature_method));
    }
    if !algorithm::is_allowed_digest(&reference.digest_method) {
        return Err(unsupported("digest", &reference.digest_method));
    }
    if let Some(t) = reference
        .transforms
        .iter()
        .find(|t| !algorithm::is_allowed_transform(&t.algorithm))
    {
        return Err(unsupported("transform", &t.algorithm));
    }
    match reference.transforms.last() {
        Some(t) if algorithm::is_allowed_c14n(&t.algorithm) => Ok(mode),
        _ => Err(unsupported("transform", algorithm::C14N)),
    }
}

/// Run the Reference transforms over the assertion subtree and return the
/// octets to digest.
fn apply_transforms(
    bound: &BoundSignature<'_, '_>,
    transforms: &[TransformInfo],
) -> Result<Vec<u8>, Error> {
    // A `#id` reference selects the subtree without comments, whatever the
    // C14N variant that follows.
    let mut node_set = NodeSet::tree_without_comments(bound.assertion);
    let doc = bound.assertion.document();

    for (i, t) in transforms.iter().enumerate() {
        if t.algorithm == algorithm::ENVELOPED_SIGNATURE {
            node_set.remove_subtree(bound.signature.node);
            continue;
        }
        let mode = C14nMode::from_uri(&t.algorithm)
            .ok_or_else(|| Error::UnsupportedAlgorithm(format!("transform: {}", t.algorithm)))?;
        if i + 1 != transforms.len() {
            return Err(Error::UnsupportedAlgorithm(
                "canonicalization must be the final transform".into(),
            ));
        }
        return sigtuna_c14n::canonicalize_doc(doc, mode, Some(&node_set), &t.inclusive_prefixes);
    }
    Err(Error::UnsupportedAlgorithm("reference has no canonicalization transform".into()))
}

fn decode_base64(value: &str, what: &str) -> Result<Vec<u8>, Error> {
    base64::engine::general_purpose::STANDARD
        .decode(value)
        .map_err(|e| Error::Base64(format!("{what}: {e}")))
}

fn log_certificate_hint(hint: Option<&str>, trust: &TrustCertificate) {
    let Some(hint) = hint else { return };
    let Some(trust_der) = trust.der() else { return };
    match base64::engine::general_purpose::STANDARD.decode(hint) {
        Ok(der) if der == trust_der => {}
        _ => tracing::debug!("KeyInfo certificate differs from the trust certificate; ignored"),
    }
}
