#![forbid(unsafe_code)]

//! The Response validation pipeline.

use crate::claims;
use crate::config::SpConfig;
use crate::types::{Accepted, Outcome, ReplayInfo};
use crate::validator;
use base64::Engine;
use chrono::{DateTime, Utc};
use roxmltree::Document;
use sigtuna_core::{Error, ReferenceFault, RejectReason};
use sigtuna_keys::TrustCertificate;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, error, info, instrument, warn};

/// Validates SAML Responses for one service provider against one identity
/// provider key.
///
/// Immutable after construction and `Send + Sync`: share it behind an `Arc`
/// and call it from any number of threads.
#[derive(Debug, Clone)]
pub struct ResponseValidator {
    config: SpConfig,
    trust: TrustCertificate,
}

impl ResponseValidator {
    pub fn new(config: SpConfig, trust: TrustCertificate) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self { config, trust })
    }

    pub fn config(&self) -> &SpConfig {
        &self.config
    }

    pub fn trust(&self) -> &TrustCertificate {
        &self.trust
    }

    /// Validate a parsed Response at instant `now`.
    #[instrument(skip_all, name = "validate_response")]
    pub fn validate(&self, doc: &Document<'_>, now: DateTime<Utc>) -> Result<Accepted, RejectReason> {
        let result = self.run(doc, now);
        match &result {
            Ok(accepted) => info!(
                response_id = %accepted.response_id,
                assertion_id = %accepted.replay.assertion_id,
                "response accepted"
            ),
            // The binder has already logged these at error level.
            Err(RejectReason::SignatureReferenceMismatch(_)) => {}
            Err(reason) if reason.is_tampering() => error!(%reason, "response rejected"),
            Err(reason) => warn!(%reason, "response rejected"),
        }
        result
    }

    /// Validate raw Response XML.
    pub fn validate_xml(&self, xml: &str, now: DateTime<Utc>) -> Result<Accepted, RejectReason> {
        let doc = sigtuna_xml::document::parse(xml).map_err(|e| {
            warn!(error = %e, "response is not well-formed XML");
            RejectReason::from(e)
        })?;
        self.validate(&doc, now)
    }

    /// Validate a base64 `SAMLResponse` form value as posted by the HTTP-POST
    /// binding. Embedded whitespace is ignored.
    pub fn validate_base64(&self, encoded: &str, now: DateTime<Utc>) -> Result<Accepted, RejectReason> {
        let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(compact)
            .map_err(|_| RejectReason::MalformedDocument("invalid base64 content"))?;
        let xml = std::str::from_utf8(&bytes)
            .map_err(|_| RejectReason::MalformedDocument("response is not UTF-8"))?;
        self.validate_xml(xml, now)
    }

    /// Like [`Self::validate`], but never panics: any unexpected failure is
    /// reported as [`RejectReason::Internal`].
    pub fn evaluate(&self, doc: &Document<'_>, now: DateTime<Utc>) -> Outcome {
        fail_closed(|| self.validate(doc, now))
    }

    pub fn evaluate_xml(&self, xml: &str, now: DateTime<Utc>) -> Outcome {
        fail_closed(|| self.validate_xml(xml, now))
    }

    pub fn evaluate_base64(&self, encoded: &str, now: DateTime<Utc>) -> Outcome {
        fail_closed(|| self.validate_base64(encoded, now))
    }

    fn run(&self, doc: &Document<'_>, now: DateTime<Utc>) -> Result<Accepted, RejectReason> {
        let validated = validator::validate(doc, &self.config, now)?;
        debug!(assertion_id = %validated.assertion_id, "assertion checks passed");

        let bound = sigtuna_dsig::bind(doc, &validated.assertion_id)?;
        if bound.assertion != validated.assertion {
            error!("bound signature covers a different assertion");
            return Err(RejectReason::SignatureReferenceMismatch(ReferenceFault::WrongTarget));
        }
        sigtuna_dsig::verify(&bound, &self.trust, now)?;
        debug!("signature verified");

        // Claims are read only from the node the signature was verified over.
        let name_id = claims::extract_name_id(bound.assertion)?;
        let attributes = claims::extract_attributes(bound.assertion);

        Ok(Accepted {
            response_id: validated.response_id,
            issuer: validated.issuer,
            issue_instant: validated.issue_instant,
            in_response_to: validated.in_response_to,
            name_id,
            attributes,
            assurance: validated.assurance,
            replay: ReplayInfo {
                assertion_id: validated.assertion_id,
                expires_at: validated.usable_until,
            },
        })
    }
}

fn fail_closed(f: impl FnOnce() -> Result<Accepted, RejectReason>) -> Outcome {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => Outcome::from(result),
        Err(_) => {
            error!("validation panicked; rejecting response");
            Outcome::rejected(RejectReason::Internal)
        }
    }
}
