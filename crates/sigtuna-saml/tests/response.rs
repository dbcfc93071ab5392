mod common;

use chrono::Duration;
use common::*;
use sigtuna_core::{algorithm, Boundary};
use sigtuna_saml::{Outcome, RejectReason, SpConfig};
use std::sync::Arc;

#[test]
fn test_minimal_response_accepted() {
    let xml = ResponseBuilder::new().build(&TestKey::ec());
    let accepted = ec_validator().validate_xml(&xml, now()).unwrap();

    assert_eq!(accepted.name_id.value, "alice@example.com");
    assert_eq!(
        accepted.name_id.format.as_deref(),
        Some("urn:oasis:names:tc:SAML:1.1:nameid-format:emailAddress")
    );
    assert!(accepted.attributes.is_empty());
    assert_eq!(accepted.response_id, "_resp1");
    assert_eq!(accepted.issuer.as_deref(), Some(IDP));
    assert!(accepted.assurance.destination_present);
    assert_eq!(accepted.replay.assertion_id, "_assert1");
    assert_eq!(accepted.replay.expires_at, Some(at(10, 5, 0)));
}

#[test]
fn test_rsa_signed_response_accepted() {
    let xml = ResponseBuilder::new().build(&TestKey::rsa());
    let accepted = rsa_validator().validate_xml(&xml, now()).unwrap();
    assert_eq!(accepted.name_id.value, "alice@example.com");
}

#[test]
fn test_wrong_trust_key() {
    let xml = ResponseBuilder::new().build(&TestKey::rsa());
    assert_eq!(ec_validator().validate_xml(&xml, now()), Err(RejectReason::SignatureInvalid));
}

#[test]
fn test_attribute_values_keep_order_and_merge() {
    let xml = ResponseBuilder::new()
        .attribute("groups", &["admins", "staff"])
        .attribute("mail", &["alice@example.com"])
        .attribute("groups", &["ops"])
        .build(&TestKey::ec());
    let accepted = ec_validator().validate_xml(&xml, now()).unwrap();

    assert_eq!(accepted.attributes.len(), 2);
    assert_eq!(accepted.attributes.get("groups").unwrap(), ["admins", "staff", "ops"]);
    assert_eq!(accepted.attributes.first("mail"), Some("alice@example.com"));
}

#[test]
fn test_two_values_in_order() {
    let xml = ResponseBuilder::new()
        .attribute("role", &["second", "first"])
        .build(&TestKey::ec());
    let accepted = ec_validator().validate_xml(&xml, now()).unwrap();
    assert_eq!(accepted.attributes.get("role").unwrap(), ["second", "first"]);
}

#[test]
fn test_inclusive_prefix_list() {
    let xml = ResponseBuilder {
        prefix_list: Some("xs xsi"),
        ..ResponseBuilder::new()
    }
    .attribute("mail", &["alice@example.com"])
    .build(&TestKey::ec());
    assert!(ec_validator().validate_xml(&xml, now()).is_ok());
}

#[test]
fn test_status_failure() {
    let status = r#"<samlp:StatusCode Value="urn:oasis:names:tc:SAML:2.0:status:Responder"><samlp:StatusCode Value="urn:oasis:names:tc:SAML:2.0:status:AuthnFailed"/></samlp:StatusCode><samlp:StatusMessage>Authentication failed</samlp:StatusMessage>"#;
    let xml = ResponseBuilder { status: status.into(), ..ResponseBuilder::new() }.build(&TestKey::ec());

    let reason = ec_validator().validate_xml(&xml, now()).unwrap_err();
    assert_eq!(
        reason,
        RejectReason::StatusFailure {
            code: "Responder".into(),
            sub_code: Some("AuthnFailed".into()),
            message: Some("Authentication failed".into()),
        }
    );
    assert!(!reason.is_tampering());
}

#[test]
fn test_status_message_is_sanitized() {
    let status = "<samlp:StatusCode Value=\"urn:oasis:names:tc:SAML:2.0:status:Requester\"/><samlp:StatusMessage>line1\nFAKE LOG ENTRY</samlp:StatusMessage>";
    let xml = ResponseBuilder { status: status.into(), ..ResponseBuilder::new() }.build(&TestKey::ec());
    match ec_validator().validate_xml(&xml, now()) {
        Err(RejectReason::StatusFailure { code, message, .. }) => {
            assert_eq!(code, "Requester");
            assert!(!message.unwrap().contains('\n'));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_destination_absent_is_flagged() {
    let xml = ResponseBuilder { destination: None, ..ResponseBuilder::new() }.build(&TestKey::ec());
    let accepted = ec_validator().validate_xml(&xml, now()).unwrap();
    assert!(!accepted.assurance.destination_present);
}

#[test]
fn test_binding_mismatches() {
    let key = TestKey::ec();
    let validator = ec_validator();

    let xml = ResponseBuilder {
        destination: Some("https://attacker.example.com/acs".into()),
        ..ResponseBuilder::new()
    }
    .build(&key);
    assert_eq!(validator.validate_xml(&xml, now()), Err(RejectReason::DestinationMismatch));

    let xml = ResponseBuilder { audience: "https://other-sp.example.com".into(), ..ResponseBuilder::new() }
        .build(&key);
    assert_eq!(validator.validate_xml(&xml, now()), Err(RejectReason::AudienceMismatch));

    let xml = ResponseBuilder { recipient: "https://other-sp.example.com/acs".into(), ..ResponseBuilder::new() }
        .build(&key);
    assert_eq!(validator.validate_xml(&xml, now()), Err(RejectReason::NoValidSubjectConfirmation));
}

#[test]
fn test_separate_audience_and_recipient() {
    let config = SpConfig::new(ACS)
        .with_audience("urn:sp:entity")
        .with_recipient("https://sp.example.com/acs/post");
    let xml = ResponseBuilder {
        audience: "urn:sp:entity".into(),
        recipient: "https://sp.example.com/acs/post".into(),
        ..ResponseBuilder::new()
    }
    .build(&TestKey::ec());
    assert!(validator_with(config, EC_CERT).validate_xml(&xml, now()).is_ok());
}

#[test]
fn test_in_response_to() {
    let xml = ResponseBuilder { in_response_to: Some("_req42".into()), ..ResponseBuilder::new() }
        .build(&TestKey::ec());

    let expecting = validator_with(SpConfig::new(ACS).with_in_response_to("_req42"), EC_CERT);
    let accepted = expecting.validate_xml(&xml, now()).unwrap();
    assert_eq!(accepted.in_response_to.as_deref(), Some("_req42"));

    let other = validator_with(SpConfig::new(ACS).with_in_response_to("_req43"), EC_CERT);
    assert_eq!(other.validate_xml(&xml, now()), Err(RejectReason::NoValidSubjectConfirmation));

    let unsolicited = ResponseBuilder::new().build(&TestKey::ec());
    assert_eq!(
        expecting.validate_xml(&unsolicited, now()),
        Err(RejectReason::NoValidSubjectConfirmation)
    );
}

#[test]
fn test_window_is_half_open() {
    let xml = ResponseBuilder {
        confirmation_not_on_or_after: "2030-01-01T11:00:00Z".into(),
        ..ResponseBuilder::new()
    }
    .build(&TestKey::ec());
    let validator = ec_validator();

    assert!(validator.validate_xml(&xml, at(9, 55, 0)).is_ok());
    assert!(validator.validate_xml(&xml, at(10, 4, 59)).is_ok());
    assert_eq!(
        validator.validate_xml(&xml, at(10, 5, 0)),
        Err(RejectReason::TemporalValidity { boundary: Boundary::NotOnOrAfter, at: at(10, 5, 0) })
    );
    assert_eq!(
        validator.validate_xml(&xml, at(9, 54, 59)),
        Err(RejectReason::TemporalValidity { boundary: Boundary::NotBefore, at: at(9, 55, 0) })
    );
}

#[test]
fn test_confirmation_expiry_rejects() {
    let xml = ResponseBuilder::new().build(&TestKey::ec());
    assert_eq!(
        ec_validator().validate_xml(&xml, at(10, 5, 0)),
        Err(RejectReason::NoValidSubjectConfirmation)
    );
}

#[test]
fn test_clock_skew() {
    let xml = ResponseBuilder::new().build(&TestKey::ec());
    let lenient = validator_with(SpConfig::new(ACS).with_clock_skew(60), EC_CERT);

    let late = at(10, 5, 30);
    assert!(ec_validator().validate_xml(&xml, late).is_err());
    let accepted = lenient.validate_xml(&xml, late).unwrap();
    assert_eq!(accepted.replay.expires_at, Some(at(10, 5, 0) + Duration::seconds(60)));
    assert!(lenient.validate_xml(&xml, at(10, 6, 0)).is_err());
}

#[test]
fn test_trust_certificate_validity() {
    let xml = ResponseBuilder {
        not_before: "2047-01-01T09:55:00Z".into(),
        not_on_or_after: "2047-01-01T10:05:00Z".into(),
        confirmation_not_on_or_after: "2047-01-01T10:05:00Z".into(),
        ..ResponseBuilder::new()
    }
    .build(&TestKey::ec());
    let validator = ec_validator();
    let now = chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2047, 1, 1, 10, 0, 0).unwrap();

    assert_eq!(
        validator.validate_xml(&xml, now),
        Err(RejectReason::CertificateExpired {
            boundary: Boundary::NotAfter,
            at: validator.trust().not_after(),
        })
    );
}

#[test]
fn test_post_binding_entry_point() {
    let xml = ResponseBuilder::new().build(&TestKey::ec());
    let accepted = ec_validator().validate_base64(&post_binding(&xml), now()).unwrap();
    assert_eq!(accepted.name_id.value, "alice@example.com");
}

#[test]
fn test_evaluate_outcome() {
    let validator = ec_validator();
    let good = ResponseBuilder::new().build(&TestKey::ec());
    let bad = ResponseBuilder { audience: "urn:nope".into(), ..ResponseBuilder::new() }.build(&TestKey::ec());

    assert!(validator.evaluate_xml(&good, now()).is_accepted());
    match validator.evaluate_xml(&bad, now()) {
        Outcome::Rejected { reason, diagnostic } => {
            assert_eq!(reason, RejectReason::AudienceMismatch);
            assert!(!diagnostic.contains("urn:nope"));
        }
        Outcome::Accepted(_) => panic!("wrong audience accepted"),
    }
}

#[test]
fn test_accepted_serializes() {
    let xml = ResponseBuilder::new()
        .attribute("mail", &["alice@example.com"])
        .build(&TestKey::ec());
    let accepted = ec_validator().validate_xml(&xml, now()).unwrap();
    let json = serde_json::to_value(&accepted).unwrap();

    assert_eq!(json["name_id"]["value"], "alice@example.com");
    assert_eq!(json["attributes"]["mail"][0], "alice@example.com");
    assert_eq!(json["assurance"]["destination_present"], true);
    assert_eq!(json["replay"]["assertion_id"], "_assert1");
}

#[test]
fn test_shared_across_threads() {
    let validator = Arc::new(ec_validator());
    let good = Arc::new(ResponseBuilder::new().build(&TestKey::ec()));
    let bad = Arc::new(good.replace("alice@example.com", "mallory@example.com"));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let validator = Arc::clone(&validator);
            let xml = if i % 2 == 0 { Arc::clone(&good) } else { Arc::clone(&bad) };
            std::thread::spawn(move || (i, validator.validate_xml(&xml, now())))
        })
        .collect();

    for handle in handles {
        let (i, result) = handle.join().unwrap();
        if i % 2 == 0 {
            assert!(result.is_ok());
        } else {
            assert_eq!(result, Err(RejectReason::SignatureInvalid));
        }
    }
}

#[test]
fn test_ecdsa_sha384_label_with_sha256_signature() {
    let xml = ResponseBuilder {
        signature_method: Some(algorithm::ECDSA_SHA384),
        ..ResponseBuilder::new()
    }
    .build(&TestKey::ec());
    assert_eq!(ec_validator().validate_xml(&xml, now()), Err(RejectReason::SignatureInvalid));
}

#[test]
fn test_padded_destination_rejected() {
    let xml = ResponseBuilder {
        destination: Some(format!(" {ACS} ")),
        ..ResponseBuilder::new()
    }
    .build(&TestKey::ec());
    assert_eq!(ec_validator().validate_xml(&xml, now()), Err(RejectReason::DestinationMismatch));
}

#[test]
fn test_unusable_confirmation_before_usable_one() {
    let key = TestKey::ec();
    let template = ResponseBuilder::new().template(&key).replacen(
        "<saml:SubjectConfirmation Method",
        &format!(
            r#"<saml:SubjectConfirmation Method="urn:oasis:names:tc:SAML:2.0:cm:bearer">
        <saml:SubjectConfirmationData Recipient="{ACS}" NotBefore="2030-01-01T10:02:00Z" NotOnOrAfter="2030-01-01T10:05:00Z"/>
      </saml:SubjectConfirmation>
      <saml:SubjectConfirmation Method"#
        ),
        1,
    );
    let xml = sign_enveloped(&template, "_assert1", &key);
    let validator = ec_validator();

    assert!(validator.validate_xml(&xml, now()).is_ok());

    let only_future = ResponseBuilder::new().template(&key).replace(
        r#"NotOnOrAfter="2030-01-01T10:05:00Z"/>"#,
        r#"NotBefore="2030-01-01T10:02:00Z" NotOnOrAfter="2030-01-01T10:05:00Z"/>"#,
    );
    let xml = sign_enveloped(&only_future, "_assert1", &key);
    assert_eq!(validator.validate_xml(&xml, now()), Err(RejectReason::NoValidSubjectConfirmation));
}

#[test]
fn test_attribute_prefix_shared_with_another_binding() {
    // A second prefix bound to the XMLSchema-instance namespace, declared
    // ahead of xsi.
    let key = TestKey::ec();
    let template = ResponseBuilder::new()
        .attribute("mail", &["alice@example.com"])
        .template(&key)
        .replacen(
            "<saml:Assertion xmlns:xs",
            r#"<saml:Assertion xmlns:aaa="http://www.w3.org/2001/XMLSchema-instance" xmlns:xs"#,
            1,
        );
    let xml = sign_enveloped(&template, "_assert1", &key);
    let accepted = ec_validator().validate_xml(&xml, now()).unwrap();
    assert_eq!(accepted.attributes.first("mail"), Some("alice@example.com"));
}
