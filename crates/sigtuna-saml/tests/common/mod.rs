#![allow(dead_code)]

//! Shared fixtures: an identity provider that builds and signs Responses.

use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use sigtuna_c14n::C14nMode;
use sigtuna_core::{algorithm, ns};
use sigtuna_keys::TrustCertificate;
use sigtuna_saml::{ResponseValidator, SpConfig};
use sigtuna_xml::NodeSet;
use std::sync::Once;

pub const ACS: &str = "https://sp.example.com/acs";
pub const IDP: &str = "https://idp.example.com";

pub const EC_CERT: &[u8] = include_bytes!("../data/ec_cert.pem");
pub const RSA_CERT: &[u8] = include_bytes!("../data/rsa_cert.pem");
const EC_KEY: &str = include_str!("../data/ec_pkcs8.pem");
const RSA_KEY: &str = include_str!("../data/rsa_pkcs8.pem");

const DIGEST_PLACEHOLDER: &str = "DIGEST_PLACEHOLDER";
const SIGNATURE_PLACEHOLDER: &str = "SIGNATURE_PLACEHOLDER";

static INIT: Once = Once::new();

/// Route tracing output through the test harness. Set `RUST_LOG` to see it.
pub fn init_test_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init()
            .ok();
    });
}

/// 2030-01-01T10:00:00Z, inside every default window.
pub fn now() -> DateTime<Utc> {
    at(10, 0, 0)
}

pub fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 1, 1, h, m, s).unwrap()
}

pub fn ec_validator() -> ResponseValidator {
    validator_with(SpConfig::new(ACS), EC_CERT)
}

pub fn rsa_validator() -> ResponseValidator {
    validator_with(SpConfig::new(ACS), RSA_CERT)
}

pub fn validator_with(config: SpConfig, cert_pem: &[u8]) -> ResponseValidator {
    init_test_logging();
    ResponseValidator::new(config, TrustCertificate::from_pem(cert_pem).unwrap()).unwrap()
}

/// The identity provider's signing key.
pub enum TestKey {
    Ec(p256::ecdsa::SigningKey),
    Rsa(rsa::RsaPrivateKey),
}

impl TestKey {
    pub fn ec() -> Self {
        use p256::pkcs8::DecodePrivateKey;
        Self::Ec(p256::ecdsa::SigningKey::from_pkcs8_pem(EC_KEY).unwrap())
    }

    pub fn rsa() -> Self {
        use rsa::pkcs8::DecodePrivateKey;
        Self::Rsa(rsa::RsaPrivateKey::from_pkcs8_pem(RSA_KEY).unwrap())
    }

    pub fn signature_method(&self) -> &'static str {
        match self {
            Self::Ec(_) => algorithm::ECDSA_SHA256,
            Self::Rsa(_) => algorithm::RSA_SHA256,
        }
    }

    /// Always hashes with SHA-256, whatever the SignatureMethod claims.
    pub fn sign(&self, data: &[u8]) -> Vec<u8> {
        use signature::{SignatureEncoding, Signer};
        match self {
            Self::Ec(key) => {
                let sig: p256::ecdsa::Signature = key.sign(data);
                sig.to_bytes().to_vec()
            }
            Self::Rsa(key) => {
                let signer = rsa::pkcs1v15::SigningKey::<sha2::Sha256>::new(key.clone());
                signer.sign(data).to_vec()
            }
        }
    }
}

pub fn success_status() -> String {
    format!(r#"<samlp:StatusCode Value="{}"/>"#, ns::STATUS_SUCCESS)
}

/// A Response with one Assertion, every field matching [`ACS`] by default.
#[derive(Debug, Clone)]
pub struct ResponseBuilder {
    pub response_id: String,
    pub assertion_id: String,
    pub destination: Option<String>,
    pub in_response_to: Option<String>,
    pub status: String,
    /// Raw XML content of the NameID element.
    pub name_id: String,
    pub audience: String,
    pub recipient: String,
    pub not_before: String,
    pub not_on_or_after: String,
    pub confirmation_not_on_or_after: String,
    pub attributes: Vec<(String, Vec<String>)>,
    /// Where the Reference points. Defaults to the assertion.
    pub reference_id: Option<String>,
    pub signature_method: Option<&'static str>,
    pub c14n_method: &'static str,
    pub digest_method: &'static str,
    pub prefix_list: Option<&'static str>,
    pub signed: bool,
    /// Appended inside the Response after the Assertion.
    pub extra: String,
}

impl Default for ResponseBuilder {
    fn default() -> Self {
        Self {
            response_id: "_resp1".into(),
            assertion_id: "_assert1".into(),
            destination: Some(ACS.into()),
            in_response_to: None,
            status: success_status(),
            name_id: "alice@example.com".into(),
            audience: ACS.into(),
            recipient: ACS.into(),
            not_before: "2030-01-01T09:55:00Z".into(),
            not_on_or_after: "2030-01-01T10:05:00Z".into(),
            confirmation_not_on_or_after: "2030-01-01T10:05:00Z".into(),
            attributes: Vec::new(),
            reference_id: None,
            signature_method: None,
            c14n_method: algorithm::EXC_C14N,
            digest_method: algorithm::SHA256,
            prefix_list: None,
            signed: true,
            extra: String::new(),
        }
    }
}

impl ResponseBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attribute(mut self, name: &str, values: &[&str]) -> Self {
        self.attributes
            .push((name.to_owned(), values.iter().map(|v| (*v).to_owned()).collect()));
        self
    }

    /// Response XML with an unsigned signature template.
    pub fn template(&self, key: &TestKey) -> String {
        let destination = self
            .destination
            .as_ref()
            .map(|d| format!(r#" Destination="{d}""#))
            .unwrap_or_default();
        let irt = self
            .in_response_to
            .as_ref()
            .map(|r| format!(r#" InResponseTo="{r}""#))
            .unwrap_or_default();
        let signature = if self.signed {
            signature_template(
                self.reference_id.as_deref().unwrap_or(&self.assertion_id),
                self.c14n_method,
                self.signature_method.unwrap_or_else(|| key.signature_method()),
                self.digest_method,
                self.prefix_list,
            )
        } else {
            String::new()
        };
        let attributes = if self.attributes.is_empty() {
            String::new()
        } else {
            let body: String = self
                .attributes
                .iter()
                .map(|(name, values)| {
                    let values: String = values
                        .iter()
                        .map(|v| format!(r#"<saml:AttributeValue xsi:type="xs:string">{v}</saml:AttributeValue>"#))
                        .collect();
                    format!(
                        r#"<saml:Attribute Name="{name}" NameFormat="urn:oasis:names:tc:SAML:2.0:attrname-format:basic">{values}</saml:Attribute>"#
                    )
                })
                .collect();
            format!("<saml:AttributeStatement>{body}</saml:AttributeStatement>")
        };

        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="{rid}" Version="2.0" IssueInstant="2030-01-01T09:59:58Z"{destination}{irt}>
  <saml:Issuer>{IDP}</saml:Issuer>
  <samlp:Status>{status}</samlp:Status>
  <saml:Assertion xmlns:xs="http://www.w3.org/2001/XMLSchema" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" ID="{aid}" Version="2.0" IssueInstant="2030-01-01T09:59:58Z">
    <saml:Issuer>{IDP}</saml:Issuer>{signature}
    <saml:Subject>
      <saml:NameID Format="urn:oasis:names:tc:SAML:1.1:nameid-format:emailAddress">{name_id}</saml:NameID>
      <saml:SubjectConfirmation Method="urn:oasis:names:tc:SAML:2.0:cm:bearer">
        <saml:SubjectConfirmationData Recipient="{recipient}" NotOnOrAfter="{sc_noa}"{irt}/>
      </saml:SubjectConfirmation>
    </saml:Subject>
    <saml:Conditions NotBefore="{nb}" NotOnOrAfter="{noa}">
      <saml:AudienceRestriction>
        <saml:Audience>{audience}</saml:Audience>
      </saml:AudienceRestriction>
    </saml:Conditions>
    <saml:AuthnStatement AuthnInstant="2030-01-01T09:59:50Z" SessionIndex="_session1">
      <saml:AuthnContext>
        <saml:AuthnContextClassRef>urn:oasis:names:tc:SAML:2.0:ac:classes:PasswordProtectedTransport</saml:AuthnContextClassRef>
      </saml:AuthnContext>
    </saml:AuthnStatement>{attributes}
  </saml:Assertion>{extra}
</samlp:Response>"#,
            rid = self.response_id,
            aid = self.assertion_id,
            status = self.status,
            name_id = self.name_id,
            recipient = self.recipient,
            sc_noa = self.confirmation_not_on_or_after,
            nb = self.not_before,
            noa = self.not_on_or_after,
            audience = self.audience,
            extra = self.extra,
        )
    }

    /// Build and sign with `key`.
    pub fn build(&self, key: &TestKey) -> String {
        let xml = self.template(key);
        if self.signed {
            sign_enveloped(&xml, self.reference_id.as_deref().unwrap_or(&self.assertion_id), key)
        } else {
            xml
        }
    }
}

pub fn signature_template(
    reference_id: &str,
    c14n_method: &str,
    signature_method: &str,
    digest_method: &str,
    prefix_list: Option<&str>,
) -> String {
    let inclusive = prefix_list
        .map(|p| {
            format!(r#"<ec:InclusiveNamespaces xmlns:ec="http://www.w3.org/2001/10/xml-exc-c14n#" PrefixList="{p}"/>"#)
        })
        .unwrap_or_default();
    format!(
        r##"
    <ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#">
      <ds:SignedInfo>
        <ds:CanonicalizationMethod Algorithm="{c14n_method}"/>
        <ds:SignatureMethod Algorithm="{signature_method}"/>
        <ds:Reference URI="#{reference_id}">
          <ds:Transforms>
            <ds:Transform Algorithm="http://www.w3.org/2000/09/xmldsig#enveloped-signature"/>
            <ds:Transform Algorithm="http://www.w3.org/2001/10/xml-exc-c14n#">{inclusive}</ds:Transform>
          </ds:Transforms>
          <ds:DigestMethod Algorithm="{digest_method}"/>
          <ds:DigestValue>{DIGEST_PLACEHOLDER}</ds:DigestValue>
        </ds:Reference>
      </ds:SignedInfo>
      <ds:SignatureValue>{SIGNATURE_PLACEHOLDER}</ds:SignatureValue>
    </ds:Signature>"##
    )
}

/// Fill in the one signature template in `xml`, covering the element whose
/// `ID` is `target_id`.
pub fn sign_enveloped(xml: &str, target_id: &str, key: &TestKey) -> String {
    let b64 = base64::engine::general_purpose::STANDARD;

    let doc = roxmltree::Document::parse(xml).unwrap();
    let target = doc
        .descendants()
        .find(|n| n.is_element() && n.attribute("ID") == Some(target_id))
        .unwrap();
    let sig = doc
        .descendants()
        .find(|n| n.has_tag_name((ns::DSIG, "Signature")))
        .unwrap();
    let digest_method = sig
        .descendants()
        .find(|n| n.has_tag_name((ns::DSIG, "DigestMethod")))
        .and_then(|n| n.attribute("Algorithm"))
        .unwrap();
    let prefixes: Vec<String> = sig
        .descendants()
        .find(|n| n.has_tag_name((ns::EXC_C14N, "InclusiveNamespaces")))
        .and_then(|n| n.attribute("PrefixList"))
        .map(|p| p.split_whitespace().map(str::to_owned).collect())
        .unwrap_or_default();

    let mut set = NodeSet::tree_without_comments(target);
    set.remove_subtree(sig);
    let c14n = sigtuna_c14n::canonicalize_doc(&doc, C14nMode::Exclusive, Some(&set), &prefixes).unwrap();
    // Unsupported digests still get a value so rejection paths can be tested.
    let digest = sigtuna_crypto::digest::digest(digest_method, &c14n).unwrap_or_else(|_| vec![0; 32]);
    let xml = xml.replacen(DIGEST_PLACEHOLDER, &b64.encode(digest), 1);

    let doc = roxmltree::Document::parse(&xml).unwrap();
    let signed_info = doc
        .descendants()
        .find(|n| n.has_tag_name((ns::DSIG, "SignedInfo")))
        .unwrap();
    let si_c14n = sigtuna_c14n::canonicalize_doc(
        &doc,
        C14nMode::Exclusive,
        Some(&NodeSet::tree_without_comments(signed_info)),
        &[],
    )
    .unwrap();
    xml.replacen(SIGNATURE_PLACEHOLDER, &b64.encode(key.sign(&si_c14n)), 1)
}

/// Base64 as an HTTP-POST binding form field would carry it.
pub fn post_binding(xml: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(xml);
    encoded
        .as_bytes()
        .chunks(76)
        .map(|c| std::str::from_utf8(c).unwrap())
        .collect::<Vec<_>>()
        .join("\r\n")
}
