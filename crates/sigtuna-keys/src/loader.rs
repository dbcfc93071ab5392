#![forbid(unsafe_code)]

//! Certificate decoding: PEM, DER and bare base64.

use base64::Engine;
use der::{Decode, Encode};
use sigtuna_core::Error;
use sigtuna_crypto::PublicKey;
use spki::DecodePublicKey;
use x509_cert::Certificate;

/// What kind of encoding a certificate blob appears to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertFormat {
    Pem,
    Base64,
    Der,
}

/// Guess the encoding of a certificate blob.
pub fn detect_format(data: &[u8]) -> CertFormat {
    let Ok(text) = std::str::from_utf8(data) else {
        return CertFormat::Der;
    };
    let text = text.trim();
    if text.starts_with("-----BEGIN") {
        CertFormat::Pem
    } else if !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=') || c.is_whitespace())
    {
        CertFormat::Base64
    } else {
        CertFormat::Der
    }
}

/// Extract DER bytes from a `CERTIFICATE` PEM block.
pub fn pem_to_der(pem_data: &[u8]) -> Result<Vec<u8>, Error> {
    let pem_str = std::str::from_utf8(pem_data)
        .map_err(|e| Error::Certificate(format!("invalid PEM encoding: {e}")))?;

    // Some PEM files carry trailing blank lines.
    let (label, der_bytes) = pem_rfc7468::decode_vec(pem_str.trim().as_bytes())
        .map_err(|e| Error::Certificate(format!("failed to decode certificate PEM: {e}")))?;

    if label != "CERTIFICATE" {
        return Err(Error::Certificate(format!(
            "expected CERTIFICATE PEM label, got: {label}"
        )));
    }
    Ok(der_bytes)
}

/// Decode the base64 body of a certificate, ignoring embedded whitespace.
pub fn base64_to_der(text: &str) -> Result<Vec<u8>, Error> {
    let clean: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(clean)
        .map_err(|e| Error::Base64(format!("certificate: {e}")))
}

pub fn parse_certificate(der_bytes: &[u8]) -> Result<Certificate, Error> {
    Certificate::from_der(der_bytes)
        .map_err(|e| Error::Certificate(format!("failed to parse X.509 certificate: {e}")))
}

/// Extract the subject public key of a certificate.
///
/// RSA, EC P-256 and EC P-384 keys are recognized; anything else is an error.
pub fn public_key_of(cert: &Certificate) -> Result<PublicKey, Error> {
    let spki_der = cert
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|e| Error::Key(format!("failed to encode SPKI: {e}")))?;

    if let Ok(pk) = rsa::RsaPublicKey::from_public_key_der(&spki_der) {
        return Ok(PublicKey::Rsa(pk));
    }
    if let Ok(vk) = p256::ecdsa::VerifyingKey::from_public_key_der(&spki_der) {
        return Ok(PublicKey::EcP256(vk));
    }
    if let Ok(vk) = p384::ecdsa::VerifyingKey::from_public_key_der(&spki_der) {
        return Ok(PublicKey::EcP384(vk));
    }
    Err(Error::Key("unsupported certificate public key type".into()))
}
