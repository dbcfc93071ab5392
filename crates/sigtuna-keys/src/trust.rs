#![forbid(unsafe_code)]

//! The identity provider's trust certificate.

use crate::loader::{self, CertFormat};
use chrono::{DateTime, Utc};
use sigtuna_core::{Boundary, Error, RejectReason};
use sigtuna_crypto::PublicKey;

/// Smallest RSA modulus accepted for a trust key.
pub const MIN_RSA_BITS: usize = 2048;

/// The single key a service provider verifies identity provider signatures with.
///
/// Cheap to share: wrap the owning validator in an `Arc` rather than cloning.
#[derive(Debug, Clone)]
pub struct TrustCertificate {
    public_key: PublicKey,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    der: Option<Vec<u8>>,
}

impl TrustCertificate {
    /// A trust key provisioned out of band, valid on `[not_before, not_after]`.
    pub fn new(
        public_key: PublicKey,
        not_before: DateTime<Utc>,
        not_after: DateTime<Utc>,
    ) -> Result<Self, Error> {
        check_key_strength(&public_key)?;
        if not_after < not_before {
            return Err(Error::Certificate("validity period ends before it begins".into()));
        }
        Ok(Self { public_key, not_before, not_after, der: None })
    }

    /// Load from DER bytes.
    pub fn from_der(der_bytes: &[u8]) -> Result<Self, Error> {
        let cert = loader::parse_certificate(der_bytes)?;
        let public_key = loader::public_key_of(&cert)?;
        let validity = &cert.tbs_certificate.validity;
        let mut trust = Self::new(
            public_key,
            to_chrono(&validity.not_before)?,
            to_chrono(&validity.not_after)?,
        )?;
        trust.der = Some(der_bytes.to_vec());
        Ok(trust)
    }

    /// Load from a PEM `CERTIFICATE` block.
    pub fn from_pem(pem_data: &[u8]) -> Result<Self, Error> {
        Self::from_der(&loader::pem_to_der(pem_data)?)
    }

    /// Load from the bare base64 certificate body IdP settings usually carry.
    pub fn from_base64(text: &str) -> Result<Self, Error> {
        Self::from_der(&loader::base64_to_der(text)?)
    }

    /// Load from PEM, base64 or DER, whichever `data` looks like.
    pub fn load(data: &[u8]) -> Result<Self, Error> {
        match loader::detect_format(data) {
            CertFormat::Pem => Self::from_pem(data),
            CertFormat::Base64 => {
                let text = std::str::from_utf8(data)
                    .map_err(|e| Error::Certificate(format!("invalid certificate text: {e}")))?;
                Self::from_base64(text)
            }
            CertFormat::Der => Self::from_der(data),
        }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn not_before(&self) -> DateTime<Utc> {
        self.not_before
    }

    pub fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    /// DER encoding, when the key was loaded from a certificate.
    pub fn der(&self) -> Option<&[u8]> {
        self.der.as_deref()
    }

    /// Is `der_bytes` this very certificate?
    pub fn matches_der(&self, der_bytes: &[u8]) -> bool {
        self.der.as_deref() == Some(der_bytes)
    }

    /// Check the validity period against `now`.
    pub fn check_validity(&self, now: DateTime<Utc>) -> Result<(), RejectReason> {
        if now < self.not_before {
            return Err(RejectReason::CertificateExpired {
                boundary: Boundary::NotBefore,
                at: self.not_before,
            });
        }
        if now > self.not_after {
            return Err(RejectReason::CertificateExpired {
                boundary: Boundary::NotAfter,
                at: self.not_after,
            });
        }
        Ok(())
    }
}

fn check_key_strength(key: &PublicKey) -> Result<(), Error> {
    if let PublicKey::Rsa(pk) = key {
        use rsa::traits::PublicKeyParts;
        let bits = pk.n().bits();
        if bits < MIN_RSA_BITS {
            return Err(Error::Key(format!(
                "RSA key of {bits} bits is below the {MIN_RSA_BITS}-bit minimum"
            )));
        }
    }
    Ok(())
}

fn to_chrono(t: &x509_cert::time::Time) -> Result<DateTime<Utc>, Error> {
    let secs = i64::try_from(t.to_unix_duration().as_secs())
        .map_err(|_| Error::Certificate("certificate time out of range".into()))?;
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| Error::Certificate("certificate time out of range".into()))
}
