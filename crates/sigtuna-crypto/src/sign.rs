#![forbid(unsafe_code)]

//! Signature verification (RSA PKCS#1 v1.5 and ECDSA over P-256/P-384).

use sigtuna_core::{algorithm, Error};
use std::fmt;

/// Public key material a signature can be checked against.
#[derive(Clone)]
pub enum PublicKey {
    Rsa(rsa::RsaPublicKey),
    EcP256(p256::ecdsa::VerifyingKey),
    EcP384(p384::ecdsa::VerifyingKey),
}

impl PublicKey {
    /// Short name of the key family, for diagnostics.
    pub fn family(&self) -> &'static str {
        match self {
            PublicKey::Rsa(_) => "RSA",
            PublicKey::EcP256(_) => "EC P-256",
            PublicKey::EcP384(_) => "EC P-384",
        }
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublicKey::Rsa(pk) => {
                use rsa::traits::PublicKeyParts;
                write!(f, "PublicKey::Rsa({} bits)", pk.size() * 8)
            }
            PublicKey::EcP256(_) => f.write_str("PublicKey::EcP256"),
            PublicKey::EcP384(_) => f.write_str("PublicKey::EcP384"),
        }
    }
}

/// Trait for signature algorithms.
pub trait SignatureAlgorithm: Send + Sync {
    fn uri(&self) -> &'static str;

    /// Check `signature` over `data`.
    ///
    /// `Ok(false)` means the signature does not verify; `Err` means the key
    /// or the encoded signature is unusable with this algorithm.
    fn verify(&self, key: &PublicKey, data: &[u8], signature: &[u8]) -> Result<bool, Error>;
}

/// Create a signature algorithm from its URI.
pub fn from_uri(uri: &str) -> Result<Box<dyn SignatureAlgorithm>, Error> {
    match uri {
        algorithm::RSA_SHA256 => Ok(Box::new(RsaPkcs1v15 { uri: algorithm::RSA_SHA256, hash: HashType::Sha256 })),
        algorithm::RSA_SHA384 => Ok(Box::new(RsaPkcs1v15 { uri: algorithm::RSA_SHA384, hash: HashType::Sha384 })),
        algorithm::RSA_SHA512 => Ok(Box::new(RsaPkcs1v15 { uri: algorithm::RSA_SHA512, hash: HashType::Sha512 })),

        algorithm::ECDSA_SHA256 => Ok(Box::new(Ecdsa { uri: algorithm::ECDSA_SHA256, hash: HashType::Sha256 })),
        algorithm::ECDSA_SHA384 => Ok(Box::new(Ecdsa { uri: algorithm::ECDSA_SHA384, hash: HashType::Sha384 })),
        algorithm::ECDSA_SHA512 => Ok(Box::new(Ecdsa { uri: algorithm::ECDSA_SHA512, hash: HashType::Sha512 })),

        _ => Err(Error::UnsupportedAlgorithm(format!("signature algorithm: {uri}"))),
    }
}

#[derive(Debug, Clone, Copy)]
enum HashType { Sha256, Sha384, Sha512 }

impl HashType {
    fn prehash(self, data: &[u8]) -> Vec<u8> {
        use sha2::Digest;
        match self {
            HashType::Sha256 => sha2::Sha256::digest(data).to_vec(),
            HashType::Sha384 => sha2::Sha384::digest(data).to_vec(),
            HashType::Sha512 => sha2::Sha512::digest(data).to_vec(),
        }
    }
}

// ── RSA PKCS#1 v1.5 ─────────────────────────────────────────────────

struct RsaPkcs1v15 { uri: &'static str, hash: HashType }

impl SignatureAlgorithm for RsaPkcs1v15 {
    fn uri(&self) -> &'static str { self.uri }

    fn verify(&self, key: &PublicKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool, Error> {
        use signature::Verifier;
        let PublicKey::Rsa(public_key) = key else {
            return Err(Error::Key(format!("{} requires an RSA key, got {}", self.uri, key.family())));
        };
        let sig = rsa::pkcs1v15::Signature::try_from(sig_bytes)
            .map_err(|e| Error::Crypto(format!("invalid RSA signature: {e}")))?;
        macro_rules! do_verify {
            ($hasher:ty) => {{
                let vk = rsa::pkcs1v15::VerifyingKey::<$hasher>::new(public_key.clone());
                Ok(vk.verify(data, &sig).is_ok())
            }};
        }
        match self.hash {
            HashType::Sha256 => do_verify!(sha2::Sha256),
            HashType::Sha384 => do_verify!(sha2::Sha384),
            HashType::Sha512 => do_verify!(sha2::Sha512),
        }
    }
}

// ── ECDSA ────────────────────────────────────────────────────────────

/// ECDSA with the curve taken from the key and the hash from the URI.
struct Ecdsa { uri: &'static str, hash: HashType }

/// Convert XML-DSig ECDSA r||s to a typed Signature for P-256.
pub fn xmldsig_to_p256(rs: &[u8]) -> Result<p256::ecdsa::Signature, Error> {
    if rs.len() != 64 {
        return Err(Error::Crypto(format!("P-256 signature must be 64 bytes, got {}", rs.len())));
    }
    p256::ecdsa::Signature::from_slice(rs)
        .map_err(|e| Error::Crypto(format!("invalid P-256 signature: {e}")))
}

/// Convert XML-DSig ECDSA r||s to a typed Signature for P-384.
pub fn xmldsig_to_p384(rs: &[u8]) -> Result<p384::ecdsa::Signature, Error> {
    if rs.len() != 96 {
        return Err(Error::Crypto(format!("P-384 signature must be 96 bytes, got {}", rs.len())));
    }
    p384::ecdsa::Signature::from_slice(rs)
        .map_err(|e| Error::Crypto(format!("invalid P-384 signature: {e}")))
}

impl SignatureAlgorithm for Ecdsa {
    fn uri(&self) -> &'static str { self.uri }

    fn verify(&self, key: &PublicKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool, Error> {
        use signature::hazmat::PrehashVerifier;
        let prehash = self.hash.prehash(data);
        match key {
            PublicKey::EcP256(vk) => {
                let sig = xmldsig_to_p256(sig_bytes)?;
                Ok(vk.verify_prehash(&prehash, &sig).is_ok())
            }
            PublicKey::EcP384(vk) => {
                let sig = xmldsig_to_p384(sig_bytes)?;
                Ok(vk.verify_prehash(&prehash, &sig).is_ok())
            }
            PublicKey::Rsa(_) => Err(Error::Key(format!("{} requires an EC key, got RSA", self.uri))),
        }
    }
}
