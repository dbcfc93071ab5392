#![forbid(unsafe_code)]

//! Digest (hash) algorithm implementations.

use digest::Digest;
use sigtuna_core::{algorithm, Error};

/// Trait for digest algorithms.
pub trait DigestAlgorithm: Send {
    /// Feed data into the hash.
    fn update(&mut self, data: &[u8]);
    /// Finalize and return the hash value.
    fn finalize(self: Box<Self>) -> Vec<u8>;
    /// Algorithm URI.
    fn uri(&self) -> &'static str;
}

/// Create a digest algorithm from its URI.
pub fn from_uri(uri: &str) -> Result<Box<dyn DigestAlgorithm>, Error> {
    match uri {
        algorithm::SHA256 => Ok(Box::new(Sha256Digest::new())),
        algorithm::SHA384 => Ok(Box::new(Sha384Digest::new())),
        algorithm::SHA512 => Ok(Box::new(Sha512Digest::new())),
        _ => Err(Error::UnsupportedAlgorithm(format!("digest algorithm: {uri}"))),
    }
}

/// Compute a digest in one shot.
pub fn digest(uri: &str, data: &[u8]) -> Result<Vec<u8>, Error> {
    let mut hasher = from_uri(uri)?;
    hasher.update(data);
    Ok(hasher.finalize())
}

/// Compare two digests without short-circuiting on the first differing byte.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    a.ct_eq(b).into()
}

// ── Concrete implementations ─────────────────────────────────────────

macro_rules! impl_digest {
    ($name:ident, $hasher:ty, $uri:expr) => {
        struct $name {
            inner: $hasher,
        }

        impl $name {
            fn new() -> Self {
                Self {
                    inner: <$hasher>::new(),
                }
            }
        }

        impl DigestAlgorithm for $name {
            fn update(&mut self, data: &[u8]) {
                Digest::update(&mut self.inner, data);
            }

            fn finalize(self: Box<Self>) -> Vec<u8> {
                Digest::finalize(self.inner).to_vec()
            }

            fn uri(&self) -> &'static str {
                $uri
            }
        }
    };
}

impl_digest!(Sha256Digest, sha2::Sha256, algorithm::SHA256);
impl_digest!(Sha384Digest, sha2::Sha384, algorithm::SHA384);
impl_digest!(Sha512Digest, sha2::Sha512, algorithm::SHA512);
