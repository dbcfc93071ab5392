#![forbid(unsafe_code)]

//! Algorithm URI constants.
//!
//! Only the identifiers the verifier recognizes are listed. Weak algorithms
//! (SHA-1, RSA-SHA1, inclusive C14N) are named so that callers can report them
//! precisely, but [`is_allowed_digest`] and friends reject them.

// ── Canonicalization ─────────────────────────────────────────────────

pub const C14N: &str = "http://www.w3.org/TR/2001/REC-xml-c14n-20010315";
pub const C14N_WITH_COMMENTS: &str =
    "http://www.w3.org/TR/2001/REC-xml-c14n-20010315#WithComments";
pub const EXC_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";
pub const EXC_C14N_WITH_COMMENTS: &str = "http://www.w3.org/2001/10/xml-exc-c14n#WithComments";

// ── Digests ──────────────────────────────────────────────────────────

pub const SHA1: &str = "http://www.w3.org/2000/09/xmldsig#sha1";
pub const SHA256: &str = "http://www.w3.org/2001/04/xmlenc#sha256";
pub const SHA384: &str = "http://www.w3.org/2001/04/xmldsig-more#sha384";
pub const SHA512: &str = "http://www.w3.org/2001/04/xmlenc#sha512";

// ── RSA signature algorithms ─────────────────────────────────────────

pub const RSA_SHA1: &str = "http://www.w3.org/2000/09/xmldsig#rsa-sha1";
pub const RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";
pub const RSA_SHA384: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha384";
pub const RSA_SHA512: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha512";

// ── ECDSA signature algorithms ───────────────────────────────────────

pub const ECDSA_SHA1: &str = "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha1";
pub const ECDSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha256";
pub const ECDSA_SHA384: &str = "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha384";
pub const ECDSA_SHA512: &str = "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha512";

// ── Transforms ───────────────────────────────────────────────────────

pub const ENVELOPED_SIGNATURE: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";

/// Canonicalization methods accepted for SignedInfo and as Reference transforms.
pub fn is_allowed_c14n(uri: &str) -> bool {
    matches!(uri, EXC_C14N | EXC_C14N_WITH_COMMENTS)
}

pub fn is_allowed_digest(uri: &str) -> bool {
    matches!(uri, SHA256 | SHA384 | SHA512)
}

pub fn is_allowed_signature(uri: &str) -> bool {
    matches!(
        uri,
        RSA_SHA256 | RSA_SHA384 | RSA_SHA512 | ECDSA_SHA256 | ECDSA_SHA384 | ECDSA_SHA512
    )
}

/// Reference transforms: the enveloped-signature transform plus exclusive C14N.
pub fn is_allowed_transform(uri: &str) -> bool {
    uri == ENVELOPED_SIGNATURE || is_allowed_c14n(uri)
}
