#![forbid(unsafe_code)]

//! XML namespace constants and SAML/XML-DSig vocabulary.

/// XML Digital Signature namespace
pub const DSIG: &str = "http://www.w3.org/2000/09/xmldsig#";

/// Exclusive C14N namespace
pub const EXC_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";

/// XML namespace
pub const XML: &str = "http://www.w3.org/XML/1998/namespace";

/// SAML 2.0 assertion namespace
pub const SAML: &str = "urn:oasis:names:tc:SAML:2.0:assertion";

/// SAML 2.0 protocol namespace
pub const SAMLP: &str = "urn:oasis:names:tc:SAML:2.0:protocol";

/// Top-level status code of a successful response.
pub const STATUS_SUCCESS: &str = "urn:oasis:names:tc:SAML:2.0:status:Success";

/// Bearer subject confirmation method.
pub const CM_BEARER: &str = "urn:oasis:names:tc:SAML:2.0:cm:bearer";

/// SAML protocol version accepted on Response and Assertion.
pub const SAML_VERSION: &str = "2.0";

// ── Element names ────────────────────────────────────────────────────

pub mod node {
    // DSig elements
    pub const SIGNATURE: &str = "Signature";
    pub const SIGNED_INFO: &str = "SignedInfo";
    pub const CANONICALIZATION_METHOD: &str = "CanonicalizationMethod";
    pub const SIGNATURE_METHOD: &str = "SignatureMethod";
    pub const SIGNATURE_VALUE: &str = "SignatureValue";
    pub const REFERENCE: &str = "Reference";
    pub const TRANSFORMS: &str = "Transforms";
    pub const TRANSFORM: &str = "Transform";
    pub const DIGEST_METHOD: &str = "DigestMethod";
    pub const DIGEST_VALUE: &str = "DigestValue";
    pub const KEY_INFO: &str = "KeyInfo";
    pub const X509_DATA: &str = "X509Data";
    pub const X509_CERTIFICATE: &str = "X509Certificate";

    // Exclusive C14N
    pub const INCLUSIVE_NAMESPACES: &str = "InclusiveNamespaces";

    // SAML protocol elements
    pub const RESPONSE: &str = "Response";
    pub const STATUS: &str = "Status";
    pub const STATUS_CODE: &str = "StatusCode";
    pub const STATUS_MESSAGE: &str = "StatusMessage";

    // SAML assertion elements
    pub const ASSERTION: &str = "Assertion";
    pub const ISSUER: &str = "Issuer";
    pub const SUBJECT: &str = "Subject";
    pub const NAME_ID: &str = "NameID";
    pub const SUBJECT_CONFIRMATION: &str = "SubjectConfirmation";
    pub const SUBJECT_CONFIRMATION_DATA: &str = "SubjectConfirmationData";
    pub const CONDITIONS: &str = "Conditions";
    pub const AUDIENCE_RESTRICTION: &str = "AudienceRestriction";
    pub const AUDIENCE: &str = "Audience";
    pub const ATTRIBUTE_STATEMENT: &str = "AttributeStatement";
    pub const ATTRIBUTE: &str = "Attribute";
    pub const ATTRIBUTE_VALUE: &str = "AttributeValue";
}

// ── Attribute names ──────────────────────────────────────────────────

pub mod attr {
    pub const ALGORITHM: &str = "Algorithm";
    pub const URI: &str = "URI";
    pub const PREFIX_LIST: &str = "PrefixList";

    pub const ID: &str = "ID";
    pub const VERSION: &str = "Version";
    pub const ISSUE_INSTANT: &str = "IssueInstant";
    pub const DESTINATION: &str = "Destination";
    pub const VALUE: &str = "Value";
    pub const METHOD: &str = "Method";
    pub const RECIPIENT: &str = "Recipient";
    pub const IN_RESPONSE_TO: &str = "InResponseTo";
    pub const NOT_BEFORE: &str = "NotBefore";
    pub const NOT_ON_OR_AFTER: &str = "NotOnOrAfter";
    pub const NAME: &str = "Name";
    pub const FORMAT: &str = "Format";

    /// Attribute names treated as ID-typed when resolving same-document references.
    pub const ID_ATTRS: [&str; 3] = ["ID", "Id", "id"];
}
