#![forbid(unsafe_code)]

//! Service provider configuration.

use chrono::Duration;
use serde::Deserialize;
use sigtuna_core::Error;

/// What a Response must be addressed to.
///
/// Deserializable so hosts can embed it in their own configuration files:
///
/// ```toml
/// destination = "https://sp.example.com/acs"
/// audience = "https://sp.example.com/metadata"
/// clock_skew_secs = 30
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpConfig {
    /// Assertion consumer service URL. Compared exactly with the Response
    /// `Destination`.
    pub destination: String,

    /// Expected `Audience`. Defaults to the destination.
    #[serde(default)]
    pub audience: Option<String>,

    /// Expected bearer `Recipient`. Defaults to the destination.
    #[serde(default)]
    pub recipient: Option<String>,

    /// When set, a bearer confirmation only qualifies if its `InResponseTo`
    /// equals this AuthnRequest ID.
    #[serde(default)]
    pub in_response_to: Option<String>,

    /// Symmetric tolerance applied to every validity window.
    #[serde(default)]
    pub clock_skew_secs: u32,
}

impl SpConfig {
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            audience: None,
            recipient: None,
            in_response_to: None,
            clock_skew_secs: 0,
        }
    }

    #[must_use]
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    #[must_use]
    pub fn with_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = Some(recipient.into());
        self
    }

    #[must_use]
    pub fn with_in_response_to(mut self, request_id: impl Into<String>) -> Self {
        self.in_response_to = Some(request_id.into());
        self
    }

    #[must_use]
    pub fn with_clock_skew(mut self, secs: u32) -> Self {
        self.clock_skew_secs = secs;
        self
    }

    pub fn audience(&self) -> &str {
        self.audience.as_deref().unwrap_or(&self.destination)
    }

    pub fn recipient(&self) -> &str {
        self.recipient.as_deref().unwrap_or(&self.destination)
    }

    pub fn clock_skew(&self) -> Duration {
        Duration::seconds(i64::from(self.clock_skew_secs))
    }

    /// Reject configurations no Response could ever satisfy.
    pub fn validate(&self) -> Result<(), Error> {
        if self.destination.trim().is_empty() {
            return Err(Error::Other("SP destination must not be empty".into()));
        }
        if self.audience.as_deref().is_some_and(|a| a.trim().is_empty()) {
            return Err(Error::Other("SP audience must not be empty".into()));
        }
        if self.recipient.as_deref().is_some_and(|r| r.trim().is_empty()) {
            return Err(Error::Other("SP recipient must not be empty".into()));
        }
        Ok(())
    }
}
