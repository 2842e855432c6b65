use diyivi_core::ExchangeId;
use diyivi_notify::EmailSettings;
use diyivi_policy::Attribute;
use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, ProtocolResult};

/// Default email attribute initiators disclose to receive mail.
pub const DEFAULT_EMAIL_ATTRIBUTE: &str = "pbdf.sidn-pbdf.email.email";

/// Lifetimes of stored records, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TtlSettings {
    /// Exchanges and signature requests that have not been started.
    pub before_start: u64,
    /// Started exchanges and their replies.
    pub exchange: u64,
    /// Started signature requests.
    pub signature_request: u64,
}

impl Default for TtlSettings {
    fn default() -> Self {
        Self {
            before_start: 60 * 60,
            exchange: 48 * 60 * 60,
            signature_request: 48 * 60 * 60,
        }
    }
}

/// Deployment settings shared by both engines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolSettings {
    /// Public URL of this service, with a trailing slash.
    pub base_url: String,
    pub email_attribute: Attribute,
    pub ttl: TtlSettings,
    pub email: EmailSettings,
}

impl ProtocolSettings {
    pub fn new(base_url: impl Into<String>, email_attribute: Attribute, email: EmailSettings) -> Self {
        Self {
            base_url: base_url.into(),
            email_attribute,
            ttl: TtlSettings::default(),
            email,
        }
    }

    pub fn with_ttl(mut self, ttl: TtlSettings) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn validate(&self) -> ProtocolResult<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ProtocolError::InvalidRequest(
                "base_url must be an http(s) URL".into(),
            ));
        }
        if !self.base_url.ends_with('/') {
            return Err(ProtocolError::InvalidRequest(
                "base_url must end with '/'".into(),
            ));
        }
        if self.ttl.before_start == 0 || self.ttl.exchange == 0 || self.ttl.signature_request == 0 {
            return Err(ProtocolError::InvalidRequest("ttl values must be positive".into()));
        }
        self.email
            .validate()
            .map_err(|msg| ProtocolError::InvalidRequest(msg.to_string()))
    }

    /// Where the Yivi app sends the user after a session about `id`.
    pub fn exchange_url(&self, id: &ExchangeId) -> String {
        format!("{}exchanges/{}/", self.base_url, id)
    }
}
