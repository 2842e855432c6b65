use serde::{Deserialize, Serialize};

use crate::error::{NotifyError, NotifyResult};

/// A plain-text email ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Deployment details that appear in outgoing mail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailSettings {
    /// Mail goes out as `noreply@<from_domain>`.
    pub from_domain: String,
    /// Origin of the web client, used for links in the body.
    pub client_origin: String,
}

impl EmailSettings {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.from_domain.is_empty() || self.from_domain.contains('@') {
            return Err("from_domain must be a bare domain");
        }
        if !(self.client_origin.starts_with("http://") || self.client_origin.starts_with("https://")) {
            return Err("client_origin must be an http(s) origin");
        }
        Ok(())
    }

    pub fn sender(&self) -> String {
        format!("noreply@{}", self.from_domain)
    }
}

/// Shallow shape check: one `@` with text on both sides, no whitespace.
pub fn check_recipient(address: &str) -> NotifyResult<()> {
    let mut parts = address.split('@');
    let well_formed = matches!(
        (parts.next(), parts.next(), parts.next()),
        (Some(local), Some(domain), None) if !local.is_empty() && !domain.is_empty()
    ) && !address.chars().any(char::is_whitespace);
    if well_formed {
        Ok(())
    } else {
        Err(NotifyError::InvalidRecipient)
    }
}
