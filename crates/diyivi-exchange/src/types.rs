use diyivi_core::{
    unix_seconds, CapabilitySecret, ExchangeId, ReplyId, SignatureRequestId, Timestamp,
};
use diyivi_policy::{build_policy, Attribute, DisclosedValues, Policy};
use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, ProtocolResult};

/// Longest message a signature request may carry, in characters.
pub const MAX_MESSAGE_CHARS: usize = 64_000;

// ---------------------------------------------------------------------------
// Exchange records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExchangeType {
    /// Exactly one recipient may reply.
    #[default]
    OneToOne,
}

/// An exchange as persisted.
///
/// `started` holds once both value fields are set by a successful `start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub id: ExchangeId,
    pub initiator_secret: CapabilitySecret,
    #[serde(rename = "type")]
    pub exchange_type: ExchangeType,
    /// What the recipient must disclose; the initiator discloses it too.
    pub policy: Policy,
    /// What the intended recipient already knows about the initiator.
    pub public_initiator_policy: Policy,
    pub send_email: bool,
    #[serde(default)]
    pub initiator_email: Option<String>,
    #[serde(default)]
    pub initiator_values: Option<DisclosedValues>,
    #[serde(default)]
    pub public_initiator_values: Option<DisclosedValues>,
    #[serde(with = "unix_seconds")]
    pub expire_at: Timestamp,
}

impl Exchange {
    pub fn started(&self) -> bool {
        self.initiator_values.is_some() && self.public_initiator_values.is_some()
    }

    /// Policy the initiator discloses on start: the public disjunctions,
    /// then `policy`, then the email attribute when mail is requested.
    pub fn initiator_policy(&self, email_attribute: &Attribute) -> Policy {
        let email = self
            .send_email
            .then(|| Policy::single(email_attribute.clone()));
        Policy::concat(
            [Some(&self.public_initiator_policy), Some(&self.policy), email.as_ref()]
                .into_iter()
                .flatten(),
        )
    }
}

/// A recipient's answer to an exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeReply {
    pub id: ReplyId,
    pub exchange_id: ExchangeId,
    pub recipient_secret: CapabilitySecret,
    pub attribute_values: DisclosedValues,
}

// ---------------------------------------------------------------------------
// Exchange operation inputs and outputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateExchange {
    pub policy: Policy,
    #[serde(default)]
    pub public_initiator_policy: Policy,
    #[serde(rename = "type", default)]
    pub exchange_type: ExchangeType,
    #[serde(default)]
    pub send_email: bool,
}

impl CreateExchange {
    pub fn new(policy: Policy, public_initiator_policy: Policy) -> Self {
        Self {
            policy,
            public_initiator_policy,
            exchange_type: ExchangeType::OneToOne,
            send_email: false,
        }
    }

    /// Build both policies from flat attribute lists, grouped per credential.
    pub fn from_attributes(attributes: &[Attribute], public_attributes: &[Attribute]) -> Self {
        Self::new(build_policy(attributes), build_policy(public_attributes))
    }

    pub fn with_email(mut self, send_email: bool) -> Self {
        self.send_email = send_email;
        self
    }

    pub fn validate(&self) -> ProtocolResult<()> {
        if self.policy.is_empty() {
            return Err(ProtocolError::InvalidRequest(
                "policy must contain at least one disjunction".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedExchange {
    pub id: ExchangeId,
    pub initiator_secret: CapabilitySecret,
    /// Policy the initiator must disclose to start the exchange.
    pub disclose: Policy,
    pub request_jwt: String,
}

/// What a prospective recipient sees before answering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeInfo {
    pub policy: Policy,
    pub public_initiator_values: DisclosedValues,
    pub request_jwt: String,
}

/// Returned to the recipient after a successful reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeResponse {
    pub recipient_secret: CapabilitySecret,
    pub reply_values: DisclosedValues,
    pub initiator_values: DisclosedValues,
    pub public_initiator_values: DisclosedValues,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeResult {
    pub initiator_values: DisclosedValues,
    pub public_initiator_values: DisclosedValues,
    /// Visible replies in the order they were received.
    pub replies: Vec<DisclosedValues>,
}

// ---------------------------------------------------------------------------
// Signature requests
// ---------------------------------------------------------------------------

/// A request for someone to sign a message, as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRequest {
    pub id: SignatureRequestId,
    pub message: String,
    /// Attributes the signer must attach to the signature.
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub initiator_email: Option<String>,
    #[serde(with = "unix_seconds")]
    pub expire_at: Timestamp,
}

impl SignatureRequest {
    pub fn started(&self) -> bool {
        self.initiator_email.is_some()
    }

    pub fn policy(&self) -> Policy {
        build_policy(&self.attributes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSignatureRequest {
    pub message: String,
    pub attributes: Vec<Attribute>,
}

impl CreateSignatureRequest {
    pub fn validate(&self) -> ProtocolResult<()> {
        let chars = self.message.chars().count();
        if chars == 0 || chars > MAX_MESSAGE_CHARS {
            return Err(ProtocolError::InvalidRequest(format!(
                "message must be 1 to {} characters",
                MAX_MESSAGE_CHARS
            )));
        }
        if self.attributes.is_empty() {
            return Err(ProtocolError::InvalidRequest(
                "at least one attribute is required".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedSignatureRequest {
    pub id: SignatureRequestId,
    /// Disclosure request for the initiator's email address.
    pub request_jwt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureRequestInfo {
    pub message: String,
    pub attributes: Vec<Attribute>,
    pub policy: Policy,
    pub initiator_email: String,
    /// Signing session request for `message` over `policy`.
    pub request_jwt: String,
}
