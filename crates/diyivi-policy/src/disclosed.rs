use diyivi_core::{unix_seconds, Timestamp, TranslatedString};
use serde::{Deserialize, Deserializer, Serialize};

use crate::attribute::Attribute;

/// Per-attribute proof status reported by the attestation server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttributeStatus {
    /// Disclosed because the request asked for it.
    Present,
    /// Disclosed without being asked for.
    Extra,
    /// The credential has no value for this attribute.
    Null,
}

/// One attribute as proven by the attestation server.
///
/// Field names follow the server's session result format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisclosedAttribute {
    pub id: Attribute,
    pub status: AttributeStatus,
    #[serde(default)]
    pub rawvalue: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub value: TranslatedString,
    #[serde(with = "unix_seconds")]
    pub issuancetime: Timestamp,
}

impl DisclosedAttribute {
    /// A PRESENT attribute with the same raw value in every language.
    pub fn present(id: Attribute, rawvalue: impl Into<String>, issuancetime: Timestamp) -> Self {
        let rawvalue = rawvalue.into();
        Self {
            id,
            status: AttributeStatus::Present,
            value: TranslatedString::new()
                .with("", rawvalue.clone())
                .with("en", rawvalue.clone())
                .with("nl", rawvalue.clone()),
            rawvalue: Some(rawvalue),
            issuancetime,
        }
    }

    /// A NULL attribute: requested, but absent in the disclosed credential.
    pub fn null(id: Attribute, issuancetime: Timestamp) -> Self {
        Self {
            id,
            status: AttributeStatus::Null,
            rawvalue: None,
            value: TranslatedString::new(),
            issuancetime,
        }
    }
}

/// Disclosed attributes grouped per policy disjunction, in policy order.
pub type DisclosedValues = Vec<Vec<DisclosedAttribute>>;

fn null_as_empty<'de, D>(deserializer: D) -> Result<TranslatedString, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<TranslatedString>::deserialize(deserializer)?.unwrap_or_default())
}
