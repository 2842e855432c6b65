use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{PolicyError, PolicyResult};

const SEGMENTS: usize = 4;

fn is_segment_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// A fully qualified attribute id: `scheme.issuer.credential.attribute`.
///
/// Exactly four non-empty dot-separated segments of `[A-Za-z0-9_-]`.
/// Once constructed the id is known to be well formed, so credential
/// extraction is a plain prefix split.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Attribute(String);

impl Attribute {
    pub fn parse(value: impl Into<String>) -> PolicyResult<Self> {
        let value = value.into();
        let segments: Vec<&str> = value.split('.').collect();
        let well_formed = segments.len() == SEGMENTS
            && segments
                .iter()
                .all(|s| !s.is_empty() && s.chars().all(is_segment_char));
        if !well_formed {
            return Err(PolicyError::InvalidAttribute(value));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The first three segments, shared by all attributes of one credential.
    pub fn credential(&self) -> Credential {
        match self.0.rfind('.') {
            Some(idx) => Credential(self.0[..idx].to_string()),
            None => Credential(self.0.clone()),
        }
    }

    /// The last segment.
    pub fn name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Attribute {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Attribute {
    type Error = PolicyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Attribute> for String {
    fn from(attribute: Attribute) -> Self {
        attribute.0
    }
}

/// `scheme.issuer.credential`: the bundle an attribute is disclosed from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_attributes() {
        for id in [
            "irma-demo.gemeente.personalData.firstnames",
            "pbdf.sidn-pbdf.mobilenumber.mobilenumber",
            "pbdf.pbdf.email.email",
            "a_b.c-d.E1.f2",
        ] {
            assert!(Attribute::parse(id).is_ok(), "{id} should be valid");
        }
    }

    #[test]
    fn test_parse_rejects_malformed_attributes() {
        for id in [
            "",
            "pbdf.pbdf.email",
            "pbdf.pbdf.email.email.extra",
            "pbdf..email.email",
            "pbdf.pbdf.email.e mail",
            "pbdf.pbdf.email.email.",
            "pbdf.pbdf.em@il.email",
        ] {
            assert!(
                matches!(Attribute::parse(id), Err(PolicyError::InvalidAttribute(_))),
                "{id:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_credential_and_name() {
        let attr = Attribute::parse("pbdf.sidn-pbdf.mobilenumber.mobilenumber").unwrap();
        assert_eq!(attr.credential().as_str(), "pbdf.sidn-pbdf.mobilenumber");
        assert_eq!(attr.name(), "mobilenumber");
    }

    #[test]
    fn test_serde_validates() {
        let attr: Attribute = serde_json::from_str("\"pbdf.pbdf.email.email\"").unwrap();
        assert_eq!(attr.as_str(), "pbdf.pbdf.email.email");
        assert_eq!(
            serde_json::to_string(&attr).unwrap(),
            "\"pbdf.pbdf.email.email\""
        );
        assert!(serde_json::from_str::<Attribute>("\"pbdf.email\"").is_err());
    }

    #[test]
    fn test_from_str() {
        let attr: Attribute = "irma-demo.gemeente.address.city".parse().unwrap();
        assert_eq!(attr.to_string(), "irma-demo.gemeente.address.city");
    }
}
