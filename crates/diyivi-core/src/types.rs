use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use zeroize::Zeroize;

use crate::crypto::{constant_time_eq, is_lower_hex, random_hex};

/// Random bytes behind an entity id (16 hex chars).
pub const ID_BYTES: usize = 8;

/// Random bytes behind a capability secret (32 hex chars).
pub const SECRET_BYTES: usize = 16;

// ---------------------------------------------------------------------------
// Timestamp: canonical time representation (seconds + nanoseconds)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds_since_epoch: u64,
    pub nanoseconds: u32,
}

impl Timestamp {
    pub fn now() -> Self {
        let now = chrono::Utc::now();
        Self {
            seconds_since_epoch: now.timestamp() as u64,
            nanoseconds: now.timestamp_subsec_nanos(),
        }
    }

    pub fn from_seconds(seconds: u64) -> Self {
        Self {
            seconds_since_epoch: seconds,
            nanoseconds: 0,
        }
    }

    /// `now() + seconds`, used to arm store expiry.
    pub fn in_seconds(seconds: u64) -> Self {
        Self::now().plus_seconds(seconds)
    }

    pub fn plus_seconds(&self, seconds: u64) -> Self {
        Self {
            seconds_since_epoch: self.seconds_since_epoch.saturating_add(seconds),
            nanoseconds: self.nanoseconds,
        }
    }

    pub fn to_rfc3339(&self) -> String {
        let dt =
            chrono::DateTime::from_timestamp(self.seconds_since_epoch as i64, self.nanoseconds);
        dt.map(|d| d.to_rfc3339())
            .unwrap_or_else(|| "invalid".to_string())
    }

    pub fn is_expired(&self) -> bool {
        *self < Self::now()
    }
}

impl From<chrono::DateTime<chrono::Utc>> for Timestamp {
    fn from(dt: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            seconds_since_epoch: dt.timestamp() as u64,
            nanoseconds: dt.timestamp_subsec_nanos(),
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_rfc3339())
    }
}

// ---------------------------------------------------------------------------
// Typed identifiers: prevent stringly-typed confusion
// ---------------------------------------------------------------------------

macro_rules! define_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

/// Adds random generation and shape checking to an entity id type.
macro_rules! random_entity_id {
    ($name:ident) => {
        impl $name {
            /// Draw a fresh id from the OS CSPRNG.
            pub fn generate() -> Self {
                Self(random_hex(ID_BYTES))
            }

            pub fn is_well_formed(&self) -> bool {
                is_lower_hex(&self.0, ID_BYTES * 2)
            }
        }
    };
}

define_id!(ExchangeId, "Public lookup id of an exchange.");
define_id!(ReplyId, "Id of a single reply to an exchange.");
define_id!(SignatureRequestId, "Public lookup id of a signature request.");
define_id!(StoreKey, "Key of an entry in a `TtlStore`.");

random_entity_id!(ExchangeId);
random_entity_id!(ReplyId);
random_entity_id!(SignatureRequestId);

// ---------------------------------------------------------------------------
// CapabilitySecret: bearer token authorizing a role on an exchange
// ---------------------------------------------------------------------------

/// A 128-bit bearer capability, rendered as 32 lowercase hex characters.
///
/// Possession is the only proof of the initiator or recipient role.
/// Comparison, `==` included, is constant-time and `Debug` never prints
/// the value.
#[derive(Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilitySecret(String);

impl CapabilitySecret {
    pub fn generate() -> Self {
        Self(random_hex(SECRET_BYTES))
    }

    pub fn from_string(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Constant-time check of a caller-supplied secret.
    pub fn matches(&self, supplied: &str) -> bool {
        constant_time_eq(self.0.as_bytes(), supplied.as_bytes())
    }

    pub fn is_well_formed(&self) -> bool {
        is_lower_hex(&self.0, SECRET_BYTES * 2)
    }
}

impl PartialEq for CapabilitySecret {
    fn eq(&self, other: &Self) -> bool {
        constant_time_eq(self.0.as_bytes(), other.0.as_bytes())
    }
}

impl Eq for CapabilitySecret {}

impl fmt::Debug for CapabilitySecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CapabilitySecret([REDACTED])")
    }
}

impl Drop for CapabilitySecret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

// ---------------------------------------------------------------------------
// TranslatedString: language code to display text
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TranslatedString(pub BTreeMap<String, String>);

impl TranslatedString {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, lang: impl Into<String>, text: impl Into<String>) -> Self {
        self.0.insert(lang.into(), text.into());
        self
    }

    pub fn get(&self, lang: &str) -> Option<&str> {
        self.0.get(lang).map(String::as_str)
    }

    /// Preferred language first, then English, then whatever is present.
    pub fn best(&self, preferred: &str) -> Option<&str> {
        self.get(preferred)
            .or_else(|| self.get("en"))
            .or_else(|| self.0.values().next().map(String::as_str))
    }
}

// ---------------------------------------------------------------------------
// Unix-seconds serialization helper for Timestamp
// ---------------------------------------------------------------------------

/// Serde adapter for timestamps carried as unix seconds on the wire.
///
/// Accepts integers, floats and numeric strings; serializes as an integer.
pub mod unix_seconds {
    use super::Timestamp;
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S>(ts: &Timestamp, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(ts.seconds_since_epoch)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Timestamp, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(UnixSecondsVisitor)
    }

    struct UnixSecondsVisitor;

    impl<'de> Visitor<'de> for UnixSecondsVisitor {
        type Value = Timestamp;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "unix seconds as a number or numeric string")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Timestamp, E> {
            Ok(Timestamp::from_seconds(v))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Timestamp, E> {
            u64::try_from(v)
                .map(Timestamp::from_seconds)
                .map_err(|_| E::custom("timestamp before the unix epoch"))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Timestamp, E> {
            if !v.is_finite() || v < 0.0 {
                return Err(E::custom("timestamp is not a non-negative number"));
            }
            Ok(Timestamp {
                seconds_since_epoch: v.trunc() as u64,
                nanoseconds: (v.fract() * 1e9) as u32,
            })
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Timestamp, E> {
            if let Ok(secs) = v.parse::<u64>() {
                return Ok(Timestamp::from_seconds(secs));
            }
            let float: f64 = v.parse().map_err(E::custom)?;
            self.visit_f64(float)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_plus_seconds() {
        let ts = Timestamp::from_seconds(1_000);
        assert_eq!(ts.plus_seconds(60).seconds_since_epoch, 1_060);
        assert_eq!(
            Timestamp::from_seconds(u64::MAX).plus_seconds(1).seconds_since_epoch,
            u64::MAX
        );
    }

    #[test]
    fn test_timestamp_expiry() {
        assert!(Timestamp::from_seconds(1).is_expired());
        assert!(!Timestamp::in_seconds(3600).is_expired());
    }

    #[test]
    fn test_timestamp_rfc3339() {
        let ts = Timestamp::from_seconds(0);
        assert!(ts.to_rfc3339().starts_with("1970-01-01T00:00:00"));
    }

    #[test]
    fn test_generated_ids_are_well_formed() {
        let id = ExchangeId::generate();
        assert_eq!(id.as_str().len(), 16);
        assert!(id.is_well_formed());
        assert!(!ExchangeId::new("not-an-id").is_well_formed());
        assert!(SignatureRequestId::generate().is_well_formed());
        assert!(ReplyId::generate().is_well_formed());
    }

    #[test]
    fn test_id_serializes_as_plain_string() {
        let id = ExchangeId::new("0123456789abcdef");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"0123456789abcdef\"");
    }

    #[test]
    fn test_secret_generation() {
        let secret = CapabilitySecret::generate();
        assert_eq!(secret.expose().len(), 32);
        assert!(secret.is_well_formed());
        assert_ne!(secret, CapabilitySecret::generate());
    }

    #[test]
    fn test_secret_matches() {
        let secret = CapabilitySecret::from_string("00112233445566778899aabbccddeeff");
        assert!(secret.matches("00112233445566778899aabbccddeeff"));
        assert!(!secret.matches("00112233445566778899aabbccddeefe"));
        assert!(!secret.matches(""));
    }

    #[test]
    fn test_secret_equality() {
        let secret = CapabilitySecret::from_string("00112233445566778899aabbccddeeff");
        assert_eq!(secret, secret.clone());
        assert_ne!(
            secret,
            CapabilitySecret::from_string("00112233445566778899aabbccddeefe")
        );
        assert_ne!(secret, CapabilitySecret::from_string("0011"));
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = CapabilitySecret::from_string("00112233445566778899aabbccddeeff");
        let debug = format!("{:?}", secret);
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("0011"));
    }

    #[test]
    fn test_translated_string_best() {
        let label = TranslatedString::new()
            .with("en", "Known by the recipient")
            .with("nl", "Bekend bij de ontvanger");
        assert_eq!(label.best("nl"), Some("Bekend bij de ontvanger"));
        assert_eq!(label.best("de"), Some("Known by the recipient"));
        assert_eq!(TranslatedString::new().best("en"), None);
    }

    #[derive(Serialize, Deserialize)]
    struct Stamped {
        #[serde(with = "unix_seconds")]
        at: Timestamp,
    }

    #[test]
    fn test_unix_seconds_accepts_number_and_string() {
        let from_int: Stamped = serde_json::from_str(r#"{"at": 1700000000}"#).unwrap();
        assert_eq!(from_int.at.seconds_since_epoch, 1_700_000_000);

        let from_str: Stamped = serde_json::from_str(r#"{"at": "1700000000"}"#).unwrap();
        assert_eq!(from_str.at, from_int.at);

        let from_float: Stamped = serde_json::from_str(r#"{"at": 1700000000.5}"#).unwrap();
        assert_eq!(from_float.at.seconds_since_epoch, 1_700_000_000);

        assert!(serde_json::from_str::<Stamped>(r#"{"at": -5}"#).is_err());
        assert!(serde_json::from_str::<Stamped>(r#"{"at": "soon"}"#).is_err());
    }

    #[test]
    fn test_unix_seconds_serializes_integer() {
        let stamped = Stamped {
            at: Timestamp::from_seconds(42),
        };
        assert_eq!(serde_json::to_string(&stamped).unwrap(), r#"{"at":42}"#);
    }
}
