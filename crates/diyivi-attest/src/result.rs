use diyivi_core::{unix_seconds, Timestamp};
use diyivi_policy::{DisclosedValues, Policy};
use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Session and proof status enums (attestation server vocabulary)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Initialized,
    Pairing,
    Connected,
    Cancelled,
    Done,
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProofStatus {
    Valid,
    Invalid,
    InvalidTimestamp,
    UnmatchedRequest,
    MissingAttributes,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    Disclosing,
    Signing,
    Issuing,
}

/// JWT `sub` of a session result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSubject {
    DisclosingResult,
    SigningResult,
    IssuingResult,
}

// ---------------------------------------------------------------------------
// DisclosureResult: verified outcome of a disclosure session
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisclosureResult {
    pub iss: String,
    #[serde(with = "unix_seconds")]
    pub iat: Timestamp,
    #[serde(with = "unix_seconds")]
    pub exp: Timestamp,
    pub sub: ResultSubject,
    #[serde(rename = "type")]
    pub session_type: SessionType,
    pub token: String,
    pub status: SessionStatus,
    #[serde(rename = "proofStatus")]
    pub proof_status: ProofStatus,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub disclosed: DisclosedValues,
}

impl DisclosureResult {
    pub fn is_successful(&self) -> bool {
        self.status == SessionStatus::Done && self.proof_status == ProofStatus::Valid
    }

    /// Successful, and `disclosed[i]` satisfies `policy[i]` for every `i`
    /// with no extra or missing groups.
    pub fn satisfies_policy(&self, policy: &Policy) -> bool {
        self.is_successful() && policy.is_satisfied_by(&self.disclosed)
    }

    pub(crate) fn has_kind(&self, sub: ResultSubject, session_type: SessionType) -> bool {
        self.sub == sub && self.session_type == session_type
    }
}

// ---------------------------------------------------------------------------
// SignatureResult: verified outcome of a signing session
// ---------------------------------------------------------------------------

/// The attribute-based signature over a message.
///
/// Only `message` is interpreted; everything else is kept verbatim so the
/// signature can be handed on for independent verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedMessage {
    pub message: String,
    #[serde(flatten)]
    pub proof: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureResult {
    #[serde(flatten)]
    pub session: DisclosureResult,
    pub signature: SignedMessage,
}

impl SignatureResult {
    /// The signed message is exactly `message` and the disclosed attributes
    /// satisfy `policy`.
    pub fn signs(&self, message: &str, policy: &Policy) -> bool {
        self.signature.message == message && self.session.satisfies_policy(policy)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<DisclosedValues, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<DisclosedValues>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use diyivi_policy::{build_policy, Attribute, DisclosedAttribute};

    fn attr(id: &str) -> Attribute {
        Attribute::parse(id).unwrap()
    }

    fn present(id: &str, value: &str) -> DisclosedAttribute {
        DisclosedAttribute::present(attr(id), value, Timestamp::from_seconds(1_700_000_000))
    }

    fn result(disclosed: DisclosedValues) -> DisclosureResult {
        DisclosureResult {
            iss: "irmaserver".into(),
            iat: Timestamp::from_seconds(1_700_000_000),
            exp: Timestamp::from_seconds(1_700_000_120),
            sub: ResultSubject::DisclosingResult,
            session_type: SessionType::Disclosing,
            token: "session-token".into(),
            status: SessionStatus::Done,
            proof_status: ProofStatus::Valid,
            disclosed,
        }
    }

    const EMAIL: &str = "pbdf.pbdf.email.email";
    const PHONE: &str = "pbdf.sidn-pbdf.mobilenumber.mobilenumber";

    #[test]
    fn test_is_successful() {
        let mut r = result(vec![]);
        assert!(r.is_successful());
        r.proof_status = ProofStatus::Expired;
        assert!(!r.is_successful());
        r.proof_status = ProofStatus::Valid;
        r.status = SessionStatus::Cancelled;
        assert!(!r.is_successful());
    }

    #[test]
    fn test_satisfies_policy_requires_success() {
        let policy = Policy::single(attr(EMAIL));
        let mut r = result(vec![vec![present(EMAIL, "a@example.com")]]);
        assert!(r.satisfies_policy(&policy));
        r.proof_status = ProofStatus::MissingAttributes;
        assert!(!r.satisfies_policy(&policy));
    }

    #[test]
    fn test_satisfies_policy_arity_strict() {
        let policy = Policy::single(attr(EMAIL));
        let r = result(vec![
            vec![present(EMAIL, "a@example.com")],
            vec![present(PHONE, "0612345678")],
        ]);
        assert!(!r.satisfies_policy(&policy));
        assert!(!result(vec![]).satisfies_policy(&policy));
    }

    #[test]
    fn test_satisfies_policy_rejects_misaligned_union() {
        let policy = Policy::concat([&Policy::single(attr(PHONE)), &Policy::single(attr(EMAIL))]);
        let misaligned = result(vec![
            vec![present(EMAIL, "a@example.com")],
            vec![present(PHONE, "0612345678")],
        ]);
        assert!(!misaligned.satisfies_policy(&policy));
    }

    #[test]
    fn test_deserialize_server_payload() {
        let json = serde_json::json!({
            "iss": "irmaserver",
            "iat": 1700000000,
            "exp": 1700000120,
            "sub": "disclosing_result",
            "type": "disclosing",
            "token": "abc",
            "status": "DONE",
            "proofStatus": "VALID",
            "disclosed": [[{
                "rawvalue": "a@example.com",
                "value": {"": "a@example.com"},
                "id": EMAIL,
                "status": "PRESENT",
                "issuancetime": 1699000000
            }]]
        });
        let r: DisclosureResult = serde_json::from_value(json).unwrap();
        assert!(r.has_kind(ResultSubject::DisclosingResult, SessionType::Disclosing));
        assert!(r.satisfies_policy(&Policy::single(attr(EMAIL))));
    }

    #[test]
    fn test_deserialize_null_disclosed() {
        let json = serde_json::json!({
            "iss": "irmaserver",
            "iat": 1700000000,
            "exp": 1700000120,
            "sub": "disclosing_result",
            "type": "disclosing",
            "token": "abc",
            "status": "CANCELLED",
            "proofStatus": "INVALID",
            "disclosed": null
        });
        let r: DisclosureResult = serde_json::from_value(json).unwrap();
        assert!(r.disclosed.is_empty());
        assert!(!r.is_successful());
    }

    #[test]
    fn test_signature_result_signs() {
        let attributes = vec![attr(EMAIL), attr(PHONE)];
        let policy = build_policy(&attributes);
        let json = serde_json::json!({
            "iss": "irmaserver",
            "iat": 1700000000,
            "exp": 1700000120,
            "sub": "signing_result",
            "type": "signing",
            "token": "abc",
            "status": "DONE",
            "proofStatus": "VALID",
            "disclosed": [
                [{"rawvalue": "a@example.com", "value": {}, "id": EMAIL, "status": "PRESENT", "issuancetime": 1}],
                [{"rawvalue": "0612345678", "value": {}, "id": PHONE, "status": "PRESENT", "issuancetime": 1}]
            ],
            "signature": {
                "@context": "https://irma.app/ld/signature/v2",
                "signature": [],
                "nonce": "bm9uY2U=",
                "message": "I owe you one"
            }
        });
        let r: SignatureResult = serde_json::from_value(json).unwrap();
        assert!(r.signs("I owe you one", &policy));
        assert!(!r.signs("I owe you two", &policy));
        assert_eq!(r.signature.proof["nonce"], "bm9uY2U=");

        let reencoded = serde_json::to_value(&r.signature).unwrap();
        assert_eq!(reencoded["message"], "I owe you one");
        assert_eq!(reencoded["@context"], "https://irma.app/ld/signature/v2");
    }
}
