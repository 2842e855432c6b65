use diyivi_core::Timestamp;
use diyivi_policy::{DisjunctionLabels, Policy};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::error::{AttestError, AttestResult};

pub const DISCLOSURE_CONTEXT: &str = "https://irma.app/ld/request/disclosure/v2";
pub const SIGNATURE_CONTEXT: &str = "https://irma.app/ld/request/signature/v2";

// ---------------------------------------------------------------------------
// Session request bodies
// ---------------------------------------------------------------------------

/// Request to disclose the attributes in `disclose`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisclosureRequest {
    #[serde(rename = "@context")]
    pub context: String,
    pub disclose: Policy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<DisjunctionLabels>,
    #[serde(
        rename = "clientReturnUrl",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub client_return_url: Option<String>,
    #[serde(
        rename = "augmentReturnUrl",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub augment_return_url: Option<bool>,
}

impl DisclosureRequest {
    pub fn new(disclose: Policy) -> Self {
        Self {
            context: DISCLOSURE_CONTEXT.to_string(),
            disclose,
            labels: None,
            client_return_url: None,
            augment_return_url: None,
        }
    }

    /// Attach disjunction labels; every label index must exist in `disclose`.
    pub fn with_labels(mut self, labels: DisjunctionLabels) -> AttestResult<Self> {
        labels.validate_for(&self.disclose)?;
        self.labels = Some(labels);
        Ok(self)
    }

    /// Where the phone returns after the session. With `augment`, the
    /// server appends the session token to the URL.
    pub fn with_client_return_url(mut self, url: impl Into<String>, augment: bool) -> Self {
        self.client_return_url = Some(url.into());
        self.augment_return_url = Some(augment);
        self
    }
}

/// Request to sign `message` while disclosing the attributes in `disclose`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SigningRequest {
    #[serde(rename = "@context")]
    pub context: String,
    pub message: String,
    pub disclose: Policy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<DisjunctionLabels>,
    #[serde(
        rename = "clientReturnUrl",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub client_return_url: Option<String>,
}

impl SigningRequest {
    pub fn new(message: impl Into<String>, disclose: Policy) -> Self {
        Self {
            context: SIGNATURE_CONTEXT.to_string(),
            message: message.into(),
            disclose,
            labels: None,
            client_return_url: None,
        }
    }

    pub fn with_labels(mut self, labels: DisjunctionLabels) -> AttestResult<Self> {
        labels.validate_for(&self.disclose)?;
        self.labels = Some(labels);
        Ok(self)
    }
}

/// Session request plus the server-side session options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtendedRequest<R> {
    /// Lifetime of the resulting session result JWT, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validity: Option<u64>,
    /// Seconds the server waits for the app to connect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(rename = "callbackUrl", default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    pub request: R,
}

impl<R> ExtendedRequest<R> {
    pub fn new(request: R) -> Self {
        Self {
            validity: None,
            timeout: None,
            callback_url: None,
            request,
        }
    }

    pub fn with_validity(mut self, seconds: u64) -> Self {
        self.validity = Some(seconds);
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout = Some(seconds);
        self
    }

    pub fn with_callback_url(mut self, url: impl Into<String>) -> Self {
        self.callback_url = Some(url.into());
        self
    }
}

// ---------------------------------------------------------------------------
// JWT claim envelopes
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct DisclosureRequestClaims<'a> {
    sub: &'static str,
    iss: &'a str,
    iat: u64,
    sprequest: &'a ExtendedRequest<DisclosureRequest>,
}

#[derive(Serialize)]
struct SigningRequestClaims<'a> {
    sub: &'static str,
    iss: &'a str,
    iat: u64,
    absrequest: &'a ExtendedRequest<SigningRequest>,
}

// ---------------------------------------------------------------------------
// RequestSigner: HS256 session request tokens
// ---------------------------------------------------------------------------

/// Signs session request JWTs with the secret shared with the attestation
/// server. The server looks the secret up by `issuer_id`.
pub struct RequestSigner {
    issuer_id: String,
    key: EncodingKey,
    validity: Option<u64>,
}

impl RequestSigner {
    pub fn new(issuer_id: impl Into<String>, secret: &[u8]) -> AttestResult<Self> {
        if secret.is_empty() {
            return Err(AttestError::InvalidKey("session request secret is empty".into()));
        }
        Ok(Self {
            issuer_id: issuer_id.into(),
            key: EncodingKey::from_secret(secret),
            validity: None,
        })
    }

    /// Default `validity` applied to requests that do not set their own.
    pub fn with_validity(mut self, seconds: u64) -> Self {
        self.validity = Some(seconds);
        self
    }

    pub fn issuer_id(&self) -> &str {
        &self.issuer_id
    }

    pub fn sign_disclosure(&self, mut request: ExtendedRequest<DisclosureRequest>) -> AttestResult<String> {
        request.validity = request.validity.or(self.validity);
        let claims = DisclosureRequestClaims {
            sub: "verification_request",
            iss: &self.issuer_id,
            iat: Timestamp::now().seconds_since_epoch,
            sprequest: &request,
        };
        self.sign(&claims)
    }

    pub fn sign_signing(&self, mut request: ExtendedRequest<SigningRequest>) -> AttestResult<String> {
        request.validity = request.validity.or(self.validity);
        let claims = SigningRequestClaims {
            sub: "signature_request",
            iss: &self.issuer_id,
            iat: Timestamp::now().seconds_since_epoch,
            absrequest: &request,
        };
        self.sign(&claims)
    }

    fn sign<T: Serialize>(&self, claims: &T) -> AttestResult<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.key)
            .map_err(|e| AttestError::Signing(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diyivi_core::TranslatedString;
    use diyivi_policy::Attribute;
    use jsonwebtoken::{decode, DecodingKey, Validation};

    const SECRET: &[u8] = b"unsafe_secret_key";

    fn email_policy() -> Policy {
        Policy::single(Attribute::parse("pbdf.pbdf.email.email").unwrap())
    }

    fn decode_claims(token: &str) -> serde_json::Value {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
        decode::<serde_json::Value>(token, &DecodingKey::from_secret(SECRET), &validation)
            .unwrap()
            .claims
    }

    #[test]
    fn test_disclosure_request_token() {
        let signer = RequestSigner::new("diyivi", SECRET).unwrap().with_validity(120);
        let request = DisclosureRequest::new(email_policy())
            .with_client_return_url("http://localhost:8000/exchanges/0123456789abcdef/", true);
        let token = signer.sign_disclosure(ExtendedRequest::new(request)).unwrap();

        let claims = decode_claims(&token);
        assert_eq!(claims["sub"], "verification_request");
        assert_eq!(claims["iss"], "diyivi");
        assert!(claims["iat"].as_u64().unwrap() > 0);
        assert_eq!(claims["sprequest"]["validity"], 120);
        let inner = &claims["sprequest"]["request"];
        assert_eq!(inner["@context"], DISCLOSURE_CONTEXT);
        assert_eq!(inner["disclose"], serde_json::json!([[["pbdf.pbdf.email.email"]]]));
        assert_eq!(inner["augmentReturnUrl"], true);
        assert!(inner.get("labels").is_none());
        assert!(claims["sprequest"].get("callbackUrl").is_none());
    }

    #[test]
    fn test_explicit_validity_wins() {
        let signer = RequestSigner::new("diyivi", SECRET).unwrap().with_validity(120);
        let token = signer
            .sign_disclosure(ExtendedRequest::new(DisclosureRequest::new(email_policy())).with_validity(30))
            .unwrap();
        assert_eq!(decode_claims(&token)["sprequest"]["validity"], 30);
    }

    #[test]
    fn test_signing_request_token() {
        let signer = RequestSigner::new("diyivi", SECRET).unwrap();
        let request = SigningRequest::new("I agree", email_policy());
        let token = signer
            .sign_signing(ExtendedRequest::new(request).with_timeout(300))
            .unwrap();

        let claims = decode_claims(&token);
        assert_eq!(claims["sub"], "signature_request");
        assert_eq!(claims["absrequest"]["timeout"], 300);
        assert_eq!(claims["absrequest"]["request"]["message"], "I agree");
        assert_eq!(claims["absrequest"]["request"]["@context"], SIGNATURE_CONTEXT);
    }

    #[test]
    fn test_labels_checked_against_policy() {
        let label = TranslatedString::new().with("en", "Known by the recipient");
        let ok = DisclosureRequest::new(email_policy())
            .with_labels(DisjunctionLabels::new().with(0, label.clone()));
        assert!(ok.is_ok());

        let bad = DisclosureRequest::new(email_policy())
            .with_labels(DisjunctionLabels::new().with(1, label));
        assert!(matches!(bad, Err(AttestError::InvalidRequest(_))));
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(matches!(
            RequestSigner::new("diyivi", b""),
            Err(AttestError::InvalidKey(_))
        ));
    }
}
