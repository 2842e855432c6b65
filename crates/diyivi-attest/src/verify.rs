use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{AttestError, AttestResult};
use crate::result::{DisclosureResult, ResultSubject, SessionType, SignatureResult};

/// Clock-skew allowance when checking `exp`, in seconds.
pub const DEFAULT_LEEWAY_SECS: u64 = 5;

// ---------------------------------------------------------------------------
// ResultVerifier: trust boundary towards the attestation server
// ---------------------------------------------------------------------------

/// Verifies session result tokens issued by the attestation server.
///
/// Implementations own the key material and algorithm choice; protocol
/// code only sees parsed, trusted results or one of two failures:
/// `InvalidToken` (signature, structure, expiry) and `InvalidResult`
/// (schema mismatch of an otherwise valid token).
pub trait ResultVerifier: Send + Sync {
    fn verify_disclosure(&self, token: &str) -> AttestResult<DisclosureResult>;
    fn verify_signature(&self, token: &str) -> AttestResult<SignatureResult>;
}

/// `ResultVerifier` backed by `jsonwebtoken`.
pub struct JwtResultVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtResultVerifier {
    pub fn new(key: DecodingKey, algorithm: Algorithm) -> Self {
        let mut validation = Validation::new(algorithm);
        validation.leeway = DEFAULT_LEEWAY_SECS;
        validation.validate_aud = false;
        Self { key, validation }
    }

    /// RS256 with the attestation server's public key in PEM form.
    pub fn from_rsa_pem(pem: &[u8]) -> AttestResult<Self> {
        let key = DecodingKey::from_rsa_pem(pem)
            .map_err(|e| AttestError::InvalidKey(format!("RSA public key: {}", e)))?;
        Ok(Self::new(key, Algorithm::RS256))
    }

    /// HS256 with a shared secret, for servers configured with symmetric result signing.
    pub fn from_secret(secret: &[u8]) -> Self {
        Self::new(DecodingKey::from_secret(secret), Algorithm::HS256)
    }

    pub fn with_leeway(mut self, seconds: u64) -> Self {
        self.validation.leeway = seconds;
        self
    }

    /// Only accept tokens whose `iss` is `issuer`.
    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.validation.set_issuer(&[issuer]);
        self
    }

    pub fn leeway(&self) -> u64 {
        self.validation.leeway
    }

    fn decode_as<T: DeserializeOwned>(&self, token: &str) -> AttestResult<T> {
        let claims = decode::<serde_json::Value>(token, &self.key, &self.validation)
            .map_err(|e| {
                debug!(error = %e, "session result token rejected");
                AttestError::InvalidToken(format!("{:?}", e.kind()))
            })?
            .claims;
        serde_json::from_value(claims).map_err(|e| {
            debug!(error = %e, "session result payload rejected");
            AttestError::InvalidResult(e.to_string())
        })
    }
}

impl ResultVerifier for JwtResultVerifier {
    fn verify_disclosure(&self, token: &str) -> AttestResult<DisclosureResult> {
        let result: DisclosureResult = self.decode_as(token)?;
        if !result.has_kind(ResultSubject::DisclosingResult, SessionType::Disclosing) {
            return Err(AttestError::InvalidResult(
                "not a disclosure session result".into(),
            ));
        }
        Ok(result)
    }

    fn verify_signature(&self, token: &str) -> AttestResult<SignatureResult> {
        let result: SignatureResult = self.decode_as(token)?;
        if !result
            .session
            .has_kind(ResultSubject::SigningResult, SessionType::Signing)
        {
            return Err(AttestError::InvalidResult(
                "not a signing session result".into(),
            ));
        }
        Ok(result)
    }
}
