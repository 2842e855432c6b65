use thiserror::Error;

#[derive(Debug, Error)]
pub enum AttestError {
    /// Bad signature, malformed JWT, wrong issuer or expired.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// Well-signed token whose payload is not the expected session result.
    #[error("invalid session result: {0}")]
    InvalidResult(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<diyivi_policy::PolicyError> for AttestError {
    fn from(e: diyivi_policy::PolicyError) -> Self {
        AttestError::InvalidRequest(e.to_string())
    }
}

pub type AttestResult<T> = Result<T, AttestError>;
