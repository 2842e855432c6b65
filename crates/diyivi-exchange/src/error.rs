use diyivi_attest::AttestError;
use diyivi_core::CoreError;
use diyivi_policy::PolicyError;
use thiserror::Error;

/// Failures of exchange and signature-request operations.
///
/// Every variant except `Storage` and `Internal` is raised before anything
/// is persisted.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Absent, expired, not yet started, or not visible to the caller.
    #[error("not found")]
    NotFound,

    #[error("incorrect initiator secret")]
    Unauthorized,

    #[error("already started")]
    AlreadyStarted,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("invalid session result: {0}")]
    InvalidResult(String),

    #[error("disclosure does not satisfy the requested policy")]
    PolicyNotSatisfied,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<CoreError> for ProtocolError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Storage(msg) => ProtocolError::Storage(msg),
            other => ProtocolError::Internal(other.to_string()),
        }
    }
}

impl From<AttestError> for ProtocolError {
    fn from(e: AttestError) -> Self {
        match e {
            AttestError::InvalidToken(msg) => ProtocolError::InvalidToken(msg),
            AttestError::InvalidResult(msg) => ProtocolError::InvalidResult(msg),
            AttestError::InvalidRequest(msg) => ProtocolError::InvalidRequest(msg),
            other => ProtocolError::Internal(other.to_string()),
        }
    }
}

impl From<PolicyError> for ProtocolError {
    fn from(e: PolicyError) -> Self {
        ProtocolError::InvalidRequest(e.to_string())
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(e: serde_json::Error) -> Self {
        ProtocolError::Internal(format!("record encoding: {}", e))
    }
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_core_error() {
        let err: ProtocolError = CoreError::Storage("redis down".into()).into();
        assert!(matches!(err, ProtocolError::Storage(ref m) if m == "redis down"));
        let err: ProtocolError = CoreError::Serialization("bad".into()).into();
        assert!(matches!(err, ProtocolError::Internal(_)));
    }

    #[test]
    fn test_from_attest_error() {
        let err: ProtocolError = AttestError::InvalidToken("ExpiredSignature".into()).into();
        assert!(matches!(err, ProtocolError::InvalidToken(_)));
        let err: ProtocolError = AttestError::InvalidResult("missing field".into()).into();
        assert!(matches!(err, ProtocolError::InvalidResult(_)));
        let err: ProtocolError = AttestError::Signing("boom".into()).into();
        assert!(matches!(err, ProtocolError::Internal(_)));
    }

    #[test]
    fn test_from_policy_error() {
        let err: ProtocolError = PolicyError::InvalidLabel("index 4".into()).into();
        assert!(matches!(err, ProtocolError::InvalidRequest(_)));
    }

    #[test]
    fn test_display() {
        assert_eq!(ProtocolError::NotFound.to_string(), "not found");
        assert_eq!(
            ProtocolError::Unauthorized.to_string(),
            "incorrect initiator secret"
        );
    }
}
