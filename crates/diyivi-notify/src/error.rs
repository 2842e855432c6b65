use thiserror::Error;

/// Error type for the diyivi-notify crate.
///
/// Messages are generic so that addresses and attribute values never end
/// up in logs through an error string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("delivery failed")]
    DeliveryFailed,

    #[error("invalid recipient")]
    InvalidRecipient,

    #[error("configuration error")]
    ConfigurationError,

    #[error("internal error")]
    InternalError,
}

/// Result type alias for diyivi-notify operations.
pub type NotifyResult<T> = Result<T, NotifyError>;
