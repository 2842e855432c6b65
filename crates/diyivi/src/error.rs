use thiserror::Error;

/// Error type for the DIYivi root binary, aggregating errors from the
/// workspace crates.
#[derive(Debug, Error)]
pub enum RootError {
    #[error("core error: {0}")]
    Core(#[from] diyivi_core::CoreError),

    #[error("policy error: {0}")]
    Policy(#[from] diyivi_policy::PolicyError),

    #[error("attestation error: {0}")]
    Attest(#[from] diyivi_attest::AttestError),

    #[error("notification error: {0}")]
    Notify(#[from] diyivi_notify::NotifyError),

    #[error("protocol error: {0}")]
    Protocol(#[from] diyivi_exchange::ProtocolError),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RootError {
    fn from(e: serde_json::Error) -> Self {
        RootError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for RootError {
    fn from(e: toml::de::Error) -> Self {
        RootError::Config(format!("TOML parse error: {}", e))
    }
}

pub type RootResult<T> = Result<T, RootError>;
