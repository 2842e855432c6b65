use thiserror::Error;

/// Construction-time failures of the policy model.
///
/// Evaluation never fails: an unsatisfied policy is `false`, not an error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("invalid attribute identifier: {0}")]
    InvalidAttribute(String),

    #[error("invalid attribute constraint: {0}")]
    InvalidConstraint(String),

    #[error("invalid disjunction label: {0}")]
    InvalidLabel(String),
}

pub type PolicyResult<T> = Result<T, PolicyError>;
