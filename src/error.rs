use thiserror::Error;

/// Failures of the credential pipeline
#[derive(Debug, Error)]
pub enum Error {
    #[error("1Password is unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Item '{0}' not found")]
    ItemNotFound(String),

    #[error("Item '{item}' is missing required field '{field}'")]
    MissingRequiredField { item: String, field: &'static str },

    #[error("Failed to verify AWS credentials: {0}")]
    IdentityProbeFailed(String),

    #[error("Failed to assume role {role_arn}: {reason}")]
    RoleAssumptionFailed { role_arn: String, reason: String },

    #[error("Failed to get MFA session token: {0}")]
    SessionTokenFailed(String),

    #[error("Failed to update {path}: {reason}")]
    IgnoreListUpdateFailed { path: String, reason: String },

    #[error("Selection cancelled")]
    SelectionCancelled,
}

impl Error {
    /// Whether the error should abort the running command
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::IgnoreListUpdateFailed { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
