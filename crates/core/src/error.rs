use thiserror::Error;

pub type E2eResult<T> = Result<T, E2eError>;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0} environment variable is not set")]
    MissingSecret(String),

    #[error("{name} {reason}")]
    InvalidSecret { name: String, reason: String },

    #[error("Task text contains the value of {0}")]
    SecretLeak(String),

    #[error("Agent error: {0}")]
    Agent(String),

    #[error("Page interaction error: {0}")]
    Page(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl E2eError {
    /// Whether the error means a test cannot run here, as opposed to a test
    /// that ran and failed.
    pub fn is_credential_gate(&self) -> bool {
        matches!(
            self,
            E2eError::MissingSecret(_) | E2eError::InvalidSecret { .. }
        )
    }
}
