//! Error types for Skystats

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SkystatsError>;

#[derive(Error, Debug)]
pub enum SkystatsError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Missing field in profile response: {0}")]
    MissingField(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SkystatsError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            SkystatsError::Config(_) => 2,
            SkystatsError::Auth(_) => 3,
            SkystatsError::Credential(_) => 1,
            SkystatsError::Api(_) => 1,
            SkystatsError::MissingField(_) => 1,
            SkystatsError::InvalidInput(_) => 1,
            SkystatsError::Io(_) => 1,
        }
    }

    /// Whether this error only aborts the current tick.
    ///
    /// Upstream failures, missing counters and rejected post text are
    /// recoverable: the daemon logs them and waits for the next trigger.
    pub fn is_tick_recoverable(&self) -> bool {
        matches!(
            self,
            SkystatsError::Api(_) | SkystatsError::MissingField(_) | SkystatsError::InvalidInput(_)
        )
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Failures of the on-disk cache (credential and baseline files)
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Cache file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache file content is invalid: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Authentication rejected: {0}")]
    Authentication(String),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Unexpected response: {0}")]
    Decode(String),
}
