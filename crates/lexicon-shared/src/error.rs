//! Error types shared by the adapters and the acquisition loop.

use thiserror::Error;

/// Malformed generator payload. Always retryable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Payload is empty")]
    Empty,

    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Field '{0}' is missing or empty")]
    MissingField(&'static str),
}

/// Record store failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The term is already stored. Expected under normal operation.
    #[error("Term already stored: {0}")]
    Duplicate(String),

    #[error("Entry rejected by schema: {0} is missing or empty")]
    Invalid(&'static str),

    #[error("Store error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::Duplicate(_))
    }
}

/// Generator transport/API failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeneratorError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Generator returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("Generator returned empty response")]
    EmptyResponse,
}

/// Outbound mail failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MailError {
    #[error("Invalid address '{0}'")]
    Address(String),

    #[error("Failed to build message: {0}")]
    Build(String),

    #[error("Transport error: {0}")]
    Transport(String),
}
