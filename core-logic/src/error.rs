//! # Core Error Types
//!
//! Centralized error definitions for the core-logic crate.
//! All errors implement `std::error::Error` and `std::fmt::Display`.

use thiserror::Error;

/// Unified error type for core-logic operations.
///
/// This enum wraps all specific error types and provides a unified
/// error interface for the application layer.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Config(ConfigError),

    #[error("No valid accounts found in {path}")]
    NoAccounts { path: String },
}

impl From<ConfigError> for CoreError {
    fn from(e: ConfigError) -> Self {
        CoreError::Config(e)
    }
}

/// Configuration-related errors
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("Missing required configuration field: '{field}'")]
    MissingField { field: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },
}

/// Transport-level failures: the request never produced a usable response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Request timeout after {timeout_ms}ms to {endpoint}")]
    Timeout { timeout_ms: u64, endpoint: String },

    #[error("Connection failed to {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },

    #[error("HTTP error {status_code} from {endpoint}")]
    HttpStatus { status_code: u16, endpoint: String },

    #[error("Invalid proxy '{proxy}': {reason}")]
    Proxy { proxy: String, reason: String },

    #[error("Request to {endpoint} failed: {reason}")]
    Request { endpoint: String, reason: String },
}

/// Response body could not be turned into JSON.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Failed to decompress {encoding} body: {reason}")]
    Decompress { encoding: String, reason: String },

    #[error("Malformed JSON body: {reason}")]
    Json { reason: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("No session cookie obtainable via {proxy}")]
    Unavailable { proxy: String },
}

/// Failure of a single attempt of an account operation.
///
/// Every variant is retried by the request engine; none of them escape it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Session(#[from] SessionError),

    /// Well-formed response carrying a non-success business status.
    #[error("Rejected with code {code}: {message}")]
    Rejected { code: i64, message: String },
}

impl TaskError {
    pub fn rejected(code: i64, message: impl Into<String>) -> Self {
        TaskError::Rejected {
            code,
            message: message.into(),
        }
    }
}
