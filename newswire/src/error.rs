//! Error taxonomy shared by every layer of the portal.
//!
//! Validation and authorization failures are raised before the store is
//! touched; persistence failures carry no partial-state promise.

use thiserror::Error;

/// Error type for portal operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PortalError {
    /// Missing or malformed input (HTTP 400).
    #[error("invalid request: {0}")]
    Validation(String),
    /// Missing or invalid credential (HTTP 401).
    #[error("authentication failed: {0}")]
    Authentication(String),
    /// Authenticated but denied by policy (HTTP 403).
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Target id does not resolve (HTTP 404).
    #[error("not found: {0}")]
    NotFound(String),
    /// Store I/O failure (HTTP 500).
    #[error("persistence failure: {0}")]
    Persistence(String),
}

pub type PortalResult<T> = Result<T, PortalError>;

impl From<std::io::Error> for PortalError {
    fn from(err: std::io::Error) -> Self {
        PortalError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for PortalError {
    fn from(err: serde_json::Error) -> Self {
        PortalError::Persistence(err.to_string())
    }
}
