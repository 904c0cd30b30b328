//! Error types for steadyrun-gateway

use thiserror::Error;

/// Errors returned by provider operations
///
/// The gateway never retries; `Transient` errors are surfaced so the
/// transport layer (or the operator) can decide.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Resource does not exist
    #[error("resource not found: {0}")]
    NotFound(String),

    /// Throttling, provider 5xx, or network failure
    #[error("transient provider error: {0}")]
    Transient(String),

    /// Provider rejected the operation because of the resource's current state
    #[error("{0}")]
    InvalidState(String),

    /// Validation or other non-retryable rejection
    #[error("provider rejected request: {0}")]
    Permanent(String),
}

impl GatewayError {
    /// Check if error is retryable
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Transient(_))
    }

    /// Check if error means the resource is absent
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::NotFound(_))
    }
}
