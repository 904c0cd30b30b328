//! Error types for steadyrun-api

use thiserror::Error;

/// Errors raised when a desired spec is internally inconsistent
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpecError {
    /// A required field is empty
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Autoscaling bounds are inverted or zero
    #[error("invalid scaling bounds: {0}")]
    InvalidScaling(String),

    /// Health check parameter out of range
    #[error("invalid health check: {0}")]
    InvalidHealthCheck(String),
}
