//! Core error types for steadyrun-core

use std::time::Duration;

use steadyrun_api::{ServiceStatus, SpecError};
use steadyrun_gateway::GatewayError;
use thiserror::Error;

use crate::collab::CollaboratorError;
use crate::waiter::WaitTarget;

/// How a failed run should be treated by the calling pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// State unknown or operator action required; re-run to reconcile
    Fatal,
    /// Service may still be progressing; halt dependent automation
    Unconfirmed,
}

/// Errors that end a convergence run
#[derive(Error, Debug, Clone)]
pub enum ConvergeError {
    /// Desired spec failed validation
    #[error("invalid desired spec: {0}")]
    InvalidSpec(#[from] SpecError),

    /// A collaborator lookup failed
    #[error("{collaborator} failed: {source}")]
    Collaborator {
        collaborator: &'static str,
        #[source]
        source: CollaboratorError,
    },

    /// More than one service answers to the identity's name
    #[error("{count} services are named {name}; remove the extras manually: {}", .arns.join(", "))]
    Ambiguous {
        name: String,
        count: usize,
        arns: Vec<String>,
    },

    /// Another operation is running against the service
    #[error("service {name} ({arn}) has an operation in progress, retry later")]
    Busy { name: String, arn: String },

    /// Provider rejected the request due to resource state
    #[error("{0}")]
    InvalidState(String),

    /// Service settled in a status other than the target while waiting
    #[error(
        "service {arn} {} while waiting for {target}",
        .status.map_or_else(|| "disappeared".to_string(), |s| format!("reached {s}"))
    )]
    ConvergenceFailed {
        target: WaitTarget,
        arn: String,
        url: String,
        status: Option<ServiceStatus>,
    },

    /// Wait bound elapsed before the target was reached
    #[error(
        "gave up after {waited:?} waiting for {target} on {arn} (last status {}); check {}",
        .last_status.map_or_else(|| "unknown".to_string(), |s| s.to_string()),
        console_hint(&.arn, &.url)
    )]
    ConvergenceTimeout {
        target: WaitTarget,
        arn: String,
        url: String,
        last_status: Option<ServiceStatus>,
        waited: Duration,
    },

    /// Update was accepted but the provider rolled it back
    #[error(
        "update of {arn} was rolled back: submitted fingerprint {expected}, service reports {}",
        .observed.as_deref().unwrap_or("none")
    )]
    RolledBack {
        arn: String,
        expected: String,
        observed: Option<String>,
    },

    /// Provider call failed
    #[error("provider error: {0}")]
    Gateway(GatewayError),
}

impl From<GatewayError> for ConvergeError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::InvalidState(message) => ConvergeError::InvalidState(message),
            other => ConvergeError::Gateway(other),
        }
    }
}

/// Where an operator should look: the service URL, or the arn before one is assigned
fn console_hint(arn: &str, url: &str) -> String {
    if url.is_empty() {
        arn.to_string()
    } else {
        format!("https://{url}")
    }
}

impl ConvergeError {
    pub(crate) fn collaborator(collaborator: &'static str) -> impl FnOnce(CollaboratorError) -> Self {
        move |source| ConvergeError::Collaborator {
            collaborator,
            source,
        }
    }

    /// Classify the failure for the calling pipeline
    ///
    /// Waits for a create or update that did not confirm are `Unconfirmed`;
    /// everything else, including delete timeouts, is `Fatal`.
    #[must_use]
    pub fn outcome(&self) -> Outcome {
        match self {
            ConvergeError::ConvergenceTimeout {
                target: WaitTarget::Running,
                ..
            }
            | ConvergeError::ConvergenceFailed {
                target: WaitTarget::Running,
                ..
            } => Outcome::Unconfirmed,
            _ => Outcome::Fatal,
        }
    }

    /// Whether re-running later may succeed without operator action
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            ConvergeError::Busy { .. } => true,
            ConvergeError::Gateway(err) => err.is_retryable(),
            _ => false,
        }
    }
}
