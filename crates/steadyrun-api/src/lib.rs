//! steadyrun-api: Shared model types
//!
//! Contains the identity, observed-state, desired-state and report types
//! used across the gateway, the convergence core, and the CLI.

pub mod error;
pub mod identity;
pub mod report;
pub mod scaling;
pub mod service;
pub mod spec;

pub use error::SpecError;
pub use identity::ServiceIdentity;
pub use report::{ChangeCategory, ConvergeAction, ConvergeReport};
pub use scaling::{AutoScalingRevision, RevisionStatus, ScalingBounds, ScalingRevisionSummary};
pub use service::{
    HealthCheck, InstanceSizing, ServiceRecord, ServiceStatus, ServiceSummary, SourceConfig,
};
pub use spec::DesiredSpec;
