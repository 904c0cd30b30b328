//! steadyrun-core: Convergence engine
//!
//! Drives one managed service to its desired state: discovers the live
//! service, plans the minimal update, manages autoscaling revisions, and
//! waits for the provider to settle.

pub mod collab;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod plan;
pub mod scaling;
pub mod waiter;

pub use collab::{Collaborators, CollaboratorError, ConfigStore, ImageRegistry, TagPolicy, UrlSink};
pub use config::ConvergeConfig;
pub use error::{ConvergeError, Outcome};
pub use orchestrator::{ConvergenceOrchestrator, Preview};
pub use plan::{DesiredState, ObservedState, UpdatePlan, compute};
pub use scaling::{ScalingLifecycle, needs_new_revision};
pub use waiter::{Clock, DelaySchedule, ManualClock, PollingWaiter, TokioClock, WaitOutcome, WaitTarget};
