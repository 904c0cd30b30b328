//! Run report consumed by the calling pipeline

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::ServiceIdentity;
use crate::service::ServiceSummary;

/// Configuration area that can differ between observed and desired state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeCategory {
    Autoscaling,
    Healthcheck,
    Instance,
    Image,
    Variables,
}

impl fmt::Display for ChangeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeCategory::Autoscaling => write!(f, "autoscaling"),
            ChangeCategory::Healthcheck => write!(f, "healthcheck"),
            ChangeCategory::Instance => write!(f, "instance"),
            ChangeCategory::Image => write!(f, "image"),
            ChangeCategory::Variables => write!(f, "variables"),
        }
    }
}

/// What a successful run did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergeAction {
    Created,
    Updated,
    Unchanged,
    Deleted,
    /// Delete requested for an identity with no service
    Absent,
}

/// Result of one successful reconciliation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvergeReport {
    pub action: ConvergeAction,
    pub identity: ServiceIdentity,
    /// Final service state (absent after a delete)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceSummary>,
    /// Categories applied by an update
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<ChangeCategory>,
    pub finished_at: DateTime<Utc>,
}

impl ConvergeReport {
    /// Create a report stamped with the current time
    pub fn new(action: ConvergeAction, identity: ServiceIdentity) -> Self {
        Self {
            action,
            identity,
            service: None,
            changes: Vec::new(),
            finished_at: Utc::now(),
        }
    }

    /// Attach the final service state
    #[must_use]
    pub fn with_service(mut self, service: ServiceSummary) -> Self {
        self.service = Some(service);
        self
    }

    /// Attach applied categories
    #[must_use]
    pub fn with_changes(mut self, changes: Vec<ChangeCategory>) -> Self {
        self.changes = changes;
        self
    }
}
