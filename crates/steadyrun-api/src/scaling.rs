//! Autoscaling configuration revisions

use serde::{Deserialize, Serialize};

/// Scaling limits carried by one revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingBounds {
    /// Minimum provisioned instances
    pub min_size: u32,
    /// Maximum instances
    pub max_size: u32,
    /// Concurrent requests per instance before scaling out
    pub max_concurrency: u32,
}

impl Default for ScalingBounds {
    fn default() -> Self {
        Self {
            min_size: 1,
            max_size: 25,
            max_concurrency: 100,
        }
    }
}

/// Revision lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RevisionStatus {
    Active,
    Inactive,
    #[serde(other)]
    Unknown,
}

/// Revision as returned by list operations (no bounds)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingRevisionSummary {
    pub arn: String,
    pub name: String,
    pub revision: u32,
    pub status: RevisionStatus,
    pub has_associated_service: bool,
}

impl ScalingRevisionSummary {
    /// Unused active revisions count against the per-name quota and can be deleted
    #[must_use]
    pub fn is_reclaimable(&self) -> bool {
        !self.has_associated_service && self.status == RevisionStatus::Active
    }
}

/// Full revision as returned by create/describe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoScalingRevision {
    pub arn: String,
    pub name: String,
    pub revision: u32,
    pub bounds: ScalingBounds,
    pub status: RevisionStatus,
    pub has_associated_service: bool,
}

impl AutoScalingRevision {
    #[must_use]
    pub fn summary(&self) -> ScalingRevisionSummary {
        ScalingRevisionSummary {
            arn: self.arn.clone(),
            name: self.name.clone(),
            revision: self.revision,
            status: self.status,
            has_associated_service: self.has_associated_service,
        }
    }
}
