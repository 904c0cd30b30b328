//! Observed remote service state

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Provider-owned lifecycle status of a service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceStatus {
    Creating,
    Running,
    OperationInProgress,
    CreateFailed,
    UpdateFailed,
    Deleting,
    Deleted,
    DeleteFailed,
    Paused,
    /// Any status this engine does not recognise
    #[serde(other)]
    Unknown,
}

impl ServiceStatus {
    /// Whether the provider is still working towards a new state
    #[must_use]
    pub fn is_in_progress(self) -> bool {
        matches!(
            self,
            ServiceStatus::Creating | ServiceStatus::OperationInProgress | ServiceStatus::Deleting
        )
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceStatus::Creating => "CREATING",
            ServiceStatus::Running => "RUNNING",
            ServiceStatus::OperationInProgress => "OPERATION_IN_PROGRESS",
            ServiceStatus::CreateFailed => "CREATE_FAILED",
            ServiceStatus::UpdateFailed => "UPDATE_FAILED",
            ServiceStatus::Deleting => "DELETING",
            ServiceStatus::Deleted => "DELETED",
            ServiceStatus::DeleteFailed => "DELETE_FAILED",
            ServiceStatus::Paused => "PAUSED",
            ServiceStatus::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Health check parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    /// HTTP path probed by the provider
    #[serde(default = "default_health_path")]
    pub path: String,
    /// Seconds between probes
    #[serde(default = "default_interval")]
    pub interval: u32,
    /// Seconds before a probe counts as failed
    #[serde(default = "default_timeout")]
    pub timeout: u32,
    /// Consecutive successes before healthy
    #[serde(default = "default_healthy_threshold")]
    pub healthy_threshold: u32,
    /// Consecutive failures before unhealthy
    #[serde(default = "default_unhealthy_threshold")]
    pub unhealthy_threshold: u32,
}

fn default_health_path() -> String {
    "/".to_string()
}

fn default_interval() -> u32 {
    5
}

fn default_timeout() -> u32 {
    2
}

fn default_healthy_threshold() -> u32 {
    1
}

fn default_unhealthy_threshold() -> u32 {
    5
}

impl Default for HealthCheck {
    fn default() -> Self {
        Self {
            path: default_health_path(),
            interval: default_interval(),
            timeout: default_timeout(),
            healthy_threshold: default_healthy_threshold(),
            unhealthy_threshold: default_unhealthy_threshold(),
        }
    }
}

/// Instance sizing as opaque provider tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSizing {
    /// CPU token (e.g. `1024` or `1 vCPU`)
    pub cpu: String,
    /// Memory token (e.g. `2048` or `2 GB`)
    pub memory: String,
}

impl Default for InstanceSizing {
    fn default() -> Self {
        Self {
            cpu: "1024".to_string(),
            memory: "2048".to_string(),
        }
    }
}

/// Image source section of a service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Full image identifier (`<registry>/<repo>:<tag>`)
    pub image_identifier: String,
    /// Container port the service listens on
    pub port: Option<u16>,
    /// Secret bindings: variable name -> secret reference
    #[serde(default)]
    pub secrets: BTreeMap<String, String>,
    /// Plain environment variables
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

/// Full observed state of a remote service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub arn: String,
    pub name: String,
    /// Public URL assigned by the provider (host name, no scheme)
    pub url: String,
    pub status: ServiceStatus,
    pub source: SourceConfig,
    /// Autoscaling revision currently associated with the service
    pub scaling_config_arn: Option<String>,
    pub health_check: Option<HealthCheck>,
    pub instance: InstanceSizing,
    pub instance_role_arn: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl ServiceRecord {
    /// Project to the summary shape returned by list operations
    #[must_use]
    pub fn summary(&self) -> ServiceSummary {
        ServiceSummary {
            arn: self.arn.clone(),
            name: self.name.clone(),
            url: self.url.clone(),
            status: self.status,
        }
    }
}

/// List-operation projection of a service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSummary {
    pub arn: String,
    pub name: String,
    pub url: String,
    pub status: ServiceStatus,
}
