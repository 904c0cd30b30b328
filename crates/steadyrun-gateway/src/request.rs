//! Mutation request types

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use steadyrun_api::{HealthCheck, InstanceSizing, SourceConfig};

/// Everything needed to create a service in one call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateServiceRequest {
    pub name: String,
    pub source: SourceConfig,
    /// Role the provider uses to pull the image
    pub access_role_arn: Option<String>,
    pub auto_deployments: bool,
    pub health_check: HealthCheck,
    pub instance: InstanceSizing,
    pub instance_role_arn: Option<String>,
    pub scaling_config_arn: String,
    pub publicly_accessible: bool,
    pub tags: BTreeMap<String, String>,
}

/// Combined update for an existing service
///
/// The source section is always sent; the remaining sections are present
/// only when their configuration changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceUpdate {
    pub source: SourceConfig,
    pub access_role_arn: Option<String>,
    pub scaling_config_arn: Option<String>,
    pub health_check: Option<HealthCheck>,
    pub instance: Option<InstanceSizing>,
    pub instance_role_arn: Option<String>,
}
