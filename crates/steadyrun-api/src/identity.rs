//! Service identity and the resource names derived from it

use std::fmt;

use serde::{Deserialize, Serialize};

/// Provider limit on service names
const SERVICE_NAME_MAX: usize = 40;

/// Provider limit on autoscaling configuration names
const SCALING_NAME_MAX: usize = 32;

/// Immutable key naming one logical service
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceIdentity {
    /// Provider region (e.g. `eu-west-1`)
    pub region: String,
    /// Deployment / environment name
    pub deployment: String,
    /// Component within the deployment
    pub component: String,
}

impl ServiceIdentity {
    /// Create a new identity
    pub fn new(
        region: impl Into<String>,
        deployment: impl Into<String>,
        component: impl Into<String>,
    ) -> Self {
        Self {
            region: region.into(),
            deployment: deployment.into(),
            component: component.into(),
        }
    }

    /// Name of the remote service for this identity
    #[must_use]
    pub fn service_name(&self) -> String {
        clamp(format!("{}-{}", self.deployment, self.component), SERVICE_NAME_MAX)
    }

    /// Name shared by every autoscaling revision of this identity
    #[must_use]
    pub fn scaling_config_name(&self) -> String {
        clamp(format!("{}-{}", self.deployment, self.component), SCALING_NAME_MAX)
    }
}

fn clamp(name: String, max: usize) -> String {
    if name.chars().count() <= max {
        name
    } else {
        name.chars().take(max).collect()
    }
}

impl fmt::Display for ServiceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.region, self.deployment, self.component)
    }
}
