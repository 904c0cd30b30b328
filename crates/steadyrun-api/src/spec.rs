//! Caller-supplied desired state

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::SpecError;
use crate::scaling::ScalingBounds;
use crate::service::{HealthCheck, InstanceSizing};

/// Target configuration for one service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredSpec {
    /// Image repository name, resolved to a registry URL by the `ImageRegistry`
    pub repository: String,
    /// Image tag to deploy
    pub image_tag: String,
    /// Container port
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub scaling: ScalingBounds,
    #[serde(default)]
    pub health_check: HealthCheck,
    #[serde(default)]
    pub instance: InstanceSizing,
    /// Role assumed by the running instances
    pub instance_role_arn: Option<String>,
    /// Role used by the provider to pull from a private registry
    pub access_role_arn: Option<String>,
    /// Binding keys excluded from both deployment and diffing
    #[serde(default)]
    pub ignore_config_keys: BTreeSet<String>,
}

fn default_port() -> u16 {
    8080
}

impl DesiredSpec {
    /// Create a spec with default sizing, scaling and health check
    pub fn new(repository: impl Into<String>, image_tag: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            image_tag: image_tag.into(),
            port: default_port(),
            scaling: ScalingBounds::default(),
            health_check: HealthCheck::default(),
            instance: InstanceSizing::default(),
            instance_role_arn: None,
            access_role_arn: None,
            ignore_config_keys: BTreeSet::new(),
        }
    }

    /// Set scaling bounds
    #[must_use]
    pub fn with_scaling(mut self, min_size: u32, max_size: u32, max_concurrency: u32) -> Self {
        self.scaling = ScalingBounds {
            min_size,
            max_size,
            max_concurrency,
        };
        self
    }

    /// Exclude a binding key from deployment and diffing
    #[must_use]
    pub fn ignoring(mut self, key: impl Into<String>) -> Self {
        self.ignore_config_keys.insert(key.into());
        self
    }

    /// Check internal consistency before any remote call is made
    ///
    /// # Errors
    /// Returns `SpecError` describing the first violated constraint.
    pub fn validate(&self) -> Result<(), SpecError> {
        if self.repository.trim().is_empty() {
            return Err(SpecError::MissingField("repository"));
        }
        if self.image_tag.trim().is_empty() {
            return Err(SpecError::MissingField("image_tag"));
        }
        if self.instance.cpu.trim().is_empty() {
            return Err(SpecError::MissingField("instance.cpu"));
        }
        if self.instance.memory.trim().is_empty() {
            return Err(SpecError::MissingField("instance.memory"));
        }

        let s = &self.scaling;
        if s.min_size == 0 {
            return Err(SpecError::InvalidScaling("min_size must be at least 1".into()));
        }
        if s.min_size > s.max_size {
            return Err(SpecError::InvalidScaling(format!(
                "min_size {} exceeds max_size {}",
                s.min_size, s.max_size
            )));
        }
        if s.max_concurrency == 0 {
            return Err(SpecError::InvalidScaling(
                "max_concurrency must be positive".into(),
            ));
        }

        let hc = &self.health_check;
        if hc.path.is_empty() {
            return Err(SpecError::InvalidHealthCheck("path is empty".into()));
        }
        for (field, value) in [
            ("interval", hc.interval),
            ("timeout", hc.timeout),
            ("healthy_threshold", hc.healthy_threshold),
            ("unhealthy_threshold", hc.unhealthy_threshold),
        ] {
            if value == 0 {
                return Err(SpecError::InvalidHealthCheck(format!(
                    "{field} must be positive"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(DesiredSpec::new("web", "v1").validate().is_ok());
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let spec = DesiredSpec::new("web", "v1").with_scaling(5, 2, 100);
        assert!(matches!(spec.validate(), Err(SpecError::InvalidScaling(_))));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let spec = DesiredSpec::new("web", "v1").with_scaling(1, 2, 0);
        assert!(matches!(spec.validate(), Err(SpecError::InvalidScaling(_))));
    }

    #[test]
    fn test_zero_health_threshold_rejected() {
        let mut spec = DesiredSpec::new("web", "v1");
        spec.health_check.unhealthy_threshold = 0;
        assert_eq!(
            spec.validate(),
            Err(SpecError::InvalidHealthCheck(
                "unhealthy_threshold must be positive".into()
            ))
        );
    }

    #[test]
    fn test_empty_tag_rejected() {
        let spec = DesiredSpec::new("web", " ");
        assert_eq!(spec.validate(), Err(SpecError::MissingField("image_tag")));
    }
}
