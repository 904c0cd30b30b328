//! Diff planning
//!
//! Compares the live service against the resolved desired state, one
//! category at a time, and yields the minimal set of changes to submit.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use steadyrun_api::{
    ChangeCategory, DesiredSpec, HealthCheck, InstanceSizing, ScalingBounds, ServiceRecord,
    SourceConfig,
};

use crate::scaling::needs_new_revision;

/// Desired spec with the registry and bindings resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredState {
    /// Full image identifier, `<registry>:<tag>`
    pub image: String,
    pub port: u16,
    pub scaling: ScalingBounds,
    pub health_check: HealthCheck,
    pub instance: InstanceSizing,
    /// Secret bindings to deploy, ignored keys already removed
    pub secrets: BTreeMap<String, String>,
    pub ignore_keys: BTreeSet<String>,
}

impl DesiredState {
    /// Resolve a spec against a registry address and the stored bindings
    pub fn resolve(
        spec: &DesiredSpec,
        registry_url: &str,
        mut bindings: BTreeMap<String, String>,
    ) -> Self {
        bindings.retain(|key, _| !spec.ignore_config_keys.contains(key));
        Self {
            image: format!("{registry_url}:{}", spec.image_tag),
            port: spec.port,
            scaling: spec.scaling,
            health_check: spec.health_check.clone(),
            instance: spec.instance.clone(),
            secrets: bindings,
            ignore_keys: spec.ignore_config_keys.clone(),
        }
    }

    /// Source section carrying this state plus the given plain variables
    #[must_use]
    pub fn source(&self, variables: BTreeMap<String, String>) -> SourceConfig {
        SourceConfig {
            image_identifier: self.image.clone(),
            port: Some(self.port),
            secrets: self.secrets.clone(),
            variables,
        }
    }
}

/// Live state the plan is computed against
#[derive(Debug, Clone, Copy)]
pub struct ObservedState<'a> {
    pub service: &'a ServiceRecord,
    /// Bounds of the service's current autoscaling revision, if it resolved
    pub scaling: Option<&'a ScalingBounds>,
}

/// Changes needed to converge; each present category holds its target value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdatePlan {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autoscaling: Option<ScalingBounds>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check: Option<HealthCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<InstanceSizing>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<BTreeMap<String, String>>,
}

impl UpdatePlan {
    /// An empty plan means the service is converged
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.categories().is_empty()
    }

    #[must_use]
    pub fn categories(&self) -> Vec<ChangeCategory> {
        let mut categories = Vec::new();
        if self.autoscaling.is_some() {
            categories.push(ChangeCategory::Autoscaling);
        }
        if self.health_check.is_some() {
            categories.push(ChangeCategory::Healthcheck);
        }
        if self.instance.is_some() {
            categories.push(ChangeCategory::Instance);
        }
        if self.image.is_some() {
            categories.push(ChangeCategory::Image);
        }
        if self.variables.is_some() {
            categories.push(ChangeCategory::Variables);
        }
        categories
    }
}

/// Compute the minimal plan moving `observed` to `desired`
///
/// Secret bindings are compared by key only; tags never take part.
#[must_use]
pub fn compute(observed: &ObservedState<'_>, desired: &DesiredState) -> UpdatePlan {
    let service = observed.service;

    let autoscaling = needs_new_revision(observed.scaling, &desired.scaling)
        .then_some(desired.scaling);

    let health_check = (service.health_check.as_ref() != Some(&desired.health_check))
        .then(|| desired.health_check.clone());

    let instance = (service.instance.cpu != desired.instance.cpu
        || service.instance.memory != desired.instance.memory)
        .then(|| desired.instance.clone());

    let image = (service.source.image_identifier != desired.image).then(|| desired.image.clone());

    let current_keys = binding_keys(&service.source.secrets, &desired.ignore_keys);
    let desired_keys = binding_keys(&desired.secrets, &desired.ignore_keys);
    let variables = (current_keys.symmetric_difference(&desired_keys).next().is_some())
        .then(|| desired.secrets.clone());

    UpdatePlan {
        autoscaling,
        health_check,
        instance,
        image,
        variables,
    }
}

fn binding_keys<'a>(
    bindings: &'a BTreeMap<String, String>,
    ignore: &BTreeSet<String>,
) -> BTreeSet<&'a str> {
    bindings
        .keys()
        .filter(|key| !ignore.contains(*key))
        .map(String::as_str)
        .collect()
}
