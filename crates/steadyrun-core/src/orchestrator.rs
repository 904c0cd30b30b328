//! Convergence orchestrator
//!
//! One run discovers the service for an identity and then follows exactly
//! one flow:
//!
//! - absent (DELETED entries are ignored): create
//! - CREATE_FAILED: delete, wait, then create
//! - OPERATION_IN_PROGRESS: refuse (`Busy`)
//! - anything else: update
//!
//! No state is kept between runs; every run rediscovers the provider.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use steadyrun_api::{
    ConvergeAction, ConvergeReport, DesiredSpec, ServiceIdentity, ServiceRecord, ServiceStatus,
    ServiceSummary,
};
use steadyrun_gateway::{CreateServiceRequest, ServiceGateway, ServiceUpdate};
use tracing::{debug, info, instrument, warn};

use crate::collab::Collaborators;
use crate::config::ConvergeConfig;
use crate::error::ConvergeError;
use crate::plan::{DesiredState, ObservedState, UpdatePlan, compute};
use crate::scaling::ScalingLifecycle;
use crate::waiter::{Clock, PollingWaiter, TokioClock, WaitOutcome, WaitTarget};

/// What `converge` would do, computed without mutating anything
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Preview {
    Create,
    /// Failed service would be deleted and created again
    Recreate { arn: String },
    Update { arn: String, plan: UpdatePlan },
}

/// Drives services to their desired state through a `ServiceGateway`
pub struct ConvergenceOrchestrator {
    gateway: Arc<dyn ServiceGateway>,
    collaborators: Collaborators,
    waiter: PollingWaiter,
    scaling: ScalingLifecycle,
    config: ConvergeConfig,
}

impl ConvergenceOrchestrator {
    pub fn new(
        gateway: Arc<dyn ServiceGateway>,
        collaborators: Collaborators,
        config: ConvergeConfig,
    ) -> Self {
        Self {
            waiter: PollingWaiter::new(gateway.clone(), Arc::new(TokioClock)),
            scaling: ScalingLifecycle::new(gateway.clone()),
            gateway,
            collaborators,
            config,
        }
    }

    /// Replace the clock used while waiting
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.waiter = PollingWaiter::new(self.gateway.clone(), clock);
        self
    }

    /// Bring the service for `identity` to `desired`
    ///
    /// # Errors
    /// Returns a `ConvergeError`; see `ConvergeError::outcome` for how each
    /// failure should be treated.
    #[instrument(skip(self, desired), fields(identity = %identity))]
    pub async fn converge(
        &self,
        identity: &ServiceIdentity,
        desired: &DesiredSpec,
    ) -> Result<ConvergeReport, ConvergeError> {
        desired.validate()?;

        let existing = match self.discover(identity).await? {
            Some(summary) if summary.status == ServiceStatus::OperationInProgress => {
                return Err(busy(summary));
            }
            Some(summary) if summary.status == ServiceStatus::CreateFailed => {
                warn!(arn = %summary.arn, "service failed to create, replacing it");
                self.delete_flow(&summary).await?;
                None
            }
            other => other,
        };

        match existing {
            None => self.create_flow(identity, desired).await,
            Some(summary) => self.update_flow(identity, desired, &summary).await,
        }
    }

    /// Delete the service for `identity`, if any
    ///
    /// # Errors
    /// Returns `Ambiguous`/`Busy` from discovery, gateway failures, and a
    /// fatal `ConvergenceTimeout` when the service outlives the wait bound.
    #[instrument(skip(self), fields(identity = %identity))]
    pub async fn destroy(&self, identity: &ServiceIdentity) -> Result<ConvergeReport, ConvergeError> {
        match self.discover(identity).await? {
            None => {
                info!("no service to delete");
                Ok(ConvergeReport::new(ConvergeAction::Absent, identity.clone()))
            }
            Some(summary) if summary.status == ServiceStatus::OperationInProgress => {
                Err(busy(summary))
            }
            Some(summary) => {
                self.delete_flow(&summary).await?;
                Ok(ConvergeReport::new(ConvergeAction::Deleted, identity.clone()).with_service(summary))
            }
        }
    }

    /// Compute what `converge` would do without any mutating call
    ///
    /// # Errors
    /// Same discovery errors as `converge`, plus collaborator failures.
    #[instrument(skip(self, desired), fields(identity = %identity))]
    pub async fn preview(
        &self,
        identity: &ServiceIdentity,
        desired: &DesiredSpec,
    ) -> Result<Preview, ConvergeError> {
        desired.validate()?;

        let summary = match self.discover(identity).await? {
            None => return Ok(Preview::Create),
            Some(summary) => summary,
        };
        match summary.status {
            ServiceStatus::OperationInProgress => return Err(busy(summary)),
            ServiceStatus::CreateFailed => return Ok(Preview::Recreate { arn: summary.arn }),
            _ => {}
        }

        let Some(current) = self.gateway.describe_service(&summary.arn).await? else {
            return Ok(Preview::Create);
        };
        let (_, plan) = self.plan_against(identity, desired, &current).await?;
        Ok(Preview::Update {
            arn: current.arn,
            plan,
        })
    }

    // ========================================================================
    // Discovery
    // ========================================================================

    async fn discover(
        &self,
        identity: &ServiceIdentity,
    ) -> Result<Option<ServiceSummary>, ConvergeError> {
        let name = identity.service_name();
        let (tombstones, mut matches): (Vec<ServiceSummary>, Vec<ServiceSummary>) = self
            .gateway
            .list_services()
            .await?
            .into_iter()
            .filter(|s| s.name == name)
            .partition(|s| s.status == ServiceStatus::Deleted);
        for summary in &tombstones {
            debug!(service = %name, arn = %summary.arn, "ignoring deleted service");
        }

        match matches.len() {
            0 => {
                info!(service = %name, "no existing service");
                Ok(None)
            }
            1 => {
                let summary = matches.remove(0);
                info!(service = %name, arn = %summary.arn, status = %summary.status, "discovered service");
                Ok(Some(summary))
            }
            count => Err(ConvergeError::Ambiguous {
                name,
                count,
                arns: matches.into_iter().map(|s| s.arn).collect(),
            }),
        }
    }

    // ========================================================================
    // Flows
    // ========================================================================

    async fn create_flow(
        &self,
        identity: &ServiceIdentity,
        desired: &DesiredSpec,
    ) -> Result<ConvergeReport, ConvergeError> {
        let scaling_name = identity.scaling_config_name();
        let labels = self.labels(identity);

        self.scaling.reclaim_unused(&scaling_name).await?;
        let scaling_config_arn = self
            .scaling
            .create_revision(&scaling_name, &desired.scaling, &labels)
            .await?;
        let target = self.resolve(identity, desired).await?;

        let request = CreateServiceRequest {
            name: identity.service_name(),
            source: target.source(BTreeMap::new()),
            access_role_arn: desired.access_role_arn.clone(),
            auto_deployments: self.config.auto_deployments,
            health_check: target.health_check.clone(),
            instance: target.instance.clone(),
            instance_role_arn: desired.instance_role_arn.clone(),
            scaling_config_arn,
            publicly_accessible: self.config.publicly_accessible,
            tags: labels,
        };
        let created = self.gateway.create_service(&request).await?;
        info!(arn = %created.arn, url = %created.url, image = %target.image, "service create submitted");

        self.publish_url(&created.url).await?;
        let record = self.await_running(&created.arn, &created.url).await?;

        Ok(ConvergeReport::new(ConvergeAction::Created, identity.clone()).with_service(record.summary()))
    }

    async fn update_flow(
        &self,
        identity: &ServiceIdentity,
        desired: &DesiredSpec,
        summary: &ServiceSummary,
    ) -> Result<ConvergeReport, ConvergeError> {
        let Some(current) = self.gateway.describe_service(&summary.arn).await? else {
            info!(arn = %summary.arn, "service vanished after discovery, creating it");
            return self.create_flow(identity, desired).await;
        };

        let scaling_name = identity.scaling_config_name();
        self.scaling.reclaim_unused(&scaling_name).await?;

        let (target, plan) = self.plan_against(identity, desired, &current).await?;
        let labels = self.labels(identity);
        self.publish_url(&current.url).await?;

        if plan.is_empty() {
            info!(arn = %current.arn, "service already converged");
            self.gateway.tag_resource(&current.arn, &labels).await?;
            return Ok(ConvergeReport::new(ConvergeAction::Unchanged, identity.clone())
                .with_service(current.summary()));
        }

        let changes = plan.categories();
        info!(arn = %current.arn, ?changes, "applying update");

        let scaling_config_arn = match &plan.autoscaling {
            Some(bounds) => Some(
                self.scaling
                    .create_revision(&scaling_name, bounds, &labels)
                    .await?,
            ),
            None => None,
        };

        let fingerprint = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let variables = BTreeMap::from([(self.config.fingerprint_key.clone(), fingerprint.clone())]);
        let update = ServiceUpdate {
            source: target.source(variables),
            access_role_arn: desired.access_role_arn.clone(),
            scaling_config_arn,
            health_check: plan.health_check.clone(),
            instance: plan.instance.clone(),
            instance_role_arn: desired.instance_role_arn.clone(),
        };
        self.gateway.update_service(&current.arn, &update).await?;
        self.gateway.tag_resource(&current.arn, &labels).await?;
        info!(arn = %current.arn, %fingerprint, "service update submitted");

        let record = self.await_running(&current.arn, &current.url).await?;
        let observed = record.source.variables.get(&self.config.fingerprint_key);
        if observed != Some(&fingerprint) {
            return Err(ConvergeError::RolledBack {
                arn: record.arn,
                expected: fingerprint,
                observed: observed.cloned(),
            });
        }

        Ok(ConvergeReport::new(ConvergeAction::Updated, identity.clone())
            .with_service(record.summary())
            .with_changes(changes))
    }

    async fn delete_flow(&self, summary: &ServiceSummary) -> Result<(), ConvergeError> {
        self.gateway.delete_service(&summary.arn).await?;
        info!(arn = %summary.arn, "service delete submitted");

        match self
            .waiter
            .wait_for(&summary.arn, WaitTarget::Deleted, self.config.deleted_timeout)
            .await?
        {
            WaitOutcome::Reached(_) => Ok(()),
            WaitOutcome::TimedOut { last, waited } => Err(ConvergeError::ConvergenceTimeout {
                target: WaitTarget::Deleted,
                arn: summary.arn.clone(),
                url: summary.url.clone(),
                last_status: last.map(|r| r.status),
                waited,
            }),
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Resolve collaborators and diff against the live record (read-only)
    async fn plan_against(
        &self,
        identity: &ServiceIdentity,
        desired: &DesiredSpec,
        current: &ServiceRecord,
    ) -> Result<(DesiredState, UpdatePlan), ConvergeError> {
        let revision = match &current.scaling_config_arn {
            Some(arn) => self.scaling.describe(arn).await?,
            None => None,
        };
        let target = self.resolve(identity, desired).await?;
        let plan = compute(
            &ObservedState {
                service: current,
                scaling: revision.as_ref().map(|r| &r.bounds),
            },
            &target,
        );
        Ok((target, plan))
    }

    async fn resolve(
        &self,
        identity: &ServiceIdentity,
        desired: &DesiredSpec,
    ) -> Result<DesiredState, ConvergeError> {
        let registry_url = self
            .collaborators
            .registry
            .resolve(&identity.region, &desired.repository)
            .await
            .map_err(ConvergeError::collaborator("image registry"))?;
        let bindings = self
            .collaborators
            .config_store
            .get(&identity.region, &identity.deployment)
            .await
            .map_err(ConvergeError::collaborator("config store"))?;
        Ok(DesiredState::resolve(desired, &registry_url, bindings))
    }

    fn labels(&self, identity: &ServiceIdentity) -> BTreeMap<String, String> {
        let extra = BTreeMap::from([("component".to_string(), identity.component.clone())]);
        self.collaborators
            .tag_policy
            .labels_for(&identity.region, &identity.deployment, &extra)
    }

    async fn publish_url(&self, url: &str) -> Result<(), ConvergeError> {
        self.collaborators
            .url_sink
            .publish(url)
            .await
            .map_err(ConvergeError::collaborator("url sink"))
    }

    async fn await_running(&self, arn: &str, url: &str) -> Result<ServiceRecord, ConvergeError> {
        let outcome = self
            .waiter
            .wait_for(arn, WaitTarget::Running, self.config.running_timeout)
            .await?;

        match outcome {
            WaitOutcome::Reached(Some(record)) => Ok(record),
            WaitOutcome::Reached(None) => Err(ConvergeError::ConvergenceFailed {
                target: WaitTarget::Running,
                arn: arn.to_string(),
                url: url.to_string(),
                status: None,
            }),
            WaitOutcome::TimedOut { last, waited } => Err(ConvergeError::ConvergenceTimeout {
                target: WaitTarget::Running,
                arn: arn.to_string(),
                url: last.as_ref().map_or_else(|| url.to_string(), |r| r.url.clone()),
                last_status: last.map(|r| r.status),
                waited,
            }),
        }
    }
}

fn busy(summary: ServiceSummary) -> ConvergeError {
    warn!(arn = %summary.arn, "service has an operation in progress");
    ConvergeError::Busy {
        name: summary.name,
        arn: summary.arn,
    }
}
