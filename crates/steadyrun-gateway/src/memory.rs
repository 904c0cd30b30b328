//! In-memory provider simulation
//!
//! Behaves like the remote provider closely enough to drive full
//! convergence flows in tests: services move through scripted statuses on
//! each describe, autoscaling revisions are numbered per name and count
//! against a quota, list operations are paginated, and every call is
//! journaled so tests can assert which mutations happened.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use steadyrun_api::{
    AutoScalingRevision, RevisionStatus, ScalingBounds, ScalingRevisionSummary, ServiceRecord,
    ServiceStatus, ServiceSummary,
};
use tracing::debug;

use crate::error::GatewayError;
use crate::pagination::{Page, drain};
use crate::request::{CreateServiceRequest, ServiceUpdate};
use crate::traits::ServiceGateway;

/// Default number of active revisions allowed per autoscaling name
const DEFAULT_REVISION_QUOTA: usize = 5;

/// Default page size for list operations
const DEFAULT_PAGE_SIZE: usize = 2;

/// Gateway operation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListServices,
    DescribeService,
    CreateService,
    UpdateService,
    DeleteService,
    TagResource,
    ListScalingConfigs,
    DescribeScalingConfig,
    CreateScalingConfig,
    DeleteScalingConfig,
}

impl Operation {
    /// Whether the operation changes remote state
    #[must_use]
    pub fn is_mutating(self) -> bool {
        matches!(
            self,
            Operation::CreateService
                | Operation::UpdateService
                | Operation::DeleteService
                | Operation::TagResource
                | Operation::CreateScalingConfig
                | Operation::DeleteScalingConfig
        )
    }
}

/// One journaled gateway call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayCall {
    pub operation: Operation,
    /// Arn or name the call addressed (empty for list-all calls)
    pub target: String,
}

/// What one describe observes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Service reports this status
    Status(ServiceStatus),
    /// Service no longer exists
    Gone,
}

struct SimService {
    record: ServiceRecord,
    /// Remaining describe steps; the last one repeats forever
    script: VecDeque<Step>,
}

struct State {
    services: BTreeMap<String, SimService>,
    revisions: BTreeMap<String, AutoScalingRevision>,
    calls: Vec<GatewayCall>,
    updates: Vec<(String, ServiceUpdate)>,
    create_script: Option<Vec<Step>>,
    update_script: Option<Vec<Step>>,
    delete_script: Option<Vec<Step>>,
    revert_next_update: bool,
    failures: HashMap<Operation, GatewayError>,
    revision_quota: usize,
    page_size: usize,
    next_id: u64,
}

/// Provider simulation implementing `ServiceGateway`
pub struct MemoryGateway {
    state: Mutex<State>,
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGateway {
    /// Create an empty provider
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                services: BTreeMap::new(),
                revisions: BTreeMap::new(),
                calls: Vec::new(),
                updates: Vec::new(),
                create_script: None,
                update_script: None,
                delete_script: None,
                revert_next_update: false,
                failures: HashMap::new(),
                revision_quota: DEFAULT_REVISION_QUOTA,
                page_size: DEFAULT_PAGE_SIZE,
                next_id: 1,
            }),
        }
    }

    /// Set the per-name active revision quota
    #[must_use]
    pub fn with_revision_quota(self, quota: usize) -> Self {
        self.state().revision_quota = quota;
        self
    }

    /// Set the list page size
    #[must_use]
    pub fn with_page_size(self, page_size: usize) -> Self {
        self.state().page_size = page_size.max(1);
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed an existing service
    pub fn insert_service(&self, record: ServiceRecord) {
        let mut state = self.state();
        if let Some(arn) = &record.scaling_config_arn
            && let Some(rev) = state.revisions.get_mut(arn)
        {
            rev.has_associated_service = true;
        }
        state.services.insert(
            record.arn.clone(),
            SimService {
                script: VecDeque::new(),
                record,
            },
        );
    }

    /// Seed an existing autoscaling revision
    pub fn insert_revision(&self, revision: AutoScalingRevision) {
        self.state().revisions.insert(revision.arn.clone(), revision);
    }

    /// Script the statuses observed by describes of an existing service
    pub fn script(&self, arn: &str, steps: Vec<Step>) {
        if let Some(svc) = self.state().services.get_mut(arn) {
            svc.script = steps.into();
        }
    }

    /// Script the statuses following the next create
    pub fn script_next_create(&self, steps: Vec<Step>) {
        self.state().create_script = Some(steps);
    }

    /// Script the statuses following the next update
    pub fn script_next_update(&self, steps: Vec<Step>) {
        self.state().update_script = Some(steps);
    }

    /// Script the statuses following the next delete
    pub fn script_next_delete(&self, steps: Vec<Step>) {
        self.state().delete_script = Some(steps);
    }

    /// Accept the next update but keep the previous configuration, as a
    /// provider-side rollback would
    pub fn revert_next_update(&self) {
        self.state().revert_next_update = true;
    }

    /// Fail the next call of the given operation
    pub fn fail_next(&self, operation: Operation, error: GatewayError) {
        self.state().failures.insert(operation, error);
    }

    /// All calls made so far
    #[must_use]
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.state().calls.clone()
    }

    /// Calls that changed remote state
    #[must_use]
    pub fn mutating_calls(&self) -> Vec<GatewayCall> {
        self.state()
            .calls
            .iter()
            .filter(|c| c.operation.is_mutating())
            .cloned()
            .collect()
    }

    /// Operations called so far, in order
    #[must_use]
    pub fn operations(&self) -> Vec<Operation> {
        self.state().calls.iter().map(|c| c.operation).collect()
    }

    /// Updates submitted so far
    #[must_use]
    pub fn updates(&self) -> Vec<(String, ServiceUpdate)> {
        self.state().updates.clone()
    }

    /// Current record of a service, without consuming a scripted step
    #[must_use]
    pub fn service(&self, arn: &str) -> Option<ServiceRecord> {
        self.state().services.get(arn).map(|s| s.record.clone())
    }

    /// Services currently known, in arn order
    #[must_use]
    pub fn services(&self) -> Vec<ServiceRecord> {
        self.state()
            .services
            .values()
            .map(|s| s.record.clone())
            .collect()
    }

    /// Current state of a revision
    #[must_use]
    pub fn revision(&self, arn: &str) -> Option<AutoScalingRevision> {
        self.state().revisions.get(arn).cloned()
    }

    /// All revisions with the given name
    #[must_use]
    pub fn revisions_named(&self, name: &str) -> Vec<AutoScalingRevision> {
        self.state()
            .revisions
            .values()
            .filter(|r| r.name == name)
            .cloned()
            .collect()
    }

    /// Journal a call and return an injected failure, if any
    fn enter(&self, operation: Operation, target: &str) -> Result<MutexGuard<'_, State>, GatewayError> {
        let mut state = self.state();
        state.calls.push(GatewayCall {
            operation,
            target: target.to_string(),
        });
        debug!(?operation, target, "memory gateway call");
        match state.failures.remove(&operation) {
            Some(err) => Err(err),
            None => Ok(state),
        }
    }

    fn service_page(&self, token: Option<String>) -> Result<Page<ServiceSummary>, GatewayError> {
        let state = self.state();
        let all: Vec<ServiceSummary> = state
            .services
            .values()
            .map(|s| s.record.summary())
            .collect();
        Ok(slice_page(all, token, state.page_size))
    }

    fn revision_page(
        &self,
        name: &str,
        token: Option<String>,
    ) -> Result<Page<ScalingRevisionSummary>, GatewayError> {
        let state = self.state();
        let all: Vec<ScalingRevisionSummary> = state
            .revisions
            .values()
            .filter(|r| r.name == name)
            .map(AutoScalingRevision::summary)
            .collect();
        Ok(slice_page(all, token, state.page_size))
    }
}

fn slice_page<T>(all: Vec<T>, token: Option<String>, page_size: usize) -> Page<T> {
    let start: usize = token.and_then(|t| t.parse().ok()).unwrap_or(0);
    let end = (start + page_size).min(all.len());
    let next_token = (end < all.len()).then(|| end.to_string());
    let items = all.into_iter().skip(start).take(end.saturating_sub(start)).collect();
    Page::new(items, next_token)
}

fn set_association(state: &mut State, arn: Option<&String>, associated: bool) {
    if let Some(arn) = arn
        && let Some(rev) = state.revisions.get_mut(arn)
    {
        rev.has_associated_service = associated;
    }
}

#[async_trait]
impl ServiceGateway for MemoryGateway {
    async fn list_services(&self) -> Result<Vec<ServiceSummary>, GatewayError> {
        drop(self.enter(Operation::ListServices, "")?);
        drain(|token| std::future::ready(self.service_page(token))).await
    }

    async fn describe_service(&self, arn: &str) -> Result<Option<ServiceRecord>, GatewayError> {
        let mut state = self.enter(Operation::DescribeService, arn)?;

        let Some(svc) = state.services.get_mut(arn) else {
            return Ok(None);
        };

        let step = if svc.script.len() > 1 {
            svc.script.pop_front()
        } else {
            svc.script.front().copied()
        };

        match step {
            Some(Step::Gone) => {
                let removed = state.services.remove(arn);
                set_association(
                    &mut state,
                    removed.as_ref().and_then(|s| s.record.scaling_config_arn.as_ref()),
                    false,
                );
                Ok(None)
            }
            Some(Step::Status(status)) => {
                svc.record.status = status;
                Ok(Some(svc.record.clone()))
            }
            None => Ok(Some(svc.record.clone())),
        }
    }

    async fn create_service(
        &self,
        request: &CreateServiceRequest,
    ) -> Result<ServiceRecord, GatewayError> {
        let mut state = self.enter(Operation::CreateService, &request.name)?;

        if !state.revisions.contains_key(&request.scaling_config_arn) {
            return Err(GatewayError::Permanent(format!(
                "unknown autoscaling configuration {}",
                request.scaling_config_arn
            )));
        }

        let id = state.next_id;
        state.next_id += 1;

        let record = ServiceRecord {
            arn: format!("arn:memory:service/{}/{id}", request.name),
            name: request.name.clone(),
            url: format!("{}-{id}.memory.local", request.name),
            status: ServiceStatus::Creating,
            source: request.source.clone(),
            scaling_config_arn: Some(request.scaling_config_arn.clone()),
            health_check: Some(request.health_check.clone()),
            instance: request.instance.clone(),
            instance_role_arn: request.instance_role_arn.clone(),
            tags: request.tags.clone(),
        };

        let script = state.create_script.take().unwrap_or_else(|| {
            vec![
                Step::Status(ServiceStatus::Creating),
                Step::Status(ServiceStatus::Running),
            ]
        });

        set_association(&mut state, record.scaling_config_arn.as_ref(), true);
        state.services.insert(
            record.arn.clone(),
            SimService {
                record: record.clone(),
                script: script.into(),
            },
        );

        Ok(record)
    }

    async fn update_service(&self, arn: &str, update: &ServiceUpdate) -> Result<(), GatewayError> {
        let mut state = self.enter(Operation::UpdateService, arn)?;

        let Some(current) = state.services.get(arn).map(|s| s.record.clone()) else {
            return Err(GatewayError::NotFound(arn.to_string()));
        };
        if current.status.is_in_progress() {
            return Err(GatewayError::InvalidState(format!(
                "Service {arn} is in {} state",
                current.status
            )));
        }

        state.updates.push((arn.to_string(), update.clone()));

        let revert = std::mem::take(&mut state.revert_next_update);
        let script = state.update_script.take().unwrap_or_else(|| {
            vec![
                Step::Status(ServiceStatus::OperationInProgress),
                Step::Status(ServiceStatus::Running),
            ]
        });

        let mut next = current.clone();
        next.status = ServiceStatus::OperationInProgress;
        if !revert {
            next.source = update.source.clone();
            if let Some(arn) = &update.scaling_config_arn {
                next.scaling_config_arn = Some(arn.clone());
            }
            if let Some(hc) = &update.health_check {
                next.health_check = Some(hc.clone());
            }
            if let Some(sizing) = &update.instance {
                next.instance = sizing.clone();
                next.instance_role_arn.clone_from(&update.instance_role_arn);
            }
            if next.scaling_config_arn != current.scaling_config_arn {
                set_association(&mut state, current.scaling_config_arn.as_ref(), false);
                set_association(&mut state, next.scaling_config_arn.as_ref(), true);
            }
        }

        if let Some(svc) = state.services.get_mut(arn) {
            svc.record = next;
            svc.script = script.into();
        }

        Ok(())
    }

    async fn delete_service(&self, arn: &str) -> Result<(), GatewayError> {
        let mut state = self.enter(Operation::DeleteService, arn)?;

        let script = state
            .delete_script
            .take()
            .unwrap_or_else(|| vec![Step::Status(ServiceStatus::Deleting), Step::Gone]);

        if let Some(svc) = state.services.get_mut(arn) {
            svc.record.status = ServiceStatus::OperationInProgress;
            svc.script = script.into();
        }

        Ok(())
    }

    async fn tag_resource(
        &self,
        arn: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<(), GatewayError> {
        let mut state = self.enter(Operation::TagResource, arn)?;

        match state.services.get_mut(arn) {
            Some(svc) => {
                svc.record
                    .tags
                    .extend(labels.iter().map(|(k, v)| (k.clone(), v.clone())));
                Ok(())
            }
            None => Err(GatewayError::NotFound(arn.to_string())),
        }
    }

    async fn list_scaling_configs(
        &self,
        name: &str,
    ) -> Result<Vec<ScalingRevisionSummary>, GatewayError> {
        drop(self.enter(Operation::ListScalingConfigs, name)?);
        drain(|token| std::future::ready(self.revision_page(name, token))).await
    }

    async fn describe_scaling_config(
        &self,
        arn: &str,
    ) -> Result<Option<AutoScalingRevision>, GatewayError> {
        let state = self.enter(Operation::DescribeScalingConfig, arn)?;
        Ok(state.revisions.get(arn).cloned())
    }

    async fn create_scaling_config(
        &self,
        name: &str,
        bounds: &ScalingBounds,
        _labels: &BTreeMap<String, String>,
    ) -> Result<AutoScalingRevision, GatewayError> {
        let mut state = self.enter(Operation::CreateScalingConfig, name)?;

        let same_name: Vec<&AutoScalingRevision> =
            state.revisions.values().filter(|r| r.name == name).collect();
        let active = same_name
            .iter()
            .filter(|r| r.status == RevisionStatus::Active)
            .count();
        if active >= state.revision_quota {
            return Err(GatewayError::Permanent(format!(
                "ServiceQuotaExceededException: {name} already has {active} active revisions"
            )));
        }
        let revision = same_name.iter().map(|r| r.revision).max().unwrap_or(0) + 1;

        let created = AutoScalingRevision {
            arn: format!("arn:memory:autoscalingconfiguration/{name}/{revision}"),
            name: name.to_string(),
            revision,
            bounds: *bounds,
            status: RevisionStatus::Active,
            has_associated_service: false,
        };
        state.revisions.insert(created.arn.clone(), created.clone());

        Ok(created)
    }

    async fn delete_scaling_config(&self, arn: &str) -> Result<(), GatewayError> {
        let mut state = self.enter(Operation::DeleteScalingConfig, arn)?;

        match state.revisions.get_mut(arn) {
            Some(rev) if rev.has_associated_service => Err(GatewayError::InvalidState(format!(
                "autoscaling configuration {arn} is associated with a service"
            ))),
            Some(rev) => {
                rev.status = RevisionStatus::Inactive;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn gateway_type(&self) -> &'static str {
        "memory"
    }
}
