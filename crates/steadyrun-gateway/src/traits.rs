//! Provider gateway trait

use std::collections::BTreeMap;

use async_trait::async_trait;
use steadyrun_api::{
    AutoScalingRevision, ScalingBounds, ScalingRevisionSummary, ServiceRecord, ServiceSummary,
};

use crate::error::GatewayError;
use crate::request::{CreateServiceRequest, ServiceUpdate};

/// Request/response access to the provider's service and autoscaling APIs
///
/// List operations drain every page before returning. Describe operations
/// return `None` instead of `NotFound`; delete operations treat `NotFound`
/// as success.
#[async_trait]
pub trait ServiceGateway: Send + Sync {
    async fn list_services(&self) -> Result<Vec<ServiceSummary>, GatewayError>;

    async fn describe_service(&self, arn: &str) -> Result<Option<ServiceRecord>, GatewayError>;

    async fn create_service(
        &self,
        request: &CreateServiceRequest,
    ) -> Result<ServiceRecord, GatewayError>;

    async fn update_service(&self, arn: &str, update: &ServiceUpdate) -> Result<(), GatewayError>;

    async fn delete_service(&self, arn: &str) -> Result<(), GatewayError>;

    async fn tag_resource(
        &self,
        arn: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<(), GatewayError>;

    async fn list_scaling_configs(
        &self,
        name: &str,
    ) -> Result<Vec<ScalingRevisionSummary>, GatewayError>;

    async fn describe_scaling_config(
        &self,
        arn: &str,
    ) -> Result<Option<AutoScalingRevision>, GatewayError>;

    async fn create_scaling_config(
        &self,
        name: &str,
        bounds: &ScalingBounds,
        labels: &BTreeMap<String, String>,
    ) -> Result<AutoScalingRevision, GatewayError>;

    async fn delete_scaling_config(&self, arn: &str) -> Result<(), GatewayError>;

    /// Short name for logs
    fn gateway_type(&self) -> &'static str;
}
