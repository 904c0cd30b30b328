//! JSON shapes of the provider's RPC protocol
//!
//! Field names follow the provider's PascalCase convention. Conversions to
//! and from the model types live here so `http.rs` only deals with transport.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use steadyrun_api::{
    AutoScalingRevision, HealthCheck, InstanceSizing, RevisionStatus, ScalingBounds,
    ScalingRevisionSummary, ServiceRecord, ServiceStatus, ServiceSummary, SourceConfig,
};

use crate::request::{CreateServiceRequest, ServiceUpdate};

/// Registry type for private image repositories
const REPOSITORY_TYPE: &str = "ECR";

/// Health check protocol used whenever a path is configured
const HEALTH_PROTOCOL: &str = "HTTP";

// ============================================================================
// Shared sections
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    pub key: String,
    pub value: String,
}

fn tags_from(labels: &BTreeMap<String, String>) -> Vec<Tag> {
    labels
        .iter()
        .map(|(k, v)| Tag {
            key: k.clone(),
            value: v.clone(),
        })
        .collect()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SourceConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_repository: Option<ImageRepository>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_deployments_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication_configuration: Option<AuthenticationConfiguration>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ImageRepository {
    pub image_identifier: String,
    #[serde(default)]
    pub image_configuration: ImageConfiguration,
    pub image_repository_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ImageConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    #[serde(default)]
    pub runtime_environment_variables: BTreeMap<String, String>,
    #[serde(default)]
    pub runtime_environment_secrets: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuthenticationConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_role_arn: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstanceConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_role_arn: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HealthCheckConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub healthy_threshold: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unhealthy_threshold: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NetworkConfiguration {
    pub ingress_configuration: IngressConfiguration,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IngressConfiguration {
    pub is_publicly_accessible: bool,
}

fn source_section(
    source: &SourceConfig,
    access_role_arn: Option<&String>,
    auto_deployments: Option<bool>,
) -> SourceConfiguration {
    SourceConfiguration {
        image_repository: Some(ImageRepository {
            image_identifier: source.image_identifier.clone(),
            image_configuration: ImageConfiguration {
                port: source.port.map(|p| p.to_string()),
                runtime_environment_variables: source.variables.clone(),
                runtime_environment_secrets: source.secrets.clone(),
            },
            image_repository_type: REPOSITORY_TYPE.to_string(),
        }),
        auto_deployments_enabled: auto_deployments,
        authentication_configuration: access_role_arn.map(|arn| AuthenticationConfiguration {
            access_role_arn: Some(arn.clone()),
        }),
    }
}

fn instance_section(sizing: &InstanceSizing, role: Option<&String>) -> InstanceConfiguration {
    InstanceConfiguration {
        cpu: Some(sizing.cpu.clone()),
        memory: Some(sizing.memory.clone()),
        instance_role_arn: role.cloned(),
    }
}

impl From<&HealthCheck> for HealthCheckConfiguration {
    fn from(hc: &HealthCheck) -> Self {
        Self {
            protocol: Some(HEALTH_PROTOCOL.to_string()),
            path: Some(hc.path.clone()),
            interval: Some(hc.interval),
            timeout: Some(hc.timeout),
            healthy_threshold: Some(hc.healthy_threshold),
            unhealthy_threshold: Some(hc.unhealthy_threshold),
        }
    }
}

impl HealthCheckConfiguration {
    /// Fill provider-omitted fields with provider defaults
    fn into_model(self) -> HealthCheck {
        let defaults = HealthCheck::default();
        HealthCheck {
            path: self.path.unwrap_or(defaults.path),
            interval: self.interval.unwrap_or(defaults.interval),
            timeout: self.timeout.unwrap_or(defaults.timeout),
            healthy_threshold: self.healthy_threshold.unwrap_or(defaults.healthy_threshold),
            unhealthy_threshold: self
                .unhealthy_threshold
                .unwrap_or(defaults.unhealthy_threshold),
        }
    }
}

// ============================================================================
// Services
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Service {
    pub service_name: String,
    pub service_arn: String,
    #[serde(default)]
    pub service_url: Option<String>,
    pub status: ServiceStatus,
    #[serde(default)]
    pub source_configuration: Option<SourceConfiguration>,
    #[serde(default)]
    pub instance_configuration: Option<InstanceConfiguration>,
    #[serde(default)]
    pub health_check_configuration: Option<HealthCheckConfiguration>,
    #[serde(default)]
    pub auto_scaling_configuration_summary: Option<AutoScalingConfigurationSummary>,
}

impl From<Service> for ServiceRecord {
    fn from(svc: Service) -> Self {
        let source = svc
            .source_configuration
            .and_then(|sc| sc.image_repository)
            .map(|repo| SourceConfig {
                image_identifier: repo.image_identifier,
                port: repo.image_configuration.port.and_then(|p| p.parse().ok()),
                secrets: repo.image_configuration.runtime_environment_secrets,
                variables: repo.image_configuration.runtime_environment_variables,
            })
            .unwrap_or_default();

        let instance = svc.instance_configuration.unwrap_or_default();
        let defaults = InstanceSizing::default();

        ServiceRecord {
            arn: svc.service_arn,
            name: svc.service_name,
            url: svc.service_url.unwrap_or_default(),
            status: svc.status,
            source,
            scaling_config_arn: svc
                .auto_scaling_configuration_summary
                .map(|s| s.auto_scaling_configuration_arn),
            health_check: svc
                .health_check_configuration
                .map(HealthCheckConfiguration::into_model),
            instance: InstanceSizing {
                cpu: instance.cpu.unwrap_or(defaults.cpu),
                memory: instance.memory.unwrap_or(defaults.memory),
            },
            instance_role_arn: instance.instance_role_arn,
            tags: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceSummaryEntry {
    pub service_name: String,
    pub service_arn: String,
    #[serde(default)]
    pub service_url: Option<String>,
    pub status: ServiceStatus,
}

impl From<ServiceSummaryEntry> for ServiceSummary {
    fn from(entry: ServiceSummaryEntry) -> Self {
        ServiceSummary {
            arn: entry.service_arn,
            name: entry.service_name,
            url: entry.service_url.unwrap_or_default(),
            status: entry.status,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListServicesInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
    pub max_results: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListServicesOutput {
    #[serde(default)]
    pub service_summary_list: Vec<ServiceSummaryEntry>,
    #[serde(default)]
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceArnInput {
    pub service_arn: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceOutput {
    pub service: Service,
    #[serde(default)]
    pub operation_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateServiceInput {
    pub service_name: String,
    pub source_configuration: SourceConfiguration,
    pub instance_configuration: InstanceConfiguration,
    pub health_check_configuration: HealthCheckConfiguration,
    pub auto_scaling_configuration_arn: String,
    pub network_configuration: NetworkConfiguration,
    pub tags: Vec<Tag>,
}

impl From<&CreateServiceRequest> for CreateServiceInput {
    fn from(req: &CreateServiceRequest) -> Self {
        Self {
            service_name: req.name.clone(),
            source_configuration: source_section(
                &req.source,
                req.access_role_arn.as_ref(),
                Some(req.auto_deployments),
            ),
            instance_configuration: instance_section(&req.instance, req.instance_role_arn.as_ref()),
            health_check_configuration: (&req.health_check).into(),
            auto_scaling_configuration_arn: req.scaling_config_arn.clone(),
            network_configuration: NetworkConfiguration {
                ingress_configuration: IngressConfiguration {
                    is_publicly_accessible: req.publicly_accessible,
                },
            },
            tags: tags_from(&req.tags),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateServiceInput {
    pub service_arn: String,
    pub source_configuration: SourceConfiguration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_configuration: Option<InstanceConfiguration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check_configuration: Option<HealthCheckConfiguration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_scaling_configuration_arn: Option<String>,
}

impl UpdateServiceInput {
    pub fn new(arn: &str, update: &ServiceUpdate) -> Self {
        Self {
            service_arn: arn.to_string(),
            source_configuration: source_section(
                &update.source,
                update.access_role_arn.as_ref(),
                None,
            ),
            instance_configuration: update
                .instance
                .as_ref()
                .map(|sizing| instance_section(sizing, update.instance_role_arn.as_ref())),
            health_check_configuration: update.health_check.as_ref().map(Into::into),
            auto_scaling_configuration_arn: update.scaling_config_arn.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TagResourceInput {
    pub resource_arn: String,
    pub tags: Vec<Tag>,
}

impl TagResourceInput {
    pub fn new(arn: &str, labels: &BTreeMap<String, String>) -> Self {
        Self {
            resource_arn: arn.to_string(),
            tags: tags_from(labels),
        }
    }
}

// ============================================================================
// Autoscaling configurations
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AutoScalingConfiguration {
    pub auto_scaling_configuration_arn: String,
    pub auto_scaling_configuration_name: String,
    pub auto_scaling_configuration_revision: u32,
    pub status: RevisionStatus,
    pub max_concurrency: u32,
    pub min_size: u32,
    pub max_size: u32,
    #[serde(default)]
    pub has_associated_service: bool,
}

impl From<AutoScalingConfiguration> for AutoScalingRevision {
    fn from(cfg: AutoScalingConfiguration) -> Self {
        AutoScalingRevision {
            arn: cfg.auto_scaling_configuration_arn,
            name: cfg.auto_scaling_configuration_name,
            revision: cfg.auto_scaling_configuration_revision,
            bounds: ScalingBounds {
                min_size: cfg.min_size,
                max_size: cfg.max_size,
                max_concurrency: cfg.max_concurrency,
            },
            status: cfg.status,
            has_associated_service: cfg.has_associated_service,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AutoScalingConfigurationSummary {
    pub auto_scaling_configuration_arn: String,
    #[serde(default)]
    pub auto_scaling_configuration_name: Option<String>,
    #[serde(default)]
    pub auto_scaling_configuration_revision: Option<u32>,
    #[serde(default)]
    pub status: Option<RevisionStatus>,
    #[serde(default)]
    pub has_associated_service: Option<bool>,
}

impl From<AutoScalingConfigurationSummary> for ScalingRevisionSummary {
    fn from(s: AutoScalingConfigurationSummary) -> Self {
        ScalingRevisionSummary {
            arn: s.auto_scaling_configuration_arn,
            name: s.auto_scaling_configuration_name.unwrap_or_default(),
            revision: s.auto_scaling_configuration_revision.unwrap_or_default(),
            status: s.status.unwrap_or(RevisionStatus::Unknown),
            // Unknown association is treated as in use so it is never reclaimed
            has_associated_service: s.has_associated_service.unwrap_or(true),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateAutoScalingConfigurationInput {
    pub auto_scaling_configuration_name: String,
    pub max_concurrency: u32,
    pub min_size: u32,
    pub max_size: u32,
    pub tags: Vec<Tag>,
}

impl CreateAutoScalingConfigurationInput {
    pub fn new(name: &str, bounds: &ScalingBounds, labels: &BTreeMap<String, String>) -> Self {
        Self {
            auto_scaling_configuration_name: name.to_string(),
            max_concurrency: bounds.max_concurrency,
            min_size: bounds.min_size,
            max_size: bounds.max_size,
            tags: tags_from(labels),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListAutoScalingConfigurationsInput {
    pub auto_scaling_configuration_name: String,
    pub latest_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
    pub max_results: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListAutoScalingConfigurationsOutput {
    #[serde(default)]
    pub auto_scaling_configuration_summary_list: Vec<AutoScalingConfigurationSummary>,
    #[serde(default)]
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScalingArnInput {
    pub auto_scaling_configuration_arn: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AutoScalingConfigurationOutput {
    pub auto_scaling_configuration: AutoScalingConfiguration,
}

// ============================================================================
// Errors
// ============================================================================

/// Error body returned with non-2xx responses
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(rename = "__type", default)]
    pub kind: Option<String>,
    #[serde(alias = "Message", default)]
    pub message: Option<String>,
}

impl ErrorBody {
    /// Exception name without namespace prefix or trailing qualifiers
    #[must_use]
    pub fn short_kind(&self) -> &str {
        let kind = self.kind.as_deref().unwrap_or_default();
        let kind = kind.rsplit('#').next().unwrap_or(kind);
        kind.split(':').next().unwrap_or(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_service_into_record() {
        let svc: Service = serde_json::from_value(json!({
            "ServiceName": "prod-web",
            "ServiceArn": "arn:svc/prod-web/1",
            "ServiceUrl": "abc.awsapprunner.com",
            "Status": "RUNNING",
            "SourceConfiguration": {
                "ImageRepository": {
                    "ImageIdentifier": "123.dkr.ecr.eu-west-1.amazonaws.com/web:v1",
                    "ImageRepositoryType": "ECR",
                    "ImageConfiguration": {
                        "Port": "8080",
                        "RuntimeEnvironmentSecrets": { "DB_URL": "arn:ssm:db" },
                        "RuntimeEnvironmentVariables": { "STEADYRUN_UPDATED_AT": "t1" }
                    }
                },
                "AutoDeploymentsEnabled": false
            },
            "InstanceConfiguration": { "Cpu": "1024", "Memory": "2048" },
            "HealthCheckConfiguration": { "Protocol": "HTTP", "Path": "/health", "Interval": 10 },
            "AutoScalingConfigurationSummary": {
                "AutoScalingConfigurationArn": "arn:scaling/prod-web/3"
            }
        }))
        .unwrap();

        let record = ServiceRecord::from(svc);
        assert_eq!(record.status, ServiceStatus::Running);
        assert_eq!(record.source.port, Some(8080));
        assert_eq!(record.source.secrets["DB_URL"], "arn:ssm:db");
        assert_eq!(record.scaling_config_arn.as_deref(), Some("arn:scaling/prod-web/3"));

        let hc = record.health_check.unwrap();
        assert_eq!(hc.path, "/health");
        assert_eq!(hc.interval, 10);
        assert_eq!(hc.timeout, HealthCheck::default().timeout);
    }

    #[test]
    fn test_create_input_shape() {
        let req = CreateServiceRequest {
            name: "prod-web".to_string(),
            source: SourceConfig {
                image_identifier: "repo:v1".to_string(),
                port: Some(8080),
                secrets: BTreeMap::new(),
                variables: BTreeMap::new(),
            },
            access_role_arn: Some("arn:role/pull".to_string()),
            auto_deployments: false,
            health_check: HealthCheck::default(),
            instance: InstanceSizing::default(),
            instance_role_arn: None,
            scaling_config_arn: "arn:scaling/prod-web/1".to_string(),
            publicly_accessible: true,
            tags: BTreeMap::from([("team".to_string(), "core".to_string())]),
        };

        let value = serde_json::to_value(CreateServiceInput::from(&req)).unwrap();
        let source = &value["SourceConfiguration"];
        assert_eq!(source["AutoDeploymentsEnabled"], false);
        assert_eq!(source["ImageRepository"]["ImageRepositoryType"], "ECR");
        assert_eq!(source["ImageRepository"]["ImageConfiguration"]["Port"], "8080");
        assert_eq!(
            source["AuthenticationConfiguration"]["AccessRoleArn"],
            "arn:role/pull"
        );
        assert_eq!(
            value["NetworkConfiguration"]["IngressConfiguration"]["IsPubliclyAccessible"],
            true
        );
        assert_eq!(value["HealthCheckConfiguration"]["Protocol"], "HTTP");
        assert_eq!(value["Tags"][0]["Key"], "team");
        assert!(value["InstanceConfiguration"].get("InstanceRoleArn").is_none());
    }

    #[test]
    fn test_update_input_omits_unchanged_sections() {
        let update = ServiceUpdate {
            source: SourceConfig::default(),
            access_role_arn: None,
            scaling_config_arn: None,
            health_check: None,
            instance: Some(InstanceSizing::default()),
            instance_role_arn: None,
        };
        let value = serde_json::to_value(UpdateServiceInput::new("arn:svc", &update)).unwrap();
        assert!(value.get("HealthCheckConfiguration").is_none());
        assert!(value.get("AutoScalingConfigurationArn").is_none());
        assert_eq!(value["InstanceConfiguration"]["Cpu"], "1024");
        assert!(value["SourceConfiguration"]
            .get("AutoDeploymentsEnabled")
            .is_none());
    }

    #[test]
    fn test_summary_without_association_is_not_reclaimable() {
        let summary: AutoScalingConfigurationSummary = serde_json::from_value(json!({
            "AutoScalingConfigurationArn": "arn:scaling/web/2",
            "Status": "ACTIVE"
        }))
        .unwrap();
        assert!(!ScalingRevisionSummary::from(summary).is_reclaimable());
    }

    #[test]
    fn test_error_kind_normalisation() {
        let body: ErrorBody = serde_json::from_value(json!({
            "__type": "com.amazonaws.apprunner#ResourceNotFoundException",
            "Message": "no such service"
        }))
        .unwrap();
        assert_eq!(body.short_kind(), "ResourceNotFoundException");
        assert_eq!(body.message.as_deref(), Some("no such service"));

        let body: ErrorBody = serde_json::from_value(json!({
            "__type": "ThrottlingException:http://internal"
        }))
        .unwrap();
        assert_eq!(body.short_kind(), "ThrottlingException");
    }
}
