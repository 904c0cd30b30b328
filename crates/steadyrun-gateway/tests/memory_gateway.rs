use std::collections::BTreeMap;

use steadyrun_api::{
    HealthCheck, InstanceSizing, RevisionStatus, ScalingBounds, ServiceStatus, SourceConfig,
};
use steadyrun_gateway::{
    CreateServiceRequest, GatewayError, MemoryGateway, Operation, ServiceGateway, Step,
};

fn bounds(max_size: u32) -> ScalingBounds {
    ScalingBounds {
        min_size: 1,
        max_size,
        max_concurrency: 100,
    }
}

fn create_request(name: &str, scaling_config_arn: &str) -> CreateServiceRequest {
    CreateServiceRequest {
        name: name.to_string(),
        source: SourceConfig {
            image_identifier: format!("registry.local/{name}:v1"),
            port: Some(8080),
            secrets: BTreeMap::new(),
            variables: BTreeMap::new(),
        },
        access_role_arn: None,
        auto_deployments: false,
        health_check: HealthCheck::default(),
        instance: InstanceSizing::default(),
        instance_role_arn: None,
        scaling_config_arn: scaling_config_arn.to_string(),
        publicly_accessible: true,
        tags: BTreeMap::new(),
    }
}

#[tokio::test]
async fn test_revisions_are_numbered_and_quota_enforced() {
    let gateway = MemoryGateway::new().with_revision_quota(2);
    let labels = BTreeMap::new();

    let first = gateway
        .create_scaling_config("web", &bounds(5), &labels)
        .await
        .unwrap();
    let second = gateway
        .create_scaling_config("web", &bounds(10), &labels)
        .await
        .unwrap();
    assert_eq!(first.revision, 1);
    assert_eq!(second.revision, 2);

    let err = gateway
        .create_scaling_config("web", &bounds(15), &labels)
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Permanent(_)));

    gateway.delete_scaling_config(&first.arn).await.unwrap();
    assert_eq!(
        gateway.revision(&first.arn).unwrap().status,
        RevisionStatus::Inactive
    );

    let third = gateway
        .create_scaling_config("web", &bounds(15), &labels)
        .await
        .unwrap();
    assert_eq!(third.revision, 3);
}

#[tokio::test]
async fn test_list_drains_every_page() {
    let gateway = MemoryGateway::new().with_page_size(2);
    let labels = BTreeMap::new();
    for max in 2..7 {
        gateway
            .create_scaling_config("api", &bounds(max), &labels)
            .await
            .unwrap();
    }
    gateway
        .create_scaling_config("other", &bounds(3), &labels)
        .await
        .unwrap();

    let listed = gateway.list_scaling_configs("api").await.unwrap();
    assert_eq!(listed.len(), 5);
    assert!(listed.iter().all(|r| r.name == "api"));
}

#[tokio::test]
async fn test_create_follows_default_script_and_associates_revision() {
    let gateway = MemoryGateway::new();
    let revision = gateway
        .create_scaling_config("web", &bounds(5), &BTreeMap::new())
        .await
        .unwrap();

    let created = gateway
        .create_service(&create_request("web", &revision.arn))
        .await
        .unwrap();
    assert!(gateway.revision(&revision.arn).unwrap().has_associated_service);

    let first = gateway.describe_service(&created.arn).await.unwrap().unwrap();
    let second = gateway.describe_service(&created.arn).await.unwrap().unwrap();
    let third = gateway.describe_service(&created.arn).await.unwrap().unwrap();
    assert_eq!(first.status, ServiceStatus::Creating);
    assert_eq!(second.status, ServiceStatus::Running);
    assert_eq!(third.status, ServiceStatus::Running);
}

#[tokio::test]
async fn test_delete_script_ends_with_absent_service() {
    let gateway = MemoryGateway::new();
    let revision = gateway
        .create_scaling_config("web", &bounds(5), &BTreeMap::new())
        .await
        .unwrap();
    let created = gateway
        .create_service(&create_request("web", &revision.arn))
        .await
        .unwrap();

    gateway.script_next_delete(vec![Step::Status(ServiceStatus::Deleting), Step::Gone]);
    gateway.delete_service(&created.arn).await.unwrap();

    let deleting = gateway.describe_service(&created.arn).await.unwrap();
    assert_eq!(deleting.unwrap().status, ServiceStatus::Deleting);
    assert!(gateway.describe_service(&created.arn).await.unwrap().is_none());
    assert!(!gateway.revision(&revision.arn).unwrap().has_associated_service);

    // Deleting an absent service is not an error
    gateway.delete_service(&created.arn).await.unwrap();
}

#[tokio::test]
async fn test_injected_failure_and_journal() {
    let gateway = MemoryGateway::new();
    gateway.fail_next(
        Operation::ListServices,
        GatewayError::Transient("throttled".to_string()),
    );

    assert!(gateway.list_services().await.unwrap_err().is_retryable());
    assert!(gateway.list_services().await.unwrap().is_empty());

    assert_eq!(
        gateway.operations(),
        vec![Operation::ListServices, Operation::ListServices]
    );
    assert!(gateway.mutating_calls().is_empty());
}
