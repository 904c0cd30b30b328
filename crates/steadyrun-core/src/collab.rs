//! Collaborator traits consumed by the orchestrator

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// Failure reported by a collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct CollaboratorError(pub String);

impl CollaboratorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Source of secret bindings (variable name -> secret reference)
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get(
        &self,
        region: &str,
        deployment: &str,
    ) -> Result<BTreeMap<String, String>, CollaboratorError>;
}

/// Resolves a repository name to the registry address images are pulled from
#[async_trait]
pub trait ImageRegistry: Send + Sync {
    async fn resolve(&self, region: &str, repository: &str) -> Result<String, CollaboratorError>;
}

/// Naming/tagging convention for created resources
pub trait TagPolicy: Send + Sync {
    fn labels_for(
        &self,
        region: &str,
        deployment: &str,
        extra: &BTreeMap<String, String>,
    ) -> BTreeMap<String, String>;
}

/// Receives the service URL as soon as it is known
#[async_trait]
pub trait UrlSink: Send + Sync {
    async fn publish(&self, url: &str) -> Result<(), CollaboratorError>;
}

/// Bundle of collaborators handed to the orchestrator
#[derive(Clone)]
pub struct Collaborators {
    pub config_store: Arc<dyn ConfigStore>,
    pub registry: Arc<dyn ImageRegistry>,
    pub tag_policy: Arc<dyn TagPolicy>,
    pub url_sink: Arc<dyn UrlSink>,
}
