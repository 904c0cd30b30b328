//! Config-file backed collaborators for the convergence engine

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use steadyrun_core::{
    CollaboratorError, Collaborators, ConfigStore, ImageRegistry, TagPolicy, UrlSink,
};
use tracing::info;

use crate::config::Config;

/// Label marking resources owned by this tool
const MANAGED_BY: (&str, &str) = ("managed-by", "steadyrun");

/// Build all collaborators from a loaded config
pub fn from_config(config: &Config) -> Collaborators {
    Collaborators {
        config_store: Arc::new(StaticConfigStore::new(config.bindings.clone())),
        registry: Arc::new(EcrRegistry::new(
            config.registry.account_id.clone(),
            config.registry.host.clone(),
        )),
        tag_policy: Arc::new(DefaultTagPolicy::new(config.tags.clone())),
        url_sink: Arc::new(FileUrlSink::new(config.output.url_file.clone())),
    }
}

/// Serves secret bindings declared under `[bindings.<deployment>]`
pub struct StaticConfigStore {
    bindings: BTreeMap<String, BTreeMap<String, String>>,
}

impl StaticConfigStore {
    pub fn new(bindings: BTreeMap<String, BTreeMap<String, String>>) -> Self {
        Self { bindings }
    }
}

#[async_trait]
impl ConfigStore for StaticConfigStore {
    async fn get(
        &self,
        _region: &str,
        deployment: &str,
    ) -> Result<BTreeMap<String, String>, CollaboratorError> {
        Ok(self.bindings.get(deployment).cloned().unwrap_or_default())
    }
}

/// Container registry addressed by account and region
pub struct EcrRegistry {
    account_id: String,
    host: Option<String>,
}

impl EcrRegistry {
    pub fn new(account_id: String, host: Option<String>) -> Self {
        Self { account_id, host }
    }
}

#[async_trait]
impl ImageRegistry for EcrRegistry {
    async fn resolve(&self, region: &str, repository: &str) -> Result<String, CollaboratorError> {
        if let Some(host) = &self.host {
            return Ok(format!("{}/{repository}", host.trim_end_matches('/')));
        }
        if self.account_id.is_empty() {
            return Err(CollaboratorError::new(
                "registry.account_id is not set and no registry.host override is given",
            ));
        }
        Ok(format!(
            "{}.dkr.ecr.{region}.amazonaws.com/{repository}",
            self.account_id
        ))
    }
}

/// Static labels plus deployment, region and ownership labels
pub struct DefaultTagPolicy {
    static_tags: BTreeMap<String, String>,
}

impl DefaultTagPolicy {
    pub fn new(static_tags: BTreeMap<String, String>) -> Self {
        Self { static_tags }
    }
}

impl TagPolicy for DefaultTagPolicy {
    fn labels_for(
        &self,
        region: &str,
        deployment: &str,
        extra: &BTreeMap<String, String>,
    ) -> BTreeMap<String, String> {
        let mut labels = self.static_tags.clone();
        labels.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        labels.insert("deployment".to_string(), deployment.to_string());
        labels.insert("region".to_string(), region.to_string());
        labels.insert(MANAGED_BY.0.to_string(), MANAGED_BY.1.to_string());
        labels
    }
}

/// Logs the service URL and optionally writes it to a file
pub struct FileUrlSink {
    path: Option<PathBuf>,
}

impl FileUrlSink {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

#[async_trait]
impl UrlSink for FileUrlSink {
    async fn publish(&self, url: &str) -> Result<(), CollaboratorError> {
        info!(url = %format!("https://{url}"), "service url");
        if let Some(path) = &self.path {
            tokio::fs::write(path, format!("https://{url}\n"))
                .await
                .map_err(|e| CollaboratorError::new(format!("writing {}: {e}", path.display())))?;
        }
        Ok(())
    }
}
