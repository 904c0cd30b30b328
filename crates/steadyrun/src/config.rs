//! Configuration loading and types

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use steadyrun_api::{DesiredSpec, HealthCheck, InstanceSizing, ScalingBounds, ServiceIdentity};
use steadyrun_core::ConvergeConfig;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "STEADYRUN_CONFIG";

/// Top-level configuration for one managed service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub provider: ProviderConfig,
    pub service: ServiceConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    /// Static labels added to every created resource
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// Secret bindings per deployment
    #[serde(default)]
    pub bindings: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub wait: WaitConfig,
}

/// Provider endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// JSON RPC endpoint (a signing proxy or emulator)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Identity and desired state of the managed service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub region: String,
    pub deployment: String,
    pub component: String,
    pub repository: String,
    /// Tag to deploy; `--image-tag` takes precedence
    pub image_tag: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub scaling: ScalingBounds,
    #[serde(default)]
    pub health_check: HealthCheck,
    #[serde(default)]
    pub instance: InstanceSizing,
    pub instance_role_arn: Option<String>,
    pub access_role_arn: Option<String>,
    #[serde(default)]
    pub ignore_config_keys: BTreeSet<String>,
}

impl ServiceConfig {
    #[must_use]
    pub fn identity(&self) -> ServiceIdentity {
        ServiceIdentity::new(&self.region, &self.deployment, &self.component)
    }

    /// Build the desired spec, preferring `image_tag` over the configured tag
    ///
    /// # Errors
    /// Returns error if no tag is configured or given
    pub fn desired(&self, image_tag: Option<&str>) -> eyre::Result<DesiredSpec> {
        let tag = image_tag
            .or(self.image_tag.as_deref())
            .ok_or_else(|| eyre::eyre!("no image tag: set service.image_tag or pass --image-tag"))?;

        let mut spec = DesiredSpec::new(&self.repository, tag);
        spec.port = self.port;
        spec.scaling = self.scaling;
        spec.health_check = self.health_check.clone();
        spec.instance = self.instance.clone();
        spec.instance_role_arn.clone_from(&self.instance_role_arn);
        spec.access_role_arn.clone_from(&self.access_role_arn);
        spec.ignore_config_keys.clone_from(&self.ignore_config_keys);
        Ok(spec)
    }
}

/// Image registry addressing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Account owning the registry
    #[serde(default)]
    pub account_id: String,
    /// Registry host replacing the account-derived one
    pub host: Option<String>,
}

/// Where results are written besides stdout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// File receiving the service URL
    pub url_file: Option<PathBuf>,
}

/// Wait bounds, in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitConfig {
    #[serde(default = "default_wait")]
    pub running_secs: u64,
    #[serde(default = "default_wait")]
    pub deleted_secs: u64,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            running_secs: default_wait(),
            deleted_secs: default_wait(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_endpoint() -> String {
    "http://127.0.0.1:8787/".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_port() -> u16 {
    8080
}

fn default_wait() -> u64 {
    900
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| eyre::eyre!("failed to read {}: {e}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    ///
    /// # Errors
    /// Returns error if the text is not valid configuration
    pub fn parse(content: &str) -> eyre::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Engine tunables derived from this file
    #[must_use]
    pub fn converge(&self) -> ConvergeConfig {
        ConvergeConfig {
            running_timeout: Duration::from_secs(self.wait.running_secs),
            deleted_timeout: Duration::from_secs(self.wait.deleted_secs),
            ..ConvergeConfig::default()
        }
    }
}

/// Find the config file: explicit path, then `STEADYRUN_CONFIG`, then the
/// first existing default location
#[must_use]
pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }

    let mut paths = vec![
        PathBuf::from("steadyrun.toml"),
        PathBuf::from("/etc/steadyrun/steadyrun.toml"),
    ];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("steadyrun/steadyrun.toml"));
    }

    paths.into_iter().find(|p| p.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [service]
        region = "eu-west-1"
        deployment = "prod"
        component = "web"
        repository = "web"
    "#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::parse(MINIMAL).unwrap();

        assert_eq!(config.log_level, "info");
        assert_eq!(config.provider.request_timeout_secs, 30);
        assert_eq!(config.wait.running_secs, 900);
        assert_eq!(config.service.port, 8080);
        assert_eq!(config.service.scaling, ScalingBounds::default());
        assert!(config.bindings.is_empty());
        assert_eq!(config.service.identity().service_name(), "prod-web");

        let converge = config.converge();
        assert_eq!(converge.running_timeout, Duration::from_secs(900));
        assert_eq!(converge.fingerprint_key, "STEADYRUN_UPDATED_AT");
    }

    #[test]
    fn test_full_config() {
        let config = Config::parse(
            r#"
            log_level = "debug"

            [provider]
            endpoint = "http://localhost:4566/"

            [service]
            region = "us-east-1"
            deployment = "staging"
            component = "api"
            repository = "api"
            image_tag = "2024.06.01"
            port = 3000
            ignore_config_keys = ["LEGACY_KEY"]

            [service.scaling]
            min_size = 2
            max_size = 10
            max_concurrency = 50

            [service.health_check]
            path = "/healthz"

            [service.instance]
            cpu = "2048"
            memory = "4096"

            [registry]
            account_id = "123456789012"

            [tags]
            team = "payments"

            [bindings.staging]
            DB_URL = "arn:secret:db"

            [output]
            url_file = "service-url.txt"

            [wait]
            running_secs = 600
            "#,
        )
        .unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.service.scaling.max_size, 10);
        assert_eq!(config.service.health_check.path, "/healthz");
        assert_eq!(config.service.health_check.interval, HealthCheck::default().interval);
        assert_eq!(config.bindings["staging"]["DB_URL"], "arn:secret:db");
        assert_eq!(config.output.url_file, Some(PathBuf::from("service-url.txt")));
        assert_eq!(config.wait.running_secs, 600);
        assert_eq!(config.wait.deleted_secs, 900);

        let spec = config.service.desired(None).unwrap();
        assert_eq!(spec.image_tag, "2024.06.01");
        assert_eq!(spec.port, 3000);
        assert!(spec.ignore_config_keys.contains("LEGACY_KEY"));
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_image_tag_override() {
        let config = Config::parse(MINIMAL).unwrap();

        assert!(config.service.desired(None).is_err());
        let spec = config.service.desired(Some("v7")).unwrap();
        assert_eq!(spec.image_tag, "v7");
    }

    #[test]
    fn test_missing_service_section_is_error() {
        assert!(Config::parse("log_level = \"info\"").is_err());
    }

    #[test]
    fn test_locate_prefers_explicit_path() {
        let path = Path::new("/tmp/custom.toml");
        assert_eq!(locate(Some(path)), Some(path.to_path_buf()));
    }
}
