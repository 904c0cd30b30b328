//! Engine configuration

use std::time::Duration;

/// Tunables for one orchestrator
#[derive(Debug, Clone)]
pub struct ConvergeConfig {
    /// Bound on waiting for a created/updated service to run
    pub running_timeout: Duration,
    /// Bound on waiting for a deleted service to disappear
    pub deleted_timeout: Duration,
    /// Plain variable stamped with the update fingerprint
    pub fingerprint_key: String,
    /// Whether created services accept public traffic
    pub publicly_accessible: bool,
    /// Whether the provider redeploys on registry pushes
    pub auto_deployments: bool,
}

const DEFAULT_WAIT: Duration = Duration::from_secs(15 * 60);

impl Default for ConvergeConfig {
    fn default() -> Self {
        Self {
            running_timeout: DEFAULT_WAIT,
            deleted_timeout: DEFAULT_WAIT,
            fingerprint_key: "STEADYRUN_UPDATED_AT".to_string(),
            publicly_accessible: true,
            auto_deployments: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConvergeConfig::default();

        assert_eq!(config.running_timeout, Duration::from_secs(900));
        assert_eq!(config.deleted_timeout, Duration::from_secs(900));
        assert_eq!(config.fingerprint_key, "STEADYRUN_UPDATED_AT");
        assert!(config.publicly_accessible);
        assert!(!config.auto_deployments);
    }
}
