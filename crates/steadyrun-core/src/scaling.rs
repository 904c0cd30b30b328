//! Autoscaling revision lifecycle
//!
//! Revisions are immutable and count against a per-name quota, so unused
//! ones are reclaimed before every create.

use std::collections::BTreeMap;
use std::sync::Arc;

use steadyrun_api::{AutoScalingRevision, ScalingBounds};
use steadyrun_gateway::ServiceGateway;
use tracing::{debug, info, instrument, warn};

use crate::error::ConvergeError;

/// Whether moving from `current` to `desired` bounds requires a new revision
///
/// An unknown current revision always does.
#[must_use]
pub fn needs_new_revision(current: Option<&ScalingBounds>, desired: &ScalingBounds) -> bool {
    match current {
        Some(current) => {
            current.max_concurrency != desired.max_concurrency
                || current.min_size != desired.min_size
                || current.max_size != desired.max_size
        }
        None => true,
    }
}

/// Creates, inspects and reclaims autoscaling revisions
pub struct ScalingLifecycle {
    gateway: Arc<dyn ServiceGateway>,
}

impl ScalingLifecycle {
    pub fn new(gateway: Arc<dyn ServiceGateway>) -> Self {
        Self { gateway }
    }

    /// Delete every active revision of `name` that no service uses
    ///
    /// Returns the number of revisions deleted.
    ///
    /// # Errors
    /// Stops at the first gateway failure; revisions deleted before it stay
    /// deleted.
    #[instrument(skip(self))]
    pub async fn reclaim_unused(&self, name: &str) -> Result<usize, ConvergeError> {
        let revisions = self.gateway.list_scaling_configs(name).await?;
        let mut reclaimed = 0;

        for revision in revisions.iter().filter(|r| r.is_reclaimable()) {
            if let Err(err) = self.gateway.delete_scaling_config(&revision.arn).await {
                warn!(arn = %revision.arn, error = %err, "failed to reclaim autoscaling revision");
                return Err(err.into());
            }
            debug!(arn = %revision.arn, revision = revision.revision, "reclaimed autoscaling revision");
            reclaimed += 1;
        }

        if reclaimed > 0 {
            info!(name, reclaimed, "reclaimed unused autoscaling revisions");
        }
        Ok(reclaimed)
    }

    /// Current revision bounds, if the arn still resolves
    ///
    /// # Errors
    /// Propagates gateway failures other than not-found.
    pub async fn describe(&self, arn: &str) -> Result<Option<AutoScalingRevision>, ConvergeError> {
        Ok(self.gateway.describe_scaling_config(arn).await?)
    }

    /// Create a new revision of `name` and return its arn
    ///
    /// # Errors
    /// Propagates gateway failures, including quota exhaustion.
    #[instrument(skip(self, labels))]
    pub async fn create_revision(
        &self,
        name: &str,
        bounds: &ScalingBounds,
        labels: &BTreeMap<String, String>,
    ) -> Result<String, ConvergeError> {
        let created = self
            .gateway
            .create_scaling_config(name, bounds, labels)
            .await?;
        info!(
            arn = %created.arn,
            revision = created.revision,
            min = bounds.min_size,
            max = bounds.max_size,
            concurrency = bounds.max_concurrency,
            "created autoscaling revision"
        );
        Ok(created.arn)
    }
}
