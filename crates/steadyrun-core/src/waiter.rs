//! Polling waiter
//!
//! Repeatedly describes a service until it reaches a target state, fails,
//! or the wait bound elapses. Time is read and slept through a `Clock` so
//! tests can drive long waits without real delays.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use steadyrun_api::{ServiceRecord, ServiceStatus};
use steadyrun_gateway::ServiceGateway;
use tracing::{debug, info, instrument, warn};

use crate::error::ConvergeError;

// ============================================================================
// Clock
// ============================================================================

/// Source of time for polling
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Clock that advances only when slept on
///
/// Every sleep returns immediately after moving the clock forward and is
/// recorded, so tests can assert the delay sequence.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    state: Mutex<ManualState>,
}

#[derive(Debug, Default)]
struct ManualState {
    offset: Duration,
    sleeps: Vec<Duration>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            state: Mutex::new(ManualState::default()),
        }
    }

    /// Move the clock forward without recording a sleep
    pub fn advance(&self, by: Duration) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .offset += by;
    }

    /// Total time slept or advanced
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .offset
    }

    /// Sleeps requested so far, in order
    #[must_use]
    pub fn sleeps(&self) -> Vec<Duration> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sleeps
            .clone()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.offset += duration;
        state.sleeps.push(duration);
    }
}

// ============================================================================
// Delay schedule
// ============================================================================

/// Poll delay as a step function of elapsed time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelaySchedule {
    /// `(until, delay)` pairs in ascending `until` order
    steps: Vec<(Duration, Duration)>,
    /// Delay once every step has passed
    tail: Duration,
}

impl Default for DelaySchedule {
    fn default() -> Self {
        Self {
            steps: vec![
                (Duration::from_secs(5), Duration::from_secs(1)),
                (Duration::from_secs(20), Duration::from_secs(2)),
                (Duration::from_secs(60), Duration::from_secs(5)),
            ],
            tail: Duration::from_secs(10),
        }
    }
}

impl DelaySchedule {
    /// Fixed delay regardless of elapsed time
    #[must_use]
    pub fn fixed(delay: Duration) -> Self {
        Self {
            steps: Vec::new(),
            tail: delay,
        }
    }

    #[must_use]
    pub fn delay_for(&self, elapsed: Duration) -> Duration {
        self.steps
            .iter()
            .find(|(until, _)| elapsed < *until)
            .map_or(self.tail, |(_, delay)| *delay)
    }
}

// ============================================================================
// Waiter
// ============================================================================

/// State a waiter polls for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitTarget {
    /// Service reports RUNNING
    Running,
    /// Service is absent or reports DELETED
    Deleted,
}

impl fmt::Display for WaitTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitTarget::Running => write!(f, "RUNNING"),
            WaitTarget::Deleted => write!(f, "deletion"),
        }
    }
}

enum Progress {
    Reached,
    Pending,
    Failed,
}

impl WaitTarget {
    fn classify(self, status: ServiceStatus) -> Progress {
        match (self, status) {
            (WaitTarget::Running, ServiceStatus::Running)
            | (WaitTarget::Deleted, ServiceStatus::Deleted) => Progress::Reached,
            (
                WaitTarget::Running,
                ServiceStatus::Creating | ServiceStatus::OperationInProgress,
            )
            | (
                WaitTarget::Deleted,
                ServiceStatus::Deleting | ServiceStatus::OperationInProgress,
            ) => Progress::Pending,
            _ => Progress::Failed,
        }
    }
}

/// Result of a wait that did not fail outright
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Target reached; carries the final record, absent once deleted
    Reached(Option<ServiceRecord>),
    /// Bound elapsed; carries the last record observed
    TimedOut {
        last: Option<ServiceRecord>,
        waited: Duration,
    },
}

/// Polls a service through the gateway until it settles
pub struct PollingWaiter {
    gateway: Arc<dyn ServiceGateway>,
    clock: Arc<dyn Clock>,
    schedule: DelaySchedule,
}

impl PollingWaiter {
    pub fn new(gateway: Arc<dyn ServiceGateway>, clock: Arc<dyn Clock>) -> Self {
        Self {
            gateway,
            clock,
            schedule: DelaySchedule::default(),
        }
    }

    #[must_use]
    pub fn with_schedule(mut self, schedule: DelaySchedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Poll `arn` until `target` is reached or `max_wait` elapses
    ///
    /// # Errors
    /// Returns `ConvergenceFailed` when the service settles in a status
    /// outside the target's progress set (or vanishes while waiting to
    /// run), and propagates gateway errors unchanged.
    #[instrument(skip(self))]
    pub async fn wait_for(
        &self,
        arn: &str,
        target: WaitTarget,
        max_wait: Duration,
    ) -> Result<WaitOutcome, ConvergeError> {
        let start = self.clock.now();
        let mut last: Option<ServiceRecord> = None;

        loop {
            let observed = self.gateway.describe_service(arn).await?;
            let elapsed = self.clock.now().saturating_duration_since(start);

            match observed {
                None if target == WaitTarget::Deleted => {
                    info!(arn, elapsed = ?elapsed, "service is gone");
                    return Ok(WaitOutcome::Reached(None));
                }
                None => {
                    return Err(ConvergeError::ConvergenceFailed {
                        target,
                        arn: arn.to_string(),
                        url: last.map(|r| r.url).unwrap_or_default(),
                        status: None,
                    });
                }
                Some(record) => match target.classify(record.status) {
                    Progress::Reached => {
                        info!(arn, status = %record.status, elapsed = ?elapsed, "target reached");
                        return Ok(WaitOutcome::Reached(Some(record)));
                    }
                    Progress::Failed => {
                        warn!(arn, status = %record.status, "service settled outside target");
                        return Err(ConvergeError::ConvergenceFailed {
                            target,
                            arn: arn.to_string(),
                            url: record.url,
                            status: Some(record.status),
                        });
                    }
                    Progress::Pending => {
                        debug!(arn, status = %record.status, elapsed = ?elapsed, "still waiting");
                        last = Some(record);
                    }
                },
            }

            if elapsed >= max_wait {
                warn!(arn, %target, waited = ?elapsed, "wait bound elapsed");
                return Ok(WaitOutcome::TimedOut {
                    last,
                    waited: elapsed,
                });
            }

            let delay = self.schedule.delay_for(elapsed).min(max_wait - elapsed);
            self.clock.sleep(delay).await;
        }
    }
}
