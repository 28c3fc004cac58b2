//! Job monitoring: poll a job handle until it settles.
//!
//! # Loop
//!
//! ```text
//!   poll ──→ terminal? ──yes──→ Done? ──yes──→ fetch counts
//!     ▲          │no                         (failure → ResultFetchError)
//!     │          ▼
//!     └── sleep(interval) ◄── polls < max_iterations?  ──no──→ Exhausted
//! ```
//!
//! - The first poll is issued immediately; each later poll is preceded by
//!   one interval of sleep. At most `max_iterations` polls are issued.
//! - A failed poll keeps the last observed status and still uses up one
//!   iteration.
//! - Once a terminal state is observed no further status poll is issued.
//! - Cancellation interrupts the sleep or the in-flight query and returns the
//!   last observed status. It never fabricates a terminal state.

use std::fmt;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use qdispatch_hal::{Counts, JobHandle, JobState, JobStatus, ProviderSession};

use crate::config::MonitorConfig;
use crate::error::ResultFetchError;

/// Why the polling loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorOutcome {
    /// A terminal state was observed.
    Terminal,
    /// The iteration budget ran out while the job was still pending or
    /// running. Monitoring may be resumed later with the same handle.
    Exhausted,
    /// The caller cancelled monitoring.
    Cancelled,
}

impl fmt::Display for MonitorOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorOutcome::Terminal => write!(f, "terminal"),
            MonitorOutcome::Exhausted => write!(f, "exhausted"),
            MonitorOutcome::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Backend a job ran on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendRef {
    /// Backend name.
    pub name: String,
    /// Routing group.
    pub routing_group: String,
}

/// Final output of monitoring one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    /// Provider job identifier.
    pub provider_job_id: String,
    /// Last observed status.
    pub status: JobStatus,
    /// Backend the job ran on.
    pub backend: BackendRef,
    /// Outcome counts; present only for a `Done` job whose counts were fetched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Counts>,
    /// Set when the job is `Done` but its counts could not be fetched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_error: Option<ResultFetchError>,
    /// Why polling stopped.
    pub outcome: MonitorOutcome,
    /// Number of status queries issued, including one interrupted by
    /// cancellation.
    pub polls: u32,
    /// When monitoring finished.
    pub finished_at: DateTime<Utc>,
}

impl JobResult {
    /// Check if the job reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Check if monitoring stopped because the budget ran out.
    pub fn is_exhausted(&self) -> bool {
        self.outcome == MonitorOutcome::Exhausted
    }
}

/// Polls job handles through a provider session.
///
/// A monitor holds only its configuration, so one instance can drive any
/// number of independent loops at once.
#[derive(Debug, Clone, Default)]
pub struct JobMonitor {
    config: MonitorConfig,
}

impl JobMonitor {
    /// Create a monitor.
    pub fn new(config: MonitorConfig) -> Self {
        Self { config }
    }

    /// The polling configuration.
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Poll `handle` until it is terminal, the budget is spent, or `cancel`
    /// fires.
    pub async fn monitor(
        &self,
        session: &dyn ProviderSession,
        handle: &JobHandle,
        cancel: &CancellationToken,
    ) -> JobResult {
        let (status, polls, outcome) = self.poll_until_settled(session, handle, cancel).await;

        let mut payload = None;
        let mut result_error = None;
        if status.is_done() {
            match self.fetch_counts(session, handle, cancel).await {
                Ok(counts) => payload = Some(counts),
                Err(reason) => {
                    warn!(
                        job_id = %handle.id,
                        backend = %handle.backend,
                        routing_group = %handle.routing_group,
                        "result fetch failed: {reason}"
                    );
                    result_error = Some(ResultFetchError {
                        job_id: handle.id.to_string(),
                        backend: handle.backend.clone(),
                        routing_group: handle.routing_group.clone(),
                        reason,
                    });
                }
            }
        }

        info!(
            job_id = %handle.id,
            backend = %handle.backend,
            state = %status.state,
            polls,
            outcome = %outcome,
            "monitoring finished"
        );

        JobResult {
            provider_job_id: handle.id.to_string(),
            status,
            backend: BackendRef {
                name: handle.backend.clone(),
                routing_group: handle.routing_group.clone(),
            },
            payload,
            result_error,
            outcome,
            polls,
            finished_at: Utc::now(),
        }
    }

    /// Monitor several jobs concurrently through one session.
    ///
    /// Each handle gets its own loop; loops share nothing but the session
    /// and the cancellation token. Results come back in handle order.
    pub async fn monitor_many(
        &self,
        session: &dyn ProviderSession,
        handles: &[JobHandle],
        cancel: &CancellationToken,
    ) -> Vec<JobResult> {
        join_all(
            handles
                .iter()
                .map(|handle| self.monitor(session, handle, cancel)),
        )
        .await
    }

    async fn poll_until_settled(
        &self,
        session: &dyn ProviderSession,
        handle: &JobHandle,
        cancel: &CancellationToken,
    ) -> (JobStatus, u32, MonitorOutcome) {
        let interval = self.config.interval();
        let max_iterations = self.config.max_iterations;

        let mut status = JobStatus::unobserved();
        let mut observed = false;
        let mut polls: u32 = 0;

        let outcome = loop {
            if status.is_terminal() {
                break MonitorOutcome::Terminal;
            }
            if polls >= max_iterations {
                break MonitorOutcome::Exhausted;
            }
            if cancel.is_cancelled() {
                break MonitorOutcome::Cancelled;
            }

            if polls > 0 {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break MonitorOutcome::Cancelled,
                    () = tokio::time::sleep(interval) => {}
                }
            }

            if cancel.is_cancelled() {
                break MonitorOutcome::Cancelled;
            }

            // Counted once issued, even if cancellation interrupts it.
            polls += 1;
            let query = tokio::select! {
                biased;
                () = cancel.cancelled() => break MonitorOutcome::Cancelled,
                query = session.job_status(&handle.id) => query,
            };

            match query {
                Ok(next) => {
                    debug!(
                        job_id = %handle.id,
                        iteration = polls,
                        state = %next.state,
                        detail = %next.detail,
                        "polled job status"
                    );
                    status = next;
                    observed = true;
                }
                Err(e) => {
                    warn!(
                        job_id = %handle.id,
                        backend = %handle.backend,
                        iteration = polls,
                        "status poll failed, retrying next iteration: {e}"
                    );
                    if !observed {
                        status = JobStatus::new(JobState::Pending, format!("status query failed: {e}"));
                    }
                }
            }
        };

        (status, polls, outcome)
    }

    async fn fetch_counts(
        &self,
        session: &dyn ProviderSession,
        handle: &JobHandle,
        cancel: &CancellationToken,
    ) -> Result<Counts, String> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err("cancelled before the result was fetched".to_string()),
            fetched = session.job_result(&handle.id) => fetched.map_err(|e| e.to_string()),
        }
    }
}
