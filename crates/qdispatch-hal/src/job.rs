//! Job lifecycle types.
//!
//! The normalized job state machine:
//!
//! ```text
//!   Pending ──→ Running ──→ Done
//!      │           │
//!      │           ├──→ Error(detail)
//!      │           │
//!      └───────────┴──→ Cancelled
//! ```
//!
//! **Invariants:**
//! - Terminal states (`Done`, `Cancelled`, `Error`) are permanent.
//! - Every provider status string maps to exactly one state. Strings outside
//!   the known vocabulary map to `Error` and keep the raw value in `detail`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Provider-assigned job identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Create a new job ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Reference to a job submitted through a provider session.
///
/// The monitor only reads the handle; the session that issued it owns the
/// job itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobHandle {
    /// Provider job identifier.
    pub id: JobId,
    /// Routing group the job was submitted under.
    pub routing_group: String,
    /// Backend the job runs on.
    pub backend: String,
}

impl JobHandle {
    /// Create a new handle.
    pub fn new(
        id: impl Into<JobId>,
        backend: impl Into<String>,
        routing_group: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            routing_group: routing_group.into(),
            backend: backend.into(),
        }
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}/{}", self.id, self.routing_group, self.backend)
    }
}

/// Normalized job state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    /// Accepted but not yet executing (initializing, queued, validating).
    Pending,
    /// Executing on the backend.
    Running,
    /// Completed successfully; results are available.
    Done,
    /// Cancelled before completion.
    Cancelled,
    /// Failed, or reported in a vocabulary we do not understand.
    Error,
}

impl JobState {
    /// Check if this is a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Cancelled | JobState::Error)
    }

    /// Map a provider status name onto the normalized vocabulary.
    ///
    /// Returns `None` for names outside the known vocabulary; callers fold
    /// those into [`JobState::Error`] via [`JobStatus::from_provider`].
    pub fn from_provider_status(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "INITIALIZING" | "QUEUED" | "VALIDATING" | "PENDING" => Some(JobState::Pending),
            "RUNNING" => Some(JobState::Running),
            "DONE" | "COMPLETED" => Some(JobState::Done),
            "CANCELLED" | "CANCELED" => Some(JobState::Cancelled),
            "ERROR" | "FAILED" => Some(JobState::Error),
            _ => None,
        }
    }

    /// Canonical upper-case name.
    pub fn name(self) -> &'static str {
        match self {
            JobState::Pending => "PENDING",
            JobState::Running => "RUNNING",
            JobState::Done => "DONE",
            JobState::Cancelled => "CANCELLED",
            JobState::Error => "ERROR",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Observed status of a job: normalized state plus provider detail text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    /// Normalized state.
    pub state: JobState,
    /// Provider message or diagnostic.
    pub detail: String,
}

impl JobStatus {
    /// Create a status with an explicit detail message.
    pub fn new(state: JobState, detail: impl Into<String>) -> Self {
        Self {
            state,
            detail: detail.into(),
        }
    }

    /// Status for a job nobody has observed yet.
    pub fn unobserved() -> Self {
        Self::new(JobState::Pending, "status not yet observed")
    }

    /// Normalize a raw provider status.
    ///
    /// `detail` is the provider's accompanying message; when absent the raw
    /// status name is used. Unknown names become `Error` and the raw value is
    /// kept in the detail.
    pub fn from_provider(raw: &str, detail: Option<String>) -> Self {
        match JobState::from_provider_status(raw) {
            Some(state) => Self::new(state, detail.unwrap_or_else(|| raw.to_string())),
            None => {
                let mut text = format!("unrecognized provider status: {raw}");
                if let Some(extra) = detail {
                    text.push_str(" (");
                    text.push_str(&extra);
                    text.push(')');
                }
                Self::new(JobState::Error, text)
            }
        }
    }

    /// Check if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Check if the job completed successfully.
    pub fn is_done(&self) -> bool {
        self.state == JobState::Done
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.detail.is_empty() {
            write!(f, "{}", self.state)
        } else {
            write!(f, "{}: {}", self.state, self.detail)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_state_terminal() {
        assert!(!JobState::Pending.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(JobState::Done.is_terminal());
        assert!(JobState::Cancelled.is_terminal());
        assert!(JobState::Error.is_terminal());
    }

    #[test]
    fn test_provider_vocabulary() {
        let cases = [
            ("INITIALIZING", JobState::Pending),
            ("queued", JobState::Pending),
            ("Validating", JobState::Pending),
            ("RUNNING", JobState::Running),
            ("DONE", JobState::Done),
            ("Completed", JobState::Done),
            ("CANCELLED", JobState::Cancelled),
            ("canceled", JobState::Cancelled),
            ("ERROR", JobState::Error),
            ("Failed", JobState::Error),
        ];
        for (raw, expected) in cases {
            assert_eq!(JobState::from_provider_status(raw), Some(expected), "{raw}");
        }
    }

    #[test]
    fn test_unknown_status_maps_to_error_with_raw_detail() {
        let status = JobStatus::from_provider("ARCHIVED", None);
        assert_eq!(status.state, JobState::Error);
        assert!(status.detail.contains("ARCHIVED"));

        let status = JobStatus::from_provider("HELD", Some("operator hold".into()));
        assert!(status.detail.contains("HELD"));
        assert!(status.detail.contains("operator hold"));
    }

    #[test]
    fn test_known_status_keeps_provider_detail() {
        let status = JobStatus::from_provider("QUEUED", Some("job is queued (5)".into()));
        assert_eq!(status.state, JobState::Pending);
        assert_eq!(status.detail, "job is queued (5)");

        let status = JobStatus::from_provider("RUNNING", None);
        assert_eq!(status.detail, "RUNNING");
    }

    #[test]
    fn test_job_state_serde_names() {
        let json = serde_json::to_string(&JobState::Cancelled).unwrap();
        assert_eq!(json, "\"CANCELLED\"");
    }

    #[test]
    fn test_job_handle_display() {
        let handle = JobHandle::new("job-123", "ibm_torino", "ibm_quantum_platform");
        assert_eq!(handle.to_string(), "job-123 on ibm_quantum_platform/ibm_torino");
    }
}
