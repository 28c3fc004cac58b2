//! Provider session traits.
//!
//! # Lifecycle
//!
//! ```text
//!   SessionConnector::connect(credential, routing_group)
//!          │
//!          ▼
//!   ProviderSession ──→ live_backends()   (selection)
//!                  ──→ job_status(id)    (monitoring, repeated)
//!                  ──→ job_result(id)    (once, after Done)
//! ```
//!
//! Each vendor adapter implements both traits. The core only ever sees
//! these shapes; any other vendor fields stay inside the adapter or travel
//! as opaque metadata on [`BackendRecord`].
//!
//! ## Method table
//!
//! | Trait | Method | Returns |
//! |-------|--------|---------|
//! | `ProviderSession` | `provider()` | `&str` |
//! | `ProviderSession` | `routing_group()` | `&str` |
//! | `ProviderSession` | `live_backends()` | `HalResult<Vec<LiveBackend>>` |
//! | `ProviderSession` | `job_status()` | `HalResult<JobStatus>` |
//! | `ProviderSession` | `job_result()` | `HalResult<Counts>` |
//! | `SessionConnector` | `connect()` | `HalResult<Box<dyn ProviderSession>>` |
//! | `SessionConnector` | `discover()` | `HalResult<Vec<BackendRecord>>` (provided) |
//! | `SessionConnector` | `routing_groups()` | `HalResult<Vec<String>>` (provided) |

use async_trait::async_trait;

use crate::backend::{BackendRecord, LiveBackend};
use crate::credential::ProviderCredential;
use crate::error::{HalError, HalResult};
use crate::job::{JobId, JobStatus};
use crate::result::Counts;

/// An authenticated connection to a remote execution provider.
///
/// Sessions are `Send + Sync` so independent monitors can share one when
/// the adapter pools connections; a session never holds per-job state.
#[async_trait]
pub trait ProviderSession: Send + Sync {
    /// Provider name (e.g. "ibmq").
    fn provider(&self) -> &str;

    /// Routing group the session was opened for.
    fn routing_group(&self) -> &str;

    /// Live operational status of every backend visible to the session.
    async fn live_backends(&self) -> HalResult<Vec<LiveBackend>>;

    /// Current status of a job, normalized to [`JobStatus`].
    async fn job_status(&self, job_id: &JobId) -> HalResult<JobStatus>;

    /// Outcome counts of a completed job.
    ///
    /// Only meaningful once `job_status` reported `Done`.
    async fn job_result(&self, job_id: &JobId) -> HalResult<Counts>;
}

/// Opens provider sessions from stored credentials.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    /// Provider name this connector serves.
    fn provider_name(&self) -> &str;

    /// Open a session for `routing_group`.
    ///
    /// Fails with [`HalError::Connection`] or
    /// [`HalError::AuthenticationFailed`] when the provider is unreachable
    /// or rejects the credential.
    async fn connect(
        &self,
        credential: &ProviderCredential,
        routing_group: &str,
    ) -> HalResult<Box<dyn ProviderSession>>;

    /// Scan the provider and describe every backend in `routing_group`.
    ///
    /// Records that cannot be described are skipped by the adapter.
    async fn discover(
        &self,
        credential: &ProviderCredential,
        routing_group: &str,
    ) -> HalResult<Vec<BackendRecord>> {
        let _ = (credential, routing_group);
        Err(HalError::Unsupported(format!(
            "{} does not support backend discovery",
            self.provider_name()
        )))
    }

    /// Distinct routing groups visible to the credential.
    async fn routing_groups(&self, credential: &ProviderCredential) -> HalResult<Vec<String>> {
        let _ = credential;
        Err(HalError::Unsupported(format!(
            "{} does not list routing groups",
            self.provider_name()
        )))
    }
}
