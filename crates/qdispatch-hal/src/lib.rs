//! qdispatch Provider Abstraction Layer
//!
//! This crate provides the shared vocabulary between the backend selection
//! core and the vendor adapters that talk to remote quantum providers.
//!
//! # Overview
//!
//! - [`BackendRecord`] / [`LiveBackend`]: cached and live views of a backend
//! - [`JobHandle`], [`JobState`], [`JobStatus`]: the normalized job lifecycle
//! - [`ProviderSession`] / [`SessionConnector`]: the capability interface
//!   every adapter implements
//! - [`CredentialStore`]: lookup of owner credentials
//! - [`ConnectorRegistry`]: resolve a provider name to its connector
//!
//! # Supported Providers
//!
//! | Provider | Crate | Authentication |
//! |----------|-------|----------------|
//! | Scripted simulator | `qdispatch-adapter-sim` | None |
//! | IBM Quantum | `qdispatch-adapter-ibm` | API token (credential store) |
//!
//! # Implementing an Adapter
//!
//! ```ignore
//! use qdispatch_hal::{
//!     Counts, HalResult, JobId, JobStatus, LiveBackend, ProviderCredential,
//!     ProviderSession, SessionConnector,
//! };
//! use async_trait::async_trait;
//!
//! struct MySession { group: String }
//!
//! #[async_trait]
//! impl ProviderSession for MySession {
//!     fn provider(&self) -> &str { "mine" }
//!     fn routing_group(&self) -> &str { &self.group }
//!
//!     async fn live_backends(&self) -> HalResult<Vec<LiveBackend>> {
//!         Ok(vec![LiveBackend::operational("dev1", 0.0)])
//!     }
//!
//!     async fn job_status(&self, job_id: &JobId) -> HalResult<JobStatus> {
//!         // Query the vendor and normalize
//!         # todo!()
//!     }
//!
//!     async fn job_result(&self, job_id: &JobId) -> HalResult<Counts> {
//!         # todo!()
//!     }
//! }
//! ```

pub mod backend;
pub mod credential;
pub mod error;
pub mod job;
pub mod registry;
pub mod result;
pub mod session;

pub use backend::{BackendKind, BackendRecord, LiveBackend};
pub use credential::{
    CredentialStore, DEFAULT_ROUTING_GROUP, InMemoryCredentialStore, JsonCredentialStore,
    ProviderCredential,
};
pub use error::{HalError, HalResult};
pub use job::{JobHandle, JobId, JobState, JobStatus};
pub use registry::ConnectorRegistry;
pub use result::Counts;
pub use session::{ProviderSession, SessionConnector};
