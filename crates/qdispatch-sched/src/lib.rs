//! qdispatch backend selection and job monitoring.
//!
//! This crate decides where a quantum job should run and watches it until
//! it settles. It talks to providers only through the session traits of
//! `qdispatch-hal`.
//!
//! # Flow
//!
//! ```text
//!   ResourceRequest
//!        │
//!        ▼
//!   BackendCatalog::list ──→ BackendSelector::shortlist ──→ BackendSelector::pick
//!                                                              │ (live status)
//!                                                              ▼
//!                                            caller submits, gets a JobHandle
//!                                                              │
//!                                                              ▼
//!                                         JobMonitor::monitor ──→ JobResult
//! ```
//!
//! # Components
//!
//! - [`BackendCatalog`]: cached backend records per owner and provider
//! - [`BackendSelector`]: eligibility filtering and least-busy choice
//! - [`JobMonitor`]: bounded, cancellable status polling
//! - [`Dispatcher`]: the upward interface wiring the above to credentials
//!   and provider connectors
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use qdispatch_hal::{ConnectorRegistry, JsonCredentialStore};
//! use qdispatch_sched::{DispatchConfig, Dispatcher, JsonCatalog, ResourceRequest};
//!
//! let config = DispatchConfig::default();
//! let catalog = JsonCatalog::new(&config.catalog_dir).await?;
//! let credentials = JsonCredentialStore::new(&config.credentials_file);
//! let dispatcher = Dispatcher::new(
//!     Arc::new(credentials),
//!     Arc::new(catalog),
//!     ConnectorRegistry::new(),
//!     config,
//! );
//!
//! let request = ResourceRequest::new(5, "ibm_quantum_platform").physical();
//! let backend = dispatcher.select_backend("alice", "ibmq", &request).await?;
//! ```

pub mod catalog;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod monitor;
pub mod request;
pub mod selector;

pub use catalog::{BackendCatalog, InMemoryCatalog, JsonCatalog};
pub use config::{DispatchConfig, MonitorConfig, default_config_dir};
pub use dispatcher::Dispatcher;
pub use error::{ResultFetchError, SchedError, SchedResult};
pub use monitor::{BackendRef, JobMonitor, JobResult, MonitorOutcome};
pub use request::ResourceRequest;
pub use selector::{BackendSelector, LeastBusy, SelectionPolicy};

// Re-export the cancellation token so callers need not depend on tokio-util.
pub use tokio_util::sync::CancellationToken;
