//! IBM Quantum provider adapter for qdispatch.
//!
//! Implements the `qdispatch-hal` session traits against the IBM Quantum
//! REST API: backend discovery, live queue status for least-busy selection,
//! and job status/result polling.
//!
//! # Credentials
//!
//! | `additionalInfo` key | Effect |
//! |----------------------|--------|
//! | `serviceCrn` | Use the IBM Cloud API; the token is an API key exchanged via IAM |
//! | `endpoint` | Legacy endpoint override |
//! | `defaultHub` | Routing group used when the caller names none |
//!
//! Without `serviceCrn` the token is sent directly as a bearer token to the
//! legacy endpoint, and the routing group scopes requests as the hub.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use qdispatch_adapter_ibm::IbmConnector;
//! use qdispatch_hal::ConnectorRegistry;
//!
//! let mut registry = ConnectorRegistry::new();
//! registry.register(Arc::new(IbmConnector::new()));
//! ```

mod api;
mod error;
mod session;

pub use api::{BackendInfo, BackendStatus, DEFAULT_ENDPOINT, IbmClient, LEGACY_ENDPOINT};
pub use error::{IbmError, IbmResult};
pub use session::{IbmConnector, IbmSession};
