//! qdispatch Scripted Provider
//!
//! An in-process provider whose backends, live status and job lifecycles
//! are set up by the caller. It exercises the selection and monitoring core
//! without network access.
//!
//! # Features
//!
//! - **Backends**: catalog records plus an activity metric for each
//! - **Status scripts**: each job replays a list of [`Step`]s, one per poll;
//!   the last step repeats
//! - **Failure injection**: refused connections, failing live status
//!   queries, unreachable polls, unrecognized provider statuses
//! - **Counters**: connections, live queries and polls per job
//!
//! # Example
//!
//! ```ignore
//! use qdispatch_adapter_sim::{SimProvider, Step};
//! use qdispatch_hal::{BackendKind, BackendRecord, JobState};
//!
//! let sim = SimProvider::new().with_backend(
//!     BackendRecord::new("simA", 5, BackendKind::Simulator).with_routing_group("g1"),
//!     0.0,
//! );
//! let handle = sim.submit("simA", "g1", [JobState::Running.into(), JobState::Done.into()]);
//! sim.set_counts(&handle.id, [("00", 512u64), ("11", 488)].into_iter().collect());
//! ```

mod provider;

pub use provider::{SimProvider, SimSession, Step};
