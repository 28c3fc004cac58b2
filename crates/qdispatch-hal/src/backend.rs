//! Backend records and live backend status.
//!
//! Two views of a backend exist:
//!
//! - [`BackendRecord`] is the cached, immutable snapshot produced by a
//!   discovery scan and served by a catalog. It answers "could this backend
//!   run the job at all?".
//! - [`LiveBackend`] is what a provider session reports right now. It
//!   answers "is it up, and how busy is it?".

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of execution backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Classical simulator.
    Simulator,
    /// Physical quantum processor.
    #[serde(alias = "qpu")]
    Physical,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Simulator => write!(f, "simulator"),
            BackendKind::Physical => write!(f, "physical"),
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "simulator" | "sim" => Ok(BackendKind::Simulator),
            "physical" | "qpu" | "hardware" => Ok(BackendKind::Physical),
            other => Err(format!("unknown backend kind '{other}'")),
        }
    }
}

/// Snapshot of a discovered backend.
///
/// `name` is unique within one provider and routing group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendRecord {
    /// Backend name as the provider knows it.
    pub name: String,
    /// Number of qubits.
    pub qubit_count: u32,
    /// Simulator or physical device.
    pub kind: BackendKind,
    /// Whether the backend was operational at discovery time.
    pub active: bool,
    /// Routing group (hub / channel / instance) the backend belongs to.
    pub routing_group: String,
    /// Owner whose credential discovered the backend.
    pub owner: String,
    /// Opaque provider metadata, passed through untouched.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl BackendRecord {
    /// Create an active record with empty routing group and owner.
    pub fn new(name: impl Into<String>, qubit_count: u32, kind: BackendKind) -> Self {
        Self {
            name: name.into(),
            qubit_count,
            kind,
            active: true,
            routing_group: String::new(),
            owner: String::new(),
            metadata: serde_json::Map::new(),
        }
    }

    /// Set the routing group.
    pub fn with_routing_group(mut self, routing_group: impl Into<String>) -> Self {
        self.routing_group = routing_group.into();
        self
    }

    /// Set the owner.
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    /// Set the active flag.
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Add a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Live status of a backend as reported by a provider session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveBackend {
    /// Backend name.
    pub name: String,
    /// Whether the backend currently accepts jobs.
    pub operational: bool,
    /// Load indicator; lower is less busy. Typically pending jobs in queue.
    pub activity_metric: f64,
    /// Human-readable status message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
}

impl LiveBackend {
    /// An operational backend with the given load.
    pub fn operational(name: impl Into<String>, activity_metric: f64) -> Self {
        Self {
            name: name.into(),
            operational: true,
            activity_metric,
            status_message: None,
        }
    }

    /// A backend that is not accepting jobs.
    pub fn offline(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            operational: false,
            activity_metric: f64::INFINITY,
            status_message: Some(reason.into()),
        }
    }
}
