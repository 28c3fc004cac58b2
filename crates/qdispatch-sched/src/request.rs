//! Resource requests.

use serde::{Deserialize, Serialize};

use qdispatch_hal::{BackendKind, BackendRecord};

/// A caller's execution requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequest {
    /// Minimum number of qubits required.
    pub min_qubits: u32,
    /// Required backend kind; `None` accepts both.
    #[serde(default)]
    pub kind: Option<BackendKind>,
    /// Routing group the backend must belong to.
    pub routing_group: String,
}

impl ResourceRequest {
    /// Create a request accepting any backend kind.
    pub fn new(min_qubits: u32, routing_group: impl Into<String>) -> Self {
        Self {
            min_qubits,
            kind: None,
            routing_group: routing_group.into(),
        }
    }

    /// Require a specific backend kind.
    pub fn with_kind(mut self, kind: BackendKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Require a simulator.
    pub fn simulator(self) -> Self {
        self.with_kind(BackendKind::Simulator)
    }

    /// Require physical hardware.
    pub fn physical(self) -> Self {
        self.with_kind(BackendKind::Physical)
    }

    /// Eligibility predicate.
    ///
    /// A record is eligible iff it is active, has at least `min_qubits`
    /// qubits, matches `kind` when one is requested, and lives in the same
    /// routing group.
    pub fn admits(&self, record: &BackendRecord) -> bool {
        record.active
            && record.qubit_count >= self.min_qubits
            && self.kind.is_none_or(|kind| record.kind == kind)
            && record.routing_group == self.routing_group
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(qubits: u32, kind: BackendKind, group: &str) -> BackendRecord {
        BackendRecord::new("b", qubits, kind).with_routing_group(group)
    }

    #[test]
    fn test_admits_qubit_boundary() {
        let request = ResourceRequest::new(5, "g1");
        assert!(request.admits(&record(5, BackendKind::Physical, "g1")));
        assert!(!request.admits(&record(4, BackendKind::Physical, "g1")));
    }

    #[test]
    fn test_admits_kind_filter() {
        let any = ResourceRequest::new(1, "g1");
        let sim_only = ResourceRequest::new(1, "g1").simulator();

        let qpu = record(5, BackendKind::Physical, "g1");
        assert!(any.admits(&qpu));
        assert!(!sim_only.admits(&qpu));
        assert!(sim_only.admits(&record(5, BackendKind::Simulator, "g1")));
    }

    #[test]
    fn test_admits_requires_same_group_and_active() {
        let request = ResourceRequest::new(1, "g1");
        assert!(!request.admits(&record(5, BackendKind::Simulator, "g2")));
        assert!(!request.admits(&record(5, BackendKind::Simulator, "g1").with_active(false)));
    }

    #[test]
    fn test_request_deserializes_without_kind() {
        let request: ResourceRequest =
            serde_json::from_str(r#"{"min_qubits": 3, "routing_group": "g1"}"#).unwrap();
        assert_eq!(request.kind, None);
    }
}
