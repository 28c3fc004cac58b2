//! Backend selection: shortlist from the catalog, then pick a live one.

use std::cmp::Ordering;

use tracing::{debug, error, info};

use qdispatch_hal::{BackendRecord, LiveBackend, ProviderSession};

use crate::error::{SchedError, SchedResult};
use crate::request::ResourceRequest;

/// Policy choosing one backend among verified-live candidates.
pub trait SelectionPolicy: Send + Sync {
    /// Policy name for logs.
    fn name(&self) -> &str;

    /// Choose a candidate. `candidates` are operational and in shortlist
    /// order; returning `None` means none is acceptable.
    fn choose<'a>(&self, candidates: &'a [LiveBackend]) -> Option<&'a LiveBackend>;
}

/// Pick the candidate with the lowest activity metric.
///
/// Ties go to the candidate listed first.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeastBusy;

impl SelectionPolicy for LeastBusy {
    fn name(&self) -> &str {
        "least-busy"
    }

    fn choose<'a>(&self, candidates: &'a [LiveBackend]) -> Option<&'a LiveBackend> {
        candidates
            .iter()
            .filter(|c| !c.activity_metric.is_nan())
            .fold(None, |best: Option<&LiveBackend>, candidate| match best {
                Some(b)
                    if b.activity_metric.partial_cmp(&candidate.activity_metric)
                        != Some(Ordering::Greater) =>
                {
                    Some(b)
                }
                _ => Some(candidate),
            })
    }
}

/// Filters catalog records and picks one backend.
pub struct BackendSelector {
    policy: Box<dyn SelectionPolicy>,
}

impl BackendSelector {
    /// Create a selector with the least-busy policy.
    pub fn new() -> Self {
        Self::with_policy(LeastBusy)
    }

    /// Create a selector with a custom policy.
    pub fn with_policy(policy: impl SelectionPolicy + 'static) -> Self {
        Self {
            policy: Box::new(policy),
        }
    }

    /// Names of the records eligible for `request`, in catalog order.
    pub fn shortlist(records: &[BackendRecord], request: &ResourceRequest) -> Vec<String> {
        let names: Vec<String> = records
            .iter()
            .filter(|r| request.admits(r))
            .map(|r| r.name.clone())
            .collect();

        debug!(
            routing_group = %request.routing_group,
            min_qubits = request.min_qubits,
            candidates = ?names,
            "shortlisted {} of {} backends",
            names.len(),
            records.len()
        );
        names
    }

    /// Pick one shortlisted backend that the provider reports operational.
    ///
    /// An empty shortlist is a legitimate "no match" and yields `Ok(None)`
    /// without contacting the provider. A session opened for a different
    /// routing group, a provider failure, or a shortlist with no operational
    /// member is a [`SchedError::Selection`].
    pub async fn pick(
        &self,
        shortlist: &[String],
        session: &dyn ProviderSession,
        routing_group: &str,
    ) -> SchedResult<Option<String>> {
        if shortlist.is_empty() {
            return Ok(None);
        }

        if session.routing_group() != routing_group {
            error!(
                session_group = session.routing_group(),
                routing_group, "session opened for another routing group"
            );
            return Err(SchedError::selection(
                routing_group,
                format!(
                    "session belongs to routing group '{}'",
                    session.routing_group()
                ),
            ));
        }

        let live = session.live_backends().await.map_err(|e| {
            error!(
                provider = session.provider(),
                routing_group, "live backend query failed: {e}"
            );
            SchedError::selection(routing_group, format!("provider status unavailable: {e}"))
        })?;

        // Keep shortlist order so the policy's tie-break is deterministic.
        let candidates: Vec<LiveBackend> = shortlist
            .iter()
            .filter_map(|name| live.iter().find(|l| &l.name == name))
            .filter(|l| l.operational)
            .cloned()
            .collect();

        match self.policy.choose(&candidates) {
            Some(chosen) => {
                info!(
                    backend = %chosen.name,
                    routing_group,
                    activity = chosen.activity_metric,
                    policy = self.policy.name(),
                    "selected backend"
                );
                Ok(Some(chosen.name.clone()))
            }
            None => {
                error!(
                    routing_group,
                    shortlist = ?shortlist,
                    "no shortlisted backend is operational"
                );
                Err(SchedError::selection(
                    routing_group,
                    format!(
                        "none of the {} shortlisted backends is operational",
                        shortlist.len()
                    ),
                ))
            }
        }
    }
}

impl Default for BackendSelector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use qdispatch_hal::{BackendKind, Counts, HalError, HalResult, JobId, JobStatus};
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    /// Mock session for testing.
    struct MockSession {
        live: HalResult<Vec<LiveBackend>>,
        queries: AtomicUsize,
    }

    impl MockSession {
        fn new(live: Vec<LiveBackend>) -> Self {
            Self {
                live: Ok(live),
                queries: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                live: Err(HalError::connection("mock", "unreachable")),
                queries: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ProviderSession for MockSession {
        fn provider(&self) -> &str {
            "mock"
        }

        fn routing_group(&self) -> &str {
            "g1"
        }

        async fn live_backends(&self) -> HalResult<Vec<LiveBackend>> {
            self.queries.fetch_add(1, AtomicOrdering::SeqCst);
            match &self.live {
                Ok(live) => Ok(live.clone()),
                Err(e) => Err(HalError::Backend(e.to_string())),
            }
        }

        async fn job_status(&self, _job_id: &JobId) -> HalResult<JobStatus> {
            unreachable!("selection never polls jobs")
        }

        async fn job_result(&self, _job_id: &JobId) -> HalResult<Counts> {
            unreachable!("selection never fetches results")
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_shortlist_scenario_a() {
        let catalog = vec![
            BackendRecord::new("simA", 5, BackendKind::Simulator).with_routing_group("g1"),
        ];
        let request = ResourceRequest::new(3, "g1").simulator();
        assert_eq!(BackendSelector::shortlist(&catalog, &request), vec!["simA"]);
    }

    #[test]
    fn test_shortlist_scenario_b() {
        let catalog = vec![
            BackendRecord::new("simA", 5, BackendKind::Simulator).with_routing_group("g1"),
        ];
        let request = ResourceRequest::new(10, "g1").simulator();
        assert!(BackendSelector::shortlist(&catalog, &request).is_empty());
    }

    #[test]
    fn test_shortlist_keeps_catalog_order_and_skips_inactive() {
        let catalog = vec![
            BackendRecord::new("b", 20, BackendKind::Physical).with_routing_group("g1"),
            BackendRecord::new("a", 20, BackendKind::Physical)
                .with_routing_group("g1")
                .with_active(false),
            BackendRecord::new("c", 20, BackendKind::Simulator).with_routing_group("g1"),
        ];
        let request = ResourceRequest::new(2, "g1");
        assert_eq!(BackendSelector::shortlist(&catalog, &request), vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_pick_empty_shortlist_skips_provider() {
        let session = MockSession::failing();
        let picked = BackendSelector::new().pick(&[], &session, "g1").await.unwrap();
        assert_eq!(picked, None);
        assert_eq!(session.queries.load(AtomicOrdering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_pick_least_busy() {
        let session = MockSession::new(vec![
            LiveBackend::operational("a", 12.0),
            LiveBackend::operational("b", 3.0),
            LiveBackend::operational("c", 7.0),
        ]);
        let picked = BackendSelector::new()
            .pick(&names(&["a", "b", "c"]), &session, "g1")
            .await
            .unwrap();
        assert_eq!(picked.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_pick_ignores_backends_outside_shortlist() {
        // "z" is idle but was filtered out by the catalog.
        let session = MockSession::new(vec![
            LiveBackend::operational("z", 0.0),
            LiveBackend::operational("a", 9.0),
        ]);
        let picked = BackendSelector::new()
            .pick(&names(&["a"]), &session, "g1")
            .await
            .unwrap();
        assert_eq!(picked.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_pick_skips_non_operational() {
        let session = MockSession::new(vec![
            LiveBackend::offline("a", "maintenance"),
            LiveBackend::operational("b", 40.0),
        ]);
        let picked = BackendSelector::new()
            .pick(&names(&["a", "b"]), &session, "g1")
            .await
            .unwrap();
        assert_eq!(picked.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_pick_tie_goes_to_first_in_shortlist() {
        let session = MockSession::new(vec![
            LiveBackend::operational("b", 5.0),
            LiveBackend::operational("a", 5.0),
        ]);
        let picked = BackendSelector::new()
            .pick(&names(&["a", "b"]), &session, "g1")
            .await
            .unwrap();
        assert_eq!(picked.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_pick_no_operational_candidate_is_selection_error() {
        let session = MockSession::new(vec![
            LiveBackend::offline("a", "maintenance"),
            LiveBackend::operational("other", 0.0),
        ]);
        let result = BackendSelector::new()
            .pick(&names(&["a", "missing"]), &session, "g1")
            .await;
        assert!(matches!(result, Err(SchedError::Selection { .. })));
    }

    #[tokio::test]
    async fn test_pick_provider_failure_is_selection_error() {
        let session = MockSession::failing();
        let result = BackendSelector::new()
            .pick(&names(&["a"]), &session, "g1")
            .await;
        match result {
            Err(SchedError::Selection {
                routing_group,
                reason,
            }) => {
                assert_eq!(routing_group, "g1");
                assert!(reason.contains("unreachable"));
            }
            other => panic!("expected selection error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_pick_rejects_session_of_other_group() {
        let session = MockSession::new(vec![LiveBackend::operational("a", 0.0)]);
        let result = BackendSelector::new()
            .pick(&names(&["a"]), &session, "g2")
            .await;
        match result {
            Err(SchedError::Selection { routing_group, .. }) => assert_eq!(routing_group, "g2"),
            other => panic!("expected selection error, got {other:?}"),
        }
        assert_eq!(session.queries.load(AtomicOrdering::SeqCst), 0);
    }

    #[test]
    fn test_least_busy_ignores_nan_metric() {
        let candidates = vec![
            LiveBackend::operational("a", f64::NAN),
            LiveBackend::operational("b", 100.0),
        ];
        let chosen = LeastBusy.choose(&candidates).map(|c| c.name.as_str());
        assert_eq!(chosen, Some("b"));
    }
}
