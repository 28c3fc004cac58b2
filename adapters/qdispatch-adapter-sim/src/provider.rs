//! Scripted provider implementation.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use tracing::debug;
use uuid::Uuid;

use qdispatch_hal::{
    BackendRecord, Counts, HalError, HalResult, JobHandle, JobId, JobState, JobStatus,
    LiveBackend, ProviderCredential, ProviderSession, SessionConnector,
};

/// One entry of a job's status script.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Report a normalized state.
    State(JobState),
    /// Report a raw provider status string, normalized on the way out.
    Raw(String),
    /// Fail the status query as if the provider were unreachable.
    Unreachable(String),
}

impl From<JobState> for Step {
    fn from(state: JobState) -> Self {
        Step::State(state)
    }
}

struct SimBackend {
    /// Catalog view; `None` for backends only visible as live status.
    record: Option<BackendRecord>,
    live: LiveBackend,
}

struct SimJob {
    script: Vec<Step>,
    cursor: usize,
    counts: Option<Counts>,
    polls: u32,
}

impl SimJob {
    /// Current step; the last entry repeats once the script is exhausted.
    fn advance(&mut self) -> Option<Step> {
        let step = self.script.get(self.cursor).cloned();
        if self.cursor + 1 < self.script.len() {
            self.cursor += 1;
        }
        step
    }
}

#[derive(Default)]
struct SimState {
    backends: Vec<SimBackend>,
    jobs: FxHashMap<String, SimJob>,
    refuse: Option<String>,
    refused_groups: FxHashMap<String, String>,
    live_failure: Option<String>,
    connections: u32,
    live_queries: u32,
}

/// In-process provider driven by scripts.
///
/// Cloning shares the underlying state, so a test can keep a handle for
/// inspection after registering a clone with a connector registry.
#[derive(Clone)]
pub struct SimProvider {
    name: String,
    state: Arc<Mutex<SimState>>,
}

impl SimProvider {
    /// Create a provider named "sim" with no backends.
    pub fn new() -> Self {
        Self::with_name("sim")
    }

    /// Create a provider answering to `name`.
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(SimState::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a backend and return the provider.
    pub fn with_backend(self, record: BackendRecord, activity_metric: f64) -> Self {
        self.add_backend(record, activity_metric);
        self
    }

    /// Add a backend. Active records report operational, inactive ones
    /// offline.
    pub fn add_backend(&self, record: BackendRecord, activity_metric: f64) {
        let live = if record.active {
            LiveBackend::operational(record.name.clone(), activity_metric)
        } else {
            LiveBackend::offline(record.name.clone(), "inactive")
        };
        self.state().backends.push(SimBackend {
            record: Some(record),
            live,
        });
    }

    /// Override the live status of a backend, adding a status-only entry
    /// when the name is unknown.
    pub fn set_live(&self, live: LiveBackend) {
        let mut state = self.state();
        match state.backends.iter_mut().find(|b| b.live.name == live.name) {
            Some(backend) => backend.live = live,
            None => state.backends.push(SimBackend { record: None, live }),
        }
    }

    /// Register a job under a fresh identifier.
    pub fn submit(
        &self,
        backend: impl Into<String>,
        routing_group: impl Into<String>,
        script: impl IntoIterator<Item = Step>,
    ) -> JobHandle {
        let handle = JobHandle::new(Uuid::new_v4().to_string(), backend, routing_group);
        self.insert_job(&handle.id, script);
        handle
    }

    /// Register a job under a known identifier, replacing any previous one.
    pub fn insert_job(&self, job_id: &JobId, script: impl IntoIterator<Item = Step>) {
        let job = SimJob {
            script: script.into_iter().collect(),
            cursor: 0,
            counts: None,
            polls: 0,
        };
        debug!("Registered scripted job: {}", job_id);
        self.state().jobs.insert(job_id.0.clone(), job);
    }

    /// Record the outcome counts returned once the job is done.
    pub fn set_counts(&self, job_id: &JobId, counts: Counts) {
        if let Some(job) = self.state().jobs.get_mut(&job_id.0) {
            job.counts = Some(counts);
        }
    }

    /// Make every connection attempt fail with `reason`.
    pub fn refuse_connections(&self, reason: impl Into<String>) {
        self.state().refuse = Some(reason.into());
    }

    /// Refuse connections for one routing group only.
    pub fn refuse_routing_group(&self, routing_group: impl Into<String>, reason: impl Into<String>) {
        self.state()
            .refused_groups
            .insert(routing_group.into(), reason.into());
    }

    /// Make live status queries fail with `reason`.
    pub fn fail_live_status(&self, reason: impl Into<String>) {
        self.state().live_failure = Some(reason.into());
    }

    /// Number of `connect` calls so far, successful or not.
    pub fn connection_count(&self) -> u32 {
        self.state().connections
    }

    /// Number of live status queries so far.
    pub fn live_query_count(&self) -> u32 {
        self.state().live_queries
    }

    /// Number of status polls a job has received.
    pub fn status_polls(&self, job_id: &JobId) -> u32 {
        self.state().jobs.get(&job_id.0).map_or(0, |j| j.polls)
    }

    fn refusal(&self, routing_group: Option<&str>) -> Option<HalError> {
        let state = self.state();
        state
            .refuse
            .as_ref()
            .or_else(|| routing_group.and_then(|g| state.refused_groups.get(g)))
            .map(|reason| HalError::connection(&self.name, reason.clone()))
    }
}

impl Default for SimProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionConnector for SimProvider {
    fn provider_name(&self) -> &str {
        &self.name
    }

    async fn connect(
        &self,
        credential: &ProviderCredential,
        routing_group: &str,
    ) -> HalResult<Box<dyn ProviderSession>> {
        self.state().connections += 1;
        if let Some(err) = self.refusal(Some(routing_group)) {
            return Err(err);
        }
        if credential.token.is_empty() {
            return Err(HalError::AuthenticationFailed(format!(
                "empty token for owner '{}'",
                credential.owner
            )));
        }

        debug!(provider = %self.name, routing_group, "opened scripted session");
        Ok(Box::new(SimSession {
            provider: self.name.clone(),
            routing_group: routing_group.to_string(),
            state: Arc::clone(&self.state),
        }))
    }

    async fn discover(
        &self,
        credential: &ProviderCredential,
        routing_group: &str,
    ) -> HalResult<Vec<BackendRecord>> {
        if let Some(err) = self.refusal(Some(routing_group)) {
            return Err(err);
        }
        let scanned_at = chrono::Utc::now().to_rfc3339();
        let records = self
            .state()
            .backends
            .iter()
            .filter_map(|b| b.record.as_ref())
            .filter(|r| r.routing_group == routing_group)
            .map(|r| {
                r.clone()
                    .with_owner(credential.owner.clone())
                    .with_metadata("last_updated", serde_json::json!(scanned_at))
            })
            .collect();
        Ok(records)
    }

    async fn routing_groups(&self, _credential: &ProviderCredential) -> HalResult<Vec<String>> {
        if let Some(err) = self.refusal(None) {
            return Err(err);
        }
        let mut groups: Vec<String> = self
            .state()
            .backends
            .iter()
            .filter_map(|b| b.record.as_ref())
            .map(|r| r.routing_group.clone())
            .collect();
        groups.sort();
        groups.dedup();
        Ok(groups)
    }
}

/// Session handed out by [`SimProvider`].
pub struct SimSession {
    provider: String,
    routing_group: String,
    state: Arc<Mutex<SimState>>,
}

impl SimSession {
    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ProviderSession for SimSession {
    fn provider(&self) -> &str {
        &self.provider
    }

    fn routing_group(&self) -> &str {
        &self.routing_group
    }

    async fn live_backends(&self) -> HalResult<Vec<LiveBackend>> {
        let mut state = self.state();
        state.live_queries += 1;
        if let Some(reason) = state.live_failure.clone() {
            return Err(HalError::connection(&self.provider, reason));
        }
        Ok(state
            .backends
            .iter()
            .filter(|b| {
                b.record
                    .as_ref()
                    .is_none_or(|r| r.routing_group == self.routing_group)
            })
            .map(|b| b.live.clone())
            .collect())
    }

    async fn job_status(&self, job_id: &JobId) -> HalResult<JobStatus> {
        let mut state = self.state();
        let job = state
            .jobs
            .get_mut(&job_id.0)
            .ok_or_else(|| HalError::JobNotFound(job_id.0.clone()))?;
        job.polls += 1;

        match job.advance() {
            None => Ok(JobStatus::new(JobState::Pending, "QUEUED")),
            Some(Step::State(state)) => Ok(JobStatus::new(state, state.name())),
            Some(Step::Raw(raw)) => Ok(JobStatus::from_provider(&raw, None)),
            Some(Step::Unreachable(reason)) => Err(HalError::connection(&self.provider, reason)),
        }
    }

    async fn job_result(&self, job_id: &JobId) -> HalResult<Counts> {
        let state = self.state();
        let job = state
            .jobs
            .get(&job_id.0)
            .ok_or_else(|| HalError::JobNotFound(job_id.0.clone()))?;
        job.counts
            .clone()
            .ok_or_else(|| HalError::Backend(format!("no result recorded for job {job_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qdispatch_hal::BackendKind;

    fn credential() -> ProviderCredential {
        ProviderCredential::new("alice", "sim", "token")
    }

    fn provider() -> SimProvider {
        SimProvider::new()
            .with_backend(
                BackendRecord::new("simA", 5, BackendKind::Simulator).with_routing_group("g1"),
                2.0,
            )
            .with_backend(
                BackendRecord::new("qpuB", 27, BackendKind::Physical).with_routing_group("g2"),
                9.0,
            )
    }

    #[tokio::test]
    async fn test_session_sees_only_its_group() {
        let sim = provider();
        let session = sim.connect(&credential(), "g1").await.unwrap();
        let live = session.live_backends().await.unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].name, "simA");
        assert_eq!(sim.live_query_count(), 1);
    }

    #[tokio::test]
    async fn test_script_repeats_last_step() {
        let sim = provider();
        let handle = sim.submit("simA", "g1", [JobState::Running.into(), JobState::Done.into()]);
        let session = sim.connect(&credential(), "g1").await.unwrap();

        let mut states = Vec::new();
        for _ in 0..3 {
            states.push(session.job_status(&handle.id).await.unwrap().state);
        }
        assert_eq!(states, vec![JobState::Running, JobState::Done, JobState::Done]);
        assert_eq!(sim.status_polls(&handle.id), 3);
    }

    #[tokio::test]
    async fn test_raw_status_is_normalized() {
        let sim = provider();
        let handle = sim.submit("simA", "g1", [Step::Raw("MYSTERY".into())]);
        let session = sim.connect(&credential(), "g1").await.unwrap();

        let status = session.job_status(&handle.id).await.unwrap();
        assert_eq!(status.state, JobState::Error);
        assert!(status.detail.contains("MYSTERY"));
    }

    #[tokio::test]
    async fn test_refused_connection() {
        let sim = provider();
        sim.refuse_connections("maintenance window");
        let result = sim.connect(&credential(), "g1").await;
        assert!(matches!(result, Err(HalError::Connection { .. })));
        assert_eq!(sim.connection_count(), 1);
    }

    #[tokio::test]
    async fn test_refused_routing_group_only() {
        let sim = provider();
        sim.refuse_routing_group("g2", "hub suspended");
        assert!(sim.connect(&credential(), "g1").await.is_ok());
        assert!(matches!(
            sim.connect(&credential(), "g2").await,
            Err(HalError::Connection { .. })
        ));
        assert_eq!(sim.connection_count(), 2);
    }

    #[tokio::test]
    async fn test_empty_token_rejected() {
        let sim = provider();
        let cred = ProviderCredential::new("alice", "sim", "");
        let result = sim.connect(&cred, "g1").await;
        assert!(matches!(result, Err(HalError::AuthenticationFailed(_))));
    }

    #[tokio::test]
    async fn test_discover_tags_owner() {
        let sim = provider();
        let records = sim.discover(&credential(), "g2").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "qpuB");
        assert_eq!(records[0].owner, "alice");
        assert!(records[0].metadata.contains_key("last_updated"));

        let groups = sim.routing_groups(&credential()).await.unwrap();
        assert_eq!(groups, vec!["g1", "g2"]);
    }

    #[tokio::test]
    async fn test_result_requires_recorded_counts() {
        let sim = provider();
        let handle = sim.submit("simA", "g1", [JobState::Done.into()]);
        let session = sim.connect(&credential(), "g1").await.unwrap();
        assert!(session.job_result(&handle.id).await.is_err());

        sim.set_counts(&handle.id, [("0", 10u64)].into_iter().collect());
        assert_eq!(session.job_result(&handle.id).await.unwrap().get("0"), 10);
    }
}
