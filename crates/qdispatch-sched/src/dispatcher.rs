//! The upward interface: select a backend, monitor a job, refresh the catalog.
//!
//! A [`Dispatcher`] ties together the credential store, the backend catalog
//! and the connector registry. Each operation resolves the owner's
//! credential, opens a fresh provider session for the routing group in play
//! and drops it when done.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use qdispatch_hal::{
    ConnectorRegistry, CredentialStore, HalError, JobHandle, ProviderCredential, ProviderSession,
};

use crate::catalog::BackendCatalog;
use crate::config::{DispatchConfig, MonitorConfig};
use crate::error::{SchedError, SchedResult};
use crate::monitor::{JobMonitor, JobResult};
use crate::request::ResourceRequest;
use crate::selector::BackendSelector;

/// Entry point for request-handling layers.
pub struct Dispatcher {
    credentials: Arc<dyn CredentialStore>,
    catalog: Arc<dyn BackendCatalog>,
    connectors: ConnectorRegistry,
    selector: BackendSelector,
    config: DispatchConfig,
}

impl Dispatcher {
    /// Create a dispatcher with the least-busy selector.
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        catalog: Arc<dyn BackendCatalog>,
        connectors: ConnectorRegistry,
        config: DispatchConfig,
    ) -> Self {
        Self {
            credentials,
            catalog,
            connectors,
            selector: BackendSelector::new(),
            config,
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// The backend catalog.
    pub fn catalog(&self) -> &Arc<dyn BackendCatalog> {
        &self.catalog
    }

    /// Resolve the routing group for an operation: the explicit one if
    /// given, else the credential's default, else the configured default.
    pub fn resolve_routing_group(
        &self,
        credential: &ProviderCredential,
        requested: Option<&str>,
    ) -> String {
        match requested {
            Some(group) if !group.trim().is_empty() => group.to_string(),
            _ => credential.default_routing_group(&self.config.default_routing_group),
        }
    }

    /// Look up the credential `owner` holds for `provider`.
    pub async fn credential(&self, owner: &str, provider: &str) -> SchedResult<ProviderCredential> {
        self.credentials
            .retrieve(owner, provider)
            .await
            .map_err(SchedError::from)
    }

    async fn connect(
        &self,
        credential: &ProviderCredential,
        provider: &str,
        routing_group: &str,
    ) -> SchedResult<Box<dyn ProviderSession>> {
        let connector = self.connectors.get(provider)?;
        connector
            .connect(credential, routing_group)
            .await
            .map_err(|e| {
                error!(provider, routing_group, owner = %credential.owner, "connection failed: {e}");
                SchedError::connection(provider, routing_group, &e)
            })
    }

    /// Choose a backend for `request` on behalf of `owner`.
    ///
    /// Returns `Ok(None)` when no cataloged backend is eligible; the provider
    /// is not contacted in that case.
    #[instrument(skip(self, request), fields(routing_group = %request.routing_group))]
    pub async fn select_backend(
        &self,
        owner: &str,
        provider: &str,
        request: &ResourceRequest,
    ) -> SchedResult<Option<String>> {
        let credential = self.credential(owner, provider).await?;
        let records = self
            .catalog
            .list(owner, provider, &request.routing_group)
            .await?;

        let shortlist = BackendSelector::shortlist(&records, request);
        if shortlist.is_empty() {
            info!(
                owner,
                provider,
                routing_group = %request.routing_group,
                min_qubits = request.min_qubits,
                "no eligible backend in catalog"
            );
            return Ok(None);
        }

        let session = self
            .connect(&credential, provider, &request.routing_group)
            .await?;
        self.selector
            .pick(&shortlist, session.as_ref(), &request.routing_group)
            .await
    }

    /// Poll one job until it settles.
    #[instrument(skip(self, config, cancel), fields(job_id = %handle.id))]
    pub async fn monitor_job(
        &self,
        owner: &str,
        provider: &str,
        handle: JobHandle,
        config: &MonitorConfig,
        cancel: &CancellationToken,
    ) -> SchedResult<JobResult> {
        let credential = self.credential(owner, provider).await?;
        let session = self
            .connect(&credential, provider, &handle.routing_group)
            .await?;

        let monitor = JobMonitor::new(config.clone());
        Ok(monitor.monitor(session.as_ref(), &handle, cancel).await)
    }

    /// Poll several jobs concurrently.
    ///
    /// One session is opened per distinct routing group; every job still
    /// gets its own loop. Results are returned in handle order. A routing
    /// group that cannot be reached fails only its own jobs, with a
    /// [`SchedError::Connection`] in their slots.
    pub async fn monitor_jobs(
        &self,
        owner: &str,
        provider: &str,
        handles: &[JobHandle],
        config: &MonitorConfig,
        cancel: &CancellationToken,
    ) -> SchedResult<Vec<SchedResult<JobResult>>> {
        let credential = self.credential(owner, provider).await?;
        self.connectors.get(provider)?;

        let mut sessions: FxHashMap<&str, Result<Box<dyn ProviderSession>, String>> =
            FxHashMap::default();
        for handle in handles {
            let group = handle.routing_group.as_str();
            if !sessions.contains_key(group) {
                let session = match self.connect(&credential, provider, group).await {
                    Ok(session) => Ok(session),
                    Err(SchedError::Connection { reason, .. }) => Err(reason),
                    Err(other) => Err(other.to_string()),
                };
                sessions.insert(group, session);
            }
        }

        let monitor = JobMonitor::new(config.clone());
        let sessions = &sessions;
        let monitor = &monitor;
        let loops = handles.iter().map(|handle| async move {
            match sessions.get(handle.routing_group.as_str()) {
                Some(Ok(session)) => Ok(monitor.monitor(session.as_ref(), handle, cancel).await),
                Some(Err(reason)) => Err(SchedError::Connection {
                    provider: provider.to_string(),
                    routing_group: handle.routing_group.clone(),
                    reason: reason.clone(),
                }),
                None => Err(SchedError::Connection {
                    provider: provider.to_string(),
                    routing_group: handle.routing_group.clone(),
                    reason: "no session opened".to_string(),
                }),
            }
        });
        Ok(futures::future::join_all(loops).await)
    }

    /// Re-discover the backends of one routing group and store them.
    ///
    /// Records of other routing groups already in the catalog are kept.
    /// Returns the number of records discovered.
    #[instrument(skip(self))]
    pub async fn refresh_backends(
        &self,
        owner: &str,
        provider: &str,
        routing_group: Option<&str>,
    ) -> SchedResult<usize> {
        let credential = self.credential(owner, provider).await?;
        let group = self.resolve_routing_group(&credential, routing_group);
        let connector = self.connectors.get(provider)?;

        let discovered = connector
            .discover(&credential, &group)
            .await
            .map_err(|e| discovery_error(provider, &group, e))?;
        let count = discovered.len();

        let mut records = match self.catalog.list_all(owner, provider).await {
            Ok(records) => records,
            Err(SchedError::NotFound(_)) => Vec::new(),
            Err(e) => return Err(e),
        };
        let replaced = records.iter().filter(|r| r.routing_group == group).count();
        records.retain(|r| r.routing_group != group);
        records.extend(discovered);

        self.catalog.store(owner, provider, records).await?;
        info!(
            owner,
            provider,
            routing_group = %group,
            discovered = count,
            replaced,
            "refreshed backend catalog"
        );
        Ok(count)
    }

    /// Routing groups visible to `owner`'s credential.
    pub async fn routing_groups(&self, owner: &str, provider: &str) -> SchedResult<Vec<String>> {
        let credential = self.credential(owner, provider).await?;
        let connector = self.connectors.get(provider)?;
        let groups = connector
            .routing_groups(&credential)
            .await
            .map_err(|e| discovery_error(provider, "*", e))?;
        debug!(owner, provider, groups = ?groups, "listed routing groups");
        Ok(groups)
    }
}

fn discovery_error(provider: &str, routing_group: &str, err: HalError) -> SchedError {
    match err {
        HalError::Connection { .. } | HalError::AuthenticationFailed(_) => {
            error!(provider, routing_group, "discovery failed: {err}");
            SchedError::connection(provider, routing_group, &err)
        }
        other => SchedError::from(other),
    }
}
