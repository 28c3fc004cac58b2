//! IBM Quantum provider session and connector.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use qdispatch_hal::{
    BackendKind, BackendRecord, Counts, HalResult, JobId, JobStatus, LiveBackend,
    ProviderCredential, ProviderSession, SessionConnector,
};

use crate::api::{BackendInfo, IbmClient, JobResultResponse, LEGACY_ENDPOINT};
use crate::error::{IbmError, IbmResult, PROVIDER};

/// Credential key holding a Cloud API service CRN.
const SERVICE_CRN_KEY: &str = "serviceCrn";

/// Credential key overriding the legacy endpoint.
const ENDPOINT_KEY: &str = "endpoint";

/// Opens IBM Quantum sessions from stored credentials.
///
/// A credential whose `additionalInfo` carries `serviceCrn` uses the IBM
/// Cloud API key flow; any other credential uses the legacy token flow with
/// the routing group as the hub/group/project instance.
#[derive(Debug, Clone, Default)]
pub struct IbmConnector {
    endpoint: Option<String>,
}

impl IbmConnector {
    /// Create a connector using the default endpoints.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the legacy endpoint for every credential.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    async fn client_for(
        &self,
        credential: &ProviderCredential,
        routing_group: &str,
    ) -> IbmResult<IbmClient> {
        if let Some(crn) = credential
            .additional_info
            .get(SERVICE_CRN_KEY)
            .and_then(serde_json::Value::as_str)
        {
            info!(owner = %credential.owner, "connecting to IBM Cloud API (IAM key exchange)");
            return IbmClient::connect(&credential.token, crn).await;
        }

        let endpoint = self
            .endpoint
            .as_deref()
            .or_else(|| {
                credential
                    .additional_info
                    .get(ENDPOINT_KEY)
                    .and_then(serde_json::Value::as_str)
            })
            .unwrap_or(LEGACY_ENDPOINT);
        debug!(owner = %credential.owner, endpoint, routing_group, "using legacy IBM Quantum token");
        Ok(IbmClient::new(endpoint, &credential.token)?.with_instance(routing_group))
    }
}

#[async_trait]
impl SessionConnector for IbmConnector {
    fn provider_name(&self) -> &str {
        PROVIDER
    }

    async fn connect(
        &self,
        credential: &ProviderCredential,
        routing_group: &str,
    ) -> HalResult<Box<dyn ProviderSession>> {
        let client = self.client_for(credential, routing_group).await?;
        Ok(Box::new(IbmSession {
            client: Arc::new(client),
            routing_group: routing_group.to_string(),
        }))
    }

    async fn discover(
        &self,
        credential: &ProviderCredential,
        routing_group: &str,
    ) -> HalResult<Vec<BackendRecord>> {
        let client = self.client_for(credential, routing_group).await?;
        let backends = client.list_backends().await?;
        let scanned_at = chrono::Utc::now().to_rfc3339();

        let records: Vec<BackendRecord> = backends
            .iter()
            .filter_map(|info| {
                let record = backend_record(info, routing_group, &credential.owner, &scanned_at);
                if record.is_none() {
                    warn!(backend = %info.name, "skipping backend with unreadable description");
                }
                record
            })
            .collect();

        info!(
            routing_group,
            owner = %credential.owner,
            "discovered {} of {} IBM backends",
            records.len(),
            backends.len()
        );
        Ok(records)
    }

    async fn routing_groups(&self, credential: &ProviderCredential) -> HalResult<Vec<String>> {
        let fallback = credential.default_routing_group(qdispatch_hal::DEFAULT_ROUTING_GROUP);
        let client = self.client_for(credential, &fallback).await?;
        let mut groups = client.list_instances().await?;
        groups.sort();
        groups.dedup();
        Ok(groups)
    }
}

/// An authenticated IBM Quantum session for one routing group.
pub struct IbmSession {
    client: Arc<IbmClient>,
    routing_group: String,
}

impl IbmSession {
    /// Wrap an existing client.
    pub fn new(client: IbmClient, routing_group: impl Into<String>) -> Self {
        Self {
            client: Arc::new(client),
            routing_group: routing_group.into(),
        }
    }
}

#[async_trait]
impl ProviderSession for IbmSession {
    fn provider(&self) -> &str {
        PROVIDER
    }

    fn routing_group(&self) -> &str {
        &self.routing_group
    }

    async fn live_backends(&self) -> HalResult<Vec<LiveBackend>> {
        let backends = self.client.list_backends().await?;
        Ok(backends.iter().map(live_backend).collect())
    }

    async fn job_status(&self, job_id: &JobId) -> HalResult<JobStatus> {
        let response = self.client.get_job_status(&job_id.0).await?;
        Ok(JobStatus::from_provider(&response.status, response.reason()))
    }

    async fn job_result(&self, job_id: &JobId) -> HalResult<Counts> {
        let response = self.client.get_job_results(&job_id.0).await?;
        results_to_counts(&response).ok_or_else(|| {
            IbmError::ApiError {
                code: None,
                message: format!("job {job_id} returned no measurement data"),
            }
            .into()
        })
    }
}

/// Describe a backend for the catalog. `None` when the description cannot
/// be represented.
fn backend_record(
    info: &BackendInfo,
    routing_group: &str,
    owner: &str,
    scanned_at: &str,
) -> Option<BackendRecord> {
    if info.name.trim().is_empty() {
        return None;
    }
    let qubits = u32::try_from(info.num_qubits).ok()?;
    let kind = if info.simulator {
        BackendKind::Simulator
    } else {
        BackendKind::Physical
    };

    let mut record = BackendRecord::new(info.name.clone(), qubits, kind)
        .with_routing_group(routing_group)
        .with_owner(owner)
        .with_active(info.status.operational)
        .with_metadata("hub", serde_json::json!(routing_group))
        .with_metadata("basis_gates", serde_json::json!(info.basis_gates))
        .with_metadata("last_updated", serde_json::json!(scanned_at));
    if let Some(version) = &info.backend_version {
        record = record.with_metadata("backend_version", serde_json::json!(version));
    }
    if let Some(processor) = &info.processor_type {
        record = record.with_metadata("processor_family", serde_json::json!(processor.family));
    }
    Some(record)
}

/// Live view of a backend. The queue length is the activity metric; an
/// unknown queue ranks behind every known one.
fn live_backend(info: &BackendInfo) -> LiveBackend {
    if !info.status.operational {
        return LiveBackend::offline(
            info.name.clone(),
            info.status
                .status_msg
                .clone()
                .unwrap_or_else(|| "backend offline".to_string()),
        );
    }
    let metric = info
        .status
        .pending_jobs
        .map_or(f64::INFINITY, f64::from);
    let mut live = LiveBackend::operational(info.name.clone(), metric);
    live.status_message = info.status.status_msg.clone();
    live
}

/// Convert sampler results to counts. Only the first circuit is read.
fn results_to_counts(results: &JobResultResponse) -> Option<Counts> {
    let result = results.results.first()?;

    // V2 Sampler: raw samples in `data.<register>.samples`
    if let Some(data) = &result.data {
        let mut counts = Counts::new();
        for register_data in data.values() {
            let bit_width = infer_bit_width(&register_data.samples);
            for sample in &register_data.samples {
                counts.insert(hex_to_binary(sample, bit_width), 1);
            }
        }
        return Some(counts);
    }

    // V1: pre-aggregated counts
    if let Some(raw_counts) = &result.counts {
        return Some(
            raw_counts
                .iter()
                .map(|(bitstring, &count)| (hex_to_binary(bitstring, 0), count))
                .collect(),
        );
    }

    // V1: quasi-distribution scaled by the shot count
    let dist: &HashMap<String, f64> = result.quasi_dists.as_ref()?.first()?;
    let shots = result
        .metadata
        .as_ref()
        .and_then(|m| m.get("shots"))
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(1024) as f64;
    let mut counts = Counts::new();
    for (bitstring, &prob) in dist {
        let count = (prob * shots).max(0.0).round() as u64;
        if count > 0 {
            counts.insert(hex_to_binary(bitstring, 0), count);
        }
    }
    Some(counts)
}

/// Classical register width implied by the largest hex sample; at least 1.
fn infer_bit_width(samples: &[String]) -> usize {
    let max_val = samples
        .iter()
        .filter_map(|s| {
            let hex = s.strip_prefix("0x").unwrap_or(s);
            u64::from_str_radix(hex, 16).ok()
        })
        .max()
        .unwrap_or(0);

    if max_val == 0 {
        1
    } else {
        64 - max_val.leading_zeros() as usize
    }
}

/// Convert a hex string to binary, padded to `width` bits.
///
/// A zero `width` falls back to 4 bits per hex digit. Strings that are not
/// `0x`-prefixed hex are taken to be bitstrings already.
fn hex_to_binary(raw: &str, width: usize) -> String {
    let Some(hex) = raw.strip_prefix("0x") else {
        return raw.to_string();
    };
    match u64::from_str_radix(hex, 16) {
        Ok(value) => {
            let width = if width > 0 { width } else { hex.len() * 4 };
            format!("{value:0>width$b}")
        }
        Err(_) => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::BackendStatus;
    use qdispatch_hal::JobState;

    fn info(name: &str, qubits: usize, simulator: bool, pending: Option<u32>) -> BackendInfo {
        BackendInfo {
            name: name.to_string(),
            num_qubits: qubits,
            status: BackendStatus {
                operational: true,
                status_msg: Some("active".into()),
                pending_jobs: pending,
            },
            processor_type: None,
            basis_gates: vec!["cz".into(), "rz".into()],
            simulator,
            backend_version: Some("2.0.1".into()),
        }
    }

    #[test]
    fn test_backend_record_carries_metadata() {
        let record = backend_record(
            &info("ibm_torino", 133, false, Some(3)),
            "ibm-q/open/main",
            "alice",
            "2026-01-01T00:00:00Z",
        )
        .unwrap();
        assert_eq!(record.qubit_count, 133);
        assert_eq!(record.kind, BackendKind::Physical);
        assert_eq!(record.routing_group, "ibm-q/open/main");
        assert_eq!(record.owner, "alice");
        assert_eq!(record.metadata["backend_version"], "2.0.1");
        assert_eq!(record.metadata["hub"], "ibm-q/open/main");
    }

    #[test]
    fn test_backend_record_skips_nameless() {
        assert!(backend_record(&info(" ", 5, true, None), "g", "o", "t").is_none());
    }

    #[test]
    fn test_live_backend_uses_queue_length() {
        let live = live_backend(&info("ibm_fez", 156, false, Some(12)));
        assert!(live.operational);
        assert_eq!(live.activity_metric, 12.0);

        let unknown = live_backend(&info("ibm_fez", 156, false, None));
        assert!(unknown.activity_metric.is_infinite());

        let mut down = info("ibm_kyiv", 127, false, Some(0));
        down.status.operational = false;
        down.status.status_msg = Some("maintenance".into());
        let live = live_backend(&down);
        assert!(!live.operational);
        assert_eq!(live.status_message.as_deref(), Some("maintenance"));
    }

    #[test]
    fn test_v2_samples_to_counts() {
        let json = r#"{"results": [{"data": {"c": {"samples":
            ["0x0", "0x3", "0x3", "0x0", "0x3"]}}}]}"#;
        let response: JobResultResponse = serde_json::from_str(json).unwrap();
        let counts = results_to_counts(&response).unwrap();
        assert_eq!(counts.get("00"), 2);
        assert_eq!(counts.get("11"), 3);
    }

    #[test]
    fn test_v1_counts_pass_through() {
        let json = r#"{"results": [{"counts": {"00": 512, "11": 488}}]}"#;
        let response: JobResultResponse = serde_json::from_str(json).unwrap();
        let counts = results_to_counts(&response).unwrap();
        assert_eq!(counts.get("00"), 512);
        assert_eq!(counts.get("11"), 488);
    }

    #[test]
    fn test_quasi_dist_scaled_by_shots() {
        let json = r#"{"results": [{
            "quasi_dists": [{"0x0": 0.5, "0x1": 0.5}],
            "metadata": {"shots": 100}
        }]}"#;
        let response: JobResultResponse = serde_json::from_str(json).unwrap();
        let counts = results_to_counts(&response).unwrap();
        assert_eq!(counts.get("0000"), 50);
        assert_eq!(counts.get("0001"), 50);
    }

    #[test]
    fn test_empty_results_is_none() {
        let response: JobResultResponse = serde_json::from_str(r#"{"results": []}"#).unwrap();
        assert!(results_to_counts(&response).is_none());
    }

    #[test]
    fn test_ibm_status_vocabulary() {
        for (raw, state) in [
            ("Queued", JobState::Pending),
            ("RUNNING", JobState::Running),
            ("Completed", JobState::Done),
            ("Cancelled", JobState::Cancelled),
            ("Failed", JobState::Error),
        ] {
            assert_eq!(JobStatus::from_provider(raw, None).state, state, "{raw}");
        }
    }

    #[test]
    fn test_hex_to_binary() {
        assert_eq!(hex_to_binary("0x3", 4), "0011");
        assert_eq!(hex_to_binary("0x1", 0), "0001");
        assert_eq!(hex_to_binary("101", 0), "101");
    }

    #[test]
    fn test_infer_bit_width() {
        assert_eq!(infer_bit_width(&["0x0".into()]), 1);
        assert_eq!(infer_bit_width(&["0x0".into(), "0x5".into()]), 3);
    }
}
