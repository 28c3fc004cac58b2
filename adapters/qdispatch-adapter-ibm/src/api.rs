//! IBM Quantum Platform API client.
//!
//! This module implements the parts of the IBM Quantum REST API the
//! dispatcher needs:
//! - Authentication via IAM token exchange (cloud API key flow)
//! - Listing backends with their configuration and live status
//! - Listing instances (routing groups)
//! - Polling job status and retrieving results
//!
//! Supports both the IBM Cloud API (`quantum.cloud.ibm.com/api`) and the
//! legacy endpoint (`api.quantum-computing.ibm.com`).

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, header};
use serde::Deserialize;

use crate::error::{IbmError, IbmResult};

/// Default IBM Quantum Cloud API endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://quantum.cloud.ibm.com/api";

/// Legacy IBM Quantum API endpoint.
pub const LEGACY_ENDPOINT: &str = "https://api.quantum-computing.ibm.com";

/// IBM Cloud IAM token endpoint.
const IAM_TOKEN_URL: &str = "https://iam.cloud.ibm.com/identity/token";

/// IBM API version header value.
const IBM_API_VERSION: &str = "2026-02-01";

/// User-Agent sent with requests.
const USER_AGENT: &str = concat!("qdispatch/", env!("CARGO_PKG_VERSION"));

/// IBM Quantum API client.
pub struct IbmClient {
    /// HTTP client.
    client: Client,
    /// API endpoint URL.
    endpoint: String,
    /// Instance (hub/group/project) used to scope legacy requests.
    instance: Option<String>,
    /// Whether using the Cloud API (vs legacy).
    cloud_api: bool,
}

impl fmt::Debug for IbmClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IbmClient")
            .field("endpoint", &self.endpoint)
            .field("token", &"[REDACTED]")
            .field("instance", &self.instance)
            .field("cloud_api", &self.cloud_api)
            .finish()
    }
}

/// IAM token response from `iam.cloud.ibm.com`.
#[derive(Debug, Deserialize)]
struct IamTokenResponse {
    access_token: String,
}

fn json_headers(bearer: &str) -> IbmResult<header::HeaderMap> {
    let mut headers = header::HeaderMap::new();
    headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_str(&format!("Bearer {bearer}"))
            .map_err(|_| IbmError::InvalidToken)?,
    );
    headers.insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    headers.insert(
        header::ACCEPT,
        header::HeaderValue::from_static("application/json"),
    );
    Ok(headers)
}

fn build_client(headers: header::HeaderMap) -> IbmResult<Client> {
    Ok(Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .timeout(Duration::from_secs(60))
        .connect_timeout(Duration::from_secs(10))
        .build()?)
}

impl IbmClient {
    /// Create a client using the legacy direct-token mode.
    ///
    /// For the IBM Cloud API, use [`IbmClient::connect`] instead.
    pub fn new(endpoint: impl Into<String>, token: &str) -> IbmResult<Self> {
        if token.is_empty() {
            return Err(IbmError::MissingToken);
        }
        let client = build_client(json_headers(token)?)?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            instance: None,
            cloud_api: false,
        })
    }

    /// Create a client using the IBM Cloud API key flow.
    ///
    /// Exchanges the API key for an IAM bearer token and configures the
    /// Service-CRN header required by the Cloud API.
    pub async fn connect(api_key: &str, service_crn: &str) -> IbmResult<Self> {
        if api_key.is_empty() {
            return Err(IbmError::MissingToken);
        }

        let iam_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        let iam_response = iam_client
            .post(IAM_TOKEN_URL)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(format!(
                "grant_type=urn:ibm:params:oauth:grant-type:apikey&apikey={api_key}"
            ))
            .send()
            .await?;

        if !iam_response.status().is_success() {
            let status = iam_response.status();
            let body = iam_response
                .text()
                .await
                .unwrap_or_else(|_| "no body".to_string());
            return Err(IbmError::IamTokenExchange(format!(
                "IAM returned {status}: {body}"
            )));
        }

        let iam_token: IamTokenResponse = iam_response.json().await.map_err(|e| {
            IbmError::IamTokenExchange(format!("failed to parse IAM response: {e}"))
        })?;

        let mut headers = json_headers(&iam_token.access_token)?;
        headers.insert(
            header::HeaderName::from_static("service-crn"),
            header::HeaderValue::from_str(service_crn)
                .map_err(|_| IbmError::InvalidParameter("invalid Service-CRN value".into()))?,
        );
        headers.insert(
            header::HeaderName::from_static("ibm-api-version"),
            header::HeaderValue::from_static(IBM_API_VERSION),
        );

        Ok(Self {
            client: build_client(headers)?,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            instance: None,
            cloud_api: true,
        })
    }

    /// Scope requests to an instance (hub/group/project).
    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    /// Whether this client uses the Cloud API.
    pub fn is_cloud_api(&self) -> bool {
        self.cloud_api
    }

    /// API endpoint in use.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn get(&self, path: &str) -> RequestBuilder {
        let request = self.client.get(format!("{}{path}", self.endpoint));
        match (&self.instance, self.cloud_api) {
            (Some(hub), false) => request.query(&[("hub", hub)]),
            _ => request,
        }
    }

    /// Get available backends.
    ///
    /// On the Cloud API this fetches the device list and then configuration
    /// and status per device; devices that cannot be described are skipped.
    pub async fn list_backends(&self) -> IbmResult<Vec<BackendInfo>> {
        if self.cloud_api {
            self.list_backends_cloud().await
        } else {
            self.list_backends_legacy().await
        }
    }

    async fn list_backends_cloud(&self) -> IbmResult<Vec<BackendInfo>> {
        let response = self.get("/v1/backends").send().await?;
        let devices: DevicesResponse = parse(response, "list backends").await?;

        let mut backends = Vec::with_capacity(devices.devices.len());
        for device in &devices.devices {
            let device_name = &device.name;
            match self.get_backend_cloud(device_name).await {
                Ok(info) => backends.push(info),
                Err(e) => {
                    tracing::warn!("skipping backend {device_name}: {e}");
                }
            }
        }

        Ok(backends)
    }

    async fn list_backends_legacy(&self) -> IbmResult<Vec<BackendInfo>> {
        let response = self.get("/v1/backends").send().await?;
        let backends: LegacyBackendsResponse = parse(response, "list backends").await?;
        Ok(backends.backends)
    }

    /// Fetch backend info from the Cloud API.
    ///
    /// Merges `/configuration` and `/status`. A failed status fetch leaves
    /// the backend operational with an unknown queue.
    async fn get_backend_cloud(&self, name: &str) -> IbmResult<BackendInfo> {
        let config_response = self
            .get(&format!("/v1/backends/{name}/configuration"))
            .send()
            .await?;
        if config_response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(IbmError::BackendUnavailable(name.to_string()));
        }
        let config: BackendConfigResponse =
            parse(config_response, "backend configuration").await?;

        let status_response = self
            .get(&format!("/v1/backends/{name}/status"))
            .send()
            .await?;
        let status = if status_response.status().is_success() {
            let s: BackendStatusResponse = status_response.json().await?;
            BackendStatus {
                operational: s.state,
                status_msg: Some(if s.message.is_empty() { s.status } else { s.message }),
                pending_jobs: Some(u32::try_from(s.length_queue).unwrap_or(u32::MAX)),
            }
        } else {
            BackendStatus {
                operational: true,
                status_msg: None,
                pending_jobs: None,
            }
        };

        Ok(BackendInfo {
            name: config.backend_name,
            num_qubits: config.n_qubits,
            status,
            processor_type: config.processor_type,
            basis_gates: config.basis_gates,
            simulator: config.simulator.unwrap_or(false),
            backend_version: config.backend_version,
        })
    }

    /// List the instances (hub/group/project) visible to the token.
    pub async fn list_instances(&self) -> IbmResult<Vec<String>> {
        let response = self.client.get(format!("{}/v1/instances", self.endpoint)).send().await?;
        let instances: InstancesResponse = parse(response, "list instances").await?;
        Ok(instances.instances.into_iter().map(|i| i.name).collect())
    }

    /// Get job status.
    pub async fn get_job_status(&self, job_id: &str) -> IbmResult<JobStatusResponse> {
        let response = self.get(&format!("/v1/jobs/{job_id}")).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(IbmError::JobNotFound(job_id.to_string()));
        }
        parse(response, "job status").await
    }

    /// Get job results.
    pub async fn get_job_results(&self, job_id: &str) -> IbmResult<JobResultResponse> {
        let response = self.get(&format!("/v1/jobs/{job_id}/results")).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(IbmError::JobNotFound(job_id.to_string()));
        }
        parse(response, "job results").await
    }
}

/// Decode a successful response, or turn an error response into
/// [`IbmError::ApiError`].
async fn parse<T: serde::de::DeserializeOwned>(response: Response, what: &str) -> IbmResult<T> {
    let status = response.status();
    if status.is_success() {
        return response.json().await.map_err(IbmError::from);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "no body".to_string());
    let message = serde_json::from_str::<ApiErrorResponse>(&body)
        .map(|e| e.message)
        .ok()
        .filter(|m| !m.is_empty())
        .unwrap_or(body);
    Err(IbmError::ApiError {
        code: Some(status.as_u16().to_string()),
        message: format!("{what} failed: {message}"),
    })
}

// ============================================================================
// Response types
// ============================================================================

/// API error response.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    /// Error message.
    #[serde(default)]
    message: String,
}

/// Cloud API device list (`{"devices": [...]}`).
#[derive(Debug, Deserialize)]
struct DevicesResponse {
    devices: Vec<DeviceEntry>,
}

#[derive(Debug, Deserialize)]
struct DeviceEntry {
    /// Device name (e.g. "ibm_torino").
    name: String,
}

/// Legacy API backend list (`{"backends": [...]}`).
#[derive(Debug, Deserialize)]
struct LegacyBackendsResponse {
    backends: Vec<BackendInfo>,
}

/// Instance list (`{"instances": [...]}`).
#[derive(Debug, Deserialize)]
struct InstancesResponse {
    #[serde(default)]
    instances: Vec<InstanceEntry>,
}

#[derive(Debug, Deserialize)]
struct InstanceEntry {
    name: String,
}

/// Cloud API backend configuration from `/backends/{name}/configuration`.
#[derive(Debug, Deserialize)]
struct BackendConfigResponse {
    backend_name: String,
    n_qubits: usize,
    #[serde(default)]
    backend_version: Option<String>,
    #[serde(default)]
    basis_gates: Vec<String>,
    #[serde(default)]
    processor_type: Option<ProcessorType>,
    #[serde(default)]
    simulator: Option<bool>,
}

/// Cloud API backend status from `/backends/{name}/status`.
#[derive(Debug, Deserialize)]
struct BackendStatusResponse {
    /// Whether the backend is operational.
    state: bool,
    /// Status string (e.g., "active").
    #[serde(default)]
    status: String,
    /// Status message.
    #[serde(default)]
    message: String,
    /// Queue length.
    #[serde(default)]
    length_queue: u64,
}

/// Backend information.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendInfo {
    /// Backend name.
    pub name: String,
    /// Number of qubits.
    pub num_qubits: usize,
    /// Backend status.
    pub status: BackendStatus,
    /// Processor type.
    #[serde(default)]
    pub processor_type: Option<ProcessorType>,
    /// Basis gates.
    #[serde(default)]
    pub basis_gates: Vec<String>,
    /// Whether this is a simulator.
    #[serde(default)]
    pub simulator: bool,
    /// Backend software version.
    #[serde(default)]
    pub backend_version: Option<String>,
}

/// Backend status.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendStatus {
    /// Whether the backend is operational.
    pub operational: bool,
    /// Status message.
    #[serde(default)]
    pub status_msg: Option<String>,
    /// Number of pending jobs.
    #[serde(default)]
    pub pending_jobs: Option<u32>,
}

/// Processor type information.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorType {
    /// Family (e.g., "Falcon", "Eagle", "Heron").
    pub family: String,
    /// Revision.
    #[serde(default)]
    pub revision: Option<String>,
}

/// Job status response.
#[derive(Debug, Clone, Deserialize)]
pub struct JobStatusResponse {
    /// Job ID.
    pub id: String,
    /// Job status (may be mixed case on the Cloud API).
    pub status: String,
    /// Backend name.
    #[serde(default)]
    pub backend: Option<String>,
    /// Error information if failed (legacy API).
    #[serde(default)]
    pub error: Option<JobError>,
    /// State object with reason (Cloud API).
    #[serde(default)]
    pub state: Option<JobStateInfo>,
}

/// Job error information (legacy API).
#[derive(Debug, Clone, Deserialize)]
pub struct JobError {
    /// Error message.
    pub message: String,
}

/// Job state with reason (Cloud API).
#[derive(Debug, Clone, Deserialize)]
pub struct JobStateInfo {
    /// Status string.
    #[serde(default)]
    pub status: String,
    /// Reason for failure.
    #[serde(default)]
    pub reason: Option<String>,
}

impl JobStatusResponse {
    /// Failure or cancellation reason, if the provider gave one.
    pub fn reason(&self) -> Option<String> {
        self.state
            .as_ref()
            .and_then(|s| s.reason.clone())
            .or_else(|| self.error.as_ref().map(|e| e.message.clone()))
    }
}

/// Job result response.
#[derive(Debug, Deserialize)]
pub struct JobResultResponse {
    /// Results from the sampler primitive, one per circuit.
    pub results: Vec<SamplerResult>,
}

/// Sampler result for one circuit.
#[derive(Debug, Deserialize)]
pub struct SamplerResult {
    /// V2 Sampler data: classical register name to per-shot samples.
    #[serde(default)]
    pub data: Option<HashMap<String, ClassicalRegisterData>>,
    /// Quasi-probability distributions (V1 only).
    #[serde(default)]
    pub quasi_dists: Option<Vec<HashMap<String, f64>>>,
    /// Measurement counts (V1 only).
    #[serde(default)]
    pub counts: Option<HashMap<String, u64>>,
    /// Metadata.
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// Classical register data from V2 Sampler results.
#[derive(Debug, Deserialize)]
pub struct ClassicalRegisterData {
    /// Raw measurement samples as hex strings (e.g., `["0x0", "0x2", ...]`).
    pub samples: Vec<String>,
}
