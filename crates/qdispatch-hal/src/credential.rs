//! Provider credentials and their lookup.
//!
//! A [`ProviderCredential`] is what an owner registered for one provider:
//! an API token plus provider-specific extras such as the default routing
//! group. Credentials are fetched through the [`CredentialStore`] trait so
//! that the selection core never touches the storage behind it.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{HalError, HalResult};

/// Routing group used when the credential does not name one.
pub const DEFAULT_ROUTING_GROUP: &str = "ibm_quantum_platform";

/// Keys checked, in order, for a default routing group in `additional_info`.
const ROUTING_GROUP_KEYS: [&str; 2] = ["defaultHub", "defaultChannel"];

/// Credential registered by an owner for one provider.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCredential {
    /// Owner (user) name.
    #[serde(alias = "username")]
    pub owner: String,
    /// Provider name (e.g. "ibmq").
    pub provider_name: String,
    /// API token.
    #[serde(alias = "providerToken")]
    pub token: String,
    /// Provider-specific extras.
    #[serde(default)]
    pub additional_info: serde_json::Map<String, serde_json::Value>,
}

impl ProviderCredential {
    /// Create a credential with no extras.
    pub fn new(
        owner: impl Into<String>,
        provider_name: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            provider_name: provider_name.into(),
            token: token.into(),
            additional_info: serde_json::Map::new(),
        }
    }

    /// Add an extra entry.
    pub fn with_info(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.additional_info.insert(key.into(), value);
        self
    }

    /// The routing group to use when the caller does not specify one.
    ///
    /// Looks at `defaultHub`, then `defaultChannel`; empty strings count as
    /// unset.
    pub fn default_routing_group(&self, fallback: &str) -> String {
        ROUTING_GROUP_KEYS
            .iter()
            .filter_map(|key| self.additional_info.get(*key))
            .filter_map(serde_json::Value::as_str)
            .find(|value| !value.is_empty())
            .unwrap_or(fallback)
            .to_string()
    }

    fn key(&self) -> (String, String) {
        (self.owner.clone(), self.provider_name.clone())
    }
}

impl fmt::Debug for ProviderCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCredential")
            .field("owner", &self.owner)
            .field("provider_name", &self.provider_name)
            .field("token", &"[REDACTED]")
            .field("additional_info", &self.additional_info)
            .finish()
    }
}

/// Lookup of provider credentials by owner.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Fetch the credential `owner` registered for `provider_name`.
    ///
    /// Returns [`HalError::NotFound`] when there is none.
    async fn retrieve(&self, owner: &str, provider_name: &str) -> HalResult<ProviderCredential>;
}

fn not_found(owner: &str, provider_name: &str) -> HalError {
    HalError::NotFound(format!(
        "no {provider_name} credential registered for owner '{owner}'"
    ))
}

/// Credential store held in memory.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    credentials: RwLock<FxHashMap<(String, String), ProviderCredential>>,
}

impl InMemoryCredentialStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a credential.
    pub async fn insert(&self, credential: ProviderCredential) {
        let mut credentials = self.credentials.write().await;
        credentials.insert(credential.key(), credential);
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn retrieve(&self, owner: &str, provider_name: &str) -> HalResult<ProviderCredential> {
        let credentials = self.credentials.read().await;
        credentials
            .get(&(owner.to_string(), provider_name.to_string()))
            .cloned()
            .ok_or_else(|| not_found(owner, provider_name))
    }
}

/// Credential store backed by a JSON file holding an array of credentials.
///
/// The file is read on every lookup, so edits are picked up without a
/// restart.
pub struct JsonCredentialStore {
    path: PathBuf,
}

impl JsonCredentialStore {
    /// Create a store reading from `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> HalResult<Vec<ProviderCredential>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("credential file {} does not exist", self.path.display());
                Ok(Vec::new())
            }
            Err(e) => Err(HalError::Io(e)),
        }
    }
}

#[async_trait]
impl CredentialStore for JsonCredentialStore {
    async fn retrieve(&self, owner: &str, provider_name: &str) -> HalResult<ProviderCredential> {
        self.load()
            .await?
            .into_iter()
            .find(|c| c.owner == owner && c.provider_name == provider_name)
            .ok_or_else(|| not_found(owner, provider_name))
    }
}
