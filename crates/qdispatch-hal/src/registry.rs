//! Connector registry for managing available providers.
//!
//! The [`ConnectorRegistry`] maps provider names to the connectors that
//! open sessions for them, so request handlers can resolve "ibmq" or "sim"
//! without knowing which adapter crates are linked in.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::credential::ProviderCredential;
use crate::error::{HalError, HalResult};
use crate::session::{ProviderSession, SessionConnector};

/// Central registry of provider connectors.
#[derive(Default)]
pub struct ConnectorRegistry {
    connectors: FxHashMap<String, Arc<dyn SessionConnector>>,
}

impl ConnectorRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connector under its own provider name.
    pub fn register(&mut self, connector: Arc<dyn SessionConnector>) {
        let name = connector.provider_name().to_string();
        self.register_as(name, connector);
    }

    /// Register a connector under an explicit provider name.
    pub fn register_as(&mut self, name: impl Into<String>, connector: Arc<dyn SessionConnector>) {
        let name = name.into();
        debug!("Registering provider connector: {}", name);
        self.connectors.insert(name, connector);
    }

    /// Look up the connector for a provider.
    pub fn get(&self, provider: &str) -> HalResult<Arc<dyn SessionConnector>> {
        self.connectors.get(provider).cloned().ok_or_else(|| {
            HalError::NotFound(format!("No connector registered for provider '{provider}'"))
        })
    }

    /// Open a session with the named provider.
    pub async fn connect(
        &self,
        provider: &str,
        credential: &ProviderCredential,
        routing_group: &str,
    ) -> HalResult<Box<dyn ProviderSession>> {
        self.get(provider)?.connect(credential, routing_group).await
    }

    /// List all registered provider names, sorted.
    pub fn providers(&self) -> Vec<String> {
        let mut names: Vec<_> = self.connectors.keys().cloned().collect();
        names.sort();
        names
    }
}
