//! Dispatch configuration.
//!
//! Configuration is an explicit value handed to the [`Dispatcher`]
//! (and from there to each monitor); nothing in the library reads process
//! environment. The CLI builds one from a YAML file plus flag overrides.
//!
//! ```yaml
//! default_routing_group: ibm_quantum_platform
//! monitor:
//!   interval_secs: 2
//!   max_iterations: 5
//! catalog_dir: /var/lib/qdispatch/catalog
//! credentials_file: /etc/qdispatch/credentials.json
//! ```
//!
//! [`Dispatcher`]: crate::Dispatcher

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use qdispatch_hal::DEFAULT_ROUTING_GROUP;

use crate::error::{SchedError, SchedResult};

/// Polling parameters for one monitored job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Wait between status polls, in seconds.
    pub interval_secs: u64,

    /// Maximum number of status polls before giving up.
    pub max_iterations: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 2,
            max_iterations: 5,
        }
    }
}

impl MonitorConfig {
    /// Create a monitor configuration.
    pub fn new(interval_secs: u64, max_iterations: u32) -> Self {
        Self {
            interval_secs,
            max_iterations,
        }
    }

    /// Poll interval as a duration.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Upper bound on the time spent sleeping between polls.
    pub fn max_wait(&self) -> Duration {
        self.interval()
            .saturating_mul(self.max_iterations.saturating_sub(1))
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Routing group used when neither caller nor credential names one.
    pub default_routing_group: String,

    /// Default polling parameters.
    pub monitor: MonitorConfig,

    /// Directory holding backend catalog snapshots.
    pub catalog_dir: PathBuf,

    /// JSON file holding provider credentials.
    pub credentials_file: PathBuf,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        let base = default_config_dir();
        Self {
            default_routing_group: DEFAULT_ROUTING_GROUP.to_string(),
            monitor: MonitorConfig::default(),
            catalog_dir: base.join("catalog"),
            credentials_file: base.join("credentials.json"),
        }
    }
}

/// `<config dir>/qdispatch`, falling back to `./.qdispatch`.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("qdispatch"))
        .unwrap_or_else(|| PathBuf::from(".qdispatch"))
}

impl DispatchConfig {
    /// Parse a YAML document; absent fields take their defaults.
    pub fn from_yaml_str(source: &str) -> SchedResult<Self> {
        let config: Self = serde_yaml_ng::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML configuration file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> SchedResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            SchedError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&source)
    }

    /// Check invariants that serde cannot express.
    pub fn validate(&self) -> SchedResult<()> {
        if self.monitor.max_iterations == 0 {
            return Err(SchedError::Config(
                "monitor.max_iterations must be at least 1".into(),
            ));
        }
        if self.default_routing_group.trim().is_empty() {
            return Err(SchedError::Config(
                "default_routing_group must not be empty".into(),
            ));
        }
        Ok(())
    }
}
