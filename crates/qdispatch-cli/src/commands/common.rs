//! Shared helpers for CLI commands.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use console::style;

use qdispatch_adapter_ibm::IbmConnector;
use qdispatch_hal::{BackendKind, ConnectorRegistry, Counts, JsonCredentialStore};
use qdispatch_sched::{DispatchConfig, Dispatcher, JsonCatalog, default_config_dir};

/// Global options every command needs.
pub struct Context {
    /// Explicit configuration file.
    pub config_path: Option<PathBuf>,
    /// IBM legacy endpoint override.
    pub ibm_endpoint: Option<String>,
}

/// Load the configuration.
///
/// An explicit path must exist. Without one, `<config dir>/config.yaml` is
/// used when present, else the defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<DispatchConfig> {
    if let Some(path) = explicit {
        return DispatchConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load config: {}", path.display()));
    }

    let default_path = default_config_dir().join("config.yaml");
    if default_path.exists() {
        tracing::debug!("loading config from {}", default_path.display());
        return DispatchConfig::from_yaml_file(&default_path)
            .with_context(|| format!("Failed to load config: {}", default_path.display()));
    }
    Ok(DispatchConfig::default())
}

/// Register the connectors this binary ships with.
pub fn connector_registry(ibm_endpoint: Option<&str>) -> ConnectorRegistry {
    let mut ibm = IbmConnector::new();
    if let Some(endpoint) = ibm_endpoint {
        ibm = ibm.with_endpoint(endpoint);
    }

    let mut registry = ConnectorRegistry::new();
    registry.register(Arc::new(ibm));
    registry
}

/// Build a dispatcher over the JSON credential file and catalog directory.
pub async fn create_dispatcher(ctx: &Context) -> Result<Dispatcher> {
    let config = load_config(ctx.config_path.as_deref())?;

    let catalog = JsonCatalog::new(&config.catalog_dir).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to open catalog at {}: {e}",
            config.catalog_dir.display()
        )
    })?;
    let credentials = JsonCredentialStore::new(&config.credentials_file);

    Ok(Dispatcher::new(
        Arc::new(credentials),
        Arc::new(catalog),
        connector_registry(ctx.ibm_endpoint.as_deref()),
        config,
    ))
}

/// Parse a `--kind` value.
pub fn parse_kind(raw: Option<&str>) -> Result<Option<BackendKind>> {
    raw.map(|k| BackendKind::from_str(k).map_err(|e| anyhow::anyhow!(e)))
        .transpose()
}

/// Print outcome counts as a histogram, most frequent first.
pub fn print_counts(counts: &Counts) {
    let total = counts.total_shots();
    println!(
        "\n{} Results ({} shots):",
        style("✓").green().bold(),
        total
    );

    let mut sorted: Vec<(&str, u64)> = counts.iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    for (bitstring, count) in sorted.iter().take(16) {
        let prob = *count as f64 / total.max(1) as f64 * 100.0;
        let bar_len = (prob / 2.0).round() as usize;
        let bar: String = "█".repeat(bar_len);

        println!(
            "  {}: {:>6} ({:>5.2}%) {}",
            style(bitstring).cyan(),
            count,
            prob,
            style(bar).green()
        );
    }

    if sorted.len() > 16 {
        println!("  ... and {} more outcomes", sorted.len() - 16);
    }
}
