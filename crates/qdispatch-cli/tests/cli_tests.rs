//! CLI configuration and dispatch flow tests.
//!
//! The CLI is a binary crate, so these drive the same library calls the
//! commands make: load a YAML config, open the JSON credential file and
//! catalog directory it names, then refresh, select and monitor through a
//! dispatcher. The scripted provider stands in for IBM.

use std::path::Path;
use std::sync::Arc;

use qdispatch_adapter_sim::{SimProvider, Step};
use qdispatch_hal::{
    BackendKind, BackendRecord, ConnectorRegistry, CredentialStore, HalError, JobState,
    JsonCredentialStore, LiveBackend,
};
use qdispatch_sched::{
    CancellationToken, DispatchConfig, Dispatcher, JsonCatalog, MonitorOutcome, ResourceRequest,
};

// ============================================================================
// Fixtures
// ============================================================================

fn write_config(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("config.yaml");
    let yaml = format!(
        "default_routing_group: g1\n\
         catalog_dir: {}\n\
         credentials_file: {}\n\
         monitor:\n  interval_secs: 2\n  max_iterations: 4\n",
        dir.join("catalog").display(),
        dir.join("credentials.json").display()
    );
    std::fs::write(&path, yaml).unwrap();
    path
}

fn write_credentials(dir: &Path) {
    let json = serde_json::json!([
        {
            "owner": "alice",
            "providerName": "sim",
            "token": "secret",
            "additionalInfo": { "defaultHub": "g1" }
        },
        {
            "username": "bob",
            "providerName": "sim",
            "providerToken": "other"
        }
    ]);
    std::fs::write(dir.join("credentials.json"), json.to_string()).unwrap();
}

fn sim_provider() -> SimProvider {
    SimProvider::new()
        .with_backend(
            BackendRecord::new("simA", 5, BackendKind::Simulator).with_routing_group("g1"),
            2.0,
        )
        .with_backend(
            BackendRecord::new("qpuB", 7, BackendKind::Physical).with_routing_group("g1"),
            9.0,
        )
        .with_backend(
            BackendRecord::new("qpuC", 27, BackendKind::Physical).with_routing_group("g2"),
            0.0,
        )
}

async fn file_backed_dispatcher(config: DispatchConfig, sim: &SimProvider) -> Dispatcher {
    let catalog = JsonCatalog::new(&config.catalog_dir).await.unwrap();
    let credentials = JsonCredentialStore::new(&config.credentials_file);

    let mut connectors = ConnectorRegistry::new();
    connectors.register(Arc::new(sim.clone()));

    Dispatcher::new(Arc::new(credentials), Arc::new(catalog), connectors, config)
}

// ============================================================================
// Configuration
// ============================================================================

mod config_tests {
    use super::*;

    #[test]
    fn test_yaml_config_paths_and_monitor() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path());

        let config = DispatchConfig::from_yaml_file(&path).unwrap();
        assert_eq!(config.default_routing_group, "g1");
        assert_eq!(config.catalog_dir, dir.path().join("catalog"));
        assert_eq!(config.monitor.interval_secs, 2);
        assert_eq!(config.monitor.max_iterations, 4);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = DispatchConfig::from_yaml_str("default_routing_group: hub-x\n").unwrap();
        let defaults = DispatchConfig::default();
        assert_eq!(config.default_routing_group, "hub-x");
        assert_eq!(config.monitor.interval_secs, defaults.monitor.interval_secs);
        assert_eq!(config.credentials_file, defaults.credentials_file);
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let result = DispatchConfig::from_yaml_str("monitor:\n  max_iterations: 0\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_unreadable_config_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = DispatchConfig::from_yaml_file(dir.path().join("missing.yaml"));
        assert!(result.is_err());
    }
}

// ============================================================================
// Credential file
// ============================================================================

mod credential_tests {
    use super::*;

    #[tokio::test]
    async fn test_credentials_file_lookup() {
        let dir = tempfile::tempdir().unwrap();
        write_credentials(dir.path());
        let store = JsonCredentialStore::new(dir.path().join("credentials.json"));

        let alice = store.retrieve("alice", "sim").await.unwrap();
        assert_eq!(alice.token, "secret");
        assert_eq!(alice.default_routing_group("fallback"), "g1");

        // Legacy field names are accepted.
        let bob = store.retrieve("bob", "sim").await.unwrap();
        assert_eq!(bob.token, "other");
        assert_eq!(bob.default_routing_group("fallback"), "fallback");
    }

    #[tokio::test]
    async fn test_missing_credential_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        write_credentials(dir.path());
        let store = JsonCredentialStore::new(dir.path().join("credentials.json"));

        let err = store.retrieve("alice", "ibmq").await.unwrap_err();
        assert!(matches!(err, HalError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_absent_credentials_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonCredentialStore::new(dir.path().join("nope.json"));

        let err = store.retrieve("alice", "sim").await.unwrap_err();
        assert!(matches!(err, HalError::NotFound(_)));
    }
}

// ============================================================================
// Refresh, select, monitor against files on disk
// ============================================================================

mod flow_tests {
    use super::*;

    #[tokio::test]
    async fn test_refresh_then_select_persists_catalog() {
        let dir = tempfile::tempdir().unwrap();
        write_credentials(dir.path());
        let config = DispatchConfig::from_yaml_file(write_config(dir.path())).unwrap();
        let sim = sim_provider();

        let dispatcher = file_backed_dispatcher(config.clone(), &sim).await;
        let stored = dispatcher.refresh_backends("alice", "sim", None).await.unwrap();
        assert_eq!(stored, 2);

        // A fresh dispatcher reads the snapshot written by the refresh.
        let dispatcher = file_backed_dispatcher(config, &sim).await;
        let records = dispatcher
            .catalog()
            .list("alice", "sim", "g1")
            .await
            .unwrap();
        let mut names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["qpuB", "simA"]);

        let request = ResourceRequest::new(5, "g1");
        let chosen = dispatcher
            .select_backend("alice", "sim", &request)
            .await
            .unwrap();
        assert_eq!(chosen.as_deref(), Some("simA"));

        let request = ResourceRequest::new(5, "g1").physical();
        let chosen = dispatcher
            .select_backend("alice", "sim", &request)
            .await
            .unwrap();
        assert_eq!(chosen.as_deref(), Some("qpuB"));
    }

    #[tokio::test]
    async fn test_select_prefers_live_queue_over_catalog_order() {
        let dir = tempfile::tempdir().unwrap();
        write_credentials(dir.path());
        let config = DispatchConfig::from_yaml_file(write_config(dir.path())).unwrap();
        let sim = sim_provider();

        let dispatcher = file_backed_dispatcher(config, &sim).await;
        dispatcher.refresh_backends("alice", "sim", None).await.unwrap();
        sim.set_live(LiveBackend::operational("simA", 40.0));
        sim.set_live(LiveBackend::operational("qpuB", 1.0));

        let request = ResourceRequest::new(2, "g1");
        let chosen = dispatcher
            .select_backend("alice", "sim", &request)
            .await
            .unwrap();
        assert_eq!(chosen.as_deref(), Some("qpuB"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_with_configured_budget() {
        let dir = tempfile::tempdir().unwrap();
        write_credentials(dir.path());
        let config = DispatchConfig::from_yaml_file(write_config(dir.path())).unwrap();
        let sim = sim_provider();
        let handle = sim.submit(
            "simA",
            "g1",
            vec![
                Step::State(JobState::Pending),
                Step::State(JobState::Running),
                Step::State(JobState::Done),
            ],
        );
        sim.set_counts(&handle.id, [("00", 700), ("11", 324)].into_iter().collect());

        let monitor = config.monitor.clone();
        let dispatcher = file_backed_dispatcher(config, &sim).await;
        let result = dispatcher
            .monitor_job("alice", "sim", handle, &monitor, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.outcome, MonitorOutcome::Terminal);
        assert_eq!(result.polls, 3);
        let counts = result.payload.unwrap();
        assert_eq!(counts.total_shots(), 1024);
        assert_eq!(counts.get("00"), 700);
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_budget_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        write_credentials(dir.path());
        let config = DispatchConfig::from_yaml_file(write_config(dir.path())).unwrap();
        let sim = sim_provider();
        let handle = sim.submit("qpuB", "g1", vec![Step::State(JobState::Running)]);

        let monitor = config.monitor.clone();
        let dispatcher = file_backed_dispatcher(config, &sim).await;
        let result = dispatcher
            .monitor_job("alice", "sim", handle, &monitor, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.outcome, MonitorOutcome::Exhausted);
        assert_eq!(result.polls, 4);
        assert_eq!(result.status.state, JobState::Running);
        assert!(result.payload.is_none());

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["outcome"], "exhausted");
    }
}
