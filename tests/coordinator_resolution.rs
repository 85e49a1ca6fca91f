//! Coordinator Resolution Tests
//!
//! Test Categories:
//! 1. Default resolution (missing section, absent or unknown type)
//! 2. Built-in and plugin-backed keys
//! 3. Autodetection
//! 4. Delay loading

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use common::{
    azure_catalog, factory_args, wait_until, DetectorAnswer, FakeFactory, FakeLeaderElection,
    ProbeBehavior, ProbeCoordinator, RecordingHealth, SECTION,
};
use coordhost::config::{keys, MemoryConfigStore};
use coordhost::coordinator::{CancellationToken, Coordinator, CoordinatorError};
use coordhost::factory::{
    AzureMode, CoordinatorFactory, CoordinatorRegistry, FactoryError, FactoryParam, PluginCatalog,
    PluginModule, Selection, AZURE_PARALLEL_MODULE, SERVER_RESTART_FACTORY, SERVER_RESTART_MODULE,
};
use coordhost::health::HealthState;
use coordhost::replica::Role;

fn config_with(values: &[(&str, &str)]) -> Arc<MemoryConfigStore> {
    let config = Arc::new(MemoryConfigStore::new());
    config.add_section(SECTION);
    for (key, value) in values {
        config.set_value(SECTION, key, *value);
    }
    config
}

/// Run a coordinator until it has started, then cancel it
async fn run_briefly(coordinator: Arc<dyn Coordinator>, probe: &ProbeCoordinator) {
    let token = CancellationToken::new();
    let run = {
        let token = token.clone();
        tokio::spawn(async move { coordinator.run(1, token).await })
    };
    probe.wait_for_starts(1).await;
    token.cancel();
    assert_eq!(run.await.unwrap(), Err(CoordinatorError::Cancelled));
}

// =============================================================================
// DEFAULT RESOLUTION
// =============================================================================

/// Test: a missing section resolves to the inert coordinator.
#[tokio::test]
async fn test_missing_section_resolves_disabled() {
    let plugins = azure_catalog(Some(DetectorAnswer::Mode(AzureMode::Parallel)));
    let registry = CoordinatorRegistry::new(plugins.catalog.clone());
    let config = Arc::new(MemoryConfigStore::new());

    let coordinator = registry
        .resolve(factory_args(config, FakeLeaderElection::new()))
        .await
        .unwrap();

    let token = CancellationToken::new();
    token.cancel();
    assert_eq!(coordinator.run(1, token).await, Ok(()));
    assert_eq!(plugins.catalog.load_count(), 0);
}

/// Test: an absent coordinator type autodetects.
#[tokio::test]
async fn test_absent_type_autodetects() {
    let plugins = azure_catalog(Some(DetectorAnswer::Mode(AzureMode::Parallel)));
    let registry = CoordinatorRegistry::new(plugins.catalog.clone());

    let coordinator = registry
        .resolve(factory_args(config_with(&[]), FakeLeaderElection::new()))
        .await
        .unwrap();

    run_briefly(coordinator, &plugins.parallel).await;
    assert_eq!(plugins.serial.starts(), 0);
}

/// Test: an unknown coordinator type autodetects.
#[tokio::test]
async fn test_unknown_type_autodetects() {
    let plugins = azure_catalog(Some(DetectorAnswer::Mode(AzureMode::Serial)));
    let registry = CoordinatorRegistry::new(plugins.catalog.clone());
    let config = config_with(&[(keys::COORDINATOR_TYPE, "NoSuchCoordinator")]);
    let args = factory_args(config, FakeLeaderElection::new());

    assert_eq!(
        registry.select(&args),
        Selection::Coordinator {
            key: "AzureAutodetect".into(),
            delay_load: false
        }
    );
    let coordinator = registry.resolve(args).await.unwrap();

    run_briefly(coordinator, &plugins.serial).await;
}

/// Test: the `Test` key constructs without loading any plugin.
#[tokio::test]
async fn test_test_key_loads_no_plugin() {
    let catalog = Arc::new(PluginCatalog::new());
    let registry = CoordinatorRegistry::new(catalog.clone());
    let config = config_with(&[(keys::COORDINATOR_TYPE, "test")]);

    let coordinator = registry
        .resolve(factory_args(config, FakeLeaderElection::new()))
        .await
        .unwrap();

    let token = CancellationToken::new();
    token.cancel();
    assert_eq!(coordinator.run(4, token).await, Ok(()));
    assert_eq!(catalog.load_count(), 0);
}

// =============================================================================
// PLUGIN-BACKED KEYS
// =============================================================================

/// Test: `Dynamic` with a module that does not exist is a configuration error.
#[tokio::test]
async fn test_dynamic_missing_module_is_configuration_error() {
    let registry = CoordinatorRegistry::new(Arc::new(PluginCatalog::new()));
    let config = config_with(&[
        (keys::COORDINATOR_TYPE, "Dynamic"),
        (keys::DYNAMIC_MODULE, "DoesNotExist"),
        (keys::DYNAMIC_FACTORY_TYPE, "Whatever"),
    ]);

    let err = registry
        .resolve(factory_args(config, FakeLeaderElection::new()))
        .await
        .err()
        .unwrap();

    assert_eq!(err.module(), Some("DoesNotExist"));
    assert!(err.to_string().contains("DoesNotExist"));
}

/// Test: `Dynamic` loads the configured module and type.
#[tokio::test]
async fn test_dynamic_loads_configured_factory() {
    let catalog = Arc::new(PluginCatalog::new());
    let probe = ProbeCoordinator::new(ProbeBehavior::AwaitCancel);
    let served = probe.clone();
    catalog
        .register_module(PluginModule::new("Contoso.Repair").with_factory(
            "RepairCoordinatorFactory",
            vec![
                FactoryParam::ConfigStore,
                FactoryParam::SectionName,
                FactoryParam::ReplicaIdentity,
            ],
            move |_args| {
                Ok(Arc::new(FakeFactory {
                    coordinator: served.clone(),
                    detector: None,
                }) as Arc<dyn CoordinatorFactory>)
            },
        ))
        .unwrap();
    let registry = CoordinatorRegistry::new(catalog);
    let config = config_with(&[
        (keys::COORDINATOR_TYPE, "DYNAMIC"),
        (keys::DYNAMIC_MODULE, "Contoso.Repair"),
        (keys::DYNAMIC_FACTORY_TYPE, "RepairCoordinatorFactory"),
    ]);

    let coordinator = registry
        .resolve(factory_args(config, FakeLeaderElection::new()))
        .await
        .unwrap();

    run_briefly(coordinator, &probe).await;
}

/// Test: `ServerRestart` receives the leader-election handle.
#[tokio::test]
async fn test_server_restart_gets_leader_election() {
    let catalog = Arc::new(PluginCatalog::new());
    let probe = ProbeCoordinator::new(ProbeBehavior::AwaitCancel);
    let served = probe.clone();
    let saw_election = Arc::new(Mutex::new(false));
    let saw = saw_election.clone();
    catalog
        .register_module(PluginModule::new(SERVER_RESTART_MODULE).with_factory(
            SERVER_RESTART_FACTORY,
            vec![
                FactoryParam::ConfigStore,
                FactoryParam::SectionName,
                FactoryParam::ReplicaIdentity,
                FactoryParam::LeaderElection,
            ],
            move |args| {
                *saw.lock().unwrap() = args.leader_election().is_some();
                Ok(Arc::new(FakeFactory {
                    coordinator: served.clone(),
                    detector: None,
                }) as Arc<dyn CoordinatorFactory>)
            },
        ))
        .unwrap();
    let registry = CoordinatorRegistry::new(catalog);
    let config = config_with(&[(keys::COORDINATOR_TYPE, "ServerRestart")]);

    let coordinator = registry
        .resolve(factory_args(config, FakeLeaderElection::new()))
        .await
        .unwrap();

    assert!(*saw_election.lock().unwrap());
    run_briefly(coordinator, &probe).await;
}

/// Test: the explicit Azure keys load their fixed factories.
#[tokio::test]
async fn test_explicit_azure_keys() {
    let plugins = azure_catalog(None);
    let registry = CoordinatorRegistry::new(plugins.catalog.clone());

    let serial = registry
        .resolve(factory_args(
            config_with(&[(keys::COORDINATOR_TYPE, "AzureSerial")]),
            FakeLeaderElection::new(),
        ))
        .await
        .unwrap();
    run_briefly(serial, &plugins.serial).await;
    assert_eq!(*plugins.serial_got_detector.lock().unwrap(), Some(false));

    let disabled = registry
        .resolve(factory_args(
            config_with(&[(keys::COORDINATOR_TYPE, "AzureParallelDisabled")]),
            FakeLeaderElection::new(),
        ))
        .await
        .unwrap();
    run_briefly(disabled, &plugins.parallel_disabled).await;

    let parallel = registry
        .resolve(factory_args(
            config_with(&[(keys::COORDINATOR_TYPE, "AzureParallel")]),
            FakeLeaderElection::new(),
        ))
        .await
        .unwrap();
    run_briefly(parallel, &plugins.parallel).await;
}

// =============================================================================
// AUTODETECTION
// =============================================================================

/// Test: serial mode loads the serial factory with the detector.
#[tokio::test]
async fn test_autodetect_serial_passes_detector() {
    let plugins = azure_catalog(Some(DetectorAnswer::Mode(AzureMode::Serial)));
    let registry = CoordinatorRegistry::new(plugins.catalog.clone());

    let coordinator = registry
        .resolve(factory_args(
            config_with(&[(keys::COORDINATOR_TYPE, "AzureAutodetect")]),
            FakeLeaderElection::new(),
        ))
        .await
        .unwrap();

    assert_eq!(*plugins.serial_got_detector.lock().unwrap(), Some(true));
    run_briefly(coordinator, &plugins.serial).await;
    assert_eq!(plugins.parallel.starts(), 0);
}

/// Test: an undetermined mode is a configuration error.
#[tokio::test]
async fn test_autodetect_unknown_mode_fails() {
    let plugins = azure_catalog(Some(DetectorAnswer::Mode(AzureMode::Unknown)));
    let registry = CoordinatorRegistry::new(plugins.catalog.clone());

    let err = registry
        .resolve(factory_args(config_with(&[]), FakeLeaderElection::new()))
        .await
        .err()
        .unwrap();

    assert_eq!(err, FactoryError::UndeterminedMode);
}

/// Test: a failing detector is a configuration error.
#[tokio::test]
async fn test_autodetect_detector_failure() {
    let plugins = azure_catalog(Some(DetectorAnswer::Fail));
    let registry = CoordinatorRegistry::new(plugins.catalog.clone());

    let err = registry
        .resolve(factory_args(config_with(&[]), FakeLeaderElection::new()))
        .await
        .err()
        .unwrap();

    assert!(matches!(err, FactoryError::ModeDetection(msg) if msg.contains("unreachable")));
}

/// Test: a parallel factory without a detector is a configuration error.
#[tokio::test]
async fn test_autodetect_requires_detector() {
    let plugins = azure_catalog(None);
    let registry = CoordinatorRegistry::new(plugins.catalog.clone());

    let err = registry
        .resolve(factory_args(config_with(&[]), FakeLeaderElection::new()))
        .await
        .err()
        .unwrap();

    assert_eq!(err.module(), Some(AZURE_PARALLEL_MODULE));
    assert!(matches!(err, FactoryError::MissingModeDetector { .. }));
}

// =============================================================================
// DELAY LOADING
// =============================================================================

/// Test: delay loading calls no constructor until the first run.
#[tokio::test]
async fn test_delay_load_defers_construction() {
    let registry = CoordinatorRegistry::new(Arc::new(PluginCatalog::new()));
    let calls = Arc::new(AtomicUsize::new(0));
    let probe = ProbeCoordinator::new(ProbeBehavior::AwaitCancel);
    {
        let calls = calls.clone();
        let probe = probe.clone();
        registry
            .register("Expensive", move |_args| {
                calls.fetch_add(1, Ordering::SeqCst);
                let coordinator: Arc<dyn Coordinator> = probe.clone();
                Box::pin(async move { Ok(coordinator) })
            })
            .unwrap();
    }
    let health = Arc::new(RecordingHealth::default());
    let config = config_with(&[
        (keys::COORDINATOR_TYPE, "Expensive"),
        (keys::DELAY_LOAD_COORDINATOR, "true"),
    ]);
    let args = factory_args(config, FakeLeaderElection::new()).with_health_reporter(health.clone());

    let coordinator = registry.resolve(args).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(health.states(), vec![HealthState::Unknown]);

    run_briefly(coordinator, &probe).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(health.states(), vec![HealthState::Unknown, HealthState::Ok]);
}

/// Test: a delay-loaded configuration error surfaces on run, through the
/// execution policy of the hosting replica.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_delay_load_failure_surfaces_on_run() {
    let registry = CoordinatorRegistry::new(Arc::new(PluginCatalog::new()));
    let health = Arc::new(RecordingHealth::default());
    let config = config_with(&[
        (keys::COORDINATOR_TYPE, "Dynamic"),
        (keys::DYNAMIC_MODULE, "DoesNotExist"),
        (keys::DYNAMIC_FACTORY_TYPE, "Whatever"),
        (keys::DELAY_LOAD_COORDINATOR, "true"),
        (keys::CRASH_ON_UNHANDLED_ERROR, "false"),
        (keys::CRASH_ON_UNEXPECTED_COMPLETION, "false"),
    ]);

    let coordinator = registry
        .resolve(
            factory_args(config.clone(), FakeLeaderElection::new())
                .with_health_reporter(health.clone()),
        )
        .await
        .unwrap();

    let h = common::Harness::with_config(coordinator, config);
    h.controller.open().await.unwrap();
    h.controller.change_role(Role::Primary).await.unwrap();

    wait_until(|| h.faults.reported().len() == 1).await;
    assert_eq!(health.states(), vec![HealthState::Unknown, HealthState::Error]);
    assert!(h.exits.reasons().is_empty());
    h.controller.close().await.unwrap();
}
