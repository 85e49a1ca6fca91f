//! Shared fakes for integration tests
//!
//! - In-memory leader-election substrate with parking operation streams
//! - Recording fault sink, fatal exit and health reporter
//! - Probe coordinator that tracks overlap and stop ordering
//! - Plugin factories and a fixed-answer mode detector

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use coordhost::config::{ConfigStore, MemoryConfigStore};
use coordhost::coordinator::{CancellationToken, Coordinator, CoordinatorError, FatalExit, RunFuture};
use coordhost::factory::{
    AzureMode, ConstructFuture, CoordinatorFactory, CoordinatorFactoryArgs, DetectFuture,
    FactoryError, FactoryParam, ModeDetector, PluginArgs, PluginCatalog, PluginModule,
    AZURE_PARALLEL_DISABLED_FACTORY, AZURE_PARALLEL_FACTORY, AZURE_PARALLEL_MODULE,
    AZURE_SERIAL_FACTORY, AZURE_SERIAL_MODULE,
};
use coordhost::health::{FaultKind, FaultSink, HealthReport, HealthReporter, HealthState};
use coordhost::replica::{
    ElectionHandle, LeaderElection, Operation, OperationStream, ReplicaIdentity, ReplicaResult,
    Replicator, ReplicatorSettings, RoleChangeSink, RoleStateController, SubstrateFuture,
};
use uuid::Uuid;

// =============================================================================
// SUBSTRATE
// =============================================================================

/// Decrements the in-flight read counter when a read future is dropped
struct ActiveRead(Arc<AtomicUsize>);

impl Drop for ActiveRead {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Returns scripted operations, then parks until dropped
#[derive(Default)]
pub struct FakeStream {
    items: Mutex<VecDeque<Option<Operation>>>,
    reads: AtomicUsize,
    active: Arc<AtomicUsize>,
}

impl FakeStream {
    pub fn push(&self, item: Option<Operation>) {
        self.items.lock().unwrap().push_back(item);
    }

    /// `next_operation` calls made
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Reads currently parked
    pub fn active_reads(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

impl OperationStream for FakeStream {
    fn next_operation(&self) -> SubstrateFuture<'_, Option<Operation>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let scripted = self.items.lock().unwrap().pop_front();
        let active = self.active.clone();

        Box::pin(async move {
            if let Some(item) = scripted {
                return Ok(item);
            }
            active.fetch_add(1, Ordering::SeqCst);
            let _guard = ActiveRead(active);
            std::future::pending::<()>().await;
            Ok(None)
        })
    }
}

pub struct FakeReplicator {
    pub copy: Arc<FakeStream>,
    pub replication: Arc<FakeStream>,
}

impl Replicator for FakeReplicator {
    fn endpoint(&self) -> String {
        "fake-replicator:19000".to_string()
    }

    fn copy_stream(&self) -> ReplicaResult<Arc<dyn OperationStream>> {
        Ok(self.copy.clone())
    }

    fn replication_stream(&self) -> ReplicaResult<Arc<dyn OperationStream>> {
        Ok(self.replication.clone())
    }
}

/// Leader-election substrate that records every call
pub struct FakeLeaderElection {
    pub replicator: Arc<FakeReplicator>,
    pub opens: AtomicUsize,
    pub closes: Arc<AtomicUsize>,
    pub sink: Arc<Mutex<Option<Arc<dyn RoleChangeSink>>>>,
    pub settings: Arc<Mutex<Option<ReplicatorSettings>>>,
}

impl FakeLeaderElection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            replicator: Arc::new(FakeReplicator {
                copy: Arc::new(FakeStream::default()),
                replication: Arc::new(FakeStream::default()),
            }),
            opens: AtomicUsize::new(0),
            closes: Arc::new(AtomicUsize::new(0)),
            sink: Arc::new(Mutex::new(None)),
            settings: Arc::new(Mutex::new(None)),
        })
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Sink handed over by `create_replicator`
    pub fn sink(&self) -> Option<Arc<dyn RoleChangeSink>> {
        self.sink.lock().unwrap().clone()
    }
}

struct FakeElectionHandle {
    replicator: Arc<FakeReplicator>,
    closes: Arc<AtomicUsize>,
    sink: Arc<Mutex<Option<Arc<dyn RoleChangeSink>>>>,
    settings: Arc<Mutex<Option<ReplicatorSettings>>>,
}

impl LeaderElection for FakeLeaderElection {
    fn open(&self, _identity: ReplicaIdentity) -> SubstrateFuture<'_, Arc<dyn ElectionHandle>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let handle = FakeElectionHandle {
            replicator: self.replicator.clone(),
            closes: self.closes.clone(),
            sink: self.sink.clone(),
            settings: self.settings.clone(),
        };
        Box::pin(async move { Ok(Arc::new(handle) as Arc<dyn ElectionHandle>) })
    }
}

impl ElectionHandle for FakeElectionHandle {
    fn create_replicator(
        &self,
        sink: Arc<dyn RoleChangeSink>,
        settings: ReplicatorSettings,
    ) -> ReplicaResult<Arc<dyn Replicator>> {
        *self.sink.lock().unwrap() = Some(sink);
        *self.settings.lock().unwrap() = Some(settings);
        Ok(self.replicator.clone())
    }

    fn close(&self) -> SubstrateFuture<'_, ()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Ok(()) })
    }
}

// =============================================================================
// RECORDERS
// =============================================================================

#[derive(Default)]
pub struct RecordingFaults(Mutex<Vec<FaultKind>>);

impl RecordingFaults {
    pub fn reported(&self) -> Vec<FaultKind> {
        self.0.lock().unwrap().clone()
    }
}

impl FaultSink for RecordingFaults {
    fn report_fault(&self, kind: FaultKind) {
        self.0.lock().unwrap().push(kind);
    }
}

#[derive(Default)]
pub struct RecordingExit(Mutex<Vec<String>>);

impl RecordingExit {
    pub fn reasons(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl FatalExit for RecordingExit {
    fn exit(&self, reason: &str) {
        self.0.lock().unwrap().push(reason.to_string());
    }
}

#[derive(Default)]
pub struct RecordingHealth(Mutex<Vec<HealthReport>>);

impl RecordingHealth {
    pub fn states(&self) -> Vec<HealthState> {
        self.0.lock().unwrap().iter().map(|r| r.state).collect()
    }
}

impl HealthReporter for RecordingHealth {
    fn report_health(&self, report: HealthReport) {
        self.0.lock().unwrap().push(report);
    }
}

// =============================================================================
// COORDINATORS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeBehavior {
    /// Run until cancelled, then take `stop_delay` to wind down
    AwaitCancel,
    ReturnImmediately,
    Fail,
}

/// Coordinator that records starts, stops and overlap
pub struct ProbeCoordinator {
    behavior: ProbeBehavior,
    stop_delay: Duration,
    running: AtomicUsize,
    max_running: AtomicUsize,
    starts: AtomicUsize,
    stops: AtomicUsize,
    epochs: Mutex<Vec<i32>>,
}

struct Running<'a>(&'a ProbeCoordinator);

impl Drop for Running<'_> {
    fn drop(&mut self) {
        self.0.running.fetch_sub(1, Ordering::SeqCst);
        self.0.stops.fetch_add(1, Ordering::SeqCst);
    }
}

impl ProbeCoordinator {
    pub fn new(behavior: ProbeBehavior) -> Arc<Self> {
        Self::with_stop_delay(behavior, Duration::ZERO)
    }

    pub fn with_stop_delay(behavior: ProbeBehavior, stop_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            stop_delay,
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            epochs: Mutex::new(Vec::new()),
        })
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Highest number of overlapping runs observed
    pub fn max_running(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    pub fn epochs(&self) -> Vec<i32> {
        self.epochs.lock().unwrap().clone()
    }

    /// Wait until `starts() >= n`
    pub async fn wait_for_starts(&self, n: usize) {
        wait_until(|| self.starts() >= n).await;
    }
}

impl Coordinator for ProbeCoordinator {
    fn run(&self, primary_epoch: i32, token: CancellationToken) -> RunFuture<'_> {
        Box::pin(async move {
            self.epochs.lock().unwrap().push(primary_epoch);
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_running.fetch_max(now, Ordering::SeqCst);
            self.starts.fetch_add(1, Ordering::SeqCst);
            let _running = Running(self);

            match self.behavior {
                ProbeBehavior::AwaitCancel => {
                    token.cancelled().await;
                    if !self.stop_delay.is_zero() {
                        tokio::time::sleep(self.stop_delay).await;
                    }
                    Err(CoordinatorError::Cancelled)
                }
                ProbeBehavior::ReturnImmediately => Ok(()),
                ProbeBehavior::Fail => Err(CoordinatorError::failed("probe failure")),
            }
        })
    }
}

/// Poll `condition` until it holds, failing the test after five seconds
pub async fn wait_until(condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached within five seconds"
        );
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

// =============================================================================
// PLUGINS
// =============================================================================

/// Factory handing out a prepared coordinator
pub struct FakeFactory {
    pub coordinator: Arc<dyn Coordinator>,
    pub detector: Option<Arc<dyn ModeDetector>>,
}

impl CoordinatorFactory for FakeFactory {
    fn create(&self) -> ConstructFuture<'_> {
        let coordinator = self.coordinator.clone();
        Box::pin(async move { Ok(coordinator) })
    }

    fn mode_detector(&self) -> Option<Arc<dyn ModeDetector>> {
        self.detector.clone()
    }
}

pub struct FixedModeDetector(pub DetectorAnswer);

/// Answer a fixed mode detector gives
#[derive(Debug, Clone, Copy)]
pub enum DetectorAnswer {
    Mode(AzureMode),
    Fail,
}

impl ModeDetector for FixedModeDetector {
    fn detect_mode(&self) -> DetectFuture<'_> {
        let answer = self.0;
        Box::pin(async move {
            match answer {
                DetectorAnswer::Mode(mode) => Ok(mode),
                DetectorAnswer::Fail => Err(FactoryError::ModeDetection("metadata endpoint unreachable".into())),
            }
        })
    }
}

/// Coordinators served by [`azure_catalog`]
pub struct AzurePlugins {
    pub catalog: Arc<PluginCatalog>,
    pub serial: Arc<ProbeCoordinator>,
    pub parallel: Arc<ProbeCoordinator>,
    pub parallel_disabled: Arc<ProbeCoordinator>,
    /// Whether the serial factory received a mode detector
    pub serial_got_detector: Arc<Mutex<Option<bool>>>,
}

/// Catalog with the `AzureSerial` and `AzureParallel` modules.
///
/// `detector = None` makes the parallel factory expose no mode detector.
pub fn azure_catalog(detector: Option<DetectorAnswer>) -> AzurePlugins {
    let catalog = Arc::new(PluginCatalog::new());
    let serial = ProbeCoordinator::new(ProbeBehavior::AwaitCancel);
    let parallel = ProbeCoordinator::new(ProbeBehavior::AwaitCancel);
    let parallel_disabled = ProbeCoordinator::new(ProbeBehavior::AwaitCancel);
    let serial_got_detector = Arc::new(Mutex::new(None));

    let base = vec![
        FactoryParam::ConfigStore,
        FactoryParam::SectionName,
        FactoryParam::ReplicaIdentity,
    ];
    let mut serial_signature = base.clone();
    serial_signature.push(FactoryParam::ModeDetector);

    let serial_coordinator = serial.clone();
    let got_detector = serial_got_detector.clone();
    catalog
        .register_module(PluginModule::new(AZURE_SERIAL_MODULE).with_factory(
            AZURE_SERIAL_FACTORY,
            serial_signature,
            move |args: PluginArgs| {
                *got_detector.lock().unwrap() = Some(args.mode_detector().is_some());
                Ok(Arc::new(FakeFactory {
                    coordinator: serial_coordinator.clone(),
                    detector: None,
                }) as Arc<dyn CoordinatorFactory>)
            },
        ))
        .unwrap();

    let parallel_coordinator = parallel.clone();
    let disabled_coordinator = parallel_disabled.clone();
    let detector: Option<Arc<dyn ModeDetector>> =
        detector.map(|answer| Arc::new(FixedModeDetector(answer)) as Arc<dyn ModeDetector>);
    catalog
        .register_module(
            PluginModule::new(AZURE_PARALLEL_MODULE)
                .with_factory(AZURE_PARALLEL_FACTORY, base.clone(), move |_args| {
                    Ok(Arc::new(FakeFactory {
                        coordinator: parallel_coordinator.clone(),
                        detector: detector.clone(),
                    }) as Arc<dyn CoordinatorFactory>)
                })
                .with_factory(AZURE_PARALLEL_DISABLED_FACTORY, base, move |_args| {
                    Ok(Arc::new(FakeFactory {
                        coordinator: disabled_coordinator.clone(),
                        detector: None,
                    }) as Arc<dyn CoordinatorFactory>)
                }),
        )
        .unwrap();

    AzurePlugins {
        catalog,
        serial,
        parallel,
        parallel_disabled,
        serial_got_detector,
    }
}

// =============================================================================
// HARNESS
// =============================================================================

pub const SECTION: &str = "InfrastructureService";

pub fn identity() -> ReplicaIdentity {
    ReplicaIdentity::new(Uuid::new_v4(), 131_000_000_000)
}

pub fn factory_args(
    config: Arc<MemoryConfigStore>,
    election: Arc<FakeLeaderElection>,
) -> CoordinatorFactoryArgs {
    CoordinatorFactoryArgs::new(config as Arc<dyn ConfigStore>, identity(), election)
        .with_service_name("fabric:/System/InfrastructureService")
}

/// A controller wired to fakes; nothing can terminate the test process
pub struct Harness {
    pub config: Arc<MemoryConfigStore>,
    pub election: Arc<FakeLeaderElection>,
    pub faults: Arc<RecordingFaults>,
    pub exits: Arc<RecordingExit>,
    pub controller: Arc<RoleStateController>,
}

impl Harness {
    pub fn new(coordinator: Arc<dyn Coordinator>) -> Self {
        Self::with_config(coordinator, Arc::new(MemoryConfigStore::new()))
    }

    pub fn with_config(coordinator: Arc<dyn Coordinator>, config: Arc<MemoryConfigStore>) -> Self {
        let election = FakeLeaderElection::new();
        let faults = Arc::new(RecordingFaults::default());
        let exits = Arc::new(RecordingExit::default());

        let controller = Arc::new(
            RoleStateController::new(
                identity(),
                coordinator,
                election.clone(),
                config.clone(),
                SECTION,
                faults.clone(),
            )
            .with_fatal_exit(exits.clone()),
        );

        Self {
            config,
            election,
            faults,
            exits,
            controller,
        }
    }

    pub fn copy_stream(&self) -> &FakeStream {
        &self.election.replicator.copy
    }

    pub fn replication_stream(&self) -> &FakeStream {
        &self.election.replicator.replication
    }
}
