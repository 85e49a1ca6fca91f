//! Role State Controller
//!
//! Owns the replica's role and the coordinator run/cancel lifecycle:
//! - Primary: the coordinator runs, no pump
//! - Secondary: the coordinator is stopped (awaited), a pump drains the stream
//! - Close: everything stopped and awaited, then unregistered
//! - Abort: everything cancelled, nothing awaited
//!
//! `open`, `change_role`, `update_epoch` and `close` serialize on one async
//! mutex. The mutex stays held while a stopping run is awaited, so a new run
//! can never overlap an old one.
//!
//! Non-Responsibilities:
//! - Does not apply replicated operations
//! - Does not enforce a stop timeout
//! - Does not retry substrate calls

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use tokio::runtime::Handle;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::errors::{ReplicaError, ReplicaResult};
use super::pump::ReplicationPump;
use super::role::{Epoch, ReplicaIdentity, Role, RunState};
use super::settings::resolve_replicator_settings;
use super::substrate::{ElectionHandle, LeaderElection, Replicator, RoleChangeSink, SubstrateFuture};
use crate::config::{ConfigStore, ExecutionPolicy};
use crate::coordinator::{run_direct, Coordinator, ExecutionWrapper, FatalExit, ProcessAbort, RunOutcome};
use crate::health::FaultSink;
use crate::observability::{log_event_with_fields, Event, Logger, MetricsRegistry, ObservationScope};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Open,
    Closed,
}

/// A coordinator run in flight
struct CoordinatorRun {
    token: CancellationToken,
    task: JoinHandle<()>,
}

struct ControllerState {
    lifecycle: Lifecycle,
    role: Role,
    epoch: Epoch,
    endpoint: String,
    election: Option<Arc<dyn ElectionHandle>>,
    replicator: Option<Arc<dyn Replicator>>,
    run: Option<CoordinatorRun>,
    pump: Option<ReplicationPump>,
}

/// Hosts one coordinator for one replica
pub struct RoleStateController {
    identity: ReplicaIdentity,
    coordinator: Arc<dyn Coordinator>,
    leader_election: Arc<dyn LeaderElection>,
    config: Arc<dyn ConfigStore>,
    section: String,
    faults: Arc<dyn FaultSink>,
    fatal_exit: Arc<dyn FatalExit>,
    metrics: Arc<MetricsRegistry>,

    state: Mutex<ControllerState>,
    run_state: Arc<watch::Sender<RunState>>,

    /// Parent of every run and pump token; cancelled by `abort`
    shutdown: CancellationToken,
    aborted: AtomicBool,
}

impl RoleStateController {
    pub fn new(
        identity: ReplicaIdentity,
        coordinator: Arc<dyn Coordinator>,
        leader_election: Arc<dyn LeaderElection>,
        config: Arc<dyn ConfigStore>,
        section: impl Into<String>,
        faults: Arc<dyn FaultSink>,
    ) -> Self {
        let (run_state, _) = watch::channel(RunState::Idle);
        Self {
            identity,
            coordinator,
            leader_election,
            config,
            section: section.into(),
            faults,
            fatal_exit: Arc::new(ProcessAbort),
            metrics: Arc::new(MetricsRegistry::new()),
            state: Mutex::new(ControllerState {
                lifecycle: Lifecycle::Created,
                role: Role::Unknown,
                epoch: Epoch::default(),
                endpoint: String::new(),
                election: None,
                replicator: None,
                run: None,
                pump: None,
            }),
            run_state: Arc::new(run_state),
            shutdown: CancellationToken::new(),
            aborted: AtomicBool::new(false),
        }
    }

    /// Replace the process-abort fatal exit
    pub fn with_fatal_exit(mut self, fatal_exit: Arc<dyn FatalExit>) -> Self {
        self.fatal_exit = fatal_exit;
        self
    }

    /// Share a metrics registry with other replicas
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn identity(&self) -> ReplicaIdentity {
        self.identity
    }

    pub fn metrics(&self) -> Arc<MetricsRegistry> {
        self.metrics.clone()
    }

    pub fn run_state(&self) -> RunState {
        *self.run_state.borrow()
    }

    /// Watch run-state transitions
    pub fn subscribe_run_state(&self) -> watch::Receiver<RunState> {
        self.run_state.subscribe()
    }

    pub async fn role(&self) -> Role {
        self.state.lock().await.role
    }

    pub async fn epoch(&self) -> Epoch {
        self.state.lock().await.epoch
    }

    pub async fn endpoint(&self) -> String {
        self.state.lock().await.endpoint.clone()
    }

    /// Whether a pump task exists and is still draining
    pub async fn is_pumping(&self) -> bool {
        self.state
            .lock()
            .await
            .pump
            .as_ref()
            .map(|pump| !pump.is_finished())
            .unwrap_or(false)
    }

    pub async fn is_closed(&self) -> bool {
        self.aborted.load(Ordering::SeqCst) || self.state.lock().await.lifecycle == Lifecycle::Closed
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Register with the substrate and create the replicator.
    ///
    /// No coordinator work starts until the first `change_role(Primary)`.
    pub async fn open(self: &Arc<Self>) -> ReplicaResult<Arc<dyn Replicator>> {
        let mut state = self.state.lock().await;
        self.ensure_not_closed(&state)?;
        if state.lifecycle == Lifecycle::Open {
            return Err(ReplicaError::already_open(format!(
                "replica {} is already open",
                self.identity
            )));
        }

        let election = self.leader_election.open(self.identity).await?;

        let settings = resolve_replicator_settings(self.config.as_ref(), &self.section);
        let sink: Arc<dyn RoleChangeSink> = Arc::new(ControllerSink {
            controller: Arc::downgrade(self),
        });

        let replicator = match election.create_replicator(sink, settings) {
            Ok(replicator) => replicator,
            Err(e) => {
                if let Err(close_err) = election.close().await {
                    Logger::warn(
                        "ELECTION_CLOSE_FAILED",
                        &[("error", &close_err.to_string())],
                    );
                }
                return Err(e);
            }
        };

        state.endpoint = replicator.endpoint();
        state.election = Some(election);
        state.replicator = Some(replicator.clone());
        state.lifecycle = Lifecycle::Open;

        let identity = self.identity.to_string();
        log_event_with_fields(
            Event::ReplicaOpen,
            &[("replica", &identity), ("endpoint", &state.endpoint)],
        );

        Ok(replicator)
    }

    /// Apply a role change and return the replicator endpoint.
    ///
    /// Moving away from `Primary` completes only after the coordinator run has
    /// ended.
    pub async fn change_role(&self, role: Role) -> ReplicaResult<String> {
        let mut state = self.state.lock().await;
        self.ensure_open(&state)?;
        self.reap_ended_run(&mut state).await;

        if role == Role::Primary && state.run.is_some() {
            return Err(ReplicaError::illegal_transition(
                "coordinator is already running for this primary term",
            ));
        }

        let previous = state.role;
        state.role = role;
        self.metrics.increment_role_changes();
        log_event_with_fields(
            Event::RoleChange,
            &[("from", previous.as_str()), ("to", role.as_str())],
        );

        if role == Role::Primary {
            stop_pump(&mut state).await;
            self.start_coordinator(&mut state)?;
            return Ok(state.endpoint.clone());
        }

        self.stop_coordinator(&mut state).await;
        stop_pump(&mut state).await;

        if role.is_secondary() {
            if let Some(replicator) = &state.replicator {
                state.pump = ReplicationPump::start(
                    replicator,
                    role,
                    self.metrics.clone(),
                    self.shutdown.child_token(),
                );
            }
        }

        Ok(state.endpoint.clone())
    }

    /// Record a new epoch; epochs never decrease.
    pub async fn update_epoch(&self, epoch: Epoch) -> ReplicaResult<()> {
        let mut state = self.state.lock().await;
        self.ensure_open(&state)?;

        if epoch < state.epoch {
            return Err(ReplicaError::illegal_transition(format!(
                "epoch {} is older than current epoch {}",
                epoch, state.epoch
            )));
        }

        state.epoch = epoch;
        let epoch_str = epoch.to_string();
        let primary_epoch = epoch.primary_epoch().to_string();
        log_event_with_fields(
            Event::EpochUpdate,
            &[("epoch", &epoch_str), ("primary_epoch", &primary_epoch)],
        );
        Ok(())
    }

    /// Stop the coordinator and the pump, await both, then unregister.
    ///
    /// Idempotent; also a no-op after `abort`.
    pub async fn close(&self) -> ReplicaResult<()> {
        if self.aborted.load(Ordering::SeqCst) {
            return Ok(());
        }

        let mut state = self.state.lock().await;
        if state.lifecycle == Lifecycle::Closed {
            return Ok(());
        }

        self.stop_coordinator(&mut state).await;
        stop_pump(&mut state).await;

        state.lifecycle = Lifecycle::Closed;
        state.role = Role::Unknown;
        state.replicator = None;

        let identity = self.identity.to_string();
        log_event_with_fields(Event::ReplicaClose, &[("replica", &identity)]);

        match state.election.take() {
            Some(election) => election.close().await,
            None => Ok(()),
        }
    }

    /// Cancel everything without waiting. Unregistering happens in the
    /// background when a runtime is available. Idempotent.
    pub fn abort(self: &Arc<Self>) {
        if self.aborted.swap(true, Ordering::SeqCst) {
            return;
        }

        let identity = self.identity.to_string();
        log_event_with_fields(Event::ReplicaAbort, &[("replica", &identity)]);

        self.shutdown.cancel();

        match Handle::try_current() {
            Ok(runtime) => {
                let controller = Arc::clone(self);
                runtime.spawn(async move { controller.finish_abort().await });
            }
            Err(_) => {
                Logger::warn("ABORT_CLEANUP_SKIPPED", &[("reason", "no runtime")]);
            }
        }
    }

    async fn finish_abort(&self) {
        let mut state = self.state.lock().await;

        if let Some(run) = state.run.take() {
            if let Err(e) = run.task.await {
                Logger::warn("COORDINATOR_TASK_JOIN_FAILED", &[("error", &e.to_string())]);
            }
            self.run_state.send_replace(RunState::Idle);
        }
        stop_pump(&mut state).await;

        state.lifecycle = Lifecycle::Closed;
        state.role = Role::Unknown;
        state.replicator = None;

        if let Some(election) = state.election.take() {
            if let Err(e) = election.close().await {
                Logger::warn("ELECTION_CLOSE_FAILED", &[("error", &e.to_string())]);
            }
        }
    }

    // =========================================================================
    // COORDINATOR RUN
    // =========================================================================

    fn start_coordinator(&self, state: &mut ControllerState) -> ReplicaResult<()> {
        if state.run.is_some() {
            return Err(ReplicaError::illegal_transition(
                "coordinator run already in flight",
            ));
        }

        let policy = ExecutionPolicy::from_store(self.config.as_ref(), &self.section);
        let token = self.shutdown.child_token();
        let primary_epoch = state.epoch.primary_epoch();
        let coordinator = self.coordinator.clone();
        let run_state = self.run_state.clone();

        // Must precede the spawn: a run that ends at once publishes Idle
        self.run_state.send_replace(RunState::Running);

        let task = if policy.wrap_run {
            let wrapper = ExecutionWrapper::new(
                policy,
                self.faults.clone(),
                self.fatal_exit.clone(),
                self.metrics.clone(),
            );
            let runtime = Handle::current();
            let run_token = token.clone();

            // A dedicated blocking worker keeps a coordinator that blocks
            // its thread from stalling role-change completion.
            tokio::task::spawn_blocking(move || {
                let outcome = runtime.block_on(async move {
                    wrapper
                        .run(coordinator.as_ref(), primary_epoch, run_token)
                        .await
                });
                match outcome {
                    Ok(RunOutcome::Shutdown) => {}
                    Ok(RunOutcome::UnexpectedCompletion(action)) => {
                        let action = format!("{:?}", action);
                        Logger::info("COORDINATOR_RUN_ENDED_EARLY", &[("action", &action)]);
                    }
                    Err(e) => {
                        Logger::error("COORDINATOR_RUN_FAILED", &[("error", &e.to_string())]);
                    }
                }
                publish_run_ended(&run_state);
            })
        } else {
            let metrics = self.metrics.clone();
            let run_token = token.clone();
            tokio::spawn(async move {
                run_direct(coordinator, primary_epoch, run_token, metrics).await;
                publish_run_ended(&run_state);
            })
        };

        state.run = Some(CoordinatorRun { token, task });
        self.metrics.increment_coordinator_starts();

        let epoch = primary_epoch.to_string();
        let wrapped = policy.wrap_run.to_string();
        log_event_with_fields(
            Event::CoordinatorStart,
            &[("primary_epoch", &epoch), ("wrapped", &wrapped)],
        );
        Ok(())
    }

    /// Cancel the run in flight, if any, and wait for it to end.
    async fn stop_coordinator(&self, state: &mut ControllerState) {
        self.reap_ended_run(state).await;
        let Some(run) = state.run.take() else {
            return;
        };

        self.metrics.increment_coordinator_stops();
        log_event_with_fields(Event::CoordinatorStopRequested, &[]);
        self.run_state.send_replace(RunState::Stopping);

        let scope = ObservationScope::new("COORDINATOR_STOP");
        run.token.cancel();
        match run.task.await {
            Ok(()) => scope.complete(),
            Err(e) => scope.fail(&e.to_string()),
        }

        self.run_state.send_replace(RunState::Idle);
        log_event_with_fields(Event::CoordinatorStopped, &[]);
    }

    /// Clear a run that ended without a stop request.
    async fn reap_ended_run(&self, state: &mut ControllerState) {
        let ended = match &state.run {
            Some(run) => run.task.is_finished() || *self.run_state.borrow() == RunState::Idle,
            None => false,
        };
        if !ended {
            return;
        }

        if let Some(run) = state.run.take() {
            if let Err(e) = run.task.await {
                Logger::warn("COORDINATOR_TASK_JOIN_FAILED", &[("error", &e.to_string())]);
            }
            self.run_state.send_replace(RunState::Idle);
            Logger::info("COORDINATOR_RUN_REAPED", &[]);
        }
    }

    // =========================================================================
    // GUARDS
    // =========================================================================

    fn ensure_not_closed(&self, state: &ControllerState) -> ReplicaResult<()> {
        if self.aborted.load(Ordering::SeqCst) {
            return Err(ReplicaError::closed("replica was aborted"));
        }
        if state.lifecycle == Lifecycle::Closed {
            return Err(ReplicaError::closed("replica is closed"));
        }
        Ok(())
    }

    fn ensure_open(&self, state: &ControllerState) -> ReplicaResult<()> {
        self.ensure_not_closed(state)?;
        if state.lifecycle != Lifecycle::Open {
            return Err(ReplicaError::not_open("replica has not been opened"));
        }
        Ok(())
    }
}

/// Running -> Idle when a run task exits; a stop in progress owns the
/// Stopping -> Idle transition.
fn publish_run_ended(run_state: &watch::Sender<RunState>) {
    run_state.send_if_modified(|current| {
        if *current == RunState::Running {
            *current = RunState::Idle;
            true
        } else {
            false
        }
    });
}

async fn stop_pump(state: &mut ControllerState) {
    if let Some(pump) = state.pump.take() {
        pump.stop().await;
    }
}

/// Role-change sink handed to the substrate.
///
/// Holds the controller weakly so the replicator does not keep it alive.
struct ControllerSink {
    controller: Weak<RoleStateController>,
}

impl ControllerSink {
    fn upgrade(&self) -> ReplicaResult<Arc<RoleStateController>> {
        self.controller
            .upgrade()
            .ok_or_else(|| ReplicaError::closed("replica controller dropped"))
    }
}

impl RoleChangeSink for ControllerSink {
    fn change_role(&self, role: Role) -> SubstrateFuture<'_, String> {
        Box::pin(async move { self.upgrade()?.change_role(role).await })
    }

    fn update_epoch(&self, epoch: Epoch) -> SubstrateFuture<'_, ()> {
        Box::pin(async move { self.upgrade()?.update_epoch(epoch).await })
    }
}
