//! Coordinator Execution Wrapper
//!
//! Runs one coordinator invocation and applies the execution policy to how it
//! ends:
//!
//! ```text
//! run() ── Ok ──────────────┬── token cancelled ──> Shutdown
//!   │                       └── not cancelled ────> unexpected completion
//!   ├── Cancelled + token ──> Shutdown
//!   └── other error ── crash_on_unhandled_error ──> FatalExit, Err(error)
//!                    └── otherwise ──> same check as Ok
//!
//! unexpected completion:
//!   crash_on_unexpected_completion ──> FatalExit
//!   report_fault_on_unexpected_completion ──> FaultSink::report_fault(Transient)
//!   otherwise ──> log only
//! ```
//!
//! A suppressed error deliberately funnels into the unexpected-completion
//! check: from the host's point of view the coordinator has stopped working.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio_util::sync::CancellationToken;

use super::contract::Coordinator;
use super::errors::{CoordinatorError, CoordinatorResult};
use crate::config::ExecutionPolicy;
use crate::health::{FaultKind, FaultSink};
use crate::observability::{log_event_with_fields, Event, Logger, MetricsRegistry};

/// Process termination capability.
///
/// Injected so tests can observe a fatal exit instead of dying.
pub trait FatalExit: Send + Sync {
    /// Terminate the process. Implementations used in production never return.
    fn exit(&self, reason: &str);
}

/// Logs a FATAL line and aborts the process
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessAbort;

impl FatalExit for ProcessAbort {
    fn exit(&self, reason: &str) {
        Logger::fatal("PROCESS_ABORT", &[("reason", reason)]);
        std::process::abort();
    }
}

/// What the wrapper did about an unexpected completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyAction {
    FatalExit,
    FaultReported,
    Logged,
}

/// How a wrapped run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Run ended after cancellation was requested
    Shutdown,
    /// Run ended on its own (cleanly or with a suppressed error)
    UnexpectedCompletion(PolicyAction),
}

/// Applies an [`ExecutionPolicy`] to a single coordinator run
#[derive(Clone)]
pub struct ExecutionWrapper {
    policy: ExecutionPolicy,
    faults: Arc<dyn FaultSink>,
    fatal_exit: Arc<dyn FatalExit>,
    metrics: Arc<MetricsRegistry>,
}

impl ExecutionWrapper {
    pub fn new(
        policy: ExecutionPolicy,
        faults: Arc<dyn FaultSink>,
        fatal_exit: Arc<dyn FatalExit>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            policy,
            faults,
            fatal_exit,
            metrics,
        }
    }

    pub fn policy(&self) -> &ExecutionPolicy {
        &self.policy
    }

    /// Run the coordinator to completion and apply the policy.
    ///
    /// Returns `Err` only when an unhandled error triggered a fatal exit;
    /// the error is handed back to the caller after `FatalExit::exit`.
    pub async fn run(
        &self,
        coordinator: &dyn Coordinator,
        primary_epoch: i32,
        token: CancellationToken,
    ) -> CoordinatorResult<RunOutcome> {
        let epoch = primary_epoch.to_string();

        let result = AssertUnwindSafe(coordinator.run(primary_epoch, token.clone()))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(CoordinatorError::Panicked(panic_message(panic))));

        match result {
            Ok(()) => {}
            Err(e) if e.is_cancellation() && token.is_cancelled() => {
                return Ok(self.shutdown(&epoch));
            }
            Err(e) => {
                self.metrics.increment_unhandled_errors();
                let crash = self.policy.crash_on_unhandled_error.to_string();
                log_event_with_fields(
                    Event::CoordinatorUnhandledError,
                    &[
                        ("error", &e.to_string()),
                        ("primary_epoch", &epoch),
                        ("crash", &crash),
                    ],
                );

                if self.policy.crash_on_unhandled_error {
                    self.fatal(&format!("coordinator run failed: {}", e));
                    return Err(e);
                }
            }
        }

        if token.is_cancelled() {
            return Ok(self.shutdown(&epoch));
        }

        Ok(RunOutcome::UnexpectedCompletion(
            self.unexpected_completion(&epoch),
        ))
    }

    fn shutdown(&self, epoch: &str) -> RunOutcome {
        self.metrics.increment_coordinator_shutdowns();
        log_event_with_fields(Event::CoordinatorShutdown, &[("primary_epoch", epoch)]);
        RunOutcome::Shutdown
    }

    fn unexpected_completion(&self, epoch: &str) -> PolicyAction {
        self.metrics.increment_unexpected_completions();

        let action = if self.policy.crash_on_unexpected_completion {
            PolicyAction::FatalExit
        } else if self.policy.report_fault_on_unexpected_completion {
            PolicyAction::FaultReported
        } else {
            PolicyAction::Logged
        };

        let action_name = format!("{:?}", action);
        log_event_with_fields(
            Event::CoordinatorUnexpectedCompletion,
            &[("primary_epoch", epoch), ("action", &action_name)],
        );

        match action {
            PolicyAction::FatalExit => {
                self.fatal("coordinator returned without being cancelled");
            }
            PolicyAction::FaultReported => {
                self.metrics.increment_faults_reported();
                log_event_with_fields(
                    Event::CoordinatorFaultReported,
                    &[("fault", FaultKind::Transient.as_str())],
                );
                self.faults.report_fault(FaultKind::Transient);
            }
            PolicyAction::Logged => {}
        }

        action
    }

    fn fatal(&self, reason: &str) {
        self.metrics.increment_fatal_exits();
        log_event_with_fields(Event::CoordinatorFatalExit, &[("reason", reason)]);
        self.fatal_exit.exit(reason);
    }
}

/// Run without the policy wrapper; the outcome is only logged.
pub async fn run_direct(
    coordinator: Arc<dyn Coordinator>,
    primary_epoch: i32,
    token: CancellationToken,
    metrics: Arc<MetricsRegistry>,
) {
    let epoch = primary_epoch.to_string();

    match coordinator.run(primary_epoch, token.clone()).await {
        Ok(()) if token.is_cancelled() => {
            metrics.increment_coordinator_shutdowns();
            log_event_with_fields(Event::CoordinatorShutdown, &[("primary_epoch", &epoch)]);
        }
        Err(e) if e.is_cancellation() && token.is_cancelled() => {
            metrics.increment_coordinator_shutdowns();
            log_event_with_fields(Event::CoordinatorShutdown, &[("primary_epoch", &epoch)]);
        }
        Ok(()) => {
            metrics.increment_unexpected_completions();
            log_event_with_fields(
                Event::CoordinatorUnexpectedCompletion,
                &[("primary_epoch", &epoch), ("action", "Unwrapped")],
            );
        }
        Err(e) => {
            metrics.increment_unhandled_errors();
            log_event_with_fields(
                Event::CoordinatorUnhandledError,
                &[("error", &e.to_string()), ("primary_epoch", &epoch)],
            );
        }
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
