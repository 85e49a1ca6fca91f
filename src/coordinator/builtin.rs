//! Built-in coordinators compiled into the host
//!
//! - `NullCoordinator`: the `Disabled` coordinator, does nothing until cancelled
//! - `TestCoordinator`: in-process test double that records its runs

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;

use super::contract::{Coordinator, RunFuture};
use super::errors::CoordinatorError;
use crate::observability::Logger;

/// Inert coordinator: parks until cancelled, then returns.
#[derive(Debug, Default)]
pub struct NullCoordinator;

impl NullCoordinator {
    pub fn new() -> Self {
        Self
    }
}

impl Coordinator for NullCoordinator {
    fn run(&self, primary_epoch: i32, token: CancellationToken) -> RunFuture<'_> {
        Box::pin(async move {
            let epoch = primary_epoch.to_string();
            Logger::info("NULL_COORDINATOR_PARKED", &[("primary_epoch", &epoch)]);
            token.cancelled().await;
            Ok(())
        })
    }
}

/// Test double that behaves like a well-mannered coordinator.
///
/// Enforces the contract a real coordinator relies on: one run at a time and
/// a non-decreasing primary epoch.
#[derive(Debug, Default)]
pub struct TestCoordinator {
    runs: AtomicU64,
    running: AtomicBool,
    epochs: Mutex<Vec<i32>>,
}

impl TestCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of runs started
    pub fn run_count(&self) -> u64 {
        self.runs.load(Ordering::SeqCst)
    }

    /// Whether a run is currently in flight
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Primary epoch of the most recent run
    pub fn last_epoch(&self) -> Option<i32> {
        self.epochs
            .lock()
            .ok()
            .and_then(|epochs| epochs.last().copied())
    }
}

impl Coordinator for TestCoordinator {
    fn run(&self, primary_epoch: i32, token: CancellationToken) -> RunFuture<'_> {
        Box::pin(async move {
            if primary_epoch < 0 {
                return Err(CoordinatorError::failed(format!(
                    "primary epoch must be non-negative, got {}",
                    primary_epoch
                )));
            }

            if self.running.swap(true, Ordering::SeqCst) {
                return Err(CoordinatorError::failed("coordinator has already been started"));
            }

            {
                let mut epochs = match self.epochs.lock() {
                    Ok(epochs) => epochs,
                    Err(_) => {
                        self.running.store(false, Ordering::SeqCst);
                        return Err(CoordinatorError::failed("epoch history lock poisoned"));
                    }
                };
                if let Some(&last) = epochs.last() {
                    if primary_epoch < last {
                        self.running.store(false, Ordering::SeqCst);
                        return Err(CoordinatorError::failed(format!(
                            "primary epoch must be non-decreasing ({} < {})",
                            primary_epoch, last
                        )));
                    }
                }
                epochs.push(primary_epoch);
            }

            self.runs.fetch_add(1, Ordering::SeqCst);
            token.cancelled().await;
            self.running.store(false, Ordering::SeqCst);
            Ok(())
        })
    }
}
