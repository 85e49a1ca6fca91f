//! Metrics registry for the coordinator host
//!
//! - Counters only
//! - Monotonic increase
//! - Reset only on process start

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters shared by the controller, the execution wrapper and
/// the replication pump.
///
/// All counters use `Relaxed` ordering; readers only need eventual values.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    role_changes: AtomicU64,
    coordinator_starts: AtomicU64,
    coordinator_stops: AtomicU64,
    coordinator_shutdowns: AtomicU64,
    unexpected_completions: AtomicU64,
    unhandled_errors: AtomicU64,
    faults_reported: AtomicU64,
    fatal_exits: AtomicU64,
    pump_operations: AtomicU64,
    pump_failures: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_role_changes(&self) {
        self.role_changes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_coordinator_starts(&self) {
        self.coordinator_starts.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts stop requests that found a run in flight
    pub fn increment_coordinator_stops(&self) {
        self.coordinator_stops.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts runs that ended through cancellation
    pub fn increment_coordinator_shutdowns(&self) {
        self.coordinator_shutdowns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_unexpected_completions(&self) {
        self.unexpected_completions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_unhandled_errors(&self) {
        self.unhandled_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_faults_reported(&self) {
        self.faults_reported.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_fatal_exits(&self) {
        self.fatal_exits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_pump_operations(&self) {
        self.pump_operations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_pump_failures(&self) {
        self.pump_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            role_changes: self.role_changes.load(Ordering::Relaxed),
            coordinator_starts: self.coordinator_starts.load(Ordering::Relaxed),
            coordinator_stops: self.coordinator_stops.load(Ordering::Relaxed),
            coordinator_shutdowns: self.coordinator_shutdowns.load(Ordering::Relaxed),
            unexpected_completions: self.unexpected_completions.load(Ordering::Relaxed),
            unhandled_errors: self.unhandled_errors.load(Ordering::Relaxed),
            faults_reported: self.faults_reported.load(Ordering::Relaxed),
            fatal_exits: self.fatal_exits.load(Ordering::Relaxed),
            pump_operations: self.pump_operations.load(Ordering::Relaxed),
            pump_failures: self.pump_failures.load(Ordering::Relaxed),
        }
    }

    /// Get current snapshot of all metrics as JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| String::from("{}"))
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub role_changes: u64,
    pub coordinator_starts: u64,
    pub coordinator_stops: u64,
    pub coordinator_shutdowns: u64,
    pub unexpected_completions: u64,
    pub unhandled_errors: u64,
    pub faults_reported: u64,
    pub fatal_exits: u64,
    pub pump_operations: u64,
    pub pump_failures: u64,
}
