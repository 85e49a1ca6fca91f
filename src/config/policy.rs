//! Coordinator Execution Policy
//!
//! Switches that decide what happens when a coordinator fails or stops on its
//! own. Read at every coordinator start so operators can change the blast
//! radius without restarting the replica.

use serde::{Deserialize, Serialize};

use super::keys;
use super::store::{read_bool, ConfigStore};

/// Crash/fault behavior of the execution wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPolicy {
    /// Run the coordinator on a dedicated worker behind the policy wrapper.
    pub wrap_run: bool,

    /// Terminate the process when `run` fails with anything other than
    /// cancellation.
    pub crash_on_unhandled_error: bool,

    /// Terminate the process when `run` returns without being cancelled.
    pub crash_on_unexpected_completion: bool,

    /// Report a transient fault to the partition when `run` returns without
    /// being cancelled. Only consulted when not crashing.
    pub report_fault_on_unexpected_completion: bool,
}

impl ExecutionPolicy {
    /// Fail-fast everywhere
    pub fn new() -> Self {
        Self {
            wrap_run: true,
            crash_on_unhandled_error: true,
            crash_on_unexpected_completion: true,
            report_fault_on_unexpected_completion: true,
        }
    }

    /// Never crash, report faults to the partition
    pub fn report_only() -> Self {
        Self {
            wrap_run: true,
            crash_on_unhandled_error: false,
            crash_on_unexpected_completion: false,
            report_fault_on_unexpected_completion: true,
        }
    }

    /// Never crash, never report; log only
    pub fn log_only() -> Self {
        Self {
            wrap_run: true,
            crash_on_unhandled_error: false,
            crash_on_unexpected_completion: false,
            report_fault_on_unexpected_completion: false,
        }
    }

    /// Read the policy from a configuration section.
    ///
    /// Absent or invalid values keep the fail-fast defaults of [`ExecutionPolicy::new`].
    pub fn from_store(store: &dyn ConfigStore, section: &str) -> Self {
        let defaults = Self::new();
        Self {
            wrap_run: read_bool(store, section, keys::WRAP_RUN, defaults.wrap_run),
            crash_on_unhandled_error: read_bool(
                store,
                section,
                keys::CRASH_ON_UNHANDLED_ERROR,
                defaults.crash_on_unhandled_error,
            ),
            crash_on_unexpected_completion: read_bool(
                store,
                section,
                keys::CRASH_ON_UNEXPECTED_COMPLETION,
                defaults.crash_on_unexpected_completion,
            ),
            report_fault_on_unexpected_completion: read_bool(
                store,
                section,
                keys::REPORT_FAULT_ON_UNEXPECTED_COMPLETION,
                defaults.report_fault_on_unexpected_completion,
            ),
        }
    }
}

impl Default for ExecutionPolicy {
    fn default() -> Self {
        Self::new()
    }
}
