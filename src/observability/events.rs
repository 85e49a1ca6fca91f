//! Observable events of the coordinator host
//!
//! Events are explicit and typed. Every log line the host writes carries one
//! of these names.

use std::fmt;

use super::logger::Severity;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Replica lifecycle
    /// Replica registered with the leader-election substrate
    ReplicaOpen,
    /// Replica role changed
    RoleChange,
    /// New epoch recorded
    EpochUpdate,
    /// Replica closed gracefully
    ReplicaClose,
    /// Replica aborted
    ReplicaAbort,

    // Coordinator lifecycle
    /// Coordinator run spawned
    CoordinatorStart,
    /// Cancellation requested on the running coordinator
    CoordinatorStopRequested,
    /// Coordinator run task finished after a stop request
    CoordinatorStopped,
    /// Coordinator exited in response to cancellation
    CoordinatorShutdown,
    /// Coordinator returned without being cancelled
    CoordinatorUnexpectedCompletion,
    /// Coordinator failed with an error other than cancellation
    CoordinatorUnhandledError,
    /// Transient fault reported to the partition
    CoordinatorFaultReported,
    /// Process is being terminated by policy (FATAL)
    CoordinatorFatalExit,

    // Replication pump
    /// Pump started draining a stream
    PumpStart,
    /// Stream returned end-of-stream or the pump was cancelled
    PumpEnd,
    /// Stream read failed
    PumpFailed,

    // Coordinator selection
    /// Configuration section is missing
    ConfigSectionMissing,
    /// A configuration value could not be parsed
    ConfigValueInvalid,
    /// Coordinator type absent or unknown, autodetect selected
    CoordinatorTypeDefaulted,
    /// Coordinator selected
    CoordinatorResolved,
    /// Plugin module or factory type could not be loaded
    PluginLoadFailed,
    /// Mode autodetection finished
    ModeDetected,
    /// Delay-loaded coordinator constructed
    DelayLoadConstructed,
    /// Delay-loaded coordinator construction failed
    DelayLoadFailed,

    // Health
    /// Health report emitted
    HealthReported,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ReplicaOpen => "REPLICA_OPEN",
            Event::RoleChange => "ROLE_CHANGE",
            Event::EpochUpdate => "EPOCH_UPDATE",
            Event::ReplicaClose => "REPLICA_CLOSE",
            Event::ReplicaAbort => "REPLICA_ABORT",

            Event::CoordinatorStart => "COORDINATOR_START",
            Event::CoordinatorStopRequested => "COORDINATOR_STOP_REQUESTED",
            Event::CoordinatorStopped => "COORDINATOR_STOPPED",
            Event::CoordinatorShutdown => "COORDINATOR_SHUTDOWN",
            Event::CoordinatorUnexpectedCompletion => "COORDINATOR_UNEXPECTED_COMPLETION",
            Event::CoordinatorUnhandledError => "COORDINATOR_UNHANDLED_ERROR",
            Event::CoordinatorFaultReported => "COORDINATOR_FAULT_REPORTED",
            Event::CoordinatorFatalExit => "COORDINATOR_FATAL_EXIT",

            Event::PumpStart => "PUMP_START",
            Event::PumpEnd => "PUMP_END",
            Event::PumpFailed => "PUMP_FAILED",

            Event::ConfigSectionMissing => "CONFIG_SECTION_MISSING",
            Event::ConfigValueInvalid => "CONFIG_VALUE_INVALID",
            Event::CoordinatorTypeDefaulted => "COORDINATOR_TYPE_DEFAULTED",
            Event::CoordinatorResolved => "COORDINATOR_RESOLVED",
            Event::PluginLoadFailed => "PLUGIN_LOAD_FAILED",
            Event::ModeDetected => "MODE_DETECTED",
            Event::DelayLoadConstructed => "DELAY_LOAD_CONSTRUCTED",
            Event::DelayLoadFailed => "DELAY_LOAD_FAILED",

            Event::HealthReported => "HEALTH_REPORTED",
        }
    }

    /// Severity the event is logged at by default
    pub fn severity(&self) -> Severity {
        match self {
            Event::CoordinatorFatalExit => Severity::Fatal,
            Event::CoordinatorUnhandledError
            | Event::PumpFailed
            | Event::PluginLoadFailed
            | Event::DelayLoadFailed => Severity::Error,
            Event::CoordinatorUnexpectedCompletion
            | Event::CoordinatorFaultReported
            | Event::ConfigSectionMissing
            | Event::ConfigValueInvalid
            | Event::CoordinatorTypeDefaulted
            | Event::ReplicaAbort => Severity::Warn,
            _ => Severity::Info,
        }
    }

    /// Returns true if this event indicates a fatal condition
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
