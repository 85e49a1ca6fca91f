//! Configuration section and key names

/// Section read when the host does not name one
pub const DEFAULT_SECTION: &str = "InfrastructureService";

/// Registry key of the coordinator to run
pub const COORDINATOR_TYPE: &str = "CoordinatorType";

/// Wrap the selected constructor in a delay-load decorator
pub const DELAY_LOAD_COORDINATOR: &str = "DelayLoadCoordinator";

pub const WRAP_RUN: &str = "WrapRunAsync";
pub const CRASH_ON_UNHANDLED_ERROR: &str = "CrashOnRunAsyncUnhandledException";
pub const CRASH_ON_UNEXPECTED_COMPLETION: &str = "CrashOnRunAsyncUnexpectedCompletion";
pub const REPORT_FAULT_ON_UNEXPECTED_COMPLETION: &str = "ReportFaultOnRunAsyncUnexpectedCompletion";

/// Plugin module loaded by the `Dynamic` coordinator type
pub const DYNAMIC_MODULE: &str = "DynamicCoordinatorModule";

/// Factory type resolved inside [`DYNAMIC_MODULE`]
pub const DYNAMIC_FACTORY_TYPE: &str = "DynamicCoordinatorFactoryType";

pub const REPLICATOR_ADDRESS: &str = "ReplicatorAddress";
pub const ENABLE_CLUSTER_SECURITY: &str = "EnableClusterSecurity";

/// Listen address used when [`REPLICATOR_ADDRESS`] is not configured
pub const DEFAULT_REPLICATOR_ADDRESS: &str = "localhost:0";
