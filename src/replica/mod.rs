//! Replica Hosting
//!
//! - Role, epoch and identity types
//! - Leader-election substrate contracts
//! - `RoleStateController`: starts the coordinator on promotion, stops it
//!   (awaited) on demotion, and pumps operation streams as a secondary
//! - `ReplicationPump`: drains the copy or replication stream
//!
//! Invariants:
//! - At most one coordinator run per replica
//! - The coordinator only runs while the role is `Primary`
//! - Epochs never decrease

mod controller;
mod errors;
mod pump;
mod role;
mod settings;
mod substrate;

pub use controller::RoleStateController;
pub use errors::{ReplicaError, ReplicaErrorKind, ReplicaResult};
pub use pump::{PumpExit, ReplicationPump};
pub use role::{Epoch, ReplicaIdentity, Role, RunState};
pub use settings::{resolve_replicator_settings, ReplicatorSettings, SecurityMode};
pub use substrate::{
    ElectionHandle, LeaderElection, Operation, OperationStream, Replicator, RoleChangeSink,
    SubstrateFuture,
};
