//! Leader-Election Substrate Contracts
//!
//! The replication transport is external. The controller only needs:
//! - registration of the replica identity (`LeaderElection::open`)
//! - a replicator exposing an endpoint and two operation streams
//! - a way to receive role and epoch changes (`RoleChangeSink`)

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::errors::ReplicaResult;
use super::role::{Epoch, ReplicaIdentity, Role};
use super::settings::ReplicatorSettings;

/// Future returned by substrate calls
pub type SubstrateFuture<'a, T> = Pin<Box<dyn Future<Output = ReplicaResult<T>> + Send + 'a>>;

/// Entry point into the leader-election substrate
pub trait LeaderElection: Send + Sync {
    /// Register this replica with the partition
    fn open(&self, identity: ReplicaIdentity) -> SubstrateFuture<'_, Arc<dyn ElectionHandle>>;
}

/// A registered replica
pub trait ElectionHandle: Send + Sync {
    /// Create the replicator. Role and epoch changes are delivered to `sink`.
    fn create_replicator(
        &self,
        sink: Arc<dyn RoleChangeSink>,
        settings: ReplicatorSettings,
    ) -> ReplicaResult<Arc<dyn Replicator>>;

    /// Unregister from the partition
    fn close(&self) -> SubstrateFuture<'_, ()>;
}

/// Replicator created for this replica
pub trait Replicator: Send + Sync {
    /// Address other replicas reach this one on
    fn endpoint(&self) -> String;

    /// Stream of state copied from the primary while building
    fn copy_stream(&self) -> ReplicaResult<Arc<dyn OperationStream>>;

    /// Stream of replicated operations while caught up
    fn replication_stream(&self) -> ReplicaResult<Arc<dyn OperationStream>>;
}

/// Pull-based operation stream
pub trait OperationStream: Send + Sync {
    /// Next operation, or `None` at end of stream
    fn next_operation(&self) -> SubstrateFuture<'_, Option<Operation>>;
}

/// A replicated operation. The host never applies payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub sequence_number: i64,
}

/// Receiver of role and epoch changes
pub trait RoleChangeSink: Send + Sync {
    /// Apply a new role; resolves to the replicator endpoint
    fn change_role(&self, role: Role) -> SubstrateFuture<'_, String>;

    fn update_epoch(&self, epoch: Epoch) -> SubstrateFuture<'_, ()>;
}
