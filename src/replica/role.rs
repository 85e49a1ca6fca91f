//! Replica Role and Epoch
//!
//! - `Role`: what the substrate last told this replica it is
//! - `Epoch`: (data loss number, configuration number), never decreasing
//! - `RunState`: where the coordinator run is in its lifecycle
//!
//! The coordinator only runs while the role is `Primary`.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Replica role as assigned by the leader-election substrate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Role {
    /// Before the first role change and after close
    #[default]
    Unknown,

    /// Elected leader; hosts the coordinator
    Primary,

    /// Caught-up secondary; drains the replication stream
    ActiveSecondary,

    /// Building secondary; drains the copy stream
    IdleSecondary,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Unknown => "Unknown",
            Role::Primary => "Primary",
            Role::ActiveSecondary => "ActiveSecondary",
            Role::IdleSecondary => "IdleSecondary",
        }
    }

    /// Whether this role drains an operation stream
    pub fn is_secondary(&self) -> bool {
        matches!(self, Role::ActiveSecondary | Role::IdleSecondary)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Partition epoch
///
/// Ordered by data loss number first, then configuration number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Epoch {
    pub data_loss_number: i64,
    pub configuration_number: i64,
}

impl Epoch {
    pub fn new(data_loss_number: i64, configuration_number: i64) -> Self {
        Self {
            data_loss_number,
            configuration_number,
        }
    }

    /// Primary epoch handed to the coordinator: the high 32 bits of the
    /// configuration number.
    pub fn primary_epoch(&self) -> i32 {
        (self.configuration_number >> 32) as i32
    }
}

impl PartialOrd for Epoch {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Epoch {
    fn cmp(&self, other: &Self) -> Ordering {
        self.data_loss_number
            .cmp(&other.data_loss_number)
            .then(self.configuration_number.cmp(&other.configuration_number))
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.data_loss_number, self.configuration_number)
    }
}

/// Identity of this replica within its partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReplicaIdentity {
    pub partition_id: Uuid,
    pub replica_id: i64,
}

impl ReplicaIdentity {
    pub fn new(partition_id: Uuid, replica_id: i64) -> Self {
        Self {
            partition_id,
            replica_id,
        }
    }
}

impl fmt::Display for ReplicaIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.partition_id, self.replica_id)
    }
}

/// Coordinator run lifecycle, owned by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RunState {
    #[default]
    Idle,
    Running,
    /// Cancellation requested, run not finished yet
    Stopping,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Idle => "Idle",
            RunState::Running => "Running",
            RunState::Stopping => "Stopping",
        }
    }
}
