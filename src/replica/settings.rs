//! Replicator Settings
//!
//! Resolved from the replica's configuration section when the replicator is
//! created:
//! - `ReplicatorAddress`: listen address (default `localhost:0`)
//! - `EnableClusterSecurity`: use cluster credentials (default off)

use serde::{Deserialize, Serialize};

use crate::config::{keys, read_bool, read_optional, ConfigStore};

/// Transport security for replication traffic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SecurityMode {
    #[default]
    None,
    /// Authenticate with the cluster's own credentials
    ClusterCredentials,
}

/// Settings passed to `ElectionHandle::create_replicator`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicatorSettings {
    pub address: String,
    pub security: SecurityMode,
}

impl Default for ReplicatorSettings {
    fn default() -> Self {
        Self {
            address: keys::DEFAULT_REPLICATOR_ADDRESS.to_string(),
            security: SecurityMode::None,
        }
    }
}

/// Read replicator settings from `section`.
pub fn resolve_replicator_settings(store: &dyn ConfigStore, section: &str) -> ReplicatorSettings {
    let address = read_optional(store, section, keys::REPLICATOR_ADDRESS)
        .unwrap_or_else(|| keys::DEFAULT_REPLICATOR_ADDRESS.to_string());

    let security = if read_bool(store, section, keys::ENABLE_CLUSTER_SECURITY, false) {
        SecurityMode::ClusterCredentials
    } else {
        SecurityMode::None
    };

    ReplicatorSettings { address, security }
}
