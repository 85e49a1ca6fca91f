//! Coordinator Factory Arguments
//!
//! Built once per replica and handed to whichever constructor the registry
//! selects.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use super::errors::FactoryResult;
use crate::config::{keys, ConfigStore};
use crate::coordinator::Coordinator;
use crate::health::{HealthReporter, LoggingHealthReporter};
use crate::replica::{LeaderElection, ReplicaIdentity};

/// Future resolving to a constructed coordinator
pub type ConstructFuture<'a> =
    Pin<Box<dyn Future<Output = FactoryResult<Arc<dyn Coordinator>>> + Send + 'a>>;

/// Registered constructor for a coordinator key
pub type CoordinatorConstructor =
    Arc<dyn Fn(CoordinatorFactoryArgs) -> ConstructFuture<'static> + Send + Sync>;

/// Everything a coordinator constructor may need
#[derive(Clone)]
pub struct CoordinatorFactoryArgs {
    pub config: Arc<dyn ConfigStore>,
    /// Configuration section the coordinator reads
    pub section: String,
    pub identity: ReplicaIdentity,
    pub service_name: String,
    pub leader_election: Arc<dyn LeaderElection>,
    pub health: Arc<dyn HealthReporter>,
}

impl CoordinatorFactoryArgs {
    /// Arguments reading the default section and reporting health to the log
    pub fn new(
        config: Arc<dyn ConfigStore>,
        identity: ReplicaIdentity,
        leader_election: Arc<dyn LeaderElection>,
    ) -> Self {
        Self {
            config,
            section: keys::DEFAULT_SECTION.to_string(),
            identity,
            service_name: String::new(),
            leader_election,
            health: Arc::new(LoggingHealthReporter),
        }
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = section.into();
        self
    }

    pub fn with_service_name(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = service_name.into();
        self
    }

    pub fn with_health_reporter(mut self, health: Arc<dyn HealthReporter>) -> Self {
        self.health = health;
        self
    }
}

impl fmt::Debug for CoordinatorFactoryArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoordinatorFactoryArgs")
            .field("section", &self.section)
            .field("identity", &self.identity)
            .field("service_name", &self.service_name)
            .finish_non_exhaustive()
    }
}
