//! Execution Mode Autodetection
//!
//! The Azure coordinators come in two mutually exclusive strategies. The
//! parallel factory knows how to tell which one the cluster is set up for:
//!
//! ```text
//! load AzureParallel/ParallelCoordinatorFactory
//!   └── mode_detector() ── absent ──> configuration error
//!         └── detect_mode()
//!               ├── Serial   ──> load AzureSerial/SerialCoordinatorFactory(.., detector) ──> create()
//!               ├── Parallel ──> create() on the parallel factory
//!               └── Unknown / error ──> configuration error
//! ```

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::args::CoordinatorFactoryArgs;
use super::errors::{FactoryError, FactoryResult};
use super::plugin::{FactoryArg, PluginCatalog};
use super::registry::{
    base_args, AZURE_PARALLEL_FACTORY, AZURE_PARALLEL_MODULE, AZURE_SERIAL_FACTORY,
    AZURE_SERIAL_MODULE,
};
use crate::coordinator::Coordinator;
use crate::observability::{log_event_with_fields, Event};

/// Execution strategy the cluster is configured for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AzureMode {
    #[default]
    Unknown,
    Serial,
    Parallel,
}

impl AzureMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AzureMode::Unknown => "Unknown",
            AzureMode::Serial => "Serial",
            AzureMode::Parallel => "Parallel",
        }
    }
}

impl fmt::Display for AzureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Future returned by [`ModeDetector::detect_mode`]
pub type DetectFuture<'a> = Pin<Box<dyn Future<Output = FactoryResult<AzureMode>> + Send + 'a>>;

/// Decides which execution strategy applies.
///
/// Serial coordinators also keep the detector to notice when the cluster
/// switches to parallel and step aside.
pub trait ModeDetector: Send + Sync {
    fn detect_mode(&self) -> DetectFuture<'_>;
}

/// Pick and construct the serial or parallel coordinator.
pub async fn resolve_autodetect(
    catalog: &PluginCatalog,
    args: &CoordinatorFactoryArgs,
) -> FactoryResult<Arc<dyn Coordinator>> {
    let parallel =
        catalog.load_factory(AZURE_PARALLEL_MODULE, AZURE_PARALLEL_FACTORY, base_args(args))?;

    let detector = parallel
        .mode_detector()
        .ok_or_else(|| FactoryError::MissingModeDetector {
            module: AZURE_PARALLEL_MODULE.to_string(),
            factory_type: AZURE_PARALLEL_FACTORY.to_string(),
        })?;

    let mode = detector.detect_mode().await.map_err(|e| match e {
        FactoryError::ModeDetection(_) => e,
        other => FactoryError::ModeDetection(other.to_string()),
    })?;
    log_event_with_fields(Event::ModeDetected, &[("mode", mode.as_str())]);

    let coordinator = match mode {
        AzureMode::Serial => {
            let mut serial_args = base_args(args);
            serial_args.push(FactoryArg::ModeDetector(Some(detector)));
            let serial =
                catalog.load_factory(AZURE_SERIAL_MODULE, AZURE_SERIAL_FACTORY, serial_args)?;
            let coordinator = serial.create().await?;
            coordinator
        }
        AzureMode::Parallel => parallel.create().await?,
        AzureMode::Unknown => return Err(FactoryError::UndeterminedMode),
    };
    Ok(coordinator)
}
