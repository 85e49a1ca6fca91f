//! Coordinator Selection
//!
//! Turns a replica's configuration section into a coordinator:
//! - `CoordinatorRegistry`: case-insensitive key to constructor map
//! - `PluginCatalog`: coordinator factories registered at process start
//! - Autodetection between the serial and parallel Azure strategies
//! - `DelayLoadCoordinator`: construction deferred to the first run
//!
//! # Resolution
//!
//! ```text
//! section missing        ──> Disabled (warning)
//! CoordinatorType absent ──> AzureAutodetect
//! CoordinatorType unknown ─> AzureAutodetect (warning)
//! DelayLoadCoordinator   ──> wrap constructor, construct on first run
//! otherwise              ──> construct now
//! ```
//!
//! Every resolution failure is a configuration error.

mod args;
mod autodetect;
mod delay_load;
mod errors;
mod plugin;
mod registry;

pub use args::{ConstructFuture, CoordinatorConstructor, CoordinatorFactoryArgs};
pub use autodetect::{resolve_autodetect, AzureMode, DetectFuture, ModeDetector};
pub use delay_load::{DelayLoadCoordinator, HEALTH_PROPERTY};
pub use errors::{FactoryError, FactoryResult};
pub use plugin::{
    CoordinatorFactory, FactoryArg, FactoryInstantiate, FactoryParam, PluginArgs, PluginCatalog,
    PluginModule,
};
pub use registry::{
    CoordinatorDescriptor, CoordinatorRegistry, Selection, AZURE_AUTODETECT, AZURE_PARALLEL,
    AZURE_PARALLEL_DISABLED, AZURE_PARALLEL_DISABLED_FACTORY, AZURE_PARALLEL_FACTORY,
    AZURE_PARALLEL_MODULE, AZURE_SERIAL, AZURE_SERIAL_FACTORY, AZURE_SERIAL_MODULE, DISABLED,
    DYNAMIC, SERVER_RESTART, SERVER_RESTART_FACTORY, SERVER_RESTART_MODULE, TEST,
};
