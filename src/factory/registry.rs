//! # Coordinator Registry
//!
//! Maps the configured `CoordinatorType` to a constructor. Keys are matched
//! case-insensitively and are unique.
//!
//! Built-in keys:
//! - `Disabled`, `Test`: compiled in, never touch the plugin catalog
//! - `ServerRestart`, `AzureSerial`, `AzureParallel`, `AzureParallelDisabled`:
//!   fixed plugin module and factory type
//! - `AzureAutodetect`: parallel factory decides between serial and parallel
//! - `Dynamic`: module and factory type come from configuration

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::args::{ConstructFuture, CoordinatorConstructor, CoordinatorFactoryArgs};
use super::autodetect::resolve_autodetect;
use super::delay_load::DelayLoadCoordinator;
use super::errors::{FactoryError, FactoryResult};
use super::plugin::{FactoryArg, PluginCatalog};
use crate::config::{keys, read_bool, read_optional};
use crate::coordinator::{Coordinator, NullCoordinator, TestCoordinator};
use crate::observability::{log_event_with_fields, Event, ObservationScope};

pub const DISABLED: &str = "Disabled";
pub const TEST: &str = "Test";
pub const SERVER_RESTART: &str = "ServerRestart";
pub const AZURE_SERIAL: &str = "AzureSerial";
pub const AZURE_PARALLEL: &str = "AzureParallel";
pub const AZURE_PARALLEL_DISABLED: &str = "AzureParallelDisabled";
pub const AZURE_AUTODETECT: &str = "AzureAutodetect";
pub const DYNAMIC: &str = "Dynamic";

pub const SERVER_RESTART_MODULE: &str = "ServerRestart";
pub const SERVER_RESTART_FACTORY: &str = "ServerRestartCoordinatorFactory";
pub const AZURE_SERIAL_MODULE: &str = "AzureSerial";
pub const AZURE_SERIAL_FACTORY: &str = "SerialCoordinatorFactory";
pub const AZURE_PARALLEL_MODULE: &str = "AzureParallel";
pub const AZURE_PARALLEL_FACTORY: &str = "ParallelCoordinatorFactory";
pub const AZURE_PARALLEL_DISABLED_FACTORY: &str = "ParallelDisabledCoordinatorFactory";

/// A registered coordinator key
#[derive(Clone)]
pub struct CoordinatorDescriptor {
    key: String,
    constructor: CoordinatorConstructor,
}

impl CoordinatorDescriptor {
    pub fn new(key: impl Into<String>, constructor: CoordinatorConstructor) -> Self {
        Self {
            key: key.into(),
            constructor,
        }
    }

    /// Key as registered (original casing)
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn constructor(&self) -> CoordinatorConstructor {
        self.constructor.clone()
    }

    pub fn construct(&self, args: CoordinatorFactoryArgs) -> ConstructFuture<'static> {
        (self.constructor)(args)
    }
}

impl std::fmt::Debug for CoordinatorDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinatorDescriptor")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// What `select` decided for a configuration section
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// The section does not exist; the replica runs the inert coordinator
    SectionMissing,
    Coordinator {
        /// Registered key, original casing
        key: String,
        delay_load: bool,
    },
}

/// Coordinator constructors for one service type
pub struct CoordinatorRegistry {
    catalog: Arc<PluginCatalog>,
    /// Keyed by lowercase key
    descriptors: RwLock<HashMap<String, CoordinatorDescriptor>>,
}

impl CoordinatorRegistry {
    /// Create a registry holding the built-in keys
    pub fn new(catalog: Arc<PluginCatalog>) -> Self {
        let registry = Self {
            catalog,
            descriptors: RwLock::new(HashMap::new()),
        };

        for descriptor in builtin_descriptors(&registry.catalog) {
            if let Ok(mut descriptors) = registry.descriptors.write() {
                descriptors.insert(descriptor.key.to_ascii_lowercase(), descriptor);
            }
        }

        registry
    }

    pub fn catalog(&self) -> &Arc<PluginCatalog> {
        &self.catalog
    }

    /// Register an additional key
    pub fn register<F>(&self, key: &str, constructor: F) -> FactoryResult<()>
    where
        F: Fn(CoordinatorFactoryArgs) -> ConstructFuture<'static> + Send + Sync + 'static,
    {
        let mut descriptors = self
            .descriptors
            .write()
            .map_err(|_| FactoryError::Internal("Lock poisoned".into()))?;

        let normalized = key.to_ascii_lowercase();
        if descriptors.contains_key(&normalized) {
            return Err(FactoryError::DuplicateKey(key.to_string()));
        }
        descriptors.insert(normalized, CoordinatorDescriptor::new(key, Arc::new(constructor)));
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Look up a key, ignoring case
    pub fn get(&self, key: &str) -> Option<CoordinatorDescriptor> {
        self.descriptors
            .read()
            .ok()
            .and_then(|d| d.get(&key.to_ascii_lowercase()).cloned())
    }

    /// Registered keys in original casing, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .descriptors
            .read()
            .map(|d| d.values().map(|desc| desc.key.clone()).collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    /// Decide which key the configuration asks for.
    ///
    /// An absent or unregistered `CoordinatorType` falls back to
    /// `AzureAutodetect`; an unregistered one is logged.
    pub fn select(&self, args: &CoordinatorFactoryArgs) -> Selection {
        let config = args.config.as_ref();
        if !config.section_exists(&args.section) {
            return Selection::SectionMissing;
        }

        let key = match read_optional(config, &args.section, keys::COORDINATOR_TYPE) {
            None => AZURE_AUTODETECT.to_string(),
            Some(requested) => match self.get(&requested) {
                Some(descriptor) => descriptor.key,
                None => {
                    log_event_with_fields(
                        Event::CoordinatorTypeDefaulted,
                        &[("requested", &requested), ("using", AZURE_AUTODETECT)],
                    );
                    AZURE_AUTODETECT.to_string()
                }
            },
        };

        let delay_load = read_bool(config, &args.section, keys::DELAY_LOAD_COORDINATOR, false);
        Selection::Coordinator { key, delay_load }
    }

    /// Resolve the coordinator for a replica.
    ///
    /// Configuration errors are returned; they are not recoverable for this
    /// replica.
    pub async fn resolve(&self, args: CoordinatorFactoryArgs) -> FactoryResult<Arc<dyn Coordinator>> {
        let scope = ObservationScope::with_fields("COORDINATOR_RESOLVE", &[("section", &args.section)]);

        let (key, delay_load) = match self.select(&args) {
            Selection::SectionMissing => {
                log_event_with_fields(
                    Event::ConfigSectionMissing,
                    &[("section", &args.section), ("using", DISABLED)],
                );
                scope.complete_with_fields(&[("coordinator_type", DISABLED)]);
                return Ok(Arc::new(NullCoordinator::new()));
            }
            Selection::Coordinator { key, delay_load } => (key, delay_load),
        };

        let descriptor = match self.get(&key) {
            Some(descriptor) => descriptor,
            None => {
                let err = FactoryError::UnknownKey(key);
                scope.fail(&err.to_string());
                return Err(err);
            }
        };

        let delay_load_str = delay_load.to_string();
        if delay_load {
            let coordinator = DelayLoadCoordinator::new(descriptor.constructor(), args);
            log_event_with_fields(
                Event::CoordinatorResolved,
                &[("coordinator_type", descriptor.key()), ("delay_load", &delay_load_str)],
            );
            scope.complete_with_fields(&[("coordinator_type", descriptor.key())]);
            return Ok(Arc::new(coordinator));
        }

        match descriptor.construct(args).await {
            Ok(coordinator) => {
                log_event_with_fields(
                    Event::CoordinatorResolved,
                    &[("coordinator_type", descriptor.key()), ("delay_load", &delay_load_str)],
                );
                scope.complete_with_fields(&[("coordinator_type", descriptor.key())]);
                Ok(coordinator)
            }
            Err(e) => {
                scope.fail(&e.to_string());
                Err(e)
            }
        }
    }
}

/// Ordered base arguments every plugin factory receives
pub(crate) fn base_args(args: &CoordinatorFactoryArgs) -> Vec<FactoryArg> {
    vec![
        FactoryArg::ConfigStore(args.config.clone()),
        FactoryArg::SectionName(args.section.clone()),
        FactoryArg::ReplicaIdentity(args.identity),
    ]
}

/// Load `module`/`factory_type` from the catalog and create the coordinator
async fn load_and_create(
    catalog: Arc<PluginCatalog>,
    module: &str,
    factory_type: &str,
    plugin_args: Vec<FactoryArg>,
) -> FactoryResult<Arc<dyn Coordinator>> {
    let factory = catalog.load_factory(module, factory_type, plugin_args)?;
    let coordinator = factory.create().await?;
    Ok(coordinator)
}

/// Module and factory type named by the `Dynamic` configuration keys
fn dynamic_target(args: &CoordinatorFactoryArgs) -> FactoryResult<(String, String)> {
    let config = args.config.as_ref();
    let required = |key: &str| {
        read_optional(config, &args.section, key).ok_or_else(|| FactoryError::MissingConfigValue {
            section: args.section.clone(),
            key: key.to_string(),
        })
    };

    Ok((required(keys::DYNAMIC_MODULE)?, required(keys::DYNAMIC_FACTORY_TYPE)?))
}

/// Constructor that loads a fixed plugin factory and calls `create`
fn plugin_constructor(
    catalog: &Arc<PluginCatalog>,
    module: &'static str,
    factory_type: &'static str,
    extra: fn(&CoordinatorFactoryArgs) -> Vec<FactoryArg>,
) -> CoordinatorConstructor {
    let catalog = catalog.clone();
    Arc::new(move |args: CoordinatorFactoryArgs| -> ConstructFuture<'static> {
        let mut plugin_args = base_args(&args);
        plugin_args.extend(extra(&args));
        Box::pin(load_and_create(catalog.clone(), module, factory_type, plugin_args))
    })
}

fn builtin_descriptors(catalog: &Arc<PluginCatalog>) -> Vec<CoordinatorDescriptor> {
    let disabled: CoordinatorConstructor =
        Arc::new(|_args: CoordinatorFactoryArgs| -> ConstructFuture<'static> {
            Box::pin(async { Ok(Arc::new(NullCoordinator::new()) as Arc<dyn Coordinator>) })
        });

    let test: CoordinatorConstructor =
        Arc::new(|_args: CoordinatorFactoryArgs| -> ConstructFuture<'static> {
            Box::pin(async { Ok(Arc::new(TestCoordinator::new()) as Arc<dyn Coordinator>) })
        });

    let autodetect: CoordinatorConstructor = {
        let catalog = catalog.clone();
        Arc::new(move |args: CoordinatorFactoryArgs| -> ConstructFuture<'static> {
            let catalog = catalog.clone();
            Box::pin(async move { resolve_autodetect(&catalog, &args).await })
        })
    };

    let dynamic: CoordinatorConstructor = {
        let catalog = catalog.clone();
        Arc::new(move |args: CoordinatorFactoryArgs| -> ConstructFuture<'static> {
            let catalog = catalog.clone();
            Box::pin(async move {
                let (module, factory_type) = dynamic_target(&args)?;
                load_and_create(catalog, &module, &factory_type, base_args(&args)).await
            })
        })
    };

    vec![
        CoordinatorDescriptor::new(DISABLED, disabled),
        CoordinatorDescriptor::new(TEST, test),
        CoordinatorDescriptor::new(
            SERVER_RESTART,
            plugin_constructor(catalog, SERVER_RESTART_MODULE, SERVER_RESTART_FACTORY, |args| {
                vec![FactoryArg::LeaderElection(args.leader_election.clone())]
            }),
        ),
        CoordinatorDescriptor::new(
            AZURE_SERIAL,
            plugin_constructor(catalog, AZURE_SERIAL_MODULE, AZURE_SERIAL_FACTORY, |_| {
                vec![FactoryArg::ModeDetector(None)]
            }),
        ),
        CoordinatorDescriptor::new(
            AZURE_PARALLEL,
            plugin_constructor(catalog, AZURE_PARALLEL_MODULE, AZURE_PARALLEL_FACTORY, |_| Vec::new()),
        ),
        CoordinatorDescriptor::new(
            AZURE_PARALLEL_DISABLED,
            plugin_constructor(
                catalog,
                AZURE_PARALLEL_MODULE,
                AZURE_PARALLEL_DISABLED_FACTORY,
                |_| Vec::new(),
            ),
        ),
        CoordinatorDescriptor::new(AZURE_AUTODETECT, autodetect),
        CoordinatorDescriptor::new(DYNAMIC, dynamic),
    ]
}
