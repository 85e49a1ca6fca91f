//! Plugin Catalog
//!
//! Coordinator implementations that are not compiled into the registry are
//! registered here at process start as named modules. Each module exports
//! named factory types with a declared, ordered parameter signature.
//!
//! Loading a factory:
//! 1. find the module
//! 2. find the factory type in it
//! 3. check the supplied argument list against the signature
//! 4. instantiate
//!
//! Every failure is logged with the module and type names.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use super::args::ConstructFuture;
use super::autodetect::ModeDetector;
use super::errors::{FactoryError, FactoryResult};
use crate::config::ConfigStore;
use crate::observability::{log_event_with_fields, Event};
use crate::replica::{LeaderElection, ReplicaIdentity};

/// Parameter kinds a factory constructor can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FactoryParam {
    ConfigStore,
    SectionName,
    ReplicaIdentity,
    LeaderElection,
    ModeDetector,
}

impl FactoryParam {
    pub fn as_str(&self) -> &'static str {
        match self {
            FactoryParam::ConfigStore => "ConfigStore",
            FactoryParam::SectionName => "SectionName",
            FactoryParam::ReplicaIdentity => "ReplicaIdentity",
            FactoryParam::LeaderElection => "LeaderElection",
            FactoryParam::ModeDetector => "ModeDetector",
        }
    }
}

/// An argument passed to a factory constructor
#[derive(Clone)]
pub enum FactoryArg {
    ConfigStore(Arc<dyn ConfigStore>),
    SectionName(String),
    ReplicaIdentity(ReplicaIdentity),
    LeaderElection(Arc<dyn LeaderElection>),
    /// `None` unless the caller is autodetecting
    ModeDetector(Option<Arc<dyn ModeDetector>>),
}

impl FactoryArg {
    pub fn param(&self) -> FactoryParam {
        match self {
            FactoryArg::ConfigStore(_) => FactoryParam::ConfigStore,
            FactoryArg::SectionName(_) => FactoryParam::SectionName,
            FactoryArg::ReplicaIdentity(_) => FactoryParam::ReplicaIdentity,
            FactoryArg::LeaderElection(_) => FactoryParam::LeaderElection,
            FactoryArg::ModeDetector(_) => FactoryParam::ModeDetector,
        }
    }
}

impl fmt::Debug for FactoryArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactoryArg::SectionName(section) => write!(f, "SectionName({})", section),
            FactoryArg::ReplicaIdentity(id) => write!(f, "ReplicaIdentity({})", id),
            FactoryArg::ModeDetector(detector) => {
                write!(f, "ModeDetector({})", if detector.is_some() { "Some" } else { "None" })
            }
            other => f.write_str(other.param().as_str()),
        }
    }
}

/// Arguments already checked against a factory's signature
#[derive(Debug, Clone)]
pub struct PluginArgs {
    args: Vec<FactoryArg>,
}

impl PluginArgs {
    pub fn config(&self) -> Option<Arc<dyn ConfigStore>> {
        self.args.iter().find_map(|arg| match arg {
            FactoryArg::ConfigStore(config) => Some(config.clone()),
            _ => None,
        })
    }

    pub fn section(&self) -> Option<&str> {
        self.args.iter().find_map(|arg| match arg {
            FactoryArg::SectionName(section) => Some(section.as_str()),
            _ => None,
        })
    }

    pub fn identity(&self) -> Option<ReplicaIdentity> {
        self.args.iter().find_map(|arg| match arg {
            FactoryArg::ReplicaIdentity(identity) => Some(*identity),
            _ => None,
        })
    }

    pub fn leader_election(&self) -> Option<Arc<dyn LeaderElection>> {
        self.args.iter().find_map(|arg| match arg {
            FactoryArg::LeaderElection(election) => Some(election.clone()),
            _ => None,
        })
    }

    pub fn mode_detector(&self) -> Option<Arc<dyn ModeDetector>> {
        self.args.iter().find_map(|arg| match arg {
            FactoryArg::ModeDetector(detector) => detector.clone(),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}

/// A loaded factory. `create` builds the coordinator.
pub trait CoordinatorFactory: Send + Sync {
    fn create(&self) -> ConstructFuture<'_>;

    /// Mode detector exposed by factories that support autodetection
    fn mode_detector(&self) -> Option<Arc<dyn ModeDetector>> {
        None
    }
}

/// Instantiates a factory from checked arguments
pub type FactoryInstantiate =
    Arc<dyn Fn(PluginArgs) -> FactoryResult<Arc<dyn CoordinatorFactory>> + Send + Sync>;

#[derive(Clone)]
struct FactoryType {
    signature: Vec<FactoryParam>,
    instantiate: FactoryInstantiate,
}

/// A named set of factory types
#[derive(Clone)]
pub struct PluginModule {
    name: String,
    factories: HashMap<String, FactoryType>,
}

impl PluginModule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            factories: HashMap::new(),
        }
    }

    /// Export a factory type with its ordered constructor signature
    pub fn with_factory<F>(
        mut self,
        factory_type: impl Into<String>,
        signature: Vec<FactoryParam>,
        instantiate: F,
    ) -> Self
    where
        F: Fn(PluginArgs) -> FactoryResult<Arc<dyn CoordinatorFactory>> + Send + Sync + 'static,
    {
        self.factories.insert(
            factory_type.into(),
            FactoryType {
                signature,
                instantiate: Arc::new(instantiate),
            },
        );
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Exported factory type names, sorted
    pub fn factory_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.factories.keys().cloned().collect();
        types.sort();
        types
    }
}

impl fmt::Debug for PluginModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginModule")
            .field("name", &self.name)
            .field("factory_types", &self.factory_types())
            .finish()
    }
}

/// Process-wide table of plugin modules
#[derive(Debug, Default)]
pub struct PluginCatalog {
    modules: RwLock<HashMap<String, PluginModule>>,
    loads: AtomicU64,
}

impl PluginCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module. Module names are unique.
    pub fn register_module(&self, module: PluginModule) -> FactoryResult<()> {
        let mut modules = self
            .modules
            .write()
            .map_err(|_| FactoryError::Internal("Lock poisoned".into()))?;

        if modules.contains_key(module.name()) {
            return Err(FactoryError::DuplicateModule(module.name().to_string()));
        }
        modules.insert(module.name().to_string(), module);
        Ok(())
    }

    pub fn contains_module(&self, name: &str) -> bool {
        self.modules
            .read()
            .map(|m| m.contains_key(name))
            .unwrap_or(false)
    }

    /// Number of load attempts, successful or not
    pub fn load_count(&self) -> u64 {
        self.loads.load(Ordering::SeqCst)
    }

    /// Resolve `module`/`factory_type` and instantiate it with `args`.
    pub fn load_factory(
        &self,
        module: &str,
        factory_type: &str,
        args: Vec<FactoryArg>,
    ) -> FactoryResult<Arc<dyn CoordinatorFactory>> {
        self.loads.fetch_add(1, Ordering::SeqCst);

        let result = self.try_load(module, factory_type, args);
        if let Err(e) = &result {
            log_event_with_fields(
                Event::PluginLoadFailed,
                &[
                    ("module", module),
                    ("factory_type", factory_type),
                    ("error", &e.to_string()),
                ],
            );
        }
        result
    }

    fn try_load(
        &self,
        module: &str,
        factory_type: &str,
        args: Vec<FactoryArg>,
    ) -> FactoryResult<Arc<dyn CoordinatorFactory>> {
        let factory = {
            let modules = self
                .modules
                .read()
                .map_err(|_| FactoryError::Internal("Lock poisoned".into()))?;

            let plugin = modules.get(module).ok_or_else(|| FactoryError::ModuleNotFound {
                module: module.to_string(),
            })?;

            plugin
                .factories
                .get(factory_type)
                .cloned()
                .ok_or_else(|| FactoryError::FactoryTypeNotFound {
                    module: module.to_string(),
                    factory_type: factory_type.to_string(),
                })?
        };

        let provided: Vec<FactoryParam> = args.iter().map(FactoryArg::param).collect();
        if provided != factory.signature {
            return Err(FactoryError::SignatureMismatch {
                module: module.to_string(),
                factory_type: factory_type.to_string(),
                expected: describe(&factory.signature),
                provided: describe(&provided),
            });
        }

        (factory.instantiate)(PluginArgs { args }).map_err(|e| match e {
            FactoryError::FactoryFailed { .. } => e,
            other => FactoryError::FactoryFailed {
                module: module.to_string(),
                factory_type: factory_type.to_string(),
                message: other.to_string(),
            },
        })
    }
}

fn describe(params: &[FactoryParam]) -> String {
    params
        .iter()
        .map(FactoryParam::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
