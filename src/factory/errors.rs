//! # Coordinator Factory Errors
//!
//! Every variant is a configuration error: resolution fails and the host is
//! expected to treat the replica as misconfigured.

use thiserror::Error;

/// Result type for coordinator resolution
pub type FactoryResult<T> = Result<T, FactoryError>;

/// Coordinator resolution errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FactoryError {
    #[error("Plugin module not found: {module}")]
    ModuleNotFound { module: String },

    #[error("Factory type {factory_type} not found in module {module}")]
    FactoryTypeNotFound { module: String, factory_type: String },

    #[error("Factory {module}/{factory_type} expects ({expected}) but was given ({provided})")]
    SignatureMismatch {
        module: String,
        factory_type: String,
        expected: String,
        provided: String,
    },

    #[error("Factory {module}/{factory_type} failed: {message}")]
    FactoryFailed {
        module: String,
        factory_type: String,
        message: String,
    },

    #[error("Missing configuration value {section}/{key}")]
    MissingConfigValue { section: String, key: String },

    #[error("Factory {module}/{factory_type} does not provide a mode detector")]
    MissingModeDetector { module: String, factory_type: String },

    #[error("Mode detection failed: {0}")]
    ModeDetection(String),

    #[error("Could not determine the execution mode")]
    UndeterminedMode,

    #[error("Coordinator key already registered: {0}")]
    DuplicateKey(String),

    #[error("Plugin module already registered: {0}")]
    DuplicateModule(String),

    #[error("Coordinator key not registered: {0}")]
    UnknownKey(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FactoryError {
    /// Plugin module named by the error, if any
    pub fn module(&self) -> Option<&str> {
        match self {
            FactoryError::ModuleNotFound { module }
            | FactoryError::FactoryTypeNotFound { module, .. }
            | FactoryError::SignatureMismatch { module, .. }
            | FactoryError::FactoryFailed { module, .. }
            | FactoryError::MissingModeDetector { module, .. } => Some(module),
            _ => None,
        }
    }
}
