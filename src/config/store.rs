//! Configuration Store
//!
//! The host reads its settings from an external, sectioned key/value store.
//! Only the read contract matters here: `section_exists`, `read_value` with a
//! caller-supplied default.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{RwLock, RwLockWriteGuard};

use serde_json::Value;

use super::errors::{ConfigError, ConfigResult};
use crate::observability::{log_event_with_fields, Event};

/// Read access to sectioned configuration
pub trait ConfigStore: Send + Sync {
    /// Whether the section is present at all
    fn section_exists(&self, section: &str) -> bool;

    /// Read a value, returning `default` when the section or key is absent
    fn read_value(&self, section: &str, key: &str, default: &str) -> String;
}

/// Read a value, treating an absent or blank value as `None`
pub fn read_optional(store: &dyn ConfigStore, section: &str, key: &str) -> Option<String> {
    let value = store.read_value(section, key, "");
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Parse a boolean configuration value (case-insensitive `true`/`false`)
pub fn parse_bool(section: &str, key: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Read a boolean, falling back to `default` when absent or unparsable.
///
/// Unparsable values are logged; they never fail the caller.
pub fn read_bool(store: &dyn ConfigStore, section: &str, key: &str, default: bool) -> bool {
    let Some(raw) = read_optional(store, section, key) else {
        return default;
    };

    match parse_bool(section, key, &raw) {
        Ok(value) => value,
        Err(e) => {
            let default_str = default.to_string();
            log_event_with_fields(
                Event::ConfigValueInvalid,
                &[
                    ("error", &e.to_string()),
                    ("using_default", &default_str),
                ],
            );
            default
        }
    }
}

/// In-memory configuration store.
///
/// Section names and keys are matched exactly.
#[derive(Debug)]
pub struct MemoryConfigStore {
    sections: RwLock<HashMap<String, HashMap<String, String>>>,
}

impl Default for MemoryConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryConfigStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            sections: RwLock::new(HashMap::new()),
        }
    }

    /// Load from a JSON document of the form
    /// `{"Section": {"Key": "value", "Flag": true}}`.
    ///
    /// Scalar values are stored in their string form.
    pub fn from_json(document: &str) -> ConfigResult<Self> {
        let parsed: HashMap<String, HashMap<String, Value>> = serde_json::from_str(document)?;
        let store = Self::new();

        {
            let mut sections = store.write_sections();
            for (section, values) in parsed {
                let entries = values
                    .into_iter()
                    .map(|(key, value)| {
                        let value = match value {
                            Value::String(s) => s,
                            other => other.to_string(),
                        };
                        (key, value)
                    })
                    .collect();
                sections.insert(section, entries);
            }
        }

        Ok(store)
    }

    /// Load a JSON document from disk
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let document = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&document)
    }

    /// Create an empty section if it does not exist
    pub fn add_section(&self, section: &str) {
        self.write_sections().entry(section.to_string()).or_default();
    }

    /// Set a value, creating the section if needed
    pub fn set_value(&self, section: &str, key: &str, value: impl Into<String>) {
        self.write_sections()
            .entry(section.to_string())
            .or_default()
            .insert(key.to_string(), value.into());
    }

    /// Remove a whole section
    pub fn remove_section(&self, section: &str) {
        self.write_sections().remove(section);
    }

    fn write_sections(&self) -> RwLockWriteGuard<'_, HashMap<String, HashMap<String, String>>> {
        self.sections
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ConfigStore for MemoryConfigStore {
    fn section_exists(&self, section: &str) -> bool {
        self.sections
            .read()
            .map(|s| s.contains_key(section))
            .unwrap_or(false)
    }

    fn read_value(&self, section: &str, key: &str, default: &str) -> String {
        self.sections
            .read()
            .ok()
            .and_then(|s| s.get(section).and_then(|values| values.get(key).cloned()))
            .unwrap_or_else(|| default.to_string())
    }
}
