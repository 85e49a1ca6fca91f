//! Configuration
//!
//! - Sectioned key/value store contract and an in-memory implementation
//! - Execution policy switches, re-read at every coordinator start
//! - Well-known section and key names

mod errors;
pub mod keys;
mod policy;
mod store;

pub use errors::{ConfigError, ConfigResult};
pub use policy::ExecutionPolicy;
pub use store::{parse_bool, read_bool, read_optional, ConfigStore, MemoryConfigStore};
