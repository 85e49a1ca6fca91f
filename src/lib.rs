//! coordhost - leader-elected singleton coordinator hosting
//!
//! Runs one background coordinator per replicated partition, on the primary
//! replica only:
//! - `replica`: role state controller and replication pump
//! - `coordinator`: coordinator contract and execution policy wrapper
//! - `factory`: coordinator selection, plugin catalog, delay loading
//! - `config`: configuration store and execution policy switches
//! - `health`: health and fault reporting contracts
//! - `observability`: structured logging, lifecycle events, counters

pub mod config;
pub mod coordinator;
pub mod factory;
pub mod health;
pub mod observability;
pub mod replica;
