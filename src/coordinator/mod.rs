//! Coordinator Hosting
//!
//! - `Coordinator`: the contract every pluggable coordinator implements
//! - `ExecutionWrapper`: applies the crash/fault policy to a single run
//! - Built-in `NullCoordinator` and `TestCoordinator`
//!
//! # Shutdown semantics
//!
//! A run that ends after its token was cancelled is a shutdown, whatever it
//! returned. A run that ends before cancellation is either an unhandled error
//! or an unexpected completion and is handed to the execution policy.

mod builtin;
mod contract;
mod errors;
mod wrapper;

pub use builtin::{NullCoordinator, TestCoordinator};
pub use contract::{Coordinator, RunFuture};
pub use errors::{CoordinatorError, CoordinatorResult};
pub use wrapper::{run_direct, ExecutionWrapper, FatalExit, PolicyAction, ProcessAbort, RunOutcome};

pub use tokio_util::sync::CancellationToken;
