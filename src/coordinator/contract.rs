//! Coordinator Contract
//!
//! Every pluggable coordinator implements [`Coordinator`]. The host calls
//! `run` once per primary term and expects it to keep running until the token
//! is cancelled.

use std::future::Future;
use std::pin::Pin;

use tokio_util::sync::CancellationToken;

use super::errors::CoordinatorResult;

/// Future returned by [`Coordinator::run`]
pub type RunFuture<'a> = Pin<Box<dyn Future<Output = CoordinatorResult<()>> + Send + 'a>>;

/// A singleton background task hosted by the primary replica.
///
/// Implementations must observe `token` promptly. Returning `Ok(())` (or
/// [`CoordinatorError::Cancelled`](super::CoordinatorError::Cancelled)) after
/// cancellation is a normal shutdown; returning before cancellation is an
/// unexpected completion and is handled by the execution policy.
///
/// Only one `run` call is in flight per instance at a time.
pub trait Coordinator: Send + Sync {
    /// Run until cancelled.
    ///
    /// `primary_epoch` is the high 32 bits of the substrate's configuration
    /// number for the current primary term.
    fn run(&self, primary_epoch: i32, token: CancellationToken) -> RunFuture<'_>;
}
