//! Delay-Load Coordinator
//!
//! Defers construction of an expensive coordinator until its first `run`.
//! Health is reported under the `Coordinator` property:
//! - `Unknown` when the decorator is created
//! - `Ok` once the inner coordinator is constructed
//! - `Error` when construction fails; the next `run` tries again

use std::sync::Arc;

use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use super::args::{CoordinatorConstructor, CoordinatorFactoryArgs};
use crate::coordinator::{Coordinator, CoordinatorError, CoordinatorResult, RunFuture};
use crate::health::{HealthReport, HealthState};
use crate::observability::{log_event_with_fields, Event};

/// Health property the decorator reports on
pub const HEALTH_PROPERTY: &str = "Coordinator";

/// Coordinator that constructs its inner coordinator on first use
pub struct DelayLoadCoordinator {
    constructor: CoordinatorConstructor,
    args: CoordinatorFactoryArgs,
    inner: OnceCell<Arc<dyn Coordinator>>,
}

impl DelayLoadCoordinator {
    /// Wrap a constructor. The constructor is not called here.
    pub fn new(constructor: CoordinatorConstructor, args: CoordinatorFactoryArgs) -> Self {
        args.health.report_health(HealthReport::new(
            HEALTH_PROPERTY,
            HealthState::Unknown,
            "coordinator construction deferred until first run",
        ));

        Self {
            constructor,
            args,
            inner: OnceCell::new(),
        }
    }

    /// Whether the inner coordinator has been constructed
    pub fn is_loaded(&self) -> bool {
        self.inner.initialized()
    }

    async fn load(&self) -> CoordinatorResult<Arc<dyn Coordinator>> {
        let inner = self
            .inner
            .get_or_try_init(|| async {
                match (self.constructor)(self.args.clone()).await {
                    Ok(coordinator) => {
                        log_event_with_fields(Event::DelayLoadConstructed, &[("section", &self.args.section)]);
                        self.args.health.report_health(HealthReport::new(
                            HEALTH_PROPERTY,
                            HealthState::Ok,
                            "coordinator constructed",
                        ));
                        Ok(coordinator)
                    }
                    Err(e) => {
                        let message = e.to_string();
                        log_event_with_fields(
                            Event::DelayLoadFailed,
                            &[("section", &self.args.section), ("error", &message)],
                        );
                        self.args.health.report_health(HealthReport::new(
                            HEALTH_PROPERTY,
                            HealthState::Error,
                            message.clone(),
                        ));
                        Err(CoordinatorError::Construction(message))
                    }
                }
            })
            .await?;

        Ok(inner.clone())
    }
}

impl Coordinator for DelayLoadCoordinator {
    fn run(&self, primary_epoch: i32, token: CancellationToken) -> RunFuture<'_> {
        Box::pin(async move {
            let inner = tokio::select! {
                biased;
                _ = token.cancelled() => return Err(CoordinatorError::Cancelled),
                loaded = self.load() => loaded?,
            };

            inner.run(primary_epoch, token).await
        })
    }
}
