//! Replication Pump
//!
//! Drains the copy stream (idle secondary) or the replication stream (active
//! secondary). Operations are acknowledged by pulling the next one; payloads
//! are never applied. A stream error ends the pump until the next role change.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::role::Role;
use super::substrate::{OperationStream, Replicator};
use crate::observability::{log_event_with_fields, Event, MetricsRegistry};

/// Why a pump stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpExit {
    /// The stream returned `None`
    EndOfStream,
    /// The controller cancelled the pump
    Cancelled,
    /// The stream returned an error
    Failed,
}

impl PumpExit {
    pub fn as_str(&self) -> &'static str {
        match self {
            PumpExit::EndOfStream => "EndOfStream",
            PumpExit::Cancelled => "Cancelled",
            PumpExit::Failed => "Failed",
        }
    }
}

/// A running pump task
pub struct ReplicationPump {
    role: Role,
    token: CancellationToken,
    operations: Arc<AtomicU64>,
    task: JoinHandle<PumpExit>,
}

impl ReplicationPump {
    /// Start draining the stream that belongs to `role`.
    ///
    /// Returns `None` when the role has no stream or the stream could not be
    /// opened (logged).
    pub fn start(
        replicator: &Arc<dyn Replicator>,
        role: Role,
        metrics: Arc<MetricsRegistry>,
        token: CancellationToken,
    ) -> Option<Self> {
        let (stream_name, stream) = match role {
            Role::IdleSecondary => ("copy", replicator.copy_stream()),
            Role::ActiveSecondary => ("replication", replicator.replication_stream()),
            _ => return None,
        };

        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                metrics.increment_pump_failures();
                log_event_with_fields(
                    Event::PumpFailed,
                    &[
                        ("role", role.as_str()),
                        ("stream", stream_name),
                        ("error", &e.to_string()),
                    ],
                );
                return None;
            }
        };

        log_event_with_fields(
            Event::PumpStart,
            &[("role", role.as_str()), ("stream", stream_name)],
        );

        let operations = Arc::new(AtomicU64::new(0));
        let task = tokio::spawn(drain(
            stream,
            role,
            stream_name,
            metrics,
            operations.clone(),
            token.clone(),
        ));

        Some(Self {
            role,
            token,
            operations,
            task,
        })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Operations drained so far
    pub fn operations(&self) -> u64 {
        self.operations.load(Ordering::SeqCst)
    }

    /// Whether the pump task has already ended on its own
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Request cancellation without waiting
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Cancel and wait for the pump task to end
    pub async fn stop(self) -> PumpExit {
        self.token.cancel();
        match self.task.await {
            Ok(exit) => exit,
            Err(e) => {
                log_event_with_fields(
                    Event::PumpFailed,
                    &[("role", self.role.as_str()), ("error", &e.to_string())],
                );
                PumpExit::Failed
            }
        }
    }
}

async fn drain(
    stream: Arc<dyn OperationStream>,
    role: Role,
    stream_name: &'static str,
    metrics: Arc<MetricsRegistry>,
    operations: Arc<AtomicU64>,
    token: CancellationToken,
) -> PumpExit {
    let exit = loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => break PumpExit::Cancelled,
            next = stream.next_operation() => next,
        };

        match next {
            Ok(Some(_)) => {
                operations.fetch_add(1, Ordering::SeqCst);
                metrics.increment_pump_operations();
            }
            Ok(None) => break PumpExit::EndOfStream,
            Err(e) => {
                metrics.increment_pump_failures();
                log_event_with_fields(
                    Event::PumpFailed,
                    &[
                        ("role", role.as_str()),
                        ("stream", stream_name),
                        ("error", &e.to_string()),
                    ],
                );
                break PumpExit::Failed;
            }
        }
    };

    let count = operations.load(Ordering::SeqCst).to_string();
    log_event_with_fields(
        Event::PumpEnd,
        &[
            ("role", role.as_str()),
            ("stream", stream_name),
            ("exit", exit.as_str()),
            ("operations", &count),
        ],
    );
    exit
}
