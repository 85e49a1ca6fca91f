//! Health and Fault Reporting
//!
//! Narrow contracts to the hosting partition:
//! - `HealthReporter` publishes operational state (fire-and-forget)
//! - `FaultSink` asks the substrate to fail this replica over

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::observability::{log_event_with_fields, Event};

/// Health state carried by a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthState {
    /// Not yet known (e.g. coordinator not constructed)
    Unknown,
    Ok,
    Warning,
    Error,
}

impl HealthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthState::Unknown => "Unknown",
            HealthState::Ok => "Ok",
            HealthState::Warning => "Warning",
            HealthState::Error => "Error",
        }
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single health report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Property the report is about, e.g. `Coordinator`
    pub property: String,
    pub state: HealthState,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

impl HealthReport {
    pub fn new(property: impl Into<String>, state: HealthState, description: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            state,
            description: description.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Publishes health reports for this replica
pub trait HealthReporter: Send + Sync {
    fn report_health(&self, report: HealthReport);
}

/// Health reporter that only writes the report to the structured log
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHealthReporter;

impl HealthReporter for LoggingHealthReporter {
    fn report_health(&self, report: HealthReport) {
        let timestamp = report.timestamp.to_rfc3339();
        log_event_with_fields(
            Event::HealthReported,
            &[
                ("property", &report.property),
                ("state", report.state.as_str()),
                ("description", &report.description),
                ("timestamp", &timestamp),
            ],
        );
    }
}

/// Fault classes understood by the substrate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaultKind {
    /// Restart the replica; the substrate may fail over to another replica
    Transient,
    /// The replica is lost and must be rebuilt
    Permanent,
}

impl FaultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultKind::Transient => "Transient",
            FaultKind::Permanent => "Permanent",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fault reporting into the hosting partition
pub trait FaultSink: Send + Sync {
    fn report_fault(&self, kind: FaultKind);
}
