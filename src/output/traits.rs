//! Progress observer interface
//!
//! The orchestrators report one event per work item and a summary at the
//! end of the run. How those are rendered is up to the observer; the core
//! never writes to the terminal directly.

use crate::output::stats::RunSummary;
use std::fmt;
use tracing::{info, warn};

/// What happened to one work item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Fetched and parsed; carries the number of fields or pages produced
    Succeeded { produced: usize },

    /// Every attempt failed
    Failed { reason: String },

    /// Already present in the checkpoint
    Skipped,

    /// A challenge page was served
    Blocked { marker: String },
}

impl fmt::Display for ItemOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemOutcome::Succeeded { produced } => write!(f, "succeeded ({})", produced),
            ItemOutcome::Failed { reason } => write!(f, "failed: {}", reason),
            ItemOutcome::Skipped => write!(f, "skipped (cached)"),
            ItemOutcome::Blocked { marker } => write!(f, "blocked: {}", marker),
        }
    }
}

/// One progress event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// 1-based position of the item in the run
    pub index: usize,
    pub total: usize,
    pub identity: String,
    pub outcome: ItemOutcome,
}

/// Receives progress from a running orchestrator
///
/// Implementations must be thread-safe; events are delivered from the task
/// that owns the checkpoint store, one at a time, in item order.
pub trait ProgressObserver: Send + Sync {
    /// Called after each work item is resolved
    fn on_item(&self, event: &ProgressEvent);

    /// Called once when the run ends, interrupted or not
    fn on_finish(&self, _summary: &RunSummary) {}
}

/// Renders progress through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl ProgressObserver for LoggingObserver {
    fn on_item(&self, event: &ProgressEvent) {
        match &event.outcome {
            ItemOutcome::Failed { .. } | ItemOutcome::Blocked { .. } => warn!(
                "[{}/{}] {}: {}",
                event.index, event.total, event.identity, event.outcome
            ),
            _ => info!(
                "[{}/{}] {}: {}",
                event.index, event.total, event.identity, event.outcome
            ),
        }
    }

    fn on_finish(&self, summary: &RunSummary) {
        info!(
            "Run finished: {} total, {} succeeded, {} failed, {} blocked, {} skipped ({:.1}% success, {:.2} items/sec)",
            summary.total,
            summary.succeeded,
            summary.failed,
            summary.blocked,
            summary.skipped,
            summary.success_rate(),
            summary.rate()
        );
    }
}
