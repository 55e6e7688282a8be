//! Output module for run records, statistics and progress
//!
//! This module handles:
//! - Writing merged records as line-delimited JSON and as a table
//! - Recording run statistics
//! - Delivering progress events to an observer

pub mod stats;
mod table;
mod traits;

pub use stats::{print_summary, RunSummary};
pub use table::{column_order, write_csv, write_jsonl, write_records};
pub use traits::{ItemOutcome, LoggingObserver, ProgressEvent, ProgressObserver};
