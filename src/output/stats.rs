//! Run statistics
//!
//! Counters maintained by the orchestrators while a run progresses, plus
//! the derived rate and ETA figures reported on every checkpoint flush and
//! at the end of a run.

use std::time::{Duration, Instant};

/// Counters for one run
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Work items known after enumeration and deduplication
    pub total: usize,

    /// Items fetched in this run (not served from the checkpoint)
    pub attempted: usize,

    /// Items fetched successfully
    pub succeeded: usize,

    /// Items whose fetch failed after retries
    pub failed: usize,

    /// Items served from the checkpoint
    pub skipped: usize,

    /// Items that hit a challenge page
    pub blocked: usize,

    /// Individual pages fetched (site crawls only)
    pub pages: usize,

    started: Instant,
    finished: Option<Duration>,
}

impl RunSummary {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            attempted: 0,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            blocked: 0,
            pages: 0,
            started: Instant::now(),
            finished: None,
        }
    }

    /// Items processed so far, from either the network or the checkpoint
    pub fn processed(&self) -> usize {
        self.attempted + self.skipped
    }

    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.processed())
    }

    /// Freezes the elapsed time
    pub fn finish(&mut self) {
        self.finished = Some(self.started.elapsed());
    }

    pub fn elapsed(&self) -> Duration {
        self.finished.unwrap_or_else(|| self.started.elapsed())
    }

    /// Success rate as a percentage of attempted items
    pub fn success_rate(&self) -> f64 {
        if self.attempted == 0 {
            return 0.0;
        }
        (self.succeeded as f64 / self.attempted as f64) * 100.0
    }

    /// Processed items per second over `elapsed`
    pub fn rate_over(&self, elapsed: Duration) -> f64 {
        let secs = elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.processed() as f64 / secs
    }

    pub fn rate(&self) -> f64 {
        self.rate_over(self.elapsed())
    }

    /// Estimated time to finish the remaining items at the rate seen over `elapsed`
    pub fn eta_over(&self, elapsed: Duration) -> Option<Duration> {
        let rate = self.rate_over(elapsed);
        if rate <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(self.remaining() as f64 / rate))
    }

    pub fn eta(&self) -> Option<Duration> {
        self.eta_over(self.elapsed())
    }
}

/// Prints the run summary to stdout in a formatted manner
///
/// # Arguments
///
/// * `summary` - The counters to display
pub fn print_summary(summary: &RunSummary) {
    println!("=== Run Summary ===\n");

    println!("Items:");
    println!("  Total: {}", summary.total);
    println!("  Fetched: {}", summary.attempted);
    println!("  Succeeded: {}", summary.succeeded);
    println!("  Failed: {}", summary.failed);
    println!("  Blocked: {}", summary.blocked);
    println!("  Skipped (cached): {}", summary.skipped);
    if summary.pages > 0 {
        println!("  Pages fetched: {}", summary.pages);
    }
    println!();

    let elapsed = summary.elapsed();
    println!(
        "Elapsed: {:.1} min ({:.2} items/sec)",
        elapsed.as_secs_f64() / 60.0,
        summary.rate()
    );
    println!(
        "Success Rate: {:.1}% ({} / {} items fetched successfully)",
        summary.success_rate(),
        summary.succeeded,
        summary.attempted
    );
}
