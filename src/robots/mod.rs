//! Robots.txt handling module
//!
//! This module provides a best-effort robots.txt report for seed sites:
//! whether the site root may be crawled and any declared crawl delay.

mod parser;
mod report;

pub use parser::{GroupDirectives, ParsedRobots};
pub use report::{check_site, RobotsReport, RobotsStatus, RobotsSummary};

use crate::crawler::RunContext;
use crate::model::WorkItem;
use tracing::{info, warn};

/// Checks robots.txt for every seed, in order
///
/// Stops early, returning the reports gathered so far, if the run is
/// cancelled.
pub async fn check_seeds(ctx: &RunContext, seeds: &[WorkItem]) -> Vec<RobotsReport> {
    let user_agent = ctx.config.fetch.user_agent.as_str();
    let delay = ctx.config.pacing.site_delay();
    let mut reports = Vec::with_capacity(seeds.len());

    for (i, seed) in seeds.iter().enumerate() {
        if ctx.cancel.is_cancelled() {
            warn!("Robots check cancelled after {} of {} sites", i, seeds.len());
            break;
        }

        let report = check_site(&ctx.fetcher, seed, user_agent).await;
        match report.status {
            RobotsStatus::Disallowed => warn!(
                "[{}/{}] {} disallows crawling ({:?})",
                i + 1,
                seeds.len(),
                seed.url,
                report.disallowed_paths
            ),
            status => info!("[{}/{}] {}: {:?}", i + 1, seeds.len(), seed.url, status),
        }
        reports.push(report);

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    let summary = RobotsSummary::from_reports(&reports);
    info!(
        "Robots summary: {} allowed, {} disallowed, {} without robots.txt, {} with crawl delay ({:.1}% compliant)",
        summary.allowed,
        summary.disallowed,
        summary.no_robots,
        summary.with_crawl_delay,
        summary.compliance_rate()
    );
    reports
}
