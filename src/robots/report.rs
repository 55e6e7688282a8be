//! Robots.txt compliance report for seed sites
//!
//! The report is informational. Crawls never consult it; it exists so an
//! operator can review which sites object to automated access before
//! starting a site crawl.

use crate::crawler::Fetcher;
use crate::model::WorkItem;
use crate::robots::parser::ParsedRobots;
use serde::Serialize;
use tracing::debug;

/// Outcome of checking one site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RobotsStatus {
    /// No robots.txt could be retrieved; access is assumed allowed
    NoRobots,

    /// robots.txt allows the site root
    Allowed,

    /// robots.txt disallows the site root
    Disallowed,
}

impl RobotsStatus {
    pub fn allows_crawling(&self) -> bool {
        !matches!(self, RobotsStatus::Disallowed)
    }
}

/// One line of the robots report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RobotsReport {
    pub identity: String,
    pub url: String,
    pub robots_url: String,
    pub status: RobotsStatus,
    pub crawl_delay: Option<f64>,
    pub disallowed_paths: Vec<String>,
}

/// Totals over a set of reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RobotsSummary {
    pub allowed: usize,
    pub disallowed: usize,
    pub no_robots: usize,
    pub with_crawl_delay: usize,
}

impl RobotsSummary {
    pub fn from_reports(reports: &[RobotsReport]) -> Self {
        let mut summary = Self::default();
        for report in reports {
            match report.status {
                RobotsStatus::Allowed => summary.allowed += 1,
                RobotsStatus::Disallowed => summary.disallowed += 1,
                RobotsStatus::NoRobots => summary.no_robots += 1,
            }
            if report.crawl_delay.is_some() {
                summary.with_crawl_delay += 1;
            }
        }
        summary
    }

    /// Share of sites that allow crawling, as a percentage
    pub fn compliance_rate(&self) -> f64 {
        let total = self.allowed + self.disallowed + self.no_robots;
        if total == 0 {
            return 0.0;
        }
        ((self.allowed + self.no_robots) as f64 / total as f64) * 100.0
    }
}

/// Fetches and evaluates robots.txt for one seed
///
/// Any status other than 200, or a transport failure, counts as "no
/// robots.txt".
pub async fn check_site(fetcher: &Fetcher, seed: &WorkItem, user_agent: &str) -> RobotsReport {
    let root = seed.url.join("/").unwrap_or_else(|_| seed.url.clone());
    let robots_url = root.join("/robots.txt").unwrap_or_else(|_| root.clone());

    let result = fetcher.fetch_once(&robots_url).await;
    let mut report = RobotsReport {
        identity: seed.id.clone(),
        url: seed.url.to_string(),
        robots_url: robots_url.to_string(),
        status: RobotsStatus::NoRobots,
        crawl_delay: None,
        disallowed_paths: Vec::new(),
    };

    let Some(body) = result.body().filter(|_| result.is_success()) else {
        debug!("No robots.txt at {} (status {})", robots_url, result.status);
        return report;
    };

    let robots = ParsedRobots::from_content(body);
    let directives = robots.directives_for(user_agent);
    report.status = if robots.is_allowed(root.as_str(), user_agent) {
        RobotsStatus::Allowed
    } else {
        RobotsStatus::Disallowed
    };
    report.crawl_delay = directives.crawl_delay;
    report.disallowed_paths = directives.disallow;
    report
}
