//! Bounded exploration of one seed site
//!
//! The controller drives a [`CrawlUnit`] through `Seeded → Expanding → Done`.
//! The seed page is fetched first; its same-origin links seed a FIFO
//! discovery queue that is visited in order until the page budget is spent
//! or nothing unvisited remains. Links found on discovered pages join the
//! back of the queue.

use crate::config::Config;
use crate::crawler::fetcher::{FetchOutcome, Fetcher};
use crate::crawler::parser::parse_page;
use crate::model::{CrawlUnit, PageRecord, WorkItem};
use crate::state::{CrawlPhase, PageKind};
use crate::url::normalize_url;
use crate::{HarvestError, Result};
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

/// Bounds applied to every crawl unit
#[derive(Debug, Clone, Copy)]
pub struct CrawlSettings {
    /// Page budget per unit, seed included
    pub max_pages: usize,

    /// Characters of visible text kept per page
    pub max_text_length: usize,

    /// Politeness delay after every page fetch
    pub page_delay: Duration,
}

impl CrawlSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_pages: config.crawl.max_pages_per_site.max(1),
            max_text_length: config.crawl.max_text_length,
            page_delay: config.pacing.request_delay(),
        }
    }
}

/// Result of visiting one page
enum Visit {
    Page(PageRecord, Vec<Url>),
    /// Challenge page with the marker that matched
    Blocked(PageRecord, String),
}

/// Crawls seed sites one unit at a time
#[derive(Debug, Clone)]
pub struct CrawlController {
    fetcher: Fetcher,
    settings: CrawlSettings,
    cancel: CancellationToken,
}

impl CrawlController {
    pub fn new(fetcher: Fetcher, settings: CrawlSettings, cancel: CancellationToken) -> Self {
        Self {
            fetcher,
            settings,
            cancel,
        }
    }

    /// Crawls one seed and returns the finalized unit
    ///
    /// At most `max_pages` pages are recorded and exactly one of them is
    /// tagged `seed`. A failed fetch still consumes budget and is recorded
    /// with its failure reason as the title. A challenge page stops
    /// expansion and marks the unit blocked.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::Cancelled`] if the run is cancelled between
    /// two fetches; the partial unit is discarded so the seed is crawled
    /// again on resume.
    pub async fn crawl(&self, seed: WorkItem) -> Result<CrawlUnit> {
        let seed_url = seed.url.clone();
        let mut unit = CrawlUnit::new(seed);
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<Url> = VecDeque::new();

        visited.insert(visit_key(&seed_url));

        match self.visit(&seed_url, PageKind::Seed).await {
            Visit::Blocked(record, marker) => {
                unit.push(record)?;
                unit.mark_blocked(marker);
                unit.advance(CrawlPhase::Done)?;
                return Ok(unit);
            }
            Visit::Page(record, links) => {
                unit.push(record)?;
                enqueue(&mut queue, &mut visited, links);
            }
        }

        if queue.is_empty() || unit.pages().len() >= self.settings.max_pages {
            unit.advance(CrawlPhase::Done)?;
            return Ok(unit);
        }

        unit.advance(CrawlPhase::Expanding)?;
        while unit.pages().len() < self.settings.max_pages {
            if self.cancel.is_cancelled() {
                debug!("Crawl of {} cancelled mid-unit", seed_url);
                return Err(HarvestError::Cancelled);
            }
            let Some(next) = queue.pop_front() else {
                break;
            };

            match self.visit(&next, PageKind::Discovered).await {
                Visit::Blocked(record, marker) => {
                    unit.push(record)?;
                    unit.mark_blocked(marker);
                    break;
                }
                Visit::Page(record, links) => {
                    unit.push(record)?;
                    enqueue(&mut queue, &mut visited, links);
                }
            }
        }

        unit.advance(CrawlPhase::Done)?;
        debug!(
            "Finished {}: {} pages, {} links left unvisited",
            seed_url,
            unit.pages().len(),
            queue.len()
        );
        Ok(unit)
    }

    async fn visit(&self, url: &Url, kind: PageKind) -> Visit {
        match self.fetcher.fetch(url, self.settings.page_delay).await {
            FetchOutcome::Fetched(result) if result.is_success() => {
                let parsed = parse_page(
                    result.body().unwrap_or_default(),
                    url,
                    self.settings.max_text_length,
                );
                let record = PageRecord {
                    url: url.to_string(),
                    status_code: result.status,
                    response_size: result.size,
                    title: parsed.title,
                    description: parsed.description,
                    text_content: parsed.text,
                    links: parsed.links.iter().map(Url::to_string).collect(),
                    page_type: kind,
                    scraped_at: result.fetched_at,
                };
                Visit::Page(record, parsed.links)
            }
            FetchOutcome::Fetched(result) => {
                let reason = format!("Error: {}", result.failure_reason());
                Visit::Page(PageRecord::failed(url.as_str(), kind, &reason), Vec::new())
            }
            FetchOutcome::Blocked(signal) => {
                warn!(
                    "Challenge page at {} ({}), stopping expansion of this site",
                    signal.url, signal.marker
                );
                let reason = format!("Blocked: {}", signal.marker);
                Visit::Blocked(PageRecord::failed(url.as_str(), kind, &reason), signal.marker)
            }
        }
    }
}

/// Canonical identity of a URL within one unit
fn visit_key(url: &Url) -> String {
    normalize_url(url.as_str())
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.to_string())
}

fn enqueue(queue: &mut VecDeque<Url>, visited: &mut HashSet<String>, links: Vec<Url>) {
    for link in links {
        if visited.insert(visit_key(&link)) {
            queue.push_back(link);
        }
    }
}
