//! Run orchestration
//!
//! This module drives whole runs, including:
//! - Enumerating work items from listing pages or a seed file
//! - Skipping items already present in the checkpoint
//! - Fetching and parsing the rest, serializing checkpoint writes
//! - Flushing the checkpoint periodically and once more at the end
//! - Merging list-level fields with stored payloads into output records

use crate::checkpoint::CheckpointStore;
use crate::config::{Config, DirectoryConfig, SitesConfig, StageFiles};
use crate::crawler::details::DetailsParser;
use crate::crawler::fetcher::{FetchOutcome, Fetcher};
use crate::crawler::frontier::{CrawlController, CrawlSettings};
use crate::crawler::listing::parse_listing_page;
use crate::model::{
    dedup_by_identity, merge_with_provenance, CrawlUnit, FieldMap, MergedRecord, PageRecord,
    SiteRecord, WorkItem,
};
use crate::output::{ItemOutcome, LoggingObserver, ProgressEvent, ProgressObserver, RunSummary};
use crate::sources::{dedup_by_host, read_seed_file};
use crate::{ConfigError, HarvestError, Result};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

/// Everything a run needs, built once and shared by every component
#[derive(Clone)]
pub struct RunContext {
    pub config: Arc<Config>,
    pub fetcher: Fetcher,
    pub cancel: CancellationToken,
    pub observer: Arc<dyn ProgressObserver>,
    pub started_at: DateTime<Utc>,
}

impl RunContext {
    /// Builds a context with a fetcher derived from `config` and a logging observer
    pub fn new(config: Config) -> Result<Self> {
        let fetcher = Fetcher::from_config(&config)?;
        Ok(Self {
            config: Arc::new(config),
            fetcher,
            cancel: CancellationToken::new(),
            observer: Arc::new(LoggingObserver),
            started_at: Utc::now(),
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_fetcher(mut self, fetcher: Fetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    fn open_store<P>(&self, files: &StageFiles, options: &RunOptions) -> CheckpointStore<P>
    where
        P: Serialize + DeserializeOwned,
    {
        let flush_interval = self.config.checkpoint.flush_interval;
        if options.fresh {
            info!("Starting fresh; ignoring checkpoint {}", files.checkpoint.display());
            CheckpointStore::fresh(&files.checkpoint, flush_interval)
        } else {
            CheckpointStore::open(&files.checkpoint, flush_interval)
        }
    }

    fn notify(&self, summary: &RunSummary, index: usize, identity: &str, outcome: ItemOutcome) {
        self.observer.on_item(&ProgressEvent {
            index,
            total: summary.total,
            identity: identity.to_string(),
            outcome,
        });
    }
}

/// Per-run switches from the command line
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Ignore the existing checkpoint
    pub fresh: bool,

    /// Drop checkpoint entries of failed items so they are fetched again
    pub retry_failed: bool,
}

/// What a finished run produced
#[derive(Debug, Clone)]
pub struct RunReport {
    pub summary: RunSummary,

    /// Output records, in work item order
    pub records: Vec<MergedRecord>,

    /// The run stopped early because it was cancelled
    pub interrupted: bool,

    /// Where this stage keeps its checkpoint and writes its records
    pub files: StageFiles,
}

fn flush_and_report<P>(store: &mut CheckpointStore<P>, summary: &RunSummary) -> Result<()>
where
    P: Serialize + DeserializeOwned,
{
    store.flush()?;
    let eta = summary
        .eta()
        .map(|d| format!("{:.1} min", d.as_secs_f64() / 60.0))
        .unwrap_or_else(|| "unknown".to_string());
    info!(
        "Checkpoint saved: {}/{} ({:.2} items/sec, ETA {})",
        summary.processed(),
        summary.total,
        summary.rate(),
        eta
    );
    Ok(())
}

/// Saves what the store holds before `error` ends the run
///
/// A failed flush is logged; the original error is the one returned.
fn flush_before_error<P>(store: &mut CheckpointStore<P>, error: HarvestError) -> HarvestError
where
    P: Serialize + DeserializeOwned,
{
    if let Err(flush_error) = store.flush() {
        warn!("Could not save checkpoint before stopping: {}", flush_error);
    }
    error
}

/// Harvests a paginated directory: listing pages, then one details page per record
pub struct DirectoryHarvest {
    ctx: RunContext,
    parser: DetailsParser,
}

impl DirectoryHarvest {
    pub fn new(ctx: RunContext) -> Self {
        Self {
            ctx,
            parser: DetailsParser::default(),
        }
    }

    /// Fetches every configured listing page and returns the deduplicated items
    ///
    /// A listing page that fails or is blocked is logged and skipped; the
    /// remaining pages are still fetched.
    pub async fn enumerate(&self) -> Result<Vec<WorkItem>> {
        let directory = self.directory()?;
        let delay = self.ctx.config.pacing.list_page_delay();

        let mut items = Vec::new();
        for (i, &page) in directory.pages.iter().enumerate() {
            if self.ctx.cancel.is_cancelled() {
                return Err(HarvestError::Cancelled);
            }

            let url = Url::parse(&directory.list_page_url(page))?;
            info!("[{}/{}] Fetching listing page {}", i + 1, directory.pages.len(), page);
            match self.ctx.fetcher.fetch(&url, delay).await {
                FetchOutcome::Fetched(result) if result.is_success() => {
                    let rows =
                        parse_listing_page(result.body().unwrap_or_default(), &url, directory);
                    info!("Listing page {}: {} records", page, rows.len());
                    items.extend(rows);
                }
                FetchOutcome::Fetched(result) => {
                    warn!("Failed listing page {} ({}): {}", page, url, result.failure_reason());
                }
                FetchOutcome::Blocked(signal) => {
                    warn!("Listing page {} served a challenge page ({})", page, signal.marker);
                }
            }
        }

        let unique = dedup_by_identity(items);
        info!("Total unique records: {}", unique.len());
        Ok(unique)
    }

    fn directory(&self) -> Result<&DirectoryConfig> {
        self.ctx.config.directory.as_ref().ok_or_else(|| {
            ConfigError::Validation("the [directory] section is required".to_string()).into()
        })
    }

    /// Runs the harvest end to end
    ///
    /// Output files are not written here; the caller serializes
    /// [`RunReport::records`] to [`RunReport::files`].
    pub async fn run(&self, options: RunOptions) -> Result<RunReport> {
        let files = self.directory()?.files();
        let mut store: CheckpointStore<FieldMap> = self.ctx.open_store(&files, &options);
        if options.retry_failed {
            let cleared = store.retain(|_, payload| !payload.is_empty());
            info!("Cleared {} failed entries from the checkpoint", cleared);
        }

        let items = match self.enumerate().await {
            Ok(items) => items,
            Err(HarvestError::Cancelled) => {
                store.flush()?;
                let mut summary = RunSummary::new(0);
                summary.finish();
                self.ctx.observer.on_finish(&summary);
                return Ok(RunReport {
                    summary,
                    records: Vec::new(),
                    interrupted: true,
                    files,
                });
            }
            Err(e) => return Err(flush_before_error(&mut store, e)),
        };
        self.process(items, store, files).await
    }

    /// Fetches details for `items` through the checkpoint
    ///
    /// Exposed separately from [`run`](Self::run) so callers that already
    /// hold the work items can skip enumeration.
    pub async fn process(
        &self,
        items: Vec<WorkItem>,
        mut store: CheckpointStore<FieldMap>,
        files: StageFiles,
    ) -> Result<RunReport> {
        let delay = self.ctx.config.pacing.request_delay();
        let mut summary = RunSummary::new(items.len());
        let mut interrupted = false;

        for (i, item) in items.iter().enumerate() {
            if self.ctx.cancel.is_cancelled() {
                warn!("Interrupted after {} of {} items", i, items.len());
                interrupted = true;
                break;
            }

            if store.contains(&item.id) {
                summary.skipped += 1;
                self.ctx.notify(&summary, i + 1, &item.id, ItemOutcome::Skipped);
                continue;
            }

            summary.attempted += 1;
            let outcome = match self.ctx.fetcher.fetch(&item.url, delay).await {
                FetchOutcome::Fetched(result) if result.is_success() => {
                    let details = self.parser.parse(result.body().unwrap_or_default());
                    summary.succeeded += 1;
                    let produced = details.len();
                    store.put(item.id.as_str(), details);
                    ItemOutcome::Succeeded { produced }
                }
                FetchOutcome::Fetched(result) => {
                    summary.failed += 1;
                    store.put(item.id.as_str(), FieldMap::new());
                    ItemOutcome::Failed {
                        reason: result.failure_reason().to_string(),
                    }
                }
                FetchOutcome::Blocked(signal) => {
                    // Not checkpointed, so the item is fetched again on resume
                    summary.blocked += 1;
                    warn!(
                        "Challenge page for {} ({}); consider stopping and resuming later",
                        item.id, signal.marker
                    );
                    ItemOutcome::Blocked {
                        marker: signal.marker,
                    }
                }
            };
            self.ctx.notify(&summary, i + 1, &item.id, outcome);

            if store.flush_due() {
                flush_and_report(&mut store, &summary)?;
            }
        }

        store.flush()?;
        summary.finish();
        self.ctx.observer.on_finish(&summary);

        let records = items
            .iter()
            .filter_map(|item| {
                store
                    .get(&item.id)
                    .map(|details| merge_with_provenance(&item.metadata, details))
            })
            .collect();

        Ok(RunReport {
            summary,
            records,
            interrupted,
            files,
        })
    }
}

/// Crawls every seed site under the page budget
pub struct SiteCrawl {
    ctx: RunContext,
}

impl SiteCrawl {
    pub fn new(ctx: RunContext) -> Self {
        Self { ctx }
    }

    fn sites(&self) -> Result<&SitesConfig> {
        self.ctx.config.sites.as_ref().ok_or_else(|| {
            ConfigError::Validation("the [sites] section is required".to_string()).into()
        })
    }

    /// Reads the seed file, deduplicating by identity and then by host
    pub fn seeds(&self) -> Result<Vec<WorkItem>> {
        let sites = self.sites()?;
        let seeds = read_seed_file(Path::new(&sites.seed_file), &sites.id_column, &sites.url_column)?;
        let seeds = dedup_by_host(dedup_by_identity(seeds));
        info!("{} distinct seed sites", seeds.len());
        Ok(seeds)
    }

    pub async fn run(&self, options: RunOptions) -> Result<RunReport> {
        let seeds = self.seeds()?;
        let files = self.sites()?.files();
        self.process(seeds, options, files).await
    }

    /// Crawls `seeds` with a bounded worker pool
    ///
    /// Up to `workers` seeds are crawled concurrently. Results, including
    /// seeds already in the checkpoint, are consumed in seed order by this
    /// task alone, which is the only writer of the checkpoint store.
    pub async fn process(
        &self,
        seeds: Vec<WorkItem>,
        options: RunOptions,
        files: StageFiles,
    ) -> Result<RunReport> {
        let mut store: CheckpointStore<SiteRecord> = self.ctx.open_store(&files, &options);
        if options.retry_failed {
            let cleared = store.retain(|_, record| record.pages.iter().any(PageRecord::is_success));
            info!("Cleared {} failed sites from the checkpoint", cleared);
        }

        let mut summary = RunSummary::new(seeds.len());
        let cached: HashSet<String> = seeds
            .iter()
            .filter(|seed| store.contains(&seed.id))
            .map(|seed| seed.id.clone())
            .collect();

        let controller = CrawlController::new(
            self.ctx.fetcher.clone(),
            CrawlSettings::from_config(&self.ctx.config),
            self.ctx.cancel.clone(),
        );
        let site_delay = self.ctx.config.pacing.site_delay();
        let workers = self.ctx.config.crawl.workers.max(1);
        let cancel = self.ctx.cancel.clone();

        let mut results = stream::iter(seeds.iter().cloned().enumerate())
            .map(|(i, seed)| {
                let controller = controller.clone();
                let cancel = cancel.clone();
                let is_cached = cached.contains(&seed.id);
                async move {
                    let index = i + 1;
                    if is_cached {
                        return (index, seed.id, None);
                    }
                    if cancel.is_cancelled() {
                        return (index, seed.id, Some(Err(HarvestError::Cancelled)));
                    }
                    let identity = seed.id.clone();
                    let result = controller.crawl(seed).await;
                    if !site_delay.is_zero() {
                        tokio::time::sleep(site_delay).await;
                    }
                    (index, identity, Some(result))
                }
            })
            .buffered(workers);

        let mut interrupted = false;
        while let Some((index, identity, crawled)) = results.next().await {
            let unit = match crawled {
                None => {
                    summary.skipped += 1;
                    self.ctx.notify(&summary, index, &identity, ItemOutcome::Skipped);
                    continue;
                }
                Some(Ok(unit)) => unit,
                Some(Err(HarvestError::Cancelled)) => {
                    warn!("Interrupted after {} of {} sites", summary.processed(), seeds.len());
                    interrupted = true;
                    break;
                }
                Some(Err(e)) => return Err(flush_before_error(&mut store, e)),
            };

            let outcome = record_unit(&mut summary, &unit);
            store.put(identity.as_str(), unit.into_record());
            self.ctx.notify(&summary, index, &identity, outcome);

            if store.flush_due() {
                flush_and_report(&mut store, &summary)?;
            }
        }
        drop(results);

        store.flush()?;
        summary.finish();
        self.ctx.observer.on_finish(&summary);

        Ok(RunReport {
            summary,
            records: site_records(&seeds, &store),
            interrupted,
            files,
        })
    }
}

/// Updates counters for a finished unit and classifies it
fn record_unit(summary: &mut RunSummary, unit: &CrawlUnit) -> ItemOutcome {
    summary.attempted += 1;
    summary.pages += unit.pages().len();

    if let Some(marker) = unit.blocked_marker() {
        summary.blocked += 1;
        return ItemOutcome::Blocked {
            marker: marker.to_string(),
        };
    }

    let succeeded = unit.pages().iter().filter(|p| p.is_success()).count();
    if succeeded > 0 {
        summary.succeeded += 1;
        ItemOutcome::Succeeded { produced: succeeded }
    } else {
        summary.failed += 1;
        let reason = unit
            .pages()
            .first()
            .map(|p| p.title.clone())
            .unwrap_or_default();
        ItemOutcome::Failed { reason }
    }
}

/// One output record per stored page, seed metadata first
fn site_records(seeds: &[WorkItem], store: &CheckpointStore<SiteRecord>) -> Vec<MergedRecord> {
    seeds
        .iter()
        .filter_map(|seed| store.get(&seed.id).map(|record| (seed, record)))
        .flat_map(|(seed, record)| {
            record
                .pages
                .iter()
                .map(move |page| merge_with_provenance(&seed.metadata, &page.to_fields()))
        })
        .collect()
}
