//! Crawler module for fetching and processing pages
//!
//! This module contains the core harvesting logic, including:
//! - HTTP fetching with bounded retries and challenge-page detection
//! - Request pacing under an aggregate rate ceiling
//! - HTML parsing for generic pages, listing pages and details pages
//! - Bounded exploration of seed sites
//! - Overall run orchestration

mod coordinator;
mod details;
mod fetcher;
mod frontier;
mod listing;
mod pacing;
mod parser;
mod retry;

pub use coordinator::{DirectoryHarvest, RunContext, RunOptions, RunReport, SiteCrawl};
pub use details::{
    normalize_key, parse_details_page, CellPairRow, DefinitionListStrategy, DetailsParser,
    FieldStrategy, HeaderCellRow, MailtoStrategy, RowStrategy, TableStrategy,
};
pub use fetcher::{build_http_client, BlockedSignal, FetchOutcome, FetchResult, Fetcher};
pub use frontier::{CrawlController, CrawlSettings};
pub use listing::parse_listing_page;
pub use pacing::Pacer;
pub use parser::{parse_page, ParsedPage};
pub use retry::{BackoffStrategy, LinearBackoff, NoBackoff, RetryPolicy};
