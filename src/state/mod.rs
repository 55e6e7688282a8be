//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlPhase`: lifecycle of one seed site (`Seeded → Expanding → Done`)
//! - `PageKind`: whether a page is the seed itself or was discovered from it

mod crawl_phase;
mod page_kind;

// Re-export main types
pub use crawl_phase::CrawlPhase;
pub use page_kind::PageKind;
