//! Record types shared by every stage of a harvest
//!
//! - `WorkItem`: an identity, the URL to fetch, and list-level metadata
//! - `FieldMap`: an ordered string mapping with explicit collision policies
//! - `PageRecord` / `CrawlUnit`: the result of crawling one seed site

mod field_map;
mod page;
mod work_item;

pub use field_map::{merge_with_provenance, FieldMap, DETAILS_PREFIX};
pub use page::{CrawlUnit, PageRecord, SiteRecord};
pub use work_item::{dedup_by_identity, WorkItem};

/// A list-level record merged with its detail-level payload
pub type MergedRecord = FieldMap;
