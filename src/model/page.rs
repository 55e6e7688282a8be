use crate::model::{FieldMap, WorkItem};
use crate::state::{CrawlPhase, PageKind};
use crate::HarvestError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One page visited while crawling a seed site
///
/// A page that could not be fetched still produces a record: its status is
/// 0, its content is empty and `title` carries the failure reason. This keeps
/// "tried and failed" distinguishable from "never attempted".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub url: String,
    pub status_code: u16,
    pub response_size: usize,
    pub title: String,
    pub description: String,
    pub text_content: String,
    /// Same-origin links discovered on the page, in document order
    pub links: Vec<String>,
    pub page_type: PageKind,
    pub scraped_at: DateTime<Utc>,
}

impl PageRecord {
    /// Creates a record for a page that yielded no content
    pub fn failed(url: impl Into<String>, kind: PageKind, reason: &str) -> Self {
        Self {
            url: url.into(),
            status_code: 0,
            response_size: 0,
            title: reason.to_string(),
            description: String::new(),
            text_content: String::new(),
            links: Vec::new(),
            page_type: kind,
            scraped_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }

    /// Flattens the page into output fields
    pub fn to_fields(&self) -> FieldMap {
        let mut fields = FieldMap::new();
        fields.set("url", self.url.as_str());
        fields.set("status_code", self.status_code.to_string());
        fields.set("response_size", self.response_size.to_string());
        fields.set("title", self.title.as_str());
        fields.set("description", self.description.as_str());
        fields.set("text_content", self.text_content.as_str());
        fields.set("links_found", self.links.len().to_string());
        fields.set("page_type", self.page_type.as_str());
        fields.set("scraped_at", self.scraped_at.to_rfc3339());
        fields
    }
}

/// Checkpoint payload for one crawled seed site
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteRecord {
    pub pages: Vec<PageRecord>,
    /// Expansion stopped early because a challenge page was served
    #[serde(default)]
    pub blocked: bool,
}

/// The aggregate for one seed: the seed item plus the pages fetched for it
///
/// Pages can only be appended while the unit is not `Done`; once finalized
/// the unit is converted into a [`SiteRecord`] for the checkpoint.
#[derive(Debug, Clone)]
pub struct CrawlUnit {
    seed: WorkItem,
    pages: Vec<PageRecord>,
    phase: CrawlPhase,
    /// Challenge-page marker that stopped expansion
    blocked: Option<String>,
}

impl CrawlUnit {
    pub fn new(seed: WorkItem) -> Self {
        Self {
            seed,
            pages: Vec::new(),
            phase: CrawlPhase::Seeded,
            blocked: None,
        }
    }

    pub fn seed(&self) -> &WorkItem {
        &self.seed
    }

    pub fn pages(&self) -> &[PageRecord] {
        &self.pages
    }

    pub fn phase(&self) -> CrawlPhase {
        self.phase
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked.is_some()
    }

    pub fn blocked_marker(&self) -> Option<&str> {
        self.blocked.as_deref()
    }

    /// Moves the unit to the next phase
    pub fn advance(&mut self, to: CrawlPhase) -> Result<(), HarvestError> {
        self.phase = self.phase.transition(to)?;
        Ok(())
    }

    /// Appends a page; rejected once the unit is finalized
    pub fn push(&mut self, page: PageRecord) -> Result<(), HarvestError> {
        if self.phase.is_terminal() {
            return Err(HarvestError::InvalidTransition {
                from: self.phase,
                to: self.phase,
            });
        }
        self.pages.push(page);
        Ok(())
    }

    pub fn mark_blocked(&mut self, marker: impl Into<String>) {
        self.blocked = Some(marker.into());
    }

    pub fn into_record(self) -> SiteRecord {
        SiteRecord {
            pages: self.pages,
            blocked: self.blocked.is_some(),
        }
    }
}
