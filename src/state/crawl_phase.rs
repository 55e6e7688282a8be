//! Crawl phase definitions for one seed site
//!
//! A unit starts `Seeded`, moves to `Expanding` once the seed page has been
//! handled, and ends `Done`. A unit whose seed could not be expanded (blocked,
//! or a page budget of one) may go straight from `Seeded` to `Done`.
use crate::HarvestError;
use std::fmt;

/// Lifecycle state of a crawl unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlPhase {
    /// The seed URL is being fetched and parsed
    Seeded,

    /// Discovered same-origin links are being visited
    Expanding,

    /// Terminal: the unit is immutable
    Done,
}

impl CrawlPhase {
    /// Returns true if no further pages may be added
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Returns true if moving from `self` to `to` is a legal transition
    pub fn can_transition_to(&self, to: CrawlPhase) -> bool {
        matches!(
            (self, to),
            (Self::Seeded, Self::Expanding) | (Self::Seeded, Self::Done) | (Self::Expanding, Self::Done)
        )
    }

    /// Validates and performs a transition
    pub fn transition(self, to: CrawlPhase) -> Result<CrawlPhase, HarvestError> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(HarvestError::InvalidTransition { from: self, to })
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Seeded => "seeded",
            Self::Expanding => "expanding",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
