//! URL handling module for Sumi-Harvest
//!
//! This module provides canonicalization for identity comparison, same-origin
//! checks used to bound a site crawl, and host-based deduplication of seeds.

mod domain;
mod normalize;

use std::collections::HashMap;

// Re-export main functions
pub use domain::{extract_domain, same_origin};
pub use normalize::{canonicalize, normalize_url};

/// Tracks which canonical host each seed has claimed
///
/// Two seeds resolving to the same host are treated as one site. The first
/// seed keeps the host; later ones are reported back so the caller can drop
/// them with a logged reason.
#[derive(Debug, Default)]
pub struct HostDeduplicator {
    owners: HashMap<String, String>,
}

impl HostDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the host of `url` for `identity`
    ///
    /// # Returns
    ///
    /// * `None` - The host was free and now belongs to `identity`
    /// * `Some(owner)` - The identity that already claimed this host
    pub fn claim(&mut self, identity: &str, url: &::url::Url) -> Option<String> {
        let host = extract_domain(url)?;
        match self.owners.get(&host) {
            Some(owner) => Some(owner.clone()),
            None => {
                self.owners.insert(host, identity.to_string());
                None
            }
        }
    }

    /// Number of distinct hosts claimed
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}
