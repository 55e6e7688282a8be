//! Seed file reading
//!
//! The seed file is a CSV with a header row. One column holds the stable
//! identity, one holds the site URL, and every column is carried into the
//! seed's metadata unchanged.

use crate::model::{FieldMap, WorkItem};
use crate::sources::website::clean_website;
use crate::url::{normalize_url, HostDeduplicator};
use crate::Result;
use std::path::Path;
use tracing::{debug, info, warn};

/// Reads seeds from a CSV file
///
/// Rows without a URL are skipped quietly. Rows that cannot be decoded or
/// whose URL does not parse are skipped with a warning; neither stops the
/// remaining rows from being read. A row with an empty identity column uses
/// its normalized URL as identity.
///
/// # Arguments
///
/// * `path` - Path to the seed CSV
/// * `id_column` - Header of the identity column
/// * `url_column` - Header of the URL column
///
/// # Errors
///
/// Fails only if the file cannot be opened or its header row cannot be read.
pub fn read_seed_file(path: &Path, id_column: &str, url_column: &str) -> Result<Vec<WorkItem>> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    if !headers.iter().any(|h| h == url_column) {
        warn!("Seed file {} has no '{}' column", path.display(), url_column);
    }

    let mut seeds = Vec::new();
    for (row, record) in reader.records().enumerate() {
        // Header is line 1
        let line = row + 2;
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!("Skipping malformed seed row at line {}: {}", line, e);
                continue;
            }
        };

        let metadata: FieldMap = headers.iter().zip(record.iter()).collect();
        let Some(website) = metadata.get(url_column).and_then(clean_website) else {
            debug!("Seed row at line {} has no website", line);
            continue;
        };
        let url = match normalize_url(&website) {
            Ok(url) => url,
            Err(e) => {
                warn!("Skipping seed at line {}: invalid URL '{}': {}", line, website, e);
                continue;
            }
        };

        let identity = metadata
            .get(id_column)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| url.to_string());
        seeds.push(WorkItem::new(identity, url, metadata));
    }

    info!("Read {} seeds from {}", seeds.len(), path.display());
    Ok(seeds)
}

/// Drops seeds whose host was already claimed by an earlier seed
pub fn dedup_by_host(seeds: Vec<WorkItem>) -> Vec<WorkItem> {
    let mut hosts = HostDeduplicator::new();
    seeds
        .into_iter()
        .filter(|seed| match hosts.claim(&seed.id, &seed.url) {
            None => true,
            Some(owner) => {
                info!(
                    "Dropping seed {} ({}): host already crawled for {}",
                    seed.id, seed.url, owner
                );
                false
            }
        })
        .collect()
}
