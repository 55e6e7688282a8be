//! Conversion of directory records into a seed file

use crate::model::FieldMap;
use crate::sources::website::clean_website;
use crate::url::extract_domain;
use crate::Result;
use serde::Serialize;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{info, warn};
use url::Url;

/// Keys a directory record may store its website under
const WEBSITE_KEYS: &[&str] = &["website", "web_address", "web address", "details_web_address"];

/// One row of the generated seed file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeedRow {
    pub cds_code: String,
    pub website: String,
    pub email: String,
    pub domain: String,
    pub school_name: String,
    pub county: String,
    pub district: String,
}

/// Seeds extracted from a directory file, with the counts of what was dropped
#[derive(Debug, Clone, Default)]
pub struct SeedExtraction {
    pub seeds: Vec<SeedRow>,
    pub lines: usize,
    pub without_website: usize,
    pub duplicate_domains: usize,
    pub malformed: usize,
}

/// Reads a directory JSONL file and produces one seed per distinct host
///
/// Lines that are not JSON objects of strings are skipped with a warning.
/// Records without a usable website are counted and skipped. When several
/// records share a host, the first one is kept.
pub fn extract_seeds(path: &Path) -> Result<SeedExtraction> {
    let reader = BufReader::new(File::open(path)?);
    let mut extraction = SeedExtraction::default();
    let mut seen_domains = HashSet::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line_number = index + 1;
        if line.trim().is_empty() {
            continue;
        }
        extraction.lines += 1;

        let record: FieldMap = match serde_json::from_str(&line) {
            Ok(record) => record,
            Err(e) => {
                warn!("Skipping line {} of {}: {}", line_number, path.display(), e);
                extraction.malformed += 1;
                continue;
            }
        };

        let Some(website) = record.first_of(WEBSITE_KEYS).and_then(clean_website) else {
            extraction.without_website += 1;
            continue;
        };
        let Some(domain) = Url::parse(&website).ok().as_ref().and_then(extract_domain) else {
            warn!("Skipping line {}: unparseable website '{}'", line_number, website);
            extraction.malformed += 1;
            continue;
        };

        if !seen_domains.insert(domain.clone()) {
            info!("Duplicate domain {} at line {}", domain, line_number);
            extraction.duplicate_domains += 1;
            continue;
        }

        let field = |key: &str| record.get(key).unwrap_or_default().trim().to_string();
        extraction.seeds.push(SeedRow {
            cds_code: field("cds_code"),
            website,
            email: field("email"),
            domain,
            school_name: field("school"),
            county: field("county"),
            district: field("district"),
        });
    }

    info!(
        "Extracted {} seeds from {} records ({} without website, {} duplicate domains, {} malformed)",
        extraction.seeds.len(),
        extraction.lines,
        extraction.without_website,
        extraction.duplicate_domains,
        extraction.malformed
    );
    Ok(extraction)
}

/// Writes seed rows as CSV with a header row
pub fn write_seed_csv(path: &Path, seeds: &[SeedRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for seed in seeds {
        writer.serialize(seed)?;
    }
    writer.flush()?;
    Ok(())
}
