//! Work item sources
//!
//! Seeds for the site crawl come from a CSV file. That file can itself be
//! generated from the directory harvest's JSONL output.

mod extract;
mod seeds;
mod website;

pub use extract::{extract_seeds, write_seed_csv, SeedExtraction, SeedRow};
pub use seeds::{dedup_by_host, read_seed_file};
pub use website::clean_website;
