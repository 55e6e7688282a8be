use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Sumi-Harvest
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub pacing: PacingConfig,
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
    #[serde(default)]
    pub directory: Option<DirectoryConfig>,
    #[serde(default)]
    pub sites: Option<SitesConfig>,
    #[serde(default)]
    pub output: OutputConfig,
}

/// HTTP fetch behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FetchConfig {
    /// Timeout for a single request attempt (seconds)
    pub timeout_secs: u64,

    /// Total attempts per URL, including the first
    pub max_attempts: u32,

    /// Base of the linear backoff between attempts (milliseconds)
    pub backoff_base_ms: u64,

    /// User-Agent header sent with every request
    pub user_agent: String,

    /// Substrings that identify an anti-automation challenge page
    pub block_markers: Vec<String>,
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_attempts: 4,
            backoff_base_ms: 1500,
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            block_markers: vec![
                "Radware Captcha Page".to_string(),
                "We apologize for the inconvenience".to_string(),
            ],
        }
    }
}

/// Request pacing
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PacingConfig {
    /// Delay after each details-page or sub-page fetch (milliseconds)
    pub request_delay_ms: u64,

    /// Extra pause after each listing page (milliseconds)
    pub list_page_delay_ms: u64,

    /// Pause between seed sites (milliseconds)
    pub site_delay_ms: u64,

    /// Aggregate request ceiling shared by all workers
    pub max_requests_per_second: f64,
}

impl PacingConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn list_page_delay(&self) -> Duration {
        Duration::from_millis(self.list_page_delay_ms)
    }

    pub fn site_delay(&self) -> Duration {
        Duration::from_millis(self.site_delay_ms)
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            request_delay_ms: 2000,
            list_page_delay_ms: 5000,
            site_delay_ms: 2000,
            max_requests_per_second: 1.0,
        }
    }
}

/// Site crawl bounds
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlConfig {
    /// Page budget per seed site, seed page included
    pub max_pages_per_site: usize,

    /// Maximum number of characters of visible text kept per page
    pub max_text_length: usize,

    /// Number of seed sites crawled concurrently
    pub workers: usize,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_pages_per_site: 10,
            max_text_length: 5000,
            workers: 1,
        }
    }
}

/// Checkpoint flush cadence, shared by both stages
///
/// Each stage keeps its own checkpoint file; see [`StageFiles`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CheckpointConfig {
    /// Number of completed items between flushes
    pub flush_interval: usize,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self { flush_interval: 25 }
    }
}

/// Files owned by one stage: its checkpoint and its two outputs
///
/// The directory harvest and the site crawl store different payloads, so
/// they never share any of these paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageFiles {
    pub checkpoint: PathBuf,
    pub jsonl: PathBuf,
    pub csv: PathBuf,
}

/// Paginated directory source
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DirectoryConfig {
    /// Listing page URL template; `{page}` is replaced by the page number
    pub list_url: String,

    /// Details page URL template; `{id}` is replaced by the record identity
    pub details_url: String,

    /// Listing page numbers to fetch, in order
    pub pages: Vec<u32>,

    /// Checkpoint of fetched details pages
    #[serde(default = "default_directory_checkpoint")]
    pub checkpoint_path: String,

    /// Merged records, one JSON object per line
    pub jsonl_path: String,

    /// Merged records as a table
    pub csv_path: String,
}

fn default_directory_checkpoint() -> String {
    "./directory_checkpoint.json".to_string()
}

impl DirectoryConfig {
    pub fn files(&self) -> StageFiles {
        StageFiles {
            checkpoint: PathBuf::from(&self.checkpoint_path),
            jsonl: PathBuf::from(&self.jsonl_path),
            csv: PathBuf::from(&self.csv_path),
        }
    }

    pub fn list_page_url(&self, page: u32) -> String {
        self.list_url.replace("{page}", &page.to_string())
    }

    pub fn details_page_url(&self, id: &str) -> String {
        self.details_url.replace("{id}", id)
    }
}

/// Seed file for the site crawl
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SitesConfig {
    /// Path to the seed CSV file
    pub seed_file: String,

    /// Column holding the stable identity
    #[serde(default = "default_id_column")]
    pub id_column: String,

    /// Column holding the seed URL
    #[serde(default = "default_url_column")]
    pub url_column: String,

    /// Checkpoint of crawled seed sites
    #[serde(default = "default_sites_checkpoint")]
    pub checkpoint_path: String,

    /// One JSON object per crawled page
    pub jsonl_path: String,

    /// Crawled pages as a table
    pub csv_path: String,
}

impl SitesConfig {
    pub fn files(&self) -> StageFiles {
        StageFiles {
            checkpoint: PathBuf::from(&self.checkpoint_path),
            jsonl: PathBuf::from(&self.jsonl_path),
            csv: PathBuf::from(&self.csv_path),
        }
    }
}

fn default_sites_checkpoint() -> String {
    "./sites_checkpoint.json".to_string()
}

fn default_id_column() -> String {
    "cds_code".to_string()
}

fn default_url_column() -> String {
    "website".to_string()
}

/// Table layout shared by both stages' outputs
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Columns placed first in the table, in this order, when present
    #[serde(default = "default_common_columns")]
    pub common_columns: Vec<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            common_columns: default_common_columns(),
        }
    }
}

fn default_common_columns() -> Vec<String> {
    [
        "cds_code",
        "county",
        "district",
        "school",
        "school_type",
        "sector_type",
        "charter",
        "status",
        "details_url",
        "website",
        "email",
        "administrator_name",
        "administrator",
        "administrator_phone",
        "administrator_phone_ext",
        "phone",
        "phone_number",
        "fax_number",
        "street_address",
        "street_city",
        "street_state",
        "street_zip",
        "mailing_address",
        "mailing_city",
        "mailing_state",
        "mailing_zip",
        "low_grade",
        "high_grade",
    ]
    .iter()
    .map(|c| c.to_string())
    .collect()
}
