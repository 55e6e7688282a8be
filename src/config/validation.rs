use crate::config::types::{
    CheckpointConfig, Config, CrawlConfig, DirectoryConfig, FetchConfig, PacingConfig,
    SitesConfig, StageFiles,
};
use crate::ConfigError;
use url::Url;

const MAX_WORKERS: usize = 32;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_fetch_config(&config.fetch)?;
    validate_pacing_config(&config.pacing)?;
    validate_crawl_config(&config.crawl)?;
    validate_checkpoint_config(&config.checkpoint)?;
    if let Some(directory) = &config.directory {
        validate_directory_config(directory)?;
    }
    if let Some(sites) = &config.sites {
        validate_sites_config(sites)?;
    }
    if let (Some(directory), Some(sites)) = (&config.directory, &config.sites) {
        validate_disjoint_files(&directory.files(), &sites.files())?;
    }
    Ok(())
}

fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max-attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    if config.block_markers.iter().any(|m| m.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "block-markers cannot contain empty strings".to_string(),
        ));
    }

    Ok(())
}

fn validate_pacing_config(config: &PacingConfig) -> Result<(), ConfigError> {
    // Rejects NaN as well as non-positive values
    if !(config.max_requests_per_second > 0.0) || !config.max_requests_per_second.is_finite() {
        return Err(ConfigError::Validation(format!(
            "max-requests-per-second must be a positive number, got {}",
            config.max_requests_per_second
        )));
    }
    Ok(())
}

fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    if config.max_pages_per_site < 1 {
        return Err(ConfigError::Validation(
            "max-pages-per-site must be >= 1".to_string(),
        ));
    }

    if config.max_text_length < 1 {
        return Err(ConfigError::Validation(
            "max-text-length must be >= 1".to_string(),
        ));
    }

    if config.workers < 1 || config.workers > MAX_WORKERS {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and {}, got {}",
            MAX_WORKERS, config.workers
        )));
    }

    Ok(())
}

fn validate_checkpoint_config(config: &CheckpointConfig) -> Result<(), ConfigError> {
    if config.flush_interval < 1 {
        return Err(ConfigError::Validation(
            "flush-interval must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_directory_config(config: &DirectoryConfig) -> Result<(), ConfigError> {
    validate_template("list-url", &config.list_page_url(0))?;
    validate_template("details-url", &config.details_page_url("0"))?;

    if config.pages.is_empty() {
        return Err(ConfigError::Validation(
            "directory pages cannot be empty".to_string(),
        ));
    }

    validate_stage_files("directory", &config.files())
}

fn validate_sites_config(config: &SitesConfig) -> Result<(), ConfigError> {
    if config.seed_file.is_empty() {
        return Err(ConfigError::Validation(
            "seed-file cannot be empty".to_string(),
        ));
    }

    if config.id_column.is_empty() || config.url_column.is_empty() {
        return Err(ConfigError::Validation(
            "id-column and url-column cannot be empty".to_string(),
        ));
    }

    validate_stage_files("sites", &config.files())
}

fn validate_stage_files(stage: &str, files: &StageFiles) -> Result<(), ConfigError> {
    let named = [
        ("checkpoint-path", &files.checkpoint),
        ("jsonl-path", &files.jsonl),
        ("csv-path", &files.csv),
    ];
    for (name, path) in named {
        if path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(format!(
                "[{}] {} cannot be empty",
                stage, name
            )));
        }
    }

    if files.checkpoint == files.jsonl || files.checkpoint == files.csv || files.jsonl == files.csv {
        return Err(ConfigError::Validation(format!(
            "[{}] checkpoint-path, jsonl-path and csv-path must differ",
            stage
        )));
    }

    Ok(())
}

/// The two stages store different payloads and must never share a file
fn validate_disjoint_files(directory: &StageFiles, sites: &StageFiles) -> Result<(), ConfigError> {
    let directory_paths = [&directory.checkpoint, &directory.jsonl, &directory.csv];
    let sites_paths = [&sites.checkpoint, &sites.jsonl, &sites.csv];

    if let Some(shared) = directory_paths.iter().find(|p| sites_paths.contains(*p)) {
        return Err(ConfigError::Validation(format!(
            "[directory] and [sites] both use {}",
            shared.display()
        )));
    }
    Ok(())
}

/// Checks that a URL template produces an HTTP(S) URL once filled in
fn validate_template(name: &str, filled: &str) -> Result<(), ConfigError> {
    let url = Url::parse(filled)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", name, filled, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} must use http or https, got '{}'",
            name,
            url.scheme()
        )));
    }

    Ok(())
}
