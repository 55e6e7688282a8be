//! Shared fixtures for the integration tests

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use sumi_harvest::config::{Config, DirectoryConfig, PacingConfig, SitesConfig};
use sumi_harvest::output::{ProgressEvent, ProgressObserver, RunSummary};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A configuration with no delays and no backoff
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.fetch.timeout_secs = 5;
    config.fetch.max_attempts = 2;
    config.fetch.backoff_base_ms = 0;
    config.pacing = PacingConfig {
        request_delay_ms: 0,
        list_page_delay_ms: 0,
        site_delay_ms: 0,
        max_requests_per_second: 1000.0,
    };
    config
}

fn under(dir: &Path, name: &str) -> String {
    dir.join(name).to_string_lossy().into_owned()
}

/// Directory stage with its checkpoint and outputs under `dir`
pub fn directory_config(server: &MockServer, dir: &Path, pages: Vec<u32>) -> DirectoryConfig {
    DirectoryConfig {
        list_url: format!("{}/list?page={{page}}", server.uri()),
        details_url: format!("{}/details?id={{id}}", server.uri()),
        pages,
        checkpoint_path: under(dir, "directory_checkpoint.json"),
        jsonl_path: under(dir, "directory.jsonl"),
        csv_path: under(dir, "directory.csv"),
    }
}

/// Sites stage with its checkpoint and outputs under `dir`
pub fn sites_config(dir: &Path, seed_file: &Path) -> SitesConfig {
    SitesConfig {
        seed_file: seed_file.to_string_lossy().into_owned(),
        id_column: "cds_code".to_string(),
        url_column: "website".to_string(),
        checkpoint_path: under(dir, "sites_checkpoint.json"),
        jsonl_path: under(dir, "sites.jsonl"),
        csv_path: under(dir, "sites.csv"),
    }
}

/// A listing table with one row per `(id, county)`
pub fn listing_page(rows: &[(&str, &str)]) -> String {
    let mut html = String::from(
        "<html><body><table><thead><tr><th>CDS Code</th><th>County</th><th>District</th>\
         <th>School</th><th>School Type</th><th>Sector Type</th><th>Charter</th><th>Status</th>\
         </tr></thead><tbody>",
    );
    for (id, county) in rows {
        html.push_str(&format!(
            "<tr><td>{id}</td><td>{county}</td><td>District {id}</td>\
             <td><a href=\"/details?id={id}\">School {id}</a></td><td>K-12</td>\
             <td>Charter</td><td>Y</td><td>Active</td></tr>",
        ));
    }
    html.push_str("</tbody></table></body></html>");
    html
}

/// A details page whose `School` label disagrees with the listing
pub fn details_page(id: &str) -> String {
    format!(
        "<html><body><a href=\"mailto:office{id}@school.example\">Email</a>\
         <table><tr><th>School:</th><td>Academy {id}</td></tr>\
         <tr><th>Phone Number</th><td>555-{id}</td></tr></table></body></html>",
    )
}

pub async fn mount_listing(server: &MockServer, page: u32, rows: &[(&str, &str)]) {
    Mock::given(method("GET"))
        .and(path("/list"))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(rows)))
        .mount(server)
        .await;
}

pub async fn mount_details(server: &MockServer, id: &str) {
    Mock::given(method("GET"))
        .and(path("/details"))
        .and(query_param("id", id))
        .respond_with(ResponseTemplate::new(200).set_body_string(details_page(id)))
        .mount(server)
        .await;
}

pub async fn mount_html(server: &MockServer, at: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_string(body.to_string()))
        .mount(server)
        .await;
}

/// Number of requests the server has received for `at`
pub async fn requests_to(server: &MockServer, at: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == at)
        .count()
}

/// Copies the checkpoint file when the given event index is reported, then
/// cancels the run, simulating a crash right after that item
pub struct CrashAfter {
    pub index: usize,
    pub checkpoint: PathBuf,
    pub snapshot: PathBuf,
    pub cancel: CancellationToken,
}

impl ProgressObserver for CrashAfter {
    fn on_item(&self, event: &ProgressEvent) {
        if event.index == self.index {
            fs::copy(&self.checkpoint, &self.snapshot).unwrap();
            self.cancel.cancel();
        }
    }
}

/// Records every event it receives
#[derive(Default)]
pub struct RecordingObserver {
    pub events: Mutex<Vec<ProgressEvent>>,
    pub finished: Mutex<Option<RunSummary>>,
}

impl ProgressObserver for RecordingObserver {
    fn on_item(&self, event: &ProgressEvent) {
        self.events.lock().unwrap().push(event.clone());
    }

    fn on_finish(&self, summary: &RunSummary) {
        *self.finished.lock().unwrap() = Some(summary.clone());
    }
}
