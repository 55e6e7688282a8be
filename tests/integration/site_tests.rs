//! End-to-end site crawls from a seed file

use crate::support::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use sumi_harvest::checkpoint::load_entries;
use sumi_harvest::crawler::{RunContext, RunOptions, SiteCrawl};
use sumi_harvest::model::{SiteRecord, WorkItem};
use sumi_harvest::output::ItemOutcome;
use sumi_harvest::{Config, FieldMap};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const SEED_PAGE: &str = r##"<html><head><title>Home</title>
<meta name="description" content="Front page"></head>
<body><h1>Welcome</h1>
<a href="/a">A</a>
<a href="/b">B</a>
<a href="https://other.example/x">Elsewhere</a>
<a href="/c#section">C</a>
<a href="/a">A again</a>
</body></html>"##;

fn leaf_page(title: &str) -> String {
    format!("<html><head><title>{title}</title></head><body><p>{title} body</p></body></html>")
}

fn write_seeds(dir: &Path, rows: &[(&str, &str, &str)]) -> PathBuf {
    let mut csv = String::from("cds_code,school,website\n");
    for (id, school, website) in rows {
        csv.push_str(&format!("{id},{school},{website}\n"));
    }
    let file = dir.join("seeds.csv");
    fs::write(&file, csv).unwrap();
    file
}

fn site_config(dir: &Path, seeds: &Path, max_pages: usize) -> Config {
    let mut config = test_config();
    config.sites = Some(sites_config(dir, seeds));
    config.crawl.max_pages_per_site = max_pages;
    config
}

async fn mount_site(server: &MockServer) {
    mount_html(server, "/", SEED_PAGE).await;
    for page in ["/a", "/b", "/c"] {
        mount_html(server, page, &leaf_page(page)).await;
    }
}

#[tokio::test]
async fn test_crawl_respects_budget_and_origin() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let dir = TempDir::new().unwrap();
    let seeds = write_seeds(dir.path(), &[("S1", "Alpha", &format!("{}/", server.uri()))]);
    let config = site_config(dir.path(), &seeds, 3);

    let report = SiteCrawl::new(RunContext::new(config).unwrap())
        .run(RunOptions::default())
        .await
        .unwrap();

    let urls: Vec<&str> = report.records.iter().map(|r| r.get("url").unwrap()).collect();
    assert_eq!(
        urls,
        vec![
            format!("{}/", server.uri()),
            format!("{}/a", server.uri()),
            format!("{}/b", server.uri()),
        ]
    );
    assert_eq!(requests_to(&server, "/a").await, 1);
    assert_eq!(requests_to(&server, "/c").await, 0);

    let seed_pages = report
        .records
        .iter()
        .filter(|r| r.get("page_type") == Some("seed"))
        .count();
    assert_eq!(seed_pages, 1);

    let home = &report.records[0];
    assert_eq!(home.get("title"), Some("Home"));
    assert_eq!(home.get("description"), Some("Front page"));
    assert_eq!(home.get("links_found"), Some("3"));
    assert_eq!(home.get("status_code"), Some("200"));

    // Seed metadata travels into every page record
    for record in &report.records {
        assert_eq!(record.get("cds_code"), Some("S1"));
        assert_eq!(record.get("school"), Some("Alpha"));
    }

    assert_eq!(report.summary.succeeded, 1);
    assert_eq!(report.summary.pages, 3);
}

#[tokio::test]
async fn test_failed_subpage_consumes_budget() {
    let server = MockServer::start().await;
    mount_html(&server, "/", SEED_PAGE).await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_html(&server, "/b", &leaf_page("/b")).await;

    let dir = TempDir::new().unwrap();
    let seeds = write_seeds(dir.path(), &[("S1", "Alpha", &format!("{}/", server.uri()))]);
    let report = SiteCrawl::new(RunContext::new(site_config(dir.path(), &seeds, 2)).unwrap())
        .run(RunOptions::default())
        .await
        .unwrap();

    assert_eq!(report.records.len(), 2);
    assert_eq!(report.records[1].get("title"), Some("Error: HTTP 404"));
    assert_eq!(report.records[1].get("status_code"), Some("0"));
    assert_eq!(requests_to(&server, "/b").await, 0);
}

#[tokio::test]
async fn test_duplicate_host_seed_is_dropped_and_resume_is_free() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let dir = TempDir::new().unwrap();
    let seeds = write_seeds(
        dir.path(),
        &[
            ("S1", "Alpha", &format!("{}/", server.uri())),
            ("S2", "Beta", &format!("{}/b", server.uri())),
        ],
    );
    let config = site_config(dir.path(), &seeds, 2);

    let first = SiteCrawl::new(RunContext::new(config.clone()).unwrap())
        .run(RunOptions::default())
        .await
        .unwrap();
    assert_eq!(first.summary.total, 1);
    assert!(first.records.iter().all(|r| r.get("cds_code") == Some("S1")));
    let requests = server.received_requests().await.unwrap().len();

    let second = SiteCrawl::new(RunContext::new(config).unwrap())
        .run(RunOptions::default())
        .await
        .unwrap();
    assert_eq!(server.received_requests().await.unwrap().len(), requests);
    assert_eq!(second.summary.skipped, 1);
    assert_eq!(second.summary.attempted, 0);
    assert_eq!(second.records, first.records);
}

#[tokio::test]
async fn test_blocked_seed_records_single_page() {
    let server = MockServer::start().await;
    mount_html(
        &server,
        "/",
        "<html><title>We apologize for the inconvenience</title></html>",
    )
    .await;

    let dir = TempDir::new().unwrap();
    let seeds = write_seeds(dir.path(), &[("S1", "Alpha", &format!("{}/", server.uri()))]);
    let observer = Arc::new(RecordingObserver::default());
    let ctx = RunContext::new(site_config(dir.path(), &seeds, 5))
        .unwrap()
        .with_observer(observer.clone());
    let report = SiteCrawl::new(ctx).run(RunOptions::default()).await.unwrap();

    assert_eq!(report.summary.blocked, 1);
    let events = observer.events.lock().unwrap().clone();
    assert_eq!(
        events[0].outcome,
        ItemOutcome::Blocked {
            marker: "We apologize for the inconvenience".to_string()
        }
    );
    assert_eq!(report.records.len(), 1);
    assert_eq!(
        report.records[0].get("title"),
        Some("Blocked: We apologize for the inconvenience")
    );
    assert_eq!(report.records[0].get("page_type"), Some("seed"));
    assert_eq!(requests_to(&server, "/").await, 1);
}

#[tokio::test]
async fn test_concurrent_workers_keep_seed_order() {
    let first = MockServer::start().await;
    let second = MockServer::start().await;
    // The first site answers slowly so the second finishes first
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(leaf_page("Slow"))
                .set_delay(std::time::Duration::from_millis(200)),
        )
        .mount(&first)
        .await;
    mount_html(&second, "/", &leaf_page("Fast")).await;

    let second_url = format!("http://localhost:{}/", second.address().port());
    let dir = TempDir::new().unwrap();
    let seeds = write_seeds(
        dir.path(),
        &[
            ("S1", "Alpha", &format!("{}/", first.uri())),
            ("S2", "Beta", &second_url),
        ],
    );
    let mut config = site_config(dir.path(), &seeds, 2);
    config.crawl.workers = 2;

    let report = SiteCrawl::new(RunContext::new(config).unwrap())
        .run(RunOptions::default())
        .await
        .unwrap();

    let titles: Vec<&str> = report.records.iter().map(|r| r.get("title").unwrap()).collect();
    assert_eq!(titles, vec!["Slow", "Fast"]);
    assert_eq!(report.summary.succeeded, 2);
}

/// Serves a page linking deeper into the site and cancels the run
/// while answering
struct CancelWhileServing {
    cancel: CancellationToken,
    body: String,
}

impl Respond for CancelWhileServing {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        self.cancel.cancel();
        ResponseTemplate::new(200).set_body_string(self.body.clone())
    }
}

fn seed_at(server: &MockServer, id: &str, at: &str) -> WorkItem {
    let url = Url::parse(&format!("{}{}", server.uri(), at)).unwrap();
    let metadata: FieldMap = [("cds_code", id)].into_iter().collect();
    WorkItem::new(id, url, metadata)
}

#[tokio::test]
async fn test_cancel_mid_site_keeps_finished_sites_and_recrawls_the_rest() {
    let server = MockServer::start().await;
    let first_cancel = CancellationToken::new();
    mount_html(&server, "/one", &leaf_page("One")).await;
    Mock::given(method("GET"))
        .and(path("/two"))
        .respond_with(CancelWhileServing {
            cancel: first_cancel.clone(),
            body: r#"<html><title>Two</title><a href="/two/x">deeper</a></html>"#.to_string(),
        })
        .mount(&server)
        .await;
    mount_html(&server, "/two/x", &leaf_page("Deeper")).await;

    let dir = TempDir::new().unwrap();
    let seeds = dir.path().join("seeds.csv");
    let config = site_config(dir.path(), &seeds, 5);
    let files = config.sites.as_ref().unwrap().files();
    let work = vec![seed_at(&server, "S1", "/one"), seed_at(&server, "S2", "/two")];

    let ctx = RunContext::new(config.clone()).unwrap().with_cancel(first_cancel);
    let stopped = SiteCrawl::new(ctx)
        .process(work.clone(), RunOptions::default(), files.clone())
        .await
        .unwrap();

    assert!(stopped.interrupted);
    assert_eq!(stopped.summary.succeeded, 1);
    assert_eq!(requests_to(&server, "/two/x").await, 0);
    assert!(stopped.records.iter().all(|r| r.get("cds_code") == Some("S1")));

    // The finished site was flushed; the one cut off mid-expansion was not
    let stored: indexmap::IndexMap<String, SiteRecord> = load_entries(&files.checkpoint).unwrap();
    assert_eq!(stored.keys().collect::<Vec<_>>(), vec!["S1"]);
    assert_eq!(stored["S1"].pages.len(), 1);

    let resumed = SiteCrawl::new(RunContext::new(config).unwrap())
        .process(work, RunOptions::default(), files.clone())
        .await
        .unwrap();

    assert!(!resumed.interrupted);
    assert_eq!(resumed.summary.skipped, 1);
    assert_eq!(resumed.summary.succeeded, 1);
    assert_eq!(requests_to(&server, "/one").await, 1);
    assert_eq!(requests_to(&server, "/two").await, 2);
    assert_eq!(requests_to(&server, "/two/x").await, 1);

    let stored: indexmap::IndexMap<String, SiteRecord> = load_entries(&files.checkpoint).unwrap();
    assert_eq!(stored.keys().collect::<Vec<_>>(), vec!["S1", "S2"]);
    assert_eq!(stored["S2"].pages.len(), 2);
}

#[tokio::test]
async fn test_cached_seeds_are_reported_in_seed_order() {
    let server = MockServer::start().await;
    for page in ["/one", "/two", "/three"] {
        mount_html(&server, page, &leaf_page(page)).await;
    }

    let dir = TempDir::new().unwrap();
    let seeds = dir.path().join("seeds.csv");
    let config = site_config(dir.path(), &seeds, 2);
    let files = config.sites.as_ref().unwrap().files();

    SiteCrawl::new(RunContext::new(config.clone()).unwrap())
        .process(vec![seed_at(&server, "S2", "/two")], RunOptions::default(), files.clone())
        .await
        .unwrap();

    let observer = Arc::new(RecordingObserver::default());
    let ctx = RunContext::new(config).unwrap().with_observer(observer.clone());
    let work = vec![
        seed_at(&server, "S1", "/one"),
        seed_at(&server, "S2", "/two"),
        seed_at(&server, "S3", "/three"),
    ];
    let report = SiteCrawl::new(ctx)
        .process(work, RunOptions::default(), files)
        .await
        .unwrap();

    let events = observer.events.lock().unwrap().clone();
    let order: Vec<(usize, &str)> = events
        .iter()
        .map(|e| (e.index, e.identity.as_str()))
        .collect();
    assert_eq!(order, vec![(1, "S1"), (2, "S2"), (3, "S3")]);
    assert_eq!(events[1].outcome, ItemOutcome::Skipped);
    assert_eq!(report.summary.skipped, 1);
    assert_eq!(requests_to(&server, "/two").await, 1);
}
