//! End-to-end directory harvests: listing pages, details pages, checkpoint

use crate::support::*;
use std::fs;
use std::sync::Arc;
use sumi_harvest::checkpoint::load_entries;
use sumi_harvest::crawler::{DirectoryHarvest, RunContext, RunOptions, SiteCrawl};
use sumi_harvest::output::{write_records, ItemOutcome};
use sumi_harvest::FieldMap;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn requests_for_id(server: &MockServer, id: &str) -> usize {
    let query = format!("id={}", id);
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == "/details" && r.url.query() == Some(query.as_str()))
        .count()
}

#[tokio::test]
async fn test_directory_harvest_merges_and_writes_outputs() {
    let server = MockServer::start().await;
    mount_listing(&server, 0, &[("001", "Alameda"), ("002", "Kern"), ("003", "Marin")]).await;
    mount_listing(&server, 1, &[("003", "Second"), ("004", "Napa")]).await;
    for id in ["001", "002", "003", "004"] {
        mount_details(&server, id).await;
    }

    let dir = TempDir::new().unwrap();
    let mut config = test_config();
    config.directory = Some(directory_config(&server, dir.path(), vec![0, 1]));

    let ctx = RunContext::new(config).unwrap();
    let report = DirectoryHarvest::new(ctx.clone())
        .run(RunOptions::default())
        .await
        .unwrap();

    // Later duplicate wins but keeps the first-seen position
    let ids: Vec<&str> = report
        .records
        .iter()
        .map(|r| r.get("cds_code").unwrap())
        .collect();
    assert_eq!(ids, vec!["001", "002", "003", "004"]);
    assert_eq!(report.records[2].get("county"), Some("Second"));
    assert_eq!(requests_to(&server, "/details").await, 4);

    let first = &report.records[0];
    assert_eq!(first.get("school"), Some("School 001"));
    assert_eq!(first.get("details_school"), Some("Academy 001"));
    assert_eq!(first.get("email"), Some("office001@school.example"));
    assert_eq!(first.get("phone_number"), Some("555-001"));
    assert_eq!(
        first.get("details_url"),
        Some(format!("{}/details?id=001", server.uri()).as_str())
    );

    assert_eq!(report.summary.attempted, 4);
    assert_eq!(report.summary.succeeded, 4);
    assert!(!report.interrupted);

    let common = &ctx.config.output.common_columns;
    write_records(&report.files, common, &report.records).unwrap();
    let csv = fs::read_to_string(&report.files.csv).unwrap();
    let header = csv.lines().next().unwrap();
    assert_eq!(
        header,
        "cds_code,county,district,school,school_type,sector_type,charter,status,\
         details_url,email,phone_number,details_school"
    );
    let jsonl = fs::read_to_string(&report.files.jsonl).unwrap();
    assert_eq!(jsonl.lines().count(), 4);

    assert_eq!(report.files.checkpoint, dir.path().join("directory_checkpoint.json"));
    let checkpoint: indexmap::IndexMap<String, FieldMap> =
        load_entries(&report.files.checkpoint).unwrap();
    assert_eq!(checkpoint.len(), 4);
    assert_eq!(checkpoint["002"].get("school"), Some("Academy 002"));
}

#[tokio::test]
async fn test_resume_skips_checkpointed_items_and_reproduces_output() {
    let server = MockServer::start().await;
    mount_listing(&server, 0, &[("001", "A"), ("002", "B"), ("003", "C")]).await;
    for id in ["001", "002", "003"] {
        mount_details(&server, id).await;
    }

    let dir = TempDir::new().unwrap();
    let mut config = test_config();
    config.directory = Some(directory_config(&server, dir.path(), vec![0]));

    let first_ctx = RunContext::new(config.clone()).unwrap();
    let first = DirectoryHarvest::new(first_ctx.clone())
        .run(RunOptions::default())
        .await
        .unwrap();
    let common = &first_ctx.config.output.common_columns;
    write_records(&first.files, common, &first.records).unwrap();
    let first_csv = fs::read(&first.files.csv).unwrap();
    let first_jsonl = fs::read(&first.files.jsonl).unwrap();
    assert_eq!(requests_to(&server, "/details").await, 3);

    let second_ctx = RunContext::new(config.clone()).unwrap();
    let second = DirectoryHarvest::new(second_ctx.clone())
        .run(RunOptions::default())
        .await
        .unwrap();
    write_records(&second.files, &second_ctx.config.output.common_columns, &second.records)
        .unwrap();

    assert_eq!(requests_to(&server, "/details").await, 3);
    assert_eq!(second.summary.skipped, 3);
    assert_eq!(second.summary.attempted, 0);
    assert_eq!(second.records, first.records);
    assert_eq!(fs::read(&second.files.csv).unwrap(), first_csv);
    assert_eq!(fs::read(&second.files.jsonl).unwrap(), first_jsonl);
}

#[tokio::test]
async fn test_interruption_refetches_at_most_one_flush_interval() {
    let server = MockServer::start().await;
    let ids: Vec<String> = (1..=50).map(|i| format!("{:03}", i)).collect();
    let rows: Vec<(&str, &str)> = ids.iter().map(|id| (id.as_str(), "County")).collect();
    mount_listing(&server, 0, &rows).await;
    for id in &ids {
        mount_details(&server, id).await;
    }

    let dir = TempDir::new().unwrap();
    let mut config = test_config();
    config.directory = Some(directory_config(&server, dir.path(), vec![0]));
    config.checkpoint.flush_interval = 25;

    let checkpoint = dir.path().join("directory_checkpoint.json");
    let snapshot = dir.path().join("snapshot.json");
    let cancel = CancellationToken::new();
    let crash = CrashAfter {
        index: 30,
        checkpoint: checkpoint.clone(),
        snapshot: snapshot.clone(),
        cancel: cancel.clone(),
    };

    let ctx = RunContext::new(config.clone())
        .unwrap()
        .with_cancel(cancel)
        .with_observer(Arc::new(crash));
    let interrupted = DirectoryHarvest::new(ctx).run(RunOptions::default()).await.unwrap();

    assert!(interrupted.interrupted);
    assert_eq!(interrupted.summary.attempted, 30);
    assert_eq!(requests_to(&server, "/details").await, 30);

    // What was on disk when the crash happened
    let on_disk: indexmap::IndexMap<String, FieldMap> = load_entries(&snapshot).unwrap();
    assert_eq!(on_disk.len(), 25);
    fs::copy(&snapshot, &checkpoint).unwrap();

    let resumed = DirectoryHarvest::new(RunContext::new(config).unwrap())
        .run(RunOptions::default())
        .await
        .unwrap();

    assert!(!resumed.interrupted);
    assert_eq!(resumed.summary.skipped, 25);
    assert_eq!(resumed.records.len(), 50);
    let refetched = requests_to(&server, "/details").await - 50;
    assert_eq!(refetched, 5);
}

#[tokio::test]
async fn test_failed_details_are_checkpointed_empty_and_retried_on_request() {
    let server = MockServer::start().await;
    mount_listing(&server, 0, &[("001", "A"), ("002", "B")]).await;
    mount_details(&server, "001").await;
    Mock::given(method("GET"))
        .and(path("/details"))
        .and(query_param("id", "002"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = test_config();
    config.directory = Some(directory_config(&server, dir.path(), vec![0]));
    config.fetch.max_attempts = 4;

    let report = DirectoryHarvest::new(RunContext::new(config.clone()).unwrap())
        .run(RunOptions::default())
        .await
        .unwrap();

    assert_eq!(requests_for_id(&server, "002").await, 4);
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.succeeded, 1);
    // Only the list-level fields survive for the failed item
    assert_eq!(report.records[1].get("school"), Some("School 002"));
    assert!(report.records[1].get("phone_number").is_none());

    // A plain resume does not retry it
    DirectoryHarvest::new(RunContext::new(config.clone()).unwrap())
        .run(RunOptions::default())
        .await
        .unwrap();
    assert_eq!(requests_for_id(&server, "002").await, 4);

    // --retry-failed clears the empty entry first
    let retried = DirectoryHarvest::new(RunContext::new(config).unwrap())
        .run(RunOptions {
            retry_failed: true,
            ..RunOptions::default()
        })
        .await
        .unwrap();
    assert_eq!(requests_for_id(&server, "002").await, 8);
    assert_eq!(requests_for_id(&server, "001").await, 1);
    assert_eq!(retried.summary.skipped, 1);
}

#[tokio::test]
async fn test_blocked_item_is_reported_and_not_checkpointed() {
    let server = MockServer::start().await;
    mount_listing(&server, 0, &[("001", "A"), ("002", "B"), ("003", "C")]).await;
    mount_details(&server, "001").await;
    mount_details(&server, "003").await;
    Mock::given(method("GET"))
        .and(path("/details"))
        .and(query_param("id", "002"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("<title>Radware Captcha Page</title>"),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = test_config();
    config.directory = Some(directory_config(&server, dir.path(), vec![0]));

    let observer = Arc::new(RecordingObserver::default());
    let ctx = RunContext::new(config.clone())
        .unwrap()
        .with_observer(observer.clone());
    let report = DirectoryHarvest::new(ctx).run(RunOptions::default()).await.unwrap();

    // Not retried, and the run continued with the next item
    assert_eq!(requests_for_id(&server, "002").await, 1);
    assert_eq!(requests_for_id(&server, "003").await, 1);
    assert_eq!(report.summary.blocked, 1);
    assert_eq!(report.summary.succeeded, 2);

    let events = observer.events.lock().unwrap().clone();
    assert_eq!(events.len(), 3);
    assert_eq!(events[1].identity, "002");
    assert_eq!(
        events[1].outcome,
        ItemOutcome::Blocked {
            marker: "Radware Captcha Page".to_string()
        }
    );
    assert!(observer.finished.lock().unwrap().is_some());

    let stored: indexmap::IndexMap<String, FieldMap> =
        load_entries(&report.files.checkpoint).unwrap();
    assert!(!stored.contains_key("002"));
    assert_eq!(report.records.len(), 2);

    // The blocked item is the only one fetched on resume
    DirectoryHarvest::new(RunContext::new(config).unwrap())
        .run(RunOptions::default())
        .await
        .unwrap();
    assert_eq!(requests_for_id(&server, "002").await, 2);
    assert_eq!(requests_for_id(&server, "001").await, 1);
}

#[tokio::test]
async fn test_site_crawl_leaves_directory_checkpoint_and_outputs_alone() {
    let server = MockServer::start().await;
    mount_listing(&server, 0, &[("001", "A"), ("002", "B")]).await;
    for id in ["001", "002"] {
        mount_details(&server, id).await;
    }
    mount_html(&server, "/site", "<html><title>Site</title><p>home</p></html>").await;

    let dir = TempDir::new().unwrap();
    let seed_file = dir.path().join("seeds.csv");
    fs::write(
        &seed_file,
        format!("cds_code,website\n001,{}/site\n", server.uri()),
    )
    .unwrap();

    let mut config = test_config();
    config.directory = Some(directory_config(&server, dir.path(), vec![0]));
    config.sites = Some(sites_config(dir.path(), &seed_file));
    let common = config.output.common_columns.clone();

    let directory = DirectoryHarvest::new(RunContext::new(config.clone()).unwrap())
        .run(RunOptions::default())
        .await
        .unwrap();
    write_records(&directory.files, &common, &directory.records).unwrap();
    let directory_jsonl = fs::read(&directory.files.jsonl).unwrap();
    assert_eq!(requests_to(&server, "/details").await, 2);

    let sites = SiteCrawl::new(RunContext::new(config.clone()).unwrap())
        .run(RunOptions::default())
        .await
        .unwrap();
    write_records(&sites.files, &common, &sites.records).unwrap();
    assert_eq!(sites.summary.succeeded, 1);
    assert_ne!(sites.files.checkpoint, directory.files.checkpoint);
    assert_ne!(sites.files.jsonl, directory.files.jsonl);
    assert_ne!(sites.files.csv, directory.files.csv);

    // The site crawl wrote its own files and left the directory's untouched
    let stored: indexmap::IndexMap<String, FieldMap> =
        load_entries(&directory.files.checkpoint).unwrap();
    assert_eq!(stored.keys().collect::<Vec<_>>(), vec!["001", "002"]);
    assert_eq!(stored["001"].get("school"), Some("Academy 001"));
    assert_eq!(fs::read(&directory.files.jsonl).unwrap(), directory_jsonl);
    assert!(sites.files.checkpoint.exists());
    assert_eq!(fs::read_to_string(&sites.files.jsonl).unwrap().lines().count(), 1);

    let resumed = DirectoryHarvest::new(RunContext::new(config).unwrap())
        .run(RunOptions::default())
        .await
        .unwrap();
    assert_eq!(requests_to(&server, "/details").await, 2);
    assert_eq!(resumed.summary.skipped, 2);
    assert_eq!(resumed.summary.attempted, 0);
    assert_eq!(resumed.records, directory.records);
}
