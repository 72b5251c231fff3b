//! Integration tests for the crawler
//!
//! These tests use wiremock to stand in for Mastodon instances and run
//! complete crawls end-to-end: HTTP transport, checkpointing, output files.

use mastodonte::config::{CheckpointBackend, Config};
use mastodonte::crawler::{Coordinator, CrawlOptions, TaskOutcome};
use mastodonte::output::load_statistics;
use mastodonte::state::{CrawlTarget, Cursor};
use mastodonte::storage::{CheckpointRecord, CheckpointStore};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMELINE: &str = "/api/v1/timelines/public";

/// Creates a test configuration writing state and output under `dir`
fn create_test_config(dir: &Path, backend: CheckpointBackend) -> Config {
    let mut config = Config::default();
    config.crawler.politeness_delay_ms = 0;
    config.crawler.request_timeout_secs = 5;
    config.api.scheme = "http".to_string();
    config.output.state_dir = dir.join("state").to_string_lossy().into_owned();
    config.output.data_dir = dir.join("data").to_string_lossy().into_owned();
    config.output.checkpoint_backend = backend;
    config
}

fn options(resume: bool) -> CrawlOptions {
    CrawlOptions {
        max_pages: 50,
        local: true,
        reblogs: false,
        resume,
        tolerance: 5,
    }
}

fn host(server: &MockServer) -> String {
    server.address().to_string()
}

fn next_link(server: &MockServer, path: &str, max_id: &str) -> String {
    format!("<{}{}?max_id={}>; rel=\"next\"", server.uri(), path, max_id)
}

fn statuses(ids: &[u64]) -> Value {
    Value::Array(
        ids.iter()
            .map(|id| json!({ "id": id.to_string(), "reblogs_count": 0 }))
            .collect(),
    )
}

fn read_output(dir: &Path, kind_dir: &str, identity: &str) -> Vec<Value> {
    let path = dir
        .join("data")
        .join(kind_dir)
        .join(format!("{}.json", identity));
    serde_json::from_str(&fs::read_to_string(path).expect("output file missing"))
        .expect("output is not a JSON array")
}

/// Mounts a three-page timeline: [5, 4] -> [3, 2] -> []
async fn mount_timeline(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(TIMELINE))
        .and(query_param("max_id", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(TIMELINE))
        .and(query_param("max_id", "4"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(statuses(&[3, 2]))
                .insert_header("Link", next_link(server, TIMELINE, "2").as_str()),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(TIMELINE))
        .and(query_param("limit", "40"))
        .and(query_param("local", "true"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(statuses(&[5, 4]))
                .insert_header("Link", next_link(server, TIMELINE, "4").as_str())
                .insert_header("X-RateLimit-Remaining", "299")
                .insert_header("X-RateLimit-Reset", "2099-01-01T00:00:00.000Z"),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_timeline_walked_to_exhaustion() {
    let server = MockServer::start().await;
    mount_timeline(&server).await;

    let dir = TempDir::new().unwrap();
    let coordinator =
        Coordinator::new(create_test_config(dir.path(), CheckpointBackend::Json)).unwrap();
    let target = CrawlTarget::timeline(&host(&server)).unwrap();

    let outcome = coordinator.crawl_one(target.clone(), &options(true)).await;
    assert_eq!(outcome, TaskOutcome::Completed { items_seen: 4 });

    let ids: Vec<_> = read_output(dir.path(), "timelines", &host(&server))
        .iter()
        .map(|s| s["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["5", "4", "3", "2"]);

    let record = coordinator.store().load(&target).unwrap().unwrap();
    assert_eq!(
        record,
        CheckpointRecord {
            cursor: Some(Cursor::new("2")),
            items_seen: 4,
            completed: true,
        }
    );
}

#[tokio::test]
async fn test_resume_and_idempotent_rerun() {
    let server = MockServer::start().await;
    mount_timeline(&server).await;

    let dir = TempDir::new().unwrap();
    let coordinator =
        Coordinator::new(create_test_config(dir.path(), CheckpointBackend::Sqlite)).unwrap();
    let target = CrawlTarget::timeline(&host(&server)).unwrap();

    coordinator
        .store()
        .save(
            &target,
            &CheckpointRecord {
                cursor: Some(Cursor::new("4")),
                items_seen: 2,
                completed: false,
            },
        )
        .unwrap();

    let outcome = coordinator.crawl_one(target.clone(), &options(true)).await;
    assert_eq!(outcome, TaskOutcome::Completed { items_seen: 4 });

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].url.query().unwrap().contains("max_id=4"));

    // A completed target issues no further requests
    let outcome = coordinator.crawl_one(target, &options(true)).await;
    assert_eq!(outcome, TaskOutcome::AlreadyCompleted);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_server_error_then_resume() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(TIMELINE))
        .and(query_param("max_id", "4"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(TIMELINE))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(statuses(&[5, 4]))
                .insert_header("Link", next_link(&server, TIMELINE, "4").as_str()),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let coordinator =
        Coordinator::new(create_test_config(dir.path(), CheckpointBackend::Json)).unwrap();
    let target = CrawlTarget::timeline(&host(&server)).unwrap();

    let outcome = coordinator.crawl_one(target.clone(), &options(true)).await;
    assert!(outcome.is_failure());

    let record = coordinator.store().load(&target).unwrap().unwrap();
    assert_eq!(record.cursor, Some(Cursor::new("4")));
    assert_eq!(record.items_seen, 2);
    assert!(!record.completed);

    // The instance recovers; the next run continues at the failed page
    server.reset().await;
    Mock::given(method("GET"))
        .and(path(TIMELINE))
        .and(query_param("max_id", "4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(statuses(&[3])))
        .mount(&server)
        .await;

    let outcome = coordinator.crawl_one(target, &options(true)).await;
    assert_eq!(outcome, TaskOutcome::Completed { items_seen: 3 });
    assert_eq!(read_output(dir.path(), "timelines", &host(&server)).len(), 3);
}

#[tokio::test]
async fn test_low_quota_delays_next_page() {
    let server = MockServer::start().await;
    let reset = (chrono::Utc::now() + chrono::Duration::seconds(2)).to_rfc3339();

    Mock::given(method("GET"))
        .and(path(TIMELINE))
        .and(query_param("max_id", "4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(TIMELINE))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(statuses(&[5, 4]))
                .insert_header("Link", next_link(&server, TIMELINE, "4").as_str())
                .insert_header("X-RateLimit-Remaining", "1")
                .insert_header("X-RateLimit-Reset", reset.as_str()),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let coordinator =
        Coordinator::new(create_test_config(dir.path(), CheckpointBackend::Json)).unwrap();
    let target = CrawlTarget::timeline(&host(&server)).unwrap();

    let start = std::time::Instant::now();
    let outcome = coordinator.crawl_one(target, &options(true)).await;

    assert_eq!(outcome, TaskOutcome::Completed { items_seen: 2 });
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
    assert!(
        start.elapsed() >= std::time::Duration::from_secs(1),
        "finished after {:?}",
        start.elapsed()
    );
}

#[tokio::test]
async fn test_budget_suspends_target() {
    let server = MockServer::start().await;
    mount_timeline(&server).await;

    let dir = TempDir::new().unwrap();
    let coordinator =
        Coordinator::new(create_test_config(dir.path(), CheckpointBackend::Json)).unwrap();
    let target = CrawlTarget::timeline(&host(&server)).unwrap();

    let mut options = options(true);
    options.max_pages = 1;

    let outcome = coordinator.crawl_one(target.clone(), &options).await;
    assert_eq!(
        outcome,
        TaskOutcome::Suspended {
            items_seen: 2,
            cursor: Some(Cursor::new("4")),
        }
    );
    assert!(!coordinator.store().load(&target).unwrap().unwrap().completed);
}

#[tokio::test]
async fn test_followers_with_handle_normalization() {
    let server = MockServer::start().await;
    let followers = "/api/v1/accounts/77/followers";

    Mock::given(method("GET"))
        .and(path("/api/v1/accounts/lookup"))
        .and(query_param("acct", "alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "77", "acct": "alice"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(followers))
        .and(query_param("max_id", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(followers))
        .and(query_param("limit", "80"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([
                    {"id": "1", "acct": "bob"},
                    {"id": "2", "acct": "carol@other.example"}
                ]))
                .insert_header("Link", next_link(&server, followers, "2").as_str()),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let coordinator =
        Coordinator::new(create_test_config(dir.path(), CheckpointBackend::Json)).unwrap();
    let identity = format!("alice@{}", host(&server));
    let target = CrawlTarget::followers(&identity).unwrap();

    let outcome = coordinator.crawl_one(target, &options(true)).await;
    assert_eq!(outcome, TaskOutcome::Completed { items_seen: 2 });

    let accts: Vec<_> = read_output(dir.path(), "followers", &identity)
        .iter()
        .map(|a| a["acct"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        accts,
        vec![format!("bob@{}", host(&server)), "carol@other.example".to_string()]
    );
}

#[tokio::test]
async fn test_unknown_account_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/accounts/lookup"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "Record not found"})))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let coordinator =
        Coordinator::new(create_test_config(dir.path(), CheckpointBackend::Json)).unwrap();
    let target = CrawlTarget::following(&format!("ghost@{}", host(&server))).unwrap();

    let outcome = coordinator.crawl_one(target.clone(), &options(true)).await;

    assert_eq!(outcome, TaskOutcome::NotFound);
    assert!(coordinator.store().load(&target).unwrap().is_none());
}

#[tokio::test]
async fn test_reblog_enrichment() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/statuses/10/reblogged_by"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([
                {"id": "100", "acct": "Dave"},
                {"id": "101", "acct": "erin@Elsewhere.social"}
            ])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(TIMELINE))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "10", "reblogs_count": 2},
            {"id": "9", "reblogs_count": 0}
        ])))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let coordinator =
        Coordinator::new(create_test_config(dir.path(), CheckpointBackend::Json)).unwrap();
    let target = CrawlTarget::timeline(&host(&server)).unwrap();

    let mut options = options(false);
    options.reblogs = true;
    let outcome = coordinator.crawl_one(target, &options).await;
    assert_eq!(outcome, TaskOutcome::Completed { items_seen: 2 });

    let written = read_output(dir.path(), "timelines", &host(&server));
    assert_eq!(
        written[0]["rebloggers"],
        json!([format!("dave@{}", host(&server)), "erin@elsewhere.social"])
    );
    assert!(written[1].get("rebloggers").is_none());
}

#[tokio::test]
async fn test_many_instances_across_workers() {
    let mut servers = Vec::new();
    for _ in 0..3 {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(TIMELINE))
            .respond_with(ResponseTemplate::new(200).set_body_json(statuses(&[1])))
            .mount(&server)
            .await;
        servers.push(server);
    }

    let dir = TempDir::new().unwrap();
    let coordinator =
        Coordinator::new(create_test_config(dir.path(), CheckpointBackend::Json)).unwrap();
    let targets: Vec<_> = servers
        .iter()
        .map(|s| CrawlTarget::timeline(&host(s)).unwrap())
        .collect();

    let report = coordinator.crawl_many(targets, 2, options(true)).await;
    assert_eq!(report.targets, 3);
    assert_eq!(report.workers, 2);

    let stats = load_statistics(coordinator.store().as_ref()).unwrap();
    assert_eq!(stats.completed, 3);
    assert_eq!(stats.items_seen, 3);
}
