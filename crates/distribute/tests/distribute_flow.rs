//! End-to-end runs of the distribution pipeline over real HTTP.

mod support;

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use appcenter_api::{Client, ClientConfig, RetryPolicy};
use appcenter_distribute::{
    AppCenterApi, DistributeConfig, DistributeError, Distributor, PublishDestination,
    SymbolOutcome, SymbolsConfig,
};
use appcenter_protocol::{DEFAULT_DESTINATION_ID, SymbolType};
use serde_json::json;
use support::{MockServer, Request};

const APP: &str = "/v0.1/apps/testuser/testapp";
const STORE_ID: &str = "7c4ae0c1-49e6-4f0e-9f3b-2b8f1d3c5a10";

/// Behaviour knobs for the fake service.
#[derive(Default)]
struct Script {
    /// Status polls answered `uploadFinished` before `readyToBePublished`.
    polls_before_ready: u32,
    /// Chunk index answered with a 500.
    failing_chunk: Option<u32>,
    /// First status poll answered with a 503.
    flaky_poll: bool,
    /// `symbol_uploads` answers 404.
    symbols_missing: bool,
}

fn app_center(script: Script) -> impl Fn(&Request, &str) -> (u16, String) + Send + Sync + 'static {
    let polls = AtomicU32::new(0);
    move |req: &Request, base: &str| {
        let path = req.path();
        let ok = |body: serde_json::Value| (200u16, body.to_string());

        match (req.method.as_str(), path) {
            ("POST", p) if p == format!("{APP}/uploads/releases") => (
                201,
                json!({
                    "id": "upload-1",
                    "package_asset_id": "asset-1",
                    "upload_domain": format!("{base}/"),
                    "url_encoded_token": "tok%3D",
                })
                .to_string(),
            ),
            ("POST", "/upload/set_metadata/asset-1") => ok(json!({
                "chunk_size": 4,
                "chunk_list": [1, 2, 3],
                "blob_partitions": 1,
                "resume_restart": false,
                "error": false,
            })),
            ("POST", "/upload/upload_chunk/asset-1") => {
                let failing = script
                    .failing_chunk
                    .map(|i| req.target.contains(&format!("chunk={i}&")))
                    .unwrap_or(false);
                if failing {
                    (500, "chunk store unavailable".into())
                } else {
                    (200, String::new())
                }
            }
            ("POST", "/upload/finished/asset-1") => ok(json!({"error": false, "state": "Done"})),
            ("GET", p) if p == format!("{APP}/uploads/releases/upload-1") => {
                let n = polls.fetch_add(1, Ordering::SeqCst);
                if script.flaky_poll && n == 0 {
                    return (503, "try again".into());
                }
                let seen = if script.flaky_poll { n - 1 } else { n };
                if seen < script.polls_before_ready {
                    ok(json!({"id": "upload-1", "upload_status": "uploadFinished"}))
                } else {
                    ok(json!({"id": "upload-1", "upload_status": "readyToBePublished"}))
                }
            }
            ("PATCH", p) if p == format!("{APP}/uploads/releases/upload-1") => {
                match req.json()["upload_status"].as_str() {
                    Some("committed") => ok(json!({
                        "id": "upload-1",
                        "upload_status": "committed",
                        "release_distinct_id": 1,
                        "release_url": "https://api.appcenter.ms/v0.1/apps/testuser/testapp/releases/1",
                    })),
                    _ => ok(json!({"id": "upload-1", "upload_status": "uploadFinished"})),
                }
            }
            ("PATCH", p) if p == format!("{APP}/releases/1") => ok(json!({"id": 1})),
            ("POST", p) if p == format!("{APP}/releases/1/stores") => (201, String::new()),
            ("PUT", p) if p == format!("{APP}/releases/1") => ok(json!({"id": 1})),
            ("POST", p) if p == format!("{APP}/symbol_uploads") => {
                if script.symbols_missing {
                    (404, "not found".into())
                } else {
                    ok(json!({
                        "symbol_upload_id": "sym-1",
                        "upload_url": format!("{base}/blob/sym-1?sig=abc"),
                        "expiration_date": "2999-01-01T00:00:00Z",
                    }))
                }
            }
            ("PUT", "/blob/sym-1") => (201, String::new()),
            ("PATCH", p) if p == format!("{APP}/symbol_uploads/sym-1") => {
                ok(json!({"symbol_upload_id": "sym-1", "status": "committed"}))
            }
            _ => (404, format!("no route for {} {}", req.method, req.target)),
        }
    }
}

fn package(dir: &tempfile::TempDir) -> PathBuf {
    let path = dir.path().join("one.ipa");
    std::fs::write(&path, b"0123456789").unwrap();
    path
}

fn config(package: PathBuf) -> DistributeConfig {
    let mut config = DistributeConfig::new(package);
    config.release_notes = "my release notes".into();
    config.poll = RetryPolicy::fixed(5, Duration::from_millis(10));
    config
}

fn distributor(server: &MockServer, config: DistributeConfig) -> Distributor<AppCenterApi> {
    let client = Client::new(&ClientConfig::new(&server.url, "test-token")).unwrap();
    let api = AppCenterApi::new(
        client,
        "testuser/testapp".parse().unwrap(),
        RetryPolicy::compound(3, Duration::from_millis(10)),
    );
    Distributor::new(api, config)
}

#[tokio::test]
async fn distributes_package_to_default_group() {
    let server = MockServer::start(app_center(Script {
        polls_before_ready: 1,
        ..Default::default()
    }))
    .await;
    let dir = tempfile::tempdir().unwrap();

    let outcome = distributor(&server, config(package(&dir)))
        .run()
        .await
        .unwrap();
    assert_eq!(outcome.release_id, 1);
    assert!(outcome.release_url.unwrap().ends_with("/releases/1"));

    assert_eq!(
        server.log(),
        vec![
            format!("POST {APP}/uploads/releases"),
            "POST /upload/set_metadata/asset-1".to_string(),
            "POST /upload/upload_chunk/asset-1".to_string(),
            "POST /upload/upload_chunk/asset-1".to_string(),
            "POST /upload/upload_chunk/asset-1".to_string(),
            "POST /upload/finished/asset-1".to_string(),
            format!("PATCH {APP}/uploads/releases/upload-1"),
            format!("GET {APP}/uploads/releases/upload-1"),
            format!("GET {APP}/uploads/releases/upload-1"),
            format!("PATCH {APP}/uploads/releases/upload-1"),
            format!("PATCH {APP}/releases/1"),
        ]
    );

    let reqs = server.requests();

    // Control plane carries the token; the upload domain never does.
    assert!(reqs[0].has_header("x-api-token"));
    assert!(reqs[0].headers.contains("internal-request-source: vsts"));
    assert_eq!(reqs[0].body, b"{}");
    for r in &reqs[1..6] {
        assert!(!r.has_header("x-api-token"), "token leaked to {}", r.target);
        assert!(r.target.ends_with("token=tok%3D"), "{}", r.target);
    }

    assert!(reqs[1].target.contains("file_name=one.ipa&file_size=10&"));
    assert!(reqs[1].target.contains("content_type=application%2Foctet-stream"));
    for (i, r) in reqs[2..5].iter().enumerate() {
        assert!(r.target.contains(&format!("?chunk={}&token=", i + 1)));
    }
    let uploaded: Vec<u8> = reqs[2..5].iter().flat_map(|r| r.body.clone()).collect();
    assert_eq!(uploaded, b"0123456789");

    assert_eq!(reqs[6].json(), json!({"upload_status": "uploadFinished"}));
    assert_eq!(reqs[9].json(), json!({"upload_status": "committed"}));
    assert_eq!(
        reqs[10].json(),
        json!({
            "status": "available",
            "destinations": [{"id": DEFAULT_DESTINATION_ID}],
            "release_notes": "my release notes",
            "mandatory_update": false,
            "notify_testers": true,
        })
    );
}

#[tokio::test]
async fn transient_poll_failure_is_retried() {
    let server = MockServer::start(app_center(Script {
        flaky_poll: true,
        ..Default::default()
    }))
    .await;
    let dir = tempfile::tempdir().unwrap();

    let outcome = distributor(&server, config(package(&dir)))
        .run()
        .await
        .unwrap();
    assert_eq!(outcome.release_id, 1);

    let polls = server
        .log()
        .iter()
        .filter(|l| l.starts_with("GET "))
        .count();
    assert_eq!(polls, 2);
}

#[tokio::test]
async fn failed_chunk_is_not_retried_and_stops_the_run() {
    let server = MockServer::start(app_center(Script {
        failing_chunk: Some(2),
        ..Default::default()
    }))
    .await;
    let dir = tempfile::tempdir().unwrap();

    let err = distributor(&server, config(package(&dir)))
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, DistributeError::Api(ref e) if e.status() == Some(500)));

    let log = server.log();
    let chunks = log.iter().filter(|l| l.contains("upload_chunk")).count();
    assert_eq!(chunks, 2);
    assert!(!log.iter().any(|l| l.contains("finished")));
    assert!(!log.iter().any(|l| l.starts_with("PATCH")));
}

#[tokio::test]
async fn store_release_with_symbols() {
    let server = MockServer::start(app_center(Script::default())).await;
    let dir = tempfile::tempdir().unwrap();
    let sym = dir.path().join("mapping.txt");
    std::fs::write(&sym, b"mapping").unwrap();

    let mut config = config(package(&dir));
    config.destination = PublishDestination::Store {
        store_id: STORE_ID.into(),
    };
    config.build.id = Some("77".into());
    config.build.branch = Some("main".into());
    config.symbols = Some(SymbolsConfig {
        symbol_type: SymbolType::AndroidProguard,
        path: sym,
    });

    let outcome = distributor(&server, config).run().await.unwrap();
    assert!(matches!(outcome.symbols, Some(SymbolOutcome::Uploaded { .. })));
    assert!(outcome.warnings.is_empty());

    let reqs = server.requests();
    let find = |method: &str, path: &str| {
        reqs.iter()
            .find(|r| r.method == method && r.path() == path)
            .unwrap_or_else(|| panic!("no {method} {path}"))
    };

    let begin = find("POST", &format!("{APP}/symbol_uploads"));
    assert_eq!(begin.json()["symbol_type"], "AndroidProguard");
    assert_eq!(begin.json()["file_name"], "mapping.txt");

    let blob = find("PUT", "/blob/sym-1");
    assert!(blob.headers.contains("x-ms-blob-type: blockblob"));
    assert!(!blob.has_header("x-api-token"));
    assert_eq!(blob.body, b"mapping");

    let commit = find("PATCH", &format!("{APP}/symbol_uploads/sym-1"));
    assert_eq!(commit.json(), json!({"status": "committed"}));

    let store = find("POST", &format!("{APP}/releases/1/stores"));
    assert_eq!(store.json(), json!({"id": STORE_ID}));
    let update = find("PUT", &format!("{APP}/releases/1"));
    assert_eq!(
        update.json(),
        json!({
            "release_notes": "my release notes",
            "build": {"id": "77", "branch": "main"},
        })
    );
    assert!(
        !reqs
            .iter()
            .any(|r| r.method == "PATCH" && r.path() == format!("{APP}/releases/1"))
    );
}

#[tokio::test]
async fn missing_symbols_endpoint_follows_continue_flag() {
    let dir = tempfile::tempdir().unwrap();
    let sym = dir.path().join("app.dSYM.zip");
    std::fs::write(&sym, b"PK").unwrap();
    let symbols = SymbolsConfig {
        symbol_type: SymbolType::Apple,
        path: sym,
    };

    let server = MockServer::start(app_center(Script {
        symbols_missing: true,
        ..Default::default()
    }))
    .await;
    let mut strict = config(package(&dir));
    strict.symbols = Some(symbols.clone());
    let err = distributor(&server, strict).run().await.unwrap_err();
    assert!(matches!(err, DistributeError::SymbolsNotFound(_)));
    assert!(!server.log().contains(&format!("PATCH {APP}/releases/1")));

    let server = MockServer::start(app_center(Script {
        symbols_missing: true,
        ..Default::default()
    }))
    .await;
    let mut tolerant = config(package(&dir));
    tolerant.symbols = Some(symbols);
    tolerant.continue_if_symbols_missing = true;
    let outcome = distributor(&server, tolerant).run().await.unwrap();
    assert_eq!(outcome.warnings.len(), 1);
    assert!(server.log().contains(&format!("PATCH {APP}/releases/1")));
}
