use std::path::Path;
use std::process::{Command, Output};
use std::sync::Arc;

use serde_json::json;
use soarcery::api::HttpFindingsApi;
use soarcery::core::{Role, Session};
use soarcery::engine::{Engine, EngineError, EngineOptions};
use soarcery::remediation::{EventBoard, RemediationError};
use wiremock::matchers::{header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY_F1: &str = "security-hub-findings/high/2024-01-01/111111111111_f1.json";

async fn mount_findings(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("x-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "key": KEY_F1,
                "severity": "high",
                "accountId": "111111111111",
                "findingId": "f1",
                "lastModified": "2024-01-01T00:00:00Z"
            },
            {
                "key": "",
                "severity": "critical",
                "accountId": "111111111111",
                "findingId": "f2",
                "lastModified": "2024-01-02T00:00:00Z"
            },
            {
                "key": "security-hub-findings/low/2024-01-03/222222222222_f3.json",
                "severity": "low",
                "accountId": "222222222222",
                "findingId": "f3",
                "lastModified": "2024-01-03T00:00:00Z"
            }
        ])))
        .mount(server)
        .await;
}

fn engine(server: &MockServer, audit_dir: &Path) -> Engine<HttpFindingsApi> {
    let api = HttpFindingsApi::builder()
        .endpoint(server.uri())
        .api_key("test-key")
        .build()
        .expect("build client");
    Engine::new(
        Arc::new(api),
        Session::new("ops", Role::Admin),
        EngineOptions {
            show_progress: false,
            audit_log_dir: Some(audit_dir.to_path_buf()),
        },
    )
}

#[tokio::test]
async fn approve_applies_to_board_and_is_not_offered_again() {
    let server = MockServer::start().await;
    mount_findings(&server).await;
    Mock::given(method("GET"))
        .and(path(format!("/approve/{KEY_F1}")))
        .and(header("x-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "done"})))
        .expect(1)
        .mount(&server)
        .await;

    let audit = tempfile::tempdir().unwrap();
    let engine = engine(&server, audit.path());
    let mut board = EventBoard::new(engine.events().await.unwrap());

    let outcome = engine.approve(&mut board, "f1").await.unwrap();
    assert!(outcome.event.remediated);
    assert_eq!(outcome.event.remediation_approved, Some(true));
    assert_eq!(outcome.receipt.message.as_deref(), Some("done"));
    assert_eq!(board.get("f1").unwrap(), &outcome.event);

    let err = engine.approve(&mut board, "f1").await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Remediation(RemediationError::NotPending { .. })
    ));

    let log: serde_json::Value =
        serde_json::from_slice(&std::fs::read(outcome.audit_log.unwrap()).unwrap()).unwrap();
    assert_eq!(log["status"], "ok");
    assert_eq!(log["event"]["key"], KEY_F1);
}

#[tokio::test]
async fn missing_key_never_reaches_the_network() {
    let server = MockServer::start().await;
    mount_findings(&server).await;
    Mock::given(method("GET"))
        .and(path_regex("^/(approve|reject)/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let audit = tempfile::tempdir().unwrap();
    let engine = engine(&server, audit.path());
    let mut board = EventBoard::new(engine.events().await.unwrap());
    let before = board.get("f2").cloned().unwrap();

    let err = engine.reject(&mut board, "f2").await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Remediation(RemediationError::MissingKey { .. })
    ));
    assert_eq!(board.get("f2").unwrap(), &before);
    assert_eq!(std::fs::read_dir(audit.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn upstream_failure_leaves_board_untouched() {
    let server = MockServer::start().await;
    mount_findings(&server).await;
    Mock::given(method("GET"))
        .and(path(format!("/reject/{KEY_F1}")))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let audit = tempfile::tempdir().unwrap();
    let engine = engine(&server, audit.path());
    let mut board = EventBoard::new(engine.events().await.unwrap());
    let before = board.snapshot();

    let err = engine.reject(&mut board, "f1").await.unwrap_err();
    match err {
        EngineError::Remediation(RemediationError::Api { source, .. }) => {
            assert_eq!(source.status(), Some(502));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(Arc::ptr_eq(&before, &board.snapshot()));
    assert!(board.get("f1").unwrap().needs_approval());
}

#[tokio::test]
async fn enrichment_failure_keeps_summary_event() {
    let server = MockServer::start().await;
    mount_findings(&server).await;
    Mock::given(method("GET"))
        .and(path(format!("/findings/{KEY_F1}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Description": "SSH brute force",
            "Action": {"NetworkConnectionAction": {
                "RemoteIpDetails": {"IpAddressV4": "198.51.100.4", "Country": {"CountryName": "Chile"}}
            }}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex("^/findings/security-hub-findings/low/"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "Not found"})))
        .mount(&server)
        .await;

    let audit = tempfile::tempdir().unwrap();
    let engine = engine(&server, audit.path());
    let events = engine.events().await.unwrap();
    let enriched = engine.enrich_all(events.clone()).await;

    let by_id = |id: &str| enriched.iter().find(|e| e.event.id == id).unwrap();
    let f1 = by_id("f1");
    assert!(f1.warning.is_none());
    assert_eq!(f1.event.description, "SSH brute force");
    assert_eq!(f1.event.source_ip.as_deref(), Some("198.51.100.4"));

    let f3 = by_id("f3");
    assert!(f3.warning.is_some());
    assert_eq!(&f3.event, events.iter().find(|e| e.id == "f3").unwrap());

    assert!(by_id("f2").warning.is_some());
}

fn soarcery_cmd(home: &Path, endpoint: &str) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_soarcery"));
    cmd.env("HOME", home);
    for var in [
        "SOARCERY_CONFIG",
        "SOARCERY_API_TIMEOUT_SECS",
        "SOARCERY_UI_COLOR",
        "SOARCERY_UI_MAX_TABLE_ROWS",
        "SOARCERY_USER",
        "SOARCERY_ROLE",
    ] {
        cmd.env_remove(var);
    }
    cmd.env("SOARCERY_API_ENDPOINT", endpoint);
    cmd.env("SOARCERY_API_KEY", "test-key");
    cmd
}

async fn run_cli(home: &Path, endpoint: String, args: &[&str]) -> Output {
    let home = home.to_path_buf();
    let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
    tokio::task::spawn_blocking(move || {
        soarcery_cmd(&home, &endpoint)
            .args(&args)
            .output()
            .expect("run soarcery")
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn cli_approve_with_yes_writes_audit_log() {
    let server = MockServer::start().await;
    mount_findings(&server).await;
    Mock::given(method("GET"))
        .and(path(format!("/approve/{KEY_F1}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "done"})))
        .expect(1)
        .mount(&server)
        .await;

    let home = tempfile::tempdir().unwrap();
    let out = run_cli(
        home.path(),
        server.uri(),
        &["--json", "--role", "admin", "--user", "ops", "approve", "f1", "--yes"],
    )
    .await;
    assert!(
        out.status.success(),
        "stderr={}",
        String::from_utf8_lossy(&out.stderr)
    );
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["decision"], "approve");
    assert_eq!(v["event"]["remediated"], true);
    assert_eq!(v["event"]["remediationApproved"], true);

    let logs = home.path().join(".config/soarcery/logs");
    assert_eq!(std::fs::read_dir(logs).unwrap().count(), 1);
}

#[tokio::test]
async fn cli_exit_codes_for_decisions() {
    let server = MockServer::start().await;
    mount_findings(&server).await;
    Mock::given(method("GET"))
        .and(path(format!("/reject/{KEY_F1}")))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let home = tempfile::tempdir().unwrap();
    let out = run_cli(home.path(), server.uri(), &["--role", "admin", "reject", "f1", "--yes"]).await;
    assert_eq!(out.status.code(), Some(20));

    let out = run_cli(home.path(), server.uri(), &["--role", "admin", "approve", "nope", "--yes"]).await;
    assert_eq!(out.status.code(), Some(10));

    let out = run_cli(home.path(), server.uri(), &["--role", "admin", "approve", "f2", "--yes"]).await;
    assert_eq!(out.status.code(), Some(10));

    let out = run_cli(home.path(), server.uri(), &["--role", "admin", "approve", "f1"]).await;
    assert_eq!(out.status.code(), Some(2));
}

#[tokio::test]
async fn cli_client_sees_only_own_events() {
    let server = MockServer::start().await;
    mount_findings(&server).await;

    let home = tempfile::tempdir().unwrap();
    let out = run_cli(
        home.path(),
        server.uri(),
        &["--json", "--user", "222222222222", "events"],
    )
    .await;
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let ids: Vec<&str> = v
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["f3"]);

    let out = run_cli(
        home.path(),
        server.uri(),
        &["--user", "222222222222", "events", "--client", "111111111111"],
    )
    .await;
    assert_eq!(out.status.code(), Some(2));
}

#[tokio::test]
async fn cli_show_raw_prints_stored_finding() {
    let server = MockServer::start().await;
    mount_findings(&server).await;
    Mock::given(method("GET"))
        .and(path(format!("/findings/{KEY_F1}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Id": "f1",
            "Title": "Unprotected port on EC2 instance is being scanned",
            "ProductFields": {"aws/guardduty/service/count": "14"},
            "remediationStatus": {"remediated": false}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let home = tempfile::tempdir().unwrap();
    let out = run_cli(home.path(), server.uri(), &["--role", "admin", "show", "f1", "--raw"]).await;
    assert!(
        out.status.success(),
        "stderr={}",
        String::from_utf8_lossy(&out.stderr)
    );
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["ProductFields"]["aws/guardduty/service/count"], "14");
    assert_eq!(v["remediationStatus"]["remediated"], false);

    let out = run_cli(home.path(), server.uri(), &["--role", "admin", "show", "f2", "--raw"]).await;
    assert_eq!(out.status.code(), Some(10));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("no finding key"), "stderr={stderr}");
}
