use serde_json::json;
use soarcery::api::{ApiError, Credentials, FindingsApi, HttpFindingsApi};
use soarcery::core::{Role, Severity};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY: &str = "security-hub-findings/high/2024-01-01/123456789012_f1.json";

fn client(server: &MockServer) -> HttpFindingsApi {
    HttpFindingsApi::builder()
        .endpoint(format!("{}/", server.uri()))
        .api_key("test-key")
        .build()
        .expect("build client")
}

#[tokio::test]
async fn list_findings_sends_api_key_and_decodes_summaries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("x-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "key": KEY,
                "severity": "HIGH",
                "date": "2024-01-01",
                "accountId": "123456789012",
                "findingId": "f1",
                "lastModified": "2024-01-01T00:00:00Z",
                "remediationStatus": {"remediated": null}
            },
            {"findingId": "f2"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let findings = client(&server).list_findings().await.unwrap();
    assert_eq!(findings.len(), 2);
    assert_eq!(findings[0].key, KEY);
    assert_eq!(findings[0].account_id.as_deref(), Some("123456789012"));
    assert_eq!(findings[1].key, "");
}

#[tokio::test]
async fn null_key_and_severity_stay_per_record() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"key": KEY, "severity": "critical", "accountId": "123456789012", "findingId": "f1"},
            {"key": null, "severity": null, "accountId": "123456789012", "findingId": "f2"}
        ])))
        .mount(&server)
        .await;

    let findings = client(&server).list_findings().await.unwrap();
    let events: Vec<_> = findings.iter().map(soarcery::mapping::map_summary).collect();
    assert_eq!(events[0].key(), Some(KEY));
    assert_eq!(events[0].severity, Severity::Critical);
    assert_eq!(events[1].id, "f2");
    assert_eq!(events[1].key(), None);
    assert_eq!(events[1].severity, Severity::Low);
}

#[tokio::test]
async fn finding_detail_appends_key_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/findings/{KEY}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Id": "f1",
            "Types": ["Recon:EC2/PortProbeUnprotectedPort"],
            "Severity": {"Label": "HIGH"}
        })))
        .mount(&server)
        .await;

    let detail = client(&server).finding_detail(KEY).await.unwrap();
    assert_eq!(detail.first_type(), Some("Recon:EC2/PortProbeUnprotectedPort"));
}

#[tokio::test]
async fn approve_and_reject_hit_their_endpoints() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/approve/{KEY}")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"message": "Successfully processed"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/reject/{KEY}")))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let api = client(&server);
    let receipt = api.approve(KEY).await.unwrap();
    assert_eq!(receipt.message.as_deref(), Some("Successfully processed"));
    let receipt = api.reject(KEY).await.unwrap();
    assert_eq!(receipt.message, None);
}

#[tokio::test]
async fn non_success_status_is_an_error_with_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/approve/{KEY}")))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "Lambda failed"})))
        .mount(&server)
        .await;

    let err = client(&server).approve(KEY).await.unwrap_err();
    match err {
        ApiError::Status { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "Lambda failed");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn undecodable_list_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let err = client(&server).list_findings().await.unwrap_err();
    assert!(matches!(err, ApiError::Decode { .. }), "err={err:?}");
}

#[tokio::test]
async fn authenticate_maps_unauthorized_to_false() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth"))
        .and(body_json(json!({"username": "ops", "password": "good", "role": "admin"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "ok"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "Invalid credentials"})),
        )
        .mount(&server)
        .await;

    let api = client(&server);
    let mut creds = Credentials {
        username: "ops".to_string(),
        password: "good".to_string(),
        role: Role::Admin,
    };
    assert!(api.authenticate(&creds).await.unwrap());
    creds.password = "bad".to_string();
    assert!(!api.authenticate(&creds).await.unwrap());
}

#[tokio::test]
async fn report_and_password_reset_use_account_paths() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/generate/123456789012"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/reset/123456789012"))
        .and(body_json(json!({"currentPassword": "old", "newPassword": "new"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let api = client(&server);
    api.generate_report("123456789012").await.unwrap();
    api.reset_password("123456789012", "old", "new").await.unwrap();
}
