//! Integration tests for lenddesk-intake API endpoints
//!
//! Exercises the HTTP surface end-to-end against the in-memory backend:
//! session lifecycle, multipart upload through pipeline completion, and the
//! fault-injection / degraded-mode path.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use http_body_util::BodyExt;
use lenddesk_common::config::IntakeConfig;
use serde_json::json;
use tower::util::ServiceExt;

const BOUNDARY: &str = "lenddesk-test-boundary";

/// Test helper: build the full app over the in-memory backend
fn create_test_app(config: IntakeConfig) -> axum::Router {
    let state = lenddesk_intake::AppState::new(config);
    lenddesk_intake::build_router(state)
}

/// Config with simulated stage failures disabled, for deterministic runs
fn reliable_config() -> IntakeConfig {
    let mut config = IntakeConfig::default();
    config.stage_failure_probability = 0.0;
    config
}

async fn post_json(
    app: &axum::Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn get_json(app: &axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// Hand-built multipart body with a file part and optional kind field
fn multipart_upload(file_name: &str, file_len: usize, kind: Option<&str>) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
            file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(&vec![b'x'; file_len]);
    body.extend_from_slice(b"\r\n");
    if let Some(kind) = kind {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(b"Content-Disposition: form-data; name=\"document_kind\"\r\n\r\n");
        body.extend_from_slice(kind.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

async fn post_multipart(
    app: &axum::Router,
    uri: &str,
    body: Vec<u8>,
) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={}", BOUNDARY),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// Poll a job until it leaves "processing"; virtual time drives the stages
async fn poll_to_terminal(app: &axum::Router, job_id: &str) -> serde_json::Value {
    for _ in 0..500 {
        let (status, body) = get_json(app, &format!("/jobs/{}/status", job_id)).await;
        assert_eq!(status, StatusCode::OK);
        if body["status"] != "processing" {
            return body;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
    panic!("job {} never reached a terminal status", job_id);
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app(IntakeConfig::default());

    let (status, json) = get_json(&app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "lenddesk-intake");
    assert_eq!(json["mode"]["active"], false);
    assert!(json["uptime_seconds"].is_u64());
    assert!(json["dependencies"].is_array());
}

#[tokio::test]
async fn test_create_session_success() {
    let app = create_test_app(IntakeConfig::default());

    let (status, json) = post_json(&app, "/sessions", json!({ "loan_type": "504" })).await;

    assert_eq!(status, StatusCode::CREATED);
    assert!(json["session_id"].is_string());
    assert_eq!(json["loan_type"], "504");
    assert_eq!(json["loan_display_name"], "SBA 504 Fixed Asset");
    assert_eq!(json["degraded"], false);
    assert!(json["expires_at"].is_string());
}

#[tokio::test]
async fn test_create_session_unknown_loan_type() {
    let app = create_test_app(IntakeConfig::default());

    let (status, json) = post_json(&app, "/sessions", json!({ "loan_type": "jumbo" })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"]["message"]
        .as_str()
        .unwrap()
        .contains("jumbo"));
}

#[tokio::test]
async fn test_create_session_empty_loan_type() {
    let app = create_test_app(IntakeConfig::default());

    let (status, _) = post_json(&app, "/sessions", json!({ "loan_type": "  " })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test(start_paused = true)]
async fn test_upload_runs_pipeline_to_completion() {
    let app = create_test_app(reliable_config());

    let (_, session) = post_json(
        &app,
        "/sessions",
        json!({ "loan_type": "504", "applicant_name": "Rosa Martinez", "seed": 42 }),
    )
    .await;
    let session_id = session["session_id"].as_str().unwrap().to_string();

    let body = multipart_upload("tax_return_2023.pdf", 2 * 1024 * 1024, Some("tax_return"));
    let (status, upload) =
        post_multipart(&app, &format!("/sessions/{}/documents", session_id), body).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(upload["session_id"], session_id.as_str());
    assert_eq!(upload["stage"], "ingest");
    let job_id = upload["job_id"].as_str().unwrap().to_string();

    let terminal = poll_to_terminal(&app, &job_id).await;

    assert_eq!(terminal["status"], "complete");
    assert_eq!(terminal["stage"], "complete");
    let result = &terminal["result"];
    assert!(result["accepted"].is_boolean());
    let confidence = result["confidence"].as_f64().unwrap();
    assert!(
        (0.0..=1.0).contains(&confidence),
        "confidence out of range: {}",
        confidence
    );
    assert!(result["reasons"].is_array());

    // Listing reflects the finished job and its checklist impact
    let (status, docs) = get_json(&app, &format!("/sessions/{}/documents", session_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(docs["documents"].as_array().unwrap().len(), 1);
    let checklist = docs["required_checklist"].as_array().unwrap();
    assert!(!checklist.is_empty());
    let tax_row = checklist
        .iter()
        .find(|row| row["kind"] == "tax_return")
        .expect("504 checklist has a tax return row");
    assert_eq!(
        tax_row["satisfied"],
        result["accepted"].as_bool().unwrap() && terminal["status"] == "complete"
    );
}

#[tokio::test(start_paused = true)]
async fn test_same_seed_yields_identical_outcome() {
    let app = create_test_app(reliable_config());

    let mut outcomes = Vec::new();
    for _ in 0..2 {
        let (_, session) = post_json(
            &app,
            "/sessions",
            json!({ "loan_type": "7a", "seed": 7777 }),
        )
        .await;
        let session_id = session["session_id"].as_str().unwrap().to_string();

        let body = multipart_upload("bank_statement_jan.pdf", 32 * 1024, Some("bank_statement"));
        let (_, upload) =
            post_multipart(&app, &format!("/sessions/{}/documents", session_id), body).await;
        let job_id = upload["job_id"].as_str().unwrap().to_string();

        let terminal = poll_to_terminal(&app, &job_id).await;
        outcomes.push(terminal["result"].clone());
    }

    assert_eq!(
        outcomes[0], outcomes[1],
        "same seed and same upload must replay identically"
    );
}

#[tokio::test]
async fn test_upload_unknown_session() {
    let app = create_test_app(IntakeConfig::default());

    let body = multipart_upload("statement.pdf", 2048, None);
    let (status, _) = post_multipart(
        &app,
        "/sessions/00000000-0000-0000-0000-000000000000/documents",
        body,
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upload_missing_file_part() {
    let app = create_test_app(IntakeConfig::default());

    let (_, session) = post_json(&app, "/sessions", json!({ "loan_type": "504" })).await;
    let session_id = session["session_id"].as_str().unwrap();

    // Only the kind field, no file part
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(b"Content-Disposition: form-data; name=\"document_kind\"\r\n\r\n");
    body.extend_from_slice(b"tax_return\r\n");
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    let (status, json) =
        post_multipart(&app, &format!("/sessions/{}/documents", session_id), body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"]["message"]
        .as_str()
        .unwrap()
        .contains("file"));
}

#[tokio::test]
async fn test_upload_size_boundaries_at_default_config() {
    let app = create_test_app(reliable_config());
    let limit = IntakeConfig::default().max_upload_bytes as usize;

    let (_, session) = post_json(&app, "/sessions", json!({ "loan_type": "7a" })).await;
    let session_id = session["session_id"].as_str().unwrap();

    // Mid-range file, far past axum's default 2 MB body limit
    let body = multipart_upload("bank_statement_q1.pdf", 3 * 1024 * 1024, Some("bank_statement"));
    let (status, _) =
        post_multipart(&app, &format!("/sessions/{}/documents", session_id), body).await;
    assert_eq!(status, StatusCode::CREATED);

    // Just under the configured maximum
    let body = multipart_upload("full_scan.pdf", limit - 1024, Some("tax_return"));
    let (status, _) =
        post_multipart(&app, &format!("/sessions/{}/documents", session_id), body).await;
    assert_eq!(status, StatusCode::CREATED);

    // Just over it
    let body = multipart_upload("oversized_scan.pdf", limit + 1, Some("tax_return"));
    let (status, json) =
        post_multipart(&app, &format!("/sessions/{}/documents", session_id), body).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json["error"]["code"], "PAYLOAD_TOO_LARGE");
}

#[tokio::test(start_paused = true)]
async fn test_rejected_upload_does_not_shift_replay_seed() {
    let app = create_test_app(reliable_config());

    // Session A: one rejected upload (no file part), then a good one
    let (_, session) = post_json(&app, "/sessions", json!({ "loan_type": "7a", "seed": 31337 })).await;
    let session_a = session["session_id"].as_str().unwrap().to_string();

    let mut bad_body = Vec::new();
    bad_body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    bad_body.extend_from_slice(b"Content-Disposition: form-data; name=\"document_kind\"\r\n\r\n");
    bad_body.extend_from_slice(b"bank_statement\r\n");
    bad_body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    let (status, _) =
        post_multipart(&app, &format!("/sessions/{}/documents", session_a), bad_body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let body = multipart_upload("bank_statement_feb.pdf", 48 * 1024, Some("bank_statement"));
    let (_, upload) =
        post_multipart(&app, &format!("/sessions/{}/documents", session_a), body).await;
    let outcome_a = poll_to_terminal(&app, upload["job_id"].as_str().unwrap()).await;

    // Session B: same seed, only the good upload
    let (_, session) = post_json(&app, "/sessions", json!({ "loan_type": "7a", "seed": 31337 })).await;
    let session_b = session["session_id"].as_str().unwrap().to_string();

    let body = multipart_upload("bank_statement_feb.pdf", 48 * 1024, Some("bank_statement"));
    let (_, upload) =
        post_multipart(&app, &format!("/sessions/{}/documents", session_b), body).await;
    let outcome_b = poll_to_terminal(&app, upload["job_id"].as_str().unwrap()).await;

    assert_eq!(
        outcome_a["result"], outcome_b["result"],
        "a rejected upload must not consume a seed index"
    );
}

#[tokio::test]
async fn test_upload_oversize_rejected() {
    let mut config = reliable_config();
    config.max_upload_bytes = 1024;
    let app = create_test_app(config);

    let (_, session) = post_json(&app, "/sessions", json!({ "loan_type": "504" })).await;
    let session_id = session["session_id"].as_str().unwrap();

    let body = multipart_upload("huge_scan.pdf", 4096, Some("tax_return"));
    let (status, _) =
        post_multipart(&app, &format!("/sessions/{}/documents", session_id), body).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_job_status_not_found() {
    let app = create_test_app(IntakeConfig::default());

    let (status, _) = get_json(&app, "/jobs/00000000-0000-0000-0000-000000000000/status").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_expired_session_reads_as_not_found() {
    let mut config = IntakeConfig::default();
    config.session_ttl_secs = 0;
    let app = create_test_app(config);

    let (status, session) = post_json(&app, "/sessions", json!({ "loan_type": "504" })).await;
    assert_eq!(status, StatusCode::CREATED);
    let session_id = session["session_id"].as_str().unwrap();

    let (status, _) = get_json(&app, &format!("/sessions/{}/documents", session_id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_end_session_removes_it() {
    let app = create_test_app(IntakeConfig::default());

    let (_, session) = post_json(&app, "/sessions", json!({ "loan_type": "express" })).await;
    let session_id = session["session_id"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/sessions/{}", session_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let (status, _) = get_json(&app, &format!("/sessions/{}/documents", session_id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test(start_paused = true)]
async fn test_fault_injection_degrades_and_serves_fallback() {
    let app = create_test_app(reliable_config());

    let (status, fault) = post_json(
        &app,
        "/admin/faults",
        json!({ "dependency": "primary-store", "mode": "retryable" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fault["mode"]["active"], false, "injection alone does not trip");

    // One product read burns the full retry budget and trips the dependency,
    // but the caller still gets a catalog answer from the fallback
    let (status, session) = post_json(&app, "/sessions", json!({ "loan_type": "504" })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(session["degraded"], true);
    assert_eq!(session["loan_display_name"], "SBA 504 Fixed Asset");

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(
        response.headers().get("x-degraded-mode").map(|v| v.as_bytes()),
        Some(&b"true"[..])
    );
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let health: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(health["status"], "degraded");
    assert_eq!(health["mode"]["active"], true);
    assert!(health["mode"]["reason"]
        .as_str()
        .unwrap()
        .contains("primary-store"));

    // Clearing the injected fault restores health
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/admin/faults")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let cleared: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(cleared["mode"]["active"], false);

    let (_, health) = get_json(&app, "/health").await;
    assert_eq!(health["status"], "ok");
}

#[tokio::test(start_paused = true)]
async fn test_degraded_upload_still_completes() {
    let app = create_test_app(reliable_config());

    // Trip the primary store before any session exists
    let (_, _) = post_json(
        &app,
        "/admin/faults",
        json!({ "dependency": "primary-store", "mode": "non_retryable" }),
    )
    .await;
    for _ in 0..3 {
        let _ = post_json(&app, "/sessions", json!({ "loan_type": "504" })).await;
    }
    let (_, health) = get_json(&app, "/health").await;
    assert_eq!(health["mode"]["active"], true);

    let (status, session) = post_json(&app, "/sessions", json!({ "loan_type": "504" })).await;
    assert_eq!(status, StatusCode::CREATED);
    let session_id = session["session_id"].as_str().unwrap().to_string();

    let body = multipart_upload("drivers_license.png", 20 * 1024, Some("drivers_license"));
    let (status, upload) =
        post_multipart(&app, &format!("/sessions/{}/documents", session_id), body).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(upload["degraded"], true);

    let terminal = poll_to_terminal(&app, upload["job_id"].as_str().unwrap()).await;
    assert_eq!(terminal["status"], "complete");
    assert_eq!(terminal["degraded"], true);

    // The degraded write is still visible through the listing
    let (status, docs) = get_json(&app, &format!("/sessions/{}/documents", session_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(docs["degraded"], true);
    assert_eq!(docs["documents"].as_array().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stream_pushes_initial_snapshot() {
    let app = create_test_app(reliable_config());

    let (_, session) = post_json(&app, "/sessions", json!({ "loan_type": "express" })).await;
    let session_id = session["session_id"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/sessions/{}/stream", session_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.as_bytes()),
        Some(&b"text/event-stream"[..])
    );

    let mut body = response.into_body();
    let frame = body.frame().await.unwrap().unwrap();
    let text = String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap();
    assert!(text.contains("event: Snapshot"), "got frame: {}", text);
    assert!(text.contains("\"total_documents\":0"));
}

#[tokio::test]
async fn test_stream_unknown_session_is_not_found() {
    let app = create_test_app(IntakeConfig::default());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/sessions/00000000-0000-0000-0000-000000000000/stream")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test(start_paused = true)]
async fn test_stream_ends_when_session_ends() {
    let app = create_test_app(reliable_config());

    let (_, session) = post_json(&app, "/sessions", json!({ "loan_type": "microloan" })).await;
    let session_id = session["session_id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/sessions/{}/stream", session_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let mut body = response.into_body();

    // Consume the on-subscribe snapshot first
    let frame = body.frame().await.unwrap().unwrap();
    assert!(frame.into_data().is_ok());

    let delete = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/sessions/{}", session_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(delete.status(), StatusCode::NO_CONTENT);

    // The cancelled session closes the stream after at most a couple of
    // in-flight frames; the body must terminate rather than heartbeat forever
    for _ in 0..10 {
        match body.frame().await {
            Some(Ok(_)) => continue,
            Some(Err(_)) | None => return,
        }
    }
    panic!("stream kept producing frames after session end");
}

#[tokio::test]
async fn test_admin_fault_validation() {
    let app = create_test_app(IntakeConfig::default());

    let (status, _) = post_json(
        &app,
        "/admin/faults",
        json!({ "dependency": "ledger", "mode": "retryable" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post_json(
        &app,
        "/admin/faults",
        json!({ "dependency": "cache", "mode": "explode" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
