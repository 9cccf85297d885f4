//! HTTP API against the avalanche fixture study

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use study_assign::{
    AllocationStore, AssignmentClient, LocalAssignmentClient, MemoryStore, StratifiedBalancer,
    SubmissionService,
};
use study_cli::{router, AppState};
use study_content::StudyBundle;
use study_test_utils::{item_types, write_study_dir, FlakyStore};
use tempfile::TempDir;
use tower::ServiceExt;

struct Harness {
    _dir: TempDir,
    state: AppState,
}

fn client_over(store: Arc<dyn AllocationStore>) -> Arc<dyn AssignmentClient> {
    let balancer = Arc::new(StratifiedBalancer::with_seed(store, 21));
    let submissions = Arc::new(SubmissionService::new(balancer.clone()));
    Arc::new(LocalAssignmentClient::new(balancer, submissions))
}

fn harness(store: Arc<dyn AllocationStore>) -> Harness {
    let dir = TempDir::new().unwrap();
    write_study_dir(dir.path());
    let bundle = StudyBundle::load_dir(dir.path()).unwrap();
    Harness {
        _dir: dir,
        state: AppState::new(bundle, client_over(store)),
    }
}

async fn call(state: &AppState, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = router(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_health() {
    let h = harness(Arc::new(MemoryStore::new()));
    let (status, body) = call(&h.state, "GET", "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok", "service": "study-engine-api"}));
}

#[tokio::test]
async fn test_assign_is_idempotent_over_http() {
    let h = harness(Arc::new(MemoryStore::new()));
    let request = json!({"p_uuid": "p1", "p_stratum": "novice", "p_ap_list": item_types()});

    let (status, first) = call(&h.state, "POST", "/api/studies/avalanche_2025/assign", Some(request.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["stratum"], "novice");
    let pair = first["pair"].as_array().unwrap();
    assert_eq!(pair.len(), 2);
    assert!(pair[0].as_str().unwrap() < pair[1].as_str().unwrap());

    let (_, again) = call(&h.state, "POST", "/api/studies/avalanche_2025/assign", Some(request)).await;
    assert_eq!(first, again);
}

#[tokio::test]
async fn test_assign_bad_requests() {
    let h = harness(Arc::new(MemoryStore::new()));
    let uri = "/api/studies/avalanche_2025/assign";

    let (status, body) = call(&h.state, "POST", uri, Some(json!({"p_ap_list": item_types()}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("p_uuid"));

    let (status, _) = call(&h.state, "POST", uri, Some(json!({"p_uuid": "p1", "p_ap_list": []}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&h.state, "POST", "/api/studies/other/assign", Some(json!({"p_uuid": "p1"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_bodies_get_detail() {
    let h = harness(Arc::new(MemoryStore::new()));

    let wrong_type = json!({"p_uuid": 5, "p_ap_list": item_types()});
    let (status, body) = call(&h.state, "POST", "/api/studies/avalanche_2025/assign", Some(wrong_type)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().is_some_and(|d| !d.is_empty()));

    let wrong_payload = json!({"p_payload": "not an object"});
    let (status, body) = call(&h.state, "POST", "/api/studies/avalanche_2025/submit", Some(wrong_payload)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());

    let request = Request::builder()
        .method("POST")
        .uri("/api/studies/avalanche_2025/assign")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = router(h.state.clone()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn test_assign_unavailable_is_503() {
    let store = Arc::new(FlakyStore::new());
    store.set_reads_down(true);
    let h = harness(store);

    let request = json!({"p_uuid": "p1", "p_ap_list": item_types()});
    let (status, body) = call(&h.state, "POST", "/api/studies/avalanche_2025/assign", Some(request)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["detail"].as_str().is_some());
}

#[tokio::test]
async fn test_submit_counts_pair() {
    let store = Arc::new(MemoryStore::new());
    let h = harness(store.clone());
    let payload = json!({"p_payload": {
        "uuid": "p1",
        "pair": ["wind", "storm"],
        "stratum": "novice",
        "answers": {"storm_1": "a"},
        "bank_version": "2025.1"
    }});

    let (status, body) = call(&h.state, "POST", "/api/studies/avalanche_2025/submit", Some(payload)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true}));

    let responses = store.responses();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].survey_id.as_deref(), Some("avalanche_2025"));
    assert_eq!(store.snapshot("novice").await.unwrap().item_count("storm"), 1);
}

#[tokio::test]
async fn test_submit_bad_requests() {
    let h = harness(Arc::new(MemoryStore::new()));
    let uri = "/api/studies/avalanche_2025/submit";

    let (status, body) = call(&h.state, "POST", uri, Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "p_payload is required");

    let (status, body) = call(&h.state, "POST", uri, Some(json!({"p_payload": {"pair": ["a", "b"]}}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "uuid is required in payload");

    let self_pair = json!({"p_payload": {"uuid": "p1", "pair": ["storm", "storm"]}});
    let (status, _) = call(&h.state, "POST", uri, Some(self_pair)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_config_and_content() {
    let h = harness(Arc::new(MemoryStore::new()));

    let (status, config) = call(&h.state, "GET", "/api/studies/avalanche_2025/config", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(config["routing"]["block_count"], 2);

    let (status, pages) = call(&h.state, "GET", "/api/studies/avalanche_2025/content/feedback_pages", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pages["pages"][0]["name"], "thanks");

    let (status, testlets) = call(&h.state, "GET", "/api/studies/avalanche_2025/content/testlets", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(testlets.as_array().unwrap().len(), 4);

    let (status, _) = call(&h.state, "GET", "/api/studies/avalanche_2025/content/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
