//! End-to-end HTTP surface tests (spec §6.1/§8), driven straight through
//! the real axum router with `tower::ServiceExt::oneshot` rather than
//! against individual handler functions, so the full middleware chain
//! (logging, panic recovery, validation, security headers, rate limiting,
//! request-context injection) runs on every request.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use mimir_core::event::EventBus;
use mimir_core::pipeline::Engine;
use mimir_core::registry::Registry;
use mimir_http::{build_router, AppState, HttpConfig};
use mimir_mcp::{McpAdapter, NullExternalToolBackend};
use mimir_queue::JobQueue;
use mimir_scheduler::Scheduler;
use mimir_store::Store;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

async fn test_app() -> (axum::Router, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(Store::open(dir.path()).await.unwrap());
    let registry = Arc::new(Registry::new());
    mimir_plugins_builtin::register_all(&registry).unwrap();
    let engine = Arc::new(Engine::new(registry.clone(), EventBus::new()));
    let scheduler = Arc::new(Scheduler::new(store.clone(), engine.clone(), EventBus::new(), chrono_tz::UTC, 2));
    let queue = Arc::new(JobQueue::new(store.clone(), engine.clone(), EventBus::new(), 16, 2, Duration::from_secs(60)));
    let mcp = Arc::new(McpAdapter::new(
        registry.clone(),
        engine.clone(),
        store.clone(),
        scheduler.clone(),
        queue.clone(),
        Arc::new(NullExternalToolBackend),
    ));
    let state = AppState {
        store,
        engine,
        registry,
        scheduler,
        queue,
        mcp,
        config: HttpConfig::default(),
    };
    (build_router(state), dir)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_and_version_are_reachable_without_the_api_prefix() {
    let (app, _dir) = test_app().await;

    let response = app.clone().oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], json!("ok"));

    let response = app.oneshot(Request::builder().uri("/version").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

/// Seed scenario 1: happy-path sequential execution through the real HTTP
/// surface — create, then execute, and check the returned record.
#[tokio::test]
async fn create_then_execute_pipeline_through_http() {
    let (app, _dir) = test_app().await;

    let create_body = json!({
        "name": "seq-demo",
        "config": {
            "id": "ignored",
            "steps": [
                {"name": "echo", "plugin": "Data_Processing.echo", "config": {"raw": "hi"}},
                {"name": "upper", "plugin": "Data_Processing.upper", "config": {"input": "raw", "output_key": "out"}}
            ]
        }
    });
    let response = app.clone().oneshot(json_request("POST", "/api/v1/pipelines", create_body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    let pipeline_id = created["data"]["id"].as_str().unwrap().to_string();

    let execute_body = json!({"pipeline_id": pipeline_id});
    let response = app.oneshot(json_request("POST", "/api/v1/pipelines/execute", execute_body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let executed = body_json(response).await;
    assert_eq!(executed["data"]["status"], json!("succeeded"));
}

/// Boundary behaviour from spec §8: a pipeline referencing an unregistered
/// plugin is rejected before execution, surfaced over HTTP as `400`.
#[tokio::test]
async fn execute_rejects_unknown_plugin_before_running() {
    let (app, _dir) = test_app().await;

    let execute_body = json!({
        "config": {
            "id": "inline",
            "steps": [{"name": "s1", "plugin": "Foo.bar", "config": {}}]
        }
    });
    let response = app.oneshot(json_request("POST", "/api/v1/pipelines/execute", execute_body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// Spec §3/§8: deleting a pipeline referenced by a scheduled job is
/// refused with `InUse` (409); removing the job first then unblocks the
/// delete.
#[tokio::test]
async fn delete_pipeline_in_use_by_scheduled_job_conflicts_then_succeeds() {
    let (app, _dir) = test_app().await;

    let create_body = json!({
        "name": "scheduled-demo",
        "config": {
            "id": "ignored",
            "steps": [{"name": "echo", "plugin": "Data_Processing.echo", "config": {"k": "v"}}]
        }
    });
    let response = app.clone().oneshot(json_request("POST", "/api/v1/pipelines", create_body)).await.unwrap();
    let created = body_json(response).await;
    let pipeline_id = created["data"]["id"].as_str().unwrap().to_string();

    let job_body = json!({"name": "nightly", "pipeline_id": pipeline_id, "cron": "0 * * * *"});
    let response = app.clone().oneshot(json_request("POST", "/api/v1/scheduler/jobs", job_body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let job = body_json(response).await;
    let job_id = job["data"]["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(Request::builder().method("DELETE").uri(format!("/api/v1/pipelines/{pipeline_id}")).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .clone()
        .oneshot(Request::builder().method("DELETE").uri(format!("/api/v1/scheduler/jobs/{job_id}")).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(Request::builder().method("DELETE").uri(format!("/api/v1/pipelines/{pipeline_id}")).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

/// Seed scenario 6: discover the echo plugin as an MCP tool, then execute
/// it, through the real HTTP endpoints.
#[tokio::test]
async fn mcp_discover_then_execute_through_http() {
    let (app, _dir) = test_app().await;

    let response = app.clone().oneshot(Request::builder().uri("/mcp/tools").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let tools = body_json(response).await;
    assert!(tools.as_array().unwrap().iter().any(|t| t["name"] == json!("Data_Processing.echo")));

    let execute_body = json!({
        "tool_name": "Data_Processing.echo",
        "input": {"step_config": {"name": "t", "config": {"msg": "x"}, "output": "r"}}
    });
    let response = app.oneshot(json_request("POST", "/mcp/tools/execute", execute_body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let result = body_json(response).await;
    assert_eq!(result["success"], json!(true));
    assert_eq!(result["result"], json!({"r": {"msg": "x"}}));
}

/// `PUT /pipelines/{id}` bumps the version and a subsequent history read
/// shows the expected number of revisions (spec §8 "After n updates,
/// History(id) returns n+1 entries").
#[tokio::test]
async fn updating_a_pipeline_grows_its_history() {
    let (app, _dir) = test_app().await;

    let create_body = json!({
        "name": "versioned-demo",
        "config": {"id": "ignored", "steps": []}
    });
    let response = app.clone().oneshot(json_request("POST", "/api/v1/pipelines", create_body)).await.unwrap();
    let created = body_json(response).await;
    let pipeline_id = created["data"]["id"].as_str().unwrap().to_string();

    for i in 0..3 {
        let update_body = json!({"description": format!("revision {i}")});
        let response = app
            .clone()
            .oneshot(json_request("PUT", &format!("/api/v1/pipelines/{pipeline_id}"), update_body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .oneshot(Request::builder().uri(format!("/api/v1/pipelines/{pipeline_id}/history")).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let history = body_json(response).await;
    assert_eq!(history["data"].as_array().unwrap().len(), 4);
}
