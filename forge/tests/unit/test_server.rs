//! HTTP surface tests driving the router directly

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use github_models::ContentEntry;
use workflow_forge::authn::StaticTokenProvider;
use workflow_forge::errors::GatewayError;
use workflow_forge::server::{router, ServerState};
use workflow_forge::services::WorkflowService;
use workflow_forge::template::WorkflowRenderer;

use crate::support::*;

fn app_with(gateway: Arc<FakeGateway>, tokens: StaticTokenProvider) -> Router {
    let service = WorkflowService::new(
        gateway,
        WorkflowRenderer::default(),
        Duration::from_secs(5),
    );
    let state = ServerState::new(service, Arc::new(tokens), CancellationToken::new());
    router(Arc::new(state))
}

fn app(gateway: Arc<FakeGateway>) -> Router {
    app_with(
        gateway,
        StaticTokenProvider::default().with_token("u-1", "ghp_test"),
    )
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-user-id", "u-1")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-user-id", "u-1")
        .body(Body::empty())
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn ec2_body() -> Value {
    serde_json::to_value(ec2_request(&["api"])).unwrap()
}

#[tokio::test]
async fn test_health() {
    let (status, body) = send(app(Arc::new(FakeGateway::new())), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "workflow-forge");
}

#[tokio::test]
async fn test_preview_returns_yaml() {
    let gateway = Arc::new(FakeGateway::new());
    let (status, body) = send(
        app(gateway.clone()),
        post_json("/api/workflows/preview", &ec2_body()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Workflow generated successfully");
    assert_eq!(body["data"]["workflowName"], "deploy");
    assert_eq!(body["data"]["deploymentType"], "ec2");
    assert!(body["data"]["yamlContent"]
        .as_str()
        .unwrap()
        .starts_with("name: Build & Publish Image (EC2)\n"));
    assert!(gateway.calls().is_empty());
}

#[tokio::test]
async fn test_preview_rejects_invalid_request() {
    let mut request = ec2_body();
    request["workflowName"] = json!("bad name!");

    let (status, body) = send(
        app(Arc::new(FakeGateway::new())),
        post_json("/api/workflows/preview", &request),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Failed to generate workflow");
    assert!(body["error"].as_str().unwrap().contains("workflow name"));
    assert!(body.get("data").map_or(true, Value::is_null));
}

#[tokio::test]
async fn test_preview_rejects_owner_outside_github_alphabet() {
    let gateway = Arc::new(FakeGateway::new());
    for (field, value) in [("owner", "acme #"), ("repository", "svc\nInjected: true")] {
        let mut request = ec2_body();
        request[field] = json!(value);

        let (status, body) = send(
            app(gateway.clone()),
            post_json("/api/workflows/preview", &request),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "{field}");
        assert!(body["error"].as_str().unwrap().contains("invalid"), "{field}");
    }
    assert!(gateway.calls().is_empty());
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let request = Request::builder()
        .method("POST")
        .uri("/api/workflows/preview")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"owner\": "))
        .unwrap();

    let (status, body) = send(app(Arc::new(FakeGateway::new())), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_create_opens_pull_request() {
    let gateway = Arc::new(FakeGateway::new());
    let (status, body) = send(
        app(gateway.clone()),
        post_json("/api/workflows/create", &ec2_body()),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Workflow created successfully");
    assert_eq!(body["data"]["pullRequestNumber"], 1);
    assert_eq!(body["data"]["filePath"], ".github/workflows/deploy.yml");
    assert_eq!(gateway.pulls().len(), 1);
}

#[tokio::test]
async fn test_create_without_token_is_unauthorized() {
    let gateway = Arc::new(FakeGateway::new());
    let app = app_with(gateway.clone(), StaticTokenProvider::default());

    let (status, body) = send(app, post_json("/api/workflows/create", &ec2_body())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].as_str().unwrap().contains("u-1"));
    assert!(gateway.calls().is_empty());
}

#[tokio::test]
async fn test_anonymous_caller_uses_fallback_token() {
    let gateway = Arc::new(FakeGateway::new());
    let tokens = StaticTokenProvider::new(Default::default(), Some("ghp_fallback".to_string()));

    let request = Request::builder()
        .uri("/api/workflows/acme/svc")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(app_with(gateway.clone(), tokens), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(gateway.calls(), vec![LIST_DIRECTORY]);
}

#[tokio::test]
async fn test_create_in_empty_repository() {
    let gateway = Arc::new(FakeGateway::new().failing(GET_BRANCH_SHA, GatewayError::NotFound));
    let (status, body) = send(
        app(gateway),
        post_json("/api/workflows/create", &ec2_body()),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["message"], "Failed to create workflow");
    assert!(body["error"].as_str().unwrap().contains("resolve_base_sha"));
}

#[tokio::test]
async fn test_list_workflows() {
    let entry = |name: &str, kind: &str| ContentEntry {
        name: name.to_string(),
        path: format!(".github/workflows/{}", name),
        sha: format!("sha-{}", name),
        entry_type: kind.to_string(),
        ..Default::default()
    };
    let gateway = Arc::new(FakeGateway::new().with_entries(vec![
        entry("ci.yml", "file"),
        entry("notes.txt", "file"),
        entry("deploy.yaml", "file"),
        entry("nested", "dir"),
    ]));

    let (status, body) = send(app(gateway), get("/api/workflows/acme/svc")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Successfully retrieved 2 workflow(s)");
    assert_eq!(body["data"]["count"], 2);
    assert_eq!(body["data"]["owner"], "acme");
    assert_eq!(body["data"]["workflows"][1]["name"], "deploy.yaml");
}

#[tokio::test]
async fn test_list_workflows_missing_directory_is_empty() {
    let gateway = Arc::new(FakeGateway::new().failing(LIST_DIRECTORY, GatewayError::NotFound));
    let (status, body) = send(app(gateway), get("/api/workflows/acme/svc")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 0);
}

#[tokio::test]
async fn test_get_file_content() {
    let gateway = Arc::new(FakeGateway::new().with_file(ContentEntry {
        name: "ci.yml".to_string(),
        path: ".github/workflows/ci.yml".to_string(),
        sha: "blob1".to_string(),
        entry_type: "file".to_string(),
        encoding: Some("base64".to_string()),
        content: Some("bmFtZTogQ0kK".to_string()),
        ..Default::default()
    }));

    let (status, body) = send(
        app(gateway),
        get("/api/workflows/acme/svc/file?path=.github/workflows/ci.yml"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["content"], "name: CI\n");
    assert_eq!(body["data"]["sha"], "blob1");
}

#[tokio::test]
async fn test_get_file_outside_workflows_dir() {
    let gateway = Arc::new(FakeGateway::new());
    let (status, _) = send(
        app(gateway.clone()),
        get("/api/workflows/acme/svc/file?path=src/main.rs"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(gateway.calls().is_empty());
}

#[tokio::test]
async fn test_get_file_requires_path_query() {
    let (status, body) = send(
        app(Arc::new(FakeGateway::new())),
        get("/api/workflows/acme/svc/file"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Failed to get workflow content");
}

#[tokio::test]
async fn test_update_path_mismatch() {
    let gateway = Arc::new(FakeGateway::new());
    let body = json!({
        "owner": "other",
        "repository": "svc",
        "filePath": ".github/workflows/deploy.yml",
        "content": "name: deploy\n",
        "sha": "blob1"
    });
    let request = Request::builder()
        .method("PUT")
        .uri("/api/workflows/acme/svc/file")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-user-id", "u-1")
        .body(Body::from(body.to_string()))
        .unwrap();

    let (status, body) = send(app(gateway.clone()), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("path parameters must match request body"));
    assert!(gateway.calls().is_empty());
}

#[tokio::test]
async fn test_update_rejects_file_name_unfit_for_branch() {
    let gateway = Arc::new(FakeGateway::new());
    let body = json!({
        "owner": "acme",
        "repository": "svc",
        "filePath": ".github/workflows/my deploy.yml",
        "content": "name: deploy\n",
        "sha": "blob1"
    });
    let request = Request::builder()
        .method("PUT")
        .uri("/api/workflows/acme/svc/file")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-user-id", "u-1")
        .body(Body::from(body.to_string()))
        .unwrap();

    let (status, _) = send(app(gateway.clone()), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(gateway.calls().is_empty());
}

#[tokio::test]
async fn test_update_opens_pull_request() {
    let gateway = Arc::new(FakeGateway::new());
    let body = json!({
        "owner": "acme",
        "repository": "svc",
        "filePath": ".github/workflows/deploy.yml",
        "content": "name: deploy\n",
        "sha": "blob1",
        "commitMessage": "Tune deploy"
    });
    let request = Request::builder()
        .method("PUT")
        .uri("/api/workflows/acme/svc/file")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-user-id", "u-1")
        .body(Body::from(body.to_string()))
        .unwrap();

    let (status, body) = send(app(gateway.clone()), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Workflow updated successfully");
    assert!(body["data"]["branch"]
        .as_str()
        .unwrap()
        .starts_with("update-workflow/deploy-"));
    assert_eq!(gateway.puts()[0].1.sha.as_deref(), Some("blob1"));
    assert_eq!(gateway.puts()[0].1.message, "Tune deploy");
    assert_eq!(gateway.pulls()[0].title, "Update workflow: deploy");
}
