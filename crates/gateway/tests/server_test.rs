use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt;

use workbench_core::config::ServerConfig;
use workbench_core::mocks::{MockProviderAdapter, RecordingTool};
use workbench_core::{ProviderKind, UserRecord};
use workbench_gateway::{AgentGateway, AppState, GatewayServer, USER_HEADER};
use workbench_governance::InMemoryAuditStore;
use workbench_model_gateway::{CredentialResolver, ProviderRouter};
use workbench_sandbox::{CommandRunner, WorkspaceLayout};
use workbench_skills::ToolRegistry;
use workbench_store::{InMemoryRecordStore, InMemorySessionStore, InMemoryUserStore};

struct Harness {
    dir: tempfile::TempDir,
    app: Router,
    tool: Arc<RecordingTool>,
    local: Arc<MockProviderAdapter>,
}

impl Harness {
    fn home(&self, email: &str) -> PathBuf {
        self.dir.path().canonicalize().unwrap().join(email).join("home")
    }
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let layout = WorkspaceLayout::new(dir.path().canonicalize().unwrap()).unwrap();

    let users = InMemoryUserStore::with_users([
        UserRecord::new("u1", "u1@example.com"),
        UserRecord::new("u2", "u2@example.com"),
    ]);

    let registry = Arc::new(ToolRegistry::new());
    let tool = Arc::new(RecordingTool::new("echo"));
    registry.register(tool.clone()).unwrap();

    let local = Arc::new(MockProviderAdapter::new(ProviderKind::Local, "local says hi"));
    let router = ProviderRouter::new("llama3:latest", CredentialResolver::default())
        .with_adapter(local.clone())
        .with_adapter(Arc::new(MockProviderAdapter::new(ProviderKind::Gemini, "unused")));

    let gateway = AgentGateway::new(
        registry,
        CommandRunner::new(),
        router,
        Arc::new(InMemoryAuditStore::new()),
    );

    let state = AppState {
        gateway: Arc::new(gateway),
        users: Arc::new(users),
        sessions: Arc::new(InMemorySessionStore::new()),
        memory: Arc::new(InMemoryRecordStore::new()),
        layout,
    };
    let config = ServerConfig {
        enable_tracing: false,
        ..Default::default()
    };
    let app = GatewayServer::new(config, state).build_router();

    Harness {
        dir,
        app,
        tool,
        local,
    }
}

fn request(method: &str, uri: &str, user: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(USER_HEADER, user);
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

// =============================================================================
// Identity
// =============================================================================

#[tokio::test]
async fn test_health_is_public() {
    let h = harness();
    let (status, body) = send(&h.app, request("GET", "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_missing_or_unknown_user_is_unauthorized() {
    let h = harness();

    let (status, body) = send(&h.app, request("GET", "/api/tools", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _) = send(&h.app, request("GET", "/api/tools", Some("intruder"), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Chat
// =============================================================================

#[tokio::test]
async fn test_chat_session_flow() {
    let h = harness();

    let (status, first) = send(
        &h.app,
        request("POST", "/api/chat", Some("u1"), Some(json!({"message": "hello"}))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["success"], true);
    assert_eq!(first["message"]["role"], "assistant");
    assert_eq!(first["message"]["content"], "local says hi");
    let session_id = first["sessionId"].as_str().unwrap().to_string();

    let (status, second) = send(
        &h.app,
        request(
            "POST",
            "/api/chat",
            Some("u1"),
            Some(json!({"message": "again", "sessionId": session_id})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["sessionId"], session_id.as_str());

    // Second call carries the first exchange plus the new message.
    let calls = h.local.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].transcript.len(), 3);
    assert_eq!(calls[1].model, "llama3:latest");

    let (_, memory) = send(&h.app, request("GET", "/api/memory?limit=1", Some("u1"), None)).await;
    let records = memory["output"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["operation"], "chat");
    assert_eq!(records[0]["input"], "again");
}

#[tokio::test]
async fn test_chat_foreign_or_unknown_session_is_not_found() {
    let h = harness();
    let (_, first) = send(
        &h.app,
        request("POST", "/api/chat", Some("u1"), Some(json!({"message": "hello"}))),
    )
    .await;
    let session_id = first["sessionId"].as_str().unwrap();

    let (status, body) = send(
        &h.app,
        request(
            "POST",
            "/api/chat",
            Some("u2"),
            Some(json!({"message": "peek", "sessionId": session_id})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");

    let (status, _) = send(
        &h.app,
        request(
            "POST",
            "/api/chat",
            Some("u1"),
            Some(json!({"message": "x", "sessionId": "nope"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_chat_missing_credential_is_a_result() {
    let h = harness();
    let (status, body) = send(
        &h.app,
        request(
            "POST",
            "/api/chat",
            Some("u1"),
            Some(json!({"message": "hi", "model": "gemini-1.5-flash"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"]["role"], "assistant");
    assert!(body["message"]["timestamp"].is_string());
    let content = body["message"]["content"].as_str().unwrap();
    assert!(content.starts_with("Error: "));
    assert!(content.contains("credential not provided for model gemini-1.5-flash"));
    let session_id = body["sessionId"].as_str().unwrap().to_string();

    // The failed exchange stays in the session it created.
    let (status, next) = send(
        &h.app,
        request(
            "POST",
            "/api/chat",
            Some("u1"),
            Some(json!({"message": "try local", "sessionId": session_id, "model": "llama3:latest"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(next["success"], true);
    let calls = h.local.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].transcript.len(), 3);
    assert!(calls[0].transcript[1].content.starts_with("Error: "));

    let (_, memory) = send(&h.app, request("GET", "/api/memory", Some("u1"), None)).await;
    let records = memory["output"].as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1]["input"], "hi");
    assert!(records[1]["output"].as_str().unwrap().starts_with("Error: "));
}

#[tokio::test]
async fn test_chat_rejects_malformed_body() {
    let h = harness();
    let (status, body) = send(
        &h.app,
        request("POST", "/api/chat", Some("u1"), Some(json!({"text": "hi"}))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");
}

// =============================================================================
// Tools
// =============================================================================

#[tokio::test]
async fn test_tool_catalog_and_invocation() {
    let h = harness();

    let (_, catalog) = send(&h.app, request("GET", "/api/tools", Some("u1"), None)).await;
    let tools = catalog["output"].as_array().unwrap();
    assert_eq!(tools[0]["name"], "echo");
    assert!(tools[0].get("inputSchema").is_some());

    let (status, ok) = send(
        &h.app,
        request(
            "POST",
            "/api/tools/invoke",
            Some("u1"),
            Some(json!({"name": "echo", "args": {"text": "ping"}})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ok["output"]["echo"], "ping");

    let (status, bad) = send(
        &h.app,
        request(
            "POST",
            "/api/tools/invoke",
            Some("u1"),
            Some(json!({"name": "echo", "args": {}})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(bad["kind"], "validation");

    let (status, _) = send(
        &h.app,
        request("POST", "/api/tools/invoke", Some("u1"), Some(json!({"name": "ghost"}))),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    assert_eq!(h.tool.executions(), 1);
}

#[tokio::test]
async fn test_disable_tool() {
    let h = harness();

    let (status, toggled) = send(
        &h.app,
        request("PUT", "/api/tools/echo/enabled", Some("u1"), Some(json!({"enabled": false}))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(toggled["output"]["enabled"], false);

    let (status, _) = send(
        &h.app,
        request(
            "POST",
            "/api/tools/invoke",
            Some("u1"),
            Some(json!({"name": "echo", "args": {"text": "ping"}})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(h.tool.executions(), 0);
}

// =============================================================================
// Command execution
// =============================================================================

#[cfg(unix)]
#[tokio::test]
async fn test_bash_execution() {
    let h = harness();

    let (status, ok) = send(
        &h.app,
        request(
            "POST",
            "/api/execute/bash",
            Some("u1"),
            Some(json!({"command": "echo hi && pwd"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ok["success"], true);
    let output = ok["output"].as_str().unwrap();
    assert!(output.starts_with("hi"));
    assert!(output.ends_with("u1@example.com/home"));

    let (status, failed) = send(
        &h.app,
        request("POST", "/api/execute/bash", Some("u1"), Some(json!({"command": "exit 7"}))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(failed["success"], false);
    assert_eq!(failed["kind"], "execution");

    let (status, denied) = send(
        &h.app,
        request(
            "POST",
            "/api/execute/bash",
            Some("u1"),
            Some(json!({"command": "ls", "cwd": "../../"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(denied["kind"], "access_denied");

    let (_, memory) = send(&h.app, request("GET", "/api/memory", Some("u1"), None)).await;
    let records = memory["output"].as_array().unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0]["operation"], "bash");
    assert_eq!(records[0]["input"], "ls");
}

#[tokio::test]
async fn test_python_requires_code() {
    let h = harness();
    let (status, body) = send(
        &h.app,
        request("POST", "/api/execute/python", Some("u1"), Some(json!({"code": "  "}))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

// =============================================================================
// Files
// =============================================================================

#[tokio::test]
async fn test_folder_lifecycle() {
    let h = harness();

    let (status, _) = send(
        &h.app,
        request("POST", "/api/files/folder", Some("u1"), Some(json!({"name": "x"}))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, listing) = send(&h.app, request("GET", "/api/files?path=.", Some("u1"), None)).await;
    assert_eq!(listing["files"][0]["name"], "x");
    assert_eq!(listing["files"][0]["type"], "directory");

    let (status, _) = send(
        &h.app,
        request("POST", "/api/files/folder", Some("u1"), Some(json!({"name": "y"}))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, conflict) = send(
        &h.app,
        request(
            "PUT",
            "/api/files/rename",
            Some("u1"),
            Some(json!({"oldName": "x", "newName": "y"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(conflict["kind"], "conflict");

    let (status, _) = send(
        &h.app,
        request("DELETE", "/api/files/item", Some("u1"), Some(json!({"name": "x"}))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, listing) = send(&h.app, request("GET", "/api/files", Some("u1"), None)).await;
    let names: Vec<_> = listing["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, ["y"]);
}

#[tokio::test]
async fn test_file_paths_cannot_escape() {
    let h = harness();

    let (status, _) = send(
        &h.app,
        request("GET", "/api/files?path=../u2%40example.com", Some("u1"), None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &h.app,
        request(
            "POST",
            "/api/files/folder",
            Some("u1"),
            Some(json!({"name": "..", "path": "."})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_then_download() {
    let h = harness();
    std::fs::create_dir_all(h.home("u1@example.com").join("docs")).unwrap();

    let boundary = "workbench-boundary";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"destinationPath\"\r\n\r\ndocs\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"notes.txt\"\r\n\
         Content-Type: text/plain\r\n\r\nhello upload\r\n--{b}--\r\n",
        b = boundary
    );
    let upload = Request::builder()
        .method("POST")
        .uri("/api/files/upload")
        .header(USER_HEADER, "u1")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap();
    let (status, stored) = send(&h.app, upload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stored["output"]["path"], "docs/notes.txt");

    let response = h
        .app
        .clone()
        .oneshot(request(
            "GET",
            "/api/files/download?name=notes.txt&path=docs",
            Some("u1"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"notes.txt\""
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"hello upload");

    // The other user's home is untouched.
    assert!(!h.home("u2@example.com").join("docs").exists());
}
