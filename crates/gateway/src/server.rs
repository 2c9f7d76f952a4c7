//! Axum-based HTTP server for the gateway.

use axum::{
    async_trait,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        DefaultBodyLimit, FromRequest, FromRequestParts, Multipart, Path, State,
    },
    http::{header, request::Parts, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use workbench_core::{
    config::ServerConfig, ChatMessage, Envelope, Error, ErrorKind, MemoryOperation,
    MemoryRecord, MemoryStore, Result, SessionStore, UserStore,
};
use workbench_sandbox::{FileEntry, FileManager, WorkspaceLayout};

use crate::agent::{AgentGateway, Caller};

/// Header carrying the caller identity established by the authentication layer.
pub const USER_HEADER: &str = "x-user-id";

const DEFAULT_MEMORY_LIMIT: usize = 50;
const TITLE_CHARS: usize = 50;

/// Shared application state.
pub struct AppState {
    pub gateway: Arc<AgentGateway>,
    pub users: Arc<dyn UserStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub memory: Arc<dyn MemoryStore>,
    /// Maps users to their home sandbox roots.
    pub layout: WorkspaceLayout,
}

/// Gateway server.
pub struct GatewayServer {
    config: ServerConfig,
    state: Arc<AppState>,
    metrics_handle: Option<PrometheusHandle>,
}

impl GatewayServer {
    /// Create a new gateway server.
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self {
            config,
            state: Arc::new(state),
            metrics_handle: None,
        }
    }

    /// Set metrics handle.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }

    /// Build the Axum router.
    pub fn build_router(&self) -> Router {
        let mut router = Router::new()
            .route("/health", get(health_handler))
            .route("/api/chat", post(chat_handler))
            .route("/api/models", get(models_handler))
            .route("/api/tools", get(list_tools_handler))
            .route("/api/tools/:name/enabled", put(set_tool_enabled_handler))
            .route("/api/tools/invoke", post(invoke_tool_handler))
            .route("/api/execute/bash", post(bash_handler))
            .route("/api/execute/python", post(python_handler))
            .route("/api/files", get(list_files_handler))
            .route("/api/files/folder", post(create_folder_handler))
            .route("/api/files/rename", put(rename_handler))
            .route("/api/files/item", delete(delete_handler))
            .route("/api/files/download", get(download_handler))
            .route("/api/files/upload", post(upload_handler))
            .route("/api/memory", get(memory_handler))
            .layer(DefaultBodyLimit::max(self.config.max_upload_bytes))
            .with_state(self.state.clone());

        if let Some(handle) = &self.metrics_handle {
            let handle = handle.clone();
            router = router.route("/metrics", get(move || async move { handle.render() }));
        }

        if self.config.enable_cors {
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
        }

        if self.config.enable_tracing {
            router = router.layer(TraceLayer::new_for_http());
        }

        router
    }

    /// Bind the configured address and serve.
    pub async fn run(self) -> Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::Config(format!("failed to bind {}: {}", addr, e)))?;
        self.serve(listener).await
    }

    /// Serve on an already-bound listener.
    pub async fn serve(self, listener: tokio::net::TcpListener) -> Result<()> {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(addr = %addr, "Gateway server starting");
        }
        axum::serve(listener, self.build_router())
            .await
            .map_err(|e| Error::internal(format!("server error: {}", e)))
    }
}

// =============================================================================
// Errors and extractors
// =============================================================================

/// Failure before or outside a gateway operation.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    Core(Error),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self::Core(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Core(Error::validation(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Core(Error::validation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthorized => {
                let envelope = Envelope {
                    success: false,
                    output: None,
                    content: None,
                    error: Some("authentication required".into()),
                    kind: Some(ErrorKind::AccessDenied),
                };
                (StatusCode::UNAUTHORIZED, Json(envelope)).into_response()
            }
            Self::Core(err) => respond(Envelope::from_error(&err)),
        }
    }
}

/// JSON body whose rejection is reported as an envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Query string whose rejection is reported as an envelope.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// The caller named by [`USER_HEADER`], with a file manager over their home root.
pub struct Authenticated {
    pub caller: Caller,
    pub files: FileManager,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> std::result::Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(ApiError::Unauthorized)?;

        let user = state.users.get(user_id).await?.ok_or(ApiError::Unauthorized)?;
        let root = state.layout.home_for(&user.email).await?;

        Ok(Self {
            files: FileManager::new(root.clone()),
            caller: Caller::new(user, root),
        })
    }
}

/// Status for an envelope. Execution and provider failures are results, not
/// transport failures, and travel with 200.
fn status_for(envelope: &Envelope) -> StatusCode {
    match envelope.kind {
        None | Some(ErrorKind::Execution) | Some(ErrorKind::Provider) => StatusCode::OK,
        Some(ErrorKind::Validation) => StatusCode::BAD_REQUEST,
        Some(ErrorKind::AccessDenied) => StatusCode::FORBIDDEN,
        Some(ErrorKind::NotFound) => StatusCode::NOT_FOUND,
        Some(ErrorKind::Conflict) => StatusCode::CONFLICT,
        Some(ErrorKind::Internal) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn respond(envelope: Envelope) -> Response {
    (status_for(&envelope), Json(envelope)).into_response()
}

/// Append to the caller's operation history. Failures are logged only.
async fn remember(state: &AppState, record: MemoryRecord) {
    if let Err(e) = state.memory.append(record).await {
        tracing::warn!(error = %e, "Failed to write memory record");
    }
}

// =============================================================================
// Request/Response Types
// =============================================================================

/// Health response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Chat request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    pub model: Option<String>,
    /// Continue this session; a new one is created when absent.
    pub session_id: Option<String>,
}

/// Chat response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub session_id: String,
    pub message: ChatMessage,
    pub success: bool,
}

#[derive(Debug, Deserialize)]
pub struct SetEnabledRequest {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct InvokeRequest {
    pub name: String,
    #[serde(default = "empty_object")]
    pub args: Value,
}

fn empty_object() -> Value {
    json!({})
}

#[derive(Debug, Deserialize)]
pub struct BashRequest {
    pub command: String,
    pub cwd: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PythonRequest {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct PathQuery {
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FileListing {
    pub success: bool,
    pub files: Vec<FileEntry>,
}

#[derive(Debug, Deserialize)]
pub struct EntryRequest {
    pub name: String,
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameRequest {
    pub old_name: String,
    pub new_name: String,
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MemoryQuery {
    pub limit: Option<usize>,
}

fn base_path(path: &Option<String>) -> &str {
    path.as_deref().unwrap_or(".")
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check handler.
async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Chat handler.
///
/// The session transcript plus the new message is forwarded. Both messages are
/// appended to the session whatever the outcome; a failed call yields an
/// assistant message of the form `Error: <reason>` with `success: false`.
async fn chat_handler(
    State(state): State<Arc<AppState>>,
    auth: Authenticated,
    ApiJson(payload): ApiJson<ChatRequest>,
) -> std::result::Result<Response, ApiError> {
    let message = payload.message.trim();
    if message.is_empty() {
        return Err(Error::validation("message must not be empty").into());
    }
    let user = &auth.caller.user;
    let requested = payload
        .model
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty());

    let session = match payload.session_id.as_deref() {
        Some(id) => state
            .sessions
            .get(id)
            .await?
            .filter(|s| s.user_id == user.id)
            .ok_or_else(|| Error::not_found(format!("session '{}'", id)))?,
        None => {
            let model = requested
                .or(user.preferences.current_model.as_deref())
                .unwrap_or(state.gateway.default_model());
            let title: String = message.chars().take(TITLE_CHARS).collect();
            state.sessions.create(&user.id, model, &title).await?
        }
    };
    let model = requested.unwrap_or(&session.model).to_string();

    tracing::info!(
        session_id = %session.id,
        model = %model,
        history = session.messages.len(),
        "Processing chat request"
    );

    let user_message = ChatMessage::user(message);
    let mut transcript = session.messages.clone();
    transcript.push(user_message.clone());

    let envelope = state.gateway.chat(&auth.caller, &transcript, Some(&model)).await;
    // Failures are still recorded as an assistant turn so the session stays coherent.
    let success = envelope.success;
    let reply = if success {
        ChatMessage::assistant(envelope.content.unwrap_or_default())
    } else {
        let error = envelope.error.unwrap_or_else(|| "chat failed".to_string());
        ChatMessage::assistant(format!("Error: {}", error))
    };
    state
        .sessions
        .append(&session.id, vec![user_message, reply.clone()])
        .await?;
    remember(
        &state,
        MemoryRecord::new(&user.id, MemoryOperation::Chat, message, &reply.content).with_model(model),
    )
    .await;

    Ok(Json(ChatResponse {
        session_id: session.id,
        message: reply,
        success,
    })
    .into_response())
}

async fn models_handler(State(state): State<Arc<AppState>>, _auth: Authenticated) -> Response {
    respond(state.gateway.list_models().await)
}

async fn list_tools_handler(State(state): State<Arc<AppState>>, _auth: Authenticated) -> Response {
    respond(state.gateway.list_tools())
}

async fn set_tool_enabled_handler(
    State(state): State<Arc<AppState>>,
    auth: Authenticated,
    Path(name): Path<String>,
    ApiJson(payload): ApiJson<SetEnabledRequest>,
) -> Response {
    respond(
        state
            .gateway
            .set_tool_enabled(&auth.caller, &name, payload.enabled)
            .await,
    )
}

async fn invoke_tool_handler(
    State(state): State<Arc<AppState>>,
    auth: Authenticated,
    ApiJson(payload): ApiJson<InvokeRequest>,
) -> Response {
    let input = format!("{} {}", payload.name, payload.args);
    let envelope = state
        .gateway
        .invoke_tool(&auth.caller, &payload.name, payload.args)
        .await;
    remember(
        &state,
        MemoryRecord::new(&auth.caller.user.id, MemoryOperation::Tool, input, envelope.summary()),
    )
    .await;
    respond(envelope)
}

async fn bash_handler(
    State(state): State<Arc<AppState>>,
    auth: Authenticated,
    ApiJson(payload): ApiJson<BashRequest>,
) -> Response {
    let envelope = state
        .gateway
        .execute_bash(&auth.caller, &payload.command, payload.cwd.as_deref())
        .await;
    remember(
        &state,
        MemoryRecord::new(
            &auth.caller.user.id,
            MemoryOperation::Bash,
            payload.command,
            envelope.summary(),
        ),
    )
    .await;
    respond(envelope)
}

async fn python_handler(
    State(state): State<Arc<AppState>>,
    auth: Authenticated,
    ApiJson(payload): ApiJson<PythonRequest>,
) -> Response {
    let envelope = state.gateway.execute_python(&auth.caller, &payload.code).await;
    remember(
        &state,
        MemoryRecord::new(
            &auth.caller.user.id,
            MemoryOperation::Python,
            payload.code,
            envelope.summary(),
        ),
    )
    .await;
    respond(envelope)
}

async fn list_files_handler(
    auth: Authenticated,
    ApiQuery(query): ApiQuery<PathQuery>,
) -> std::result::Result<Json<FileListing>, ApiError> {
    let files = auth.files.list(base_path(&query.path)).await?;
    Ok(Json(FileListing {
        success: true,
        files,
    }))
}

async fn create_folder_handler(
    auth: Authenticated,
    ApiJson(payload): ApiJson<EntryRequest>,
) -> std::result::Result<Response, ApiError> {
    auth.files
        .create_folder(base_path(&payload.path), &payload.name)
        .await?;
    Ok(respond(Envelope::output(json!({ "name": payload.name }))))
}

async fn rename_handler(
    auth: Authenticated,
    ApiJson(payload): ApiJson<RenameRequest>,
) -> std::result::Result<Response, ApiError> {
    auth.files
        .rename(base_path(&payload.path), &payload.old_name, &payload.new_name)
        .await?;
    Ok(respond(Envelope::output(json!({ "name": payload.new_name }))))
}

async fn delete_handler(
    auth: Authenticated,
    ApiJson(payload): ApiJson<EntryRequest>,
) -> std::result::Result<Response, ApiError> {
    auth.files
        .delete(base_path(&payload.path), &payload.name)
        .await?;
    Ok(respond(Envelope::output(json!({ "name": payload.name }))))
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub name: String,
    pub path: Option<String>,
}

async fn download_handler(
    auth: Authenticated,
    ApiQuery(query): ApiQuery<DownloadQuery>,
) -> std::result::Result<Response, ApiError> {
    let bytes = auth.files.download(base_path(&query.path), &query.name).await?;

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", query.name))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/octet-stream")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

/// Multipart upload: a `file` part and an optional `destinationPath` part.
async fn upload_handler(
    auth: Authenticated,
    mut multipart: Multipart,
) -> std::result::Result<Response, ApiError> {
    let mut destination: Option<String> = None;
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::validation(e.body_text()))?
    {
        match field.name() {
            Some("file") => {
                let name = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| Error::validation("file part has no file name"))?;
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| Error::validation(e.body_text()))?;
                file = Some((name, data.to_vec()));
            }
            Some("destinationPath") => {
                destination = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| Error::validation(e.body_text()))?,
                );
            }
            _ => {}
        }
    }

    let (name, data) = file.ok_or_else(|| Error::validation("no file uploaded"))?;
    let path = auth
        .files
        .upload(base_path(&destination), &name, data)
        .await?;
    Ok(respond(Envelope::output(json!({ "path": path }))))
}

async fn memory_handler(
    State(state): State<Arc<AppState>>,
    auth: Authenticated,
    ApiQuery(query): ApiQuery<MemoryQuery>,
) -> Response {
    let limit = query.limit.unwrap_or(DEFAULT_MEMORY_LIMIT);
    respond(Envelope::from(
        state.memory.recent(&auth.caller.user.id, limit).await,
    ))
}
