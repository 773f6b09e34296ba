//! HTTP API server.
//!
//! # Endpoints
//!
//! | Method | Path | Auth | Description |
//! |--------|------|------|-------------|
//! | `GET`  | `/` | no | Welcome message |
//! | `GET`  | `/health` | no | Health check (returns version) |
//! | `POST` | `/auth/register` | no | Create a user |
//! | `POST` | `/auth/login` | no | JSON credentials → bearer token |
//! | `POST` | `/auth/token` | no | Form credentials (OAuth2 password flow) → bearer token |
//! | `POST` | `/knowledge/upload` | yes | Embed and store a document |
//! | `POST` | `/knowledge/ask-question` | yes | Answer from the closest document |
//! | `GET`  | `/knowledge/documents` | yes | List stored documents |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "content must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `unauthorized` (401),
//! `embeddings_disabled` (400), `embedding_failed` (500),
//! `generation_failed` (500), `retrieval_failed` (500), `internal` (500).
//!
//! 401 responses carry `WWW-Authenticate: Bearer`. Malformed or incomplete
//! request bodies are `bad_request`.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{FormRejection, JsonRejection},
        Request, State,
    },
    http::{header, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Form, Json, Router,
};
use knowledge_assistant_core::{AssistantError, EmbeddingError, KnowledgeAssistant};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{self, AuthError, AuthSettings, Claims};
use crate::config::Config;
use crate::knowledge;

/// Characters of content shown per document in listings.
const PREVIEW_CHARS: usize = 80;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    assistant: Arc<KnowledgeAssistant>,
    /// User table lives next to the documents.
    pool: SqlitePool,
    auth: Arc<AuthSettings>,
}

impl AppState {
    pub fn new(assistant: Arc<KnowledgeAssistant>, pool: SqlitePool, auth: AuthSettings) -> Self {
        Self {
            assistant,
            pool,
            auth: Arc::new(auth),
        }
    }
}

/// Starts the HTTP server on `[server].bind`.
///
/// Refuses to start without a signing secret. Runs until the process is
/// terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let auth = AuthSettings::from_config(&config.auth)?;
    let (assistant, pool) = knowledge::build_assistant(config).await?;
    let state = AppState::new(Arc::new(assistant), pool, auth);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    println!("Knowledge Assistant listening on http://{}", config.server.bind);
    serve(listener, state).await
}

/// Serve `state` on an already-bound listener.
pub async fn serve(listener: tokio::net::TcpListener, state: AppState) -> anyhow::Result<()> {
    tracing::info!(addr = ?listener.local_addr().ok(), "server started");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Build the full router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Protected routes require a valid bearer token
    let protected = Router::new()
        .route("/knowledge/upload", post(handle_upload))
        .route("/knowledge/ask-question", post(handle_ask))
        .route("/knowledge/documents", get(handle_list_documents))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let public = Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/auth/register", post(handle_register))
        .route("/auth/login", post(handle_login))
        .route("/auth/token", post(handle_token));

    public
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bearer auth middleware: validates `Authorization: Bearer <token>` and
/// stores the [`Claims`] in request extensions.
async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .ok_or_else(|| unauthorized("Not authenticated"))?;

    let claims = state.auth.validate_token(token).map_err(AppError::from)?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Token from an `Authorization` value. The scheme is case-insensitive.
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

/// Inner error detail with a machine-readable code and human-readable message.
#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(code = %self.code, message = %self.message, "request failed");
        }
        let status = self.status;
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
}

fn unauthorized(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
}

fn internal(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

impl From<AssistantError> for AppError {
    fn from(err: AssistantError) -> Self {
        let message = err.to_string();
        match err {
            AssistantError::InvalidInput(_) => bad_request(message),
            AssistantError::Embedding(EmbeddingError::Disabled) => {
                AppError::new(StatusCode::BAD_REQUEST, "embeddings_disabled", message)
            }
            AssistantError::Embedding(_) => {
                AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "embedding_failed", message)
            }
            AssistantError::Generation(_) => {
                AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "generation_failed", message)
            }
            AssistantError::Retrieval(_) => {
                AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "retrieval_failed", message)
            }
            AssistantError::Store(_) => internal(message),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingField(_) | AuthError::UsernameTaken => bad_request(err.to_string()),
            AuthError::InvalidCredentials | AuthError::InvalidToken => unauthorized(err.to_string()),
            AuthError::Internal(e) => internal(format!("{:#}", e)),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

impl From<FormRejection> for AppError {
    fn from(rejection: FormRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

// ============ Public routes ============

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

async fn handle_root() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Welcome to the Knowledge Assistant API!".to_string(),
    })
}

/// JSON response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    /// Always `"ok"` when the server is running.
    status: String,
    /// The crate version from `Cargo.toml`.
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Deserialize)]
struct Credentials {
    username: String,
    password: String,
}

#[derive(Serialize)]
struct TokenResponse {
    access_token: String,
    token_type: String,
}

async fn handle_register(
    State(state): State<AppState>,
    req: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Json(req) = req?;
    auth::register_user(&state.pool, &state.auth, &req.username, &req.password).await?;
    Ok(Json(MessageResponse {
        message: "User successfully registered!".to_string(),
    }))
}

async fn handle_login(
    State(state): State<AppState>,
    req: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<TokenResponse>, AppError> {
    let Json(req) = req?;
    login(&state, &req).await
}

/// Same as `/auth/login`, but form-encoded for OAuth2 password-flow clients.
async fn handle_token(
    State(state): State<AppState>,
    req: Result<Form<Credentials>, FormRejection>,
) -> Result<Json<TokenResponse>, AppError> {
    let Form(req) = req?;
    login(&state, &req).await
}

async fn login(state: &AppState, req: &Credentials) -> Result<Json<TokenResponse>, AppError> {
    let username =
        auth::authenticate(&state.pool, &state.auth, &req.username, &req.password).await?;
    let access_token = state.auth.issue_token(&username)?;
    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
    }))
}

// ============ Protected routes ============

#[derive(Deserialize)]
struct UploadRequest {
    content: String,
}

#[derive(Serialize)]
struct UploadResponse {
    message: String,
    id: String,
}

async fn handle_upload(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    req: Result<Json<UploadRequest>, JsonRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    let Json(req) = req?;
    let doc = state.assistant.upload(&req.content, Some(&claims.sub)).await?;
    Ok(Json(UploadResponse {
        message: "Document uploaded successfully!".to_string(),
        id: doc.id,
    }))
}

#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
}

async fn handle_ask(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    req: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, AppError> {
    let Json(req) = req?;
    let answer = state.assistant.ask(&req.question).await?;
    tracing::debug!(user = %claims.sub, outcome = answer.outcome.as_str(), "answered question");
    Ok(Json(AskResponse { answer: answer.text }))
}

#[derive(Serialize)]
struct DocumentSummary {
    id: String,
    owner: Option<String>,
    created_at: String,
    preview: String,
}

async fn handle_list_documents(
    State(state): State<AppState>,
) -> Result<Json<Vec<DocumentSummary>>, AppError> {
    let docs = state
        .assistant
        .store()
        .list_all()
        .await
        .map_err(|e| internal(format!("{:#}", e)))?;

    let summaries = docs
        .into_iter()
        .map(|doc| DocumentSummary {
            preview: doc.preview(PREVIEW_CHARS),
            created_at: doc.created_at.to_rfc3339(),
            owner: doc.owner,
            id: doc.id,
        })
        .collect();
    Ok(Json(summaries))
}
