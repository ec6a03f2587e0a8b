//! HTTP Surface
//!
//! Routes:
//!
//! - `POST /api/chat`: tutor turn, streamed back with `X-Thread-Id`
//! - `POST /api/artifact/generate`: new artifact, streamed back with `X-Artifact-Id`
//! - `POST /api/artifact/edit`: full-content edit, JSON `{content}`
//! - `POST /api/export-pdf`: PDF passthrough as an attachment
//! - `GET /health`: liveness
//!
//! Each request builds its upstream backend from an explicit endpoint with the
//! credential read at that moment. The only shared upstream resource is the
//! `reqwest::Client` connection pool in [`AppState`].
//!
//! Streamed bodies are the concatenated upstream deltas. If the upstream fails
//! mid-stream the body is cut off without a clean end, so the client can tell
//! an incomplete response from a finished one.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info};

use relay_core::backend::{
    build_http_client, ChatCompletionsBackend, CompletionBackend, PdfExporter, UpstreamEndpoint,
    DEFAULT_PDF_FILENAME,
};
use relay_core::{
    ArtifactId, ArtifactType, RelayConfig, RelayError, RelayResult, RequestTranslator,
    ResponseId, StreamRelay, ThreadId, ThreadStore, Turn,
};

use crate::error::ApiError;

/// Correlation header on tutor chat responses
pub const THREAD_ID_HEADER: &str = "x-thread-id";
/// Correlation header on artifact generation responses
pub const ARTIFACT_ID_HEADER: &str = "x-artifact-id";

const STREAM_CONTENT_TYPE: &str = "text/event-stream";
const STREAM_CACHE_CONTROL: &str = "no-cache, no-transform";

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    config: Arc<RelayConfig>,
    http_client: reqwest::Client,
    threads: ThreadStore,
}

impl AppState {
    /// Build state for a configuration
    pub fn new(config: RelayConfig) -> RelayResult<Self> {
        let http_client = build_http_client(config.connect_timeout())?;
        let threads = ThreadStore::new(config.max_thread_messages).with_max_threads(config.max_threads);
        Ok(Self {
            config: Arc::new(config),
            http_client,
            threads,
        })
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Relay-side thread history
    #[must_use]
    pub fn threads(&self) -> &ThreadStore {
        &self.threads
    }

    fn translator(&self) -> RequestTranslator<'_> {
        RequestTranslator::new(&self.config)
    }
}

/// Body of `POST /api/chat`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// The user's turn
    pub prompt: Turn,
    /// Conversation thread
    pub thread_id: ThreadId,
    /// Id of the assistant response being requested
    pub response_id: ResponseId,
}

/// Body of `POST /api/artifact/generate`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    /// What to generate
    pub prompt: String,
    /// Report or slides
    #[serde(default)]
    pub artifact_type: ArtifactType,
    /// Replaces the built-in instruction for the type
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Id to correlate later edits with; generated when absent
    #[serde(default)]
    pub artifact_id: Option<ArtifactId>,
}

/// Body of `POST /api/artifact/edit`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditRequest {
    /// Current artifact markup
    pub existing_content: String,
    /// What to change
    pub edit_prompt: String,
    /// Report or slides
    #[serde(default)]
    pub artifact_type: ArtifactType,
    /// Artifact being edited
    pub artifact_id: ArtifactId,
}

/// Response of `POST /api/artifact/edit`
#[derive(Debug, Serialize, Deserialize)]
pub struct EditResponse {
    /// Full replacement markup
    pub content: String,
}

/// Body of `POST /api/export-pdf`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    /// Opaque parameters understood by the export endpoint
    pub export_params: serde_json::Value,
}

/// Build the router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .expose_headers([
            HeaderName::from_static(THREAD_ID_HEADER),
            HeaderName::from_static(ARTIFACT_ID_HEADER),
        ]);

    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/artifact/generate", post(artifact_generate))
        .route("/api/artifact/edit", post(artifact_edit))
        .route("/api/export-pdf", post(export_pdf))
        .route("/health", get(health))
        .layer(cors)
        .with_state(state)
}

/// Correlation id as a header value, checked before anything goes upstream
fn correlation_value(id: &str, header_name: &'static str) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(id)
        .map_err(|_| RelayError::validation(format!("{header_name} is not a valid header value")).into())
}

/// Wrap a relay as a streaming response carrying its correlation header
fn stream_response(
    relay: StreamRelay,
    correlation_header: &'static str,
    correlation: HeaderValue,
) -> Response {
    let mut response = Body::from_stream(relay).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(STREAM_CONTENT_TYPE));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(STREAM_CACHE_CONTROL));
    headers.insert(HeaderName::from_static(correlation_header), correlation);
    response
}

async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let correlation = correlation_value(request.thread_id.as_str(), THREAD_ID_HEADER)?;
    let history = state.threads.history(&request.thread_id);
    let upstream_request = state.translator().chat(
        &request.prompt,
        &history,
        &request.thread_id,
        &request.response_id,
    )?;

    info!(
        thread_id = %request.thread_id,
        response_id = %request.response_id,
        history = history.len(),
        "Chat turn"
    );

    let backend = ChatCompletionsBackend::new(state.config.chat_endpoint()?, state.http_client.clone());
    let deltas = backend.send_streaming(&upstream_request).await?;

    let threads = state.threads.clone();
    let thread_id = request.thread_id.clone();
    let user_text = request.prompt.content().to_string();
    let relay = StreamRelay::new(deltas, request.thread_id.as_str())
        .on_closed(move |content| threads.record_exchange(&thread_id, user_text, content));

    Ok(stream_response(relay, THREAD_ID_HEADER, correlation))
}

async fn artifact_generate(
    State(state): State<AppState>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let artifact_id = request.artifact_id.unwrap_or_default();
    let correlation = correlation_value(artifact_id.as_str(), ARTIFACT_ID_HEADER)?;
    let upstream_request = state.translator().artifact_generate(
        &request.prompt,
        request.artifact_type,
        request.system_prompt.as_deref(),
        &artifact_id,
    )?;

    info!(
        artifact_id = %artifact_id,
        artifact_type = %request.artifact_type,
        "Generating artifact"
    );

    let backend =
        ChatCompletionsBackend::new(state.config.artifact_endpoint()?, state.http_client.clone());
    let deltas = backend.send_streaming(&upstream_request).await?;

    Ok(stream_response(
        StreamRelay::new(deltas, artifact_id.as_str()),
        ARTIFACT_ID_HEADER,
        correlation,
    ))
}

async fn artifact_edit(
    State(state): State<AppState>,
    payload: Result<Json<EditRequest>, JsonRejection>,
) -> Result<Json<EditResponse>, ApiError> {
    let Json(request) = payload?;
    let upstream_request = state.translator().artifact_edit(
        &request.existing_content,
        &request.edit_prompt,
        request.artifact_type,
        &request.artifact_id,
    )?;

    let backend =
        ChatCompletionsBackend::new(state.config.artifact_endpoint()?, state.http_client.clone());
    let response = backend.send(&upstream_request).await?;

    info!(
        artifact_id = %request.artifact_id,
        bytes = response.content.len(),
        duration_ms = ?response.duration_ms,
        "Artifact edited"
    );

    Ok(Json(EditResponse {
        content: response.content,
    }))
}

async fn export_pdf(
    State(state): State<AppState>,
    payload: Result<Json<ExportRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let api_key = state
        .config
        .read_api_key()
        .map_err(|e| RelayError::ExportFailed(e.to_string()))?;
    let exporter = PdfExporter::new(
        UpstreamEndpoint::new(state.config.pdf_export_url.clone(), api_key),
        state.http_client.clone(),
    );

    let pdf = exporter.export(&request.export_params).await?;
    debug!("Streaming exported PDF");

    let mut response = Body::from_stream(pdf).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/pdf"));
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("attachment; filename=\"{DEFAULT_PDF_FILENAME}\""))
            .map_err(|e| RelayError::ExportFailed(e.to_string()))?,
    );
    Ok(response)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
