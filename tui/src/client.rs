//! Relay HTTP Client
//!
//! Thin wrapper over the relay daemon's routes. Streaming routes hand back the
//! raw byte stream plus the correlation header; decoding and accumulation are
//! the consumer's job.

use futures::stream::{BoxStream, StreamExt};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use relay_core::{ArtifactId, ArtifactType, RelayError, RelayResult, ResponseId, ThreadId, Turn};

/// Correlation header on chat responses
pub const THREAD_ID_HEADER: &str = "x-thread-id";
/// Correlation header on artifact responses
pub const ARTIFACT_ID_HEADER: &str = "x-artifact-id";

/// Raw chunks of a streamed body
pub type ByteStream = BoxStream<'static, RelayResult<Vec<u8>>>;

/// A streamed relay response
pub struct RelayBody {
    /// Value of the route's correlation header, if the relay sent one
    pub correlation_id: Option<String>,
    /// Body chunks; an `Err` means the body was cut off
    pub stream: ByteStream,
}

impl std::fmt::Debug for RelayBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayBody")
            .field("correlation_id", &self.correlation_id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Deserialize)]
struct EditBody {
    content: String,
}

/// Client for one relay daemon
#[derive(Clone, Debug)]
pub struct RelayClient {
    base_url: String,
    http: reqwest::Client,
}

impl RelayClient {
    /// Client for a relay at `base_url` (e.g. `http://127.0.0.1:3000`)
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_http_client(base_url, reqwest::Client::new())
    }

    /// Client reusing an existing connection pool
    pub fn with_http_client(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    /// Relay base URL
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Send a tutor turn and stream the reply
    pub async fn chat(
        &self,
        prompt: &Turn,
        thread_id: &ThreadId,
        response_id: &ResponseId,
    ) -> RelayResult<RelayBody> {
        let body = json!({
            "prompt": prompt,
            "threadId": thread_id,
            "responseId": response_id,
        });
        debug!(thread_id = %thread_id, response_id = %response_id, "Sending chat turn");
        let response = self.post("/api/chat", &body).await?;
        Ok(into_relay_body(response, THREAD_ID_HEADER))
    }

    /// Generate an artifact and stream its markup
    pub async fn generate_artifact(
        &self,
        prompt: &str,
        kind: ArtifactType,
        artifact_id: Option<&ArtifactId>,
    ) -> RelayResult<RelayBody> {
        let mut body = json!({
            "prompt": prompt,
            "artifactType": kind,
        });
        if let Some(id) = artifact_id {
            body["artifactId"] = json!(id);
        }
        debug!(artifact_type = %kind, "Generating artifact");
        let response = self.post("/api/artifact/generate", &body).await?;
        Ok(into_relay_body(response, ARTIFACT_ID_HEADER))
    }

    /// Edit an artifact; returns the full replacement markup
    pub async fn edit_artifact(
        &self,
        existing_content: &str,
        edit_prompt: &str,
        kind: ArtifactType,
        artifact_id: &ArtifactId,
    ) -> RelayResult<String> {
        let body = json!({
            "existingContent": existing_content,
            "editPrompt": edit_prompt,
            "artifactType": kind,
            "artifactId": artifact_id,
        });
        let response = self.post("/api/artifact/edit", &body).await?;
        let edited: EditBody = response
            .json()
            .await
            .map_err(|e| RelayError::upstream(format!("malformed edit response: {e}")))?;
        Ok(edited.content)
    }

    /// Export PDF bytes
    pub async fn export_pdf(&self, export_params: &serde_json::Value) -> RelayResult<Vec<u8>> {
        let response = self
            .http
            .post(self.url("/api/export-pdf"))
            .json(&json!({ "exportParams": export_params }))
            .send()
            .await
            .map_err(|e| RelayError::ExportFailed(e.to_string()))?;

        if !response.status().is_success() {
            let message = error_message(response).await;
            return Err(RelayError::ExportFailed(
                strip_kind(&message, EXPORT_FAILED_PREFIX).to_string(),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RelayError::ExportFailed(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn post(&self, path: &str, body: &serde_json::Value) -> RelayResult<Response> {
        let response = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| RelayError::upstream(format!("relay unreachable: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = error_message(response).await;
        warn!(path, status = status.as_u16(), error = %message, "Relay rejected request");
        if status == StatusCode::BAD_REQUEST {
            Err(RelayError::validation(strip_kind(&message, VALIDATION_PREFIX)))
        } else {
            Err(upstream_failure(status.as_u16(), &message))
        }
    }
}

/// Relay error bodies carry the rendered error; these undo the kind prefix
const VALIDATION_PREFIX: &str = "validation failed: ";
const EXPORT_FAILED_PREFIX: &str = "Failed to export PDF: ";

fn strip_kind<'a>(message: &'a str, prefix: &str) -> &'a str {
    message.strip_prefix(prefix).unwrap_or(message)
}

const UPSTREAM_PREFIX: &str = "upstream request failed";

/// Rebuild an upstream failure, keeping the upstream's own status when the
/// relay reported one
fn upstream_failure(relay_status: u16, message: &str) -> RelayError {
    let Some(rest) = message.strip_prefix(UPSTREAM_PREFIX) else {
        return RelayError::upstream_status(relay_status, message);
    };
    let reported = rest
        .strip_prefix(" (")
        .and_then(|r| r.split_once("): "))
        .and_then(|(code, detail)| Some((code.parse::<u16>().ok()?, detail)));
    match (reported, rest.strip_prefix(": ")) {
        (Some((code, detail)), _) => RelayError::upstream_status(code, detail),
        (None, Some(detail)) => RelayError::upstream_status(relay_status, detail),
        (None, None) => RelayError::upstream_status(relay_status, message),
    }
}

/// `{"error": ..}` from the body, else the canonical status text
async fn error_message(response: Response) -> String {
    let status = response.status();
    let fallback = status
        .canonical_reason()
        .map_or_else(|| status.as_u16().to_string(), str::to_string);
    match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => fallback,
    }
}

fn into_relay_body(response: Response, header: &str) -> RelayBody {
    let correlation_id = response
        .headers()
        .get(header)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let stream = response
        .bytes_stream()
        .map(|chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|e| RelayError::upstream(format!("incomplete response: {e}")))
        })
        .boxed();

    RelayBody {
        correlation_id,
        stream,
    }
}
