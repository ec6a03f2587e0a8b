//! Chat-Completions Backend
//!
//! Backend for OpenAI-compatible `/chat/completions` APIs, which is what the
//! generative-UI provider exposes for both tutor chat and artifacts.
//!
//! Streaming responses are server-sent events. Each `data:` payload is a
//! `chat.completion.chunk` whose text delta sits at `choices[0].delta.content`;
//! the literal payload `[DONE]` ends the stream.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use super::stream::DeltaStream;
use super::traits::{
    CompletionBackend, CompletionRequest, CompletionResponse, StreamingToken, UpstreamEndpoint,
};
use crate::error::{RelayError, RelayResult};
use crate::relay::duration_ms;

/// Token channel depth between the reader task and the relay
const TOKEN_CHANNEL_CAPACITY: usize = 100;

/// One decoded SSE payload
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum SseFrame {
    /// A text delta (possibly empty, e.g. role-only chunks)
    Delta(String),
    /// End marker
    Done,
    /// Upstream reported an error inside the stream
    Error(String),
}

/// Decode one SSE `data:` payload
pub(crate) fn parse_sse_data(raw: &str) -> Result<SseFrame, String> {
    if raw.trim() == "[DONE]" {
        return Ok(SseFrame::Done);
    }

    let event: Value =
        serde_json::from_str(raw).map_err(|e| format!("SSE parsing error: {e}, data: {raw}"))?;

    if let Some(message) = extract_api_error_message(&event) {
        return Ok(SseFrame::Error(message));
    }

    let delta = event
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("delta"))
        .and_then(|delta| delta.get("content"))
        .and_then(Value::as_str)
        .unwrap_or_default();

    Ok(SseFrame::Delta(delta.to_string()))
}

fn extract_api_error_message(event: &Value) -> Option<String> {
    let error = event.get("error")?;
    if let Some(message) = error.get("message").and_then(Value::as_str) {
        return Some(message.to_string());
    }
    if let Some(message) = error.as_str() {
        return Some(message.to_string());
    }
    Some("An error occurred during streaming".to_string())
}

/// Extract `choices[0].message.content` from a non-streaming body
pub(crate) fn extract_message_content(body: &Value) -> RelayResult<String> {
    let choice = body
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .ok_or_else(|| RelayError::upstream("malformed response: no choices"))?;

    Ok(choice
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string())
}

/// Build the pooled HTTP client used for upstream calls
///
/// Only a connect timeout is set: a streamed completion may legitimately run
/// for a long time.
pub fn build_http_client(connect_timeout: Duration) -> RelayResult<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .build()
        .map_err(|e| RelayError::Config(format!("failed to create HTTP client: {e}")))
}

/// Client for one chat-completions endpoint
///
/// Constructed per request from an explicit endpoint; the `reqwest::Client`
/// it borrows is only a connection pool.
#[derive(Clone)]
pub struct ChatCompletionsBackend {
    endpoint: UpstreamEndpoint,
    http_client: reqwest::Client,
}

impl ChatCompletionsBackend {
    /// Create a backend for an endpoint
    #[must_use]
    pub fn new(endpoint: UpstreamEndpoint, http_client: reqwest::Client) -> Self {
        Self {
            endpoint,
            http_client,
        }
    }

    /// The endpoint this backend talks to
    #[must_use]
    pub fn endpoint(&self) -> &UpstreamEndpoint {
        &self.endpoint
    }

    async fn post(&self, request: &CompletionRequest) -> RelayResult<reqwest::Response> {
        let response = self
            .http_client
            .post(self.endpoint.completions_url())
            .bearer_auth(&self.endpoint.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("unknown status").to_string()
            } else {
                body
            };
            return Err(RelayError::upstream_status(status.as_u16(), message));
        }

        Ok(response)
    }
}

#[async_trait]
impl CompletionBackend for ChatCompletionsBackend {
    fn name(&self) -> &'static str {
        "chat-completions"
    }

    async fn send_streaming(&self, request: &CompletionRequest) -> RelayResult<DeltaStream> {
        let mut request = request.clone();
        request.stream = true;

        let response = self.post(&request).await?;
        let (tx, rx) = mpsc::channel(TOKEN_CHANNEL_CAPACITY);
        let model = request.model.clone();

        let reader = tokio::spawn(async move {
            let mut events = response.bytes_stream().eventsource();
            let mut delta_count: u32 = 0;

            while let Some(event) = events.next().await {
                let event = match event {
                    Ok(event) => event,
                    Err(e) => {
                        let _ = tx
                            .send(StreamingToken::Error(RelayError::upstream(format!(
                                "SSE stream error: {e}"
                            ))))
                            .await;
                        return;
                    }
                };

                trace!(data = %event.data, "upstream SSE event");
                match parse_sse_data(&event.data) {
                    Ok(SseFrame::Delta(text)) => {
                        if text.is_empty() {
                            continue;
                        }
                        delta_count += 1;
                        if tx.send(StreamingToken::Token(text)).await.is_err() {
                            // Relay dropped the stream; dropping `events` closes the connection
                            debug!(model = %model, delta_count, "Upstream stream abandoned");
                            return;
                        }
                    }
                    Ok(SseFrame::Done) => {
                        debug!(model = %model, delta_count, "Upstream stream complete");
                        let _ = tx.send(StreamingToken::Complete).await;
                        return;
                    }
                    Ok(SseFrame::Error(message)) => {
                        warn!(model = %model, error = %message, "Upstream reported stream error");
                        let _ = tx
                            .send(StreamingToken::Error(RelayError::upstream(message)))
                            .await;
                        return;
                    }
                    Err(message) => {
                        warn!(model = %model, error = %message, "Malformed upstream event");
                        let _ = tx
                            .send(StreamingToken::Error(RelayError::upstream(message)))
                            .await;
                        return;
                    }
                }
            }

            let _ = tx
                .send(StreamingToken::Error(RelayError::upstream(
                    "SSE stream closed before response completed",
                )))
                .await;
        });

        Ok(DeltaStream::new(rx, Some(reader.abort_handle())))
    }

    async fn send(&self, request: &CompletionRequest) -> RelayResult<CompletionResponse> {
        let start = Instant::now();
        let mut request = request.clone();
        request.stream = false;

        let response = self.post(&request).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| RelayError::upstream(format!("malformed response: {e}")))?;

        Ok(CompletionResponse {
            content: extract_message_content(&body)?,
            model: request.model,
            duration_ms: Some(duration_ms(start.elapsed())),
        })
    }
}
