//! Completion Backend Traits
//!
//! Trait definitions for the upstream completion API. The relay only needs two
//! calls: a streaming completion that yields text deltas and a one-shot
//! completion that yields a single text payload.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::stream::DeltaStream;
use crate::error::{RelayError, RelayResult};
use crate::messages::Role;

/// Events pushed by the task that reads an upstream streaming body
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamingToken {
    /// A text delta, in upstream emission order
    Token(String),
    /// The upstream sent its end marker
    Complete,
    /// The upstream failed; no further tokens follow
    Error(RelayError),
}

/// One entry of the upstream `messages` array
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamMessage {
    /// Author role
    pub role: Role,
    /// Message text
    pub content: String,
}

impl UpstreamMessage {
    /// Create a message
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// System instruction
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// User message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// A completion request as sent upstream
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CompletionRequest {
    /// Model identifier
    pub model: String,
    /// Ordered conversation, newest last
    pub messages: Vec<UpstreamMessage>,
    /// Whether the upstream should stream deltas
    pub stream: bool,
    /// Opaque correlation envelope
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl CompletionRequest {
    /// Create an empty streaming request for a model
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            stream: true,
            metadata: None,
        }
    }

    /// Append a message
    #[must_use]
    pub fn with_message(mut self, message: UpstreamMessage) -> Self {
        self.messages.push(message);
        self
    }

    /// Append several messages in order
    #[must_use]
    pub fn with_messages(mut self, messages: impl IntoIterator<Item = UpstreamMessage>) -> Self {
        self.messages.extend(messages);
        self
    }

    /// Set streaming mode
    #[must_use]
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Set the metadata envelope
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// The newest message, which the translator guarantees is the caller's turn
    #[must_use]
    pub fn last_message(&self) -> Option<&UpstreamMessage> {
        self.messages.last()
    }
}

/// Result of a non-streaming completion
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletionResponse {
    /// The response text
    pub content: String,
    /// Model that produced it
    pub model: String,
    /// Round-trip time in milliseconds
    pub duration_ms: Option<u64>,
}

/// Where to send completion requests and with which credential
#[derive(Clone, PartialEq, Eq)]
pub struct UpstreamEndpoint {
    /// Base URL, e.g. `https://api.example.dev/v1/embed`
    pub base_url: String,
    /// Bearer credential
    pub api_key: String,
}

impl UpstreamEndpoint {
    /// Create an endpoint
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Chat-completions URL under the base
    #[must_use]
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

impl fmt::Debug for UpstreamEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamEndpoint")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Upstream completion backend
///
/// Implementations own the transport details; the relay only sees deltas.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Issue a streaming request
    ///
    /// Resolves once the upstream accepted the request (2xx). The returned
    /// stream yields deltas until the end marker; dropping it abandons the
    /// upstream request.
    async fn send_streaming(&self, request: &CompletionRequest) -> RelayResult<DeltaStream>;

    /// Issue a request and wait for the complete response
    async fn send(&self, request: &CompletionRequest) -> RelayResult<CompletionResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = CompletionRequest::new("model-x")
            .with_message(UpstreamMessage::system("Be helpful"))
            .with_message(UpstreamMessage::user("Hello"))
            .with_stream(false)
            .with_metadata(serde_json::json!({"thesys": "{}"}));

        assert_eq!(request.model, "model-x");
        assert!(!request.stream);
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.last_message().unwrap().content, "Hello");
    }

    #[test]
    fn test_request_wire_shape() {
        let request = CompletionRequest::new("m").with_message(UpstreamMessage::user("hi"));
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "model": "m",
                "messages": [{"role": "user", "content": "hi"}],
                "stream": true
            })
        );
    }

    #[test]
    fn test_completions_url_and_redaction() {
        let endpoint = UpstreamEndpoint::new("https://api.example.dev/v1/embed/", "sk-secret");
        assert_eq!(
            endpoint.completions_url(),
            "https://api.example.dev/v1/embed/chat/completions"
        );
        assert!(!format!("{endpoint:?}").contains("sk-secret"));
    }
}
