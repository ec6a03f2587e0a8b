//! Request Translator
//!
//! Maps an inbound turn (or edit instruction) plus its identifiers into an
//! upstream [`CompletionRequest`]. Input is validated here, before any network
//! call is made, so an empty prompt never reaches the upstream.
//!
//! The upstream is stateless between calls: every chat request carries the
//! system instruction once, followed by the whole thread history and the new
//! user turn.

use serde_json::json;

use crate::artifact::ArtifactType;
use crate::backend::{CompletionRequest, UpstreamMessage};
use crate::config::RelayConfig;
use crate::error::{RelayError, RelayResult};
use crate::messages::{ArtifactId, ResponseId, Role, ThreadId, Turn};

/// Reject empty or whitespace-only text
pub fn validate_content(field: &str, content: &str) -> RelayResult<()> {
    if content.trim().is_empty() {
        return Err(RelayError::validation(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Opaque correlation envelope understood by the provider
///
/// The provider expects a JSON document serialized into a string under the
/// `thesys` key.
fn envelope(fields: serde_json::Value) -> serde_json::Value {
    json!({ "thesys": fields.to_string() })
}

/// Builds upstream requests from relay inputs
#[derive(Clone, Copy, Debug)]
pub struct RequestTranslator<'a> {
    config: &'a RelayConfig,
}

impl<'a> RequestTranslator<'a> {
    /// Create a translator over a configuration
    #[must_use]
    pub fn new(config: &'a RelayConfig) -> Self {
        Self { config }
    }

    /// Tutor chat turn
    ///
    /// `history` is the thread so far (without system messages); the prompt
    /// turn must come from the user.
    pub fn chat(
        &self,
        prompt: &Turn,
        history: &[UpstreamMessage],
        thread_id: &ThreadId,
        response_id: &ResponseId,
    ) -> RelayResult<CompletionRequest> {
        validate_content("prompt", prompt.content())?;
        if prompt.role() != Role::User {
            return Err(RelayError::validation(format!(
                "prompt role must be user, got {}",
                prompt.role().as_str()
            )));
        }

        Ok(CompletionRequest::new(&self.config.chat_model)
            .with_message(UpstreamMessage::system(self.config.tutor_system_prompt()))
            .with_messages(
                history
                    .iter()
                    .filter(|m| m.role != Role::System)
                    .cloned(),
            )
            .with_message(UpstreamMessage::user(prompt.content()))
            .with_stream(true)
            .with_metadata(envelope(json!({
                "thread_id": thread_id.as_str(),
                "response_id": response_id.as_str(),
            }))))
    }

    /// Generate a new artifact
    pub fn artifact_generate(
        &self,
        prompt: &str,
        kind: ArtifactType,
        system_prompt: Option<&str>,
        artifact_id: &ArtifactId,
    ) -> RelayResult<CompletionRequest> {
        validate_content("prompt", prompt)?;
        let system = system_prompt
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| kind.default_system_prompt());

        Ok(CompletionRequest::new(&self.config.artifact_model)
            .with_message(UpstreamMessage::system(system))
            .with_message(UpstreamMessage::user(prompt))
            .with_stream(true)
            .with_metadata(artifact_envelope(kind, artifact_id)))
    }

    /// Edit an existing artifact; the upstream returns the full new content
    pub fn artifact_edit(
        &self,
        existing_content: &str,
        instruction: &str,
        kind: ArtifactType,
        artifact_id: &ArtifactId,
    ) -> RelayResult<CompletionRequest> {
        validate_content("existingContent", existing_content)?;
        validate_content("editPrompt", instruction)?;

        Ok(CompletionRequest::new(&self.config.artifact_model)
            .with_message(UpstreamMessage::assistant(existing_content))
            .with_message(UpstreamMessage::user(instruction))
            .with_stream(false)
            .with_metadata(artifact_envelope(kind, artifact_id)))
    }
}

fn artifact_envelope(kind: ArtifactType, artifact_id: &ArtifactId) -> serde_json::Value {
    envelope(json!({
        "c1_artifact_type": kind.as_str(),
        "id": artifact_id.as_str(),
    }))
}
