//! Artifact Session
//!
//! Client side of report and slide generation. A generate streams the markup
//! into a fresh [`ArtifactDocument`]; edits replace its content wholesale. If
//! either fails the previous document is kept as it was.

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use relay_core::{ArtifactDocument, ArtifactId, ArtifactType, RelayError, RelayResult};

use crate::client::RelayClient;
use crate::consumer::{consume, ConsumeOutcome};
use crate::scheduler::PublishScheduler;

/// Fallback file stem for exports without a usable title
pub const DEFAULT_EXPORT_STEM: &str = "artifact";

/// File name for an exported PDF
///
/// Trims the title, drops a trailing `.pdf` in any case, replaces path
/// separators and appends exactly one `.pdf`.
#[must_use]
pub fn pdf_filename(title: &str) -> String {
    let trimmed = title.trim();
    let suffix_at = trimmed.len().saturating_sub(4);
    let stem = match trimmed.get(suffix_at..) {
        Some(suffix) if suffix.eq_ignore_ascii_case(".pdf") => &trimmed[..suffix_at],
        _ => trimmed,
    };
    let stem: String = stem
        .trim()
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect();
    if stem.is_empty() {
        format!("{DEFAULT_EXPORT_STEM}.pdf")
    } else {
        format!("{stem}.pdf")
    }
}

/// The artifact being worked on
#[derive(Debug)]
pub struct ArtifactSession {
    client: RelayClient,
    document: Option<ArtifactDocument>,
}

impl ArtifactSession {
    /// Session with no artifact yet
    #[must_use]
    pub fn new(client: RelayClient) -> Self {
        Self {
            client,
            document: None,
        }
    }

    /// Current artifact
    #[must_use]
    pub fn document(&self) -> Option<&ArtifactDocument> {
        self.document.as_ref()
    }

    /// Generate a new artifact, streaming snapshots into `scheduler`
    ///
    /// The id comes from the relay's correlation header. On success the new
    /// document replaces the current one; on failure or cancellation the
    /// current one is untouched.
    pub async fn generate(
        &mut self,
        prompt: &str,
        kind: ArtifactType,
        scheduler: &PublishScheduler,
        cancel: &CancellationToken,
    ) -> RelayResult<Option<&ArtifactDocument>> {
        let requested = ArtifactId::new();
        let request = self.client.generate_artifact(prompt, kind, Some(&requested));
        let body = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(None),
            body = request => body.inspect_err(|e| warn!(error = %e, "Artifact generation failed"))?,
        };
        let id = body
            .correlation_id
            .map_or(requested, ArtifactId::from);

        let outcome = consume(body.stream, scheduler, cancel)
            .await
            .inspect_err(|e| warn!(artifact_id = %id, error = %e, "Artifact stream failed"))?;

        match outcome {
            ConsumeOutcome::Completed(content) => {
                info!(artifact_id = %id, artifact_type = %kind, bytes = content.len(), "Artifact generated");
                let mut document = ArtifactDocument::new(id, kind);
                document.replace_content(content);
                Ok(Some(&*self.document.insert(document)))
            }
            ConsumeOutcome::Cancelled(_) => Ok(None),
        }
    }

    /// Apply an edit instruction to the current artifact
    pub async fn edit(&mut self, instruction: &str) -> RelayResult<&ArtifactDocument> {
        let document = self
            .document
            .as_mut()
            .filter(|doc| !doc.is_empty())
            .ok_or_else(|| RelayError::validation("there is no artifact to edit"))?;

        let content = self
            .client
            .edit_artifact(document.content(), instruction, document.kind(), document.id())
            .await
            .inspect_err(|e| warn!(artifact_id = %document.id(), error = %e, "Artifact edit failed"))?;

        info!(artifact_id = %document.id(), bytes = content.len(), "Artifact edited");
        document.replace_content(content);
        Ok(document)
    }

    /// Export to PDF under `dir`, naming the file after `title`
    pub async fn export_pdf(
        &self,
        export_params: &serde_json::Value,
        title: &str,
        dir: &Path,
    ) -> RelayResult<PathBuf> {
        let bytes = self.client.export_pdf(export_params).await?;
        let path = dir.join(pdf_filename(title));
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| RelayError::ExportFailed(format!("{}: {e}", path.display())))?;
        info!(path = %path.display(), bytes = bytes.len(), "PDF saved");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_pdf_filename() {
        assert_eq!(pdf_filename("Q4 Trends"), "Q4 Trends.pdf");
        assert_eq!(pdf_filename("  deck.PDF "), "deck.pdf");
        assert_eq!(pdf_filename("a/b\\c"), "a_b_c.pdf");
        assert_eq!(pdf_filename("   "), "artifact.pdf");
        assert_eq!(pdf_filename(".pdf"), "artifact.pdf");
    }

    #[tokio::test]
    async fn test_edit_without_artifact_is_refused() {
        let mut session = ArtifactSession::new(RelayClient::new("http://127.0.0.1:9"));
        let err = session.edit("shorter").await.unwrap_err();
        assert!(matches!(err, RelayError::Validation(_)));
    }
}
