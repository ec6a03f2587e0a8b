//! Artifact Documents
//!
//! Reports and slide decks produced by the artifact API. The document content
//! is structured markup owned by the upstream; it is stored and replaced
//! wholesale, never diffed or merged locally.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RelayError;
use crate::messages::ArtifactId;
use crate::prompts::{REPORT_SYSTEM_PROMPT, SLIDES_SYSTEM_PROMPT};

/// Kind of artifact the upstream should produce
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactType {
    /// Business report
    Report,
    /// Slide presentation
    #[default]
    Slides,
}

impl ArtifactType {
    /// Wire name sent in the upstream metadata
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Report => "report",
            Self::Slides => "slides",
        }
    }

    /// Instruction used when the caller does not supply one
    #[must_use]
    pub fn default_system_prompt(self) -> &'static str {
        match self {
            Self::Report => REPORT_SYSTEM_PROMPT,
            Self::Slides => SLIDES_SYSTEM_PROMPT,
        }
    }
}

impl fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactType {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "report" => Ok(Self::Report),
            "slides" => Ok(Self::Slides),
            other => Err(RelayError::validation(format!(
                "unknown artifact type '{other}' (expected report or slides)"
            ))),
        }
    }
}

/// A generated artifact
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDocument {
    id: ArtifactId,
    kind: ArtifactType,
    content: String,
}

impl ArtifactDocument {
    /// Start an empty document for a generate request
    #[must_use]
    pub fn new(id: ArtifactId, kind: ArtifactType) -> Self {
        Self {
            id,
            kind,
            content: String::new(),
        }
    }

    /// Correlation id shared by generate and every later edit
    #[must_use]
    pub fn id(&self) -> &ArtifactId {
        &self.id
    }

    /// Artifact kind
    #[must_use]
    pub fn kind(&self) -> ArtifactType {
        self.kind
    }

    /// Current markup
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Whether anything has been generated yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Replace the whole content (streamed snapshot or edit result)
    pub fn replace_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
    }
}
