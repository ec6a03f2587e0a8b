//! Durable Conversation State
//!
//! One JSON file per client, named after the fixed storage key. Written after
//! every committed change, removed on reset.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use relay_core::PersistedState;

/// Storage key for the tutor conversation
pub const STORAGE_KEY: &str = "ai-tutor-chat-state";

/// File-backed store for [`PersistedState`]
#[derive(Clone, Debug)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Store under `dir`
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{STORAGE_KEY}.json")),
        }
    }

    /// Location of the state file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load saved state
    ///
    /// A missing, unreadable or malformed file all mean "no prior session".
    pub async fn load(&self) -> Option<PersistedState> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Could not read saved conversation");
                return None;
            }
        };

        match PersistedState::from_json(&raw) {
            Ok(state) => {
                debug!(path = %self.path.display(), messages = state.messages.len(), "Loaded conversation");
                Some(state)
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Discarding saved conversation");
                None
            }
        }
    }

    /// Overwrite the saved state
    pub async fn save(&self, state: &PersistedState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let json = state.to_json()?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }

    /// Remove the saved state
    pub async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to remove {}", self.path.display()))
            }
        }
    }
}
