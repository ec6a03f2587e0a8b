//! Relay Configuration
//!
//! Configuration is layered: built-in defaults, then an optional TOML file,
//! then environment variables. The daemon applies CLI flags on top.
//!
//! # Environment Variables
//!
//! - `RELAY_LISTEN`: listen address (default `127.0.0.1:3000`)
//! - `RELAY_CHAT_BASE_URL` / `RELAY_CHAT_MODEL`: tutor chat upstream
//! - `RELAY_ARTIFACT_BASE_URL` / `RELAY_ARTIFACT_MODEL`: artifact upstream
//! - `RELAY_PDF_EXPORT_URL`: PDF export endpoint
//! - `RELAY_API_KEY_ENV`: name of the variable holding the credential
//! - `RELAY_SYSTEM_PROMPT`: inline tutor system prompt
//! - `RELAY_CONNECT_TIMEOUT_SECS`: upstream connect timeout
//! - `RELAY_MAX_THREAD_MESSAGES`: per-thread history cap (0 = unlimited)
//! - `RELAY_MAX_THREADS`: threads remembered before the least recently used is dropped (0 = unlimited)
//!
//! The credential itself (`THESYS_API_KEY` by default) is never stored here.
//! It is read from the environment each time a request is translated.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backend::UpstreamEndpoint;
use crate::error::{RelayError, RelayResult};
use crate::prompts::TUTOR_SYSTEM_PROMPT;

/// Default variable holding the upstream API key
pub const DEFAULT_API_KEY_ENV: &str = "THESYS_API_KEY";

/// Relay configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Address the HTTP surface binds to
    pub listen_addr: String,
    /// Base URL of the chat completion API used by the tutor
    pub chat_base_url: String,
    /// Model identifier for tutor chat
    pub chat_model: String,
    /// Base URL of the artifact completion API
    pub artifact_base_url: String,
    /// Model identifier for artifact generation and edits
    pub artifact_model: String,
    /// Full URL of the PDF export endpoint
    pub pdf_export_url: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Inline tutor system prompt (None = built-in prompt)
    pub system_prompt: Option<String>,
    /// File to read the tutor system prompt from
    pub system_prompt_file: Option<PathBuf>,
    /// Upstream connect timeout in seconds
    pub connect_timeout_secs: u64,
    /// Maximum upstream messages remembered per chat thread (0 = unlimited)
    pub max_thread_messages: usize,
    /// Maximum chat threads remembered (0 = unlimited)
    pub max_threads: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:3000".to_string(),
            chat_base_url: "https://api.thesys.dev/v1/embed".to_string(),
            chat_model: "c1/anthropic/claude-sonnet-4/v-20250815".to_string(),
            artifact_base_url: "https://api.thesys.dev/v1/artifact".to_string(),
            artifact_model: "c1/artifact/v-20251030".to_string(),
            pdf_export_url: "https://api.thesys.dev/v1/artifact/pdf/export".to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            system_prompt: None,
            system_prompt_file: None,
            connect_timeout_secs: 10,
            max_thread_messages: 100,
            max_threads: 1000,
        }
    }
}

impl RelayConfig {
    /// Defaults overridden by environment variables
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_with(|key| std::env::var(key).ok());
        config
    }

    /// Load configuration: defaults, then the TOML file, then the environment
    ///
    /// With `path = None` the default location is used if it exists. An
    /// explicit path that cannot be read is an error.
    pub fn load(path: Option<&Path>) -> RelayResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_toml_file(path)?,
            None => match default_config_path() {
                Some(default) if default.exists() => Self::from_toml_file(&default)?,
                _ => Self::default(),
            },
        };
        config.apply_env_with(|key| std::env::var(key).ok());
        config.resolve_system_prompt_file()?;
        Ok(config)
    }

    /// Parse a TOML file; missing keys keep their defaults
    pub fn from_toml_file(path: &Path) -> RelayResult<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            RelayError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Parse TOML text; missing keys keep their defaults
    pub fn from_toml_str(raw: &str) -> RelayResult<Self> {
        toml::from_str(raw).map_err(|e| RelayError::Config(format!("invalid config: {e}")))
    }

    /// Apply overrides from a variable lookup (the environment in production)
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let set = |target: &mut String, key: &str| {
            if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
                *target = value;
            }
        };
        set(&mut self.listen_addr, "RELAY_LISTEN");
        set(&mut self.chat_base_url, "RELAY_CHAT_BASE_URL");
        set(&mut self.chat_model, "RELAY_CHAT_MODEL");
        set(&mut self.artifact_base_url, "RELAY_ARTIFACT_BASE_URL");
        set(&mut self.artifact_model, "RELAY_ARTIFACT_MODEL");
        set(&mut self.pdf_export_url, "RELAY_PDF_EXPORT_URL");
        set(&mut self.api_key_env, "RELAY_API_KEY_ENV");

        if let Some(prompt) = lookup("RELAY_SYSTEM_PROMPT").filter(|v| !v.trim().is_empty()) {
            self.system_prompt = Some(prompt);
        }
        if let Some(secs) = lookup("RELAY_CONNECT_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.connect_timeout_secs = secs;
        }
        if let Some(max) = lookup("RELAY_MAX_THREAD_MESSAGES").and_then(|v| v.parse().ok()) {
            self.max_thread_messages = max;
        }
        if let Some(max) = lookup("RELAY_MAX_THREADS").and_then(|v| v.parse().ok()) {
            self.max_threads = max;
        }
    }

    fn resolve_system_prompt_file(&mut self) -> RelayResult<()> {
        if self.system_prompt.is_some() {
            return Ok(());
        }
        if let Some(ref path) = self.system_prompt_file {
            let prompt = fs::read_to_string(path).map_err(|e| {
                RelayError::Config(format!("cannot read system prompt {}: {e}", path.display()))
            })?;
            self.system_prompt = Some(prompt);
        }
        Ok(())
    }

    /// The tutor system instruction prepended to every chat request
    #[must_use]
    pub fn tutor_system_prompt(&self) -> &str {
        self.system_prompt.as_deref().unwrap_or(TUTOR_SYSTEM_PROMPT)
    }

    /// Upstream connect timeout
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Read the API key from the environment
    pub fn read_api_key(&self) -> RelayResult<String> {
        self.read_api_key_with(|key| std::env::var(key).ok())
    }

    /// Read the API key through a lookup function
    pub fn read_api_key_with(&self, lookup: impl Fn(&str) -> Option<String>) -> RelayResult<String> {
        lookup(&self.api_key_env)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| RelayError::Config(format!("{} is not set", self.api_key_env)))
    }

    /// Endpoint for tutor chat, with the credential read now
    pub fn chat_endpoint(&self) -> RelayResult<UpstreamEndpoint> {
        Ok(UpstreamEndpoint::new(
            self.chat_base_url.clone(),
            self.read_api_key()?,
        ))
    }

    /// Endpoint for artifact generation and edits, with the credential read now
    pub fn artifact_endpoint(&self) -> RelayResult<UpstreamEndpoint> {
        Ok(UpstreamEndpoint::new(
            self.artifact_base_url.clone(),
            self.read_api_key()?,
        ))
    }
}

/// Default config file location: `$XDG_CONFIG_HOME/tutor-relay/relay.toml`
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tutor-relay").join("relay.toml"))
}
