//! Client Configuration
//!
//! # Environment Variables
//!
//! - `TUTOR_RELAY_URL`: relay daemon base URL (default `http://127.0.0.1:3000`)
//! - `TUTOR_STATE_DIR`: where the conversation and logs live
//!   (default `$XDG_DATA_HOME/tutor-relay`)
//! - `TUTOR_FPS`: display refresh rate for streamed text (default 30)
//! - `TUTOR_SCROLL_THRESHOLD`: rows from the bottom that still count as
//!   "at the bottom" for auto-scroll (default 3)

use std::path::PathBuf;
use std::time::Duration;

/// Default relay address
pub const DEFAULT_RELAY_URL: &str = "http://127.0.0.1:3000";

/// Default frame rate
pub const DEFAULT_FPS: u32 = 30;

/// Default auto-scroll threshold in terminal rows
pub const DEFAULT_SCROLL_THRESHOLD_ROWS: u32 = 3;

/// Client configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Relay daemon base URL
    pub relay_url: String,
    /// Directory for durable state and log files
    pub state_dir: PathBuf,
    /// Frames per second for publishing streamed text
    pub fps: u32,
    /// Auto-scroll proximity threshold, in rows
    pub scroll_threshold: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relay_url: DEFAULT_RELAY_URL.to_string(),
            state_dir: default_state_dir(),
            fps: DEFAULT_FPS,
            scroll_threshold: DEFAULT_SCROLL_THRESHOLD_ROWS,
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by environment variables
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden through a variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(url) = lookup("TUTOR_RELAY_URL").filter(|v| !v.trim().is_empty()) {
            config.relay_url = url.trim_end_matches('/').to_string();
        }
        if let Some(dir) = lookup("TUTOR_STATE_DIR").filter(|v| !v.trim().is_empty()) {
            config.state_dir = PathBuf::from(dir);
        }
        if let Some(fps) = lookup("TUTOR_FPS")
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|fps| (1..=240).contains(fps))
        {
            config.fps = fps;
        }
        if let Some(rows) = lookup("TUTOR_SCROLL_THRESHOLD").and_then(|v| v.parse::<u32>().ok()) {
            config.scroll_threshold = rows;
        }
        config
    }

    /// Interval between display frames
    #[must_use]
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.fps.max(1)))
    }
}

/// `$XDG_DATA_HOME/tutor-relay`, falling back to the working directory
#[must_use]
pub fn default_state_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("tutor-relay"))
        .unwrap_or_else(|| PathBuf::from(".tutor-relay"))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("TUTOR_RELAY_URL", "http://relay.local:8080/"),
            ("TUTOR_STATE_DIR", "/tmp/tutor"),
            ("TUTOR_FPS", "60"),
            ("TUTOR_SCROLL_THRESHOLD", "5"),
        ]);
        let config = ClientConfig::from_lookup(|k| env.get(k).map(|v| (*v).to_string()));

        assert_eq!(config.relay_url, "http://relay.local:8080");
        assert_eq!(config.state_dir, PathBuf::from("/tmp/tutor"));
        assert_eq!(config.fps, 60);
        assert_eq!(config.scroll_threshold, 5);
        assert_eq!(config.frame_interval(), Duration::from_millis(16));
    }

    #[test]
    fn test_bad_fps_keeps_default() {
        for raw in ["0", "fast", "1000"] {
            let config = ClientConfig::from_lookup(|k| (k == "TUTOR_FPS").then(|| raw.to_string()));
            assert_eq!(config.fps, DEFAULT_FPS);
        }
        assert_eq!(ClientConfig::default().frame_interval(), Duration::from_millis(33));
    }
}
