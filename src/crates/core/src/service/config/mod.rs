//! Client configuration
//!
//! Layering: built-in defaults, then the TOML file, then environment
//! variables. Front ends apply their own flags on top and call
//! [`ClientConfig::validate`].

use crate::util::errors::{TabbyError, TabbyResult};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_BASE_URL: &str = "TABBY_BASE_URL";
pub const ENV_IDLE_TIMEOUT_SECS: &str = "TABBY_IDLE_TIMEOUT_SECS";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "TABBY_REQUEST_TIMEOUT_SECS";

const CONFIG_DIR_NAME: &str = "tabby";
const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Backend origin, e.g. `http://localhost:80`.
    pub base_url: String,
    pub session_path: String,
    pub stream_path: String,
    /// Legacy non-streaming endpoint.
    pub chat_path: String,
    pub connect_timeout_secs: u64,
    /// Whole-request limit for the session and non-streaming chat calls.
    pub request_timeout_secs: u64,
    /// Maximum silence between two body chunks before the stream is
    /// considered dead.
    pub idle_timeout_secs: u64,
    /// Scroll the view on intermediate records, not only on the final one.
    pub scroll_on_progress: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:80".to_string(),
            session_path: "/session".to_string(),
            stream_path: "/chat/stream".to_string(),
            chat_path: "/chat".to_string(),
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            idle_timeout_secs: 600,
            scroll_on_progress: true,
        }
    }
}

impl ClientConfig {
    /// `<config_dir>/tabby/config.toml`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Loads the file layer and the environment layer.
    ///
    /// An explicit `path` must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> TabbyResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => {
                    debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };
        config.apply_env_from(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> TabbyResult<Self> {
        debug!("Loading config: path={}", path.display());
        let content = std::fs::read_to_string(path).map_err(|e| {
            TabbyError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> TabbyResult<Self> {
        toml::from_str(content).map_err(|e| TabbyError::config(format!("Invalid config: {}", e)))
    }

    /// Applies environment overrides read through `lookup`.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> TabbyResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(base_url) = lookup(ENV_BASE_URL) {
            if base_url.trim().is_empty() {
                warn!("{} is set but empty, ignoring", ENV_BASE_URL);
            } else {
                self.base_url = base_url.trim().to_string();
            }
        }
        if let Some(raw) = lookup(ENV_IDLE_TIMEOUT_SECS) {
            self.idle_timeout_secs = parse_secs(ENV_IDLE_TIMEOUT_SECS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT_SECS) {
            self.request_timeout_secs = parse_secs(ENV_REQUEST_TIMEOUT_SECS, &raw)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> TabbyResult<()> {
        let base_url = self.base_url.trim();
        if base_url.is_empty() {
            return Err(TabbyError::config("base_url must not be empty"));
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(TabbyError::config(format!(
                "base_url must start with http:// or https://, got '{}'",
                base_url
            )));
        }
        for (name, path) in [
            ("session_path", &self.session_path),
            ("stream_path", &self.stream_path),
            ("chat_path", &self.chat_path),
        ] {
            if !path.starts_with('/') {
                return Err(TabbyError::config(format!(
                    "{} must start with '/', got '{}'",
                    name, path
                )));
            }
        }
        if self.connect_timeout_secs == 0
            || self.request_timeout_secs == 0
            || self.idle_timeout_secs == 0
        {
            return Err(TabbyError::config("timeouts must be greater than zero"));
        }
        Ok(())
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim().trim_end_matches('/'), path)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_secs(key: &str, raw: &str) -> TabbyResult<u64> {
    raw.trim().parse().map_err(|_| {
        TabbyError::config(format!(
            "{} must be a number of seconds, got '{}'",
            key, raw
        ))
    })
}
