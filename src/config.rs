use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

const CONFIG_FILE_NAME: &str = "gator.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_url")]
    pub db_url: String,
    /// Name of the active user; empty when nobody has logged in yet
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub aggregator: AggregatorConfig,
    #[serde(skip)]
    path: PathBuf,
}

fn default_db_url() -> String {
    "sqlite:gator.db?mode=rwc".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatorConfig {
    #[serde(default)]
    pub on_error: FailurePolicy,
    /// Re-query follows before every tick instead of keeping the startup snapshot
    #[serde(default)]
    pub refresh_follows: bool,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            on_error: FailurePolicy::default(),
            refresh_follows: false,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// What a tick does when one feed fails to fetch or persist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop the loop and return the error
    #[default]
    Abort,
    /// Log the failure and move on to the next feed
    Continue,
}

impl Config {
    /// `~/.config/gator.toml`
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("cannot determine home directory".to_string()))?;
        Ok(home.join(".config").join(CONFIG_FILE_NAME))
    }

    /// Load the config at `path`. A missing file yields the defaults, bound to
    /// `path` so the first `set_user` creates it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut config = match std::fs::read_to_string(path) {
            Ok(content) => Self::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::from_str("")?,
            Err(e) => return Err(e.into()),
        };
        config.path = path.to_path_buf();
        Ok(config)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    /// Switch the active user and persist the change.
    pub fn set_user(&mut self, username: &str) -> Result<()> {
        self.user = username.to_string();
        self.save()
    }
}
