//! Lab configuration
//!
//! Resolved from, in increasing precedence:
//! 1. built-in defaults
//! 2. a JSON file at `$XDG_CONFIG_HOME/forensics-lab/config.json` (or platform
//!    equivalent), overridable via `FORENSICS_LAB_CONFIG`
//! 3. environment variables (`FORENSICS_API`, `FORGE_API_KEY`,
//!    `FORENSICS_LAB_TIMEOUT_SECS`, `FORENSICS_LAB_DATA_DIR`)
//! 4. command-line flags (applied by the binary)
//!
//! Example file:
//! {
//!   "api_host": "http://forge.lab.local:5000",
//!   "api_key": "s3cret",
//!   "timeout_secs": 60
//! }

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::tools::{ToolClient, DEFAULT_TIMEOUT};

pub const DEFAULT_API_HOST: &str = "http://localhost:5000";

const CONFIG_PATH_ENV: &str = "FORENSICS_LAB_CONFIG";
const API_HOST_ENV: &str = "FORENSICS_API";
const API_KEY_ENV: &str = "FORGE_API_KEY";
const TIMEOUT_ENV: &str = "FORENSICS_LAB_TIMEOUT_SECS";
const DATA_DIR_ENV: &str = "FORENSICS_LAB_DATA_DIR";

/// Config file contents; every field optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub api_host: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl std::str::FromStr for ConfigFile {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(content).context("Failed to parse lab config JSON")
    }
}

/// Effective configuration
#[derive(Clone, PartialEq)]
pub struct LabConfig {
    /// Forensics backend base URL
    pub api_host: String,
    /// Backend API key; required for uploads and tool runs
    pub api_key: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
    /// Where jobs, the session and the activity log are kept
    pub data_dir: PathBuf,
}

impl std::fmt::Debug for LabConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabConfig")
            .field("api_host", &self.api_host)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .field("data_dir", &self.data_dir)
            .finish()
    }
}

impl Default for LabConfig {
    fn default() -> Self {
        Self {
            api_host: DEFAULT_API_HOST.to_string(),
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
            data_dir: default_data_dir(),
        }
    }
}

impl LabConfig {
    /// Defaults, then the config file (if present), then the environment.
    pub fn load() -> Result<Self> {
        let mut config = Self::default();
        if let Some(file) = load_config_file()? {
            config.apply_file(file);
        }
        config.apply_env(|name| env::var(name).ok())?;
        Ok(config)
    }

    pub fn apply_file(&mut self, file: ConfigFile) {
        if let Some(host) = non_empty(file.api_host) {
            self.api_host = host;
        }
        if let Some(key) = non_empty(file.api_key) {
            self.api_key = Some(key);
        }
        if let Some(secs) = file.timeout_secs {
            self.timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(dir) = file.data_dir {
            self.data_dir = dir;
        }
    }

    /// Apply environment overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = non_empty(lookup(API_HOST_ENV)) {
            self.api_host = host;
        }
        if let Some(key) = non_empty(lookup(API_KEY_ENV)) {
            self.api_key = Some(key);
        }
        if let Some(raw) = non_empty(lookup(TIMEOUT_ENV)) {
            let secs: u64 = raw
                .parse()
                .with_context(|| format!("{} must be a number of seconds, got {:?}", TIMEOUT_ENV, raw))?;
            self.timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(dir) = non_empty(lookup(DATA_DIR_ENV)) {
            self.data_dir = PathBuf::from(dir);
        }
        Ok(())
    }

    /// Build a backend client. Fails if no API key is configured.
    pub fn tool_client(&self) -> Result<ToolClient> {
        let key = self.api_key.as_deref().ok_or_else(|| {
            anyhow!(
                "No API key configured; set {} or api_key in {}",
                API_KEY_ENV,
                config_file_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "the config file".to_string())
            )
        })?;
        Ok(ToolClient::new(&self.api_host, key, self.timeout))
    }

    pub fn activity_log_path(&self) -> PathBuf {
        self.data_dir.join("logs").join("activity.log")
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("forensics-lab"))
        .unwrap_or_else(|| PathBuf::from(".forensics-lab"))
}

/// Location of the config file, if one can be determined
pub fn config_file_path() -> Option<PathBuf> {
    if let Some(path) = non_empty(env::var(CONFIG_PATH_ENV).ok()) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|dir| dir.join("forensics-lab").join("config.json"))
}

pub fn load_config_file_from_path(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let content =
        fs::read_to_string(&path).with_context(|| format!("Failed to read {:?}", path.as_ref()))?;
    content.parse::<ConfigFile>()
}

/// Load the config file from its default location, if it exists.
pub fn load_config_file() -> Result<Option<ConfigFile>> {
    let path = match config_file_path() {
        Some(path) => path,
        None => return Ok(None),
    };
    if !path.exists() {
        return Ok(None);
    }
    load_config_file_from_path(&path).map(Some)
}
