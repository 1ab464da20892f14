//! Configuration module for Drive Uploadr
//!
//! Handles loading and parsing of YAML configuration files with support for
//! environment variable expansion and validation.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

/// Fragment size unit imposed by the remote upload-session protocol.
///
/// Every fragment except the last must be a multiple of this value.
pub const FRAGMENT_UNIT: u64 = 327_680;

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand environment variables in a string.
///
/// Supports two syntaxes:
/// - `${VAR_NAME}` - Simple expansion, keeps placeholder if var not found
/// - `${VAR_NAME:-default}` - Expansion with default value
///
/// Variable names must start with a letter or underscore and contain only
/// uppercase letters, digits, and underscores.
pub(crate) fn expand_env_vars(s: &str) -> String {
    let re = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}")
        .expect("static regex is valid");
    let mut last_match = 0;
    let mut result = String::with_capacity(s.len());

    for cap in re.captures_iter(s) {
        let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
            continue;
        };

        result.push_str(&s[last_match..full_match.start()]);

        let value = match std::env::var(var_name.as_str()) {
            Ok(val) => val,
            Err(_) => match cap.get(2) {
                Some(default) => default.as_str().to_string(),
                // No env var and no default. Leave the placeholder as written.
                None => full_match.as_str().to_string(),
            },
        };
        result.push_str(&value);

        last_match = full_match.end();
    }

    result.push_str(&s[last_match..]);
    result
}

// ============================================================================
// Validation Helpers
// ============================================================================

/// Validate that a URL starts with http:// or https://
fn is_valid_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub drive: DriveConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

impl Config {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_http_url(&self.drive.api_base) {
            return Err(ConfigError::ValidationError(
                "Invalid api_base: must start with http:// or https://".into(),
            ));
        }

        if self.drive.root.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Drive root reference cannot be empty".into(),
            ));
        }

        let group = self.upload.fragment_group_size;
        if group == 0 || group % FRAGMENT_UNIT != 0 {
            return Err(ConfigError::ValidationError(format!(
                "Invalid fragment_group_size {}: must be a positive multiple of {}",
                group, FRAGMENT_UNIT
            )));
        }

        if self.upload.preload_chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "preload_chunk_size must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}

/// Remote drive connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveConfig {
    /// Base URL of the Graph-style API, e.g. `https://graph.microsoft.com/v1.0`
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// API reference of the item every relative path resolves under,
    /// e.g. `/me/drive/root` or `/drives/{id}/items/{id}`
    pub root: String,

    /// Bearer token. When absent the token is read from `DRIVE_ACCESS_TOKEN`.
    #[serde(default)]
    pub access_token: Option<String>,

    /// Whether handles opened through this drive may write
    #[serde(default)]
    pub writeable: bool,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_api_base() -> String {
    "https://graph.microsoft.com/v1.0".to_string()
}

fn default_timeout_seconds() -> u64 {
    300
}

/// What to do when the append preload read fails with a status other than 404
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreloadFailure {
    /// Surface the failure from `open`
    #[default]
    Fail,
    /// Log a warning and continue with an empty buffer
    Ignore,
}

/// Upload engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_fragment_group_size")]
    pub fragment_group_size: u64,
    #[serde(default = "default_preload_chunk_size")]
    pub preload_chunk_size: usize,
    #[serde(default)]
    pub preload_failure: PreloadFailure,
    #[serde(default)]
    pub staging_dir: Option<PathBuf>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            fragment_group_size: default_fragment_group_size(),
            preload_chunk_size: default_preload_chunk_size(),
            preload_failure: PreloadFailure::default(),
            staging_dir: None,
        }
    }
}

fn default_fragment_group_size() -> u64 {
    FRAGMENT_UNIT * 25 // 8,192,000 bytes
}

fn default_preload_chunk_size() -> usize {
    8192
}
