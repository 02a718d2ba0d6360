//! Configuration for assetscope with multi-source loading.
//!
//! Merges settings from CLI args, environment variables, and an
//! `assetscope.toml` file in the project root.
//! Priority: CLI > Environment > File > Defaults

mod loading;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use thiserror::Error;

pub use loading::{CliOverrides, CONFIG_FILE_NAME, ENV_PREFIX};

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("Invalid value for `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// How references are allowed to match assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchPolicy {
    /// Exact path references and substring references both count.
    #[default]
    Dual,
    /// Only references resolved to an exact project path count.
    ExactOnly,
}

/// Settings for the compression service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// API key for the compression service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Base URL of the service.
    pub endpoint: String,
    /// Maximum number of requests in flight at once.
    pub concurrency: usize,
    /// Extra attempts for a retryable failure.
    pub max_retries: u32,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: "https://api.tinify.com".to_string(),
            concurrency: 4,
            max_retries: 2,
            timeout_secs: 60,
        }
    }
}

/// Top-level configuration, loaded from `assetscope.toml`, the environment and CLI args.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetScopeConfig {
    /// Asset directories, relative to the project root.
    pub asset_dirs: Vec<String>,
    /// File extensions treated as assets (lowercase, no dot).
    pub asset_extensions: Vec<String>,
    /// File extensions scanned for references (lowercase, no dot).
    pub source_extensions: Vec<String>,
    /// Directory names never descended into. Hidden directories are always skipped.
    pub skip_dirs: Vec<String>,
    /// Ignore references that only appear inside comments.
    pub strict: bool,
    /// Which reference match modes count toward usage.
    pub match_policy: MatchPolicy,
    /// Copy files aside before they are replaced or deleted.
    pub backup: bool,
    /// Backup directory, relative to the project root.
    pub backup_dir: PathBuf,
    /// Deletion manifest location, relative to the project root.
    pub manifest_path: PathBuf,
    pub compression: CompressionConfig,
}

impl Default for AssetScopeConfig {
    fn default() -> Self {
        Self {
            asset_dirs: vec!["assets".to_string()],
            asset_extensions: to_strings(&[
                "png", "jpg", "jpeg", "webp", "gif", "svg", "woff", "woff2", "ttf", "otf",
            ]),
            source_extensions: to_strings(&[
                "ts", "tsx", "mts", "cts", "js", "jsx", "mjs", "cjs", "css", "scss", "less",
                "html", "htm",
            ]),
            skip_dirs: to_strings(&[
                "node_modules",
                ".git",
                "dist",
                "build",
                "output",
                "__pycache__",
            ]),
            strict: false,
            match_policy: MatchPolicy::Dual,
            backup: false,
            backup_dir: PathBuf::from(".assetscope-backup"),
            manifest_path: PathBuf::from(".assetscope-manifest.json"),
            compression: CompressionConfig::default(),
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl AssetScopeConfig {
    /// Check that the merged configuration is usable.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.asset_extensions.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "asset_extensions",
                reason: "at least one extension is required".to_string(),
            });
        }
        if self.source_extensions.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "source_extensions",
                reason: "at least one extension is required".to_string(),
            });
        }
        if self.compression.concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "compression.concurrency",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.manifest_path.is_absolute() {
            return Err(ConfigError::InvalidValue {
                field: "manifest_path",
                reason: "must be relative to the project root".to_string(),
            });
        }
        if self.backup_dir.is_absolute() {
            return Err(ConfigError::InvalidValue {
                field: "backup_dir",
                reason: "must be relative to the project root".to_string(),
            });
        }
        Ok(())
    }

    /// Asset extensions, lowercased and stripped of any leading dot.
    pub fn asset_extension_set(&self) -> BTreeSet<String> {
        normalize_extensions(&self.asset_extensions)
    }

    /// Source extensions, lowercased and stripped of any leading dot.
    pub fn source_extension_set(&self) -> BTreeSet<String> {
        normalize_extensions(&self.source_extensions)
    }
}

fn normalize_extensions(exts: &[String]) -> BTreeSet<String> {
    exts.iter()
        .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}
