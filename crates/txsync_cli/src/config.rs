//! Configuration file support for txsync.
//!
//! Settings are loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (prefixed with `TXSYNC_`, tables separated by
//!    `__`, e.g. `TXSYNC_API__TOKEN`)
//! 3. Project file (`./txsync.toml`, `[api]` and `[sync]` tables)
//! 4. User file (`~/.config/txsync/config.toml`)
//! 5. Built-in defaults
//!
//! The same `txsync.toml` also holds the project manifest: a root `lang_map`
//! table and the `[[resources]]` array.
//!
//! Example:
//! ```toml
//! [api]
//! host = "https://rest.api.transifex.com"
//! token = "1/abc..."  # or use TXSYNC_API__TOKEN
//! rps = 10
//!
//! [sync]
//! workers = 5
//! poll_interval_ms = 1000
//!
//! [lang_map]
//! pt_BR = "pt-br"
//!
//! [[resources]]
//! organization_slug = "acme"
//! project_slug = "web"
//! resource_slug = "messages"
//! file_filter = "locale/<lang>/LC_MESSAGES/django.po"
//! source_file = "locale/en/LC_MESSAGES/django.po"
//! source_language = "en"
//! type = "PO"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config as ConfigBuilder, ConfigError, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::Deserialize;
use txsync::Manifest;

/// Name of the per-project file holding settings and the manifest.
pub const PROJECT_FILE: &str = "txsync.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    /// Default sync options.
    pub sync: SyncConfig,
}

/// API connection settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    /// API token. Can also be set via TXSYNC_API__TOKEN.
    pub token: Option<String>,
    /// Proactive request pacing, in requests per second.
    pub rps: u32,
    /// Whether to disable proactive rate limiting.
    pub no_rate_limit: bool,
    /// Per-request timeout.
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: txsync::DEFAULT_HOST.to_string(),
            token: None,
            rps: txsync::DEFAULT_RPS,
            no_rate_limit: false,
            timeout_secs: txsync::DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Default sync options.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Concurrent workers per phase.
    pub workers: usize,
    /// Delay between async job status checks.
    pub poll_interval_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            workers: txsync::sync::DEFAULT_WORKERS,
            poll_interval_ms: txsync::sync::DEFAULT_POLL_INTERVAL.as_millis() as u64,
        }
    }
}

impl Config {
    /// Load settings for a project rooted at `root`.
    ///
    /// A broken file is logged and ignored, leaving the defaults in place.
    pub fn load(root: &Path) -> Self {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = Self::default_config_path()
            && path.exists()
        {
            tracing::debug!("Loading config from {:?}", path);
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }

        let local_config = root.join(PROJECT_FILE);
        if local_config.exists() {
            tracing::debug!("Loading config from {:?}", local_config);
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        builder = builder.add_source(
            Environment::with_prefix("TXSYNC")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<Config>() {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to deserialize config: {}", e);
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to build config: {}", e);
                Config::default()
            }
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.sync.poll_interval_ms)
    }

    /// Get the user config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "txsync").map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

/// Read the project manifest from `<root>/txsync.toml`.
pub fn load_manifest(root: &Path) -> Result<Manifest, ConfigError> {
    let path = root.join(PROJECT_FILE);
    ConfigBuilder::builder()
        .add_source(File::from(path).format(FileFormat::Toml).required(true))
        .build()?
        .try_deserialize()
}
