//! Config file loading

use evsync_core::{SyncError, SyncOptions};
use evsync_http::ApiConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Contents of `evsync.toml`
///
/// ```toml
/// [api]
/// base_url = "https://api.example.com/v1"
/// collection_path = "/cases/{key}/evidence"
///
/// [sync]
/// poll_interval_ms = 3000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct EvsyncConfig {
    pub(crate) api: ApiConfig,
    #[serde(default)]
    pub(crate) sync: SyncOptions,
}

impl EvsyncConfig {
    pub(crate) fn new(api: ApiConfig) -> Self {
        Self {
            api,
            sync: SyncOptions::default(),
        }
    }

    pub(crate) fn from_toml_str(s: &str) -> Result<Self, SyncError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn load(path: &Path) -> Result<Self, SyncError> {
        let text = std::fs::read_to_string(path).map_err(|source| SyncError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub(crate) fn validate(&self) -> Result<(), SyncError> {
        self.api.validate()?;
        self.sync.validate()
    }
}
