//! HTTP-backed [`RecordSource`]

use crate::client::{ApiClient, ApiConfig, DEFAULT_COLLECTION_PATH, DEFAULT_ITEM_PATH};
use crate::envelope::{extract_records, unwrap_envelope};
use async_trait::async_trait;
use evsync_core::{CollectionKey, RecordSource, SourceError, SyncError, TrackableRecord};
use serde_json::Value;

/// What the collection key names
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// A case; the endpoint returns its evidence list
    Collection {
        /// Path template containing `{key}`
        path_template: String,
    },
    /// One evidence item
    Item {
        /// Path template containing `{key}`
        path_template: String,
    },
}

impl Scope {
    /// Collection scope with the default path
    #[must_use]
    pub fn collection() -> Self {
        Self::Collection {
            path_template: DEFAULT_COLLECTION_PATH.to_string(),
        }
    }

    /// Single-item scope with the default path
    #[must_use]
    pub fn item() -> Self {
        Self::Item {
            path_template: DEFAULT_ITEM_PATH.to_string(),
        }
    }

    /// Path template for this scope
    #[must_use]
    pub fn path_template(&self) -> &str {
        match self {
            Self::Collection { path_template } | Self::Item { path_template } => path_template,
        }
    }
}

/// Fetches records over HTTP and normalizes them
#[derive(Debug, Clone)]
pub struct HttpRecordSource {
    client: ApiClient,
    scope: Scope,
}

impl HttpRecordSource {
    /// Create a source
    #[must_use]
    pub fn new(client: ApiClient, scope: Scope) -> Self {
        Self { client, scope }
    }

    /// Collection source built from config
    ///
    /// # Errors
    /// - `SyncError::InvalidConfig` on invalid settings
    pub fn collection(config: &ApiConfig) -> Result<Self, SyncError> {
        Ok(Self::new(
            ApiClient::from_config(config)?,
            Scope::Collection {
                path_template: config.collection_path.clone(),
            },
        ))
    }

    /// Single-item source built from config
    ///
    /// # Errors
    /// - `SyncError::InvalidConfig` on invalid settings
    pub fn item(config: &ApiConfig) -> Result<Self, SyncError> {
        Ok(Self::new(
            ApiClient::from_config(config)?,
            Scope::Item {
                path_template: config.item_path.clone(),
            },
        ))
    }

    /// Scope of this source
    #[must_use]
    pub fn scope(&self) -> &Scope {
        &self.scope
    }
}

#[async_trait]
impl RecordSource for HttpRecordSource {
    async fn fetch(&self, key: &CollectionKey) -> Result<Vec<TrackableRecord>, SourceError> {
        let url = self.client.resolve(self.scope.path_template(), key.as_str());
        let data = unwrap_envelope(self.client.get_json(url).await?)?;

        let raw = match (&self.scope, data) {
            (Scope::Collection { .. }, data) => extract_records(data)?,
            (Scope::Item { .. }, Value::Null) => Vec::new(),
            (Scope::Item { .. }, Value::Array(items)) => items,
            (Scope::Item { .. }, item @ Value::Object(_)) => vec![item],
            (Scope::Item { .. }, other) => {
                return Err(SourceError::decode(format!("expected object, got {other}")))
            }
        };

        let records = TrackableRecord::from_wire_batch(raw);
        tracing::debug!(%key, count = records.len(), "fetched records");
        Ok(records)
    }
}
