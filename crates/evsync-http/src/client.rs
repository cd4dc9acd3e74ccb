//! Thin JSON-over-HTTP client

use crate::envelope::error_message;
use evsync_core::{SourceError, SourceErrorKind, SyncError};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Default collection endpoint; `{key}` is the case id
pub const DEFAULT_COLLECTION_PATH: &str = "/cases/{key}/evidence";

/// Default single-item endpoint; `{key}` is the item id
pub const DEFAULT_ITEM_PATH: &str = "/evidence/{key}";

/// Remote API settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    /// Base URL, e.g. `https://api.example.com/v1`
    pub base_url: String,
    /// Bearer token
    #[serde(default)]
    pub api_token: Option<String>,
    /// Per-request timeout; the client default when absent
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Collection endpoint template
    #[serde(default = "default_collection_path")]
    pub collection_path: String,
    /// Single-item endpoint template
    #[serde(default = "default_item_path")]
    pub item_path: String,
}

fn default_collection_path() -> String {
    DEFAULT_COLLECTION_PATH.to_string()
}

fn default_item_path() -> String {
    DEFAULT_ITEM_PATH.to_string()
}

impl ApiConfig {
    /// Config for a base URL with default paths
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_token: None,
            timeout_ms: None,
            collection_path: default_collection_path(),
            item_path: default_item_path(),
        }
    }

    /// Check required values
    ///
    /// # Errors
    /// - `SyncError::InvalidConfig` on an empty base URL, zero timeout, or a
    ///   path template without `{key}`
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.base_url.trim().is_empty() {
            return Err(SyncError::InvalidConfig("base_url is required".to_string()));
        }
        if self.timeout_ms == Some(0) {
            return Err(SyncError::InvalidConfig(
                "timeout_ms must be greater than zero".to_string(),
            ));
        }
        for (name, path) in [
            ("collection_path", &self.collection_path),
            ("item_path", &self.item_path),
        ] {
            if !path.contains("{key}") {
                return Err(SyncError::InvalidConfig(format!(
                    "{name} must contain {{key}}"
                )));
            }
        }
        Ok(())
    }
}

/// Map a reqwest failure onto the source error taxonomy
pub(crate) fn request_error(e: &reqwest::Error) -> SourceError {
    if e.is_decode() {
        SourceError::decode(e.to_string())
    } else {
        SourceError::new(
            SourceErrorKind::Transport,
            e.status().map(|s| s.as_u16()),
            e.to_string(),
        )
    }
}

/// JSON API client
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: Url,
    api_token: Option<String>,
    extra_headers: HeaderMap,
    http: reqwest::Client,
}

impl ApiClient {
    /// Create a client for `base_url`
    ///
    /// # Errors
    /// - `SyncError::InvalidConfig` if the URL is not an absolute http(s) URL
    pub fn new(base_url: &str) -> Result<Self, SyncError> {
        Self::build(base_url, None)
    }

    /// Create a client from config
    ///
    /// # Errors
    /// - `SyncError::InvalidConfig` on invalid settings
    pub fn from_config(config: &ApiConfig) -> Result<Self, SyncError> {
        config.validate()?;
        let mut client = Self::build(&config.base_url, config.timeout_ms.map(Duration::from_millis))?;
        client.api_token.clone_from(&config.api_token);
        Ok(client)
    }

    fn build(base_url: &str, timeout: Option<Duration>) -> Result<Self, SyncError> {
        let base_url = Url::parse(base_url.trim())
            .map_err(|e| SyncError::InvalidConfig(format!("invalid base_url: {e}")))?;
        if base_url.cannot_be_a_base() || !matches!(base_url.scheme(), "http" | "https") {
            return Err(SyncError::InvalidConfig(format!(
                "base_url must be an http(s) URL: {base_url}"
            )));
        }

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| SyncError::InvalidConfig(format!("http client: {e}")))?;

        Ok(Self {
            base_url,
            api_token: None,
            extra_headers: HeaderMap::new(),
            http,
        })
    }

    /// With bearer token
    #[must_use]
    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// With an extra header sent on every request
    ///
    /// # Errors
    /// - `SyncError::InvalidConfig` if the name or value is not a valid header
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, SyncError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| SyncError::InvalidConfig(format!("header name: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| SyncError::InvalidConfig(format!("header value: {e}")))?;
        self.extra_headers.insert(name, value);
        Ok(self)
    }

    /// Base URL
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve a path template against the base URL
    ///
    /// Every `{key}` is replaced by `key`, percent-encoded as one path segment.
    #[must_use]
    pub fn resolve(&self, template: &str, key: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty();
            for part in template.split('/').filter(|p| !p.is_empty()) {
                segments.push(&part.replace("{key}", key));
            }
        }
        url
    }

    fn headers(&self) -> Result<HeaderMap, SourceError> {
        let mut headers = self.extra_headers.clone();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(token) = self.api_token.as_deref() {
            let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| {
                SourceError::new(SourceErrorKind::Validation, None, e.to_string())
            })?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }

    async fn map_error(resp: Response) -> SourceError {
        let status = resp.status();
        let code = status.as_u16();
        let text = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|body| body.get("error").filter(|e| !e.is_null()).map(error_message))
            .unwrap_or(text);

        SourceError::new(
            SourceErrorKind::from_status(code),
            Some(code),
            if message.is_empty() {
                status.to_string()
            } else {
                message
            },
        )
    }

    /// GET `url` and decode the JSON body
    ///
    /// # Errors
    /// - Transport failures, non-2xx statuses and undecodable bodies, classified
    ///   by [`SourceErrorKind`]
    pub async fn get_json(&self, url: Url) -> Result<Value, SourceError> {
        tracing::debug!(%url, "GET");
        let resp = self
            .http
            .get(url)
            .headers(self.headers()?)
            .send()
            .await
            .map_err(|e| request_error(&e))?;

        if !resp.status().is_success() {
            return Err(Self::map_error(resp).await);
        }
        if resp.status() == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }
        resp.json::<Value>().await.map_err(|e| request_error(&e))
    }
}
