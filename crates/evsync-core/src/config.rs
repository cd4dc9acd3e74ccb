//! Synchronizer configuration

use crate::error::SyncError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default gap between the end of one fetch and the start of the next
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5000;

/// Polling options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncOptions {
    /// Minimum milliseconds between the end of one fetch and the start of the next
    pub poll_interval_ms: u64,
    /// Master switch; when false no polling session exists
    pub enabled: bool,
}

impl SyncOptions {
    /// Create default options
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With poll interval
    #[inline]
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With enabled flag
    #[inline]
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Poll interval as a duration
    #[inline]
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Reject values the synchronizer cannot run with
    ///
    /// # Errors
    /// - `SyncError::InvalidConfig` if the poll interval is zero
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.poll_interval_ms == 0 {
            return Err(SyncError::InvalidConfig(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse and validate options from a TOML table
    ///
    /// # Errors
    /// - `SyncError::Toml` on malformed input
    /// - `SyncError::InvalidConfig` on out-of-range values
    pub fn from_toml_str(s: &str) -> Result<Self, SyncError> {
        let options: Self = toml::from_str(s)?;
        options.validate()?;
        Ok(options)
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = SyncOptions::new();
        assert_eq!(options.poll_interval(), Duration::from_secs(5));
        assert!(options.enabled);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn builder() {
        let options = SyncOptions::new()
            .with_poll_interval(Duration::from_millis(250))
            .with_enabled(false);
        assert_eq!(options.poll_interval_ms, 250);
        assert!(!options.enabled);
    }

    #[test]
    fn toml_partial_uses_defaults() {
        let options = SyncOptions::from_toml_str("enabled = false").unwrap();
        assert_eq!(options.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert!(!options.enabled);
    }

    #[test]
    fn toml_rejects_zero_interval() {
        let err = SyncOptions::from_toml_str("poll_interval_ms = 0").unwrap_err();
        assert!(matches!(err, SyncError::InvalidConfig(_)));
    }

    #[test]
    fn toml_rejects_unknown_keys() {
        let err = SyncOptions::from_toml_str("interval = 10").unwrap_err();
        assert!(matches!(err, SyncError::Toml(_)));
    }
}
