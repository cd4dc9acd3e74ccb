//! The remote read seam
//!
//! The synchronizer never talks HTTP itself; it asks a [`RecordSource`] for
//! the current collection and gets back already-normalized records.

use crate::error::SourceError;
use crate::record::TrackableRecord;
use async_trait::async_trait;
use std::sync::Arc;

/// Identifies the remote collection (a case id) or single item to poll
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionKey(String);

impl CollectionKey {
    /// Create a key, rejecting empty or whitespace-only input
    #[must_use]
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            None
        } else {
            Some(Self(key))
        }
    }

    /// Borrow as str
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Read access to the authoritative record list
///
/// Implementations normalize whatever the backend returns; a record with an
/// unknown status is degraded, not dropped. A single-item source returns a
/// one-element list.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordSource: Send + Sync + 'static {
    /// Fetch the current records for `key`
    async fn fetch(&self, key: &CollectionKey) -> Result<Vec<TrackableRecord>, SourceError>;
}

#[async_trait]
impl<S: RecordSource + ?Sized> RecordSource for Arc<S> {
    async fn fetch(&self, key: &CollectionKey) -> Result<Vec<TrackableRecord>, SourceError> {
        (**self).fetch(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_keys_are_rejected() {
        assert!(CollectionKey::new("").is_none());
        assert!(CollectionKey::new("   ").is_none());
        assert_eq!(CollectionKey::new("case-1").unwrap().as_str(), "case-1");
    }
}
