//! Trackable records
//!
//! A [`TrackableRecord`] is the synchronizer's view of one evidence item: an id,
//! a normalized status, and whatever else the backend sent, carried verbatim.

use crate::status::RecordStatus;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Wire keys tried, in order, for the record id
const ID_KEYS: [&str; 3] = ["id", "evidence_id", "uuid"];

/// Wire keys tried, in order, for the record status
const STATUS_KEYS: [&str; 3] = ["status", "processing_status", "state"];

/// Opaque record identifier, unique within its collection
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    /// Create a record id
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow as str
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A status-bearing record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackableRecord {
    /// Stable identifier
    pub id: RecordId,
    /// Normalized status
    pub status: RecordStatus,
    /// Remaining domain fields (filename, summary, tags, ...), uninterpreted
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl TrackableRecord {
    /// Create a record with no extra fields
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<RecordId>, status: RecordStatus) -> Self {
        Self {
            id: id.into(),
            status,
            fields: Map::new(),
        }
    }

    /// With an extra domain field
    #[inline]
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Look up an extra domain field
    #[inline]
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Normalize one raw record from the backend
    ///
    /// Returns `None` when no usable id is present. A missing, non-string or
    /// unrecognized status degrades to [`RecordStatus::DEFAULT`].
    #[must_use]
    pub fn from_wire(value: Value) -> Option<Self> {
        let Value::Object(mut fields) = value else {
            tracing::warn!("skipping non-object record");
            return None;
        };

        let id = ID_KEYS.iter().find_map(|key| match fields.get(*key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(RecordId::new(s.clone())),
            Some(Value::Number(n)) => Some(RecordId::new(n.to_string())),
            _ => None,
        });
        let Some(id) = id else {
            tracing::warn!("skipping record without id");
            return None;
        };

        let status = STATUS_KEYS
            .iter()
            .find_map(|key| fields.get(*key).and_then(Value::as_str))
            .map_or(RecordStatus::DEFAULT, RecordStatus::normalize);

        fields.remove("id");
        fields.remove("status");

        Some(Self { id, status, fields })
    }

    /// Normalize a batch, skipping records that cannot be identified
    #[must_use]
    pub fn from_wire_batch(values: Vec<Value>) -> Vec<Self> {
        let total = values.len();
        let records: Vec<Self> = values.into_iter().filter_map(Self::from_wire).collect();
        if records.len() < total {
            tracing::warn!(
                skipped = total - records.len(),
                total,
                "dropped unidentifiable records from batch"
            );
        }
        records
    }
}

/// Check whether any record still needs polling
#[inline]
#[must_use]
pub fn has_non_terminal(records: &[TrackableRecord]) -> bool {
    records.iter().any(|r| !r.status.is_terminal())
}

/// Per-status counts for a record list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    /// Records queued
    pub queued: usize,
    /// Records uploading
    pub uploading: usize,
    /// Records processing
    pub processing: usize,
    /// Records completed
    pub completed: usize,
    /// Records failed
    pub failed: usize,
    /// Records needing review
    pub needs_review: usize,
}

impl StatusSummary {
    /// Count statuses in a record list
    #[must_use]
    pub fn from_records(records: &[TrackableRecord]) -> Self {
        records.iter().fold(Self::default(), |mut acc, r| {
            match r.status {
                RecordStatus::Queued => acc.queued += 1,
                RecordStatus::Uploading => acc.uploading += 1,
                RecordStatus::Processing => acc.processing += 1,
                RecordStatus::Completed => acc.completed += 1,
                RecordStatus::Failed => acc.failed += 1,
                RecordStatus::NeedsReview => acc.needs_review += 1,
            }
            acc
        })
    }

    /// Records still in flight
    #[inline]
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queued + self.uploading + self.processing
    }

    /// Records settled
    #[inline]
    #[must_use]
    pub fn settled(&self) -> usize {
        self.completed + self.failed + self.needs_review
    }

    /// Total records counted
    #[inline]
    #[must_use]
    pub fn total(&self) -> usize {
        self.pending() + self.settled()
    }
}

impl std::fmt::Display for StatusSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} pending, {} completed, {} failed, {} needs review",
            self.pending(),
            self.completed,
            self.failed,
            self.needs_review
        )
    }
}
