//! Snapshots and change detection
//!
//! A [`Snapshot`] is the last-observed id → status mapping. It is only ever
//! replaced wholesale; [`diff`] compares it against a fresh fetch.

use crate::record::{RecordId, TrackableRecord};
use crate::status::RecordStatus;
use indexmap::IndexMap;

/// Last-observed status per record id, in fetch order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    statuses: IndexMap<RecordId, RecordStatus>,
}

impl Snapshot {
    /// Empty snapshot
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the statuses of a record list
    ///
    /// Duplicate ids keep the last occurrence.
    #[must_use]
    pub fn from_records(records: &[TrackableRecord]) -> Self {
        Self {
            statuses: records
                .iter()
                .map(|r| (r.id.clone(), r.status))
                .collect(),
        }
    }

    /// Status recorded for an id
    #[inline]
    #[must_use]
    pub fn get(&self, id: &RecordId) -> Option<RecordStatus> {
        self.statuses.get(id).copied()
    }

    /// Number of ids tracked
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    /// Check if nothing is tracked
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    /// Iterate ids and statuses in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&RecordId, RecordStatus)> {
        self.statuses.iter().map(|(id, status)| (id, *status))
    }
}

/// A record whose status moved between two snapshots
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    /// The freshly fetched record
    pub record: TrackableRecord,
    /// Status held in the previous snapshot
    pub previous: RecordStatus,
}

/// Detect status changes between a snapshot and a fresh fetch
///
/// One entry per fetched record whose id was already known with a different
/// status, in fetched order. Ids only in `fetched` (new arrivals) or only in
/// `previous` (removals) are not changes.
#[must_use]
pub fn diff(previous: &Snapshot, fetched: &[TrackableRecord]) -> Vec<StatusChange> {
    fetched
        .iter()
        .filter_map(|record| match previous.get(&record.id) {
            Some(prev) if prev != record.status => Some(StatusChange {
                record: record.clone(),
                previous: prev,
            }),
            _ => None,
        })
        .collect()
}

/// Structural identity of a record list for re-baselining
///
/// The `(id, status)` pairs, sorted. Two lists with the same ids and
/// statuses produce the same key regardless of allocation or order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ContentKey(Vec<(RecordId, RecordStatus)>);

impl ContentKey {
    /// Compute the key for a record list
    #[must_use]
    pub fn of(records: &[TrackableRecord]) -> Self {
        let mut pairs: Vec<_> = records.iter().map(|r| (r.id.clone(), r.status)).collect();
        pairs.sort_unstable();
        Self(pairs)
    }

    /// Sorted `(id, status)` pairs
    #[inline]
    #[must_use]
    pub fn pairs(&self) -> &[(RecordId, RecordStatus)] {
        &self.0
    }
}
