//! Testing utilities for evsync workspace
//!
//! Shared test helpers, fixtures, and a scripted record source.

#![allow(missing_docs)]

use async_trait::async_trait;
use evsync_core::{CollectionKey, RecordId, RecordSource, RecordStatus, SourceError, TrackableRecord};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

pub type FetchResult = Result<Vec<TrackableRecord>, SourceError>;

pub fn record(id: &str, status: RecordStatus) -> TrackableRecord {
    TrackableRecord::new(id, status)
}

pub fn records(items: &[(&str, RecordStatus)]) -> Vec<TrackableRecord> {
    items.iter().map(|(id, status)| record(id, *status)).collect()
}

/// Record source that serves queued responses in order
///
/// Once the queue drains, the last served response repeats. With no
/// response ever queued, fetches return an empty list.
#[derive(Debug)]
pub struct ScriptedSource {
    queue: Mutex<VecDeque<FetchResult>>,
    last: Mutex<Option<FetchResult>>,
    keys: Mutex<Vec<String>>,
    calls: AtomicUsize,
    held: AtomicBool,
    gate: Semaphore,
}

impl ScriptedSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            queue: Mutex::new(VecDeque::new()),
            last: Mutex::new(None),
            keys: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            held: AtomicBool::new(false),
            gate: Semaphore::new(0),
        })
    }

    pub fn push_ok(&self, records: Vec<TrackableRecord>) {
        self.queue.lock().push_back(Ok(records));
    }

    pub fn push_err(&self, error: SourceError) {
        self.queue.lock().push_back(Err(error));
    }

    /// Number of fetches started
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Keys passed to each fetch, in call order
    pub fn keys(&self) -> Vec<String> {
        self.keys.lock().clone()
    }

    /// Make subsequent fetches wait for [`Self::release`]
    pub fn hold(&self) {
        self.held.store(true, Ordering::SeqCst);
    }

    /// Let one held fetch complete
    pub fn release(&self) {
        self.gate.add_permits(1);
    }

    fn next_response(&self) -> FetchResult {
        let mut last = self.last.lock();
        if let Some(next) = self.queue.lock().pop_front() {
            *last = Some(next);
        }
        last.clone().unwrap_or_else(|| Ok(Vec::new()))
    }
}

#[async_trait]
impl RecordSource for ScriptedSource {
    async fn fetch(&self, key: &CollectionKey) -> FetchResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.keys.lock().push(key.to_string());
        if self.held.load(Ordering::SeqCst) {
            if let Ok(permit) = self.gate.acquire().await {
                permit.forget();
            }
        }
        self.next_response()
    }
}

/// Captures status change callbacks as `(id, previous, current)`
#[derive(Debug, Clone, Default)]
pub struct ChangeLog {
    entries: Arc<Mutex<Vec<(RecordId, RecordStatus, RecordStatus)>>>,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Callback that appends to this log
    pub fn callback(&self) -> impl Fn(&TrackableRecord, RecordStatus) + Send + Sync + 'static {
        let entries = Arc::clone(&self.entries);
        move |record: &TrackableRecord, previous: RecordStatus| {
            entries
                .lock()
                .push((record.id.clone(), previous, record.status));
        }
    }

    pub fn entries(&self) -> Vec<(RecordId, RecordStatus, RecordStatus)> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
