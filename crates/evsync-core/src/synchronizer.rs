//! Status synchronizer
//!
//! Keeps a local copy of a remote record collection up to date while any
//! record is still in flight:
//! - Reconciles fetched records against the last snapshot
//! - Notifies the caller of every status change, before committing
//! - Starts polling when something is non-terminal, stops when all settle
//! - Never surfaces fetch errors as `Err`; they land in `last_error`
//!
//! # Example
//!
//! ```rust,ignore
//! use evsync_core::{StatusSynchronizer, SyncOptions};
//!
//! let sync = StatusSynchronizer::builder(source)
//!     .collection_key("case-17")
//!     .initial_records(records)
//!     .options(SyncOptions::new())
//!     .on_status_change(|record, previous| {
//!         println!("{} moved from {previous} to {}", record.id, record.status);
//!     })
//!     .build()?;
//!
//! let mut updates = sync.subscribe();
//! while updates.changed().await.is_ok() {
//!     if !sync.has_non_terminal_items() {
//!         break;
//!     }
//! }
//! ```

use crate::config::SyncOptions;
use crate::error::{SourceError, SyncError};
use crate::record::{has_non_terminal, StatusSummary, TrackableRecord};
use crate::session::{PollingSession, SessionId};
use crate::snapshot::{diff, ContentKey, Snapshot};
use crate::source::{CollectionKey, RecordSource};
use crate::status::RecordStatus;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Status change callback: `(fetched record, previous status)`
pub type StatusCallback = Arc<dyn Fn(&TrackableRecord, RecordStatus) + Send + Sync>;

/// Result of one fetch-and-reconcile cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No collection key; nothing fetched
    Skipped,
    /// Fetched and committed
    Applied {
        /// Status changes reported to the callback
        changes: usize,
    },
    /// Fetch failed; see [`StatusSynchronizer::last_error`]
    Failed,
}

/// Point-in-time view of the synchronizer
#[derive(Debug, Clone)]
pub struct SyncStatus {
    /// Whether a polling session is active
    pub is_polling: bool,
    /// Whether any record is non-terminal
    pub has_non_terminal_items: bool,
    /// Last fetch error, if the last fetch failed
    pub last_error: Option<SourceError>,
    /// When the last successful fetch was committed
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Per-status counts
    pub summary: StatusSummary,
}

struct State {
    records: Arc<Vec<TrackableRecord>>,
    snapshot: Snapshot,
    /// Content of the last caller-supplied baseline
    baseline: ContentKey,
    options: SyncOptions,
    last_error: Option<SourceError>,
    last_synced_at: Option<DateTime<Utc>>,
    /// Last evaluated `enabled && keyed && non-terminal`; sessions follow its flips
    wants_polling: bool,
}

impl State {
    fn wants_polling(&self, keyed: bool) -> bool {
        keyed && self.options.enabled && has_non_terminal(&self.records)
    }
}

struct Shared<S> {
    key: Option<CollectionKey>,
    source: S,
    state: Mutex<State>,
    on_status_change: RwLock<Option<StatusCallback>>,
    session: Mutex<Option<PollingSession>>,
    /// Held from diff through commit; concurrent cycles queue here
    reconcile: Mutex<()>,
    records_tx: watch::Sender<Arc<Vec<TrackableRecord>>>,
}

impl<S: RecordSource> Shared<S> {
    async fn fetch(&self, key: &CollectionKey) -> Result<Vec<TrackableRecord>, SourceError> {
        metrics::counter!("evsync_cycles_total").increment(1);
        self.source.fetch(key).await
    }

    /// Reconcile a fetch result into state; callbacks fire before the commit
    ///
    /// `_cycle` is the `reconcile` guard, so the diff is always taken against
    /// the snapshot the previous cycle committed.
    fn apply(
        &self,
        _cycle: &MutexGuard<'_, ()>,
        result: Result<Vec<TrackableRecord>, SourceError>,
    ) -> CycleOutcome {
        let fetched = match result {
            Ok(records) => Arc::new(records),
            Err(e) => {
                metrics::counter!("evsync_cycle_failures_total").increment(1);
                tracing::warn!(error = %e, "fetch failed, keeping previous records");
                self.state.lock().last_error = Some(e);
                return CycleOutcome::Failed;
            }
        };

        let changes = diff(&self.state.lock().snapshot, &fetched);
        if !changes.is_empty() {
            metrics::counter!("evsync_status_changes_total").increment(changes.len() as u64);
            // Read the slot now so the latest callback is used, not one captured at session start
            let callback = self.on_status_change.read().clone();
            for change in &changes {
                tracing::debug!(
                    id = %change.record.id,
                    from = %change.previous,
                    to = %change.record.status,
                    "status changed"
                );
                if let Some(callback) = &callback {
                    callback(&change.record, change.previous);
                }
            }
        }

        {
            let mut state = self.state.lock();
            state.snapshot = Snapshot::from_records(&fetched);
            state.records = Arc::clone(&fetched);
            state.last_error = None;
            state.last_synced_at = Some(Utc::now());
        }
        self.records_tx.send_replace(fetched);

        CycleOutcome::Applied {
            changes: changes.len(),
        }
    }

    fn is_polling(&self) -> bool {
        self.session.lock().is_some()
    }

    /// Whether a running session should schedule another cycle
    fn keep_polling(&self) -> bool {
        let state = self.state.lock();
        state.options.enabled && has_non_terminal(&state.records)
    }

    /// Start or stop the session when the polling condition flips
    fn reevaluate(self: &Arc<Self>) {
        let (flipped, wants) = {
            let mut state = self.state.lock();
            let wants = state.wants_polling(self.key.is_some());
            let flipped = state.wants_polling != wants;
            state.wants_polling = wants;
            (flipped, wants)
        };

        if !flipped {
            return;
        }
        if wants {
            if !self.start_session() {
                // Nothing is running, so the next evaluation must see a flip again
                self.state.lock().wants_polling = false;
            }
        } else {
            self.stop_session("nothing left to poll");
        }
    }

    /// Returns whether a session is running afterwards
    fn start_session(self: &Arc<Self>) -> bool {
        let Some(key) = self.key.clone() else {
            return false;
        };
        if !self.state.lock().options.enabled {
            return false;
        }

        let mut slot = self.session.lock();
        if slot.is_some() {
            return true;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::error!(%key, "no tokio runtime, polling not started");
            return false;
        };

        let session = PollingSession::new();
        let id = session.id();
        let cancel = session.token();
        *slot = Some(session);
        drop(slot);

        tracing::info!(session = %id, %key, "polling started");
        let span = tracing::info_span!("polling_session", session = %id, %key);
        runtime.spawn(run_session(Arc::clone(self), key, id, cancel).instrument(span));
        true
    }

    fn stop_session(&self, reason: &'static str) {
        let session = self.session.lock().take();
        if let Some(session) = session {
            tracing::info!(session = %session.id(), reason, "polling stopped");
        }
    }

    /// Drop the session only if it is still `id`; a newer one is left alone
    fn finish_session(&self, id: SessionId) {
        let mut slot = self.session.lock();
        if slot.as_ref().is_some_and(|s| s.id() == id) {
            slot.take();
            tracing::info!(session = %id, "all records settled, polling stopped");
        }
    }
}

/// Polling loop; one cycle per interval, measured from the end of the last fetch
async fn run_session<S: RecordSource>(
    shared: Arc<Shared<S>>,
    key: CollectionKey,
    id: SessionId,
    cancel: CancellationToken,
) {
    loop {
        let interval = shared.state.lock().options.poll_interval();
        tokio::select! {
            _ = cancel.cancelled() => break,
            () = tokio::time::sleep(interval) => {}
        }

        let result = shared.fetch(&key).await;
        // In-flight fetches are not aborted; a stopped session just drops the result
        let outcome = {
            let cycle = shared.reconcile.lock();
            if cancel.is_cancelled() {
                None
            } else {
                Some(shared.apply(&cycle, result))
            }
        };
        let Some(outcome) = outcome else {
            tracing::debug!("session stopped during fetch, discarding result");
            break;
        };
        tracing::debug!(?outcome, "poll cycle complete");
        shared.reevaluate();

        if cancel.is_cancelled() {
            break;
        }
        if !shared.keep_polling() {
            shared.finish_session(id);
            break;
        }
    }
}

/// Builder for [`StatusSynchronizer`]
pub struct SynchronizerBuilder<S> {
    source: S,
    key: Option<CollectionKey>,
    initial_records: Vec<TrackableRecord>,
    options: SyncOptions,
    on_status_change: Option<StatusCallback>,
}

impl<S: RecordSource> SynchronizerBuilder<S> {
    /// Collection to poll; empty keys are treated as absent
    #[must_use]
    pub fn collection_key(mut self, key: impl Into<String>) -> Self {
        self.key = CollectionKey::new(key);
        self
    }

    /// Records visible before the first fetch
    #[must_use]
    pub fn initial_records(mut self, records: Vec<TrackableRecord>) -> Self {
        self.initial_records = records;
        self
    }

    /// Polling options
    #[must_use]
    pub fn options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Status change callback
    #[must_use]
    pub fn on_status_change<F>(mut self, callback: F) -> Self
    where
        F: Fn(&TrackableRecord, RecordStatus) + Send + Sync + 'static,
    {
        self.on_status_change = Some(Arc::new(callback));
        self
    }

    /// Build the synchronizer, starting a session if anything is non-terminal
    ///
    /// Must be called within a Tokio runtime for polling to start.
    ///
    /// # Errors
    /// - `SyncError::InvalidConfig` if the options fail validation
    pub fn build(self) -> Result<StatusSynchronizer<S>, SyncError> {
        self.options.validate()?;
        let records = Arc::new(self.initial_records);
        let (records_tx, _) = watch::channel(Arc::clone(&records));

        let shared = Arc::new(Shared {
            key: self.key,
            source: self.source,
            state: Mutex::new(State {
                snapshot: Snapshot::from_records(&records),
                baseline: ContentKey::of(&records),
                records,
                options: self.options,
                last_error: None,
                last_synced_at: None,
                wants_polling: false,
            }),
            on_status_change: RwLock::new(self.on_status_change),
            session: Mutex::new(None),
            reconcile: Mutex::new(()),
            records_tx,
        });
        shared.reevaluate();

        Ok(StatusSynchronizer { shared })
    }
}

/// Polls a remote collection until every record reaches a terminal status
///
/// Owns its snapshot and polling session; dropping it stops polling.
pub struct StatusSynchronizer<S: RecordSource> {
    shared: Arc<Shared<S>>,
}

impl<S: RecordSource> StatusSynchronizer<S> {
    /// Start building a synchronizer over `source`
    #[must_use]
    pub fn builder(source: S) -> SynchronizerBuilder<S> {
        SynchronizerBuilder {
            source,
            key: None,
            initial_records: Vec::new(),
            options: SyncOptions::default(),
            on_status_change: None,
        }
    }

    /// Run one fetch-and-reconcile cycle now
    ///
    /// Not gated by polling state. Never fails: a fetch error is recorded in
    /// [`Self::last_error`] and the current records are kept.
    pub async fn refresh(&self) -> CycleOutcome {
        let Some(key) = &self.shared.key else {
            return CycleOutcome::Skipped;
        };
        let result = self.shared.fetch(key).await;
        let outcome = {
            let cycle = self.shared.reconcile.lock();
            self.shared.apply(&cycle, result)
        };
        self.shared.reevaluate();
        outcome
    }

    /// Start a polling session; no-op if one is active, polling is disabled, or there is no key
    pub fn start_polling(&self) {
        self.shared.start_session();
    }

    /// Stop the polling session; no-op when idle
    ///
    /// An in-flight fetch completes but its result is discarded.
    pub fn stop_polling(&self) {
        self.shared.stop_session("stopped by caller");
    }

    /// Master switch
    pub fn set_enabled(&self, enabled: bool) {
        self.shared.state.lock().options.enabled = enabled;
        if !enabled {
            self.shared.stop_session("disabled");
        }
        self.shared.reevaluate();
    }

    /// Change the poll interval; an active session picks it up on its next tick
    ///
    /// # Errors
    /// - `SyncError::InvalidConfig` for a zero interval; the current one is kept
    pub fn set_poll_interval(&self, interval: Duration) -> Result<(), SyncError> {
        let options = self.options().with_poll_interval(interval);
        options.validate()?;
        self.shared.state.lock().options.poll_interval_ms = options.poll_interval_ms;
        Ok(())
    }

    /// Replace the status change callback
    pub fn set_on_status_change<F>(&self, callback: F)
    where
        F: Fn(&TrackableRecord, RecordStatus) + Send + Sync + 'static,
    {
        *self.shared.on_status_change.write() = Some(Arc::new(callback));
    }

    /// Remove the status change callback
    pub fn clear_on_status_change(&self) {
        *self.shared.on_status_change.write() = None;
    }

    /// Adopt a new baseline if its content differs from the previous one
    ///
    /// Returns whether the baseline was adopted. A structurally equal list
    /// leaves `records` untouched, whatever its allocation.
    pub fn set_initial_records(&self, records: Vec<TrackableRecord>) -> bool {
        let key = ContentKey::of(&records);
        let records = {
            let mut state = self.shared.state.lock();
            if state.baseline == key {
                return false;
            }
            let records = Arc::new(records);
            state.baseline = key;
            state.snapshot = Snapshot::from_records(&records);
            state.records = Arc::clone(&records);
            records
        };
        tracing::debug!(count = records.len(), "adopted new baseline");
        self.shared.records_tx.send_replace(records);
        self.shared.reevaluate();
        true
    }

    /// Current records
    #[must_use]
    pub fn records(&self) -> Arc<Vec<TrackableRecord>> {
        Arc::clone(&self.shared.state.lock().records)
    }

    /// Whether a polling session is active
    #[must_use]
    pub fn is_polling(&self) -> bool {
        self.shared.is_polling()
    }

    /// Whether any current record is non-terminal
    #[must_use]
    pub fn has_non_terminal_items(&self) -> bool {
        has_non_terminal(&self.shared.state.lock().records)
    }

    /// Error from the last fetch, cleared by the next success
    #[must_use]
    pub fn last_error(&self) -> Option<SourceError> {
        self.shared.state.lock().last_error.clone()
    }

    /// When the last successful fetch was committed
    #[must_use]
    pub fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        self.shared.state.lock().last_synced_at
    }

    /// Per-status counts of the current records
    #[must_use]
    pub fn summary(&self) -> StatusSummary {
        StatusSummary::from_records(&self.shared.state.lock().records)
    }

    /// Current options
    #[must_use]
    pub fn options(&self) -> SyncOptions {
        self.shared.state.lock().options.clone()
    }

    /// Collection being polled
    #[must_use]
    pub fn collection_key(&self) -> Option<&CollectionKey> {
        self.shared.key.as_ref()
    }

    /// Everything a view needs in one read
    #[must_use]
    pub fn status(&self) -> SyncStatus {
        let is_polling = self.is_polling();
        let state = self.shared.state.lock();
        SyncStatus {
            is_polling,
            has_non_terminal_items: has_non_terminal(&state.records),
            last_error: state.last_error.clone(),
            last_synced_at: state.last_synced_at,
            summary: StatusSummary::from_records(&state.records),
        }
    }

    /// Receive every committed record list
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<TrackableRecord>>> {
        self.shared.records_tx.subscribe()
    }
}

impl<S: RecordSource> Drop for StatusSynchronizer<S> {
    fn drop(&mut self) {
        self.shared.stop_session("synchronizer dropped");
    }
}

impl<S: RecordSource> std::fmt::Debug for StatusSynchronizer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("StatusSynchronizer")
            .field("key", &self.shared.key)
            .field("records", &state.records.len())
            .field("options", &state.options)
            .field("last_error", &state.last_error)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MockRecordSource;
    use crate::status::RecordStatus::{Completed, Processing, Queued};

    fn rec(id: &str, status: RecordStatus) -> TrackableRecord {
        TrackableRecord::new(id, status)
    }

    #[tokio::test]
    async fn keyless_synchronizer_never_fetches() {
        let mut source = MockRecordSource::new();
        source.expect_fetch().times(0);

        let sync = StatusSynchronizer::builder(source)
            .collection_key("  ")
            .initial_records(vec![rec("e1", Processing)])
            .build()
            .unwrap();

        assert!(!sync.is_polling());
        assert_eq!(sync.refresh().await, CycleOutcome::Skipped);
        sync.start_polling();
        assert!(!sync.is_polling());
        assert!(sync.last_error().is_none());
        assert!(sync.has_non_terminal_items());
    }

    #[tokio::test]
    async fn refresh_applies_fetch_and_reports_changes() {
        let mut source = MockRecordSource::new();
        source
            .expect_fetch()
            .times(1)
            .returning(|_| Ok(vec![rec("e1", Completed), rec("e2", Queued)]));

        let sync = StatusSynchronizer::builder(source)
            .collection_key("case-1")
            .initial_records(vec![rec("e1", Processing)])
            .options(SyncOptions::new().with_enabled(false))
            .build()
            .unwrap();

        let outcome = sync.refresh().await;
        assert_eq!(outcome, CycleOutcome::Applied { changes: 1 });
        assert_eq!(sync.records().len(), 2);
        assert!(sync.last_synced_at().is_some());
        assert_eq!(sync.summary().completed, 1);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_records() {
        let mut source = MockRecordSource::new();
        source
            .expect_fetch()
            .returning(|_| Err(SourceError::transport("connection reset")));

        let sync = StatusSynchronizer::builder(source)
            .collection_key("case-1")
            .initial_records(vec![rec("e1", Processing)])
            .options(SyncOptions::new().with_enabled(false))
            .build()
            .unwrap();
        let before = sync.records();

        assert_eq!(sync.refresh().await, CycleOutcome::Failed);
        assert!(Arc::ptr_eq(&before, &sync.records()));
        assert_eq!(
            sync.last_error().map(|e| e.kind),
            Some(crate::error::SourceErrorKind::Transport)
        );
    }

    #[tokio::test]
    async fn construction_starts_polling_for_non_terminal_records() {
        let source = MockRecordSource::new();
        let sync = StatusSynchronizer::builder(source)
            .collection_key("case-1")
            .initial_records(vec![rec("e1", Completed), rec("e2", Queued)])
            .build()
            .unwrap();
        assert!(sync.is_polling());

        sync.stop_polling();
        assert!(!sync.is_polling());
    }

    #[tokio::test]
    async fn all_terminal_records_do_not_poll() {
        let source = MockRecordSource::new();
        let sync = StatusSynchronizer::builder(source)
            .collection_key("case-1")
            .initial_records(vec![rec("e1", Completed)])
            .build()
            .unwrap();
        assert!(!sync.is_polling());
        assert!(!sync.has_non_terminal_items());
    }

    #[test]
    fn build_outside_runtime_does_not_poll() {
        let sync = StatusSynchronizer::builder(MockRecordSource::new())
            .collection_key("case-1")
            .initial_records(vec![rec("e1", Processing)])
            .build()
            .unwrap();
        assert!(!sync.is_polling());
    }

    #[test]
    fn failed_start_does_not_block_later_polling() {
        let sync = StatusSynchronizer::builder(MockRecordSource::new())
            .collection_key("case-1")
            .initial_records(vec![rec("e1", Processing)])
            .build()
            .unwrap();
        assert!(!sync.is_polling());

        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            assert!(sync.set_initial_records(vec![rec("e1", Queued)]));
            assert!(sync.is_polling());
            sync.stop_polling();
        });
    }

    #[test]
    fn zero_poll_interval_is_rejected_by_build() {
        let result = StatusSynchronizer::builder(MockRecordSource::new())
            .collection_key("case-1")
            .options(SyncOptions::new().with_poll_interval(Duration::ZERO))
            .build();
        assert!(matches!(result, Err(SyncError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn zero_poll_interval_is_rejected_at_runtime() {
        let sync = StatusSynchronizer::builder(MockRecordSource::new())
            .collection_key("case-1")
            .options(SyncOptions::new().with_enabled(false))
            .build()
            .unwrap();

        let err = sync.set_poll_interval(Duration::ZERO).unwrap_err();
        assert!(matches!(err, SyncError::InvalidConfig(_)));
        assert_eq!(sync.options().poll_interval(), Duration::from_millis(5000));

        sync.set_poll_interval(Duration::from_millis(250)).unwrap();
        assert_eq!(sync.options().poll_interval_ms, 250);
    }
}
