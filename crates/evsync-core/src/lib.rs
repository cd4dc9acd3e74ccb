//! evsync Core - evidence status synchronization
//!
//! Keeps a client-side view of status-bearing records in step with a remote
//! collection:
//! - Normalizes backend status vocabulary into a fixed enumeration
//! - Detects per-record status changes between polls
//! - Polls only while some record is still in flight
//! - Captures fetch failures instead of propagating them
//!
//! # Example
//!
//! ```rust,ignore
//! use evsync_core::prelude::*;
//!
//! # async fn example(source: impl RecordSource) -> Result<(), SyncError> {
//! let sync = StatusSynchronizer::builder(source)
//!     .collection_key("case-17")
//!     .initial_records(vec![TrackableRecord::new("e1", RecordStatus::Processing)])
//!     .build()?;
//!
//! sync.refresh().await;
//! println!("{}", sync.summary());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

// Core modules
pub mod config;
pub mod error;
pub mod record;
pub mod session;
pub mod snapshot;
pub mod source;
pub mod status;
pub mod synchronizer;

// Re-exports for convenience
pub use config::{SyncOptions, DEFAULT_POLL_INTERVAL_MS};
pub use error::{SourceError, SourceErrorKind, SyncError};
pub use record::{has_non_terminal, RecordId, StatusSummary, TrackableRecord};
pub use session::SessionId;
pub use snapshot::{diff, ContentKey, Snapshot, StatusChange};
pub use source::{CollectionKey, RecordSource};
pub use status::{RecordStatus, UnknownStatus, TERMINAL_STATUSES};
pub use synchronizer::{
    CycleOutcome, StatusCallback, StatusSynchronizer, SyncStatus, SynchronizerBuilder,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with evsync
    pub use crate::{
        CollectionKey, CycleOutcome, RecordSource, RecordStatus, SourceError, StatusSynchronizer,
        SyncError, SyncOptions, TrackableRecord,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
