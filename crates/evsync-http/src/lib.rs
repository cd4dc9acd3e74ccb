//! evsync HTTP - remote record source
//!
//! Reads evidence status from the practice API:
//! - `GET /cases/{key}/evidence` for a case's evidence list
//! - `GET /evidence/{key}` for a single item
//!
//! Bodies may be bare or wrapped as `{ "data": ..., "error": ... }`.

#![warn(unreachable_pub)]

pub mod client;
pub mod envelope;
pub mod source;

pub use client::{ApiClient, ApiConfig, DEFAULT_COLLECTION_PATH, DEFAULT_ITEM_PATH};
pub use envelope::{extract_records, unwrap_envelope};
pub use source::{HttpRecordSource, Scope};
