//! Record status enumeration
//!
//! The backend speaks a loose vocabulary ("pending", "analyzing", "done", ...).
//! Everything is folded into [`RecordStatus`] on the way in; anything we don't
//! recognize lands on [`RecordStatus::DEFAULT`].

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Processing status of a trackable record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Waiting to be picked up
    Queued,
    /// Bytes still arriving
    Uploading,
    /// Pipeline running
    Processing,
    /// Finished successfully
    Completed,
    /// Pipeline gave up
    Failed,
    /// Finished, but a human has to look at it
    NeedsReview,
}

/// Statuses after which a record needs no further polling
pub const TERMINAL_STATUSES: [RecordStatus; 3] = [
    RecordStatus::Completed,
    RecordStatus::Failed,
    RecordStatus::NeedsReview,
];

impl RecordStatus {
    /// Status assigned to records whose wire status is missing or unknown.
    ///
    /// Non-terminal, so an unreadable record keeps being checked until the
    /// backend reports something we understand.
    pub const DEFAULT: RecordStatus = RecordStatus::Processing;

    /// All statuses, non-terminal first
    pub const ALL: [RecordStatus; 6] = [
        RecordStatus::Queued,
        RecordStatus::Uploading,
        RecordStatus::Processing,
        RecordStatus::Completed,
        RecordStatus::Failed,
        RecordStatus::NeedsReview,
    ];

    /// Check if no further polling is needed for this status
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        TERMINAL_STATUSES.contains(&self)
    }

    /// Canonical wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RecordStatus::Queued => "queued",
            RecordStatus::Uploading => "uploading",
            RecordStatus::Processing => "processing",
            RecordStatus::Completed => "completed",
            RecordStatus::Failed => "failed",
            RecordStatus::NeedsReview => "needs_review",
        }
    }

    /// Map a backend status string onto the internal enumeration
    ///
    /// Returns `None` when the vocabulary is unknown; see [`Self::normalize`].
    #[must_use]
    pub fn recognize(raw: &str) -> Option<Self> {
        let folded: String = raw
            .trim()
            .chars()
            .map(|c| match c {
                '-' | ' ' => '_',
                c => c.to_ascii_lowercase(),
            })
            .collect();

        let status = match folded.as_str() {
            "pending" | "queued" | "waiting" => RecordStatus::Queued,
            "uploading" | "upload" | "uploaded" => RecordStatus::Uploading,
            "processing" | "analyzing" | "analysing" | "extracting" | "in_progress"
            | "running" => RecordStatus::Processing,
            "completed" | "complete" | "done" | "processed" | "success" | "succeeded"
            | "ready" => RecordStatus::Completed,
            "failed" | "failure" | "error" | "errored" => RecordStatus::Failed,
            "needs_review" | "review" | "review_required" | "flagged" => {
                RecordStatus::NeedsReview
            }
            _ => return None,
        };
        Some(status)
    }

    /// Map a backend status string, degrading unknown values to [`Self::DEFAULT`]
    #[must_use]
    pub fn normalize(raw: &str) -> Self {
        Self::recognize(raw).unwrap_or_else(|| {
            tracing::debug!(status = raw, "unrecognized status, using default");
            Self::DEFAULT
        })
    }
}

impl Default for RecordStatus {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for strings that are not a canonical status name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for RecordStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::recognize(s).ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_set() {
        assert!(!RecordStatus::Queued.is_terminal());
        assert!(!RecordStatus::Uploading.is_terminal());
        assert!(!RecordStatus::Processing.is_terminal());
        assert!(RecordStatus::Completed.is_terminal());
        assert!(RecordStatus::Failed.is_terminal());
        assert!(RecordStatus::NeedsReview.is_terminal());
    }

    #[test]
    fn normalize_backend_vocabulary() {
        assert_eq!(RecordStatus::normalize("pending"), RecordStatus::Queued);
        assert_eq!(RecordStatus::normalize("Analyzing"), RecordStatus::Processing);
        assert_eq!(RecordStatus::normalize("in-progress"), RecordStatus::Processing);
        assert_eq!(RecordStatus::normalize(" DONE "), RecordStatus::Completed);
        assert_eq!(RecordStatus::normalize("error"), RecordStatus::Failed);
        assert_eq!(RecordStatus::normalize("needs review"), RecordStatus::NeedsReview);
    }

    #[test]
    fn unknown_status_degrades_to_default() {
        assert_eq!(RecordStatus::normalize("quantum"), RecordStatus::DEFAULT);
        assert_eq!(RecordStatus::normalize(""), RecordStatus::DEFAULT);
        assert!(!RecordStatus::DEFAULT.is_terminal());
    }

    #[test]
    fn canonical_names_round_trip() {
        for status in RecordStatus::ALL {
            assert_eq!(status.as_str().parse::<RecordStatus>(), Ok(status));
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn from_str_rejects_unknown() {
        assert_eq!(
            "bogus".parse::<RecordStatus>(),
            Err(UnknownStatus("bogus".to_string()))
        );
    }
}
