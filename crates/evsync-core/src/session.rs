//! Polling session handle
//!
//! A [`PollingSession`] owns the cancellation side of one spawned polling
//! loop. Dropping it cancels the loop, so every path that discards the
//! session (explicit stop, disable, settling, synchronizer drop) releases
//! the timer.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use ulid::Ulid;

/// Unique polling session identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Ulid);

impl SessionId {
    /// Generate new session ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Live polling session; cancelled on drop
#[derive(Debug)]
pub(crate) struct PollingSession {
    id: SessionId,
    cancel: CancellationToken,
}

impl PollingSession {
    pub(crate) fn new() -> Self {
        Self {
            id: SessionId::new(),
            cancel: CancellationToken::new(),
        }
    }

    #[inline]
    pub(crate) fn id(&self) -> SessionId {
        self.id
    }

    /// Token observed by the polling loop
    #[inline]
    pub(crate) fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Drop for PollingSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_cancels_token() {
        let session = PollingSession::new();
        let token = session.token();
        assert!(!token.is_cancelled());
        drop(session);
        assert!(token.is_cancelled());
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(PollingSession::new().id(), PollingSession::new().id());
    }
}
