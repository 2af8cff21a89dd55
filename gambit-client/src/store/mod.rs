//! Store abstraction for Gambit.
//!
//! The store is the only transport: a shared, subscribe-capable key-value
//! document substrate that both peers read and write. This module provides
//! the pluggable [`SessionStore`] trait and the path layout the client uses
//! within it.
//!
//! # Consistency contract
//!
//! The store offers no locking. Its guarantees are:
//! - per-field last-writer-wins merge on [`SessionStore::write`], with one
//!   carve-out: a field whose current value is a terminal status string is
//!   never overwritten, so the first terminal writer wins;
//! - atomic create-if-absent ([`SessionStore::write_once`]) and atomic
//!   remove ([`SessionStore::remove_if_present`]) - exactly one of several
//!   racing claimants succeeds;
//! - every write is eventually observed by every subscriber, though not
//!   necessarily in write order.
//!
//! Everything above the store compensates for the weak ordering with
//! idempotent transitions and self-describing terminal writes.

mod mock;

pub use mock::{MockStore, MockStoreHandle};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

use gambit_types::{GameError, SessionId, TimeControl};

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store is unreachable. Transient; callers keep their local state
    /// and reconcile through the normal subscription path on reconnect.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A document failed to (de)serialize.
    #[error("invalid document: {0}")]
    InvalidValue(String),
}

impl From<StoreError> for GameError {
    fn from(err: StoreError) -> Self {
        GameError::StoreUnavailable(err.to_string())
    }
}

/// Identifies an active subscription, for [`SessionStore::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(pub u64);

/// The shared document store both peers communicate through.
///
/// Implementations must deliver, after every mutation under a subscribed
/// path, the current value at that path (or `Value::Null` once removed) to
/// the subscriber's channel.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Subscribe to changes at `path`. The current value at `path` is
    /// delivered on every subsequent change; removal delivers `Null`.
    async fn subscribe(
        &self,
        path: &str,
        sender: UnboundedSender<Value>,
    ) -> Result<WatchId, StoreError>;

    /// Cancel a subscription.
    async fn unsubscribe(&self, watch: WatchId);

    /// Merge `fields` into the document at `path`, field by field,
    /// last-writer-wins (terminal status fields excepted, see module docs).
    async fn write(&self, path: &str, fields: Value) -> Result<(), StoreError>;

    /// Create the document at `path` if and only if nothing exists there.
    /// Returns whether this call created it.
    async fn write_once(&self, path: &str, value: Value) -> Result<bool, StoreError>;

    /// Read the value at `path`, or the object of child documents if `path`
    /// is an interior node, or `None` if nothing exists there.
    async fn read_once(&self, path: &str) -> Result<Option<Value>, StoreError>;

    /// Atomically remove the document at `path`. Returns whether anything
    /// was removed; of several racing callers exactly one sees `true`.
    async fn remove_if_present(&self, path: &str) -> Result<bool, StoreError>;

    /// Dead-man's-switch: the store itself merges `fields` into `path` if
    /// this peer's connection drops without a clean exit.
    async fn on_disconnect_set(&self, path: &str, fields: Value) -> Result<(), StoreError>;
}

/// Path of a session document.
pub fn session_path(root: &str, id: &SessionId) -> String {
    format!("{}/sessions/{}", root, id)
}

/// Path of a matchmaking queue bucket.
pub fn queue_bucket_path(root: &str, tc: TimeControl) -> String {
    format!("{}/queue/{}", root, tc.bucket())
}

/// Path of one queue entry within its bucket, keyed by the pending session.
pub fn queue_entry_path(root: &str, tc: TimeControl, id: &SessionId) -> String {
    format!("{}/queue/{}/{}", root, tc.bucket(), id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_stable() {
        let id = SessionId::parse("AB12X").unwrap();
        assert_eq!(session_path("gambit", &id), "gambit/sessions/AB12X");
        assert_eq!(
            queue_bucket_path("gambit", TimeControl::Rapid),
            "gambit/queue/600"
        );
        assert_eq!(
            queue_entry_path("gambit", TimeControl::Rapid, &id),
            "gambit/queue/600/AB12X"
        );
    }

    #[test]
    fn store_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<StoreError>();
    }
}
