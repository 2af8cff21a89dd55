//! Matchmaking: pairing strangers through the store's queue buckets.
//!
//! One bucket per time control. A seeker first tries to claim an existing
//! entry (becoming the black guest); failing that it hosts a fresh session,
//! enqueues it, and waits for a guest. The claim is the store's atomic
//! remove-if-present, so two seekers racing for the same entry resolve to
//! exactly one guest, and the loser falls through to the next entry.
//!
//! Private sessions skip the queue entirely: the host shares the 5-char
//! session id out of band and the guest joins it directly.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use gambit_core::entry_expired;
use gambit_types::{
    Color, GameError, QueueEntry, SessionDoc, SessionId, SessionPatch, SessionStatus, TimeControl,
};

use crate::config::ClientConfig;
use crate::store::{queue_bucket_path, queue_entry_path, session_path, SessionStore};

/// The result of a successful pairing: which session to attach to and
/// which side this peer plays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pairing {
    /// The paired session.
    pub session_id: SessionId,
    /// This peer's color: white when hosting, black when joining.
    pub color: Color,
}

/// Pairs players through the store.
pub struct Matchmaker<S: SessionStore> {
    store: Arc<S>,
    config: ClientConfig,
}

impl<S: SessionStore> Matchmaker<S> {
    /// Create a matchmaker over a store connection.
    pub fn new(store: Arc<S>, config: ClientConfig) -> Self {
        Self { store, config }
    }

    /// Find an opponent at the given time control.
    ///
    /// Claims the oldest live queue entry if one exists; otherwise hosts a
    /// session and waits up to the configured deadline for a guest. Returns
    /// [`GameError::NoOpponentFound`] when the wait expires or the search
    /// is withdrawn; the caller may simply seek again.
    pub async fn seek(
        &self,
        time_control: TimeControl,
        initial_board: String,
    ) -> Result<Pairing, GameError> {
        if let Some(pairing) = self.try_claim(time_control).await? {
            return Ok(pairing);
        }
        self.host_and_wait(time_control, initial_board).await
    }

    /// Withdraw a pending search: removes the queue entry and the waiting
    /// session document, and the waiting [`seek`](Self::seek) observes the
    /// removal and returns [`GameError::NoOpponentFound`]. If a guest
    /// claimed the entry first the withdrawal yields to the claim and
    /// removes nothing.
    pub async fn withdraw(
        &self,
        time_control: TimeControl,
        session_id: &SessionId,
    ) -> Result<(), GameError> {
        let entry = queue_entry_path(&self.config.store_root, time_control, session_id);
        if self.store.remove_if_present(&entry).await? {
            let session = session_path(&self.config.store_root, session_id);
            self.store.remove_if_present(&session).await?;
            info!(session = %session_id, "search withdrawn");
        } else {
            // A guest claimed the entry first; the pending seek resolves
            // as a pairing instead.
            debug!(session = %session_id, "withdrawal lost to a claim");
        }
        Ok(())
    }

    /// Host a private session at the given time control. No queue entry is
    /// written; share the returned id with the intended guest.
    pub async fn create_private(
        &self,
        time_control: TimeControl,
        initial_board: String,
    ) -> Result<SessionId, GameError> {
        let id = self.create_session(time_control, initial_board).await?;
        info!(session = %id, "private session created");
        Ok(id)
    }

    /// Join a session by id, taking black.
    pub async fn join_private(&self, session_id: &SessionId) -> Result<Pairing, GameError> {
        self.join(session_id).await
    }

    /// Scan the bucket oldest-first and claim the first live entry.
    async fn try_claim(&self, time_control: TimeControl) -> Result<Option<Pairing>, GameError> {
        let bucket = queue_bucket_path(&self.config.store_root, time_control);
        let Some(value) = self.store.read_once(&bucket).await? else {
            return Ok(None);
        };
        let now = now_ms();
        for entry in parse_bucket(value) {
            if entry_expired(&entry, now) {
                // The creator may already have given up; leave the sweep
                // to them.
                continue;
            }
            let path = queue_entry_path(&self.config.store_root, time_control, &entry.session_id);
            if !self.store.remove_if_present(&path).await? {
                debug!(session = %entry.session_id, "lost claim race, trying next entry");
                continue;
            }
            match self.join(&entry.session_id).await {
                Ok(pairing) => return Ok(Some(pairing)),
                // A stale entry whose session is gone or already taken;
                // keep scanning.
                Err(
                    GameError::SessionNotFound(_)
                    | GameError::SessionFull(_)
                    | GameError::SessionAlreadyEnded,
                ) => {
                    warn!(session = %entry.session_id, "claimed a dead queue entry");
                    continue;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(None)
    }

    async fn join(&self, session_id: &SessionId) -> Result<Pairing, GameError> {
        let path = session_path(&self.config.store_root, session_id);
        let value = self
            .store
            .read_once(&path)
            .await?
            .ok_or_else(|| GameError::SessionNotFound(session_id.to_string()))?;
        let doc: SessionDoc = serde_json::from_value(value).map_err(GameError::Serialization)?;
        if doc.status.is_ended() {
            return Err(GameError::SessionAlreadyEnded);
        }
        if doc.has_opponent {
            return Err(GameError::SessionFull(session_id.to_string()));
        }

        let patch = SessionPatch {
            status: Some(SessionStatus::Playing),
            has_opponent: Some(true),
            presence_guest: Some(true),
            ..SessionPatch::default()
        };
        let patch = serde_json::to_value(&patch).map_err(GameError::Serialization)?;
        self.store.write(&path, patch).await?;
        info!(session = %session_id, "joined as black");
        Ok(Pairing {
            session_id: session_id.clone(),
            color: Color::Black,
        })
    }

    async fn host_and_wait(
        &self,
        time_control: TimeControl,
        initial_board: String,
    ) -> Result<Pairing, GameError> {
        let id = self.create_session(time_control, initial_board).await?;
        let spath = session_path(&self.config.store_root, &id);
        let epath = queue_entry_path(&self.config.store_root, time_control, &id);

        let entry = QueueEntry {
            session_id: id.clone(),
            time_control,
            created_at_ms: now_ms(),
        };
        let entry = serde_json::to_value(&entry).map_err(GameError::Serialization)?;

        // Watch the session before the entry becomes claimable, so the
        // guest's join can never land unobserved.
        let (tx, mut rx) = mpsc::unbounded_channel();
        let watch = self.store.subscribe(&spath, tx).await?;
        if let Err(err) = self.store.write_once(&epath, entry).await {
            self.store.unsubscribe(watch).await;
            return Err(err.into());
        }
        info!(session = %id, bucket = time_control.bucket(), "hosting, waiting for a guest");

        let deadline = tokio::time::Instant::now()
            + Duration::from_secs(self.config.matchmaking_wait_secs);

        let result = loop {
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Err(_) => break Err(GameError::NoOpponentFound),
                Ok(None) => {
                    break Err(GameError::StoreUnavailable("subscription closed".into()))
                }
                // Our document vanished: the search was withdrawn.
                Ok(Some(Value::Null)) => break Err(GameError::NoOpponentFound),
                Ok(Some(value)) => {
                    let Ok(doc) = serde_json::from_value::<SessionDoc>(value) else {
                        continue;
                    };
                    if doc.has_opponent {
                        break Ok(Pairing {
                            session_id: id.clone(),
                            color: Color::White,
                        });
                    }
                }
            }
        };
        self.store.unsubscribe(watch).await;

        // Giving up is itself a claim on our own entry. Only when we win
        // that removal is the session ours to delete; losing it means a
        // guest claimed the entry and the session now belongs to the game,
        // even if the join write has not landed yet.
        if result.is_err() && self.store.remove_if_present(&epath).await? {
            let _ = self.store.remove_if_present(&spath).await;
        }
        result
    }

    /// Create a fresh waiting session under a random id.
    async fn create_session(
        &self,
        time_control: TimeControl,
        initial_board: String,
    ) -> Result<SessionId, GameError> {
        let doc = SessionDoc::new_waiting(time_control, initial_board);
        let value = serde_json::to_value(&doc).map_err(GameError::Serialization)?;
        loop {
            let id = SessionId::random();
            let path = session_path(&self.config.store_root, &id);
            if self.store.write_once(&path, value.clone()).await? {
                return Ok(id);
            }
            // Id collision; roll again.
            warn!(session = %id, "session id collision");
        }
    }
}

/// Decode a bucket snapshot into entries, oldest first. Malformed entries
/// are skipped.
fn parse_bucket(value: Value) -> Vec<QueueEntry> {
    let Value::Object(children) = value else {
        return Vec::new();
    };
    let mut entries: Vec<QueueEntry> = children
        .into_iter()
        .filter_map(|(key, child)| match serde_json::from_value(child) {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(entry = %key, error = %err, "malformed queue entry");
                None
            }
        })
        .collect();
    entries.sort_by(|a, b| {
        (a.created_at_ms, a.session_id.as_str()).cmp(&(b.created_at_ms, b.session_id.as_str()))
    });
    entries
}

/// Milliseconds since the Unix epoch.
fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
