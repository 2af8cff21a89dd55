//! Error types for Gambit sessions.
//!
//! Illegal selections and illegal destinations are deliberately absent:
//! per the session contract they are silently absorbed no-ops, not errors.

use thiserror::Error;

/// Errors that can occur in Gambit session operations.
#[derive(Debug, Error)]
pub enum GameError {
    /// Matchmaking waited its full deadline without a guest attaching.
    /// Retryable.
    #[error("no opponent found within the matchmaking deadline")]
    NoOpponentFound,

    /// A local action was attempted after the session reached its terminal
    /// state. Callers must treat this as a no-op, never a failure.
    #[error("session already ended")]
    SessionAlreadyEnded,

    /// Transient store connectivity loss. Local clocks keep ticking
    /// optimistically; reconciliation happens through the normal remote
    /// change path once the store is reachable again.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// JSON (de)serialization of a store document failed.
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// No session document exists under the given id.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// A join was attempted on a session that already has both players.
    #[error("session already has an opponent: {0}")]
    SessionFull(String),

    /// The rules engine rejected a serialized board position.
    #[error("invalid board state: {0:?}")]
    InvalidBoard(String),

    /// A session id failed validation (must be 5 uppercase alphanumerics).
    #[error("invalid session id: {0:?}")]
    InvalidSessionId(String),

    /// A color was not `"w"` or `"b"`.
    #[error("invalid color: {0:?}")]
    InvalidColor(String),

    /// A status string did not parse.
    #[error("invalid status: {0:?}")]
    InvalidStatus(String),

    /// A time-control bucket key did not parse.
    #[error("invalid time control: {0:?}")]
    InvalidTimeControl(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = GameError::InvalidSessionId("abc".to_string());
        assert_eq!(err.to_string(), "invalid session id: \"abc\"");
        assert_eq!(
            GameError::SessionAlreadyEnded.to_string(),
            "session already ended"
        );
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<GameError>();
    }
}
