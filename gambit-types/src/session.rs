//! The shared session document and its lifecycle status.
//!
//! A [`SessionDoc`] is the blackboard both peers read and write through the
//! store. Writes are merge-style and per-field last-writer-wins, so every
//! field must be self-describing: in particular the terminal status string
//! carries the full outcome, letting either peer derive win/loss without
//! caring which peer wrote it.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Color, GameError, SessionId, TimeControl};

/// Why a session ended.
///
/// Every variant names the color it refers to, so the reason alone fully
/// determines the outcome for both peers. Wire form is `<kind>:<color>`,
/// e.g. `"timeout:w"`.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EndReason {
    /// Checkmate; the named color delivered mate and wins.
    Checkmate {
        /// The winning (mating) color.
        winner: Color,
    },
    /// The named color resigned and loses.
    Resigned {
        /// The resigning color.
        loser: Color,
    },
    /// The named color's main clock reached zero; that color loses.
    Timeout {
        /// The flagged color.
        loser: Color,
    },
    /// The shared move clock expired on the named color's turn; that color
    /// loses.
    Abandoned {
        /// The color that failed to move in time.
        loser: Color,
    },
}

impl EndReason {
    /// The color that wins under this reason.
    pub fn winner(self) -> Color {
        match self {
            Self::Checkmate { winner } => winner,
            Self::Resigned { loser }
            | Self::Timeout { loser }
            | Self::Abandoned { loser } => loser.opponent(),
        }
    }

    /// The wire form, `<kind>:<color>`.
    pub fn as_wire(self) -> String {
        match self {
            Self::Checkmate { winner } => format!("checkmate:{}", winner),
            Self::Resigned { loser } => format!("resigned:{}", loser),
            Self::Timeout { loser } => format!("timeout:{}", loser),
            Self::Abandoned { loser } => format!("abandoned:{}", loser),
        }
    }

    /// Parse the wire form.
    pub fn parse(s: &str) -> Result<Self, GameError> {
        let (kind, color) = s
            .split_once(':')
            .ok_or_else(|| GameError::InvalidStatus(s.to_string()))?;
        let color = Color::parse(color)?;
        match kind {
            "checkmate" => Ok(Self::Checkmate { winner: color }),
            "resigned" => Ok(Self::Resigned { loser: color }),
            "timeout" => Ok(Self::Timeout { loser: color }),
            "abandoned" => Ok(Self::Abandoned { loser: color }),
            _ => Err(GameError::InvalidStatus(s.to_string())),
        }
    }
}

impl TryFrom<String> for EndReason {
    type Error = GameError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<EndReason> for String {
    fn from(r: EndReason) -> String {
        r.as_wire()
    }
}

// Display is the wire form, keeping logs and store writes identical.
impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_wire())
    }
}

impl fmt::Debug for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EndReason({})", self.as_wire())
    }
}

/// Session lifecycle status.
///
/// Transitions are one-directional: `waiting → playing → ended`. Once ended,
/// no field of the session may be mutated; the first writer to set an end
/// reason wins and later terminal writes are no-ops.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SessionStatus {
    /// Host created the session; no guest yet.
    Waiting,
    /// Guest attached; clocks running.
    Playing,
    /// Terminal, with a self-describing reason.
    Ended(EndReason),
}

impl SessionStatus {
    /// True once the session has reached its terminal state.
    pub fn is_ended(self) -> bool {
        matches!(self, Self::Ended(_))
    }

    /// The end reason, if terminal.
    pub fn end_reason(self) -> Option<EndReason> {
        match self {
            Self::Ended(reason) => Some(reason),
            _ => None,
        }
    }

    /// The wire form: `"waiting"`, `"playing"`, or `"ended:<reason>"`.
    pub fn as_wire(self) -> String {
        match self {
            Self::Waiting => "waiting".to_string(),
            Self::Playing => "playing".to_string(),
            Self::Ended(reason) => format!("ended:{}", reason.as_wire()),
        }
    }

    /// Parse the wire form.
    pub fn parse(s: &str) -> Result<Self, GameError> {
        match s {
            "waiting" => Ok(Self::Waiting),
            "playing" => Ok(Self::Playing),
            other => match other.strip_prefix("ended:") {
                Some(reason) => Ok(Self::Ended(EndReason::parse(reason)?)),
                None => Err(GameError::InvalidStatus(s.to_string())),
            },
        }
    }
}

impl TryFrom<String> for SessionStatus {
    type Error = GameError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<SessionStatus> for String {
    fn from(s: SessionStatus) -> String {
        s.as_wire()
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_wire())
    }
}

impl fmt::Debug for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionStatus({})", self.as_wire())
    }
}

/// The shared session document.
///
/// One of these lives in the store per session id. Both peers may write any
/// field at any time; correctness rests on idempotent transitions and the
/// first-write-wins rule for `status`, not on locking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDoc {
    /// Serialized board position, owned by the rules engine. The session
    /// layer only round-trips it.
    pub board: String,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Chosen time control.
    pub time_control: TimeControl,
    /// White's remaining main-clock seconds.
    pub main_clock_w: u32,
    /// Black's remaining main-clock seconds.
    pub main_clock_b: u32,
    /// True while the host's process holds a live store connection.
    pub presence_host: bool,
    /// True while the guest's process holds a live store connection.
    pub presence_guest: bool,
    /// Becomes true once the guest attaches. Never reverts.
    pub has_opponent: bool,
}

impl SessionDoc {
    /// Create the document a host writes when opening a session.
    pub fn new_waiting(time_control: TimeControl, board: String) -> Self {
        let secs = time_control.main_clock_secs();
        Self {
            board,
            status: SessionStatus::Waiting,
            time_control,
            main_clock_w: secs,
            main_clock_b: secs,
            presence_host: true,
            presence_guest: false,
            has_opponent: false,
        }
    }

    /// Remaining main-clock seconds for a color.
    pub fn main_clock(&self, color: Color) -> u32 {
        match color {
            Color::White => self.main_clock_w,
            Color::Black => self.main_clock_b,
        }
    }

    /// Set the main clock for a color.
    pub fn set_main_clock(&mut self, color: Color, secs: u32) {
        match color {
            Color::White => self.main_clock_w = secs,
            Color::Black => self.main_clock_b = secs,
        }
    }

    /// Presence flag for the peer playing `color` (host plays white).
    pub fn presence(&self, color: Color) -> bool {
        match color {
            Color::White => self.presence_host,
            Color::Black => self.presence_guest,
        }
    }

    /// Serialize to the store's JSON form.
    pub fn to_json(&self) -> Result<String, GameError> {
        serde_json::to_string(self).map_err(GameError::Serialization)
    }

    /// Deserialize from the store's JSON form.
    pub fn from_json(s: &str) -> Result<Self, GameError> {
        serde_json::from_str(s).map_err(GameError::Serialization)
    }
}

/// A merge-style partial update of a [`SessionDoc`].
///
/// Mirrors the store's `write(path, partialFields)` contract: only the
/// fields present are overwritten, each with last-writer-wins semantics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPatch {
    /// New serialized board position.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub board: Option<String>,
    /// New lifecycle status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SessionStatus>,
    /// New white main-clock value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_clock_w: Option<u32>,
    /// New black main-clock value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_clock_b: Option<u32>,
    /// New host presence flag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_host: Option<bool>,
    /// New guest presence flag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_guest: Option<bool>,
    /// New opponent-attached flag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_opponent: Option<bool>,
}

impl SessionPatch {
    /// A patch carrying only a terminal status.
    pub fn ended(reason: EndReason) -> Self {
        Self {
            status: Some(SessionStatus::Ended(reason)),
            ..Self::default()
        }
    }

    /// A patch carrying a move: new board plus the mover's clock snapshot.
    pub fn board_update(board: String, main_clock_w: u32, main_clock_b: u32) -> Self {
        Self {
            board: Some(board),
            main_clock_w: Some(main_clock_w),
            main_clock_b: Some(main_clock_b),
            ..Self::default()
        }
    }

    /// Apply this patch to a document, field by field.
    pub fn apply(&self, doc: &mut SessionDoc) {
        if let Some(board) = &self.board {
            doc.board = board.clone();
        }
        if let Some(status) = self.status {
            doc.status = status;
        }
        if let Some(w) = self.main_clock_w {
            doc.main_clock_w = w;
        }
        if let Some(b) = self.main_clock_b {
            doc.main_clock_b = b;
        }
        if let Some(p) = self.presence_host {
            doc.presence_host = p;
        }
        if let Some(p) = self.presence_guest {
            doc.presence_guest = p;
        }
        if let Some(h) = self.has_opponent {
            doc.has_opponent = h;
        }
    }
}

/// An entry in a matchmaking queue bucket.
///
/// Created by a player seeking a random opponent; removed either by a
/// matching peer claiming it or by the creator's own expiry sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// The pending session the creator opened.
    pub session_id: SessionId,
    /// Bucket key: entries only match within one time control.
    pub time_control: TimeControl,
    /// Creation time, milliseconds since the Unix epoch. Used only by the
    /// creator's own expiry sweep, so clock skew between peers is harmless.
    pub created_at_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_reason_wire_roundtrip() {
        let reasons = [
            EndReason::Checkmate { winner: Color::White },
            EndReason::Resigned { loser: Color::Black },
            EndReason::Timeout { loser: Color::White },
            EndReason::Abandoned { loser: Color::Black },
        ];
        for reason in reasons {
            let wire = reason.as_wire();
            assert_eq!(EndReason::parse(&wire).unwrap(), reason);
        }
    }

    #[test]
    fn end_reason_winner() {
        assert_eq!(
            EndReason::Checkmate { winner: Color::White }.winner(),
            Color::White
        );
        assert_eq!(
            EndReason::Timeout { loser: Color::White }.winner(),
            Color::Black
        );
        assert_eq!(
            EndReason::Resigned { loser: Color::Black }.winner(),
            Color::White
        );
        assert_eq!(
            EndReason::Abandoned { loser: Color::Black }.winner(),
            Color::White
        );
    }

    #[test]
    fn end_reason_rejects_garbage() {
        assert!(EndReason::parse("checkmate").is_err());
        assert!(EndReason::parse("flagged:w").is_err());
        assert!(EndReason::parse("timeout:x").is_err());
    }

    #[test]
    fn status_wire_roundtrip() {
        let statuses = [
            SessionStatus::Waiting,
            SessionStatus::Playing,
            SessionStatus::Ended(EndReason::Abandoned { loser: Color::Black }),
        ];
        for status in statuses {
            let wire = status.as_wire();
            assert_eq!(SessionStatus::parse(&wire).unwrap(), status);
        }
        assert_eq!(
            SessionStatus::parse("ended:timeout:w").unwrap(),
            SessionStatus::Ended(EndReason::Timeout { loser: Color::White })
        );
    }

    #[test]
    fn status_is_ended() {
        assert!(!SessionStatus::Waiting.is_ended());
        assert!(!SessionStatus::Playing.is_ended());
        assert!(SessionStatus::Ended(EndReason::Resigned { loser: Color::White }).is_ended());
    }

    #[test]
    fn new_waiting_doc_defaults() {
        let doc = SessionDoc::new_waiting(TimeControl::Blitz, "start".into());
        assert_eq!(doc.status, SessionStatus::Waiting);
        assert_eq!(doc.main_clock_w, 300);
        assert_eq!(doc.main_clock_b, 300);
        assert!(doc.presence_host);
        assert!(!doc.presence_guest);
        assert!(!doc.has_opponent);
    }

    #[test]
    fn doc_json_roundtrip() {
        let doc = SessionDoc::new_waiting(TimeControl::Rapid, "rnbq".into());
        let json = doc.to_json().unwrap();
        assert_eq!(SessionDoc::from_json(&json).unwrap(), doc);
    }

    #[test]
    fn patch_applies_only_present_fields() {
        let mut doc = SessionDoc::new_waiting(TimeControl::Blitz, "start".into());
        let patch = SessionPatch {
            board: Some("after-e4".into()),
            main_clock_b: Some(250),
            ..SessionPatch::default()
        };
        patch.apply(&mut doc);
        assert_eq!(doc.board, "after-e4");
        assert_eq!(doc.main_clock_b, 250);
        // Untouched fields keep their values.
        assert_eq!(doc.main_clock_w, 300);
        assert_eq!(doc.status, SessionStatus::Waiting);
    }

    #[test]
    fn ended_patch_only_sets_status() {
        let reason = EndReason::Timeout { loser: Color::Black };
        let patch = SessionPatch::ended(reason);
        assert_eq!(patch.status, Some(SessionStatus::Ended(reason)));
        assert!(patch.board.is_none());
        assert!(patch.main_clock_w.is_none());
    }

    #[test]
    fn patch_json_omits_absent_fields() {
        let patch = SessionPatch {
            has_opponent: Some(true),
            presence_guest: Some(true),
            ..SessionPatch::default()
        };
        let json = serde_json::to_string(&patch).unwrap();
        assert!(json.contains("has_opponent"));
        assert!(!json.contains("board"));
        assert!(!json.contains("status"));
    }

    #[test]
    fn queue_entry_json_roundtrip() {
        let entry = QueueEntry {
            session_id: SessionId::parse("AB12X").unwrap(),
            time_control: TimeControl::Rapid,
            created_at_ms: 1_700_000_000_000,
        };
        let json = serde_json::to_string(&entry).unwrap();
        let back: QueueEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }
}
