//! Identity types for Gambit sessions.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::GameError;

/// Alphabet for session identifiers: uppercase alphanumeric.
const SESSION_ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of a session identifier in characters.
pub(crate) const SESSION_ID_LEN: usize = 5;

/// A unique identifier for a session.
///
/// 5 uppercase alphanumeric characters, chosen by the session creator.
/// Sufficiently collision-resistant for casual play; collisions are not
/// handled.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Create a new random SessionId.
    pub fn random() -> Self {
        let mut bytes = [0u8; SESSION_ID_LEN];
        getrandom::getrandom(&mut bytes).expect("getrandom failed");
        let id: String = bytes
            .iter()
            .map(|b| SESSION_ID_ALPHABET[*b as usize % SESSION_ID_ALPHABET.len()] as char)
            .collect();
        Self(id)
    }

    /// Parse a SessionId from a string, validating length and charset.
    ///
    /// Lowercase input is accepted and uppercased, matching how ids are
    /// typed in by a joining player.
    pub fn parse(s: &str) -> Result<Self, GameError> {
        let upper = s.trim().to_ascii_uppercase();
        if upper.len() != SESSION_ID_LEN
            || !upper.bytes().all(|b| SESSION_ID_ALPHABET.contains(&b))
        {
            return Err(GameError::InvalidSessionId(s.to_string()));
        }
        Ok(Self(upper))
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SessionId {
    type Error = GameError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> String {
        id.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.0)
    }
}

/// A player color within a session.
///
/// The only identity a participant has; no cross-session identity is
/// modeled.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Color {
    /// White, assigned to the session host.
    White,
    /// Black, assigned to the joining guest.
    Black,
}

impl Color {
    /// The opposing color.
    pub fn opponent(self) -> Self {
        match self {
            Self::White => Self::Black,
            Self::Black => Self::White,
        }
    }

    /// The single-letter wire form, `"w"` or `"b"`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::White => "w",
            Self::Black => "b",
        }
    }

    /// Parse the single-letter wire form.
    pub fn parse(s: &str) -> Result<Self, GameError> {
        match s {
            "w" => Ok(Self::White),
            "b" => Ok(Self::Black),
            other => Err(GameError::InvalidColor(other.to_string())),
        }
    }
}

impl TryFrom<String> for Color {
    type Error = GameError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Color> for String {
    fn from(c: Color) -> String {
        c.as_str().to_string()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Debug for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Color({})", self.as_str())
    }
}

/// A board square in algebraic notation (e.g. `"e4"`).
///
/// Opaque to the session core; only the rules engine interprets it.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Square(String);

impl Square {
    /// Wrap a square name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the square name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Square {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Square({})", self.0)
    }
}

/// Main-clock time control, chosen at session creation.
///
/// One of a small enumerated set of seconds-per-main-clock values. The value
/// doubles as the matchmaking queue bucket key: players are only ever paired
/// within the same time control.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TimeControl {
    /// 5 minutes per side.
    Blitz,
    /// 10 minutes per side.
    Rapid,
    /// 15 minutes per side.
    Classical,
}

impl TimeControl {
    /// Total main-clock seconds per side.
    pub fn main_clock_secs(self) -> u32 {
        match self {
            Self::Blitz => 300,
            Self::Rapid => 600,
            Self::Classical => 900,
        }
    }

    /// The queue bucket key for this time control.
    pub fn bucket(self) -> &'static str {
        match self {
            Self::Blitz => "300",
            Self::Rapid => "600",
            Self::Classical => "900",
        }
    }

    /// Parse a bucket key back into a time control.
    pub fn parse(s: &str) -> Result<Self, GameError> {
        match s {
            "300" => Ok(Self::Blitz),
            "600" => Ok(Self::Rapid),
            "900" => Ok(Self::Classical),
            other => Err(GameError::InvalidTimeControl(other.to_string())),
        }
    }
}

impl TryFrom<String> for TimeControl {
    type Error = GameError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<TimeControl> for String {
    fn from(tc: TimeControl) -> String {
        tc.bucket().to_string()
    }
}

impl fmt::Display for TimeControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.bucket())
    }
}

impl fmt::Debug for TimeControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimeControl({})", self.bucket())
    }
}
