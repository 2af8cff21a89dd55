//! Symmetric win/loss derivation.
//!
//! Each peer computes "did I win or lose" purely from the recorded end
//! reason and its own color. Neither peer needs to know which peer wrote
//! the reason; `timeout:w` means white lost regardless of the writer.

use gambit_types::{Color, EndReason};

/// The terminal outcome from one peer's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// This peer won.
    Win,
    /// This peer lost.
    Loss,
}

impl Outcome {
    /// Derive the outcome for the peer playing `my_color`.
    pub fn derive(reason: EndReason, my_color: Color) -> Self {
        if reason.winner() == my_color {
            Self::Win
        } else {
            Self::Loss
        }
    }

    /// The opposing peer's outcome.
    pub fn complement(self) -> Self {
        match self {
            Self::Win => Self::Loss,
            Self::Loss => Self::Win,
        }
    }

    /// The banner text the presentation layer shows.
    pub fn banner(self) -> &'static str {
        match self {
            Self::Win => "YOU WIN",
            Self::Loss => "YOU LOSE",
        }
    }
}
