//! Session lifecycle state machine.
//!
//! This module provides a pure, side-effect-free state machine for the
//! `waiting → playing → ended` session lifecycle. The state machine takes
//! events as input and produces a new state plus a list of actions to
//! execute.
//!
//! The actual I/O (store writes, clock timers, user notification) is
//! performed by gambit-client, not by this module. This enables instant
//! unit testing without store mocks.
//!
//! Two invariants live here:
//! - Transitions are one-directional; no event moves a session backward.
//! - The terminal state absorbs everything. Once `Ended`, every further
//!   event produces no actions, which makes concurrent terminal writes from
//!   both peers safe: whichever reason is observed first sticks, and any
//!   later end-reason observation is a no-op.

use gambit_types::{Color, EndReason};

/// Session lifecycle state machine - NO I/O, just state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Host created the session; waiting for a guest.
    Waiting,
    /// Both peers attached; clocks running.
    Playing,
    /// Terminal, with the single recorded reason.
    Ended {
        /// The reason that won the first-write race.
        reason: EndReason,
    },
}

impl SessionPhase {
    /// Create a new state machine in the Waiting state.
    pub fn new() -> Self {
        Self::Waiting
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller (gambit-client)
    /// is responsible for executing the returned actions.
    pub fn on_event(self, event: Event) -> (Self, Vec<Action>) {
        match (self, event) {
            // From Waiting
            (Self::Waiting, Event::OpponentAttached) => {
                (Self::Playing, vec![Action::StartClocks])
            }

            // Local terminal causes. The local peer both writes the reason
            // to the store and surfaces the outcome immediately; it does not
            // wait for its own write to echo back.
            (Self::Playing, Event::MateDelivered { winner }) => {
                Self::end_locally(EndReason::Checkmate { winner })
            }
            (Self::Playing, Event::MainClockExpired { color }) => {
                Self::end_locally(EndReason::Timeout { loser: color })
            }
            (Self::Playing, Event::MoveClockExpired { turn }) => {
                Self::end_locally(EndReason::Abandoned { loser: turn })
            }
            (Self::Playing, Event::ResignRequested { color }) => {
                Self::end_locally(EndReason::Resigned { loser: color })
            }
            (Self::Playing, Event::PeerVanished { color }) => {
                Self::end_locally(EndReason::Abandoned { loser: color })
            }

            // A terminal status observed from the store. Already recorded
            // remotely, so render it without writing it back.
            (Self::Waiting | Self::Playing, Event::RemoteEnded { reason }) => (
                Self::Ended { reason },
                vec![Action::EmitEnded { reason }],
            ),

            // Re-observing the attach flag while playing is harmless.
            (Self::Playing, Event::OpponentAttached) => (Self::Playing, vec![]),

            // The terminal state absorbs everything, including a second
            // RemoteEnded with a different reason: first writer wins.
            (ended @ Self::Ended { .. }, _) => (ended, vec![]),

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    fn end_locally(reason: EndReason) -> (Self, Vec<Action>) {
        (
            Self::Ended { reason },
            vec![
                Action::WriteEnded { reason },
                Action::EmitEnded { reason },
            ],
        )
    }

    /// Check if the session is in play.
    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing)
    }

    /// Check if the session reached its terminal state.
    pub fn is_ended(&self) -> bool {
        matches!(self, Self::Ended { .. })
    }

    /// The recorded end reason, if terminal.
    pub fn end_reason(&self) -> Option<EndReason> {
        match self {
            Self::Ended { reason } => Some(*reason),
            _ => None,
        }
    }
}

impl Default for SessionPhase {
    fn default() -> Self {
        Self::new()
    }
}

/// Events that can occur in the session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// The guest attached (host observes `has_opponent`, guest fires this on
    /// successful join).
    OpponentAttached,
    /// A locally applied move delivered checkmate.
    MateDelivered {
        /// The mating (winning) color.
        winner: Color,
    },
    /// A main clock reached zero for the side to move.
    MainClockExpired {
        /// The flagged color.
        color: Color,
    },
    /// The shared move clock reached zero.
    MoveClockExpired {
        /// The color whose turn it was.
        turn: Color,
    },
    /// The local player resigned.
    ResignRequested {
        /// The resigning color.
        color: Color,
    },
    /// The remote peer's presence flag went false while the session was
    /// still in play.
    PeerVanished {
        /// The departed color.
        color: Color,
    },
    /// A terminal status was observed in a store snapshot.
    RemoteEnded {
        /// The recorded reason.
        reason: EndReason,
    },
}

/// Actions to be executed by gambit-client.
///
/// These are instructions, not side effects. The client interprets these
/// and performs the actual store writes and notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Begin ticking the main and move clocks.
    StartClocks,
    /// Write the terminal status to the store (fire-and-forget; the store's
    /// first-write-wins rule on `status` resolves concurrent writers).
    WriteEnded {
        /// The reason to record.
        reason: EndReason,
    },
    /// Surface the terminal outcome to the presentation layer, exactly once.
    EmitEnded {
        /// The recorded reason.
        reason: EndReason,
    },
}
