//! # gambit-core
//!
//! Pure session logic for Gambit (no I/O, instant tests).
//!
//! This crate implements the state machines and algorithms for two-player
//! session coordination without any network or timer I/O, enabling fast
//! unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about state transitions
//!
//! The actual I/O (store writes, one-second timers) is performed by
//! `gambit-client`, which interprets the actions produced by these state
//! machines.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod lifecycle;
pub mod matchmaking;
pub mod outcome;

pub use clock::{ClockEngine, TickOutcome, MOVE_CLOCK_SECS};
pub use lifecycle::{Action, Event, SessionPhase};
pub use matchmaking::{claimable, entry_expired, QUEUE_ENTRY_TTL_MS};
pub use outcome::Outcome;
