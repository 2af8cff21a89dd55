//! # gambit-types
//!
//! Shared types for the Gambit two-player session protocol.
//!
//! This crate provides the foundational types used across all Gambit crates:
//! - [`SessionId`], [`Color`], [`Square`], [`TimeControl`] - Identity types
//! - [`SessionDoc`], [`SessionPatch`] - The shared store document and its
//!   merge-style partial update
//! - [`SessionStatus`], [`EndReason`] - Lifecycle status with self-describing
//!   terminal reasons
//! - [`QueueEntry`] - A matchmaking queue entry
//! - [`GameError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod session;

pub use error::GameError;
pub use ids::{Color, SessionId, Square, TimeControl};
pub use session::{EndReason, QueueEntry, SessionDoc, SessionPatch, SessionStatus};
