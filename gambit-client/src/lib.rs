//! Client-side session machinery for Gambit.
//!
//! This crate turns the pure logic of `gambit-core` into a running peer:
//! - [`store`]: the [`SessionStore`] trait over the shared document store
//!   (the only transport), plus an in-memory mock for tests;
//! - [`rules`]: the [`RulesEngine`] seam the controller consults for
//!   everything board-shaped;
//! - [`matchmaker`]: pairing through queue buckets, plus private sessions;
//! - [`controller`]: the single-actor [`SessionController`] driving one
//!   peer through a session from attach to terminal outcome.
//!
//! A typical flow: build a [`Matchmaker`], call `seek` to obtain a
//! [`Pairing`], then [`SessionController::spawn`] with the paired id and
//! color, and consume [`SessionEvent`]s while feeding taps into the
//! [`SessionHandle`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod controller;
pub mod matchmaker;
pub mod rules;
pub mod store;

pub use config::{ClientConfig, ConfigError};
pub use controller::{SessionController, SessionEvent, SessionHandle};
pub use matchmaker::{Matchmaker, Pairing};
pub use rules::{MockRules, Piece, Promotion, RulesEngine};
pub use store::{MockStore, MockStoreHandle, SessionStore, StoreError, WatchId};
