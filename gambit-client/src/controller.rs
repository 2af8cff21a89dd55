//! Session controller: one peer's view of a live session.
//!
//! The controller is a single actor. Clock ticks, store notifications, and
//! user commands all funnel into one channel and are handled strictly in
//! arrival order, so no transition ever races another within a peer. Races
//! BETWEEN peers are resolved by the store's first-write-wins rule on the
//! status field plus the terminal-absorbing state machine.
//!
//! The controller is optimistic: local moves apply immediately and the
//! store write trails behind. A failed write is logged and dropped; the
//! next observed remote snapshot reconciles whatever diverged.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use gambit_core::{Action, ClockEngine, Event, Outcome, SessionPhase, TickOutcome};
use gambit_types::{
    Color, EndReason, GameError, SessionDoc, SessionId, SessionPatch, SessionStatus, Square,
};

use crate::config::ClientConfig;
use crate::rules::{Promotion, RulesEngine};
use crate::store::{session_path, SessionStore, WatchId};

/// Notifications surfaced to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The current selection changed. An empty selection clears the
    /// highlight.
    SelectionChanged {
        /// The selected square, if any.
        selected: Option<Square>,
        /// Legal destinations to highlight.
        destinations: Vec<Square>,
    },
    /// Both peers are attached and the clocks are running.
    Started,
    /// The board position changed (local move or observed remote move).
    BoardChanged {
        /// The new serialized position.
        board: String,
    },
    /// The named color's king came under check.
    Check {
        /// The checked color.
        color: Color,
    },
    /// One clock tick elapsed while in play.
    ClockTick {
        /// White's remaining main-clock seconds.
        main_w: u32,
        /// Black's remaining main-clock seconds.
        main_b: u32,
        /// Remaining shared move-clock seconds.
        move_clock: u32,
        /// The side to move.
        turn: Color,
    },
    /// The session reached its terminal state. Emitted exactly once.
    Ended {
        /// The recorded reason.
        reason: EndReason,
        /// This peer's side of the result.
        outcome: Outcome,
    },
}

enum Msg {
    Select(Square),
    Resign,
    Quit,
    Tick,
    Remote(Value),
}

/// Handle for driving a running [`SessionController`].
///
/// All methods are fire-and-forget; once the session has ended the
/// controller is gone and sends are silently dropped, mirroring the no-op
/// contract for post-end input.
#[derive(Clone)]
pub struct SessionHandle {
    tx: UnboundedSender<Msg>,
}

impl SessionHandle {
    /// Tap a square: select a piece, retarget, move, or clear, depending on
    /// the current selection.
    pub fn select(&self, square: Square) {
        let _ = self.tx.send(Msg::Select(square));
    }

    /// Resign the game.
    pub fn resign(&self) {
        let _ = self.tx.send(Msg::Resign);
    }

    /// Leave cleanly, lowering this peer's presence flag if the session is
    /// still in play.
    pub fn quit(&self) {
        let _ = self.tx.send(Msg::Quit);
    }
}

/// The actor state behind a [`SessionHandle`].
pub struct SessionController<R: RulesEngine, S: SessionStore> {
    store: Arc<S>,
    rules: Arc<R>,
    path: String,
    my_color: Color,
    phase: SessionPhase,
    clocks: ClockEngine,
    board: R::State,
    board_wire: String,
    selected: Option<Square>,
    peer_present: bool,
    events: UnboundedSender<SessionEvent>,
    watch: WatchId,
    ticker: JoinHandle<()>,
}

impl<R: RulesEngine, S: SessionStore> SessionController<R, S> {
    /// Attach to the session document and start the actor.
    ///
    /// Subscribes to the document, then reads the current snapshot,
    /// registers the dead-man's-switch that lowers this peer's presence
    /// flag on connection loss, and raises the flag. Returns the command
    /// handle and the event stream.
    pub async fn spawn(
        store: Arc<S>,
        rules: Arc<R>,
        config: &ClientConfig,
        session_id: &SessionId,
        my_color: Color,
    ) -> Result<(SessionHandle, UnboundedReceiver<SessionEvent>), GameError> {
        let path = session_path(&config.store_root, session_id);

        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        // Subscribe before the initial read. A write landing between the
        // two is then delivered as a snapshot instead of falling into a
        // notification gap; replayed snapshots are idempotent anyway.
        // Snapshots are forwarded into the actor's single channel so they
        // serialize with ticks and user commands.
        let (value_tx, mut value_rx) = mpsc::unbounded_channel();
        let watch = store.subscribe(&path, value_tx).await?;
        let forward = msg_tx.clone();
        tokio::spawn(async move {
            while let Some(value) = value_rx.recv().await {
                if forward.send(Msg::Remote(value)).is_err() {
                    break;
                }
            }
        });

        let (doc, board, phase, clocks) =
            match Self::attach(&store, &rules, config, &path, session_id, my_color).await {
                Ok(parts) => parts,
                Err(err) => {
                    store.unsubscribe(watch).await;
                    return Err(err);
                }
            };

        // A peer attaching straight into a live game (the guest path, or a
        // reconnecting host) sees the start immediately; the waiting host
        // gets it when the attach is observed.
        if phase.is_playing() {
            let _ = event_tx.send(SessionEvent::Started);
        }

        let interval = Duration::from_millis(config.tick_interval_ms);
        let tick_tx = msg_tx.clone();
        let ticker = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if tick_tx.send(Msg::Tick).is_err() {
                    break;
                }
            }
        });

        let board_wire = doc.board.clone();
        let peer_present = doc.presence(my_color.opponent());
        let controller = Self {
            store,
            rules,
            path,
            my_color,
            phase,
            clocks,
            board,
            board_wire,
            selected: None,
            peer_present,
            events: event_tx,
            watch,
            ticker,
        };
        info!(session = %session_id, color = %my_color, "session attached");
        tokio::spawn(controller.run(msg_rx));

        Ok((SessionHandle { tx: msg_tx }, event_rx))
    }

    /// Read and validate the session document, then raise this peer's
    /// presence with the dead-man's-switch armed.
    async fn attach(
        store: &Arc<S>,
        rules: &Arc<R>,
        config: &ClientConfig,
        path: &str,
        session_id: &SessionId,
        my_color: Color,
    ) -> Result<(SessionDoc, R::State, SessionPhase, ClockEngine), GameError> {
        let doc = store
            .read_once(path)
            .await?
            .ok_or_else(|| GameError::SessionNotFound(session_id.to_string()))?;
        let doc: SessionDoc = serde_json::from_value(doc).map_err(GameError::Serialization)?;

        if doc.status.is_ended() {
            return Err(GameError::SessionAlreadyEnded);
        }

        let board = rules
            .deserialize(&doc.board)
            .ok_or_else(|| GameError::InvalidBoard(doc.board.clone()))?;

        let phase = if doc.status == SessionStatus::Playing {
            SessionPhase::Playing
        } else {
            SessionPhase::Waiting
        };

        let mut clocks = ClockEngine::with_ceiling(
            doc.time_control.main_clock_secs(),
            config.move_clock_secs,
        );
        clocks.sync_from(&doc);

        // Presence: the store lowers the flag for us if we vanish; we raise
        // it now and lower it ourselves on a clean quit.
        let presence_patch = |up: bool| match my_color {
            Color::White => SessionPatch {
                presence_host: Some(up),
                ..SessionPatch::default()
            },
            Color::Black => SessionPatch {
                presence_guest: Some(up),
                ..SessionPatch::default()
            },
        };
        let down = serde_json::to_value(presence_patch(false)).map_err(GameError::Serialization)?;
        let up = serde_json::to_value(presence_patch(true)).map_err(GameError::Serialization)?;
        store.on_disconnect_set(path, down).await?;
        store.write(path, up).await?;

        Ok((doc, board, phase, clocks))
    }

    async fn run(mut self, mut rx: UnboundedReceiver<Msg>) {
        while let Some(msg) = rx.recv().await {
            let done = match msg {
                Msg::Select(square) => self.handle_select(square).await,
                Msg::Resign => self.dispatch(Event::ResignRequested { color: self.my_color }).await,
                Msg::Tick => self.handle_tick().await,
                Msg::Remote(value) => self.handle_remote(value).await,
                Msg::Quit => {
                    self.handle_quit().await;
                    true
                }
            };
            if done {
                break;
            }
        }
        self.ticker.abort();
        self.store.unsubscribe(self.watch).await;
    }

    /// Tap-to-select, tap-to-move. Inputs that make no sense (empty square,
    /// opponent's piece, not our turn) are absorbed silently.
    async fn handle_select(&mut self, square: Square) -> bool {
        if !self.phase.is_playing() {
            return false;
        }

        match self.selected.take() {
            None => self.try_select(square),
            Some(from) if from == square => {
                // Tapping the selection clears it.
                self.emit_selection(None);
            }
            Some(from) => {
                let mine = self
                    .rules
                    .piece_at(&self.board, &square)
                    .is_some_and(|p| p.color == self.my_color);
                if mine {
                    self.try_select(square);
                } else if self
                    .rules
                    .legal_moves(&self.board, &from)
                    .contains(&square)
                {
                    return self.play_move(from, square).await;
                } else {
                    // Illegal destination: clear, don't error.
                    self.emit_selection(None);
                }
            }
        }
        false
    }

    fn try_select(&mut self, square: Square) {
        let selectable = self.rules.turn_of(&self.board) == self.my_color
            && self
                .rules
                .piece_at(&self.board, &square)
                .is_some_and(|p| p.color == self.my_color);
        if selectable {
            let destinations = self.rules.legal_moves(&self.board, &square);
            // A piece with nowhere to go cannot be picked up.
            if destinations.is_empty() {
                self.emit_selection(None);
                return;
            }
            self.selected = Some(square.clone());
            let _ = self.events.send(SessionEvent::SelectionChanged {
                selected: Some(square),
                destinations,
            });
        } else {
            self.emit_selection(None);
        }
    }

    fn emit_selection(&mut self, selected: Option<Square>) {
        self.selected = selected.clone();
        let _ = self.events.send(SessionEvent::SelectionChanged {
            selected,
            destinations: Vec::new(),
        });
    }

    async fn play_move(&mut self, from: Square, to: Square) -> bool {
        // Pawns reaching the last rank always promote to a queen.
        let Some(next) = self
            .rules
            .apply_move(&self.board, &from, &to, Promotion::Queen)
        else {
            self.emit_selection(None);
            return false;
        };

        self.board_wire = self.rules.serialize(&next);
        self.board = next;
        self.clocks.reset_move_clock();
        self.emit_selection(None);
        let _ = self.events.send(SessionEvent::BoardChanged {
            board: self.board_wire.clone(),
        });

        let (main_w, main_b) = self.clocks.snapshot();
        let patch = SessionPatch::board_update(self.board_wire.clone(), main_w, main_b);
        self.write_patch(patch).await;
        debug!(from = %from, to = %to, "move played");

        let opponent = self.my_color.opponent();
        if self.rules.is_checkmate(&self.board, opponent) {
            return self
                .dispatch(Event::MateDelivered { winner: self.my_color })
                .await;
        }
        if self.rules.is_check(&self.board, opponent) {
            let _ = self.events.send(SessionEvent::Check { color: opponent });
        }
        false
    }

    async fn handle_tick(&mut self) -> bool {
        if !self.phase.is_playing() {
            return false;
        }
        let turn = self.rules.turn_of(&self.board);
        let outcome = self.clocks.tick(turn);
        let (main_w, main_b) = self.clocks.snapshot();
        let _ = self.events.send(SessionEvent::ClockTick {
            main_w,
            main_b,
            move_clock: self.clocks.move_clock(),
            turn,
        });
        match outcome {
            TickOutcome::Running => false,
            TickOutcome::MainExpired(color) => {
                self.dispatch(Event::MainClockExpired { color }).await
            }
            TickOutcome::MoveExpired(turn) => {
                self.dispatch(Event::MoveClockExpired { turn }).await
            }
        }
    }

    /// Apply an observed store snapshot. Snapshots carry the whole
    /// document and may repeat or arrive late; every branch here is
    /// idempotent, so replays are harmless.
    async fn handle_remote(&mut self, value: Value) -> bool {
        if value.is_null() {
            warn!(path = %self.path, "session document removed while attached");
            return false;
        }
        let doc: SessionDoc = match serde_json::from_value(value) {
            Ok(doc) => doc,
            Err(err) => {
                warn!(path = %self.path, error = %err, "malformed session snapshot");
                return false;
            }
        };

        // Terminal status wins over everything else in the snapshot.
        if let Some(reason) = doc.status.end_reason() {
            return self.dispatch(Event::RemoteEnded { reason }).await;
        }

        if !self.phase.is_playing()
            && (doc.has_opponent || doc.status == SessionStatus::Playing)
        {
            self.peer_present = doc.presence(self.my_color.opponent());
            if self.dispatch(Event::OpponentAttached).await {
                return true;
            }
        }

        if doc.board != self.board_wire {
            let Some(board) = self.rules.deserialize(&doc.board) else {
                warn!(path = %self.path, "unreadable board in snapshot, keeping local position");
                return false;
            };
            self.board = board;
            self.board_wire = doc.board.clone();
            // Remote moves are the reconciliation point: adopt the mover's
            // clock snapshot and restart the move clock.
            self.clocks.sync_from(&doc);
            self.emit_selection(None);
            let _ = self.events.send(SessionEvent::BoardChanged {
                board: self.board_wire.clone(),
            });
            if self.rules.is_check(&self.board, self.my_color) {
                let _ = self.events.send(SessionEvent::Check {
                    color: self.my_color,
                });
            }
        }

        // A presence flag dropping from true to false while in play is the
        // peer's dead-man's-switch firing.
        let peer_now = doc.presence(self.my_color.opponent());
        let vanished = self.peer_present && !peer_now && self.phase.is_playing();
        self.peer_present = peer_now;
        if vanished {
            return self
                .dispatch(Event::PeerVanished {
                    color: self.my_color.opponent(),
                })
                .await;
        }
        false
    }

    async fn handle_quit(&mut self) {
        // After the end the document is frozen; only a live session gets
        // the presence flag lowered.
        if !self.phase.is_ended() {
            let patch = match self.my_color {
                Color::White => SessionPatch {
                    presence_host: Some(false),
                    ..SessionPatch::default()
                },
                Color::Black => SessionPatch {
                    presence_guest: Some(false),
                    ..SessionPatch::default()
                },
            };
            self.write_patch(patch).await;
            info!(path = %self.path, "left session");
        }
    }

    /// Feed the lifecycle state machine and execute whatever it demands.
    /// Returns true once the session is over and the actor should stop.
    async fn dispatch(&mut self, event: Event) -> bool {
        let (phase, actions) = self.phase.on_event(event);
        self.phase = phase;
        let mut done = false;
        for action in actions {
            match action {
                Action::StartClocks => {
                    self.clocks.reset_move_clock();
                    info!(path = %self.path, "opponent attached, clocks running");
                    let _ = self.events.send(SessionEvent::Started);
                }
                Action::WriteEnded { reason } => {
                    self.write_patch(SessionPatch::ended(reason)).await;
                }
                Action::EmitEnded { reason } => {
                    let outcome = Outcome::derive(reason, self.my_color);
                    info!(path = %self.path, reason = %reason, outcome = ?outcome, "session ended");
                    let _ = self.events.send(SessionEvent::Ended { reason, outcome });
                    done = true;
                }
            }
        }
        done
    }

    /// Best-effort store write. Failures are logged and dropped; local
    /// state stands and reconciliation catches up later.
    async fn write_patch(&self, patch: SessionPatch) {
        let value = match serde_json::to_value(&patch) {
            Ok(value) => value,
            Err(err) => {
                warn!(path = %self.path, error = %err, "unserializable patch");
                return;
            }
        };
        if let Err(err) = self.store.write(&self.path, value).await {
            warn!(path = %self.path, error = %err, "store write failed, keeping local state");
        }
    }
}
