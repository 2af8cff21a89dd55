//! Clock engine: two main clocks plus the shared move clock.
//!
//! Clocks are advisory and locally computed - there is no authoritative
//! timekeeper. Each peer ticks its own engine once per wall-clock second
//! while the session is in play, and both peers independently race to
//! declare expiry; the store's first-write-wins rule on `status` makes that
//! race safe.
//!
//! Drift between peers is corrected by reconciliation: whenever a remote
//! board write is observed, both main clocks are overwritten from the store
//! snapshot and the move clock is unconditionally reset.

use gambit_types::{Color, SessionDoc};

/// Ceiling of the shared move clock, in seconds. Restarted to this value
/// after every accepted move, by either side.
pub const MOVE_CLOCK_SECS: u32 = 35;

/// Outcome of one one-second tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Time remains on both clocks.
    Running,
    /// The side to move ran out of total thinking time.
    MainExpired(Color),
    /// The side to move exceeded the per-move limit.
    MoveExpired(Color),
}

/// Countdown state for one session, owned by one peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockEngine {
    main_w: u32,
    main_b: u32,
    move_clock: u32,
    move_ceiling: u32,
}

impl ClockEngine {
    /// Create an engine with both main clocks at `main_secs` and the move
    /// clock at the default ceiling.
    pub fn new(main_secs: u32) -> Self {
        Self::with_ceiling(main_secs, MOVE_CLOCK_SECS)
    }

    /// Create an engine with an explicit move-clock ceiling (a config
    /// tunable; the protocol default is [`MOVE_CLOCK_SECS`]).
    pub fn with_ceiling(main_secs: u32, move_ceiling: u32) -> Self {
        Self {
            main_w: main_secs,
            main_b: main_secs,
            move_clock: move_ceiling,
            move_ceiling,
        }
    }

    /// Advance both countdowns by one second of wall-clock time for the
    /// side to move.
    ///
    /// The main clock of `turn` decrements; the opponent's main clock is
    /// untouched. If both countdowns hit zero on the same tick the main
    /// clock wins, so a flag fall is reported as a timeout rather than an
    /// abandonment.
    pub fn tick(&mut self, turn: Color) -> TickOutcome {
        let main = self.main_mut(turn);
        *main = main.saturating_sub(1);
        if *main == 0 {
            return TickOutcome::MainExpired(turn);
        }

        self.move_clock = self.move_clock.saturating_sub(1);
        if self.move_clock == 0 {
            return TickOutcome::MoveExpired(turn);
        }

        TickOutcome::Running
    }

    /// Restart the move clock to its ceiling. Called after every accepted
    /// move, local or remote, and whenever a new turn begins.
    pub fn reset_move_clock(&mut self) {
        self.move_clock = self.move_ceiling;
    }

    /// Overwrite both main clocks from a store snapshot and reset the move
    /// clock. Called on every observed remote board write.
    pub fn sync_from(&mut self, doc: &SessionDoc) {
        self.main_w = doc.main_clock_w;
        self.main_b = doc.main_clock_b;
        self.reset_move_clock();
    }

    /// Remaining main-clock seconds for a color.
    pub fn main_clock(&self, color: Color) -> u32 {
        match color {
            Color::White => self.main_w,
            Color::Black => self.main_b,
        }
    }

    /// Remaining seconds on the shared move clock.
    pub fn move_clock(&self) -> u32 {
        self.move_clock
    }

    /// Both main-clock values as `(white, black)`, the snapshot written to
    /// the store alongside a move.
    pub fn snapshot(&self) -> (u32, u32) {
        (self.main_w, self.main_b)
    }

    fn main_mut(&mut self, color: Color) -> &mut u32 {
        match color {
            Color::White => &mut self.main_w,
            Color::Black => &mut self.main_b,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gambit_types::TimeControl;

    #[test]
    fn tick_decrements_only_side_to_move() {
        let mut clocks = ClockEngine::new(300);
        assert_eq!(clocks.tick(Color::White), TickOutcome::Running);
        assert_eq!(clocks.main_clock(Color::White), 299);
        assert_eq!(clocks.main_clock(Color::Black), 300);
    }

    #[test]
    fn tick_decrements_move_clock() {
        let mut clocks = ClockEngine::new(300);
        clocks.tick(Color::White);
        clocks.tick(Color::White);
        assert_eq!(clocks.move_clock(), MOVE_CLOCK_SECS - 2);
    }

    #[test]
    fn main_clock_expiry_reported_for_side_to_move() {
        let mut clocks = ClockEngine::new(2);
        assert_eq!(clocks.tick(Color::Black), TickOutcome::Running);
        assert_eq!(clocks.tick(Color::Black), TickOutcome::MainExpired(Color::Black));
        assert_eq!(clocks.main_clock(Color::Black), 0);
        // White is untouched.
        assert_eq!(clocks.main_clock(Color::White), 2);
    }

    #[test]
    fn expired_main_clock_stays_expired() {
        let mut clocks = ClockEngine::new(1);
        assert_eq!(clocks.tick(Color::White), TickOutcome::MainExpired(Color::White));
        // Ticking an exhausted clock keeps reporting expiry; the terminal
        // state machine absorbs the duplicates.
        assert_eq!(clocks.tick(Color::White), TickOutcome::MainExpired(Color::White));
        assert_eq!(clocks.main_clock(Color::White), 0);
    }

    #[test]
    fn move_clock_expires_after_ceiling_seconds() {
        let mut clocks = ClockEngine::new(300);
        for _ in 0..MOVE_CLOCK_SECS - 1 {
            assert_eq!(clocks.tick(Color::Black), TickOutcome::Running);
        }
        assert_eq!(
            clocks.tick(Color::Black),
            TickOutcome::MoveExpired(Color::Black)
        );
    }

    #[test]
    fn reset_restores_move_clock_to_ceiling() {
        let mut clocks = ClockEngine::new(300);
        for _ in 0..10 {
            clocks.tick(Color::White);
        }
        assert_eq!(clocks.move_clock(), MOVE_CLOCK_SECS - 10);
        clocks.reset_move_clock();
        assert_eq!(clocks.move_clock(), MOVE_CLOCK_SECS);
    }

    #[test]
    fn custom_ceiling_respected() {
        let mut clocks = ClockEngine::with_ceiling(300, 10);
        for _ in 0..9 {
            assert_eq!(clocks.tick(Color::White), TickOutcome::Running);
        }
        assert_eq!(
            clocks.tick(Color::White),
            TickOutcome::MoveExpired(Color::White)
        );
        clocks.reset_move_clock();
        assert_eq!(clocks.move_clock(), 10);
    }

    #[test]
    fn main_expiry_beats_move_expiry_on_same_tick() {
        // Main at 1, move at 1: the same tick would expire both. Timeout
        // must win.
        let mut clocks = ClockEngine::with_ceiling(1, 1);
        assert_eq!(
            clocks.tick(Color::White),
            TickOutcome::MainExpired(Color::White)
        );
    }

    #[test]
    fn sync_overwrites_main_clocks_and_resets_move_clock() {
        let mut clocks = ClockEngine::new(300);
        for _ in 0..20 {
            clocks.tick(Color::White);
        }

        let mut doc = SessionDoc::new_waiting(TimeControl::Blitz, "board".into());
        doc.main_clock_w = 250;
        doc.main_clock_b = 290;
        clocks.sync_from(&doc);

        assert_eq!(clocks.main_clock(Color::White), 250);
        assert_eq!(clocks.main_clock(Color::Black), 290);
        assert_eq!(clocks.move_clock(), MOVE_CLOCK_SECS);
    }

    #[test]
    fn snapshot_matches_clocks() {
        let mut clocks = ClockEngine::new(300);
        clocks.tick(Color::White);
        clocks.tick(Color::White);
        assert_eq!(clocks.snapshot(), (298, 300));
    }
}
