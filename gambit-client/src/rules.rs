//! Rules engine seam.
//!
//! The session layer never interprets a board. Everything rule-shaped -
//! whose turn it is, which destinations a piece may reach, whether a
//! position is check or mate - goes through [`RulesEngine`], and the board
//! travels through the store as an opaque string owned by the engine.
//!
//! [`MockRules`] is a scriptable table-driven engine for tests: positions
//! are plain strings and every answer is looked up from tables the test
//! populated. No chess knowledge lives in this crate.

use std::collections::{HashMap, HashSet};

use gambit_types::{Color, Square};

/// Promotion piece for a pawn reaching the last rank.
///
/// The session layer always promotes to a queen; the other variants exist
/// so engines expose the full move surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Promotion {
    /// Promote to a queen. The only choice the session layer makes.
    Queen,
    /// Promote to a rook.
    Rook,
    /// Promote to a bishop.
    Bishop,
    /// Promote to a knight.
    Knight,
}

/// A piece on the board, as much as the session layer needs to know of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Piece {
    /// The owning color.
    pub color: Color,
    /// Engine-defined kind tag (e.g. `'p'`, `'q'`).
    pub kind: char,
}

/// The game-rules oracle the session controller consults.
///
/// Implementations must be deterministic: both peers hold the same engine,
/// and the board string one peer writes must deserialize to an equivalent
/// position on the other.
pub trait RulesEngine: Send + Sync + 'static {
    /// An in-memory board position.
    type State: Clone + Send + Sync + 'static;

    /// The starting position.
    fn initial(&self) -> Self::State;

    /// The color to move.
    fn turn_of(&self, state: &Self::State) -> Color;

    /// The piece on a square, if any.
    fn piece_at(&self, state: &Self::State, square: &Square) -> Option<Piece>;

    /// Legal destinations for the piece on `from`. Empty when the square is
    /// empty or the piece is frozen.
    fn legal_moves(&self, state: &Self::State, from: &Square) -> Vec<Square>;

    /// Apply a move, returning the successor position, or `None` if the
    /// move is illegal in this position.
    fn apply_move(
        &self,
        state: &Self::State,
        from: &Square,
        to: &Square,
        promotion: Promotion,
    ) -> Option<Self::State>;

    /// Whether `color`'s king is in check.
    fn is_check(&self, state: &Self::State, color: Color) -> bool;

    /// Whether `color` is checkmated.
    fn is_checkmate(&self, state: &Self::State, color: Color) -> bool;

    /// The wire form written to the store.
    fn serialize(&self, state: &Self::State) -> String;

    /// Parse a wire form, or `None` if it does not describe a position this
    /// engine recognizes.
    fn deserialize(&self, s: &str) -> Option<Self::State>;
}

/// Script-table rules engine for tests.
///
/// Positions are plain strings. Build the script with the `with_*` methods,
/// then hand the engine to a controller; any question the tables do not
/// answer gets the empty/false default.
#[derive(Debug, Clone, Default)]
pub struct MockRules {
    initial: String,
    known: HashSet<String>,
    turns: HashMap<String, Color>,
    pieces: HashMap<(String, String), Piece>,
    moves: HashMap<(String, String), Vec<Square>>,
    transitions: HashMap<(String, String, String), String>,
    checks: HashSet<(String, Color)>,
    mates: HashSet<(String, Color)>,
}

impl MockRules {
    /// An engine whose starting position is `initial`.
    pub fn new(initial: impl Into<String>) -> Self {
        let initial = initial.into();
        let mut known = HashSet::new();
        known.insert(initial.clone());
        Self {
            initial,
            known,
            ..Self::default()
        }
    }

    /// Script whose turn it is in `state` (default: white).
    pub fn with_turn(mut self, state: &str, turn: Color) -> Self {
        self.known.insert(state.to_string());
        self.turns.insert(state.to_string(), turn);
        self
    }

    /// Script a piece sitting on `square` in `state`.
    pub fn with_piece(mut self, state: &str, square: &str, color: Color, kind: char) -> Self {
        self.known.insert(state.to_string());
        self.pieces
            .insert((state.to_string(), square.to_string()), Piece { color, kind });
        self
    }

    /// Script the legal destinations from `from` in `state`.
    pub fn with_moves(mut self, state: &str, from: &str, to: &[&str]) -> Self {
        self.known.insert(state.to_string());
        self.moves.insert(
            (state.to_string(), from.to_string()),
            to.iter().map(|s| Square::from(*s)).collect(),
        );
        self
    }

    /// Script the successor position for a move.
    pub fn with_transition(mut self, state: &str, from: &str, to: &str, next: &str) -> Self {
        self.known.insert(state.to_string());
        self.known.insert(next.to_string());
        self.transitions.insert(
            (state.to_string(), from.to_string(), to.to_string()),
            next.to_string(),
        );
        self
    }

    /// Script `state` as check against `color`.
    pub fn with_check(mut self, state: &str, color: Color) -> Self {
        self.known.insert(state.to_string());
        self.checks.insert((state.to_string(), color));
        self
    }

    /// Script `state` as checkmate against `color` (implies check).
    pub fn with_mate(mut self, state: &str, color: Color) -> Self {
        self.known.insert(state.to_string());
        self.checks.insert((state.to_string(), color));
        self.mates.insert((state.to_string(), color));
        self
    }
}

impl RulesEngine for MockRules {
    type State = String;

    fn initial(&self) -> String {
        self.initial.clone()
    }

    fn turn_of(&self, state: &String) -> Color {
        self.turns.get(state).copied().unwrap_or(Color::White)
    }

    fn piece_at(&self, state: &String, square: &Square) -> Option<Piece> {
        self.pieces
            .get(&(state.clone(), square.as_str().to_string()))
            .copied()
    }

    fn legal_moves(&self, state: &String, from: &Square) -> Vec<Square> {
        self.moves
            .get(&(state.clone(), from.as_str().to_string()))
            .cloned()
            .unwrap_or_default()
    }

    fn apply_move(
        &self,
        state: &String,
        from: &Square,
        to: &Square,
        _promotion: Promotion,
    ) -> Option<String> {
        self.transitions
            .get(&(
                state.clone(),
                from.as_str().to_string(),
                to.as_str().to_string(),
            ))
            .cloned()
    }

    fn is_check(&self, state: &String, color: Color) -> bool {
        self.checks.contains(&(state.clone(), color))
    }

    fn is_checkmate(&self, state: &String, color: Color) -> bool {
        self.mates.contains(&(state.clone(), color))
    }

    fn serialize(&self, state: &String) -> String {
        state.clone()
    }

    fn deserialize(&self, s: &str) -> Option<String> {
        // Only positions the script names are recognizable; anything else
        // is a corrupt board.
        self.known.contains(s).then(|| s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scripted() -> MockRules {
        MockRules::new("start")
            .with_turn("start", Color::White)
            .with_piece("start", "e2", Color::White, 'p')
            .with_moves("start", "e2", &["e3", "e4"])
            .with_transition("start", "e2", "e4", "after-e4")
            .with_turn("after-e4", Color::Black)
    }

    #[test]
    fn scripted_answers_come_back() {
        let rules = scripted();
        let start = rules.initial();
        assert_eq!(rules.turn_of(&start), Color::White);
        assert_eq!(
            rules.piece_at(&start, &Square::from("e2")),
            Some(Piece {
                color: Color::White,
                kind: 'p'
            })
        );
        assert_eq!(
            rules.legal_moves(&start, &Square::from("e2")),
            vec![Square::from("e3"), Square::from("e4")]
        );
    }

    #[test]
    fn unscripted_answers_default() {
        let rules = scripted();
        let start = rules.initial();
        assert_eq!(rules.piece_at(&start, &Square::from("a1")), None);
        assert!(rules.legal_moves(&start, &Square::from("a1")).is_empty());
        assert!(!rules.is_check(&start, Color::White));
        assert!(!rules.is_checkmate(&start, Color::Black));
    }

    #[test]
    fn transitions_produce_successors() {
        let rules = scripted();
        let start = rules.initial();
        let next = rules
            .apply_move(
                &start,
                &Square::from("e2"),
                &Square::from("e4"),
                Promotion::Queen,
            )
            .unwrap();
        assert_eq!(next, "after-e4");
        assert_eq!(rules.turn_of(&next), Color::Black);
    }

    #[test]
    fn unscripted_move_is_rejected() {
        let rules = scripted();
        let start = rules.initial();
        assert!(rules
            .apply_move(
                &start,
                &Square::from("e2"),
                &Square::from("e5"),
                Promotion::Queen
            )
            .is_none());
    }

    #[test]
    fn deserialize_rejects_unknown_positions() {
        let rules = scripted();
        assert_eq!(rules.deserialize("start").as_deref(), Some("start"));
        assert_eq!(rules.deserialize("after-e4").as_deref(), Some("after-e4"));
        assert!(rules.deserialize("garbage").is_none());
    }

    #[test]
    fn mate_implies_check() {
        let rules = MockRules::new("mated").with_mate("mated", Color::Black);
        let state = rules.initial();
        assert!(rules.is_checkmate(&state, Color::Black));
        assert!(rules.is_check(&state, Color::Black));
    }
}
