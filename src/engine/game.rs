//! The per-game state machine.
//!
//! `Game` owns a [`Board`], the side to move and the terminal outcome. It
//! filters pseudo-legal moves down to legal ones, applies moves all-or-nothing
//! and re-derives checkmate/stalemate after every accepted ply. Once a
//! terminal outcome is recorded the game accepts nothing further.

use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::engine::attacks;
use crate::engine::board::Board;
use crate::engine::movegen;
use crate::engine::special;
use crate::engine::types::{
    Color, IllegalMoveError, Move, NotationError, Outcome, Piece, PieceType, Position,
};

/// FEN of the standard starting position.
pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

// =========================================================================
// Game
// =========================================================================

/// A chess game: board, side to move and (once finished) its outcome.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Game {
    board: Board,
    side: Color,
    terminal: Option<Outcome>,
}

impl Game {
    // -----------------------------------------------------------------
    // Constructors
    // -----------------------------------------------------------------

    /// A new game from the standard starting position, White to move.
    pub fn new() -> Self {
        Self {
            board: Board::standard(),
            side: Color::White,
            terminal: None,
        }
    }

    /// A game continuing from an arbitrary board with `turn` to move.
    ///
    /// The terminal state is derived immediately, so a board that is already
    /// mate or stalemate for `turn` comes back finished.
    pub fn from_board(board: Board, turn: Color) -> Self {
        let mut game = Self {
            board,
            side: turn,
            terminal: None,
        };
        game.terminal = game.derive_terminal();
        game
    }

    /// Load a position from FEN.
    ///
    /// Accepts the first four fields (placement, side, castling, en passant)
    /// with the move counters optional. Kings and rooks count as unmoved only
    /// where the castling field grants the matching right.
    pub fn from_fen(fen: &str) -> Result<Self, NotationError> {
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if fields.len() != 4 && fields.len() != 6 {
            return Err(NotationError::InvalidFen(format!(
                "expected 4 or 6 fields, got {}",
                fields.len()
            )));
        }

        let mut board = Board::from_placement(fields[0])?;

        for color in [Color::White, Color::Black] {
            let kings = board
                .pieces_of(color)
                .filter(|(_, p)| p.kind == PieceType::King)
                .count();
            if kings != 1 {
                return Err(NotationError::InvalidFen(format!(
                    "{color} must have exactly one king, found {kings}"
                )));
            }
        }

        let side = match fields[1] {
            "w" => Color::White,
            "b" => Color::Black,
            other => {
                return Err(NotationError::InvalidFen(format!(
                    "invalid side to move '{other}'"
                )));
            }
        };

        if fields[2] != "-" {
            for ch in fields[2].chars() {
                let (color, rook_column) = match ch {
                    'K' => (Color::White, 8),
                    'Q' => (Color::White, 1),
                    'k' => (Color::Black, 8),
                    'q' => (Color::Black, 1),
                    _ => {
                        return Err(NotationError::InvalidFen(format!(
                            "invalid castling character '{ch}'"
                        )));
                    }
                };
                let row = color.home_row();
                let king_sq = Position::new(row, 5);
                let rook_sq = Position::new(row, rook_column);
                match (board.get(king_sq), board.get(rook_sq)) {
                    (Some(king), Some(rook))
                        if king == Piece::new(color, PieceType::King).moved()
                            && rook == Piece::new(color, PieceType::Rook).moved() =>
                    {
                        board.set(king_sq, Piece::new(color, PieceType::King));
                        board.set(rook_sq, Piece::new(color, PieceType::Rook));
                    }
                    (Some(king), Some(rook))
                        if !king.has_moved
                            && king.color == color
                            && king.kind == PieceType::King
                            && rook == Piece::new(color, PieceType::Rook).moved() =>
                    {
                        // King already freed by the other right on this side.
                        board.set(rook_sq, Piece::new(color, PieceType::Rook));
                    }
                    _ => {
                        return Err(NotationError::InvalidFen(format!(
                            "castling right '{ch}' without king and rook on their home squares"
                        )));
                    }
                }
            }
        }

        if fields[3] != "-" {
            let target = Position::from_algebraic(fields[3])
                .ok_or_else(|| NotationError::InvalidSquare(fields[3].to_string()))?;
            board.set_en_passant_target(target);
        }

        Ok(Self::from_board(board, side))
    }

    // -----------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Side to move, or `None` once the game is over.
    pub fn turn(&self) -> Option<Color> {
        match self.terminal {
            Some(_) => None,
            None => Some(self.side),
        }
    }

    /// How the game ended, if it has.
    pub fn terminal(&self) -> Option<Outcome> {
        self.terminal
    }

    pub fn is_over(&self) -> bool {
        self.terminal.is_some()
    }

    /// Export the position as six-field FEN with counters `0 1`.
    pub fn to_fen(&self) -> String {
        let side = match self.side {
            Color::White => "w",
            Color::Black => "b",
        };
        let mut castling = String::new();
        for color in [Color::White, Color::Black] {
            let row = color.home_row();
            let king_home = self
                .board
                .get(Position::new(row, 5))
                .is_some_and(|k| k == Piece::new(color, PieceType::King));
            if !king_home {
                continue;
            }
            for (column, letter) in [(8, 'k'), (1, 'q')] {
                if self.board.get(Position::new(row, column))
                    == Some(Piece::new(color, PieceType::Rook))
                {
                    castling.push(match color {
                        Color::White => letter.to_ascii_uppercase(),
                        Color::Black => letter,
                    });
                }
            }
        }
        if castling.is_empty() {
            castling.push('-');
        }
        let en_passant = self
            .board
            .en_passant_target()
            .map_or_else(|| "-".to_string(), Position::to_algebraic);
        format!("{} {side} {castling} {en_passant} 0 1", self.board.placement())
    }

    // -----------------------------------------------------------------
    // Legal move generation
    // -----------------------------------------------------------------

    /// Legal moves for the piece on `from`, whichever side it belongs to.
    ///
    /// Pseudo-legal moves plus castling, minus anything that would leave the
    /// mover's own king attacked. Each candidate is tried on a scratch copy
    /// of the board; the game itself is never touched.
    pub fn legal_moves(&self, from: Position) -> Vec<Move> {
        let Some(piece) = self.board.get(from) else {
            return Vec::new();
        };
        let mut moves = movegen::pseudo_legal_moves(&self.board, from);
        if piece.kind == PieceType::King {
            moves.extend(special::castling_moves(&self.board, from));
        }
        moves.retain(|&mv| self.keeps_king_safe(mv, piece.color));
        moves
    }

    /// Every legal move for `color`.
    pub fn all_legal_moves(&self, color: Color) -> Vec<Move> {
        self.board
            .pieces_of(color)
            .flat_map(|(pos, _)| self.legal_moves(pos))
            .collect()
    }

    fn has_legal_move(&self, color: Color) -> bool {
        self.board
            .pieces_of(color)
            .any(|(pos, _)| !self.legal_moves(pos).is_empty())
    }

    fn keeps_king_safe(&self, mv: Move, color: Color) -> bool {
        let mut probe = self.board.clone();
        special::execute(&mut probe, mv);
        !attacks::is_in_check(&probe, color)
    }

    // -----------------------------------------------------------------
    // Check detection
    // -----------------------------------------------------------------

    pub fn is_in_check(&self, color: Color) -> bool {
        attacks::is_in_check(&self.board, color)
    }

    pub fn is_in_checkmate(&self, color: Color) -> bool {
        self.is_in_check(color) && !self.has_legal_move(color)
    }

    pub fn is_in_stalemate(&self, color: Color) -> bool {
        !self.is_in_check(color) && !self.has_legal_move(color)
    }

    fn derive_terminal(&self) -> Option<Outcome> {
        if self.has_legal_move(self.side) {
            None
        } else if self.is_in_check(self.side) {
            Some(Outcome::Checkmate { winner: !self.side })
        } else {
            Some(Outcome::Stalemate)
        }
    }

    // -----------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------

    /// Play `mv` for the side to move.
    ///
    /// Nothing changes on rejection. On success the turn passes to the
    /// opponent and checkmate/stalemate is evaluated for them.
    pub fn apply_move(&mut self, mv: Move) -> Result<(), IllegalMoveError> {
        if self.terminal.is_some() {
            return Err(IllegalMoveError::GameOver);
        }
        if !mv.is_on_board() {
            return Err(IllegalMoveError::NotLegal);
        }
        let piece = self
            .board
            .get(mv.start)
            .ok_or(IllegalMoveError::NoPieceAtStart)?;
        if piece.color != self.side {
            return Err(IllegalMoveError::WrongTurn);
        }
        special::validate_promotion(&self.board, mv)?;
        if !self.legal_moves(mv.start).contains(&mv) {
            return Err(IllegalMoveError::NotLegal);
        }

        special::execute(&mut self.board, mv);
        self.side = !self.side;
        self.terminal = self.derive_terminal();
        Ok(())
    }

    /// `loser` concedes. The opponent is recorded as the winner.
    pub fn resign(&mut self, loser: Color) -> Result<Outcome, IllegalMoveError> {
        if self.terminal.is_some() {
            return Err(IllegalMoveError::GameOver);
        }
        let outcome = Outcome::Resigned { winner: !loser };
        self.terminal = Some(outcome);
        Ok(outcome)
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

// JSON snapshot sent to clients: `{board, teamTurn, terminal}`.
impl Serialize for Game {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Game", 3)?;
        state.serialize_field("board", &self.board)?;
        state.serialize_field("teamTurn", &self.turn())?;
        state.serialize_field("terminal", &self.terminal)?;
        state.end()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(name: &str) -> Position {
        Position::from_algebraic(name).unwrap()
    }

    fn play(game: &mut Game, coords: &str) {
        let mv = Move::from_coordinates(coords).unwrap();
        game.apply_move(mv)
            .unwrap_or_else(|e| panic!("{coords} rejected: {e}"));
    }

    fn targets(game: &Game, from: &str) -> Vec<String> {
        let mut v: Vec<String> = game
            .legal_moves(sq(from))
            .iter()
            .map(|m| m.end.to_algebraic())
            .collect();
        v.sort();
        v.dedup();
        v
    }

    // -------------------------------------------------------------------
    // Basic flow
    // -------------------------------------------------------------------

    #[test]
    fn new_game_state() {
        let game = Game::new();
        assert_eq!(game.turn(), Some(Color::White));
        assert_eq!(game.terminal(), None);
        assert_eq!(game.all_legal_moves(Color::White).len(), 20);
        assert_eq!(game.all_legal_moves(Color::Black).len(), 20);
        assert_eq!(game.to_fen(), STARTING_FEN);
    }

    #[test]
    fn e2e4_sets_en_passant_and_passes_turn() {
        let mut game = Game::new();
        game.apply_move(Move::new(Position::new(2, 5), Position::new(4, 5)))
            .unwrap();
        assert_eq!(game.board().en_passant_target(), Some(Position::new(3, 5)));
        assert_eq!(game.turn(), Some(Color::Black));
        assert!(game.board().is_empty(sq("e2")));
        let pawn = game.board().get(sq("e4")).unwrap();
        assert_eq!(pawn.kind, PieceType::Pawn);
        assert!(pawn.has_moved);
    }

    #[test]
    fn rejections_leave_game_unchanged() {
        let mut game = Game::new();
        let before = game.clone();

        let cases = [
            (Move::new(sq("e4"), sq("e5")), IllegalMoveError::NoPieceAtStart),
            (Move::new(sq("e7"), sq("e5")), IllegalMoveError::WrongTurn),
            (Move::new(sq("e2"), sq("e5")), IllegalMoveError::NotLegal),
            (Move::new(sq("a1"), sq("a3")), IllegalMoveError::NotLegal),
            (
                Move::with_promotion(sq("e2"), sq("e4"), PieceType::Queen),
                IllegalMoveError::InvalidPromotion,
            ),
        ];
        for (mv, expected) in cases {
            assert_eq!(game.apply_move(mv), Err(expected), "{mv}");
            assert_eq!(game, before, "{mv} mutated the game");
        }
    }

    #[test]
    fn pinned_piece_cannot_move() {
        // Knight on e2 pinned by the rook on e8.
        let game = Game::from_fen("4r1k1/8/8/8/8/8/4N3/4K3 w - - 0 1").unwrap();
        assert!(game.legal_moves(sq("e2")).is_empty());
    }

    #[test]
    fn king_cannot_step_into_attack() {
        let game = Game::from_fen("4k3/8/8/8/8/8/r7/4K3 w - - 0 1").unwrap();
        assert_eq!(targets(&game, "e1"), vec!["d1", "f1"]);
    }

    #[test]
    fn legal_moves_never_leave_own_king_in_check() {
        let fens = [
            STARTING_FEN,
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
            "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1",
        ];
        for fen in fens {
            let game = Game::from_fen(fen).unwrap();
            for color in [Color::White, Color::Black] {
                for mv in game.all_legal_moves(color) {
                    let mut probe = game.board().clone();
                    special::execute(&mut probe, mv);
                    assert!(!attacks::is_in_check(&probe, color), "{fen}: {mv}");
                }
            }
        }
    }

    // -------------------------------------------------------------------
    // Terminal states
    // -------------------------------------------------------------------

    #[test]
    fn fools_mate() {
        let mut game = Game::new();
        for mv in ["f2f3", "e7e5", "g2g4", "d8h4"] {
            play(&mut game, mv);
        }
        assert!(game.is_in_checkmate(Color::White));
        assert_eq!(game.terminal(), Some(Outcome::Checkmate { winner: Color::Black }));
        assert_eq!(game.turn(), None);
    }

    #[test]
    fn scholars_mate() {
        let mut game = Game::new();
        for mv in ["e2e4", "e7e5", "f1c4", "b8c6", "d1h5", "g8f6", "h5f7"] {
            play(&mut game, mv);
        }
        assert!(game.is_in_check(Color::Black));
        assert!(game.is_in_checkmate(Color::Black));
        assert!(!game.is_in_stalemate(Color::Black));
        assert_eq!(game.terminal(), Some(Outcome::Checkmate { winner: Color::White }));
    }

    #[test]
    fn terminal_state_is_absorbing() {
        let mut game = Game::new();
        for mv in ["f2f3", "e7e5", "g2g4", "d8h4"] {
            play(&mut game, mv);
        }
        let before = game.clone();
        assert_eq!(
            game.apply_move(Move::new(sq("a2"), sq("a3"))),
            Err(IllegalMoveError::GameOver)
        );
        assert_eq!(game.resign(Color::White), Err(IllegalMoveError::GameOver));
        assert_eq!(game, before);
    }

    #[test]
    fn stalemate_detection() {
        let game = Game::from_fen("k7/2K5/1Q6/8/8/8/8/8 b - - 0 1").unwrap();
        assert!(game.is_in_stalemate(Color::Black));
        assert!(!game.is_in_checkmate(Color::Black));
        assert_eq!(game.terminal(), Some(Outcome::Stalemate));
    }

    #[test]
    fn stalemate_reached_by_move() {
        let mut game = Game::from_fen("k7/2K5/8/1Q6/8/8/8/8 w - - 0 1").unwrap();
        play(&mut game, "b5b6");
        assert_eq!(game.terminal(), Some(Outcome::Stalemate));
        assert_eq!(game.terminal().and_then(Outcome::winner), None);
    }

    #[test]
    fn resign_records_opponent_as_winner() {
        let mut game = Game::new();
        assert_eq!(
            game.resign(Color::White),
            Ok(Outcome::Resigned { winner: Color::Black })
        );
        assert!(game.is_over());
        assert_eq!(game.turn(), None);
    }

    // -------------------------------------------------------------------
    // Special moves through the state machine
    // -------------------------------------------------------------------

    #[test]
    fn castling_through_game() {
        let mut game = Game::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        assert_eq!(targets(&game, "e1"), vec!["c1", "d1", "d2", "e2", "f1", "f2", "g1"]);
        play(&mut game, "e1g1");
        assert_eq!(game.board().get(sq("f1")).map(|p| p.kind), Some(PieceType::Rook));
        assert_eq!(game.to_fen(), "r3k2r/8/8/8/8/8/8/R4RK1 b kq - 0 1");
    }

    #[test]
    fn castling_rejected_through_attacked_square_moves_nothing() {
        let mut game = Game::from_fen("r4rk1/8/8/8/8/8/8/R3K2R w KQ - 0 1").unwrap();
        let before = game.clone();
        assert_eq!(
            game.apply_move(Move::new(sq("e1"), sq("g1"))),
            Err(IllegalMoveError::NotLegal)
        );
        assert_eq!(game, before);
        play(&mut game, "e1c1");
    }

    #[test]
    fn castling_needs_rights() {
        let game = Game::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w Kq - 0 1").unwrap();
        assert!(targets(&game, "e1").contains(&"g1".to_string()));
        assert!(!targets(&game, "e1").contains(&"c1".to_string()));
        assert!(!targets(&game, "e8").contains(&"g8".to_string()));
        assert!(targets(&game, "e8").contains(&"c8".to_string()));
    }

    #[test]
    fn en_passant_only_on_next_ply() {
        let mut game = Game::new();
        for mv in ["e2e4", "a7a6", "e4e5", "d7d5"] {
            play(&mut game, mv);
        }
        assert!(targets(&game, "e5").contains(&"d6".to_string()));

        let mut later = game.clone();
        play(&mut later, "h2h3");
        play(&mut later, "h7h6");
        assert!(!targets(&later, "e5").contains(&"d6".to_string()));

        play(&mut game, "e5d6");
        assert!(game.board().is_empty(sq("d5")));
        assert_eq!(game.board().get(sq("d6")).map(|p| p.color), Some(Color::White));
    }

    #[test]
    fn promotion_offers_four_moves_and_requires_a_choice() {
        let mut game = Game::from_fen("4k3/1P6/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        let moves = game.legal_moves(sq("b7"));
        assert_eq!(moves.len(), 4);

        assert_eq!(
            game.apply_move(Move::new(sq("b7"), sq("b8"))),
            Err(IllegalMoveError::MissingPromotion)
        );
        assert_eq!(
            game.apply_move(Move::with_promotion(sq("b7"), sq("b8"), PieceType::Pawn)),
            Err(IllegalMoveError::InvalidPromotion)
        );
        play(&mut game, "b7b8=n");
        assert_eq!(game.board().get(sq("b8")).map(|p| p.kind), Some(PieceType::Knight));
    }

    // -------------------------------------------------------------------
    // FEN
    // -------------------------------------------------------------------

    #[test]
    fn fen_round_trip() {
        for fen in [
            STARTING_FEN,
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq e6 0 1",
            "4k3/8/8/8/8/8/8/4K2R b K - 0 1",
        ] {
            assert_eq!(Game::from_fen(fen).unwrap().to_fen(), fen);
        }
    }

    #[test]
    fn fen_accepts_four_fields() {
        let game = Game::from_fen("4k3/8/8/8/8/8/8/4K3 b - -").unwrap();
        assert_eq!(game.turn(), Some(Color::Black));
    }

    #[test]
    fn fen_rejects_malformed() {
        assert!(Game::from_fen("").is_err());
        assert!(Game::from_fen("8/8/8/8/8/8/8/8 w - - 0 1").is_err());
        assert!(Game::from_fen("4k3/8/8/8/8/8/8/4K3 x - - 0 1").is_err());
        assert!(Game::from_fen("4k3/8/8/8/8/8/8/4K3 w K - 0 1").is_err());
        assert!(Game::from_fen("4k3/8/8/8/8/8/8/4K3 w - z9 0 1").is_err());
        assert!(Game::from_fen("4k3/8/8/8/8/8/8/4K3 w -").is_err());
    }

    #[test]
    fn snapshot_json_shape() {
        let json = serde_json::to_value(Game::new()).unwrap();
        assert_eq!(json["teamTurn"], "WHITE");
        assert!(json["terminal"].is_null());
        assert_eq!(json["board"]["squares"][0][4]["pieceType"], "KING");
        assert_eq!(json["board"]["squares"][0][4]["color"], "WHITE");
        assert!(json["board"]["squares"][3][4].is_null());
    }

    #[test]
    fn off_board_move_is_rejected_without_panic() {
        let mut game = Game::new();
        let mv = Move::new(Position { row: 0, column: 9 }, sq("e4"));
        assert_eq!(game.apply_move(mv), Err(IllegalMoveError::NotLegal));
        assert_eq!(game, Game::new());
    }
}
