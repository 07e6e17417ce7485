//! Castling, en passant and promotion, plus the single place a move is
//! actually written to a board.

use crate::engine::attacks;
use crate::engine::board::Board;
use crate::engine::types::{Color, IllegalMoveError, Move, Piece, PieceType, Position};

/// Column the king starts on.
const KING_COLUMN: u8 = 5;

/// One castling direction, described by columns on the home row.
struct CastleSide {
    rook_from: u8,
    rook_to: u8,
    king_to: u8,
    /// Squares strictly between king and rook; must be empty.
    between: &'static [u8],
    /// King start, transit and destination; must not be attacked.
    king_path: &'static [u8],
}

const KINGSIDE: CastleSide = CastleSide {
    rook_from: 8,
    rook_to: 6,
    king_to: 7,
    between: &[6, 7],
    king_path: &[5, 6, 7],
};

const QUEENSIDE: CastleSide = CastleSide {
    rook_from: 1,
    rook_to: 4,
    king_to: 3,
    between: &[2, 3, 4],
    king_path: &[5, 4, 3],
};

// =========================================================================
// Castling
// =========================================================================

/// Castling moves available to the king on `king_pos`.
///
/// A castle is offered only when king and rook are both unmoved, every square
/// between them is empty and none of the king's start, transit or destination
/// squares is attacked.
pub fn castling_moves(board: &Board, king_pos: Position) -> Vec<Move> {
    let Some(king) = board.get(king_pos) else {
        return Vec::new();
    };
    let row = king.color.home_row();
    if king.kind != PieceType::King
        || king.has_moved
        || king_pos != Position::new(row, KING_COLUMN)
    {
        return Vec::new();
    }

    [KINGSIDE, QUEENSIDE]
        .iter()
        .filter(|side| can_castle(board, king.color, side))
        .map(|side| Move::new(king_pos, Position::new(row, side.king_to)))
        .collect()
}

fn can_castle(board: &Board, color: Color, side: &CastleSide) -> bool {
    let row = color.home_row();
    let rook_ok = board
        .get(Position::new(row, side.rook_from))
        .is_some_and(|r| r.kind == PieceType::Rook && r.color == color && !r.has_moved);
    rook_ok
        && side
            .between
            .iter()
            .all(|&column| board.is_empty(Position::new(row, column)))
        && side
            .king_path
            .iter()
            .all(|&column| !attacks::is_attacked(board, Position::new(row, column), !color))
}

/// Whether `mv` is a castle: a king moving two columns along its row.
pub fn is_castling(board: &Board, mv: Move) -> bool {
    board.get(mv.start).is_some_and(|p| p.kind == PieceType::King)
        && mv.start.row == mv.end.row
        && mv.start.column.abs_diff(mv.end.column) == 2
}

// =========================================================================
// En passant
// =========================================================================

/// The square of the pawn captured en passant by `mv`, if it is one.
///
/// The captured pawn stands beside the mover, one row behind the target.
pub fn en_passant_capture(board: &Board, mv: Move) -> Option<Position> {
    let pawn = board.get(mv.start)?;
    let is_en_passant = pawn.kind == PieceType::Pawn
        && board.en_passant_target() == Some(mv.end)
        && mv.start.column != mv.end.column
        && board.is_empty(mv.end);
    is_en_passant.then(|| Position::new(mv.start.row, mv.end.column))
}

// =========================================================================
// Promotion
// =========================================================================

/// Reject moves whose promotion field does not fit the move.
///
/// A pawn landing on its last row must name one of queen, rook, bishop or
/// knight; every other move must name none.
pub fn validate_promotion(board: &Board, mv: Move) -> Result<(), IllegalMoveError> {
    let Some(piece) = board.get(mv.start) else {
        return Err(IllegalMoveError::NoPieceAtStart);
    };
    let promotes = piece.kind == PieceType::Pawn && mv.end.row == piece.color.last_row();
    match (promotes, mv.promotion) {
        (true, None) => Err(IllegalMoveError::MissingPromotion),
        (true, Some(kind)) if !kind.is_promotion_choice() => {
            Err(IllegalMoveError::InvalidPromotion)
        }
        (false, Some(_)) => Err(IllegalMoveError::InvalidPromotion),
        _ => Ok(()),
    }
}

// =========================================================================
// Execution
// =========================================================================

/// Write `mv` to `board`. Legality is the caller's responsibility.
///
/// Clears the previous en-passant target, removes captured pieces (including
/// the pawn behind an en-passant target), moves the rook when castling,
/// promotes, flags every displaced piece as moved and records a new
/// en-passant target after a two-square pawn advance.
pub fn execute(board: &mut Board, mv: Move) {
    let en_passant = en_passant_capture(board, mv);
    let castling = is_castling(board, mv);
    board.clear_en_passant_target();

    let Some(piece) = board.clear(mv.start) else {
        return;
    };

    if let Some(captured) = en_passant {
        board.clear(captured);
    }

    if castling {
        let side = if mv.end.column > mv.start.column {
            &KINGSIDE
        } else {
            &QUEENSIDE
        };
        let row = mv.start.row;
        if let Some(rook) = board.clear(Position::new(row, side.rook_from)) {
            board.set(Position::new(row, side.rook_to), rook.moved());
        }
    }

    let landing = match mv.promotion {
        Some(kind) if piece.kind == PieceType::Pawn => Piece { kind, ..piece },
        _ => piece,
    };
    board.set(mv.end, landing.moved());

    if piece.kind == PieceType::Pawn && mv.start.row.abs_diff(mv.end.row) == 2 {
        let skipped = (mv.start.row + mv.end.row) / 2;
        board.set_en_passant_target(Position::new(skipped, mv.start.column));
    }
}

// =========================================================================
// Tests
// =========================================================================
