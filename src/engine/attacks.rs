//! Square attack detection.
//!
//! Looks outward from the target square along every movement rule and asks
//! whether a matching enemy piece sits at the end of the ray. This answers
//! the same question as "does any enemy pseudo-legal move land here" for
//! occupied squares, and also works for empty squares (castling transit),
//! where a pawn still attacks diagonally.

use crate::engine::board::Board;
use crate::engine::movegen::{ALL_DIRECTIONS, DIAGONAL, KNIGHT_JUMPS, ORTHOGONAL};
use crate::engine::types::{Color, PieceType, Position};

/// Is `target` attacked by any piece of colour `by`?
pub fn is_attacked(board: &Board, target: Position, by: Color) -> bool {
    let holds = |pos: Position, kinds: &[PieceType]| {
        board
            .get(pos)
            .is_some_and(|p| p.color == by && kinds.contains(&p.kind))
    };

    // Pawns: a pawn of `by` one row behind (from its own perspective).
    for dc in [-1, 1] {
        if let Some(pos) = target.offset(-by.forward(), dc)
            && holds(pos, &[PieceType::Pawn])
        {
            return true;
        }
    }

    // Knights.
    if KNIGHT_JUMPS
        .iter()
        .filter_map(|&(dr, dc)| target.offset(dr, dc))
        .any(|pos| holds(pos, &[PieceType::Knight]))
    {
        return true;
    }

    // King.
    if ALL_DIRECTIONS
        .iter()
        .filter_map(|&(dr, dc)| target.offset(dr, dc))
        .any(|pos| holds(pos, &[PieceType::King]))
    {
        return true;
    }

    // Rook / queen along files and ranks, bishop / queen along diagonals.
    ray_hits(board, target, by, &ORTHOGONAL, &[PieceType::Rook, PieceType::Queen])
        || ray_hits(board, target, by, &DIAGONAL, &[PieceType::Bishop, PieceType::Queen])
}

/// Is the king of `color` attacked? A side without a king is never in check.
pub fn is_in_check(board: &Board, color: Color) -> bool {
    board
        .king_position(color)
        .is_some_and(|king| is_attacked(board, king, !color))
}

fn ray_hits(
    board: &Board,
    target: Position,
    by: Color,
    directions: &[(i8, i8)],
    kinds: &[PieceType],
) -> bool {
    for &(dr, dc) in directions {
        let mut current = target;
        while let Some(next) = current.offset(dr, dc) {
            if let Some(piece) = board.get(next) {
                if piece.color == by && kinds.contains(&piece.kind) {
                    return true;
                }
                break;
            }
            current = next;
        }
    }
    false
}

// =========================================================================
// Tests
// =========================================================================
