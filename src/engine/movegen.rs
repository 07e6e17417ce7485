//! Pseudo-legal move generation.
//!
//! Each piece type maps to a [`MovementRule`]; the generator walks the rule's
//! direction vectors over the mailbox board. Moves produced here ignore
//! whether the mover's own king is left in check and never include castling;
//! both are handled by [`crate::engine::game::Game::legal_moves`].

use crate::engine::board::Board;
use crate::engine::types::{Color, Move, PieceType, Position};

// =========================================================================
// Movement rules
// =========================================================================

pub const ORTHOGONAL: [(i8, i8); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

pub const DIAGONAL: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];

pub const ALL_DIRECTIONS: [(i8, i8); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];

pub const KNIGHT_JUMPS: [(i8, i8); 8] = [
    (2, 1),
    (2, -1),
    (-2, 1),
    (-2, -1),
    (1, 2),
    (1, -2),
    (-1, 2),
    (-1, -2),
];

/// How a piece type moves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MovementRule {
    /// Repeat each direction until blocked (bishop, rook, queen).
    Slide(&'static [(i8, i8)]),
    /// One step along each offset (knight, king).
    Step(&'static [(i8, i8)]),
    /// Forward pushes, diagonal captures, en passant and promotion.
    Pawn,
}

/// Movement rule lookup for each piece type.
pub const fn movement_rule(kind: PieceType) -> MovementRule {
    match kind {
        PieceType::Bishop => MovementRule::Slide(&DIAGONAL),
        PieceType::Rook => MovementRule::Slide(&ORTHOGONAL),
        PieceType::Queen => MovementRule::Slide(&ALL_DIRECTIONS),
        PieceType::Knight => MovementRule::Step(&KNIGHT_JUMPS),
        PieceType::King => MovementRule::Step(&ALL_DIRECTIONS),
        PieceType::Pawn => MovementRule::Pawn,
    }
}

// =========================================================================
// Public API
// =========================================================================

/// Every geometrically valid move for the piece standing on `from`.
///
/// Returns an empty list when the square is empty.
pub fn pseudo_legal_moves(board: &Board, from: Position) -> Vec<Move> {
    let Some(piece) = board.get(from) else {
        return Vec::new();
    };

    let mut moves = Vec::with_capacity(28);
    match movement_rule(piece.kind) {
        MovementRule::Slide(directions) => {
            generate_slides(board, from, piece.color, directions, &mut moves)
        }
        MovementRule::Step(offsets) => {
            generate_steps(board, from, piece.color, offsets, &mut moves)
        }
        MovementRule::Pawn => generate_pawn_moves(board, from, piece.color, &mut moves),
    }
    moves
}

// =========================================================================
// Sliders
// =========================================================================

fn generate_slides(
    board: &Board,
    from: Position,
    us: Color,
    directions: &[(i8, i8)],
    moves: &mut Vec<Move>,
) {
    for &(dr, dc) in directions {
        let mut current = from;
        for _ in 0..7 {
            let Some(to) = current.offset(dr, dc) else {
                break;
            };
            match board.get(to) {
                None => moves.push(Move::new(from, to)),
                Some(other) => {
                    if other.color != us {
                        moves.push(Move::new(from, to));
                    }
                    break;
                }
            }
            current = to;
        }
    }
}

// =========================================================================
// Knight / king
// =========================================================================

fn generate_steps(
    board: &Board,
    from: Position,
    us: Color,
    offsets: &[(i8, i8)],
    moves: &mut Vec<Move>,
) {
    for &(dr, dc) in offsets {
        if let Some(to) = from.offset(dr, dc)
            && board.get(to).is_none_or(|other| other.color != us)
        {
            moves.push(Move::new(from, to));
        }
    }
}

// =========================================================================
// Pawns
// =========================================================================

fn generate_pawn_moves(board: &Board, from: Position, us: Color, moves: &mut Vec<Move>) {
    let forward = us.forward();

    // --- Single and double push ---
    if let Some(one) = from.offset(forward, 0)
        && board.is_empty(one)
    {
        push_pawn_move(from, one, us, moves);

        if from.row == us.pawn_row()
            && let Some(two) = from.offset(2 * forward, 0)
            && board.is_empty(two)
        {
            moves.push(Move::new(from, two));
        }
    }

    // --- Captures, including en passant ---
    for dc in [-1, 1] {
        let Some(to) = from.offset(forward, dc) else {
            continue;
        };
        match board.get(to) {
            Some(target) if target.color != us => push_pawn_move(from, to, us, moves),
            Some(_) => {}
            None => {
                if board.en_passant_target() == Some(to)
                    && holds_enemy_pawn(board, Position::new(from.row, to.column), us)
                {
                    moves.push(Move::new(from, to));
                }
            }
        }
    }
}

/// Add a pawn move, expanding it into all four promotions on the last rank.
fn push_pawn_move(from: Position, to: Position, us: Color, moves: &mut Vec<Move>) {
    if to.row == us.last_row() {
        for promo in PieceType::PROMOTIONS {
            moves.push(Move::with_promotion(from, to, promo));
        }
    } else {
        moves.push(Move::new(from, to));
    }
}

fn holds_enemy_pawn(board: &Board, pos: Position, us: Color) -> bool {
    board
        .get(pos)
        .is_some_and(|p| p.kind == PieceType::Pawn && p.color != us)
}

// =========================================================================
// Tests
// =========================================================================
