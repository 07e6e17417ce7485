//! Mailbox board representation.
//!
//! `Board` is an 8×8 grid of optional pieces indexed by 1-based (row, column),
//! plus the en-passant target left behind by the previous ply. Positions
//! handed to the accessors must be on the board; callers derive them from
//! board-bounded iteration or from validated moves.

use std::fmt;

use serde::Serialize;

use crate::engine::types::{Color, NotationError, Piece, PieceType, Position};

/// Back-rank order from the a-file to the h-file.
const BACK_RANK: [PieceType; 8] = [
    PieceType::Rook,
    PieceType::Knight,
    PieceType::Bishop,
    PieceType::Queen,
    PieceType::King,
    PieceType::Bishop,
    PieceType::Knight,
    PieceType::Rook,
];

/// An 8×8 chess board.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    /// `squares[row - 1][column - 1]`, row 1 first.
    squares: [[Option<Piece>; 8]; 8],

    /// Square skipped by a two-square pawn advance on the previous ply.
    en_passant_target: Option<Position>,
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

impl Board {
    /// An empty board.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The standard 32-piece starting layout.
    pub fn standard() -> Self {
        let mut board = Self::empty();
        board.reset_to_standard_setup();
        board
    }

    /// Clear the board and lay out the standard starting position.
    pub fn reset_to_standard_setup(&mut self) {
        *self = Self::default();
        for (idx, &kind) in BACK_RANK.iter().enumerate() {
            let column = idx as u8 + 1;
            for color in [Color::White, Color::Black] {
                self.set(Position::new(color.home_row(), column), Piece::new(color, kind));
                self.set(
                    Position::new(color.pawn_row(), column),
                    Piece::new(color, PieceType::Pawn),
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Square access
// ---------------------------------------------------------------------------

impl Board {
    /// Whether (row, column) addresses a square of the board.
    #[inline]
    pub fn is_on_board(row: i8, column: i8) -> bool {
        Position::is_on_board(row, column)
    }

    #[inline]
    pub fn get(&self, pos: Position) -> Option<Piece> {
        self.squares[pos.row as usize - 1][pos.column as usize - 1]
    }

    #[inline]
    pub fn set(&mut self, pos: Position, piece: Piece) {
        self.squares[pos.row as usize - 1][pos.column as usize - 1] = Some(piece);
    }

    /// Remove and return whatever stands on `pos`.
    #[inline]
    pub fn clear(&mut self, pos: Position) -> Option<Piece> {
        self.squares[pos.row as usize - 1][pos.column as usize - 1].take()
    }

    #[inline]
    pub fn is_empty(&self, pos: Position) -> bool {
        self.get(pos).is_none()
    }

    /// Current en-passant target square.
    #[inline]
    pub fn en_passant_target(&self) -> Option<Position> {
        self.en_passant_target
    }

    #[inline]
    pub fn set_en_passant_target(&mut self, pos: Position) {
        self.en_passant_target = Some(pos);
    }

    #[inline]
    pub fn clear_en_passant_target(&mut self) {
        self.en_passant_target = None;
    }

    /// Every occupied square with its piece, row 1 first.
    pub fn pieces(&self) -> impl Iterator<Item = (Position, Piece)> + '_ {
        (1..=8u8).flat_map(move |row| {
            (1..=8u8).filter_map(move |column| {
                let pos = Position::new(row, column);
                self.get(pos).map(|piece| (pos, piece))
            })
        })
    }

    /// Every square occupied by a piece of `color`.
    pub fn pieces_of(&self, color: Color) -> impl Iterator<Item = (Position, Piece)> + '_ {
        self.pieces().filter(move |(_, piece)| piece.color == color)
    }

    /// Where the king of `color` stands, if it is on the board.
    pub fn king_position(&self, color: Color) -> Option<Position> {
        self.pieces_of(color)
            .find(|(_, piece)| piece.kind == PieceType::King)
            .map(|(pos, _)| pos)
    }
}

// ---------------------------------------------------------------------------
// FEN piece placement
// ---------------------------------------------------------------------------

impl Board {
    /// Parse the piece-placement field of a FEN string.
    ///
    /// Kings and rooks come back flagged as moved; pawns are flagged as moved
    /// unless they stand on their starting row. Castling availability is
    /// applied on top of this by `Game::from_fen`.
    pub fn from_placement(placement: &str) -> Result<Self, NotationError> {
        let ranks: Vec<&str> = placement.split('/').collect();
        if ranks.len() != 8 {
            return Err(NotationError::InvalidFen(format!(
                "expected 8 ranks, got {}",
                ranks.len()
            )));
        }

        let mut board = Board::empty();
        for (rank_idx, rank_str) in ranks.iter().enumerate() {
            let row = 8 - rank_idx as u8; // FEN starts from rank 8
            let mut column: u8 = 1;
            for ch in rank_str.chars() {
                if column > 8 {
                    return Err(NotationError::InvalidFen(format!(
                        "too many squares in rank {row}"
                    )));
                }
                if let Some(digit) = ch.to_digit(10) {
                    if !(1..=8).contains(&digit) {
                        return Err(NotationError::InvalidFen(format!(
                            "invalid empty count '{ch}' in rank {row}"
                        )));
                    }
                    column += digit as u8;
                } else if let Some((color, kind)) = PieceType::from_char(ch) {
                    let pos = Position::new(row, column);
                    let has_moved = match kind {
                        PieceType::Pawn => row != color.pawn_row(),
                        PieceType::King | PieceType::Rook => true,
                        _ => false,
                    };
                    board.set(
                        pos,
                        Piece {
                            color,
                            kind,
                            has_moved,
                        },
                    );
                    column += 1;
                } else {
                    return Err(NotationError::InvalidFen(format!(
                        "invalid character '{ch}' in piece placement"
                    )));
                }
            }
            if column != 9 {
                return Err(NotationError::InvalidFen(format!(
                    "rank {row} has {} squares instead of 8",
                    column - 1
                )));
            }
        }
        Ok(board)
    }

    /// Export the piece-placement field of a FEN string.
    pub fn placement(&self) -> String {
        let mut fen = String::with_capacity(72);
        for row in (1..=8u8).rev() {
            let mut empty_count = 0u8;
            for column in 1..=8u8 {
                match self.get(Position::new(row, column)) {
                    Some(piece) => {
                        if empty_count > 0 {
                            fen.push((b'0' + empty_count) as char);
                            empty_count = 0;
                        }
                        fen.push(piece.to_char());
                    }
                    None => empty_count += 1,
                }
            }
            if empty_count > 0 {
                fen.push((b'0' + empty_count) as char);
            }
            if row > 1 {
                fen.push('/');
            }
        }
        fen
    }
}

// ---------------------------------------------------------------------------
// Board display (8×8 text grid)
// ---------------------------------------------------------------------------

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in (1..=8u8).rev() {
            write!(f, "{row} ")?;
            for column in 1..=8u8 {
                let ch = self
                    .get(Position::new(row, column))
                    .map_or('.', |piece| piece.to_char());
                write!(f, "{ch}")?;
                if column < 8 {
                    write!(f, " ")?;
                }
            }
            writeln!(f)?;
        }
        write!(f, "  a b c d e f g h")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
