use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Color
// ---------------------------------------------------------------------------

/// The two sides in a chess game.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Color {
    White,
    Black,
}

impl Color {
    /// Row pawns of this colour start on.
    #[inline]
    pub const fn pawn_row(self) -> u8 {
        match self {
            Color::White => 2,
            Color::Black => 7,
        }
    }

    /// Row this colour's pawns promote on.
    #[inline]
    pub const fn last_row(self) -> u8 {
        match self {
            Color::White => 8,
            Color::Black => 1,
        }
    }

    /// Row the king and rooks start on.
    #[inline]
    pub const fn home_row(self) -> u8 {
        match self {
            Color::White => 1,
            Color::Black => 8,
        }
    }

    /// Direction pawns of this colour advance in.
    #[inline]
    pub const fn forward(self) -> i8 {
        match self {
            Color::White => 1,
            Color::Black => -1,
        }
    }

    /// Parse "white"/"BLACK" etc.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "white" => Some(Color::White),
            "black" => Some(Color::Black),
            _ => None,
        }
    }
}

impl std::ops::Not for Color {
    type Output = Self;
    fn not(self) -> Self {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::White => write!(f, "white"),
            Color::Black => write!(f, "black"),
        }
    }
}

// ---------------------------------------------------------------------------
// PieceType
// ---------------------------------------------------------------------------

/// The six piece kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PieceType {
    King,
    Queen,
    Bishop,
    Knight,
    Rook,
    Pawn,
}

impl PieceType {
    /// The pieces a pawn may promote to, in generation order.
    pub const PROMOTIONS: [PieceType; 4] = [
        PieceType::Queen,
        PieceType::Rook,
        PieceType::Bishop,
        PieceType::Knight,
    ];

    /// Whether a pawn may promote to this piece.
    #[inline]
    pub fn is_promotion_choice(self) -> bool {
        Self::PROMOTIONS.contains(&self)
    }

    /// Single uppercase letter for white, lowercase for black.
    pub fn to_char(self, color: Color) -> char {
        let c = match self {
            PieceType::Pawn => 'p',
            PieceType::Knight => 'n',
            PieceType::Bishop => 'b',
            PieceType::Rook => 'r',
            PieceType::Queen => 'q',
            PieceType::King => 'k',
        };
        match color {
            Color::White => c.to_ascii_uppercase(),
            Color::Black => c,
        }
    }

    /// Parse a FEN piece character; case selects the colour.
    pub fn from_char(c: char) -> Option<(Color, PieceType)> {
        let color = if c.is_ascii_uppercase() {
            Color::White
        } else {
            Color::Black
        };
        let piece = match c.to_ascii_lowercase() {
            'p' => PieceType::Pawn,
            'n' => PieceType::Knight,
            'b' => PieceType::Bishop,
            'r' => PieceType::Rook,
            'q' => PieceType::Queen,
            'k' => PieceType::King,
            _ => return None,
        };
        Some((color, piece))
    }
}

impl fmt::Display for PieceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PieceType::Pawn => write!(f, "pawn"),
            PieceType::Knight => write!(f, "knight"),
            PieceType::Bishop => write!(f, "bishop"),
            PieceType::Rook => write!(f, "rook"),
            PieceType::Queen => write!(f, "queen"),
            PieceType::King => write!(f, "king"),
        }
    }
}

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// A square on the board addressed by 1-based row (rank) and column (file).
///
/// Row 1 is White's home rank, column 1 is the a-file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPosition")]
pub struct Position {
    pub row: u8,
    #[serde(rename = "col")]
    pub column: u8,
}

/// Unchecked wire form of [`Position`].
#[derive(Deserialize)]
struct RawPosition {
    row: u8,
    col: u8,
}

impl TryFrom<RawPosition> for Position {
    type Error = NotationError;

    fn try_from(raw: RawPosition) -> Result<Self, Self::Error> {
        if Self::is_on_board(raw.row as i8, raw.col as i8) {
            Ok(Position {
                row: raw.row,
                column: raw.col,
            })
        } else {
            Err(NotationError::InvalidSquare(format!(
                "({}, {})",
                raw.row, raw.col
            )))
        }
    }
}

impl Position {
    #[inline]
    pub fn new(row: u8, column: u8) -> Self {
        debug_assert!(
            (1..=8).contains(&row) && (1..=8).contains(&column),
            "position out of range: ({row}, {column})"
        );
        Position { row, column }
    }

    /// Whether (row, column) lies on the 8×8 board.
    #[inline]
    pub fn is_on_board(row: i8, column: i8) -> bool {
        (1..=8).contains(&row) && (1..=8).contains(&column)
    }

    /// Whether this position lies on the board. Values built directly from
    /// the public fields are not range-checked.
    #[inline]
    pub fn is_valid(self) -> bool {
        Self::is_on_board(self.row as i8, self.column as i8)
    }

    /// The square `(dr, dc)` away, if it is still on the board.
    #[inline]
    pub fn offset(self, dr: i8, dc: i8) -> Option<Position> {
        let row = self.row as i8 + dr;
        let column = self.column as i8 + dc;
        Self::is_on_board(row, column).then(|| Position::new(row as u8, column as u8))
    }

    /// Parse algebraic notation like "e4".
    pub fn from_algebraic(s: &str) -> Option<Self> {
        let bytes = s.as_bytes();
        if bytes.len() != 2 {
            return None;
        }
        let column = bytes[0].wrapping_sub(b'a');
        let row = bytes[1].wrapping_sub(b'1');
        if column < 8 && row < 8 {
            Some(Position::new(row + 1, column + 1))
        } else {
            None
        }
    }

    /// Convert to algebraic notation like "e4".
    pub fn to_algebraic(self) -> String {
        let file = (b'a' + self.column - 1) as char;
        let rank = (b'0' + self.row) as char;
        format!("{file}{rank}")
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_algebraic())
    }
}

// ---------------------------------------------------------------------------
// Piece
// ---------------------------------------------------------------------------

/// A piece on the board. `has_moved` flips once, the first time it moves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Piece {
    pub color: Color,
    #[serde(rename = "pieceType")]
    pub kind: PieceType,
    pub has_moved: bool,
}

impl Piece {
    /// A piece that has not moved yet.
    pub fn new(color: Color, kind: PieceType) -> Self {
        Piece {
            color,
            kind,
            has_moved: false,
        }
    }

    /// Same piece, flagged as moved.
    #[inline]
    pub fn moved(self) -> Self {
        Piece {
            has_moved: true,
            ..self
        }
    }

    pub fn to_char(self) -> char {
        self.kind.to_char(self.color)
    }
}

// ---------------------------------------------------------------------------
// Move
// ---------------------------------------------------------------------------

/// A move request: start square, end square and an optional promotion choice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    #[serde(rename = "startPosition")]
    pub start: Position,
    #[serde(rename = "endPosition")]
    pub end: Position,
    #[serde(rename = "promotionPiece", default)]
    pub promotion: Option<PieceType>,
}

impl Move {
    pub fn new(start: Position, end: Position) -> Self {
        Move {
            start,
            end,
            promotion: None,
        }
    }

    pub fn with_promotion(start: Position, end: Position, promotion: PieceType) -> Self {
        Move {
            start,
            end,
            promotion: Some(promotion),
        }
    }

    /// Both squares lie on the board.
    pub fn is_on_board(&self) -> bool {
        self.start.is_valid() && self.end.is_valid()
    }

    /// Parse coordinate notation: "e2e4", "e7e8q" or "e7e8=q".
    pub fn from_coordinates(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.len() < 4 || !s.is_ascii() {
            return None;
        }
        let start = Position::from_algebraic(&s[0..2])?;
        let end = Position::from_algebraic(&s[2..4])?;
        let rest = s[4..].trim_start_matches('=');
        let promotion = match rest.chars().next() {
            None => None,
            Some(c) => Some(PieceType::from_char(c)?.1),
        };
        Some(Move {
            start,
            end,
            promotion,
        })
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.start, self.end)?;
        if let Some(promo) = self.promotion {
            write!(f, "={}", promo.to_char(Color::Black))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// How a finished game ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "UPPERCASE")]
pub enum Outcome {
    Checkmate { winner: Color },
    Stalemate,
    Resigned { winner: Color },
}

impl Outcome {
    /// The winning side, or `None` for a draw.
    pub fn winner(self) -> Option<Color> {
        match self {
            Outcome::Checkmate { winner } | Outcome::Resigned { winner } => Some(winner),
            Outcome::Stalemate => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Checkmate { winner } => write!(f, "checkmate, {winner} wins"),
            Outcome::Stalemate => write!(f, "stalemate"),
            Outcome::Resigned { winner } => write!(f, "resignation, {winner} wins"),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why the rules engine refused a move. The game is unchanged in every case.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum IllegalMoveError {
    #[error("no piece at start square")]
    NoPieceAtStart,

    #[error("piece belongs to the side not on turn")]
    WrongTurn,

    #[error("move is not legal")]
    NotLegal,

    #[error("pawn reaching the last rank must choose a promotion piece")]
    MissingPromotion,

    #[error("promotion is only allowed for a pawn reaching the last rank, to queen, rook, bishop or knight")]
    InvalidPromotion,

    #[error("game is already over")]
    GameOver,
}

/// Errors from parsing board notation.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum NotationError {
    #[error("invalid FEN string: {0}")]
    InvalidFen(String),

    #[error("invalid square notation: {0}")]
    InvalidSquare(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
