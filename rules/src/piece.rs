use std::fmt;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Color {
    White,
    Black,
}

impl Color {
    /// White maps to 0, Black to 1, matching the color index used throughout
    /// the match and session data model.
    pub fn index(self) -> usize {
        match self {
            Color::White => 0,
            Color::Black => 1,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Color::White),
            1 => Some(Color::Black),
            _ => None,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    /// Row delta a pawn of this color advances by.
    pub fn forward(self) -> i8 {
        match self {
            Color::White => -1,
            Color::Black => 1,
        }
    }

    /// Back rank row for this color, using the row-0-is-black convention.
    pub fn back_rank(self) -> i8 {
        match self {
            Color::White => 7,
            Color::Black => 0,
        }
    }

    /// Row a pawn of this color starts on.
    pub fn pawn_rank(self) -> i8 {
        match self {
            Color::White => 6,
            Color::Black => 1,
        }
    }

    pub fn promotion_rank(self) -> i8 {
        self.opposite().back_rank()
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

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl PieceKind {
    /// Parses a promotion letter, case-insensitive. Only Q/R/B/N are valid
    /// promotion targets.
    pub fn from_promo_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'q' => Some(PieceKind::Queen),
            'r' => Some(PieceKind::Rook),
            'b' => Some(PieceKind::Bishop),
            'n' => Some(PieceKind::Knight),
            _ => None,
        }
    }

    pub fn to_promo_char(self) -> char {
        match self {
            PieceKind::Queen => 'q',
            PieceKind::Rook => 'r',
            PieceKind::Bishop => 'b',
            PieceKind::Knight => 'n',
            PieceKind::Pawn | PieceKind::King => {
                unreachable!("pawns and kings are never a promotion target")
            }
        }
    }
}

/// A board cell: either empty or a piece of a given color. `Empty` is its
/// own tag rather than folded into `Option` so matches over piece kind and
/// occupancy read the same way throughout the rules engine.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum Piece {
    #[default]
    Empty,
    Occupied(Color, PieceKind),
}

impl Piece {
    pub fn color(self) -> Option<Color> {
        match self {
            Piece::Empty => None,
            Piece::Occupied(color, _) => Some(color),
        }
    }

    pub fn kind(self) -> Option<PieceKind> {
        match self {
            Piece::Empty => None,
            Piece::Occupied(_, kind) => Some(kind),
        }
    }

    pub fn is_empty(self) -> bool {
        matches!(self, Piece::Empty)
    }

    pub fn is_color(self, color: Color) -> bool {
        self.color() == Some(color)
    }
}
