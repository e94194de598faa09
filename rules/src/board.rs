use crate::piece::{Color, Piece, PieceKind};
use crate::square::Square;
use std::fmt;

/// An 8x8 grid of pieces. Row 0 is Black's back rank, row 7 is White's back
/// rank; column 0 is file a.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Board {
    cells: [[Piece; 8]; 8],
}

impl Board {
    pub fn empty() -> Self {
        Board {
            cells: [[Piece::Empty; 8]; 8],
        }
    }

    pub fn get(&self, sq: Square) -> Piece {
        self.cells[sq.row() as usize][sq.col() as usize]
    }

    pub fn set(&mut self, sq: Square, piece: Piece) {
        self.cells[sq.row() as usize][sq.col() as usize] = piece;
    }

    pub fn squares(&self) -> impl Iterator<Item = Square> + '_ {
        (0..8).flat_map(|row| (0..8).map(move |col| Square::new(row, col)))
    }

    /// Finds the king of `color`. Absent only in synthetic positions built by
    /// tests; real matches always keep both kings on the board.
    pub fn find_king(&self, color: Color) -> Option<Square> {
        self.squares()
            .find(|&sq| self.get(sq) == Piece::Occupied(color, PieceKind::King))
    }

    /// The standard chess starting position.
    pub fn starting_position() -> Self {
        use PieceKind::*;
        let mut board = Board::empty();
        let back_rank = [
            Rook, Knight, Bishop, Queen, King, Bishop, Knight, Rook,
        ];
        for col in 0..8 {
            board.set(
                Square::new(0, col),
                Piece::Occupied(Color::Black, back_rank[col as usize]),
            );
            board.set(Square::new(1, col), Piece::Occupied(Color::Black, Pawn));
            board.set(Square::new(6, col), Piece::Occupied(Color::White, Pawn));
            board.set(
                Square::new(7, col),
                Piece::Occupied(Color::White, back_rank[col as usize]),
            );
        }
        board
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..8 {
            for col in 0..8 {
                let c = match self.get(Square::new(row, col)) {
                    Piece::Empty => '.',
                    Piece::Occupied(color, kind) => {
                        let letter = match kind {
                            PieceKind::Pawn => 'p',
                            PieceKind::Knight => 'n',
                            PieceKind::Bishop => 'b',
                            PieceKind::Rook => 'r',
                            PieceKind::Queen => 'q',
                            PieceKind::King => 'k',
                        };
                        if color == Color::White {
                            letter.to_ascii_uppercase()
                        } else {
                            letter
                        }
                    }
                };
                write!(f, "{c}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starting_position_has_both_kings() {
        let board = Board::starting_position();
        assert_eq!(board.find_king(Color::White), Some(Square::new(7, 4)));
        assert_eq!(board.find_king(Color::Black), Some(Square::new(0, 4)));
    }

    #[test]
    fn empty_board_has_no_king() {
        assert_eq!(Board::empty().find_king(Color::White), None);
    }
}
