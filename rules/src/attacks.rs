use crate::board::Board;
use crate::piece::{Color, Piece, PieceKind};
use crate::square::Square;

const KNIGHT_OFFSETS: [(i8, i8); 8] = [
    (-2, -1),
    (-2, 1),
    (-1, -2),
    (-1, 2),
    (1, -2),
    (1, 2),
    (2, -1),
    (2, 1),
];

const KING_OFFSETS: [(i8, i8); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

const BISHOP_DIRS: [(i8, i8); 4] = [(-1, -1), (-1, 1), (1, -1), (1, 1)];
const ROOK_DIRS: [(i8, i8); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// Whether `target` is attacked by any piece of `attacker` on `board`.
/// Ignores whose turn it is; this is a pure geometric query used both for
/// check detection and for verifying king safety through check/castling.
pub fn is_attacked(board: &Board, target: Square, attacker: Color) -> bool {
    for offset in KNIGHT_OFFSETS {
        if let Some(sq) = target.offset(offset.0, offset.1) {
            if board.get(sq) == Piece::Occupied(attacker, PieceKind::Knight) {
                return true;
            }
        }
    }

    for offset in KING_OFFSETS {
        if let Some(sq) = target.offset(offset.0, offset.1) {
            if board.get(sq) == Piece::Occupied(attacker, PieceKind::King) {
                return true;
            }
        }
    }

    for dir in BISHOP_DIRS {
        if ray_hits(board, target, dir, attacker, &[PieceKind::Bishop, PieceKind::Queen]) {
            return true;
        }
    }

    for dir in ROOK_DIRS {
        if ray_hits(board, target, dir, attacker, &[PieceKind::Rook, PieceKind::Queen]) {
            return true;
        }
    }

    // Pawns attack diagonally forward from their own perspective, so a pawn
    // of `attacker` color threatens `target` from one rank behind it
    // relative to the attacker's forward direction.
    let pawn_row = target.row() - attacker.forward();
    for d_col in [-1, 1] {
        if let Some(sq) = Square::new_checked(pawn_row, target.col() + d_col) {
            if board.get(sq) == Piece::Occupied(attacker, PieceKind::Pawn) {
                return true;
            }
        }
    }

    false
}

fn ray_hits(
    board: &Board,
    from: Square,
    dir: (i8, i8),
    attacker: Color,
    kinds: &[PieceKind],
) -> bool {
    let mut cur = from;
    while let Some(next) = cur.offset(dir.0, dir.1) {
        cur = next;
        let piece = board.get(cur);
        if piece.is_empty() {
            continue;
        }
        return piece.color() == Some(attacker) && kinds.contains(&piece.kind().unwrap());
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Board;

    #[test]
    fn starting_position_pawns_attack_c_and_e_from_d2() {
        let board = Board::starting_position();
        // White pawns on rank 2 (row 6) attack b3/d3 etc from black's view;
        // check that e2 pawn attacks d3 and f3 squares for white.
        assert!(is_attacked(&board, Square::new(5, 3), Color::White));
        assert!(is_attacked(&board, Square::new(5, 5), Color::White));
        assert!(!is_attacked(&board, Square::new(5, 4), Color::White));
    }

    #[test]
    fn rook_attack_blocked_by_intervening_piece() {
        let board = Board::starting_position();
        // White rook on a1 (row 7, col 0) is blocked by its own pawn on a2.
        assert!(!is_attacked(&board, Square::new(0, 0), Color::White));
    }

    #[test]
    fn empty_board_knight_attack() {
        let mut board = Board::empty();
        board.set(
            Square::new(4, 4),
            Piece::Occupied(Color::White, PieceKind::Knight),
        );
        assert!(is_attacked(&board, Square::new(2, 3), Color::White));
        assert!(is_attacked(&board, Square::new(6, 5), Color::White));
        assert!(!is_attacked(&board, Square::new(4, 5), Color::White));
    }
}
