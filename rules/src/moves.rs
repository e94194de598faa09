use crate::attacks::is_attacked;
use crate::piece::{Color, Piece, PieceKind};
use crate::position::Position;
use crate::square::Square;

/// The special handling a move requires beyond "piece moves from A to B",
/// since castling, en passant and promotion each touch a square other than
/// `to` or change more board state than a normal move.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MoveKind {
    Normal,
    DoublePawnPush,
    EnPassant,
    CastleKingside,
    CastleQueenside,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Move {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<PieceKind>,
    pub kind: MoveKind,
}

impl Move {
    pub fn normal(from: Square, to: Square) -> Self {
        Move {
            from,
            to,
            promotion: None,
            kind: MoveKind::Normal,
        }
    }

    pub fn promotion(from: Square, to: Square, promo: PieceKind) -> Self {
        Move {
            from,
            to,
            promotion: Some(promo),
            kind: MoveKind::Normal,
        }
    }
}

const BISHOP_DIRS: [(i8, i8); 4] = [(-1, -1), (-1, 1), (1, -1), (1, 1)];
const ROOK_DIRS: [(i8, i8); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];
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

/// Generates every pseudo-legal move for the side to move: obeys piece
/// geometry, blocking and capture rules, but does not check whether the
/// mover's own king ends up in check. `legality::legal_moves` filters this
/// down to the actually-legal set.
pub fn pseudo_legal_moves(pos: &Position) -> Vec<Move> {
    let mut moves = Vec::new();
    let color = pos.turn;
    for from in pos.board.squares() {
        let piece = pos.board.get(from);
        if piece.color() != Some(color) {
            continue;
        }
        match piece.kind().unwrap() {
            PieceKind::Pawn => pawn_moves(pos, from, color, &mut moves),
            PieceKind::Knight => jump_moves(pos, from, color, &KNIGHT_OFFSETS, &mut moves),
            PieceKind::King => {
                jump_moves(pos, from, color, &KING_OFFSETS, &mut moves);
                castle_moves(pos, from, color, &mut moves);
            }
            PieceKind::Bishop => slide_moves(pos, from, color, &BISHOP_DIRS, &mut moves),
            PieceKind::Rook => slide_moves(pos, from, color, &ROOK_DIRS, &mut moves),
            PieceKind::Queen => {
                slide_moves(pos, from, color, &BISHOP_DIRS, &mut moves);
                slide_moves(pos, from, color, &ROOK_DIRS, &mut moves);
            }
        }
    }
    moves
}

fn jump_moves(
    pos: &Position,
    from: Square,
    color: Color,
    offsets: &[(i8, i8)],
    out: &mut Vec<Move>,
) {
    for &(dr, dc) in offsets {
        if let Some(to) = from.offset(dr, dc) {
            if !pos.board.get(to).is_color(color) {
                out.push(Move::normal(from, to));
            }
        }
    }
}

fn slide_moves(pos: &Position, from: Square, color: Color, dirs: &[(i8, i8)], out: &mut Vec<Move>) {
    for &(dr, dc) in dirs {
        let mut cur = from;
        while let Some(next) = cur.offset(dr, dc) {
            cur = next;
            let occupant = pos.board.get(cur);
            if occupant.is_color(color) {
                break;
            }
            out.push(Move::normal(from, cur));
            if !occupant.is_empty() {
                break;
            }
        }
    }
}

fn pawn_moves(pos: &Position, from: Square, color: Color, out: &mut Vec<Move>) {
    let forward = color.forward();
    let promo_row = color.promotion_rank();

    if let Some(one) = from.offset(forward, 0) {
        if pos.board.get(one).is_empty() {
            push_pawn_advance(from, one, promo_row, MoveKind::Normal, out);

            if from.row() == color.pawn_rank() {
                if let Some(two) = from.offset(forward * 2, 0) {
                    if pos.board.get(two).is_empty() {
                        out.push(Move {
                            from,
                            to: two,
                            promotion: None,
                            kind: MoveKind::DoublePawnPush,
                        });
                    }
                }
            }
        }
    }

    for d_col in [-1, 1] {
        let Some(to) = from.offset(forward, d_col) else {
            continue;
        };
        let occupant = pos.board.get(to);
        if occupant.color() == Some(color.opposite()) {
            push_pawn_advance(from, to, promo_row, MoveKind::Normal, out);
        } else if occupant.is_empty() && pos.en_passant == Some(to) {
            out.push(Move {
                from,
                to,
                promotion: None,
                kind: MoveKind::EnPassant,
            });
        }
    }
}

fn push_pawn_advance(
    from: Square,
    to: Square,
    promo_row: i8,
    kind: MoveKind,
    out: &mut Vec<Move>,
) {
    if to.row() == promo_row {
        for promo in [
            PieceKind::Queen,
            PieceKind::Rook,
            PieceKind::Bishop,
            PieceKind::Knight,
        ] {
            out.push(Move {
                from,
                to,
                promotion: Some(promo),
                kind,
            });
        }
    } else {
        out.push(Move {
            from,
            to,
            promotion: None,
            kind,
        });
    }
}

fn castle_moves(pos: &Position, king_from: Square, color: Color, out: &mut Vec<Move>) {
    let row = color.back_rank();
    if king_from != Square::new(row, 4) {
        return;
    }
    let opponent = color.opposite();
    if is_attacked(&pos.board, king_from, opponent) {
        return;
    }

    if pos.castling.kingside(color) {
        let f = Square::new(row, 5);
        let g = Square::new(row, 6);
        if pos.board.get(f).is_empty()
            && pos.board.get(g).is_empty()
            && !is_attacked(&pos.board, f, opponent)
            && !is_attacked(&pos.board, g, opponent)
        {
            out.push(Move {
                from: king_from,
                to: g,
                promotion: None,
                kind: MoveKind::CastleKingside,
            });
        }
    }

    if pos.castling.queenside(color) {
        let d = Square::new(row, 3);
        let c = Square::new(row, 2);
        let b = Square::new(row, 1);
        if pos.board.get(d).is_empty()
            && pos.board.get(c).is_empty()
            && pos.board.get(b).is_empty()
            && !is_attacked(&pos.board, d, opponent)
            && !is_attacked(&pos.board, c, opponent)
        {
            out.push(Move {
                from: king_from,
                to: c,
                promotion: None,
                kind: MoveKind::CastleQueenside,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starting_position_has_twenty_pseudo_legal_moves() {
        let pos = Position::starting();
        let moves = pseudo_legal_moves(&pos);
        // 16 pawn moves (8 single + 8 double) + 4 knight moves.
        assert_eq!(moves.len(), 20);
    }

    #[test]
    fn pawn_promotes_into_four_choices() {
        let mut pos = Position::starting();
        pos.board = crate::board::Board::empty();
        pos.board.set(
            Square::new(1, 0),
            Piece::Occupied(Color::White, PieceKind::Pawn),
        );
        let moves = pseudo_legal_moves(&pos);
        assert_eq!(moves.len(), 4);
        assert!(moves.iter().all(|m| m.to == Square::new(0, 0)));
    }

    #[test]
    fn castling_blocked_when_path_attacked() {
        let mut pos = Position::starting();
        pos.board = crate::board::Board::empty();
        pos.board.set(
            Square::new(7, 4),
            Piece::Occupied(Color::White, PieceKind::King),
        );
        pos.board.set(
            Square::new(7, 7),
            Piece::Occupied(Color::White, PieceKind::Rook),
        );
        pos.board.set(
            Square::new(0, 5),
            Piece::Occupied(Color::Black, PieceKind::Rook),
        );
        let moves = pseudo_legal_moves(&pos);
        assert!(!moves.iter().any(|m| m.kind == MoveKind::CastleKingside));
    }
}
