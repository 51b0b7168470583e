//! Legality oracle.
//!
//! Pure functions over a [`Board`]. None of them look at whose turn it is;
//! turn order is the game engine's concern.

use crate::board::{Board, CastlingRights};
use crate::types::*;

const KNIGHT_DELTAS: [(i8, i8); 8] = [
    (1, 2),
    (2, 1),
    (-1, 2),
    (-2, 1),
    (1, -2),
    (2, -1),
    (-1, -2),
    (-2, -1),
];

/// Geometric and tactical shape of a move for `piece` standing on `from`.
///
/// Castling is only considered when `castling` is given. En passant is only
/// considered when `last_move` is given and was the enemy pawn's double step
/// onto the square beside `from`.
pub fn is_valid_move(
    piece: Piece,
    from: Square,
    to: Square,
    board: &Board,
    last_move: Option<Move>,
    castling: Option<&CastlingRights>,
) -> bool {
    if from == to {
        return false;
    }
    let drow = to.row() - from.row();
    let dcol = to.col() - from.col();

    if piece.kind == PieceKind::King && drow == 0 && dcol.abs() == 2 {
        let Some(rights) = castling else {
            return false;
        };
        if from.row() != piece.color.home_row() || from.col() != KING_HOME_COL {
            return false;
        }
        let side = CastleSide::from_king_move(from.col(), to.col());
        return can_castle(piece.color, side, board, rights);
    }

    let target = board.piece_at(to);
    if let Some(t) = target
        && t.color == piece.color
    {
        return false;
    }

    match piece.kind {
        PieceKind::Pawn => {
            let dir = piece.color.pawn_dir();
            if dcol == 0 && target.is_none() {
                if drow == dir {
                    return true;
                }
                if from.row() == piece.color.pawn_start_row()
                    && drow == 2 * dir
                    && from.offset(dir, 0).is_some_and(|mid| board.is_empty(mid))
                {
                    return true;
                }
                return false;
            }
            if dcol.abs() == 1 && drow == dir {
                if target.is_some() {
                    return true;
                }
                return is_en_passant(piece, from, to, board, last_move);
            }
            false
        }
        PieceKind::Knight => {
            (drow.abs() == 2 && dcol.abs() == 1) || (drow.abs() == 1 && dcol.abs() == 2)
        }
        PieceKind::Bishop => drow.abs() == dcol.abs() && is_path_clear(from, to, board),
        PieceKind::Rook => (drow == 0 || dcol == 0) && is_path_clear(from, to, board),
        PieceKind::Queen => {
            (drow == 0 || dcol == 0 || drow.abs() == dcol.abs()) && is_path_clear(from, to, board)
        }
        PieceKind::King => drow.abs() <= 1 && dcol.abs() <= 1,
    }
}

/// Diagonal pawn step onto an empty square that captures the enemy pawn
/// which just advanced two squares to stand beside `from`.
fn is_en_passant(
    piece: Piece,
    from: Square,
    to: Square,
    board: &Board,
    last_move: Option<Move>,
) -> bool {
    let Some(last) = last_move else {
        return false;
    };
    let enemy = piece.color.other();
    let Some(victim_sq) = Square::new(from.row(), to.col()) else {
        return false;
    };
    board.piece_at(victim_sq) == Some(Piece::new(enemy, PieceKind::Pawn))
        && last.to == victim_sq
        && last.from.col() == to.col()
        && last.from.row() == enemy.pawn_start_row()
        && last.to.row() == enemy.pawn_start_row() + 2 * enemy.pawn_dir()
}

/// Every square strictly between `from` and `to` is empty. Only meaningful
/// for straight or diagonal lines.
pub fn is_path_clear(from: Square, to: Square, board: &Board) -> bool {
    let step_r = (to.row() - from.row()).signum();
    let step_c = (to.col() - from.col()).signum();
    let mut cur = from.offset(step_r, step_c);
    while let Some(sq) = cur {
        if sq == to {
            return true;
        }
        if !board.is_empty(sq) {
            return false;
        }
        cur = sq.offset(step_r, step_c);
    }
    true
}

/// Whether `piece` on `from` attacks `target`, i.e. could capture something
/// standing there. Pawns attack diagonally whether or not the square is
/// occupied; castling never attacks.
pub fn attacks_square(piece: Piece, from: Square, target: Square, board: &Board) -> bool {
    if from == target {
        return false;
    }
    let drow = target.row() - from.row();
    let dcol = target.col() - from.col();
    match piece.kind {
        PieceKind::Pawn => drow == piece.color.pawn_dir() && dcol.abs() == 1,
        PieceKind::Knight => KNIGHT_DELTAS.contains(&(drow, dcol)),
        PieceKind::Bishop => drow.abs() == dcol.abs() && is_path_clear(from, target, board),
        PieceKind::Rook => (drow == 0 || dcol == 0) && is_path_clear(from, target, board),
        PieceKind::Queen => {
            (drow == 0 || dcol == 0 || drow.abs() == dcol.abs())
                && is_path_clear(from, target, board)
        }
        PieceKind::King => drow.abs() <= 1 && dcol.abs() <= 1,
    }
}

pub fn is_square_attacked(board: &Board, target: Square, by: Color) -> bool {
    board
        .pieces(by)
        .any(|(from, pc)| attacks_square(pc, from, target, board))
}

/// A color without a king on the board is never in check.
pub fn is_in_check(board: &Board, color: Color) -> bool {
    match board.king_square(color) {
        Some(ksq) => is_square_attacked(board, ksq, color.other()),
        None => false,
    }
}

pub fn can_castle(color: Color, side: CastleSide, board: &Board, rights: &CastlingRights) -> bool {
    if !rights.get(color, side) {
        return false;
    }
    let row = color.home_row();
    let home = |col: i8| Square::new(row, col);

    let (Some(king_sq), Some(rook_sq)) = (home(KING_HOME_COL), home(side.rook_home_col())) else {
        return false;
    };
    if board.piece_at(king_sq) != Some(Piece::new(color, PieceKind::King))
        || board.piece_at(rook_sq) != Some(Piece::new(color, PieceKind::Rook))
    {
        return false;
    }
    if !side
        .between_cols()
        .iter()
        .all(|&c| home(c).is_some_and(|s| board.is_empty(s)))
    {
        return false;
    }
    if is_in_check(board, color) {
        return false;
    }

    let enemy = color.other();
    [side.king_pass_col(), side.king_to_col()]
        .iter()
        .all(|&c| home(c).is_some_and(|s| !is_square_attacked(board, s, enemy)))
}

/// Full legality of moving whatever stands on `from` to `to`: geometry,
/// castling and en passant shape, and the self-check rule. The self-check
/// test runs on a copy of the board.
pub fn is_legal(
    board: &Board,
    from: Square,
    to: Square,
    last_move: Option<Move>,
    castling: &CastlingRights,
) -> bool {
    let Some(piece) = board.piece_at(from) else {
        return false;
    };
    if !is_valid_move(piece, from, to, board, last_move, Some(castling)) {
        return false;
    }
    let mut scratch = *board;
    scratch.play(from, to, None);
    !is_in_check(&scratch, piece.color)
}

/// Every legal move for `color`, by exhaustive scan of origin and
/// destination squares. A promoting pawn move appears once.
pub fn legal_moves(
    board: &Board,
    color: Color,
    last_move: Option<Move>,
    castling: &CastlingRights,
) -> Vec<Move> {
    let mut out = Vec::with_capacity(64);
    for (from, _) in board.pieces(color) {
        for to in Square::all() {
            if is_legal(board, from, to, last_move, castling) {
                out.push(Move::new(from, to));
            }
        }
    }
    out
}

/// Early-exit form of [`legal_moves`]. Expensive; call once per completed
/// move, not per query.
pub fn has_legal_moves(
    board: &Board,
    color: Color,
    last_move: Option<Move>,
    castling: &CastlingRights,
) -> bool {
    board.pieces(color).any(|(from, _)| {
        Square::all().any(|to| is_legal(board, from, to, last_move, castling))
    })
}

#[cfg(test)]
#[path = "rules_tests.rs"]
mod rules_tests;
