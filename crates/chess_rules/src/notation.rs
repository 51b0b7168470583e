use crate::board::{Board, CastlingRights};
use crate::game::MoveRecord;
use crate::rules;
use crate::types::*;

/// Standard algebraic notation for a move, given the board as it stood
/// before the move. Reporting only; nothing is mutated.
pub fn san(
    before: &Board,
    last_move: Option<Move>,
    castling: &CastlingRights,
    record: &MoveRecord,
) -> String {
    let mut s = String::with_capacity(8);
    let from = record.from;
    let to = record.to;
    let piece = record.piece;

    if record.is_castle {
        s.push_str(match CastleSide::from_king_move(from.col(), to.col()) {
            CastleSide::Kingside => "O-O",
            CastleSide::Queenside => "O-O-O",
        });
    } else {
        let capture = record.captured_piece.is_some() || record.is_en_passant;
        if piece.kind == PieceKind::Pawn {
            if capture {
                s.push(from.file_char());
            }
        } else {
            s.push(piece.kind.letter().to_ascii_uppercase());
            s.push_str(&disambiguation(before, last_move, castling, piece, from, to));
        }
        if capture {
            s.push('x');
        }
        s.push_str(&to.to_string());
        if let Some(kind) = record.promoted_to {
            s.push('=');
            s.push(kind.letter().to_ascii_uppercase());
        }
    }

    if record.is_checkmate {
        s.push('#');
    } else if record.is_check {
        s.push('+');
    }
    s
}

/// File, rank, or full origin square, whichever is the first to tell the
/// mover apart from other like pieces that could also reach `to`.
fn disambiguation(
    before: &Board,
    last_move: Option<Move>,
    castling: &CastlingRights,
    piece: Piece,
    from: Square,
    to: Square,
) -> String {
    let rivals: Vec<Square> = before
        .pieces(piece.color)
        .filter(|&(sq, pc)| {
            sq != from && pc == piece && rules::is_legal(before, sq, to, last_move, castling)
        })
        .map(|(sq, _)| sq)
        .collect();

    if rivals.is_empty() {
        String::new()
    } else if !rivals.iter().any(|s| s.col() == from.col()) {
        from.file_char().to_string()
    } else if !rivals.iter().any(|s| s.row() == from.row()) {
        from.rank_char().to_string()
    } else {
        from.to_string()
    }
}

#[cfg(test)]
#[path = "notation_tests.rs"]
mod notation_tests;
