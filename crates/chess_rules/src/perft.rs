use crate::game::{Game, GameStatus, PromotionPolicy};
use crate::rules::legal_moves;
use crate::types::{Move, PieceKind};

const PROMOTION_CHOICES: [Option<PieceKind>; 4] = [
    Some(PieceKind::Queen),
    Some(PieceKind::Rook),
    Some(PieceKind::Bishop),
    Some(PieceKind::Knight),
];

/// Perft node count.
/// Counts all legal positions from the current one down to `depth`. Draw
/// rules are ignored and every promotion piece is a separate move, whatever
/// the game's promotion policy, so counts match the published tables.
pub fn perft(game: &Game, depth: u8) -> u64 {
    if depth == 0 {
        return 1;
    }

    let moves = legal_moves(&game.board, game.turn, game.last_move, &game.castling);
    if depth == 1 {
        return moves.iter().map(|mv| choices(game, mv).len() as u64).sum();
    }

    let mut base = game.clone();
    base.status = GameStatus::Active;
    base.promotion_policy = PromotionPolicy::PromptChoice;

    let mut nodes = 0u64;
    for mv in &moves {
        for &choice in choices(game, mv) {
            let mut child = base.clone();
            if child.apply_move(mv.from, mv.to, choice).is_ok() {
                nodes += perft(&child, depth - 1);
            }
        }
    }
    nodes
}

fn choices(game: &Game, mv: &Move) -> &'static [Option<PieceKind>] {
    match game.board.piece_at(mv.from) {
        Some(pc) if pc.kind == PieceKind::Pawn && mv.to.row() == pc.color.promotion_row() => {
            &PROMOTION_CHOICES
        }
        _ => &[None],
    }
}
