//! Tests for game termination
//!
//! This module tests every terminal status:
//! - Checkmate
//! - Stalemate
//! - Fifty-move rule
//! - Threefold repetition

use chess_rules::{Color, Game, GameStatus, MoveError, has_legal_moves, is_in_check};

fn play(game: &mut Game, moves: &[&str]) {
    for mv in moves {
        game.apply_uci(mv)
            .unwrap_or_else(|e| panic!("move {mv} rejected: {e}"));
    }
}

/// The mate/stalemate classification must agree with the oracle.
fn assert_status_matches_oracle(game: &Game) {
    let board = game.board();
    let side = game.turn();
    let can_move = has_legal_moves(board, side, game.last_move(), game.castling());
    let check = is_in_check(board, side);
    match (can_move, check) {
        (false, true) => assert_eq!(game.status(), GameStatus::Checkmate),
        (false, false) => assert_eq!(game.status(), GameStatus::Stalemate),
        _ => assert!(!matches!(
            game.status(),
            GameStatus::Checkmate | GameStatus::Stalemate
        )),
    }
}

// =============================================================================
// Stalemate Tests
// =============================================================================

#[test]
fn test_stalemate_king_in_corner() {
    // Black king in corner, white queen stalemates
    let game = Game::from_fen("k7/2K5/1Q6/8/8/8/8/8 b - - 0 1").unwrap();

    assert_eq!(game.status(), GameStatus::Stalemate);
    assert!(!game.in_check(), "Stalemate means king is not in check");
    assert_status_matches_oracle(&game);
}

#[test]
fn test_stalemate_king_and_pawn_endgame() {
    // White king on g6, white pawn on g7, black king on g8
    let game = Game::from_fen("6k1/6P1/6K1/8/8/8/8/8 b - - 0 1").unwrap();

    assert_eq!(game.status(), GameStatus::Stalemate);
    assert!(game.legal_moves().is_empty());
    assert_status_matches_oracle(&game);
}

#[test]
fn test_stalemate_is_terminal() {
    let mut game = Game::from_fen("6k1/6P1/6K1/8/8/8/8/8 b - - 0 1").unwrap();
    assert_eq!(
        game.apply_uci("g8h8"),
        Err(MoveError::GameOver(GameStatus::Stalemate))
    );
}

// =============================================================================
// Checkmate Tests
// =============================================================================

#[test]
fn test_back_rank_mate() {
    let mut game = Game::from_fen("6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1").unwrap();
    game.apply_uci("a1a8").unwrap();

    assert_eq!(game.status(), GameStatus::Checkmate);
    assert_eq!(game.winner(), Some(Color::White));
    assert_status_matches_oracle(&game);
}

#[test]
fn test_scholars_mate() {
    let mut game = Game::new();
    play(
        &mut game,
        &["e2e4", "e7e5", "f1c4", "b8c6", "d1h5", "g8f6", "h5f7"],
    );

    assert_eq!(game.status(), GameStatus::Checkmate);
    assert_eq!(game.winner(), Some(Color::White));
    let last = game.history().last().unwrap();
    assert_eq!(last.san, "Qxf7#");
}

#[test]
fn test_check_is_not_mate_when_king_can_escape() {
    let mut game = Game::new();
    play(&mut game, &["e2e4", "f7f6", "d1h5"]);

    assert!(game.in_check());
    assert_eq!(game.status(), GameStatus::Active);
    assert_status_matches_oracle(&game);
}

// =============================================================================
// Fifty-Move Rule Tests
// =============================================================================

#[test]
fn test_fifty_move_rule_at_100_halfmoves() {
    let game = Game::from_fen("8/8/8/4k3/8/4K3/8/8 w - - 100 60").unwrap();

    assert_eq!(
        game.status(),
        GameStatus::DrawFifty,
        "Position with halfmove_clock=100 should be a draw"
    );
}

#[test]
fn test_fifty_move_rule_at_99_halfmoves() {
    let game = Game::from_fen("8/8/8/4k3/8/4K3/8/8 w - - 99 60").unwrap();

    assert_eq!(
        game.status(),
        GameStatus::Active,
        "Position with halfmove_clock=99 should not be a draw yet"
    );
}

#[test]
fn test_fifty_move_rule_reset_on_pawn_move() {
    let mut game = Game::from_fen("8/8/8/4k3/8/3K4/4P3/8 w - - 99 60").unwrap();
    game.apply_uci("e2e3").unwrap();

    assert_eq!(game.status(), GameStatus::Active);
    assert_eq!(
        game.halfmove_clock(),
        0,
        "Halfmove clock should be 0 after pawn move"
    );
}

#[test]
fn test_fifty_move_rule_reset_on_capture() {
    let mut game = Game::from_fen("8/8/8/4k3/8/3K4/8/r6R w - - 99 60").unwrap();
    game.apply_uci("h1a1").unwrap();

    assert_eq!(game.halfmove_clock(), 0);
    assert_eq!(game.status(), GameStatus::Active);
}

// =============================================================================
// Repetition Tests
// =============================================================================

#[test]
fn test_repetition_needs_three_occurrences() {
    let mut game = Game::new();
    let shuffle = ["b1c3", "b8c6", "c3b1", "c6b8"];
    play(&mut game, &shuffle);
    play(&mut game, &shuffle);
    // The opening position has now been reached twice by a move.
    assert_eq!(game.repetitions(), 2);
    assert_eq!(game.status(), GameStatus::Active);
    play(&mut game, &["b1c3"]);
    assert_eq!(game.status(), GameStatus::DrawRepetition);
    assert_eq!(game.history().len(), 9);
}

#[test]
fn test_repetition_key_includes_castling_rights() {
    // Rook shuffles cost castling rights, so the opening position never
    // recurs. The position after h8g8 (rights Qq) first appears on ply 2.
    let mut game = Game::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
    play(
        &mut game,
        &["h1g1", "h8g8", "g1h1", "g8h8", "h1g1", "h8g8", "g1h1", "g8h8"],
    );
    assert_eq!(game.status(), GameStatus::Active);
    play(&mut game, &["h1g1"]);
    assert_eq!(game.status(), GameStatus::Active);
    play(&mut game, &["h8g8"]);
    assert_eq!(game.status(), GameStatus::DrawRepetition);
}
