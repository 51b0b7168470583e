//! Turn-taking game engine on top of the legality oracle.
//!
//! A [`Game`] exclusively owns its board and derived state. The only way to
//! change a game in progress is [`Game::apply_move`], which is atomic: a
//! rejected move leaves every field as it was.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::board::{Board, CastlingRights, PlacementError};
use crate::notation;
use crate::rules;
use crate::types::*;

/// Half-move clock value that ends the game under the fifty-move rule.
pub const FIFTY_MOVE_LIMIT: u32 = 100;

/// Occurrences of one position that end the game as a repetition draw.
pub const REPETITION_LIMIT: u32 = 3;

pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GameStatus {
    Active,
    Checkmate,
    Stalemate,
    DrawFifty,
    DrawRepetition,
}

impl GameStatus {
    /// Every status but `Active` is terminal until the game is reset.
    pub fn is_terminal(self) -> bool {
        self != GameStatus::Active
    }

    pub fn is_draw(self) -> bool {
        matches!(self, GameStatus::DrawFifty | GameStatus::DrawRepetition)
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GameStatus::Active => "active",
            GameStatus::Checkmate => "checkmate",
            GameStatus::Stalemate => "stalemate",
            GameStatus::DrawFifty => "draw-fifty",
            GameStatus::DrawRepetition => "draw-repetition",
        };
        f.write_str(s)
    }
}

/// How a pawn reaching the last rank is promoted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PromotionPolicy {
    /// Always a queen; any supplied choice is ignored.
    #[default]
    AutoQueen,
    /// The mover must name queen, rook, bishop or knight.
    PromptChoice,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MoveError {
    #[error("game is over ({0})")]
    GameOver(GameStatus),
    #[error("no piece on {0}")]
    NoPiece(Square),
    #[error("piece on {square} does not belong to {expected}, who is to move")]
    WrongTurn { square: Square, expected: Color },
    #[error("illegal move {from} -> {to}")]
    Illegal { from: Square, to: Square },
    #[error("move would leave the king in check")]
    LeavesKingInCheck,
    #[error("promotion piece required")]
    PromotionRequired,
    #[error("cannot promote to {0:?}")]
    InvalidPromotion(PieceKind),
    #[error("bad square: {0}")]
    BadSquare(#[from] SquareParseError),
    #[error("bad move text {0:?}")]
    BadMoveText(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FenError {
    #[error("expected 4 to 6 fields, got {0}")]
    FieldCount(usize),
    #[error("expected 8 ranks, got {0}")]
    RankCount(usize),
    #[error("rank {rank} spans {files} files")]
    RankWidth { rank: usize, files: usize },
    #[error("invalid piece char {0:?}")]
    BadPiece(char),
    #[error("invalid side to move {0:?}")]
    BadTurn(String),
    #[error("invalid castling field {0:?}")]
    BadCastling(String),
    #[error("invalid en passant field {0:?}")]
    BadEnPassant(String),
    #[error("invalid clock {0:?}")]
    BadClock(String),
}

impl From<PlacementError> for FenError {
    fn from(e: PlacementError) -> Self {
        match e {
            PlacementError::RankCount(n) => FenError::RankCount(n),
            PlacementError::RankWidth { rank, files } => FenError::RankWidth { rank, files },
            PlacementError::BadPiece(c) => FenError::BadPiece(c),
        }
    }
}

/// One applied move, as reported to callers and relayed between peers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRecord {
    pub from: Square,
    pub to: Square,
    /// The piece that moved, before any promotion.
    pub piece: Piece,
    pub captured_piece: Option<Piece>,
    pub is_en_passant: bool,
    pub is_castle: bool,
    pub is_check: bool,
    pub is_checkmate: bool,
    pub is_stalemate: bool,
    pub is_draw: bool,
    pub promoted_to: Option<PieceKind>,
    /// Standard algebraic notation.
    pub san: String,
    /// Full-move number the move was played on.
    pub move_number: u32,
}

#[derive(Clone, Debug)]
pub struct Game {
    pub(crate) board: Board,
    pub(crate) turn: Color,
    pub(crate) castling: CastlingRights,
    pub(crate) last_move: Option<Move>,
    pub(crate) halfmove_clock: u32,
    /// Positions reached by a move; the starting position is not counted.
    position_counts: HashMap<String, u32>,
    pub(crate) status: GameStatus,
    check: bool,
    history: Vec<MoveRecord>,
    pub(crate) promotion_policy: PromotionPolicy,
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

impl Game {
    pub fn new() -> Self {
        Self::with_policy(PromotionPolicy::default())
    }

    pub fn with_policy(promotion_policy: PromotionPolicy) -> Self {
        Game {
            board: Board::startpos(),
            turn: Color::White,
            castling: CastlingRights::all(),
            last_move: None,
            halfmove_clock: 0,
            position_counts: HashMap::new(),
            status: GameStatus::Active,
            check: false,
            history: Vec::new(),
            promotion_policy,
        }
    }

    /// Build a game from a position string.
    pub fn from_fen(fen: &str) -> Result<Self, FenError> {
        let mut g = Game::new();
        g.load_fen(fen)?;
        Ok(g)
    }

    /// Back to the initial position, keeping the promotion policy.
    pub fn reset(&mut self) {
        *self = Game::with_policy(self.promotion_policy);
    }

    pub fn board(&self) -> &Board {
        &self.board
    }
    pub fn turn(&self) -> Color {
        self.turn
    }
    pub fn castling(&self) -> &CastlingRights {
        &self.castling
    }
    pub fn last_move(&self) -> Option<Move> {
        self.last_move
    }
    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove_clock
    }
    pub fn status(&self) -> GameStatus {
        self.status
    }
    /// Whether the side to move is in check.
    pub fn in_check(&self) -> bool {
        self.check
    }
    pub fn history(&self) -> &[MoveRecord] {
        &self.history
    }
    pub fn promotion_policy(&self) -> PromotionPolicy {
        self.promotion_policy
    }

    /// Times the current position has been reached by a move.
    pub fn repetitions(&self) -> u32 {
        self.position_counts
            .get(&self.position_key())
            .copied()
            .unwrap_or(0)
    }

    /// The mating side, once the game ended in checkmate.
    pub fn winner(&self) -> Option<Color> {
        match self.status {
            GameStatus::Checkmate => Some(self.turn.other()),
            _ => None,
        }
    }

    /// `ceil(plies / 2) + 1` over this game's own history, so it restarts
    /// at 1 after a load.
    pub fn fullmove_number(&self) -> u32 {
        (self.history.len() as u32).div_ceil(2) + 1
    }

    /// Square passed over by a pawn's double step on the previous move.
    pub fn en_passant_target(&self) -> Option<Square> {
        let last = self.last_move?;
        let pc = self.board.piece_at(last.to)?;
        if pc.kind != PieceKind::Pawn || (last.to.row() - last.from.row()).abs() != 2 {
            return None;
        }
        Square::new((last.from.row() + last.to.row()) / 2, last.from.col())
    }

    /// Placement, turn, castling and en passant fields: the identity of a
    /// position for repetition purposes.
    pub fn position_key(&self) -> String {
        let ep = self
            .en_passant_target()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        format!(
            "{} {} {} {}",
            self.board.placement(),
            self.turn.fen_char(),
            self.castling.to_fen_field(),
            ep
        )
    }

    /// Six-field position string.
    pub fn to_fen(&self) -> String {
        format!(
            "{} {} {}",
            self.position_key(),
            self.halfmove_clock,
            self.fullmove_number()
        )
    }

    /// Replace the whole state with a parsed position. History and the
    /// repetition table start afresh. On error nothing changes.
    pub fn load_fen(&mut self, fen: &str) -> Result<(), FenError> {
        let parts: Vec<&str> = fen.split_whitespace().collect();
        if !(4..=6).contains(&parts.len()) {
            return Err(FenError::FieldCount(parts.len()));
        }

        let board = Board::from_placement(parts[0])?;
        let turn = match parts[1] {
            "w" => Color::White,
            "b" => Color::Black,
            other => return Err(FenError::BadTurn(other.to_string())),
        };
        let castling = CastlingRights::from_fen_field(parts[2])
            .ok_or_else(|| FenError::BadCastling(parts[2].to_string()))?;
        let last_move = if parts[3] == "-" {
            None
        } else {
            let target: Square = parts[3]
                .parse()
                .map_err(|_| FenError::BadEnPassant(parts[3].to_string()))?;
            double_step_through(&board, target, turn.other())
        };
        let halfmove_part = parts.get(4).copied().unwrap_or("0");
        let fullmove_part = parts.get(5).copied().unwrap_or("1");
        let halfmove_clock: u32 = halfmove_part
            .parse()
            .map_err(|_| FenError::BadClock(halfmove_part.to_string()))?;
        if !matches!(fullmove_part.parse::<u32>(), Ok(n) if n >= 1) {
            return Err(FenError::BadClock(fullmove_part.to_string()));
        }

        *self = Game {
            board,
            turn,
            castling,
            last_move,
            halfmove_clock,
            position_counts: HashMap::new(),
            status: GameStatus::Active,
            check: false,
            history: Vec::new(),
            promotion_policy: self.promotion_policy,
        };
        self.refresh_status();
        Ok(())
    }

    /// Turn-aware legality query with no side effects.
    pub fn is_valid_move(&self, from: Square, to: Square) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        match self.board.piece_at(from) {
            Some(pc) if pc.color == self.turn => {
                rules::is_legal(&self.board, from, to, self.last_move, &self.castling)
            }
            _ => false,
        }
    }

    /// Squares the piece on `from` may legally move to right now.
    pub fn legal_destinations(&self, from: Square) -> Vec<Square> {
        Square::all()
            .filter(|&to| self.is_valid_move(from, to))
            .collect()
    }

    /// Every legal move for the side to move; empty once the game is over.
    pub fn legal_moves(&self) -> Vec<Move> {
        if self.status.is_terminal() {
            return Vec::new();
        }
        rules::legal_moves(&self.board, self.turn, self.last_move, &self.castling)
    }

    /// Apply a move given in coordinate text, e.g. `e2e4` or `e7e8q`.
    pub fn apply_uci(&mut self, text: &str) -> Result<MoveRecord, MoveError> {
        if !text.is_ascii() || !(4..=5).contains(&text.len()) {
            return Err(MoveError::BadMoveText(text.to_string()));
        }
        let from: Square = text[0..2].parse()?;
        let to: Square = text[2..4].parse()?;
        let promotion = match text[4..].chars().next() {
            None => None,
            Some(c) => match PieceKind::from_letter(c) {
                Some(k) if k.is_promotion_target() => Some(k),
                _ => return Err(MoveError::BadMoveText(text.to_string())),
            },
        };
        self.apply_move(from, to, promotion)
    }

    /// Validate and commit one move for the side to move.
    pub fn apply_move(
        &mut self,
        from: Square,
        to: Square,
        promotion: Option<PieceKind>,
    ) -> Result<MoveRecord, MoveError> {
        if self.status.is_terminal() {
            return Err(MoveError::GameOver(self.status));
        }
        let piece = self.board.piece_at(from).ok_or(MoveError::NoPiece(from))?;
        if piece.color != self.turn {
            return Err(MoveError::WrongTurn {
                square: from,
                expected: self.turn,
            });
        }
        if !rules::is_valid_move(
            piece,
            from,
            to,
            &self.board,
            self.last_move,
            Some(&self.castling),
        ) {
            return Err(MoveError::Illegal { from, to });
        }

        let promoting = piece.kind == PieceKind::Pawn && to.row() == piece.color.promotion_row();
        let promotion = if promoting {
            Some(self.resolve_promotion(promotion)?)
        } else {
            None
        };

        let mut next = self.board;
        let disp = next.play(from, to, promotion);
        if rules::is_in_check(&next, piece.color) {
            return Err(MoveError::LeavesKingInCheck);
        }

        // Legal from here on; commit.
        let board_before = self.board;
        let last_before = self.last_move;
        let castling_before = self.castling;
        let move_number = self.fullmove_number();

        self.board = next;
        self.update_castling(piece, from, disp.captured);
        self.last_move = Some(Move::new(from, to));
        self.halfmove_clock = if piece.kind == PieceKind::Pawn || disp.captured.is_some() {
            0
        } else {
            self.halfmove_clock + 1
        };
        self.turn = self.turn.other();
        self.record_position();
        self.refresh_status();

        let mut record = MoveRecord {
            from,
            to,
            piece,
            captured_piece: disp.captured.map(|(_, pc)| pc),
            is_en_passant: disp.en_passant,
            is_castle: disp.rook.is_some(),
            is_check: self.check,
            is_checkmate: self.status == GameStatus::Checkmate,
            is_stalemate: self.status == GameStatus::Stalemate,
            is_draw: self.status.is_draw(),
            promoted_to: disp.promoted_to,
            san: String::new(),
            move_number,
        };
        record.san = notation::san(&board_before, last_before, &castling_before, &record);
        self.history.push(record.clone());
        Ok(record)
    }

    fn resolve_promotion(&self, choice: Option<PieceKind>) -> Result<PieceKind, MoveError> {
        match self.promotion_policy {
            PromotionPolicy::AutoQueen => Ok(PieceKind::Queen),
            PromotionPolicy::PromptChoice => match choice {
                None => Err(MoveError::PromotionRequired),
                Some(k) if k.is_promotion_target() => Ok(k),
                Some(k) => Err(MoveError::InvalidPromotion(k)),
            },
        }
    }

    fn update_castling(&mut self, moved: Piece, from: Square, captured: Option<(Square, Piece)>) {
        if moved.kind == PieceKind::King {
            self.castling.revoke_all(moved.color);
        }
        if moved.kind == PieceKind::Rook
            && let Some(side) = rook_home_side(moved.color, from)
        {
            self.castling.revoke(moved.color, side);
        }
        if let Some((sq, cap)) = captured
            && cap.kind == PieceKind::Rook
            && let Some(side) = rook_home_side(cap.color, sq)
        {
            self.castling.revoke(cap.color, side);
        }
    }

    fn record_position(&mut self) {
        *self.position_counts.entry(self.position_key()).or_insert(0) += 1;
    }

    /// Recompute check and status for the side to move. Checkmate and
    /// stalemate take precedence over the draw rules.
    fn refresh_status(&mut self) {
        self.check = rules::is_in_check(&self.board, self.turn);
        let can_move =
            rules::has_legal_moves(&self.board, self.turn, self.last_move, &self.castling);
        self.status = if !can_move {
            if self.check {
                GameStatus::Checkmate
            } else {
                GameStatus::Stalemate
            }
        } else if self.halfmove_clock >= FIFTY_MOVE_LIMIT {
            GameStatus::DrawFifty
        } else if self.repetitions() >= REPETITION_LIMIT {
            GameStatus::DrawRepetition
        } else {
            GameStatus::Active
        };
    }
}

/// Castling side whose rook starts on `sq`, if `sq` is one of `color`'s rook corners.
fn rook_home_side(color: Color, sq: Square) -> Option<CastleSide> {
    if sq.row() != color.home_row() {
        return None;
    }
    CastleSide::BOTH
        .into_iter()
        .find(|side| side.rook_home_col() == sq.col())
}

/// Rebuild the double step `mover` must have just played for `target` to be
/// an en passant square. Inconsistent targets yield `None`.
fn double_step_through(board: &Board, target: Square, mover: Color) -> Option<Move> {
    let dir = mover.pawn_dir();
    if target.row() != mover.pawn_start_row() + dir {
        return None;
    }
    let from = target.offset(-dir, 0)?;
    let to = target.offset(dir, 0)?;
    if board.piece_at(to) != Some(Piece::new(mover, PieceKind::Pawn)) {
        return None;
    }
    Some(Move::new(from, to))
}

#[cfg(test)]
#[path = "game_tests.rs"]
mod game_tests;
