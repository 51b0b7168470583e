use crate::types::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CastlingRights {
    pub white_kingside: bool,
    pub white_queenside: bool,
    pub black_kingside: bool,
    pub black_queenside: bool,
}

impl CastlingRights {
    pub fn all() -> Self {
        Self {
            white_kingside: true,
            white_queenside: true,
            black_kingside: true,
            black_queenside: true,
        }
    }

    pub fn none() -> Self {
        Self {
            white_kingside: false,
            white_queenside: false,
            black_kingside: false,
            black_queenside: false,
        }
    }

    pub fn get(&self, color: Color, side: CastleSide) -> bool {
        match (color, side) {
            (Color::White, CastleSide::Kingside) => self.white_kingside,
            (Color::White, CastleSide::Queenside) => self.white_queenside,
            (Color::Black, CastleSide::Kingside) => self.black_kingside,
            (Color::Black, CastleSide::Queenside) => self.black_queenside,
        }
    }

    /// Rights only ever go from true to false.
    pub fn revoke(&mut self, color: Color, side: CastleSide) {
        match (color, side) {
            (Color::White, CastleSide::Kingside) => self.white_kingside = false,
            (Color::White, CastleSide::Queenside) => self.white_queenside = false,
            (Color::Black, CastleSide::Kingside) => self.black_kingside = false,
            (Color::Black, CastleSide::Queenside) => self.black_queenside = false,
        }
    }

    pub fn revoke_all(&mut self, color: Color) {
        self.revoke(color, CastleSide::Kingside);
        self.revoke(color, CastleSide::Queenside);
    }

    /// `KQkq` subset, or `-` when no right remains.
    pub fn to_fen_field(&self) -> String {
        let mut s = String::new();
        if self.white_kingside {
            s.push('K');
        }
        if self.white_queenside {
            s.push('Q');
        }
        if self.black_kingside {
            s.push('k');
        }
        if self.black_queenside {
            s.push('q');
        }
        if s.is_empty() {
            s.push('-');
        }
        s
    }

    pub fn from_fen_field(field: &str) -> Option<Self> {
        let mut rights = CastlingRights::none();
        if field == "-" {
            return Some(rights);
        }
        for c in field.chars() {
            match c {
                'K' => rights.white_kingside = true,
                'Q' => rights.white_queenside = true,
                'k' => rights.black_kingside = true,
                'q' => rights.black_queenside = true,
                _ => return None,
            }
        }
        Some(rights)
    }
}

impl Default for CastlingRights {
    fn default() -> Self {
        Self::all()
    }
}

/// What [`Board::play`] did besides moving the piece.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Displacement {
    /// Captured piece and the square it stood on (differs from the
    /// destination for en passant).
    pub captured: Option<(Square, Piece)>,
    pub rook: Option<(Square, Square)>,
    pub en_passant: bool,
    pub promoted_to: Option<PieceKind>,
}

/// Errors from parsing the placement field of a position string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlacementError {
    RankCount(usize),
    RankWidth { rank: usize, files: usize },
    BadPiece(char),
}

/// 8x8 piece placement. `Copy`, so a tentative move is always tried on a
/// scratch copy and never on the live board.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Board {
    squares: [[Option<Piece>; 8]; 8],
}

impl Board {
    pub fn empty() -> Self {
        Board {
            squares: [[None; 8]; 8],
        }
    }

    pub fn startpos() -> Self {
        let mut b = Board::empty();
        let back = [
            PieceKind::Rook,
            PieceKind::Knight,
            PieceKind::Bishop,
            PieceKind::Queen,
            PieceKind::King,
            PieceKind::Bishop,
            PieceKind::Knight,
            PieceKind::Rook,
        ];
        for col in 0..8 {
            b.squares[0][col] = Some(Piece::new(Color::Black, back[col]));
            b.squares[1][col] = Some(Piece::new(Color::Black, PieceKind::Pawn));
            b.squares[6][col] = Some(Piece::new(Color::White, PieceKind::Pawn));
            b.squares[7][col] = Some(Piece::new(Color::White, back[col]));
        }
        b
    }

    pub fn piece_at(&self, sq: Square) -> Option<Piece> {
        self.squares[sq.row() as usize][sq.col() as usize]
    }

    pub fn set_piece(&mut self, sq: Square, pc: Option<Piece>) {
        self.squares[sq.row() as usize][sq.col() as usize] = pc;
    }

    pub fn is_empty(&self, sq: Square) -> bool {
        self.piece_at(sq).is_none()
    }

    pub fn king_square(&self, c: Color) -> Option<Square> {
        Square::all().find(|&s| self.piece_at(s) == Some(Piece::new(c, PieceKind::King)))
    }

    /// Every piece of one color with its square, in a8..h1 order.
    pub fn pieces(&self, c: Color) -> impl Iterator<Item = (Square, Piece)> + '_ {
        Square::all().filter_map(move |s| match self.piece_at(s) {
            Some(pc) if pc.color == c => Some((s, pc)),
            _ => None,
        })
    }

    /// Move the piece on `from` to `to`, carrying out the side effects of
    /// castling, en passant and promotion. Performs no legality checks.
    /// A pawn on its promotion row becomes `promotion`, or a queen if none.
    pub fn play(&mut self, from: Square, to: Square, promotion: Option<PieceKind>) -> Displacement {
        let mut out = Displacement::default();
        let Some(moved) = self.piece_at(from) else {
            return out;
        };

        if let Some(target) = self.piece_at(to) {
            out.captured = Some((to, target));
        }

        let dcol = to.col() - from.col();
        if moved.kind == PieceKind::Pawn && dcol != 0 && out.captured.is_none() {
            // En passant: the victim sits beside the pawn, behind the destination.
            if let Some(victim_sq) = to.offset(-moved.color.pawn_dir(), 0) {
                out.captured = self.piece_at(victim_sq).map(|pc| (victim_sq, pc));
                self.set_piece(victim_sq, None);
                out.en_passant = true;
            }
        }

        if moved.kind == PieceKind::King && dcol.abs() == 2 {
            let side = CastleSide::from_king_move(from.col(), to.col());
            let rook_from = Square::new(from.row(), side.rook_home_col());
            let rook_to = Square::new(from.row(), side.rook_to_col());
            if let (Some(rf), Some(rt)) = (rook_from, rook_to) {
                let rook = self.piece_at(rf);
                self.set_piece(rf, None);
                self.set_piece(rt, rook);
                out.rook = Some((rf, rt));
            }
        }

        self.set_piece(from, None);
        self.set_piece(to, Some(moved));

        if moved.kind == PieceKind::Pawn && to.row() == moved.color.promotion_row() {
            let kind = promotion.unwrap_or(PieceKind::Queen);
            self.set_piece(to, Some(Piece::new(moved.color, kind)));
            out.promoted_to = Some(kind);
        }

        out
    }

    /// First field of a position string: ranks from row 0, empties run-length encoded.
    pub fn placement(&self) -> String {
        let mut s = String::with_capacity(72);
        for row in 0..8 {
            let mut empty = 0;
            for col in 0..8 {
                match self.squares[row][col] {
                    Some(pc) => {
                        if empty > 0 {
                            s.push(char::from(b'0' + empty));
                            empty = 0;
                        }
                        s.push(pc.fen_char());
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                s.push(char::from(b'0' + empty));
            }
            if row < 7 {
                s.push('/');
            }
        }
        s
    }

    pub fn from_placement(text: &str) -> Result<Board, PlacementError> {
        let ranks: Vec<&str> = text.split('/').collect();
        if ranks.len() != 8 {
            return Err(PlacementError::RankCount(ranks.len()));
        }

        let mut board = Board::empty();
        for (row, rank) in ranks.iter().enumerate() {
            let mut files = 0usize;
            for ch in rank.chars() {
                if let Some(d) = ch.to_digit(10) {
                    if !(1..=8).contains(&d) {
                        return Err(PlacementError::BadPiece(ch));
                    }
                    files += d as usize;
                } else {
                    let pc = Piece::from_fen_char(ch).ok_or(PlacementError::BadPiece(ch))?;
                    if files < 8 {
                        board.squares[row][files] = Some(pc);
                    }
                    files += 1;
                }
                if files > 8 {
                    return Err(PlacementError::RankWidth { rank: row, files });
                }
            }
            if files != 8 {
                return Err(PlacementError::RankWidth { rank: row, files });
            }
        }
        Ok(board)
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::startpos()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(s: &str) -> Square {
        s.parse().unwrap()
    }

    #[test]
    fn test_startpos_placement() {
        assert_eq!(
            Board::startpos().placement(),
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR"
        );
    }

    #[test]
    fn test_placement_round_trip() {
        let text = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R";
        assert_eq!(Board::from_placement(text).unwrap().placement(), text);
    }

    #[test]
    fn test_placement_errors() {
        assert_eq!(
            Board::from_placement("8/8/8/8/8/8/8"),
            Err(PlacementError::RankCount(7))
        );
        assert_eq!(
            Board::from_placement("8/8/8/8/8/8/8/44P"),
            Err(PlacementError::RankWidth { rank: 7, files: 9 })
        );
        assert_eq!(
            Board::from_placement("8/8/8/8/8/8/8/7"),
            Err(PlacementError::RankWidth { rank: 7, files: 7 })
        );
    }

    #[test]
    fn test_play_castling_moves_rook() {
        let mut b = Board::from_placement("4k3/8/8/8/8/8/8/R3K2R").unwrap();
        let d = b.play(sq("e1"), sq("c1"), None);
        assert_eq!(d.rook, Some((sq("a1"), sq("d1"))));
        assert_eq!(b.placement(), "4k3/8/8/8/8/8/8/2KR3R");
    }

    #[test]
    fn test_play_en_passant_removes_victim() {
        let mut b = Board::from_placement("4k3/8/8/3pP3/8/8/8/4K3").unwrap();
        let d = b.play(sq("e5"), sq("d6"), None);
        assert!(d.en_passant);
        assert_eq!(
            d.captured,
            Some((sq("d5"), Piece::new(Color::Black, PieceKind::Pawn)))
        );
        assert!(b.is_empty(sq("d5")));
    }

    #[test]
    fn test_castling_field() {
        let mut rights = CastlingRights::all();
        assert_eq!(rights.to_fen_field(), "KQkq");
        rights.revoke_all(Color::Black);
        assert_eq!(rights.to_fen_field(), "KQ");
        assert_eq!(CastlingRights::from_fen_field("-"), Some(CastlingRights::none()));
        assert_eq!(CastlingRights::from_fen_field("Kz"), None);
    }
}
