//! Board model: piece placement plus the state that travels with it.

use chess_core::{Color, FenCastling, FenError, FenRecord, Piece, PieceKind, Square};
use thiserror::Error;

use crate::Bitboard;

/// Reasons a FEN string cannot become a playable [`Position`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PositionError {
    /// The text is not well-formed FEN.
    #[error(transparent)]
    Fen(#[from] FenError),

    /// Each side must have exactly one king.
    #[error("{color} has {count} kings, expected exactly one")]
    KingCount { color: Color, count: u32 },

    /// Pawns can never stand on the first or eighth rank.
    #[error("pawn on back rank at {0}")]
    PawnOnBackRank(Square),

    /// The side that just moved cannot still be in check.
    #[error("side not to move is in check")]
    OpponentInCheck,
}

/// Which castling moves are still permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CastlingRights(u8);

impl CastlingRights {
    pub const NONE: CastlingRights = CastlingRights(0);
    pub const WHITE_KINGSIDE: u8 = 0b0001;
    pub const WHITE_QUEENSIDE: u8 = 0b0010;
    pub const BLACK_KINGSIDE: u8 = 0b0100;
    pub const BLACK_QUEENSIDE: u8 = 0b1000;
    pub const ALL: CastlingRights = CastlingRights(0b1111);

    #[inline]
    pub const fn new(flags: u8) -> Self {
        CastlingRights(flags & 0b1111)
    }

    const fn kingside_flag(color: Color) -> u8 {
        match color {
            Color::White => Self::WHITE_KINGSIDE,
            Color::Black => Self::BLACK_KINGSIDE,
        }
    }

    const fn queenside_flag(color: Color) -> u8 {
        match color {
            Color::White => Self::WHITE_QUEENSIDE,
            Color::Black => Self::BLACK_QUEENSIDE,
        }
    }

    #[inline]
    pub const fn kingside(self, color: Color) -> bool {
        self.0 & Self::kingside_flag(color) != 0
    }

    #[inline]
    pub const fn queenside(self, color: Color) -> bool {
        self.0 & Self::queenside_flag(color) != 0
    }

    #[inline]
    pub fn remove_color(&mut self, color: Color) {
        self.0 &= !(Self::kingside_flag(color) | Self::queenside_flag(color));
    }

    /// Drops whichever right depends on a rook starting on `sq`.
    pub fn remove_for_rook_square(&mut self, sq: Square) {
        let flag = match sq {
            Square::H1 => Self::WHITE_KINGSIDE,
            Square::A1 => Self::WHITE_QUEENSIDE,
            Square::H8 => Self::BLACK_KINGSIDE,
            Square::A8 => Self::BLACK_QUEENSIDE,
            _ => return,
        };
        self.0 &= !flag;
    }

    #[inline]
    pub const fn raw(self) -> u8 {
        self.0
    }
}

impl From<FenCastling> for CastlingRights {
    fn from(fen: FenCastling) -> Self {
        let mut flags = 0;
        if fen.white_kingside {
            flags |= Self::WHITE_KINGSIDE;
        }
        if fen.white_queenside {
            flags |= Self::WHITE_QUEENSIDE;
        }
        if fen.black_kingside {
            flags |= Self::BLACK_KINGSIDE;
        }
        if fen.black_queenside {
            flags |= Self::BLACK_QUEENSIDE;
        }
        CastlingRights(flags)
    }
}

impl From<CastlingRights> for FenCastling {
    fn from(rights: CastlingRights) -> Self {
        FenCastling {
            white_kingside: rights.kingside(Color::White),
            white_queenside: rights.queenside(Color::White),
            black_kingside: rights.kingside(Color::Black),
            black_queenside: rights.queenside(Color::Black),
        }
    }
}

/// The part of a position that decides whether two positions repeat:
/// placement, side to move, castling rights and en-passant target. Move
/// counters are left out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PositionKey {
    pieces: [Bitboard; 6],
    colors: [Bitboard; 2],
    side_to_move: Color,
    castling: CastlingRights,
    en_passant: Option<Square>,
}

/// A complete chess position.
///
/// Positions are values. Applying a move produces a new `Position` and never
/// touches the old one, so snapshots kept in game history stay valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub(crate) pieces: [Bitboard; 6],
    pub(crate) colors: [Bitboard; 2],
    pub(crate) side_to_move: Color,
    pub(crate) castling: CastlingRights,
    pub(crate) en_passant: Option<Square>,
    pub(crate) halfmove_clock: u32,
    pub(crate) fullmove_number: u32,
}

const BACK_RANK: [PieceKind; 8] = [
    PieceKind::Rook,
    PieceKind::Knight,
    PieceKind::Bishop,
    PieceKind::Queen,
    PieceKind::King,
    PieceKind::Bishop,
    PieceKind::Knight,
    PieceKind::Rook,
];

impl Position {
    /// A board with no pieces, White to move. Only useful as a builder base.
    pub(crate) fn empty() -> Self {
        Position {
            pieces: [Bitboard::EMPTY; 6],
            colors: [Bitboard::EMPTY; 2],
            side_to_move: Color::White,
            castling: CastlingRights::NONE,
            en_passant: None,
            halfmove_clock: 0,
            fullmove_number: 1,
        }
    }

    /// The standard starting position.
    pub fn startpos() -> Self {
        let mut position = Position::empty();
        for file in 0..8u8 {
            for color in Color::BOTH {
                let pawn_rank = color.pawn_rank();
                let back_rank = color.back_rank();
                if let Some(sq) = Square::from_coords(file, pawn_rank) {
                    position.put(sq, Piece::new(color, PieceKind::Pawn));
                }
                if let Some(sq) = Square::from_coords(file, back_rank) {
                    position.put(sq, Piece::new(color, BACK_RANK[file as usize]));
                }
            }
        }
        position.castling = CastlingRights::ALL;
        position
    }

    /// Builds a position from FEN, rejecting placements that cannot occur in
    /// a game (missing or extra kings, pawns on the back ranks, the side not
    /// to move standing in check).
    pub fn from_fen(fen: &str) -> Result<Self, PositionError> {
        let record = FenRecord::parse(fen)?;
        let mut position = Position::empty();
        for (index, piece) in record.board.iter().enumerate() {
            if let Some(piece) = piece {
                position.put(Square::from_index_masked(index as u8), *piece);
            }
        }
        position.side_to_move = record.side_to_move;
        position.castling = record.castling.into();
        position.en_passant = record.en_passant;
        position.halfmove_clock = record.halfmove_clock;
        position.fullmove_number = record.fullmove_number;

        for color in Color::BOTH {
            let count = position.pieces_of(PieceKind::King, color).count();
            if count != 1 {
                return Err(PositionError::KingCount { color, count });
            }
        }
        let pawns = position.pieces[PieceKind::Pawn.index()];
        if let Some(sq) = pawns.squares().find(|sq| sq.rank_index() == 0 || sq.rank_index() == 7) {
            return Err(PositionError::PawnOnBackRank(sq));
        }
        position.drop_stale_castling_rights();
        if crate::movegen::is_in_check(&position, position.side_to_move.opposite()) {
            return Err(PositionError::OpponentInCheck);
        }
        Ok(position)
    }

    /// FEN rights whose king or rook is not on its home square cannot be
    /// exercised, so they are dropped on load.
    fn drop_stale_castling_rights(&mut self) {
        for color in Color::BOTH {
            let rank = color.back_rank();
            let home = |file: u8| Square::from_coords(file, rank);
            let king_home = home(4).is_some_and(|sq| {
                self.piece_at(sq) == Some(Piece::new(color, PieceKind::King))
            });
            if !king_home {
                self.castling.remove_color(color);
                continue;
            }
            for file in [0u8, 7] {
                if let Some(corner) = home(file) {
                    if self.piece_at(corner) != Some(Piece::new(color, PieceKind::Rook)) {
                        self.castling.remove_for_rook_square(corner);
                    }
                }
            }
        }
    }

    pub fn to_fen(&self) -> String {
        self.to_fen_record().to_string()
    }

    pub fn to_fen_record(&self) -> FenRecord {
        let mut board = [None; 64];
        for (index, slot) in board.iter_mut().enumerate() {
            *slot = self.piece_at(Square::from_index_masked(index as u8));
        }
        FenRecord {
            board,
            side_to_move: self.side_to_move,
            castling: self.castling.into(),
            en_passant: self.en_passant,
            halfmove_clock: self.halfmove_clock,
            fullmove_number: self.fullmove_number,
        }
    }

    pub(crate) fn put(&mut self, sq: Square, piece: Piece) {
        self.pieces[piece.kind.index()] = self.pieces[piece.kind.index()].with(sq);
        self.colors[piece.color.index()] = self.colors[piece.color.index()].with(sq);
    }

    pub(crate) fn remove(&mut self, sq: Square) -> Option<Piece> {
        let piece = self.piece_at(sq)?;
        self.pieces[piece.kind.index()] = self.pieces[piece.kind.index()].without(sq);
        self.colors[piece.color.index()] = self.colors[piece.color.index()].without(sq);
        Some(piece)
    }

    pub fn piece_at(&self, sq: Square) -> Option<Piece> {
        let color = Color::BOTH
            .into_iter()
            .find(|color| self.colors[color.index()].contains(sq))?;
        PieceKind::ALL
            .into_iter()
            .find(|kind| self.pieces[kind.index()].contains(sq))
            .map(|kind| Piece::new(color, kind))
    }

    #[inline]
    pub fn occupied(&self) -> Bitboard {
        self.colors[0] | self.colors[1]
    }

    #[inline]
    pub fn pieces_of(&self, kind: PieceKind, color: Color) -> Bitboard {
        self.pieces[kind.index()] & self.colors[color.index()]
    }

    #[inline]
    pub fn color_occupancy(&self, color: Color) -> Bitboard {
        self.colors[color.index()]
    }

    pub fn king_square(&self, color: Color) -> Option<Square> {
        self.pieces_of(PieceKind::King, color).first()
    }

    #[inline]
    pub fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    #[inline]
    pub fn castling(&self) -> CastlingRights {
        self.castling
    }

    #[inline]
    pub fn en_passant(&self) -> Option<Square> {
        self.en_passant
    }

    /// Plies since the last pawn move or capture.
    #[inline]
    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove_clock
    }

    #[inline]
    pub fn fullmove_number(&self) -> u32 {
        self.fullmove_number
    }

    pub fn repetition_key(&self) -> PositionKey {
        PositionKey {
            pieces: self.pieces,
            colors: self.colors,
            side_to_move: self.side_to_move,
            castling: self.castling,
            en_passant: self.en_passant,
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::startpos()
    }
}
