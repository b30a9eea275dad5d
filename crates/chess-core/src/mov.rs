//! Move representation.

use crate::{PieceKind, Square};
use std::fmt;

/// What kind of move this is, beyond moving a piece from one square to another.
///
/// The kinds are mutually exclusive. Whether the move captures is tracked
/// separately so that a promotion can also be a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MoveFlag {
    Normal = 0,
    /// Pawn advancing two squares from its starting rank.
    DoublePush = 1,
    CastleKingside = 2,
    CastleQueenside = 3,
    /// Pawn capturing onto the en-passant target square.
    EnPassant = 4,
    PromoteKnight = 5,
    PromoteBishop = 6,
    PromoteRook = 7,
    PromoteQueen = 8,
}

impl MoveFlag {
    const ALL: [MoveFlag; 9] = [
        MoveFlag::Normal,
        MoveFlag::DoublePush,
        MoveFlag::CastleKingside,
        MoveFlag::CastleQueenside,
        MoveFlag::EnPassant,
        MoveFlag::PromoteKnight,
        MoveFlag::PromoteBishop,
        MoveFlag::PromoteRook,
        MoveFlag::PromoteQueen,
    ];

    /// The promotion flag for a piece kind, if that kind can be promoted to.
    pub const fn promote_to(kind: PieceKind) -> Option<Self> {
        match kind {
            PieceKind::Knight => Some(MoveFlag::PromoteKnight),
            PieceKind::Bishop => Some(MoveFlag::PromoteBishop),
            PieceKind::Rook => Some(MoveFlag::PromoteRook),
            PieceKind::Queen => Some(MoveFlag::PromoteQueen),
            _ => None,
        }
    }

    #[inline]
    pub const fn promotion_piece(self) -> Option<PieceKind> {
        match self {
            MoveFlag::PromoteKnight => Some(PieceKind::Knight),
            MoveFlag::PromoteBishop => Some(PieceKind::Bishop),
            MoveFlag::PromoteRook => Some(PieceKind::Rook),
            MoveFlag::PromoteQueen => Some(PieceKind::Queen),
            _ => None,
        }
    }

    #[inline]
    pub const fn is_promotion(self) -> bool {
        self.promotion_piece().is_some()
    }

    #[inline]
    pub const fn is_castling(self) -> bool {
        matches!(self, MoveFlag::CastleKingside | MoveFlag::CastleQueenside)
    }
}

const CAPTURE_BIT: u32 = 1 << 16;

/// A chess move.
///
/// Packed as 6 bits origin, 6 bits destination, 4 bits [`MoveFlag`] and one
/// capture bit. A move only carries meaning relative to the position it was
/// generated from; moves parsed from UCI text carry no capture information
/// and must be resolved against the legal moves of a position before use.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Move(u32);

impl Move {
    #[inline]
    pub const fn new(from: Square, to: Square, flag: MoveFlag) -> Self {
        Move((from.index() as u32) | ((to.index() as u32) << 6) | ((flag as u32) << 12))
    }

    /// A quiet move with no special flag.
    #[inline]
    pub const fn normal(from: Square, to: Square) -> Self {
        Self::new(from, to, MoveFlag::Normal)
    }

    /// Returns this move marked as a capture.
    #[inline]
    pub const fn with_capture(self) -> Self {
        Move(self.0 | CAPTURE_BIT)
    }

    #[inline]
    pub const fn from(self) -> Square {
        Square::from_index_masked((self.0 & 0x3F) as u8)
    }

    #[inline]
    pub const fn to(self) -> Square {
        Square::from_index_masked(((self.0 >> 6) & 0x3F) as u8)
    }

    #[inline]
    pub const fn flag(self) -> MoveFlag {
        let index = ((self.0 >> 12) & 0xF) as usize;
        if index < MoveFlag::ALL.len() {
            MoveFlag::ALL[index]
        } else {
            MoveFlag::Normal
        }
    }

    /// True for every capture, en passant included.
    #[inline]
    pub const fn is_capture(self) -> bool {
        self.0 & CAPTURE_BIT != 0
    }

    #[inline]
    pub const fn is_en_passant(self) -> bool {
        matches!(self.flag(), MoveFlag::EnPassant)
    }

    #[inline]
    pub const fn is_double_push(self) -> bool {
        matches!(self.flag(), MoveFlag::DoublePush)
    }

    #[inline]
    pub const fn is_castling(self) -> bool {
        self.flag().is_castling()
    }

    #[inline]
    pub const fn promotion(self) -> Option<PieceKind> {
        self.flag().promotion_piece()
    }

    /// True when both moves describe the same origin, destination and
    /// promotion, ignoring everything else the flags say.
    #[inline]
    pub fn same_squares(self, other: Move) -> bool {
        self.from() == other.from()
            && self.to() == other.to()
            && self.promotion() == other.promotion()
    }

    /// Long algebraic UCI text, e.g. `e2e4` or `e7e8q`.
    pub fn to_uci(self) -> String {
        match self.promotion() {
            Some(kind) => format!("{}{}{}", self.from(), self.to(), kind.to_char()),
            None => format!("{}{}", self.from(), self.to()),
        }
    }

    /// Parses UCI text into an unresolved move (no capture or special flag
    /// other than promotion).
    pub fn from_uci(s: &str) -> Option<Self> {
        if !s.is_ascii() || s.len() < 4 || s.len() > 5 {
            return None;
        }
        let from = Square::from_algebraic(&s[0..2])?;
        let to = Square::from_algebraic(&s[2..4])?;
        let flag = match s[4..].chars().next() {
            Some(c) => MoveFlag::promote_to(PieceKind::from_char(c)?)?,
            None => MoveFlag::Normal,
        };
        Some(Move::new(from, to, flag))
    }

    /// Placeholder value, never a legal move.
    pub const NULL: Move = Move(0);
}

impl fmt::Debug for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Move({}", self.to_uci())?;
        if self.is_capture() {
            write!(f, " x")?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_uci())
    }
}
