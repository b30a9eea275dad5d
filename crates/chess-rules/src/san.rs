//! Standard Algebraic Notation (SAN).
//!
//! Examples: "e4", "Nf3", "Bxc6", "O-O", "e8=Q", "Nbd2", "R1e1", "Qh4#".

use crate::movegen::{is_in_check, legal_moves, make_move};
use crate::Position;
use chess_core::{File, Move, MoveFlag, PieceKind, Rank, Square};
use thiserror::Error;

/// Errors from [`san_to_move`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SanError {
    /// Nothing left after trimming.
    #[error("empty SAN string")]
    Empty,

    /// The text is not shaped like a SAN move.
    #[error("invalid SAN format: {0}")]
    InvalidFormat(String),

    /// Well-formed, but no legal move fits.
    #[error("no legal move matches: {0}")]
    NoMatchingMove(String),

    /// More than one legal move fits.
    #[error("ambiguous move: {0}")]
    AmbiguousMove(String),
}

/// Renders `m` in SAN for the position it is played from.
///
/// `m` must be legal in `position`. A move whose origin square is empty is
/// rendered in UCI form instead.
pub fn move_to_san(position: &Position, m: Move) -> String {
    let mut san = match m.flag() {
        MoveFlag::CastleKingside => "O-O".to_string(),
        MoveFlag::CastleQueenside => "O-O-O".to_string(),
        _ => match position.piece_at(m.from()) {
            Some(piece) => piece_move_text(position, m, piece.kind),
            None => return m.to_uci(),
        },
    };

    let after = make_move(position, m);
    let them = after.side_to_move();
    if is_in_check(&after, them) {
        san.push(if legal_moves(&after).is_empty() { '#' } else { '+' });
    }
    san
}

fn piece_move_text(position: &Position, m: Move, kind: PieceKind) -> String {
    let mut san = String::with_capacity(8);
    match kind.san_letter() {
        Some(letter) => {
            san.push(letter);
            san.push_str(&disambiguation(position, m, kind));
            if m.is_capture() {
                san.push('x');
            }
        }
        None => {
            if m.is_capture() {
                san.push(m.from().file().to_char());
                san.push('x');
            }
        }
    }
    san.push_str(&m.to().to_algebraic());
    if let Some(promo) = m.promotion().and_then(PieceKind::san_letter) {
        san.push('=');
        san.push(promo);
    }
    san
}

/// Origin hint needed when another piece of the same kind can reach the
/// same square: the file if that is unique, else the rank, else both.
fn disambiguation(position: &Position, m: Move, kind: PieceKind) -> String {
    let from = m.from();
    let rivals: Vec<Square> = legal_moves(position)
        .into_iter()
        .filter(|other| other.to() == m.to() && other.from() != from)
        .filter(|other| position.piece_at(other.from()).map(|p| p.kind) == Some(kind))
        .map(|other| other.from())
        .collect();

    if rivals.is_empty() {
        String::new()
    } else if rivals.iter().all(|sq| sq.file() != from.file()) {
        from.file().to_char().to_string()
    } else if rivals.iter().all(|sq| sq.rank() != from.rank()) {
        from.rank().to_char().to_string()
    } else {
        from.to_algebraic()
    }
}

/// Finds the legal move described by `san` in `position`.
///
/// Check and mate markers, annotation glyphs (`!`, `?`) and the capture `x`
/// are optional. Promotions may be written `e8=Q` or `e8Q`. Castling accepts
/// both letter `O` and digit `0`.
pub fn san_to_move(position: &Position, san: &str) -> Result<Move, SanError> {
    let text = san
        .trim()
        .trim_end_matches(['!', '?'])
        .trim_end_matches(['+', '#']);
    if text.is_empty() {
        return Err(SanError::Empty);
    }

    let moves = legal_moves(position);
    let castle = match text {
        "O-O" | "0-0" => Some(MoveFlag::CastleKingside),
        "O-O-O" | "0-0-0" => Some(MoveFlag::CastleQueenside),
        _ => None,
    };
    if let Some(flag) = castle {
        return moves
            .into_iter()
            .find(|m| m.flag() == flag)
            .ok_or_else(|| SanError::NoMatchingMove(san.to_string()));
    }

    let parsed = ParsedSan::parse(text)?;
    let matching: Vec<Move> = moves
        .into_iter()
        .filter(|m| parsed.matches(position, *m))
        .collect();

    match matching.as_slice() {
        [] => Err(SanError::NoMatchingMove(san.to_string())),
        [only] => Ok(*only),
        _ => Err(SanError::AmbiguousMove(san.to_string())),
    }
}

#[derive(Debug)]
struct ParsedSan {
    kind: PieceKind,
    from_file: Option<File>,
    from_rank: Option<Rank>,
    to: Square,
    promotion: Option<PieceKind>,
}

impl ParsedSan {
    fn parse(text: &str) -> Result<Self, SanError> {
        let invalid = || SanError::InvalidFormat(text.to_string());
        let mut chars: Vec<char> = text.chars().filter(|c| *c != 'x' && *c != ':').collect();

        let kind = match chars.first().copied().and_then(PieceKind::from_san_letter) {
            Some(kind) => {
                chars.remove(0);
                kind
            }
            None => PieceKind::Pawn,
        };

        // Trailing promotion piece, with or without '='.
        let promotion = match chars.last().copied().and_then(PieceKind::from_san_letter) {
            Some(promo) if kind == PieceKind::Pawn => {
                chars.pop();
                if chars.last() == Some(&'=') {
                    chars.pop();
                }
                Some(promo)
            }
            _ => None,
        };

        if chars.len() < 2 || chars.len() > 4 {
            return Err(invalid());
        }
        let split = chars.len() - 2;
        let to_file = File::from_char(chars[split]).ok_or_else(invalid)?;
        let to_rank = Rank::from_char(chars[split + 1]).ok_or_else(invalid)?;

        let (mut from_file, mut from_rank) = (None, None);
        for c in &chars[..split] {
            if let (None, Some(file)) = (from_file, File::from_char(*c)) {
                if from_rank.is_some() {
                    return Err(invalid());
                }
                from_file = Some(file);
            } else if let (None, Some(rank)) = (from_rank, Rank::from_char(*c)) {
                from_rank = Some(rank);
            } else {
                return Err(invalid());
            }
        }

        Ok(ParsedSan {
            kind,
            from_file,
            from_rank,
            to: Square::new(to_file, to_rank),
            promotion,
        })
    }

    fn matches(&self, position: &Position, m: Move) -> bool {
        m.to() == self.to
            && !m.is_castling()
            && position.piece_at(m.from()).map(|p| p.kind) == Some(self.kind)
            && self.from_file.map_or(true, |f| m.from().file() == f)
            && self.from_rank.map_or(true, |r| m.from().rank() == r)
            && m.promotion() == self.promotion
    }
}
