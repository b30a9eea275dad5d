//! Legal move generation and move application.
//!
//! Moves are generated pseudo-legally per piece kind and then filtered by
//! applying each one and rejecting those that leave the mover's king
//! attacked.

mod attacks;
pub mod perft;

use crate::Position;
use chess_core::{Color, Move, MoveFlag, PieceKind, Square};
use thiserror::Error;

pub use attacks::{
    bishop_attacks, king_attacks, knight_attacks, pawn_attacks, queen_attacks, rook_attacks,
};

/// A move that is not legal in the position it was offered for.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("illegal move {uci} in position {fen}")]
pub struct IllegalMove {
    pub uci: String,
    pub fen: String,
}

impl IllegalMove {
    pub(crate) fn new(position: &Position, uci: impl Into<String>) -> Self {
        IllegalMove {
            uci: uci.into(),
            fen: position.to_fen(),
        }
    }
}

/// Every legal move for the side to move.
pub fn legal_moves(position: &Position) -> Vec<Move> {
    let mut moves = Vec::with_capacity(64);
    generate_pawn_moves(position, &mut moves);
    generate_piece_moves(position, &mut moves);
    generate_castling_moves(position, &mut moves);

    let us = position.side_to_move;
    moves.retain(|m| !is_in_check(&make_move(position, *m), us));
    moves
}

/// Looks up the legal move matching `candidate`'s origin, destination and
/// promotion. The returned move carries the full set of flags.
pub fn find_legal(position: &Position, candidate: Move) -> Option<Move> {
    legal_moves(position)
        .into_iter()
        .find(|m| m.same_squares(candidate))
}

/// Applies a move, returning the resulting position.
///
/// `mv` may be a fully-flagged move from [`legal_moves`] or a bare move
/// parsed from UCI text; it is resolved against the legal moves first and
/// rejected if none matches.
pub fn apply(position: &Position, mv: Move) -> Result<Position, IllegalMove> {
    let resolved = find_legal(position, mv).ok_or_else(|| IllegalMove::new(position, mv.to_uci()))?;
    Ok(make_move(position, resolved))
}

fn push_pawn_move(moves: &mut Vec<Move>, from: Square, to: Square, capture: bool, us: Color) {
    let finish = |m: Move| if capture { m.with_capture() } else { m };
    if to.rank_index() == us.promotion_rank() {
        for kind in PieceKind::PROMOTIONS {
            if let Some(flag) = MoveFlag::promote_to(kind) {
                moves.push(finish(Move::new(from, to, flag)));
            }
        }
    } else {
        moves.push(finish(Move::normal(from, to)));
    }
}

fn generate_pawn_moves(position: &Position, moves: &mut Vec<Move>) {
    let us = position.side_to_move;
    let theirs = position.color_occupancy(us.opposite());
    let occupied = position.occupied();
    let dir = us.pawn_direction();

    for from in position.pieces_of(PieceKind::Pawn, us).squares() {
        if let Some(one) = from.offset(0, dir).filter(|sq| !occupied.contains(*sq)) {
            push_pawn_move(moves, from, one, false, us);
            if from.rank_index() == us.pawn_rank() {
                if let Some(two) = one.offset(0, dir).filter(|sq| !occupied.contains(*sq)) {
                    moves.push(Move::new(from, two, MoveFlag::DoublePush));
                }
            }
        }

        let targets = pawn_attacks(from, us);
        for to in (targets & theirs).squares() {
            push_pawn_move(moves, from, to, true, us);
        }
        if let Some(ep) = position.en_passant.filter(|ep| targets.contains(*ep)) {
            moves.push(Move::new(from, ep, MoveFlag::EnPassant).with_capture());
        }
    }
}

fn generate_piece_moves(position: &Position, moves: &mut Vec<Move>) {
    let us = position.side_to_move;
    let ours = position.color_occupancy(us);
    let theirs = position.color_occupancy(us.opposite());
    let occupied = position.occupied();

    for kind in [
        PieceKind::Knight,
        PieceKind::Bishop,
        PieceKind::Rook,
        PieceKind::Queen,
        PieceKind::King,
    ] {
        for from in position.pieces_of(kind, us).squares() {
            let targets = match kind {
                PieceKind::Knight => knight_attacks(from),
                PieceKind::Bishop => bishop_attacks(from, occupied),
                PieceKind::Rook => rook_attacks(from, occupied),
                PieceKind::Queen => queen_attacks(from, occupied),
                _ => king_attacks(from),
            } & !ours;
            for to in targets.squares() {
                let m = Move::normal(from, to);
                moves.push(if theirs.contains(to) { m.with_capture() } else { m });
            }
        }
    }
}

/// Castling needs the right, an unmoved king and rook on their home
/// squares, empty squares between them, and a king that is not in check and
/// does not pass through an attacked square. Landing in check is caught by
/// the legality filter.
fn generate_castling_moves(position: &Position, moves: &mut Vec<Move>) {
    let us = position.side_to_move;
    let them = us.opposite();
    let rank = us.back_rank();
    let home = |file: u8| Square::from_coords(file, rank);
    let (Some(king_from), Some(king_sq)) = (home(4), position.king_square(us)) else {
        return;
    };
    if king_from != king_sq || is_square_attacked(position, king_from, them) {
        return;
    }

    let occupied = position.occupied();
    let rooks = position.pieces_of(PieceKind::Rook, us);
    // (right, rook file, squares that must be empty, square the king crosses, king target, flag)
    let sides = [
        (
            position.castling.kingside(us),
            7u8,
            &[5u8, 6][..],
            5u8,
            6u8,
            MoveFlag::CastleKingside,
        ),
        (
            position.castling.queenside(us),
            0u8,
            &[1u8, 2, 3][..],
            3u8,
            2u8,
            MoveFlag::CastleQueenside,
        ),
    ];

    for (allowed, rook_file, between, crossed, target, flag) in sides {
        if !allowed || !home(rook_file).is_some_and(|sq| rooks.contains(sq)) {
            continue;
        }
        let clear = between
            .iter()
            .filter_map(|file| home(*file))
            .all(|sq| !occupied.contains(sq));
        let safe = home(crossed).is_some_and(|sq| !is_square_attacked(position, sq, them));
        if let (true, true, Some(to)) = (clear, safe, home(target)) {
            moves.push(Move::new(king_from, to, flag));
        }
    }
}

/// True if any piece of `by` attacks `sq`.
pub fn is_square_attacked(position: &Position, sq: Square, by: Color) -> bool {
    let occupied = position.occupied();
    let diagonal = position.pieces_of(PieceKind::Bishop, by) | position.pieces_of(PieceKind::Queen, by);
    let straight = position.pieces_of(PieceKind::Rook, by) | position.pieces_of(PieceKind::Queen, by);

    !(pawn_attacks(sq, by.opposite()) & position.pieces_of(PieceKind::Pawn, by)).is_empty()
        || !(knight_attacks(sq) & position.pieces_of(PieceKind::Knight, by)).is_empty()
        || !(king_attacks(sq) & position.pieces_of(PieceKind::King, by)).is_empty()
        || !(bishop_attacks(sq, occupied) & diagonal).is_empty()
        || !(rook_attacks(sq, occupied) & straight).is_empty()
}

/// True if `color`'s king is attacked.
pub fn is_in_check(position: &Position, color: Color) -> bool {
    position
        .king_square(color)
        .is_some_and(|king| is_square_attacked(position, king, color.opposite()))
}

/// Applies a move that is already known to be legal.
///
/// Returns a fresh position; the input is untouched. A move whose origin is
/// empty yields an unchanged copy.
pub(crate) fn make_move(position: &Position, m: Move) -> Position {
    let mut next = position.clone();
    let us = position.side_to_move;
    let from = m.from();
    let to = m.to();

    let Some(moving) = next.remove(from) else {
        return next;
    };
    let captured = next.remove(to);

    if m.is_en_passant() {
        if let Some(victim) = to.offset(0, -us.pawn_direction()) {
            next.remove(victim);
        }
    }

    let placed = match m.promotion() {
        Some(kind) => chess_core::Piece::new(us, kind),
        None => moving,
    };
    next.put(to, placed);

    if m.is_castling() {
        let rank = us.back_rank();
        let (rook_from, rook_to) = match m.flag() {
            MoveFlag::CastleKingside => (7, 5),
            _ => (0, 3),
        };
        if let (Some(rf), Some(rt)) = (
            Square::from_coords(rook_from, rank),
            Square::from_coords(rook_to, rank),
        ) {
            if let Some(rook) = next.remove(rf) {
                next.put(rt, rook);
            }
        }
    }

    if moving.kind == PieceKind::King {
        next.castling.remove_color(us);
    }
    next.castling.remove_for_rook_square(from);
    next.castling.remove_for_rook_square(to);

    next.en_passant = if m.is_double_push() {
        from.offset(0, us.pawn_direction())
    } else {
        None
    };

    if moving.kind == PieceKind::Pawn || captured.is_some() || m.is_en_passant() {
        next.halfmove_clock = 0;
    } else {
        next.halfmove_clock += 1;
    }
    if us == Color::Black {
        next.fullmove_number += 1;
    }
    next.side_to_move = us.opposite();
    next
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(s: &str) -> Square {
        Square::from_algebraic(s).unwrap()
    }

    fn uci(position: &Position, text: &str) -> Position {
        apply(position, Move::from_uci(text).unwrap()).unwrap()
    }

    #[test]
    fn startpos_has_20_moves() {
        assert_eq!(legal_moves(&Position::startpos()).len(), 20);
    }

    #[test]
    fn after_open_game_not_in_check() {
        let mut pos = Position::startpos();
        for m in ["e2e4", "e7e5", "g1f3"] {
            pos = uci(&pos, m);
        }
        assert!(!is_in_check(&pos, pos.side_to_move()));
        assert!(!legal_moves(&pos).is_empty());
        assert_eq!(pos.side_to_move(), Color::Black);
    }

    #[test]
    fn apply_is_pure() {
        let start = Position::startpos();
        let after = uci(&start, "e2e4");
        assert_eq!(start, Position::startpos());
        assert_eq!(after.en_passant(), Some(sq("e3")));
        assert_eq!(after.halfmove_clock(), 0);
        assert_eq!(after.fullmove_number(), 1);
    }

    #[test]
    fn apply_rejects_illegal_moves() {
        let start = Position::startpos();
        let err = apply(&start, Move::from_uci("e2e5").unwrap()).unwrap_err();
        assert_eq!(err.uci, "e2e5");
        assert_eq!(err.fen, start.to_fen());
        assert!(apply(&start, Move::from_uci("e7e5").unwrap()).is_err());
    }

    #[test]
    fn castling_both_sides() {
        let pos = Position::from_fen("r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R3K2R w KQkq - 0 1").unwrap();
        let moves = legal_moves(&pos);
        assert!(moves.iter().any(|m| m.flag() == MoveFlag::CastleKingside));
        assert!(moves.iter().any(|m| m.flag() == MoveFlag::CastleQueenside));

        let castled = uci(&pos, "e1g1");
        assert_eq!(castled.piece_at(sq("f1")).map(|p| p.kind), Some(PieceKind::Rook));
        assert_eq!(castled.piece_at(sq("h1")), None);
        assert!(!castled.castling().kingside(Color::White));
        assert!(!castled.castling().queenside(Color::White));
        assert!(castled.castling().kingside(Color::Black));
    }

    #[test]
    fn no_castling_through_attacked_square() {
        // Black rook on f8 covers f1.
        let pos = Position::from_fen("4kr2/8/8/8/8/8/8/4K2R w K - 0 1").unwrap();
        assert!(!legal_moves(&pos).iter().any(|m| m.is_castling()));
    }

    #[test]
    fn no_castling_into_check_or_out_of_check() {
        let into = Position::from_fen("4k1r1/8/8/8/8/8/8/4K2R w K - 0 1").unwrap();
        assert!(!legal_moves(&into).iter().any(|m| m.is_castling()));

        let out_of = Position::from_fen("4r1k1/8/8/8/8/8/8/4K2R w K - 0 1").unwrap();
        assert!(!legal_moves(&out_of).iter().any(|m| m.is_castling()));
    }

    #[test]
    fn queenside_needs_b_file_empty() {
        let pos = Position::from_fen("4k3/8/8/8/8/8/8/RN2K3 w Q - 0 1").unwrap();
        assert!(!legal_moves(&pos).iter().any(|m| m.is_castling()));
    }

    #[test]
    fn en_passant_capture() {
        let pos = Position::from_fen("4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 1").unwrap();
        let ep: Vec<Move> = legal_moves(&pos)
            .into_iter()
            .filter(|m| m.is_en_passant())
            .collect();
        assert_eq!(ep.len(), 1);
        assert!(ep[0].is_capture());

        let after = make_move(&pos, ep[0]);
        assert_eq!(after.piece_at(sq("d5")), None);
        assert_eq!(after.piece_at(sq("d6")).map(|p| p.kind), Some(PieceKind::Pawn));
    }

    #[test]
    fn en_passant_pinned_along_rank() {
        // Capturing would expose the king on a5 to the rook on h5.
        let pos = Position::from_fen("4k3/8/8/KPp4r/8/8/8/8 w - c6 0 1").unwrap();
        assert!(!legal_moves(&pos).iter().any(|m| m.is_en_passant()));
    }

    #[test]
    fn promotions_are_distinct_moves() {
        let pos = Position::from_fen("4k3/P7/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        let promos: Vec<Move> = legal_moves(&pos)
            .into_iter()
            .filter(|m| m.promotion().is_some())
            .collect();
        assert_eq!(promos.len(), 4);

        let queened = uci(&pos, "a7a8q");
        assert_eq!(queened.piece_at(Square::A8).map(|p| p.kind), Some(PieceKind::Queen));
        let knighted = uci(&pos, "a7a8n");
        assert_eq!(knighted.piece_at(Square::A8).map(|p| p.kind), Some(PieceKind::Knight));
    }

    #[test]
    fn capturing_rook_removes_castling_right() {
        let pos = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        let after = uci(&pos, "a1a8");
        assert!(!after.castling().queenside(Color::Black));
        assert!(!after.castling().queenside(Color::White));
        assert!(after.castling().kingside(Color::Black));
    }

    #[test]
    fn halfmove_clock_rules() {
        let pos = Position::from_fen("4k3/8/8/8/8/8/4P3/4K1N1 w - - 7 10").unwrap();
        assert_eq!(uci(&pos, "g1f3").halfmove_clock(), 8);
        assert_eq!(uci(&pos, "e2e4").halfmove_clock(), 0);
    }

    #[test]
    fn checkmate_has_no_moves() {
        let pos = Position::from_fen("rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3")
            .unwrap();
        assert!(is_in_check(&pos, Color::White));
        assert!(legal_moves(&pos).is_empty());
    }

    #[test]
    fn stalemate_has_no_moves() {
        let pos = Position::from_fen("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").unwrap();
        assert!(!is_in_check(&pos, Color::Black));
        assert!(legal_moves(&pos).is_empty());
    }

    #[test]
    fn capture_flags_are_set() {
        let pos = Position::from_fen("4k3/8/8/3p4/4P3/8/8/4K3 w - - 0 1").unwrap();
        let moves = legal_moves(&pos);
        let capture = moves.iter().find(|m| m.to() == sq("d5")).unwrap();
        assert!(capture.is_capture());
        let push = moves.iter().find(|m| m.to() == sq("e5")).unwrap();
        assert!(!push.is_capture());
    }
}
