//! Perft: leaf-node counts used to validate the move generator against
//! published reference numbers.

use super::{legal_moves, make_move};
use crate::Position;

/// Number of leaf nodes `depth` plies below `position`.
pub fn perft(position: &Position, depth: u32) -> u64 {
    if depth == 0 {
        return 1;
    }
    let moves = legal_moves(position);
    if depth == 1 {
        return moves.len() as u64;
    }
    moves
        .into_iter()
        .map(|m| perft(&make_move(position, m), depth - 1))
        .sum()
}

/// Per-move breakdown of [`perft`], sorted by UCI text.
pub fn perft_divide(position: &Position, depth: u32) -> Vec<(String, u64)> {
    let mut results: Vec<(String, u64)> = legal_moves(position)
        .into_iter()
        .map(|m| {
            let nodes = perft(&make_move(position, m), depth.saturating_sub(1));
            (m.to_uci(), nodes)
        })
        .collect();
    results.sort();
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    const KIWIPETE: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
    const POSITION_3: &str = "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1";
    const POSITION_4: &str = "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1";
    const POSITION_5: &str = "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8";

    fn check(fen: &str, expected: &[u64]) {
        let position = Position::from_fen(fen).unwrap();
        for (depth, nodes) in expected.iter().enumerate() {
            assert_eq!(
                perft(&position, depth as u32 + 1),
                *nodes,
                "{} at depth {}",
                fen,
                depth + 1
            );
        }
    }

    #[test]
    fn perft_startpos() {
        let position = Position::startpos();
        assert_eq!(perft(&position, 1), 20);
        assert_eq!(perft(&position, 2), 400);
        assert_eq!(perft(&position, 3), 8902);
    }

    #[test]
    #[ignore = "slow in debug builds"]
    fn perft_startpos_depth_4() {
        assert_eq!(perft(&Position::startpos(), 4), 197_281);
    }

    #[test]
    fn perft_kiwipete() {
        check(KIWIPETE, &[48, 2039]);
    }

    #[test]
    fn perft_position3() {
        check(POSITION_3, &[14, 191, 2812]);
    }

    #[test]
    fn perft_position4() {
        check(POSITION_4, &[6, 264, 9467]);
    }

    #[test]
    fn perft_position5() {
        check(POSITION_5, &[44, 1486]);
    }

    #[test]
    fn divide_sums_to_perft() {
        let position = Position::from_fen(KIWIPETE).unwrap();
        let results = perft_divide(&position, 2);
        assert_eq!(results.len(), 48);
        let total: u64 = results.iter().map(|(_, n)| n).sum();
        assert_eq!(total, 2039);
    }
}
