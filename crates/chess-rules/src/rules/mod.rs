//! Game results and the terminal-condition rules that produce them.

use std::fmt;
use std::str::FromStr;

use crate::movegen::{is_in_check, legal_moves};
use crate::{Bitboard, Position};
use chess_core::{Color, PieceKind};

/// Half-moves without a pawn move or capture that end the game.
pub const FIFTY_MOVE_PLIES: u32 = 100;

/// Occurrences of one position that end the game.
pub const REPETITION_LIMIT: u32 = 3;

/// Who won, if anyone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    WhiteWins,
    BlackWins,
    Draw,
    /// No chess result: the game is still running, or it was cut short by
    /// something other than the rules (engine failure, abort).
    Ongoing,
}

impl Outcome {
    /// A win for `color`.
    pub const fn win_for(color: Color) -> Self {
        match color {
            Color::White => Outcome::WhiteWins,
            Color::Black => Outcome::BlackWins,
        }
    }

    /// The PGN result token.
    pub const fn pgn_token(self) -> &'static str {
        match self {
            Outcome::WhiteWins => "1-0",
            Outcome::BlackWins => "0-1",
            Outcome::Draw => "1/2-1/2",
            Outcome::Ongoing => "*",
        }
    }

    pub fn from_pgn_token(token: &str) -> Option<Self> {
        match token {
            "1-0" => Some(Outcome::WhiteWins),
            "0-1" => Some(Outcome::BlackWins),
            "1/2-1/2" => Some(Outcome::Draw),
            "*" => Some(Outcome::Ongoing),
            _ => None,
        }
    }

    pub const fn winner(self) -> Option<Color> {
        match self {
            Outcome::WhiteWins => Some(Color::White),
            Outcome::BlackWins => Some(Color::Black),
            _ => None,
        }
    }
}

/// Why a game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Termination {
    Checkmate,
    Stalemate,
    FiftyMove,
    ThreefoldRepetition,
    InsufficientMaterial,
    Resignation,
    TimeForfeit,
    /// An engine crashed, timed out or played an illegal move.
    EngineError,
    Aborted,
}

impl Termination {
    pub const fn as_str(self) -> &'static str {
        match self {
            Termination::Checkmate => "checkmate",
            Termination::Stalemate => "stalemate",
            Termination::FiftyMove => "fifty-move",
            Termination::ThreefoldRepetition => "threefold-repetition",
            Termination::InsufficientMaterial => "insufficient-material",
            Termination::Resignation => "resignation",
            Termination::TimeForfeit => "time-forfeit",
            Termination::EngineError => "engine-error",
            Termination::Aborted => "aborted",
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Termination {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let all = [
            Termination::Checkmate,
            Termination::Stalemate,
            Termination::FiftyMove,
            Termination::ThreefoldRepetition,
            Termination::InsufficientMaterial,
            Termination::Resignation,
            Termination::TimeForfeit,
            Termination::EngineError,
            Termination::Aborted,
        ];
        all.into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown termination reason '{}'", s))
    }
}

/// Outcome plus the reason for it. An ongoing game has no reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GameResult {
    pub outcome: Outcome,
    pub reason: Option<Termination>,
}

impl GameResult {
    pub const ONGOING: GameResult = GameResult {
        outcome: Outcome::Ongoing,
        reason: None,
    };

    pub const fn new(outcome: Outcome, reason: Termination) -> Self {
        GameResult {
            outcome,
            reason: Some(reason),
        }
    }

    pub const fn draw(reason: Termination) -> Self {
        Self::new(Outcome::Draw, reason)
    }

    pub const fn win(winner: Color, reason: Termination) -> Self {
        Self::new(Outcome::win_for(winner), reason)
    }

    /// A game cut short without a chess result (PGN `*`).
    pub const fn interrupted(reason: Termination) -> Self {
        Self::new(Outcome::Ongoing, reason)
    }

    /// True once the game has ended for any reason.
    pub const fn is_over(&self) -> bool {
        self.reason.is_some()
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason {
            Some(reason) => write!(f, "{} ({})", self.outcome.pgn_token(), reason),
            None => f.write_str("ongoing"),
        }
    }
}

/// Checks terminal conditions for `position`, which has occurred
/// `repetitions` times in the game so far.
///
/// Conditions are tried in a fixed order: checkmate and stalemate, then the
/// fifty-move rule, then threefold repetition, then insufficient material.
/// The fifty-move and repetition rules end the game automatically.
pub fn evaluate(position: &Position, repetitions: u32) -> GameResult {
    let side = position.side_to_move();
    if legal_moves(position).is_empty() {
        return if is_in_check(position, side) {
            GameResult::win(side.opposite(), Termination::Checkmate)
        } else {
            GameResult::draw(Termination::Stalemate)
        };
    }
    if position.halfmove_clock() >= FIFTY_MOVE_PLIES {
        return GameResult::draw(Termination::FiftyMove);
    }
    if repetitions >= REPETITION_LIMIT {
        return GameResult::draw(Termination::ThreefoldRepetition);
    }
    if is_insufficient_material(position) {
        return GameResult::draw(Termination::InsufficientMaterial);
    }
    GameResult::ONGOING
}

/// True when the material on the board is one of the combinations that can
/// never deliver mate: king against king, king and one minor piece against a
/// bare king, or king and bishop against king and bishop with both bishops on
/// squares of the same color.
pub fn is_insufficient_material(position: &Position) -> bool {
    let heavy = [PieceKind::Pawn, PieceKind::Rook, PieceKind::Queen];
    if heavy
        .iter()
        .any(|kind| !position.pieces[kind.index()].is_empty())
    {
        return false;
    }

    let minors = |color: Color| {
        (
            position.pieces_of(PieceKind::Knight, color).count(),
            position.pieces_of(PieceKind::Bishop, color),
        )
    };
    let (white_knights, white_bishops) = minors(Color::White);
    let (black_knights, black_bishops) = minors(Color::Black);
    let white_minors = white_knights + white_bishops.count();
    let black_minors = black_knights + black_bishops.count();

    match (white_minors, black_minors) {
        (0, 0) | (1, 0) | (0, 1) => true,
        (1, 1) if white_knights == 0 && black_knights == 0 => {
            same_square_color(white_bishops | black_bishops)
        }
        _ => false,
    }
}

fn same_square_color(bishops: Bitboard) -> bool {
    let light = (bishops & Bitboard::LIGHT_SQUARES).count();
    light == 0 || light == bishops.count()
}
