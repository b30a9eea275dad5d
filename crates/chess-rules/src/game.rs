//! Game state tracking: the authoritative position, its history, and the
//! terminal-condition bookkeeping.

use std::collections::HashMap;

use crate::movegen::{find_legal, is_in_check, legal_moves, make_move, IllegalMove};
use crate::position::{PositionError, PositionKey};
use crate::rules::{evaluate, GameResult, Termination};
use crate::san::{move_to_san, san_to_move, SanError};
use crate::Position;
use chess_core::{Color, Move};
use thiserror::Error;

/// One played move with the positions on either side of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub before: Position,
    pub mv: Move,
    pub after: Position,
    /// SAN of `mv`, computed from `before`.
    pub san: String,
}

/// Errors from [`Game`] operations. None of them change the game.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GameError {
    /// The move is not legal in the current position.
    #[error(transparent)]
    IllegalMove(#[from] IllegalMove),

    /// The SAN text could not be matched to a legal move.
    #[error("invalid SAN: {0}")]
    InvalidSan(#[from] SanError),

    /// The text is not UCI move syntax.
    #[error("invalid UCI move: {0}")]
    InvalidUci(String),

    /// Moves cannot be played once the game has a result.
    #[error("game has already ended: {0}")]
    GameOver(GameResult),

    /// [`Game::terminate`] needs a finished result.
    #[error("cannot end a game with an ongoing result")]
    NotTerminal,

    #[error("no moves to undo")]
    NothingToUndo,
}

/// A chess game in progress.
///
/// Owns the current [`Position`], the append-only move history and the
/// occurrence count of every position reached, and decides when the game is
/// over. This is the only place game state changes.
#[derive(Debug, Clone)]
pub struct Game {
    start: Position,
    position: Position,
    history: Vec<HistoryEntry>,
    repetitions: HashMap<PositionKey, u32>,
    result: GameResult,
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

impl Game {
    /// A game from the standard starting position.
    pub fn new() -> Self {
        Self::from_position(Position::startpos())
    }

    /// A game starting from an arbitrary position. If that position is
    /// already terminal the game starts finished.
    pub fn from_position(position: Position) -> Self {
        let mut repetitions = HashMap::new();
        repetitions.insert(position.repetition_key(), 1);
        let result = evaluate(&position, 1);
        Game {
            start: position.clone(),
            position,
            history: Vec::new(),
            repetitions,
            result,
        }
    }

    pub fn from_fen(fen: &str) -> Result<Self, PositionError> {
        Ok(Self::from_position(Position::from_fen(fen)?))
    }

    /// Clears all history and returns to the standard starting position.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn start_position(&self) -> &Position {
        &self.start
    }

    /// FEN of the starting position, or `None` for the standard one.
    pub fn start_fen(&self) -> Option<String> {
        if self.start == Position::startpos() {
            None
        } else {
            Some(self.start.to_fen())
        }
    }

    pub fn side_to_move(&self) -> Color {
        self.position.side_to_move()
    }

    pub fn legal_moves(&self) -> Vec<Move> {
        legal_moves(&self.position)
    }

    pub fn is_check(&self) -> bool {
        is_in_check(&self.position, self.position.side_to_move())
    }

    pub fn result(&self) -> GameResult {
        self.result
    }

    pub fn is_over(&self) -> bool {
        self.result.is_over()
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn ply_count(&self) -> usize {
        self.history.len()
    }

    pub fn moves(&self) -> Vec<Move> {
        self.history.iter().map(|entry| entry.mv).collect()
    }

    pub fn uci_moves(&self) -> Vec<String> {
        self.history.iter().map(|entry| entry.mv.to_uci()).collect()
    }

    pub fn san_moves(&self) -> Vec<String> {
        self.history.iter().map(|entry| entry.san.clone()).collect()
    }

    /// How many times the current position has occurred, itself included.
    pub fn repetition_count(&self) -> u32 {
        self.repetitions
            .get(&self.position.repetition_key())
            .copied()
            .unwrap_or(0)
    }

    /// Resolves UCI text to the matching legal move.
    pub fn resolve_uci(&self, uci: &str) -> Result<Move, GameError> {
        let candidate = Move::from_uci(uci).ok_or_else(|| GameError::InvalidUci(uci.to_string()))?;
        find_legal(&self.position, candidate)
            .ok_or_else(|| IllegalMove::new(&self.position, uci).into())
    }

    /// Validates and plays a move, then reports the resulting game state.
    ///
    /// On error nothing changes.
    pub fn try_apply(&mut self, mv: Move) -> Result<GameResult, GameError> {
        if self.result.is_over() {
            return Err(GameError::GameOver(self.result));
        }
        let resolved = find_legal(&self.position, mv)
            .ok_or_else(|| IllegalMove::new(&self.position, mv.to_uci()))?;

        let san = move_to_san(&self.position, resolved);
        let after = make_move(&self.position, resolved);
        let count = self.repetitions.entry(after.repetition_key()).or_insert(0);
        *count += 1;
        let result = evaluate(&after, *count);

        let before = std::mem::replace(&mut self.position, after.clone());
        self.history.push(HistoryEntry {
            before,
            mv: resolved,
            after,
            san,
        });
        self.result = result;
        Ok(result)
    }

    pub fn try_apply_uci(&mut self, uci: &str) -> Result<GameResult, GameError> {
        let candidate = Move::from_uci(uci).ok_or_else(|| GameError::InvalidUci(uci.to_string()))?;
        self.try_apply(candidate)
    }

    pub fn try_apply_san(&mut self, san: &str) -> Result<GameResult, GameError> {
        if self.result.is_over() {
            return Err(GameError::GameOver(self.result));
        }
        let mv = san_to_move(&self.position, san)?;
        self.try_apply(mv)
    }

    /// Takes back the last move, restoring the previous position and its
    /// repetition count. The result is recomputed for the restored position.
    pub fn undo(&mut self) -> Result<HistoryEntry, GameError> {
        let entry = self.history.pop().ok_or(GameError::NothingToUndo)?;
        let key = entry.after.repetition_key();
        if let Some(count) = self.repetitions.get_mut(&key) {
            *count -= 1;
            if *count == 0 {
                self.repetitions.remove(&key);
            }
        }
        self.position = entry.before.clone();
        self.result = evaluate(&self.position, self.repetition_count());
        Ok(entry)
    }

    /// `color` resigns; the opponent wins.
    pub fn resign(&mut self, color: Color) -> Result<GameResult, GameError> {
        let result = GameResult::win(color.opposite(), Termination::Resignation);
        self.terminate(result)?;
        Ok(result)
    }

    /// Ends the game with a result decided outside the board (time forfeit,
    /// engine failure, abort).
    pub fn terminate(&mut self, result: GameResult) -> Result<(), GameError> {
        if self.result.is_over() {
            return Err(GameError::GameOver(self.result));
        }
        if !result.is_over() {
            return Err(GameError::NotTerminal);
        }
        self.result = result;
        Ok(())
    }
}
