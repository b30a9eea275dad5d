//! Move quality grading with a dedicated analysis engine.
//!
//! An [`Analyzer`] owns a second UCI session, separate from the players. For
//! every move it evaluates the position before and after, converts both
//! scores to centipawns from White's side and labels the move by how much
//! the mover lost.

use std::fmt;
use std::time::Duration;

use chess_core::Color;
use chess_rules::{Game, GameError};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use uci::Score;

use crate::source::MoveRequest;
use crate::uci_client::{EngineError, ShutdownOutcome, UciClient};

/// Centipawn value given to a forced mate.
pub const MATE_CP: i32 = 30_000;

/// Errors that can occur while grading a move.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// The analysis engine failed.
    #[error("Analysis engine error: {0}")]
    Engine(#[from] EngineError),
    /// The previous position could not be rebuilt.
    #[error("Cannot step back through the game: {0}")]
    Game(#[from] GameError),
}

/// Classification of a move by the evaluation it gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MoveQuality {
    /// The mover gained at least half a pawn over the expected line.
    Brilliant,
    /// No loss at all.
    Best,
    Excellent,
    Great,
    Good,
    Mistake,
    Blunder,
}

impl MoveQuality {
    /// Buckets a centipawn loss. Negative losses are gains.
    pub fn from_cp_loss(loss: i32) -> Self {
        match loss {
            l if l <= -50 => MoveQuality::Brilliant,
            l if l <= 0 => MoveQuality::Best,
            l if l <= 10 => MoveQuality::Excellent,
            l if l <= 25 => MoveQuality::Great,
            l if l <= 50 => MoveQuality::Good,
            l if l <= 100 => MoveQuality::Mistake,
            _ => MoveQuality::Blunder,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MoveQuality::Brilliant => "Brilliant",
            MoveQuality::Best => "Best",
            MoveQuality::Excellent => "Excellent",
            MoveQuality::Great => "Great",
            MoveQuality::Good => "Good",
            MoveQuality::Mistake => "Mistake",
            MoveQuality::Blunder => "Blunder",
        }
    }
}

impl fmt::Display for MoveQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Converts an engine score, which is relative to the side to move, into
/// centipawns from White's side. Mates count as [`MATE_CP`].
pub fn white_centipawns(score: Score, side_to_move: Color) -> i32 {
    let cp = match score {
        Score::Cp(cp) => cp,
        Score::Mate(n) if n > 0 => MATE_CP,
        Score::Mate(_) => -MATE_CP,
    };
    match side_to_move {
        Color::White => cp,
        Color::Black => -cp,
    }
}

/// The grade of one move, with the evaluations it was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveAssessment {
    pub quality: MoveQuality,
    /// White-side centipawns before the move.
    pub eval_before: i32,
    /// White-side centipawns after the move.
    pub eval_after: i32,
}

impl MoveAssessment {
    pub fn new(eval_before: i32, eval_after: i32, mover: Color) -> Self {
        let loss = match mover {
            Color::White => eval_before - eval_after,
            Color::Black => eval_after - eval_before,
        };
        Self {
            quality: MoveQuality::from_cp_loss(loss),
            eval_before,
            eval_after,
        }
    }
}

/// A UCI engine used only to evaluate positions.
pub struct Analyzer {
    client: UciClient,
    think_time: Duration,
    /// Evaluation of the most recent position, keyed by its ply count.
    last: Option<(usize, i32)>,
}

impl Analyzer {
    pub fn new(client: UciClient, think_time: Duration) -> Self {
        Self {
            client,
            think_time,
            last: None,
        }
    }

    /// Starts the engine and returns it ready to analyse.
    pub async fn launch(mut client: UciClient, think_time: Duration) -> Result<Self, EngineError> {
        client.start().await?;
        Ok(Self::new(client, think_time))
    }

    pub fn client(&self) -> &UciClient {
        &self.client
    }

    pub async fn new_game(&mut self) -> Result<(), EngineError> {
        self.last = None;
        self.client.new_game().await
    }

    /// Evaluates the current position of `game` from White's side. `None`
    /// when the engine reported no score.
    pub async fn evaluate(&mut self, game: &Game) -> Result<Option<i32>, EngineError> {
        let request = MoveRequest::from_game(game, self.think_time);
        let reply = self.client.request_move(&request).await?;
        let cp = reply
            .search
            .score
            .map(|score| white_centipawns(score, game.side_to_move()));
        if let Some(cp) = cp {
            self.last = Some((game.ply_count(), cp));
        }
        Ok(cp)
    }

    /// Grades the move that led to the current position of `game`.
    ///
    /// The position before the move is only searched when the previous call
    /// did not already evaluate it.
    pub async fn assess_last_move(
        &mut self,
        game: &Game,
    ) -> Result<Option<MoveAssessment>, AnalysisError> {
        let ply = game.ply_count();
        if ply == 0 {
            return Ok(None);
        }
        let mover = game.side_to_move().opposite();

        let before = match self.last {
            Some((seen, cp)) if seen + 1 == ply => Some(cp),
            _ => {
                let mut previous = game.clone();
                previous.undo()?;
                self.evaluate(&previous).await?
            }
        };
        let after = self.evaluate(game).await?;

        let assessment = match (before, after) {
            (Some(before), Some(after)) => Some(MoveAssessment::new(before, after, mover)),
            _ => None,
        };
        debug!(ply, ?assessment, "move graded");
        Ok(assessment)
    }

    pub async fn shutdown(&mut self) -> ShutdownOutcome {
        self.client.shutdown().await
    }
}
