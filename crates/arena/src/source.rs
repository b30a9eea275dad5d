//! Move sources: anything that can be asked for a move on its turn.
//!
//! The orchestrator only sees [`MoveSource`]. Engines are adapted through
//! [`EngineMoveSource`]; a person at a terminal or UI goes through
//! [`crate::human::HumanMoveSource`].

use std::time::Duration;

use chess_core::Move;
use chess_rules::{Game, Position};
use futures_util::future::BoxFuture;
use thiserror::Error;
use uci::EngineInfo;

use crate::uci_client::{EngineError, ShutdownOutcome, UciClient};

/// A snapshot of the game handed to the side to move.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveRequest {
    /// The current position. Replies are validated against it.
    pub position: Position,
    /// FEN of the starting position when it is not the standard one.
    pub start_fen: Option<String>,
    /// Every move from the starting position in UCI form.
    pub moves: Vec<String>,
    pub think_time: Duration,
}

impl MoveRequest {
    pub fn from_game(game: &Game, think_time: Duration) -> Self {
        Self {
            position: game.position().clone(),
            start_fen: game.start_fen(),
            moves: game.uci_moves(),
            think_time,
        }
    }
}

/// What a source answered.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceReply {
    /// A move that is legal in the requested position.
    Move {
        mv: Move,
        search: Option<EngineInfo>,
    },
    /// The source says it has no move.
    NoMove,
    /// The side to move gives up.
    Resign,
    /// The side to move ran out of its time limit.
    Flagged,
}

/// Why a source could not answer.
#[derive(Error, Debug)]
pub enum SourceError {
    /// The engine behind the source failed.
    #[error(transparent)]
    Engine(#[from] EngineError),
    /// The other end of a human source went away.
    #[error("move source disconnected")]
    Disconnected,
}

/// Something that plays one side of a game.
pub trait MoveSource: Send {
    /// Name used in PGN tags and statistics.
    fn name(&self) -> &str;

    /// Think time this source wants instead of the match default.
    fn think_time(&self) -> Option<Duration> {
        None
    }

    /// Called once before each game.
    fn new_game(&mut self) -> BoxFuture<'_, Result<(), SourceError>>;

    /// Produces a move for `request.position`.
    fn request_move<'a>(
        &'a mut self,
        request: &'a MoveRequest,
    ) -> BoxFuture<'a, Result<SourceReply, SourceError>>;

    /// Releases whatever the source holds. Must be safe to call repeatedly.
    fn shutdown(&mut self) -> BoxFuture<'_, ShutdownOutcome>;
}

/// Adapts a [`UciClient`] to [`MoveSource`].
pub struct EngineMoveSource {
    client: UciClient,
    name: String,
    think_time: Option<Duration>,
}

impl EngineMoveSource {
    pub fn new(client: UciClient, think_time: Option<Duration>) -> Self {
        let name = client.label().to_string();
        Self {
            client,
            name,
            think_time,
        }
    }

    /// Starts the engine and returns it ready for games.
    pub async fn launch(
        mut client: UciClient,
        think_time: Option<Duration>,
    ) -> Result<Self, EngineError> {
        client.start().await?;
        Ok(Self::new(client, think_time))
    }

    pub fn client(&self) -> &UciClient {
        &self.client
    }
}

impl MoveSource for EngineMoveSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn think_time(&self) -> Option<Duration> {
        self.think_time
    }

    fn new_game(&mut self) -> BoxFuture<'_, Result<(), SourceError>> {
        Box::pin(async move { Ok(self.client.new_game().await?) })
    }

    fn request_move<'a>(
        &'a mut self,
        request: &'a MoveRequest,
    ) -> BoxFuture<'a, Result<SourceReply, SourceError>> {
        Box::pin(async move {
            let reply = self.client.request_move(request).await?;
            Ok(match reply.mv {
                Some(mv) => SourceReply::Move {
                    mv,
                    search: Some(reply.search),
                },
                None => SourceReply::NoMove,
            })
        })
    }

    fn shutdown(&mut self) -> BoxFuture<'_, ShutdownOutcome> {
        Box::pin(self.client.shutdown())
    }
}
