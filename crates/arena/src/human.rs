//! A move source fed by a person.
//!
//! [`HumanMoveSource`] sits in the orchestrator's seat; the UI side keeps the
//! matching [`HumanHandle`] and submits moves through it. Illegal
//! submissions are rejected back to the submitter while the source keeps
//! waiting. Dropping every handle ends the game as aborted.

use std::time::Duration;

use chess_core::Move;
use chess_rules::find_legal;
use futures_util::future::BoxFuture;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::source::{MoveRequest, MoveSource, SourceError, SourceReply};
use crate::uci_client::ShutdownOutcome;

/// Why a submitted move was not played.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// Not UCI syntax, or not legal in the current position.
    #[error("move {0} rejected: {1}")]
    Rejected(String, String),
    /// The game is no longer listening.
    #[error("game is not accepting moves")]
    Closed,
}

enum HumanInput {
    Move {
        uci: String,
        reply: oneshot::Sender<Result<(), SubmitError>>,
    },
    Resign,
}

/// The UI side of a human player.
#[derive(Clone)]
pub struct HumanHandle {
    tx: mpsc::Sender<HumanInput>,
}

impl HumanHandle {
    /// Offers a move in UCI form and waits until the game accepts or
    /// rejects it.
    pub async fn submit(&self, uci: impl Into<String>) -> Result<(), SubmitError> {
        let (reply, answer) = oneshot::channel();
        self.tx
            .send(HumanInput::Move {
                uci: uci.into(),
                reply,
            })
            .await
            .map_err(|_| SubmitError::Closed)?;
        answer.await.map_err(|_| SubmitError::Closed)?
    }

    pub async fn resign(&self) -> Result<(), SubmitError> {
        self.tx
            .send(HumanInput::Resign)
            .await
            .map_err(|_| SubmitError::Closed)
    }
}

/// The orchestrator side of a human player.
pub struct HumanMoveSource {
    name: String,
    rx: mpsc::Receiver<HumanInput>,
    time_limit: Option<Duration>,
}

impl HumanMoveSource {
    /// Creates a source and its handle. With a `time_limit`, a turn that
    /// takes longer is lost on time.
    pub fn new(name: impl Into<String>, time_limit: Option<Duration>) -> (Self, HumanHandle) {
        let (tx, rx) = mpsc::channel(8);
        (
            Self {
                name: name.into(),
                rx,
                time_limit,
            },
            HumanHandle { tx },
        )
    }

    async fn next_input(&mut self, deadline: Option<tokio::time::Instant>) -> Option<Option<HumanInput>> {
        match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, self.rx.recv()).await.ok(),
            None => Some(self.rx.recv().await),
        }
    }

    async fn wait_for_move(&mut self, request: &MoveRequest) -> Result<SourceReply, SourceError> {
        let deadline = self.time_limit.map(|limit| tokio::time::Instant::now() + limit);
        loop {
            let input = match self.next_input(deadline).await {
                None => {
                    warn!(player = %self.name, "human ran out of time");
                    return Ok(SourceReply::Flagged);
                }
                Some(None) => return Err(SourceError::Disconnected),
                Some(Some(input)) => input,
            };

            match input {
                HumanInput::Resign => return Ok(SourceReply::Resign),
                HumanInput::Move { uci, reply } => match resolve(request, &uci) {
                    Ok(mv) => {
                        debug!(player = %self.name, %uci, "human move accepted");
                        let _ = reply.send(Ok(()));
                        return Ok(SourceReply::Move { mv, search: None });
                    }
                    Err(reason) => {
                        warn!(player = %self.name, %uci, %reason, "human move rejected");
                        let _ = reply.send(Err(SubmitError::Rejected(uci, reason)));
                    }
                },
            }
        }
    }
}

fn resolve(request: &MoveRequest, uci: &str) -> Result<Move, String> {
    let candidate = Move::from_uci(uci.trim()).ok_or_else(|| "not a UCI move".to_string())?;
    find_legal(&request.position, candidate)
        .ok_or_else(|| format!("illegal in {}", request.position.to_fen()))
}

impl MoveSource for HumanMoveSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn new_game(&mut self) -> BoxFuture<'_, Result<(), SourceError>> {
        Box::pin(async { Ok(()) })
    }

    fn request_move<'a>(
        &'a mut self,
        request: &'a MoveRequest,
    ) -> BoxFuture<'a, Result<SourceReply, SourceError>> {
        Box::pin(self.wait_for_move(request))
    }

    fn shutdown(&mut self) -> BoxFuture<'_, ShutdownOutcome> {
        Box::pin(async move {
            if self.rx.is_closed() {
                ShutdownOutcome::AlreadyStopped
            } else {
                self.rx.close();
                ShutdownOutcome::Exited
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess_rules::Game;

    fn request() -> MoveRequest {
        MoveRequest::from_game(&Game::new(), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_illegal_submission_is_rejected_and_source_keeps_waiting() {
        let (mut source, handle) = HumanMoveSource::new("Alice", None);
        let ui = tokio::spawn(async move {
            let bad = handle.submit("e2e5").await;
            let junk = handle.submit("hello").await;
            let good = handle.submit("e2e4").await;
            (bad, junk, good)
        });

        let req = request();
        let reply = source.request_move(&req).await.unwrap();
        match reply {
            SourceReply::Move { mv, search } => {
                assert_eq!(mv.to_uci(), "e2e4");
                assert!(mv.is_double_push());
                assert!(search.is_none());
            }
            other => panic!("expected a move, got {:?}", other),
        }

        let (bad, junk, good) = ui.await.unwrap();
        assert!(matches!(bad, Err(SubmitError::Rejected(ref m, _)) if m == "e2e5"));
        assert!(matches!(junk, Err(SubmitError::Rejected(_, _))));
        assert_eq!(good, Ok(()));
    }

    #[tokio::test]
    async fn test_resign() {
        let (mut source, handle) = HumanMoveSource::new("Bob", None);
        handle.resign().await.unwrap();
        let req = request();
        assert_eq!(source.request_move(&req).await.unwrap(), SourceReply::Resign);
    }

    #[tokio::test]
    async fn test_dropped_handle_disconnects() {
        let (mut source, handle) = HumanMoveSource::new("Carol", None);
        drop(handle);
        let req = request();
        assert!(matches!(
            source.request_move(&req).await,
            Err(SourceError::Disconnected)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_limit_flags() {
        let (mut source, _handle) = HumanMoveSource::new("Dave", Some(Duration::from_secs(30)));
        let req = request();
        assert_eq!(source.request_move(&req).await.unwrap(), SourceReply::Flagged);
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent_and_closes_handle() {
        let (mut source, handle) = HumanMoveSource::new("Eve", None);
        assert_eq!(source.shutdown().await, ShutdownOutcome::Exited);
        assert_eq!(source.shutdown().await, ShutdownOutcome::AlreadyStopped);
        assert_eq!(handle.submit("e2e4").await, Err(SubmitError::Closed));
    }
}
