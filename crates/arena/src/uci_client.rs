//! UCI client for driving one chess engine subprocess.
//!
//! A [`UciClient`] owns the engine process and its pipes and walks an
//! explicit session state machine:
//!
//! ```text
//! Unstarted -> Starting -> Ready -> Thinking -> Ready -> ... -> Stopped | Crashed
//! ```
//!
//! Engine output is read by a dedicated task that forwards lines over a
//! channel, so every wait on the engine is a receive with a deadline rather
//! than a blocking read.
//!
//! # Example
//!
//! ```no_run
//! use arena::uci_client::{Timeouts, UciClient};
//! use arena::source::MoveRequest;
//! use chess_rules::Game;
//! use std::time::Duration;
//!
//! # async fn demo() -> Result<(), arena::uci_client::EngineError> {
//! let mut client = UciClient::new("stockfish", "/usr/bin/stockfish", Vec::new(), Timeouts::default());
//! client.start().await?;
//! client.new_game().await?;
//! let game = Game::new();
//! let reply = client
//!     .request_move(&MoveRequest::from_game(&game, Duration::from_millis(500)))
//!     .await?;
//! println!("Best move: {:?}", reply.mv);
//! client.shutdown().await;
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use chess_core::Move;
use chess_rules::find_legal;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uci::{EngineInfo, EngineMessage, GoOptions, GuiCommand, UciError};

use crate::source::MoveRequest;

/// How long a malformed line may go without a valid `bestmove` after it.
const MALFORMED_REREAD: Duration = Duration::from_secs(1);

/// Errors that can occur when driving a UCI engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The engine executable could not be launched.
    #[error("Failed to spawn engine {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The session is not in a state that accepts this request.
    #[error("Engine not ready (session is {0:?})")]
    NotReady(SessionState),
    /// No expected reply arrived before the deadline.
    #[error("Engine timed out after {elapsed:?} waiting for {waiting_for}")]
    EngineTimeout {
        waiting_for: &'static str,
        elapsed: Duration,
    },
    /// The process exited, closed a pipe, or kept sending malformed output.
    #[error("Engine crashed: {0}")]
    EngineCrashed(String),
    /// The engine's best move is not legal in the position it was given.
    #[error("Engine played illegal move {mv} in position {fen}")]
    IllegalEngineMove { mv: String, fen: String },
    /// One line of engine output could not be parsed.
    #[error("Malformed engine output: {0}")]
    ProtocolParse(#[from] UciError),
}

impl EngineError {
    /// True for failures after which the process cannot be trusted again.
    pub fn is_fatal_to_session(&self) -> bool {
        !matches!(self, EngineError::IllegalEngineMove { .. } | EngineError::NotReady(_))
    }
}

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unstarted,
    Starting,
    Ready,
    Thinking,
    Stopped,
    Crashed,
}

/// How [`UciClient::shutdown`] ended the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// The engine exited on its own after `quit`.
    Exited,
    /// The engine ignored `quit` and was killed.
    Killed,
    /// There was no live process to stop.
    AlreadyStopped,
}

/// Deadlines applied to engine replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// For `uciok` after `uci` and `readyok` after `isready`.
    pub handshake: Duration,
    /// Added to the think time while waiting for `bestmove`.
    pub grace: Duration,
    /// Time allowed to exit after `quit`.
    pub quit_grace: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            handshake: Duration::from_secs(15),
            grace: Duration::from_secs(10),
            quit_grace: Duration::from_secs(3),
        }
    }
}

impl From<&crate::config::MatchSettings> for Timeouts {
    fn from(settings: &crate::config::MatchSettings) -> Self {
        Self {
            handshake: settings.handshake_timeout(),
            grace: settings.grace(),
            quit_grace: settings.quit_grace(),
        }
    }
}

/// Identification reported by the engine during the handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineId {
    pub name: Option<String>,
    pub author: Option<String>,
}

/// A completed search.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineMove {
    /// `None` when the engine answered `bestmove (none)`.
    pub mv: Option<Move>,
    /// The latest depth, score and line seen in `info` output.
    pub search: EngineInfo,
}

/// A client for communicating with a UCI-compatible chess engine.
pub struct UciClient {
    label: String,
    path: PathBuf,
    args: Vec<String>,
    timeouts: Timeouts,
    state: SessionState,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    lines: Option<mpsc::UnboundedReceiver<String>>,
    id: EngineId,
    last_search: Option<EngineMove>,
}

impl UciClient {
    /// Creates an unstarted session. Nothing is spawned until
    /// [`start`](Self::start).
    pub fn new(
        label: impl Into<String>,
        path: impl AsRef<Path>,
        args: Vec<String>,
        timeouts: Timeouts,
    ) -> Self {
        Self {
            label: label.into(),
            path: path.as_ref().to_path_buf(),
            args,
            timeouts,
            state: SessionState::Unstarted,
            child: None,
            stdin: None,
            lines: None,
            id: EngineId::default(),
            last_search: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The configured name this session was created with.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn id(&self) -> &EngineId {
        &self.id
    }

    /// The engine's own name if it reported one, else the configured label.
    pub fn display_name(&self) -> &str {
        self.id.name.as_deref().unwrap_or(&self.label)
    }

    pub fn last_search(&self) -> Option<&EngineMove> {
        self.last_search.as_ref()
    }

    /// Spawns the engine and performs the `uci`/`isready` handshake.
    ///
    /// Any failure leaves the session `Crashed` with the process killed.
    pub async fn start(&mut self) -> Result<(), EngineError> {
        if self.state != SessionState::Unstarted {
            return Err(EngineError::NotReady(self.state));
        }
        self.state = SessionState::Starting;

        match self.handshake().await {
            Ok(()) => {
                self.state = SessionState::Ready;
                info!(
                    engine = %self.label,
                    name = self.id.name.as_deref().unwrap_or("?"),
                    author = self.id.author.as_deref().unwrap_or("?"),
                    "engine ready"
                );
                Ok(())
            }
            Err(err) => {
                warn!(engine = %self.label, error = %err, "engine failed to start");
                self.state = SessionState::Crashed;
                self.kill().await;
                Err(err)
            }
        }
    }

    fn spawn(&mut self) -> Result<(), EngineError> {
        let spawn_error = |source| EngineError::Spawn {
            path: self.path.clone(),
            source,
        };
        let mut child = Command::new(&self.path)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_error)?;

        let missing = |pipe: &str| {
            spawn_error(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                format!("engine {} not captured", pipe),
            ))
        };
        let stdin = child.stdin.take().ok_or_else(|| missing("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;

        // Reader task: ends when the engine closes stdout or the client drops
        // the receiver.
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tx.send(line).is_err() {
                    break;
                }
            }
        });

        debug!(engine = %self.label, path = %self.path.display(), pid = child.id(), "spawned engine");
        self.child = Some(child);
        self.stdin = Some(stdin);
        self.lines = Some(rx);
        Ok(())
    }

    async fn handshake(&mut self) -> Result<(), EngineError> {
        self.spawn()?;
        self.send(&GuiCommand::Uci).await?;

        let deadline = Instant::now() + self.timeouts.handshake;
        loop {
            let line = self.next_line(deadline, "uciok").await?;
            match EngineMessage::parse(&line) {
                Ok(EngineMessage::UciOk) => break,
                Ok(EngineMessage::Id { name, author }) => {
                    if name.is_some() {
                        self.id.name = name;
                    }
                    if author.is_some() {
                        self.id.author = author;
                    }
                }
                Ok(_) => {}
                Err(err) => debug!(engine = %self.label, error = %err, "ignoring line during handshake"),
            }
        }

        self.sync_ready().await
    }

    /// `isready` and wait for `readyok`.
    async fn sync_ready(&mut self) -> Result<(), EngineError> {
        self.send(&GuiCommand::IsReady).await?;
        let deadline = Instant::now() + self.timeouts.handshake;
        loop {
            let line = self.next_line(deadline, "readyok").await?;
            if matches!(EngineMessage::parse(&line), Ok(EngineMessage::ReadyOk)) {
                return Ok(());
            }
        }
    }

    /// Tells the engine a new game begins and waits until it is ready.
    pub async fn new_game(&mut self) -> Result<(), EngineError> {
        if self.state != SessionState::Ready {
            return Err(EngineError::NotReady(self.state));
        }
        self.last_search = None;
        let result = async {
            self.send(&GuiCommand::UciNewGame).await?;
            self.sync_ready().await
        }
        .await;
        if let Err(err) = &result {
            warn!(engine = %self.label, error = %err, "engine failed new game sync");
            self.state = SessionState::Crashed;
        }
        result
    }

    /// Sends the full position and a timed search, then waits for
    /// `bestmove`.
    ///
    /// The returned move has been checked against `request.position`.
    /// Timeouts and crashes leave the session `Crashed`; an illegal move
    /// leaves it `Ready`.
    pub async fn request_move(&mut self, request: &MoveRequest) -> Result<EngineMove, EngineError> {
        if self.state != SessionState::Ready {
            return Err(EngineError::NotReady(self.state));
        }
        self.state = SessionState::Thinking;

        match self.search(request).await {
            Ok(reply) => {
                self.state = SessionState::Ready;
                self.last_search = Some(reply.clone());
                Ok(reply)
            }
            Err(err) => {
                self.state = if err.is_fatal_to_session() {
                    SessionState::Crashed
                } else {
                    SessionState::Ready
                };
                warn!(engine = %self.label, error = %err, "search failed");
                Err(err)
            }
        }
    }

    async fn search(&mut self, request: &MoveRequest) -> Result<EngineMove, EngineError> {
        self.send(&GuiCommand::Position {
            fen: request.start_fen.clone(),
            moves: request.moves.clone(),
        })
        .await?;
        let movetime = u64::try_from(request.think_time.as_millis()).unwrap_or(u64::MAX);
        self.send(&GuiCommand::Go(GoOptions::movetime(movetime))).await?;

        let deadline = Instant::now() + request.think_time + self.timeouts.grace;
        let mut search = EngineInfo::default();

        loop {
            let line = self.next_line(deadline, "bestmove").await?;
            match EngineMessage::parse(&line) {
                Ok(EngineMessage::Info(info)) => search.merge(info),
                Ok(EngineMessage::BestMove { mv, .. }) => {
                    return self.resolve_best_move(mv, request, search)
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(engine = %self.label, line = %line, error = %err, "malformed engine output");
                    return self.reread_best_move(EngineError::from(err), deadline, request, search).await;
                }
            }
        }
    }

    /// After one malformed line the very next line must be a valid
    /// `bestmove`, arriving within [`MALFORMED_REREAD`]. Anything else,
    /// silence included, is a crash.
    async fn reread_best_move(
        &mut self,
        first: EngineError,
        deadline: Instant,
        request: &MoveRequest,
        search: EngineInfo,
    ) -> Result<EngineMove, EngineError> {
        let reread_deadline = deadline.min(Instant::now() + MALFORMED_REREAD);
        let line = match self.next_line(reread_deadline, "bestmove").await {
            Ok(line) => line,
            Err(EngineError::EngineTimeout { .. }) => {
                return Err(EngineError::EngineCrashed(first.to_string()))
            }
            Err(err) => return Err(err),
        };
        match EngineMessage::parse(&line) {
            Ok(EngineMessage::BestMove { mv, .. }) => self.resolve_best_move(mv, request, search),
            _ => Err(EngineError::EngineCrashed(first.to_string())),
        }
    }

    fn resolve_best_move(
        &self,
        mv: Option<String>,
        request: &MoveRequest,
        search: EngineInfo,
    ) -> Result<EngineMove, EngineError> {
        let Some(text) = mv else {
            info!(engine = %self.label, "engine reports no legal move");
            return Ok(EngineMove { mv: None, search });
        };
        let illegal = || EngineError::IllegalEngineMove {
            mv: text.clone(),
            fen: request.position.to_fen(),
        };
        let candidate = Move::from_uci(&text).ok_or_else(illegal)?;
        let legal = find_legal(&request.position, candidate).ok_or_else(illegal)?;
        Ok(EngineMove {
            mv: Some(legal),
            search,
        })
    }

    /// Stops the engine: `stop` if a search is in flight, then `quit`, then a
    /// kill if it has not exited within the quit grace period.
    ///
    /// Safe to call any number of times; only the first call touches the
    /// process.
    pub async fn shutdown(&mut self) -> ShutdownOutcome {
        let Some(mut child) = self.child.take() else {
            if self.state == SessionState::Unstarted {
                self.state = SessionState::Stopped;
            }
            return ShutdownOutcome::AlreadyStopped;
        };

        if self.state == SessionState::Thinking {
            let _ = self.send(&GuiCommand::Stop).await;
        }
        let _ = self.send(&GuiCommand::Quit).await;
        // Closing stdin lets engines that exit on EOF do so.
        self.stdin = None;

        let outcome = match tokio::time::timeout(self.timeouts.quit_grace, child.wait()).await {
            Ok(Ok(status)) => {
                debug!(engine = %self.label, %status, "engine exited");
                ShutdownOutcome::Exited
            }
            _ => {
                warn!(engine = %self.label, "engine did not exit after quit, killing");
                let _ = child.kill().await;
                ShutdownOutcome::Killed
            }
        };

        self.lines = None;
        if self.state != SessionState::Crashed {
            self.state = SessionState::Stopped;
        }
        info!(engine = %self.label, ?outcome, "engine stopped");
        outcome
    }

    /// Kills and reaps the process without the quit exchange.
    async fn kill(&mut self) {
        self.stdin = None;
        self.lines = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.kill().await;
        }
    }

    async fn send(&mut self, command: &GuiCommand) -> Result<(), EngineError> {
        let line = command.to_uci();
        debug!(engine = %self.label, ">> {}", line);
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| EngineError::EngineCrashed("engine input is closed".to_string()))?;
        let write = async {
            stdin.write_all(line.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await
        };
        write
            .await
            .map_err(|e| EngineError::EngineCrashed(format!("writing to engine failed: {}", e)))
    }

    async fn next_line(
        &mut self,
        deadline: Instant,
        waiting_for: &'static str,
    ) -> Result<String, EngineError> {
        let started = Instant::now();
        let state = self.state;
        let lines = self.lines.as_mut().ok_or(EngineError::NotReady(state))?;

        let received = tokio::time::timeout_at(deadline, lines.recv()).await;
        match received {
            Ok(Some(line)) => {
                debug!(engine = %self.label, "<< {}", line);
                Ok(line)
            }
            Ok(None) => {
                let status = self.exit_status();
                Err(EngineError::EngineCrashed(format!(
                    "engine exited ({}) while waiting for {}",
                    status, waiting_for
                )))
            }
            Err(_) => Err(EngineError::EngineTimeout {
                waiting_for,
                elapsed: started.elapsed(),
            }),
        }
    }

    fn exit_status(&mut self) -> String {
        match self.child.as_mut().map(|c| c.try_wait()) {
            Some(Ok(Some(status))) => status.to_string(),
            _ => "output closed".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_display() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let spawn_error = EngineError::Spawn {
            path: PathBuf::from("/x/engine"),
            source: io_error,
        };
        assert!(spawn_error.to_string().starts_with("Failed to spawn engine /x/engine"));

        let not_ready = EngineError::NotReady(SessionState::Thinking);
        assert_eq!(not_ready.to_string(), "Engine not ready (session is Thinking)");

        let parse: EngineError = UciError::InvalidMove("e9e4".to_string()).into();
        assert!(parse.to_string().contains("e9e4"));
    }

    #[test]
    fn test_fatal_classification() {
        assert!(EngineError::EngineCrashed("gone".to_string()).is_fatal_to_session());
        assert!(EngineError::EngineTimeout {
            waiting_for: "bestmove",
            elapsed: Duration::from_secs(1)
        }
        .is_fatal_to_session());
        assert!(!EngineError::IllegalEngineMove {
            mv: "e2e5".to_string(),
            fen: String::new()
        }
        .is_fatal_to_session());
    }

    #[tokio::test]
    async fn test_spawn_nonexistent_executable_crashes_session() {
        let mut client = UciClient::new(
            "ghost",
            "/nonexistent/path/to/engine",
            Vec::new(),
            Timeouts::default(),
        );
        assert_eq!(client.state(), SessionState::Unstarted);
        let result = client.start().await;
        assert!(matches!(result, Err(EngineError::Spawn { .. })));
        assert_eq!(client.state(), SessionState::Crashed);
        assert_eq!(client.shutdown().await, ShutdownOutcome::AlreadyStopped);
        assert_eq!(client.state(), SessionState::Crashed);
    }

    #[tokio::test]
    async fn test_requests_before_start_are_rejected() {
        let mut client = UciClient::new("idle", "/bin/true", Vec::new(), Timeouts::default());
        let request = MoveRequest::from_game(&chess_rules::Game::new(), Duration::from_millis(10));
        assert!(matches!(
            client.request_move(&request).await,
            Err(EngineError::NotReady(SessionState::Unstarted))
        ));
        assert!(matches!(client.new_game().await, Err(EngineError::NotReady(_))));
        assert_eq!(client.shutdown().await, ShutdownOutcome::AlreadyStopped);
        assert_eq!(client.state(), SessionState::Stopped);
        assert_eq!(client.display_name(), "idle");
    }
}
