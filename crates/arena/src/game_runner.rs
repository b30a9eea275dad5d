//! The match orchestrator: plays one game between two move sources.
//!
//! [`GameRunner`] owns the authoritative [`Game`], asks the side to move for
//! its move, validates and applies it, and broadcasts [`MatchEvent`]s. Only
//! one move request is outstanding at a time. Pause and abort arrive through
//! a shared [`MatchControl`]; pause is honoured between turns, abort also
//! interrupts an in-flight request.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chess_core::Color;
use chess_openings::{Opening, OpeningLookup};
use chess_rules::{Game, GameResult, Position, Termination};
use chrono::{DateTime, Local};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use uci::EngineInfo;

use crate::analysis::{Analyzer, MoveAssessment, MoveQuality};
use crate::config::MatchSettings;
use crate::source::{MoveRequest, MoveSource, SourceError, SourceReply};

/// A single applied move with the search information behind it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoveRecord {
    /// 1-based half-move index within the game.
    pub ply: usize,
    /// The move in UCI notation (e.g., "e2e4", "g1f3").
    pub uci: String,
    /// The move in SAN, as it appears in the PGN.
    pub san: String,
    /// Position after the move.
    pub fen: String,
    /// Wall time the source took to answer.
    pub think_ms: u64,
    /// Search information from the engine, absent for human moves.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<EngineInfo>,
    /// Grade from the analysis engine, when one is attached.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<MoveQuality>,
    /// Analysis engine evaluation after the move, White-side centipawns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eval_cp: Option<i32>,
}

/// Which side's source failed and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineFailure {
    pub color: Color,
    pub engine: String,
    pub message: String,
}

/// Everything known about a finished game.
#[derive(Debug, Clone)]
pub struct GameRecord {
    /// Unique id shared by the stored row and the written files.
    pub id: String,
    pub white: String,
    pub black: String,
    pub event: String,
    pub site: String,
    pub round: String,
    pub started_at: DateTime<Local>,
    pub duration: Duration,
    /// FEN of a non-standard starting position.
    pub start_fen: Option<String>,
    pub final_fen: String,
    pub result: GameResult,
    pub moves: Vec<MoveRecord>,
    /// The most specific opening recognised during the game.
    pub opening: Option<Opening>,
    /// Set when the game ended because a source failed.
    pub engine_failure: Option<EngineFailure>,
}

impl GameRecord {
    pub fn san_moves(&self) -> Vec<String> {
        self.moves.iter().map(|m| m.san.clone()).collect()
    }

    pub fn uci_moves(&self) -> Vec<String> {
        self.moves.iter().map(|m| m.uci.clone()).collect()
    }

    pub fn is_engine_error(&self) -> bool {
        self.result.reason == Some(Termination::EngineError)
    }

    pub fn to_pgn(&self) -> String {
        crate::pgn::to_pgn(self)
    }
}

/// Notifications for UI and logging collaborators.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchEvent {
    GameStarted {
        white: String,
        black: String,
        fen: String,
    },
    MoveApplied {
        record: MoveRecord,
        opening: Option<Opening>,
    },
    Paused,
    Resumed,
    /// The game ended by the rules, resignation, time or abort.
    GameFinished { result: GameResult },
    /// The game ended because a source failed. Never sent together with
    /// `GameFinished` for the same game.
    EngineFailure {
        failure: EngineFailure,
        result: GameResult,
    },
}

/// Run state shared between a runner and whoever controls it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    Running,
    Paused,
    Aborted,
}

/// Pause, resume and abort for a running match. Clones share state.
#[derive(Debug, Clone)]
pub struct MatchControl {
    state: Arc<watch::Sender<ControlState>>,
}

impl Default for MatchControl {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchControl {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ControlState::Running);
        Self {
            state: Arc::new(tx),
        }
    }

    pub fn state(&self) -> ControlState {
        *self.state.borrow()
    }

    /// Returns false if the match was not running.
    pub fn pause(&self) -> bool {
        self.transition(|s| s == ControlState::Running, ControlState::Paused)
    }

    /// Returns false if the match was not paused.
    pub fn resume(&self) -> bool {
        self.transition(|s| s == ControlState::Paused, ControlState::Running)
    }

    /// Returns false if the match was already aborted. Abort is final.
    pub fn abort(&self) -> bool {
        self.transition(|s| s != ControlState::Aborted, ControlState::Aborted)
    }

    fn transition(&self, allowed: impl Fn(ControlState) -> bool, to: ControlState) -> bool {
        self.state.send_if_modified(|state| {
            if allowed(*state) {
                *state = to;
                true
            } else {
                false
            }
        })
    }

    fn subscribe(&self) -> watch::Receiver<ControlState> {
        self.state.subscribe()
    }
}

/// Per-game settings for the runner.
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerSettings {
    /// Think time for sources that do not set their own.
    pub think_time: Duration,
    /// Pause after each applied move.
    pub inter_move_delay: Duration,
    pub event: String,
    pub site: String,
    pub round: String,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self::from(&MatchSettings::default())
    }
}

impl From<&MatchSettings> for RunnerSettings {
    fn from(settings: &MatchSettings) -> Self {
        Self {
            think_time: settings.think_time(),
            inter_move_delay: settings.inter_move_delay(),
            event: settings.event.clone(),
            site: settings.site.clone(),
            round: "1".to_string(),
        }
    }
}

enum Turn {
    Reply(Result<SourceReply, SourceError>),
    Aborted,
}

/// Plays one game between two move sources.
///
/// # Example
///
/// ```no_run
/// use arena::game_runner::{GameRunner, RunnerSettings};
/// use arena::source::EngineMoveSource;
/// use arena::uci_client::{Timeouts, UciClient};
///
/// # async fn demo() -> Result<(), arena::uci_client::EngineError> {
/// let mut white = EngineMoveSource::launch(
///     UciClient::new("a", "./engine_a", Vec::new(), Timeouts::default()), None).await?;
/// let mut black = EngineMoveSource::launch(
///     UciClient::new("b", "./engine_b", Vec::new(), Timeouts::default()), None).await?;
/// let record = GameRunner::new(&mut white, &mut black, RunnerSettings::default())
///     .play()
///     .await;
/// println!("{}", record.result);
/// # Ok(())
/// # }
/// ```
pub struct GameRunner<'a> {
    white: &'a mut dyn MoveSource,
    black: &'a mut dyn MoveSource,
    settings: RunnerSettings,
    control: MatchControl,
    events: Option<mpsc::UnboundedSender<MatchEvent>>,
    openings: Option<Arc<dyn OpeningLookup>>,
    analyzer: Option<&'a mut Analyzer>,
    start: Option<Position>,
}

impl<'a> GameRunner<'a> {
    pub fn new(
        white: &'a mut dyn MoveSource,
        black: &'a mut dyn MoveSource,
        settings: RunnerSettings,
    ) -> Self {
        Self {
            white,
            black,
            settings,
            control: MatchControl::new(),
            events: None,
            openings: None,
            analyzer: None,
            start: None,
        }
    }

    pub fn with_control(mut self, control: MatchControl) -> Self {
        self.control = control;
        self
    }

    pub fn with_events(mut self, events: mpsc::UnboundedSender<MatchEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_openings(mut self, openings: Arc<dyn OpeningLookup>) -> Self {
        self.openings = Some(openings);
        self
    }

    /// Grades every move with `analyzer`. A failing analyzer is dropped for
    /// the rest of the game; it never ends the game.
    pub fn with_analyzer(mut self, analyzer: &'a mut Analyzer) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    /// Starts from `position` instead of the standard starting position.
    pub fn from_position(mut self, position: Position) -> Self {
        self.start = Some(position);
        self
    }

    fn source(&mut self, color: Color) -> &mut (dyn MoveSource + 'a) {
        match color {
            Color::White => &mut *self.white,
            Color::Black => &mut *self.black,
        }
    }

    fn emit(&self, event: MatchEvent) {
        if let Some(events) = &self.events {
            // A listener that went away is not the game's problem.
            let _ = events.send(event);
        }
    }

    /// Plays until the game ends, the match is aborted or a source fails.
    pub async fn play(mut self) -> GameRecord {
        let started_at = Local::now();
        let clock = Instant::now();
        let mut game = match self.start.take() {
            Some(position) => Game::from_position(position),
            None => Game::new(),
        };
        let white = self.white.name().to_string();
        let black = self.black.name().to_string();
        let mut control = self.control.subscribe();
        let mut moves: Vec<MoveRecord> = Vec::new();
        let mut opening: Option<Opening> = None;
        let mut failure: Option<EngineFailure> = None;

        info!(%white, %black, "game started");
        self.emit(MatchEvent::GameStarted {
            white: white.clone(),
            black: black.clone(),
            fen: game.position().to_fen(),
        });

        for color in Color::BOTH {
            if let Err(err) = self.source(color).new_game().await {
                failure = Some(self.fail(&mut game, color, err.to_string()).await);
                break;
            }
        }
        if failure.is_none() {
            if let Some(analyzer) = self.analyzer.as_deref_mut() {
                if let Err(err) = analyzer.new_game().await {
                    warn!(error = %err, "analysis engine unavailable, moves will not be graded");
                    analyzer.shutdown().await;
                    self.analyzer = None;
                }
            }
        }

        while failure.is_none() && !game.is_over() {
            if !self.wait_while_paused(&mut control).await {
                self.abort_game(&mut game).await;
                break;
            }

            let color = game.side_to_move();
            let think_time = self
                .source(color)
                .think_time()
                .unwrap_or(self.settings.think_time);
            let request = MoveRequest::from_game(&game, think_time);
            let asked = Instant::now();

            let turn = {
                let source = self.source(color);
                tokio::select! {
                    reply = source.request_move(&request) => Turn::Reply(reply),
                    _ = wait_for_abort(&mut control) => Turn::Aborted,
                }
            };

            let reply = match turn {
                Turn::Reply(reply) => reply,
                Turn::Aborted => {
                    self.abort_game(&mut game).await;
                    break;
                }
            };

            match reply {
                Ok(SourceReply::Move { mv, search }) => match game.try_apply(mv) {
                    Ok(_) => {
                        let think_ms = u64::try_from(asked.elapsed().as_millis()).unwrap_or(u64::MAX);
                        let assessment = self.grade(&game, &mut control).await;
                        let record = MoveRecord {
                            ply: game.ply_count(),
                            uci: mv.to_uci(),
                            san: game.san_moves().pop().unwrap_or_default(),
                            fen: game.position().to_fen(),
                            think_ms,
                            search,
                            quality: assessment.map(|a| a.quality),
                            eval_cp: assessment.map(|a| a.eval_after),
                        };
                        debug!(ply = record.ply, san = %record.san, "move applied");

                        if let Some(found) = self
                            .openings
                            .as_ref()
                            .and_then(|book| book.lookup(&game.uci_moves()))
                        {
                            if opening.as_ref() != Some(found) {
                                info!(eco = %found.eco, name = %found.name, "opening");
                                opening = Some(found.clone());
                            }
                        }

                        self.emit(MatchEvent::MoveApplied {
                            record: record.clone(),
                            opening: opening.clone(),
                        });
                        moves.push(record);

                        let delay = self.settings.inter_move_delay;
                        if !game.is_over() && !delay.is_zero() {
                            tokio::select! {
                                _ = tokio::time::sleep(delay) => {}
                                _ = wait_for_abort(&mut control) => {}
                            }
                        }
                    }
                    Err(err) => {
                        failure = Some(self.fail(&mut game, color, err.to_string()).await);
                    }
                },
                Ok(SourceReply::NoMove) => {
                    let message = "reported no move in a position with legal moves".to_string();
                    failure = Some(self.fail(&mut game, color, message).await);
                }
                Ok(SourceReply::Resign) => {
                    info!(%color, "resigned");
                    let _ = game.resign(color);
                }
                Ok(SourceReply::Flagged) => {
                    info!(%color, "lost on time");
                    let _ = game.terminate(GameResult::win(color.opposite(), Termination::TimeForfeit));
                }
                Err(SourceError::Disconnected) => {
                    warn!(%color, "move source disconnected");
                    self.abort_game(&mut game).await;
                    break;
                }
                Err(SourceError::Engine(err)) => {
                    failure = Some(self.fail(&mut game, color, err.to_string()).await);
                }
            }
        }

        let result = game.result();
        match &failure {
            Some(failure) => self.emit(MatchEvent::EngineFailure {
                failure: failure.clone(),
                result,
            }),
            None => self.emit(MatchEvent::GameFinished { result }),
        }
        info!(%white, %black, %result, plies = moves.len(), "game finished");

        GameRecord {
            id: uuid::Uuid::new_v4().to_string(),
            white,
            black,
            event: self.settings.event.clone(),
            site: self.settings.site.clone(),
            round: self.settings.round.clone(),
            started_at,
            duration: clock.elapsed(),
            start_fen: game.start_fen(),
            final_fen: game.position().to_fen(),
            result,
            moves,
            opening,
            engine_failure: failure,
        }
    }

    /// Grades the last move. Gives up quietly on abort.
    async fn grade(
        &mut self,
        game: &Game,
        control: &mut watch::Receiver<ControlState>,
    ) -> Option<MoveAssessment> {
        let analyzer = self.analyzer.as_deref_mut()?;
        let graded = tokio::select! {
            result = analyzer.assess_last_move(game) => Some(result),
            _ = wait_for_abort(control) => None,
        };
        match graded {
            Some(Ok(assessment)) => assessment,
            Some(Err(err)) => {
                warn!(error = %err, "move grading failed, analysis turned off");
                if let Some(analyzer) = self.analyzer.take() {
                    analyzer.shutdown().await;
                }
                None
            }
            None => None,
        }
    }

    /// Ends the game as an engine error and stops the failed source.
    async fn fail(&mut self, game: &mut Game, color: Color, message: String) -> EngineFailure {
        let engine = self.source(color).name().to_string();
        warn!(%engine, %color, error = %message, "engine error ends the game");
        let _ = game.terminate(GameResult::interrupted(Termination::EngineError));
        let outcome = self.source(color).shutdown().await;
        debug!(%engine, ?outcome, "failed engine shut down");
        EngineFailure {
            color,
            engine,
            message,
        }
    }

    /// Ends the game as aborted and shuts both sources down.
    async fn abort_game(&mut self, game: &mut Game) {
        info!("game aborted");
        let _ = game.terminate(GameResult::interrupted(Termination::Aborted));
        for color in Color::BOTH {
            let outcome = self.source(color).shutdown().await;
            debug!(%color, ?outcome, "source shut down after abort");
        }
        if let Some(analyzer) = self.analyzer.as_deref_mut() {
            let outcome = analyzer.shutdown().await;
            debug!(?outcome, "analysis engine shut down after abort");
        }
    }

    /// Blocks while paused. Returns false once the match is aborted.
    async fn wait_while_paused(&self, control: &mut watch::Receiver<ControlState>) -> bool {
        let mut paused = false;
        loop {
            let state = *control.borrow_and_update();
            match state {
                ControlState::Running => {
                    if paused {
                        info!("match resumed");
                        self.emit(MatchEvent::Resumed);
                    }
                    return true;
                }
                ControlState::Aborted => return false,
                ControlState::Paused => {
                    if !paused {
                        paused = true;
                        info!("match paused");
                        self.emit(MatchEvent::Paused);
                    }
                    if control.changed().await.is_err() {
                        return true;
                    }
                }
            }
        }
    }
}

/// Resolves once the control state becomes `Aborted`.
async fn wait_for_abort(control: &mut watch::Receiver<ControlState>) {
    loop {
        let state = *control.borrow_and_update();
        if state == ControlState::Aborted {
            return;
        }
        if control.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uci_client::ShutdownOutcome;
    use chess_core::Move;
    use chess_openings::OpeningBook;
    use futures_util::future::BoxFuture;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Plays a fixed list of replies, then hangs until aborted.
    struct Scripted {
        name: String,
        replies: VecDeque<Result<SourceReply, SourceError>>,
        shutdowns: Arc<AtomicUsize>,
        stopped: bool,
    }

    impl Scripted {
        fn new(name: &str, moves: &[&str]) -> Self {
            let replies = moves
                .iter()
                .map(|uci| {
                    Ok(SourceReply::Move {
                        mv: Move::from_uci(uci).unwrap(),
                        search: None,
                    })
                })
                .collect();
            Self {
                name: name.to_string(),
                replies,
                shutdowns: Arc::new(AtomicUsize::new(0)),
                stopped: false,
            }
        }

        fn then(mut self, reply: Result<SourceReply, SourceError>) -> Self {
            self.replies.push_back(reply);
            self
        }
    }

    impl MoveSource for Scripted {
        fn name(&self) -> &str {
            &self.name
        }

        fn new_game(&mut self) -> BoxFuture<'_, Result<(), SourceError>> {
            Box::pin(async { Ok(()) })
        }

        fn request_move<'a>(
            &'a mut self,
            _request: &'a MoveRequest,
        ) -> BoxFuture<'a, Result<SourceReply, SourceError>> {
            Box::pin(async move {
                match self.replies.pop_front() {
                    Some(reply) => reply,
                    None => std::future::pending().await,
                }
            })
        }

        fn shutdown(&mut self) -> BoxFuture<'_, ShutdownOutcome> {
            Box::pin(async move {
                if self.stopped {
                    ShutdownOutcome::AlreadyStopped
                } else {
                    self.stopped = true;
                    self.shutdowns.fetch_add(1, Ordering::SeqCst);
                    ShutdownOutcome::Exited
                }
            })
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<MatchEvent>) -> Vec<MatchEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn finished_events(events: &[MatchEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, MatchEvent::GameFinished { .. } | MatchEvent::EngineFailure { .. }))
            .count()
    }

    #[tokio::test]
    async fn test_fools_mate_is_checkmate() {
        let mut white = Scripted::new("White", &["f2f3", "g2g4"]);
        let mut black = Scripted::new("Black", &["e7e5", "d8h4"]);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let record = GameRunner::new(&mut white, &mut black, RunnerSettings::default())
            .with_events(tx)
            .play()
            .await;

        assert_eq!(record.result, GameResult::win(Color::Black, Termination::Checkmate));
        assert_eq!(record.san_moves(), vec!["f3", "e5", "g4", "Qh4#"]);
        assert_eq!(record.moves[3].ply, 4);
        assert!(record.engine_failure.is_none());
        assert!(!record.is_engine_error());

        let events = drain(&mut rx);
        assert!(matches!(events[0], MatchEvent::GameStarted { .. }));
        let applied = events
            .iter()
            .filter(|e| matches!(e, MatchEvent::MoveApplied { .. }))
            .count();
        assert_eq!(applied, 4);
        assert_eq!(
            events.last(),
            Some(&MatchEvent::GameFinished {
                result: record.result
            })
        );
    }

    #[tokio::test]
    async fn test_engine_error_is_distinct_from_results() {
        let mut white = Scripted::new("White", &["e2e4"]);
        let mut black = Scripted::new("Black", &[]).then(Err(SourceError::Engine(
            crate::uci_client::EngineError::EngineCrashed("exit status: 1".to_string()),
        )));
        let black_shutdowns = black.shutdowns.clone();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let record = GameRunner::new(&mut white, &mut black, RunnerSettings::default())
            .with_events(tx)
            .play()
            .await;

        assert_eq!(record.result, GameResult::interrupted(Termination::EngineError));
        assert_eq!(record.result.outcome.pgn_token(), "*");
        assert!(record.is_engine_error());
        let failure = record.engine_failure.as_ref().unwrap();
        assert_eq!(failure.color, Color::Black);
        assert_eq!(failure.engine, "Black");
        assert!(failure.message.contains("exit status: 1"));
        assert_eq!(black_shutdowns.load(Ordering::SeqCst), 1);

        let events = drain(&mut rx);
        assert_eq!(finished_events(&events), 1);
        assert!(matches!(events.last(), Some(MatchEvent::EngineFailure { .. })));
    }

    #[tokio::test]
    async fn test_no_move_with_legal_moves_is_engine_error() {
        let mut white = Scripted::new("White", &[]).then(Ok(SourceReply::NoMove));
        let mut black = Scripted::new("Black", &[]);
        let record = GameRunner::new(&mut white, &mut black, RunnerSettings::default())
            .play()
            .await;
        assert!(record.is_engine_error());
        assert_eq!(record.engine_failure.unwrap().color, Color::White);
    }

    #[tokio::test]
    async fn test_illegal_reply_is_engine_error() {
        let mut white = Scripted::new("White", &["e2e5"]);
        let mut black = Scripted::new("Black", &[]);
        let record = GameRunner::new(&mut white, &mut black, RunnerSettings::default())
            .play()
            .await;
        assert!(record.is_engine_error());
        assert!(record.moves.is_empty());
    }

    #[tokio::test]
    async fn test_resign_and_flag() {
        let mut white = Scripted::new("White", &["d2d4"]);
        let mut black = Scripted::new("Black", &[]).then(Ok(SourceReply::Resign));
        let record = GameRunner::new(&mut white, &mut black, RunnerSettings::default())
            .play()
            .await;
        assert_eq!(record.result, GameResult::win(Color::White, Termination::Resignation));

        let mut white = Scripted::new("White", &[]).then(Ok(SourceReply::Flagged));
        let mut black = Scripted::new("Black", &[]);
        let record = GameRunner::new(&mut white, &mut black, RunnerSettings::default())
            .play()
            .await;
        assert_eq!(record.result, GameResult::win(Color::Black, Termination::TimeForfeit));
    }

    #[tokio::test]
    async fn test_disconnect_aborts() {
        let mut white = Scripted::new("White", &[]).then(Err(SourceError::Disconnected));
        let mut black = Scripted::new("Black", &[]);
        let record = GameRunner::new(&mut white, &mut black, RunnerSettings::default())
            .play()
            .await;
        assert_eq!(record.result, GameResult::interrupted(Termination::Aborted));
        assert!(record.engine_failure.is_none());
    }

    #[tokio::test]
    async fn test_abort_interrupts_pending_request_once() {
        // White plays, black never answers.
        let mut white = Scripted::new("White", &["e2e4"]);
        let mut black = Scripted::new("Black", &[]);
        let white_shutdowns = white.shutdowns.clone();
        let black_shutdowns = black.shutdowns.clone();
        let control = MatchControl::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let runner = GameRunner::new(&mut white, &mut black, RunnerSettings::default())
            .with_control(control.clone())
            .with_events(tx);
        let aborter = control.clone();
        let (record, _) = tokio::join!(runner.play(), async move {
            tokio::task::yield_now().await;
            assert!(aborter.abort());
        });

        assert_eq!(record.result, GameResult::interrupted(Termination::Aborted));
        assert_eq!(record.moves.len(), 1);
        assert_eq!(white_shutdowns.load(Ordering::SeqCst), 1);
        assert_eq!(black_shutdowns.load(Ordering::SeqCst), 1);

        // A second abort changes nothing and produces no further events.
        assert!(!control.abort());
        assert_eq!(control.state(), ControlState::Aborted);
        let events = drain(&mut rx);
        assert_eq!(finished_events(&events), 1);
        assert_eq!(white_shutdowns.load(Ordering::SeqCst), 1);
        assert_eq!(black_shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_aborted_before_start_plays_nothing() {
        let mut white = Scripted::new("White", &["e2e4"]);
        let mut black = Scripted::new("Black", &["e7e5"]);
        let control = MatchControl::new();
        control.abort();
        let record = GameRunner::new(&mut white, &mut black, RunnerSettings::default())
            .with_control(control)
            .play()
            .await;
        assert!(record.moves.is_empty());
        assert_eq!(record.result.reason, Some(Termination::Aborted));
    }

    #[tokio::test]
    async fn test_pause_holds_turns_until_resume() {
        let mut white = Scripted::new("White", &["f2f3", "g2g4"]);
        let mut black = Scripted::new("Black", &["e7e5", "d8h4"]);
        let control = MatchControl::new();
        assert!(control.pause());
        assert!(!control.pause());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let runner = GameRunner::new(&mut white, &mut black, RunnerSettings::default())
            .with_control(control.clone())
            .with_events(tx);
        let resumer = control.clone();
        let (record, _) = tokio::join!(runner.play(), async move {
            for _ in 0..5 {
                tokio::task::yield_now().await;
            }
            assert!(resumer.resume());
        });

        assert_eq!(record.result.reason, Some(Termination::Checkmate));
        let events = drain(&mut rx);
        let paused = events.iter().position(|e| *e == MatchEvent::Paused).unwrap();
        let resumed = events.iter().position(|e| *e == MatchEvent::Resumed).unwrap();
        let first_move = events
            .iter()
            .position(|e| matches!(e, MatchEvent::MoveApplied { .. }))
            .unwrap();
        assert!(paused < resumed && resumed < first_move);
    }

    #[tokio::test]
    async fn test_opening_annotation() {
        let mut white = Scripted::new("White", &["e2e4", "g1f3"]).then(Ok(SourceReply::Resign));
        let mut black = Scripted::new("Black", &["c7c5", "d7d6"]);
        let book: Arc<dyn OpeningLookup> = Arc::new(OpeningBook::builtin());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let record = GameRunner::new(&mut white, &mut black, RunnerSettings::default())
            .with_openings(book)
            .with_events(tx)
            .play()
            .await;

        assert_eq!(record.opening.as_ref().unwrap().name, "Sicilian Defense");
        let first = drain(&mut rx)
            .into_iter()
            .find_map(|e| match e {
                MatchEvent::MoveApplied { record, opening } => Some((record, opening)),
                _ => None,
            })
            .unwrap();
        assert_eq!(first.0.uci, "e2e4");
        assert_eq!(first.1, None);
    }

    #[tokio::test]
    async fn test_custom_start_position() {
        let position = Position::from_fen("7k/8/6K1/8/8/8/8/R7 w - - 0 1").unwrap();
        let mut white = Scripted::new("White", &["a1a8"]);
        let mut black = Scripted::new("Black", &[]);
        let record = GameRunner::new(&mut white, &mut black, RunnerSettings::default())
            .from_position(position)
            .play()
            .await;
        assert_eq!(record.result, GameResult::win(Color::White, Termination::Checkmate));
        assert_eq!(record.start_fen.as_deref(), Some("7k/8/6K1/8/8/8/8/R7 w - - 0 1"));
        assert_eq!(record.san_moves(), vec!["Ra8#"]);
    }

    #[test]
    fn test_move_record_serialize() {
        let record = MoveRecord {
            ply: 3,
            uci: "g1f3".to_string(),
            san: "Nf3".to_string(),
            fen: "x".to_string(),
            think_ms: 12,
            search: Some(EngineInfo {
                depth: Some(10),
                score: Some(uci::Score::Cp(-15)),
                ..Default::default()
            }),
            quality: Some(MoveQuality::Excellent),
            eval_cp: Some(-20),
        };

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"uci\":\"g1f3\""));
        assert!(json.contains("\"depth\":10"));
        assert!(json.contains("\"cp\":-15"));
        assert!(json.contains("\"quality\":\"Excellent\""));
        assert!(json.contains("\"eval_cp\":-20"));

        let plain = MoveRecord {
            quality: None,
            eval_cp: None,
            search: None,
            ..record
        };
        let json = serde_json::to_string(&plain).unwrap();
        assert!(!json.contains("quality"));
    }
}
