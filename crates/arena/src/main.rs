use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use arena::analysis::Analyzer;
use arena::config::{ArenaConfig, EngineSpec};
use arena::elo::{self, RatingTable};
use arena::game_runner::{ControlState, GameRecord, GameRunner, MatchControl, MatchEvent, RunnerSettings};
use arena::human::{HumanMoveSource, SubmitError};
use arena::source::{EngineMoveSource, MoveSource};
use arena::storage::{GameFilter, Storage};
use arena::uci_client::{SessionState, Timeouts, UciClient};
use arena::{json_output, pgn};
use chess_core::Color;
use chess_openings::{OpeningBook, OpeningLookup};
use chess_rules::Outcome;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "arena")]
#[command(about = "Plays UCI chess engines against each other and keeps score")]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = "arena.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a match between two engines, alternating colours
    Match {
        /// Engine name from the config, or a path to an executable
        white: String,
        /// Engine name from the config, or a path to an executable
        black: String,
        /// Number of games to play
        #[arg(short, long, default_value = "1")]
        games: u32,
        /// Think time per move, overriding the config
        #[arg(short, long)]
        think_ms: Option<u64>,
        /// Engine that grades every move, overriding the config
        #[arg(short, long)]
        analyzer: Option<String>,
    },
    /// Play against an engine by typing UCI moves ("resign" gives up)
    Play {
        engine: String,
        /// The colour you play
        #[arg(long, value_enum, default_value = "white")]
        color: Side,
        #[arg(short, long)]
        think_ms: Option<u64>,
        #[arg(short, long)]
        analyzer: Option<String>,
    },
    /// Show win/draw/loss counts and ratings
    Stats {
        #[arg(short, long)]
        engine: Option<String>,
    },
    /// List stored games, newest first
    Games {
        #[arg(short, long)]
        engine: Option<String>,
        /// Match engine names or opening
        #[arg(short, long)]
        search: Option<String>,
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },
    /// Write the PGN of a stored game to a file
    Export { id: String, file: PathBuf },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Side {
    White,
    Black,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ArenaConfig::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    match cli.command {
        Commands::Match {
            white,
            black,
            games,
            think_ms,
            analyzer,
        } => {
            run_match(&config, &white, &black, games, think_ms, analyzer.as_deref()).await
        }
        Commands::Play {
            engine,
            color,
            think_ms,
            analyzer,
        } => {
            let analyzer = launch_analyzer(&config, analyzer.as_deref()).await;
            run_play(&config, &engine, color, think_ms, analyzer).await
        }
        Commands::Stats { engine } => show_stats(&config, engine.as_deref()),
        Commands::Games {
            engine,
            search,
            limit,
        } => list_games(&config, engine, search, limit),
        Commands::Export { id, file } => export_game(&config, &id, &file),
    }
}

fn resolve(config: &ArenaConfig, name: &str, think_ms: Option<u64>) -> EngineSpec {
    let mut spec = config.resolve_engine(name);
    if let Some(ms) = think_ms {
        spec.think_time = std::time::Duration::from_millis(ms);
    }
    spec
}

async fn launch(spec: &EngineSpec, timeouts: Timeouts) -> anyhow::Result<EngineMoveSource> {
    let client = UciClient::new(&spec.name, &spec.path, spec.args.clone(), timeouts);
    let source = EngineMoveSource::launch(client, Some(spec.think_time))
        .await
        .with_context(|| format!("starting engine {} ({})", spec.name, spec.path.display()))?;
    if let Some(id) = &source.client().id().name {
        tracing::info!("{} identifies as {}", spec.name, id);
    }
    Ok(source)
}

/// Starts the analysis engine named on the command line or in the config.
/// Play goes on ungraded when it cannot be started.
async fn launch_analyzer(config: &ArenaConfig, name: Option<&str>) -> Option<Analyzer> {
    let name = name.or(config.analyzer.as_deref())?;
    let spec = config.resolve_engine(name);
    let client = UciClient::new(
        &spec.name,
        &spec.path,
        spec.args.clone(),
        Timeouts::from(&config.match_settings),
    );
    match Analyzer::launch(client, config.match_settings.analysis_time()).await {
        Ok(analyzer) => {
            tracing::info!("Grading moves with {}", spec.name);
            Some(analyzer)
        }
        Err(e) => {
            tracing::warn!("Analysis engine {} not started: {}", spec.name, e);
            None
        }
    }
}

fn load_openings(config: &ArenaConfig) -> Arc<dyn OpeningLookup> {
    let mut book = OpeningBook::builtin();
    if let Some(path) = &config.openings {
        match OpeningBook::load(path) {
            Ok(extra) => {
                if extra.skipped() > 0 {
                    tracing::warn!("{} unplayable lines skipped in {}", extra.skipped(), path.display());
                }
                book.extend(extra);
            }
            Err(e) => tracing::warn!("Opening book {} not loaded: {}", path.display(), e),
        }
    }
    Arc::new(book)
}

/// Aborts the match on Ctrl-C.
fn abort_on_ctrl_c(control: &MatchControl) {
    let control = control.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, aborting the match");
            control.abort();
        }
    });
}

/// Prints each applied move as it happens.
fn print_events(mut events: mpsc::UnboundedReceiver<MatchEvent>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_opening = None;
        while let Some(event) = events.recv().await {
            match event {
                MatchEvent::MoveApplied { record, opening } => {
                    let number = (record.ply + 1) / 2;
                    let dots = if record.ply % 2 == 1 { "." } else { "..." };
                    let eval = record
                        .search
                        .as_ref()
                        .and_then(|s| s.score.map(|score| format!(" ({} d{})", score, s.depth.unwrap_or(0))))
                        .unwrap_or_default();
                    let grade = record
                        .quality
                        .map(|q| format!("  [{}]", q))
                        .unwrap_or_default();
                    println!("  {}{} {}{}{}", number, dots, record.san, eval, grade);
                    if let Some(opening) = opening {
                        if last_opening.as_ref() != Some(&opening) {
                            println!("  [{}]", opening.label());
                            last_opening = Some(opening);
                        }
                    }
                }
                MatchEvent::Paused => println!("  (paused)"),
                MatchEvent::Resumed => println!("  (resumed)"),
                MatchEvent::EngineFailure { failure, .. } => {
                    println!("  Engine error: {} ({}): {}", failure.engine, failure.color, failure.message);
                }
                MatchEvent::GameStarted { .. } | MatchEvent::GameFinished { .. } => {}
            }
        }
    })
}

/// Stores the game and writes its PGN and JSON files. Failures are logged,
/// not fatal.
fn persist(storage: &Storage, output_dir: &Path, record: &GameRecord) {
    if let Err(e) = storage.save_game(record) {
        tracing::error!("Failed to store game {}: {}", record.id, e);
    }

    let dir = output_dir.join(record.started_at.format("%Y-%m-%d").to_string());
    if let Err(e) = std::fs::create_dir_all(&dir) {
        tracing::error!("Failed to create {}: {}", dir.display(), e);
        return;
    }
    let pgn_path = dir.join(format!("{}.pgn", record.id));
    if let Err(e) = pgn::write_pgn(&pgn_path, record) {
        tracing::error!("Failed to write {}: {}", pgn_path.display(), e);
    }
    let json_path = dir.join(format!("{}.json", record.id));
    if let Err(e) = json_output::write_json(&json_path, record) {
        tracing::error!("Failed to write {}: {}", json_path.display(), e);
    }
}

async fn run_match(
    config: &ArenaConfig,
    white: &str,
    black: &str,
    games: u32,
    think_ms: Option<u64>,
    analyzer_name: Option<&str>,
) -> anyhow::Result<()> {
    let storage = Storage::open(&config.database)
        .with_context(|| format!("opening {}", config.database.display()))?;
    let openings = load_openings(config);
    let timeouts = Timeouts::from(&config.match_settings);
    let specs = [resolve(config, white, think_ms), resolve(config, black, think_ms)];

    let control = MatchControl::new();
    abort_on_ctrl_c(&control);

    let mut engines = [launch(&specs[0], timeouts).await?, launch(&specs[1], timeouts).await?];
    let mut analyzer = launch_analyzer(config, analyzer_name).await;
    println!("Running {} games: {} vs {}", games, specs[0].name, specs[1].name);

    // Wins, draws and engine errors from the first engine's point of view.
    let (mut wins, mut draws, mut losses, mut errors) = (0u32, 0u32, 0u32, 0u32);

    for round in 1..=games {
        if control.state() == ControlState::Aborted {
            break;
        }
        for (slot, spec) in engines.iter_mut().zip(&specs) {
            if slot.client().state() != SessionState::Ready {
                tracing::info!("Restarting {}", spec.name);
                slot.shutdown().await;
                *slot = launch(spec, timeouts).await?;
            }
        }
        if analyzer
            .as_ref()
            .is_some_and(|a| a.client().state() != SessionState::Ready)
        {
            tracing::info!("Restarting the analysis engine");
            if let Some(mut stale) = analyzer.take() {
                stale.shutdown().await;
            }
            analyzer = launch_analyzer(config, analyzer_name).await;
        }

        let [first, second] = &mut engines;
        let first_is_white = round % 2 == 1;
        let (w, b) = if first_is_white {
            (first as &mut dyn MoveSource, second as &mut dyn MoveSource)
        } else {
            (second as &mut dyn MoveSource, first as &mut dyn MoveSource)
        };

        let mut settings = RunnerSettings::from(&config.match_settings);
        settings.round = round.to_string();
        let (tx, rx) = mpsc::unbounded_channel();
        let printer = print_events(rx);

        println!("Game {}: {} vs {}", round, w.name(), b.name());
        let mut runner = GameRunner::new(w, b, settings)
            .with_control(control.clone())
            .with_events(tx)
            .with_openings(openings.clone());
        if let Some(analyzer) = analyzer.as_mut() {
            runner = runner.with_analyzer(analyzer);
        }
        let record = runner.play().await;
        let _ = printer.await;

        persist(&storage, &config.output_dir, &record);
        println!("Game {}: {} ({} moves)", round, record.result, record.moves.len());

        let first_color = if first_is_white { Color::White } else { Color::Black };
        match (record.result.outcome, record.is_engine_error()) {
            (_, true) => errors += 1,
            (Outcome::Draw, _) => draws += 1,
            (Outcome::Ongoing, _) => {}
            (outcome, _) if outcome.winner() == Some(first_color) => wins += 1,
            _ => losses += 1,
        }
    }

    for engine in engines.iter_mut() {
        engine.shutdown().await;
    }
    if let Some(analyzer) = analyzer.as_mut() {
        analyzer.shutdown().await;
    }

    println!(
        "\nSession results for {}: W:{} D:{} L:{} (engine errors: {})",
        specs[0].name, wins, draws, losses, errors
    );
    for spec in &specs {
        let stats = storage.engine_stats(&spec.name)?;
        println!(
            "{} all-time: {} games, {} wins, {} draws, {} losses, {} engine errors",
            spec.name, stats.games, stats.wins, stats.draws, stats.losses, stats.engine_errors
        );
    }
    Ok(())
}

async fn run_play(
    config: &ArenaConfig,
    engine: &str,
    side: Side,
    think_ms: Option<u64>,
    mut analyzer: Option<Analyzer>,
) -> anyhow::Result<()> {
    let storage = Storage::open(&config.database)
        .with_context(|| format!("opening {}", config.database.display()))?;
    let spec = resolve(config, engine, think_ms);
    let mut computer = launch(&spec, Timeouts::from(&config.match_settings)).await?;
    let (mut human, handle) = HumanMoveSource::new("Human", None);

    let control = MatchControl::new();
    abort_on_ctrl_c(&control);

    // Stdin is read on a plain thread; a blocked read must not hold up
    // runtime shutdown when the game ends.
    let (line_tx, mut line_rx) = mpsc::channel::<String>(4);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    tokio::spawn(async move {
        while let Some(line) = line_rx.recv().await {
            let result = match line.trim() {
                "" => continue,
                "quit" => break,
                "resign" => handle.resign().await,
                mv => handle.submit(mv).await,
            };
            match result {
                Ok(()) => {}
                Err(SubmitError::Closed) => break,
                Err(e) => println!("{}", e),
            }
        }
    });

    let (tx, rx) = mpsc::unbounded_channel();
    let printer = print_events(rx);
    println!("You play {:?} against {}. Enter moves like e2e4.", side, spec.name);

    let settings = RunnerSettings::from(&config.match_settings);
    let runner = match side {
        Side::White => GameRunner::new(&mut human, &mut computer, settings),
        Side::Black => GameRunner::new(&mut computer, &mut human, settings),
    };
    let mut runner = runner
        .with_control(control)
        .with_events(tx)
        .with_openings(load_openings(config));
    if let Some(analyzer) = analyzer.as_mut() {
        runner = runner.with_analyzer(analyzer);
    }
    let record = runner.play().await;
    let _ = printer.await;

    computer.shutdown().await;
    human.shutdown().await;
    if let Some(analyzer) = analyzer.as_mut() {
        analyzer.shutdown().await;
    }
    persist(&storage, &config.output_dir, &record);
    println!("\n{}", record.to_pgn());
    Ok(())
}

fn show_stats(config: &ArenaConfig, engine: Option<&str>) -> anyhow::Result<()> {
    let storage = Storage::open(&config.database)?;
    let ratings = RatingTable::from_games(&storage.decided_games()?);
    let stats = match engine {
        Some(name) => vec![storage.engine_stats(name)?],
        None => storage.all_stats()?,
    };
    if stats.is_empty() {
        println!("No games stored yet.");
        return Ok(());
    }

    println!(
        "{:<24} {:>6} {:>5} {:>5} {:>5} {:>6} {:>7} {:>6}  {}",
        "Engine", "Games", "W", "D", "L", "Errors", "Score", "Elo", "Tier"
    );
    for s in stats {
        let rating = ratings.rating(&s.engine);
        let score = s
            .score()
            .map(|v| format!("{:.1}%", v * 100.0))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<24} {:>6} {:>5} {:>5} {:>5} {:>6} {:>7} {:>6}  {}",
            s.engine, s.games, s.wins, s.draws, s.losses, s.engine_errors, score, rating, elo::tier(rating)
        );
    }
    Ok(())
}

fn list_games(
    config: &ArenaConfig,
    engine: Option<String>,
    search: Option<String>,
    limit: u32,
) -> anyhow::Result<()> {
    let storage = Storage::open(&config.database)?;
    let games = storage.list_games(&GameFilter {
        engine,
        search,
        limit: Some(limit),
    })?;
    for g in games {
        println!(
            "{}  {} {}  {} vs {}  {} {}  {} moves  {}",
            g.id,
            g.date,
            g.time,
            g.white,
            g.black,
            g.result,
            g.reason.as_deref().unwrap_or(""),
            g.move_count,
            g.opening.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

fn export_game(config: &ArenaConfig, id: &str, file: &Path) -> anyhow::Result<()> {
    let storage = Storage::open(&config.database)?;
    let Some(text) = storage.game_pgn(id)? else {
        bail!("no stored game with id {}", id);
    };
    std::fs::write(file, text).with_context(|| format!("writing {}", file.display()))?;
    println!("Wrote {}", file.display());
    Ok(())
}
