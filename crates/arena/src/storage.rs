//! SQLite storage for finished games and per-engine statistics.
//!
//! Every game is one row in `games`, PGN included, so a stored game can be
//! replayed or exported later. Statistics are aggregated from that table on
//! demand. Games that ended in an engine error or were aborted carry the
//! result `*` and never count as a win, draw or loss.

use std::path::Path;

use chess_rules::{Outcome, Termination};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::elo::DecidedGame;
use crate::game_runner::GameRecord;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A stored row holds a value this version cannot read.
    #[error("corrupt row for game {id}: {detail}")]
    CorruptRow { id: String, detail: String },
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Win/draw/loss counts for one engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    pub engine: String,
    /// Every stored game the engine took part in.
    pub games: u32,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    /// Games this engine ended by crashing, hanging or playing an illegal move.
    pub engine_errors: u32,
    pub aborted: u32,
}

impl EngineStats {
    /// Wins plus half the draws, over decided games.
    pub fn score(&self) -> Option<f64> {
        let decided = self.wins + self.draws + self.losses;
        if decided == 0 {
            return None;
        }
        Some((f64::from(self.wins) + f64::from(self.draws) / 2.0) / f64::from(decided))
    }
}

/// One row of the game list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameSummary {
    pub id: String,
    pub white: String,
    pub black: String,
    pub result: String,
    pub reason: Option<String>,
    pub date: String,
    pub time: String,
    pub move_count: u32,
    pub duration_seconds: f64,
    pub opening: Option<String>,
}

/// Narrows [`Storage::list_games`].
#[derive(Debug, Clone, Default)]
pub struct GameFilter {
    /// Only games this engine played, as either colour.
    pub engine: Option<String>,
    /// Case-insensitive match on engine names, opening, result, reason or date.
    pub search: Option<String>,
    pub limit: Option<u32>,
}

/// Drops a trailing colour marker such as " (White)" from an engine name, so
/// the same engine is counted once whichever side it played.
pub fn normalize_engine_name(name: &str) -> String {
    let trimmed = name.trim();
    for suffix in ["(white)", "(black)"] {
        let len = trimmed.len();
        if len >= suffix.len() && trimmed[len - suffix.len()..].eq_ignore_ascii_case(suffix) {
            return trimmed[..len - suffix.len()].trim_end().to_string();
        }
    }
    trimmed.to_string()
}

/// SQLite-backed game store.
///
/// # Example
///
/// ```no_run
/// use arena::storage::Storage;
///
/// let storage = Storage::open("arena.db")?;
/// let stats = storage.engine_stats("stockfish")?;
/// println!("{} games, {} wins", stats.games, stats.wins);
/// # Ok::<(), arena::storage::StorageError>(())
/// ```
pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// Opens or creates the database and its schema.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let storage = Self { conn };
        storage.init_schema()?;
        Ok(storage)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open(":memory:")
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS games (
                id TEXT PRIMARY KEY,
                white_engine TEXT NOT NULL,
                black_engine TEXT NOT NULL,
                result TEXT NOT NULL,
                reason TEXT,
                failed_engine TEXT,
                date TEXT NOT NULL,
                time TEXT NOT NULL,
                pgn TEXT NOT NULL,
                move_count INTEGER NOT NULL,
                duration_seconds REAL NOT NULL,
                opening TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS games_white ON games (white_engine);
            CREATE INDEX IF NOT EXISTS games_black ON games (black_engine);
            ",
        )?;
        Ok(())
    }

    /// Stores a finished game and returns its id.
    pub fn save_game(&self, record: &GameRecord) -> Result<String> {
        let white = normalize_engine_name(&record.white);
        let black = normalize_engine_name(&record.black);
        let failed = record
            .engine_failure
            .as_ref()
            .map(|f| normalize_engine_name(&f.engine));

        self.conn.execute(
            "INSERT INTO games (id, white_engine, black_engine, result, reason, failed_engine,
                                date, time, pgn, move_count, duration_seconds, opening, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                record.id,
                white,
                black,
                record.result.outcome.pgn_token(),
                record.result.reason.map(Termination::as_str),
                failed,
                record.started_at.format("%Y-%m-%d").to_string(),
                record.started_at.format("%H:%M:%S").to_string(),
                record.to_pgn(),
                record.moves.len() as i64,
                record.duration.as_secs_f64(),
                record.opening.as_ref().map(|o| o.label()),
                record.started_at.to_rfc3339(),
            ],
        )?;
        debug!(id = %record.id, %white, %black, "game stored");
        Ok(record.id.clone())
    }

    /// Aggregate counts for one engine. Unknown engines get zeros.
    ///
    /// A decisive game an engine played against itself is a win and a loss at
    /// once, so it counts towards `games` only. Drawn self-play games count
    /// as one draw.
    pub fn engine_stats(&self, engine: &str) -> Result<EngineStats> {
        let engine = normalize_engine_name(engine);
        let mut stmt = self.conn.prepare(
            "SELECT
                COUNT(*),
                SUM(CASE WHEN white_engine <> black_engine
                          AND ((white_engine = ?1 AND result = '1-0')
                            OR (black_engine = ?1 AND result = '0-1')) THEN 1 ELSE 0 END),
                SUM(CASE WHEN result = '1/2-1/2' THEN 1 ELSE 0 END),
                SUM(CASE WHEN white_engine <> black_engine
                          AND ((white_engine = ?1 AND result = '0-1')
                            OR (black_engine = ?1 AND result = '1-0')) THEN 1 ELSE 0 END),
                SUM(CASE WHEN reason = 'engine-error' AND failed_engine = ?1 THEN 1 ELSE 0 END),
                SUM(CASE WHEN reason = 'aborted' THEN 1 ELSE 0 END)
             FROM games WHERE white_engine = ?1 OR black_engine = ?1",
        )?;

        let stats = stmt.query_row([&engine], |row| {
            Ok(EngineStats {
                engine: engine.clone(),
                games: row.get::<_, Option<u32>>(0)?.unwrap_or(0),
                wins: row.get::<_, Option<u32>>(1)?.unwrap_or(0),
                draws: row.get::<_, Option<u32>>(2)?.unwrap_or(0),
                losses: row.get::<_, Option<u32>>(3)?.unwrap_or(0),
                engine_errors: row.get::<_, Option<u32>>(4)?.unwrap_or(0),
                aborted: row.get::<_, Option<u32>>(5)?.unwrap_or(0),
            })
        })?;
        Ok(stats)
    }

    /// Every engine that appears in the store, alphabetically.
    pub fn engines(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT white_engine FROM games UNION SELECT black_engine FROM games ORDER BY 1",
        )?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }

    pub fn all_stats(&self) -> Result<Vec<EngineStats>> {
        self.engines()?
            .iter()
            .map(|engine| self.engine_stats(engine))
            .collect()
    }

    /// Stored games, newest first.
    pub fn list_games(&self, filter: &GameFilter) -> Result<Vec<GameSummary>> {
        let engine = filter.engine.as_deref().map(normalize_engine_name);
        let search = filter
            .search
            .as_ref()
            .map(|text| format!("%{}%", text.to_lowercase()));
        let limit = filter.limit.map_or(-1, i64::from);

        let mut stmt = self.conn.prepare(
            "SELECT id, white_engine, black_engine, result, reason, date, time,
                    move_count, duration_seconds, opening
             FROM games
             WHERE (?1 IS NULL OR white_engine = ?1 OR black_engine = ?1)
               AND (?2 IS NULL
                    OR lower(white_engine) LIKE ?2
                    OR lower(black_engine) LIKE ?2
                    OR lower(COALESCE(opening, '')) LIKE ?2
                    OR result LIKE ?2
                    OR lower(COALESCE(reason, '')) LIKE ?2
                    OR date LIKE ?2)
             ORDER BY created_at DESC
             LIMIT ?3",
        )?;

        let games = stmt
            .query_map(params![engine, search, limit], |row| {
                Ok(GameSummary {
                    id: row.get(0)?,
                    white: row.get(1)?,
                    black: row.get(2)?,
                    result: row.get(3)?,
                    reason: row.get(4)?,
                    date: row.get(5)?,
                    time: row.get(6)?,
                    move_count: row.get(7)?,
                    duration_seconds: row.get(8)?,
                    opening: row.get(9)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(games)
    }

    /// The stored PGN of a game, for replay or export.
    pub fn game_pgn(&self, id: &str) -> Result<Option<String>> {
        let pgn = self
            .conn
            .query_row("SELECT pgn FROM games WHERE id = ?1", [id], |row| row.get(0))
            .optional()?;
        Ok(pgn)
    }

    /// Games with a chess result, oldest first.
    pub fn decided_games(&self) -> Result<Vec<DecidedGame>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, white_engine, black_engine, result FROM games
             WHERE result IN ('1-0', '0-1', '1/2-1/2')
             ORDER BY created_at ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, white, black, token)| -> Result<DecidedGame> {
                let outcome = Outcome::from_pgn_token(&token).ok_or_else(|| StorageError::CorruptRow {
                    id: id.clone(),
                    detail: format!("result '{}'", token),
                })?;
                Ok(DecidedGame {
                    white,
                    black,
                    outcome,
                })
            })
            .collect()
    }
}
