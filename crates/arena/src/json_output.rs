//! JSON export of a finished game, with the engine search information behind
//! each move.

use std::path::Path;

use chess_core::Color;
use chess_openings::Opening;
use serde::Serialize;

use crate::game_runner::{GameRecord, MoveRecord};

/// JSON representation of a complete game.
#[derive(Serialize)]
struct GameJson<'a> {
    id: &'a str,
    white: &'a str,
    black: &'a str,
    /// PGN result token: "1-0", "0-1", "1/2-1/2" or "*".
    result: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    engine_error: Option<EngineErrorJson<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_fen: Option<&'a str>,
    final_fen: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    opening: Option<&'a Opening>,
    moves: &'a [MoveRecord],
    started_at: String,
    duration_ms: u64,
}

#[derive(Serialize)]
struct EngineErrorJson<'a> {
    color: &'static str,
    engine: &'a str,
    message: &'a str,
}

/// Renders a game record as pretty-printed JSON.
///
/// ```json
/// {
///   "id": "6f1c...",
///   "white": "Engine A",
///   "black": "Engine B",
///   "result": "1-0",
///   "reason": "checkmate",
///   "final_fen": "...",
///   "moves": [
///     { "ply": 1, "uci": "e2e4", "san": "e4", "fen": "...", "think_ms": 1002,
///       "search": { "depth": 20, "score": { "cp": 35 }, "pv": ["e2e4", "e7e5"] },
///       "quality": "Best", "eval_cp": 28 }
///   ],
///   "started_at": "2024-01-15T12:00:00+01:00",
///   "duration_ms": 81234
/// }
/// ```
pub fn to_json(record: &GameRecord) -> serde_json::Result<String> {
    let json = GameJson {
        id: &record.id,
        white: &record.white,
        black: &record.black,
        result: record.result.outcome.pgn_token(),
        reason: record.result.reason.map(|r| r.as_str()),
        engine_error: record.engine_failure.as_ref().map(|f| EngineErrorJson {
            color: match f.color {
                Color::White => "white",
                Color::Black => "black",
            },
            engine: &f.engine,
            message: &f.message,
        }),
        start_fen: record.start_fen.as_deref(),
        final_fen: &record.final_fen,
        opening: record.opening.as_ref(),
        moves: &record.moves,
        started_at: record.started_at.to_rfc3339(),
        duration_ms: u64::try_from(record.duration.as_millis()).unwrap_or(u64::MAX),
    };
    serde_json::to_string_pretty(&json)
}

/// Writes a game record to a JSON file.
pub fn write_json<P: AsRef<Path>>(path: P, record: &GameRecord) -> std::io::Result<()> {
    let json = to_json(record)?;
    std::fs::write(path, json)
}
