//! PGN (Portable Game Notation) export and import.
//!
//! Games are written with the seven-tag roster (Event, Site, Date, Round,
//! White, Black, Result), optional ECO/Opening/Termination tags and, for
//! games that did not start from the standard position, SetUp/FEN. Movetext
//! is SAN derived from each history entry's position before the move, and is
//! wrapped at 80 columns.

use std::io::Write;
use std::path::Path;

use chess_core::Color;
use chess_openings::Opening;
use chess_rules::{move_to_san, Game, GameError, GameResult, HistoryEntry, Position, PositionError};
use thiserror::Error;

use crate::game_runner::GameRecord;

const LINE_WIDTH: usize = 80;

/// Errors from reading PGN text.
#[derive(Error, Debug)]
pub enum PgnError {
    /// The FEN tag does not describe a valid position.
    #[error("invalid FEN tag: {0}")]
    InvalidFen(#[from] PositionError),

    /// A movetext token could not be played.
    #[error("move {ply} ({san}) cannot be played: {source}")]
    BadMove {
        ply: usize,
        san: String,
        #[source]
        source: GameError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Tag values for one game.
#[derive(Debug, Clone, PartialEq)]
pub struct PgnMetadata {
    pub event: String,
    pub site: String,
    /// `YYYY.MM.DD`, with `??` for unknown parts.
    pub date: String,
    pub round: String,
    pub white: String,
    pub black: String,
    pub result: GameResult,
    pub opening: Option<Opening>,
}

impl PgnMetadata {
    pub fn from_record(record: &GameRecord) -> Self {
        Self {
            event: record.event.clone(),
            site: record.site.clone(),
            date: record.started_at.format("%Y.%m.%d").to_string(),
            round: record.round.clone(),
            white: record.white.clone(),
            black: record.black.clone(),
            result: record.result,
            opening: record.opening.clone(),
        }
    }

    fn tags(&self, start: Option<&Position>) -> Vec<(&'static str, String)> {
        let mut tags = vec![
            ("Event", self.event.clone()),
            ("Site", self.site.clone()),
            ("Date", self.date.clone()),
            ("Round", self.round.clone()),
            ("White", self.white.clone()),
            ("Black", self.black.clone()),
            ("Result", self.result.outcome.pgn_token().to_string()),
        ];
        if let Some(opening) = &self.opening {
            if !opening.eco.is_empty() {
                tags.push(("ECO", opening.eco.clone()));
            }
            tags.push(("Opening", opening.name.clone()));
        }
        if let Some(reason) = self.result.reason {
            tags.push(("Termination", reason.to_string()));
        }
        if let Some(position) = start {
            tags.push(("SetUp", "1".to_string()));
            tags.push(("FEN", position.to_fen()));
        }
        tags
    }
}

/// Serializes a game from its history. SAN is computed from each entry's
/// position before the move.
pub fn serialize(game: &Game, metadata: &PgnMetadata) -> String {
    let sans: Vec<String> = game
        .history()
        .iter()
        .map(|HistoryEntry { before, mv, .. }| move_to_san(before, *mv))
        .collect();
    let start = game.start_fen().map(|_| game.start_position());
    render(metadata, start, game.start_position(), &sans)
}

/// Serializes a finished game record.
pub fn to_pgn(record: &GameRecord) -> String {
    let metadata = PgnMetadata::from_record(record);
    let custom = record
        .start_fen
        .as_deref()
        .and_then(|fen| Position::from_fen(fen).ok());
    let start = custom.clone().unwrap_or_else(Position::startpos);
    render(&metadata, custom.as_ref(), &start, &record.san_moves())
}

/// Writes a finished game record to a PGN file.
pub fn write_pgn<P: AsRef<Path>>(path: P, record: &GameRecord) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(to_pgn(record).as_bytes())
}

fn render(metadata: &PgnMetadata, custom_start: Option<&Position>, start: &Position, sans: &[String]) -> String {
    let mut out = String::new();
    for (name, value) in metadata.tags(custom_start) {
        out.push_str(&format!("[{} \"{}\"]\n", name, escape(&value)));
    }
    out.push('\n');

    let mut tokens = Vec::with_capacity(sans.len() * 3 / 2 + 1);
    let mut number = start.fullmove_number();
    let mut to_move = start.side_to_move();
    for (i, san) in sans.iter().enumerate() {
        match to_move {
            Color::White => tokens.push(format!("{}.", number)),
            Color::Black if i == 0 => tokens.push(format!("{}...", number)),
            Color::Black => {}
        }
        tokens.push(san.clone());
        if to_move == Color::Black {
            number += 1;
        }
        to_move = to_move.opposite();
    }
    tokens.push(metadata.result.outcome.pgn_token().to_string());

    for line in wrap(&tokens, LINE_WIDTH) {
        out.push_str(&line);
        out.push('\n');
    }
    out
}

/// Greedy wrap on token boundaries. A token longer than `width` gets its
/// own line.
fn wrap(tokens: &[String], width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    for token in tokens {
        if !line.is_empty() && line.len() + 1 + token.len() > width {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(token);
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Reads the `[Name "value"]` tag pairs at the top of a PGN text.
pub fn parse_tags(text: &str) -> Vec<(String, String)> {
    let mut tags = Vec::new();
    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            if tags.is_empty() {
                continue;
            }
            break;
        }
        let Some(inner) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) else {
            break;
        };
        let Some((name, rest)) = inner.split_once(char::is_whitespace) else {
            continue;
        };
        let rest = rest.trim();
        let Some(quoted) = rest.strip_prefix('"').and_then(|r| r.strip_suffix('"')) else {
            continue;
        };
        tags.push((name.to_string(), unescape(quoted)));
    }
    tags
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// The SAN tokens of the movetext, without move numbers, comments,
/// variations, NAGs or the result token.
pub fn movetext_tokens(text: &str) -> Vec<String> {
    let body: String = text
        .lines()
        .filter(|line| !line.trim_start().starts_with('['))
        .map(|line| match line.find(';') {
            Some(i) => &line[..i],
            None => line,
        })
        .collect::<Vec<_>>()
        .join(" ");

    let mut cleaned = String::with_capacity(body.len());
    let mut in_comment = false;
    let mut variation_depth = 0usize;
    for c in body.chars() {
        match c {
            '{' if variation_depth == 0 => in_comment = true,
            '}' if in_comment => in_comment = false,
            _ if in_comment => {}
            '(' => variation_depth += 1,
            ')' => variation_depth = variation_depth.saturating_sub(1),
            _ if variation_depth > 0 => {}
            _ => cleaned.push(c),
        }
    }

    cleaned
        .split_whitespace()
        .filter_map(|token| {
            let token = strip_move_number(token);
            if token.is_empty()
                || token.starts_with('$')
                || matches!(token, "1-0" | "0-1" | "1/2-1/2" | "*")
            {
                None
            } else {
                Some(token.to_string())
            }
        })
        .collect()
}

/// "12." and "12..." vanish, "1.e4" becomes "e4".
fn strip_move_number(token: &str) -> &str {
    let digits = token.len() - token.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits > 0 && token[digits..].starts_with('.') {
        token[digits..].trim_start_matches('.')
    } else {
        token
    }
}

/// Rebuilds a game from PGN text, honouring a FEN tag.
pub fn replay(text: &str) -> Result<Game, PgnError> {
    let tags = parse_tags(text);
    let mut game = match tags.iter().find(|(name, _)| name == "FEN") {
        Some((_, fen)) => Game::from_fen(fen)?,
        None => Game::new(),
    };
    for (i, san) in movetext_tokens(text).into_iter().enumerate() {
        if let Err(source) = game.try_apply_san(&san) {
            return Err(PgnError::BadMove {
                ply: i + 1,
                san,
                source,
            });
        }
    }
    Ok(game)
}
