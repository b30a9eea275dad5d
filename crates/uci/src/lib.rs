//! UCI (Universal Chess Interface) wire codec.
//!
//! Commands a GUI sends to an engine are [`GuiCommand`]s; lines an engine
//! writes back are parsed into [`EngineMessage`]s.
//!
//! # Commands
//!
//! - `uci` / `uciok` - Handshake, with `id name` and `id author` in between
//! - `isready` / `readyok` - Synchronization
//! - `ucinewgame` - The next search belongs to a different game
//! - `position [startpos | fen <fen>] [moves <move>...]` - Set position
//! - `go [movetime <ms>] [depth <d>] [nodes <n>] [infinite]` - Start search
//! - `stop` - Stop search, the engine still answers with `bestmove`
//! - `quit` - Exit engine

mod command;
mod info;

pub use command::{GoOptions, GuiCommand};
pub use info::{EngineInfo, Score};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UciError {
    /// A recognised keyword with a payload that does not fit it.
    #[error("Parse error: {0}")]
    ParseError(String),
    /// A `bestmove` whose move is not UCI move syntax.
    #[error("Invalid move in bestmove: {0}")]
    InvalidMove(String),
}

/// Messages sent from engine to GUI.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineMessage {
    /// Engine identification.
    Id { name: Option<String>, author: Option<String> },
    /// UCI initialization complete.
    UciOk,
    /// Engine is ready.
    ReadyOk,
    /// Option declaration, kept only by name.
    Option { name: String },
    /// Search information.
    Info(EngineInfo),
    /// Best move found. `mv` is `None` when the engine reports it has no move.
    BestMove { mv: Option<String>, ponder: Option<String> },
    /// Anything else an engine prints (banners, debug output).
    Unknown(String),
}

/// Tokens engines use in `bestmove` for "no legal move".
const NO_MOVE_TOKENS: [&str; 3] = ["(none)", "0000", "null"];

impl EngineMessage {
    /// Parse one line of engine output.
    ///
    /// Unrecognised lines are returned as [`EngineMessage::Unknown`] rather
    /// than as errors.
    pub fn parse(line: &str) -> Result<Self, UciError> {
        let line = line.trim();
        let mut parts = line.split_whitespace();

        match parts.next().unwrap_or("") {
            "uciok" => Ok(EngineMessage::UciOk),
            "readyok" => Ok(EngineMessage::ReadyOk),
            "id" => Self::parse_id(line, parts.next()),
            "option" => Self::parse_option(line),
            "info" => Ok(EngineMessage::Info(EngineInfo::parse(line).unwrap_or_default())),
            "bestmove" => Self::parse_bestmove(line, parts),
            _ => Ok(EngineMessage::Unknown(line.to_string())),
        }
    }

    fn parse_id(line: &str, field: Option<&str>) -> Result<Self, UciError> {
        let value = |key: &str| {
            line.split_once(key)
                .map(|(_, rest)| rest.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        match field {
            Some("name") => Ok(EngineMessage::Id {
                name: value("name"),
                author: None,
            }),
            Some("author") => Ok(EngineMessage::Id {
                name: None,
                author: value("author"),
            }),
            _ => Err(UciError::ParseError(format!("Expected 'id name' or 'id author', got '{}'", line))),
        }
    }

    fn parse_option(line: &str) -> Result<Self, UciError> {
        let rest = line
            .split_once(" name ")
            .map(|(_, rest)| rest)
            .ok_or_else(|| UciError::ParseError(format!("Option without name: '{}'", line)))?;
        let name = match rest.find(" type ") {
            Some(idx) => &rest[..idx],
            None => rest,
        };
        Ok(EngineMessage::Option {
            name: name.trim().to_string(),
        })
    }

    fn parse_bestmove<'a>(
        line: &str,
        mut parts: impl Iterator<Item = &'a str>,
    ) -> Result<Self, UciError> {
        let mv = parts
            .next()
            .ok_or_else(|| UciError::ParseError(format!("bestmove without a move: '{}'", line)))?;
        let mv = if NO_MOVE_TOKENS.contains(&mv) {
            None
        } else if is_move_syntax(mv) {
            Some(mv.to_string())
        } else {
            return Err(UciError::InvalidMove(mv.to_string()));
        };

        let ponder = match (parts.next(), parts.next()) {
            (Some("ponder"), Some(p)) if is_move_syntax(p) => Some(p.to_string()),
            _ => None,
        };

        Ok(EngineMessage::BestMove { mv, ponder })
    }
}

/// `<file><rank><file><rank>[promotion]` in lowercase coordinates.
fn is_move_syntax(s: &str) -> bool {
    let b = s.as_bytes();
    let square = |f: u8, r: u8| (b'a'..=b'h').contains(&f) && (b'1'..=b'8').contains(&r);
    match b.len() {
        4 => square(b[0], b[1]) && square(b[2], b[3]),
        5 => square(b[0], b[1]) && square(b[2], b[3]) && matches!(b[4], b'q' | b'r' | b'b' | b'n'),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_handshake_lines() {
        assert_eq!(EngineMessage::parse("uciok\n").unwrap(), EngineMessage::UciOk);
        assert_eq!(EngineMessage::parse("readyok").unwrap(), EngineMessage::ReadyOk);
        assert_eq!(
            EngineMessage::parse("id name Stockfish 16.1").unwrap(),
            EngineMessage::Id {
                name: Some("Stockfish 16.1".to_string()),
                author: None
            }
        );
        assert_eq!(
            EngineMessage::parse("id author the Stockfish developers").unwrap(),
            EngineMessage::Id {
                name: None,
                author: Some("the Stockfish developers".to_string())
            }
        );
        assert!(EngineMessage::parse("id").is_err());
    }

    #[test]
    fn parse_option_name() {
        assert_eq!(
            EngineMessage::parse("option name Skill Level type spin default 20 min 0 max 20").unwrap(),
            EngineMessage::Option {
                name: "Skill Level".to_string()
            }
        );
    }

    #[test]
    fn parse_bestmove() {
        assert_eq!(
            EngineMessage::parse("bestmove e2e4 ponder e7e5").unwrap(),
            EngineMessage::BestMove {
                mv: Some("e2e4".to_string()),
                ponder: Some("e7e5".to_string())
            }
        );
        assert_eq!(
            EngineMessage::parse("bestmove a7a8q").unwrap(),
            EngineMessage::BestMove {
                mv: Some("a7a8q".to_string()),
                ponder: None
            }
        );
    }

    #[test]
    fn parse_bestmove_without_move() {
        for line in ["bestmove (none)", "bestmove 0000", "bestmove null"] {
            assert_eq!(
                EngineMessage::parse(line).unwrap(),
                EngineMessage::BestMove { mv: None, ponder: None }
            );
        }
    }

    #[test]
    fn malformed_bestmove_is_an_error() {
        assert!(matches!(
            EngineMessage::parse("bestmove"),
            Err(UciError::ParseError(_))
        ));
        assert_eq!(
            EngineMessage::parse("bestmove e9e4"),
            Err(UciError::InvalidMove("e9e4".to_string()))
        );
        assert_eq!(
            EngineMessage::parse("bestmove Nf3"),
            Err(UciError::InvalidMove("Nf3".to_string()))
        );
    }

    #[test]
    fn unknown_lines_pass_through() {
        let line = "Stockfish 16 by the Stockfish developers";
        assert_eq!(
            EngineMessage::parse(line).unwrap(),
            EngineMessage::Unknown(line.to_string())
        );
    }
}
