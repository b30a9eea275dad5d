//! Opening book storage and lookup.

use std::path::Path;

use chess_rules::Game;
use thiserror::Error;

use crate::opening::{BookEntry, Opening};

/// Errors that can occur when working with opening books.
#[derive(Debug, Error)]
pub enum OpeningError {
    /// A book line contains a token that is not a legal move at that point.
    #[error("opening '{name}': cannot play '{token}' after {played} moves")]
    UnplayableLine {
        name: String,
        token: String,
        played: usize,
    },

    /// Failed to read the opening book file.
    #[error("failed to read opening book: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// A collection of named openings searched by longest matching line.
#[derive(Debug, Clone, Default)]
pub struct OpeningBook {
    /// Kept sorted longest line first; equal lengths keep insertion order.
    openings: Vec<Opening>,
    skipped: usize,
}

impl OpeningBook {
    /// Creates a new empty opening book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a book from openings whose moves are already UCI.
    #[must_use]
    pub fn with_openings(openings: Vec<Opening>) -> Self {
        let mut book = Self::new();
        for opening in openings {
            book.add(opening);
        }
        book
    }

    /// The built-in table of common openings.
    #[must_use]
    pub fn builtin() -> Self {
        Self::with_openings(crate::builtin::builtin_openings())
    }

    /// Reads a JSON array of [`BookEntry`] records from `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, OpeningError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parses a JSON array of [`BookEntry`] records.
    ///
    /// Entries whose line cannot be played from the starting position are
    /// skipped and counted in [`OpeningBook::skipped`].
    pub fn from_json(text: &str) -> Result<Self, OpeningError> {
        let entries: Vec<BookEntry> = serde_json::from_str(text)?;
        let mut book = Self::new();
        for entry in entries {
            match resolve_entry(&entry) {
                Ok(opening) => book.add(opening),
                Err(_) => book.skipped += 1,
            }
        }
        Ok(book)
    }

    /// Returns the number of openings in the book.
    #[must_use]
    pub fn len(&self) -> usize {
        self.openings.len()
    }

    /// Returns true if the book contains no openings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.openings.is_empty()
    }

    /// Number of entries dropped while loading because their line was not
    /// playable.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Adds an opening. Openings without moves are ignored since they would
    /// match every game.
    pub fn add(&mut self, opening: Opening) {
        if opening.moves.is_empty() {
            return;
        }
        let at = self
            .openings
            .partition_point(|o| o.moves.len() >= opening.moves.len());
        self.openings.insert(at, opening);
    }

    /// Adds every opening of `other`.
    pub fn extend(&mut self, other: OpeningBook) {
        self.skipped += other.skipped;
        for opening in other.openings {
            self.add(opening);
        }
    }

    /// Returns all openings, longest line first.
    #[must_use]
    pub fn all(&self) -> &[Opening] {
        &self.openings
    }

    /// The opening with the longest line that is a prefix of `uci_moves`.
    #[must_use]
    pub fn lookup(&self, uci_moves: &[String]) -> Option<&Opening> {
        self.openings.iter().find(|o| o.matches(uci_moves))
    }

    /// Finds all openings matching an ECO code prefix.
    ///
    /// For example, `by_eco("C5")` would match "C50", "C51", etc.
    #[must_use]
    pub fn by_eco(&self, eco_prefix: &str) -> Vec<&Opening> {
        self.openings
            .iter()
            .filter(|o| o.eco.starts_with(eco_prefix))
            .collect()
    }

    /// Searches for openings by name (case-insensitive substring match).
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<&Opening> {
        let query_lower = query.to_lowercase();
        self.openings
            .iter()
            .filter(|o| o.name.to_lowercase().contains(&query_lower))
            .collect()
    }
}

/// Plays an entry's tokens from the starting position and returns the
/// opening with its line in UCI form.
pub fn resolve_entry(entry: &BookEntry) -> Result<Opening, OpeningError> {
    let mut game = Game::new();
    let mut moves = Vec::new();

    for raw in entry.moves.split_whitespace() {
        let Some(token) = strip_move_number(raw) else {
            continue;
        };
        let played = if looks_like_uci(token) {
            game.try_apply_uci(token).or_else(|_| game.try_apply_san(token))
        } else {
            game.try_apply_san(token)
        };
        if played.is_err() {
            return Err(OpeningError::UnplayableLine {
                name: entry.name.clone(),
                token: raw.to_string(),
                played: moves.len(),
            });
        }
        if let Some(last) = game.history().last() {
            moves.push(last.mv.to_uci());
        }
    }

    Ok(Opening::new(entry.eco.trim(), entry.name.trim(), moves))
}

/// "1.e4" -> "e4", "3..." -> None, "Nf3" and "0-0" unchanged.
fn strip_move_number(token: &str) -> Option<&str> {
    let digits = token.len() - token.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 || !token[digits..].starts_with('.') {
        return Some(token);
    }
    let rest = token[digits..].trim_start_matches('.');
    (!rest.is_empty()).then_some(rest)
}

fn looks_like_uci(token: &str) -> bool {
    chess_core::Move::from_uci(token).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn line(moves: &[&str]) -> Vec<String> {
        moves.iter().map(|m| m.to_string()).collect()
    }

    fn create_test_openings() -> Vec<Opening> {
        vec![
            Opening::new("C20", "King's Pawn Game", line(&["e2e4", "e7e5"])),
            Opening::new(
                "C50",
                "Italian Game",
                line(&["e2e4", "e7e5", "g1f3", "b8c6", "f1c4"]),
            ),
            Opening::new("B20", "Sicilian Defense", line(&["e2e4", "c7c5"])),
            Opening::new("C00", "French Defense", line(&["e2e4", "e7e6"])),
            Opening::new("D06", "Queen's Gambit", line(&["d2d4", "d7d5", "c2c4"])),
        ]
    }

    #[test]
    fn test_empty_book() {
        let book = OpeningBook::new();
        assert!(book.is_empty());
        assert_eq!(book.lookup(&line(&["e2e4"])), None);
    }

    #[test]
    fn test_lookup_prefers_longest_line() {
        let book = OpeningBook::with_openings(create_test_openings());
        assert_eq!(book.len(), 5);

        let played = line(&["e2e4", "e7e5", "g1f3", "b8c6", "f1c4", "f8c5"]);
        assert_eq!(book.lookup(&played).unwrap().name, "Italian Game");

        let played = line(&["e2e4", "e7e5", "g1f3"]);
        assert_eq!(book.lookup(&played).unwrap().name, "King's Pawn Game");

        assert_eq!(book.lookup(&line(&["e2e4"])), None);
        assert_eq!(book.lookup(&[]), None);
    }

    #[test]
    fn test_all_is_sorted_longest_first() {
        let book = OpeningBook::with_openings(create_test_openings());
        let lengths: Vec<usize> = book.all().iter().map(|o| o.moves.len()).collect();
        assert_eq!(lengths, vec![5, 3, 2, 2, 2]);
        // Equal lengths keep insertion order
        assert_eq!(book.all()[2].name, "King's Pawn Game");
    }

    #[test]
    fn test_by_eco_and_search() {
        let book = OpeningBook::with_openings(create_test_openings());
        assert_eq!(book.by_eco("C").len(), 3);
        assert_eq!(book.by_eco("C50")[0].name, "Italian Game");
        assert!(book.by_eco("E").is_empty());

        assert_eq!(book.search("defense").len(), 2);
        assert_eq!(book.search("QUEEN")[0].eco, "D06");
        assert_eq!(book.search("").len(), 5);
    }

    #[test]
    fn test_resolve_san_and_uci_tokens() {
        let entry = BookEntry {
            eco: "C50".to_string(),
            name: "Italian Game".to_string(),
            moves: "1.e4 e5 2. Nf3 Nc6 f1c4".to_string(),
        };
        let opening = resolve_entry(&entry).unwrap();
        assert_eq!(
            opening.moves,
            line(&["e2e4", "e7e5", "g1f3", "b8c6", "f1c4"])
        );
    }

    #[test]
    fn test_move_numbers_are_ignored() {
        assert_eq!(strip_move_number("12.Nf3"), Some("Nf3"));
        assert_eq!(strip_move_number("3..."), None);
        assert_eq!(strip_move_number("0-0"), Some("0-0"));
        assert_eq!(strip_move_number("e4"), Some("e4"));
    }

    #[test]
    fn test_resolve_rejects_unplayable_line() {
        let entry = BookEntry {
            eco: String::new(),
            name: "Broken".to_string(),
            moves: "e4 e5 Ke3".to_string(),
        };
        match resolve_entry(&entry) {
            Err(OpeningError::UnplayableLine { token, played, .. }) => {
                assert_eq!(token, "Ke3");
                assert_eq!(played, 2);
            }
            other => panic!("expected UnplayableLine, got {:?}", other),
        }
    }

    #[test]
    fn test_from_json_skips_bad_entries() {
        let json = r#"[
            {"eco": "B20", "name": "Sicilian Defense", "moves": "e4 c5"},
            {"eco": "A00", "name": "Nonsense", "moves": "e4 e4"},
            {"ECO": "B01", "name": "Scandinavian Defense", "moves": "e2e4 d7d5"}
        ]"#;
        let book = OpeningBook::from_json(json).unwrap();
        assert_eq!(book.len(), 2);
        assert_eq!(book.skipped(), 1);
        let found = book.lookup(&line(&["e2e4", "d7d5", "e4d5"])).unwrap();
        assert_eq!(found.label(), "B01 Scandinavian Defense");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"eco": "A10", "name": "English Opening", "moves": "c4"}}]"#
        )
        .unwrap();
        let book = OpeningBook::load(file.path()).unwrap();
        assert_eq!(book.len(), 1);
        assert_eq!(book.all()[0].moves, line(&["c2c4"]));
    }

    #[test]
    fn test_load_errors() {
        assert!(matches!(
            OpeningBook::load("/nonexistent/openings.json"),
            Err(OpeningError::IoError(_))
        ));
        assert!(matches!(
            OpeningBook::from_json("{not json"),
            Err(OpeningError::JsonError(_))
        ));
    }

    #[test]
    fn test_extend_merges_order() {
        let mut book = OpeningBook::with_openings(vec![Opening::new(
            "B20",
            "Sicilian Defense",
            line(&["e2e4", "c7c5"]),
        )]);
        book.extend(OpeningBook::with_openings(vec![Opening::new(
            "B27",
            "Sicilian Defense: Hyperaccelerated",
            line(&["e2e4", "c7c5", "g1f3", "g7g6"]),
        )]));
        let played = line(&["e2e4", "c7c5", "g1f3", "g7g6", "d2d4"]);
        assert_eq!(book.lookup(&played).unwrap().eco, "B27");
    }
}
