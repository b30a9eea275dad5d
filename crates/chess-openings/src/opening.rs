//! Core opening types.

use serde::{Deserialize, Serialize};

/// A named opening and the line that defines it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Opening {
    /// The ECO code for this opening (e.g., "B20", "C44"). May be empty.
    pub eco: String,
    /// The name of the opening.
    pub name: String,
    /// The sequence of moves in UCI notation.
    pub moves: Vec<String>,
}

impl Opening {
    /// Creates a new opening with the given ECO code, name, and moves.
    #[must_use]
    pub fn new(eco: impl Into<String>, name: impl Into<String>, moves: Vec<String>) -> Self {
        Self {
            eco: eco.into(),
            name: name.into(),
            moves,
        }
    }

    /// "C50 Italian Game", or just the name when there is no ECO code.
    #[must_use]
    pub fn label(&self) -> String {
        if self.eco.is_empty() {
            self.name.clone()
        } else {
            format!("{} {}", self.eco, self.name)
        }
    }

    /// True if this opening's line is a prefix of `uci_moves`.
    #[must_use]
    pub fn matches(&self, uci_moves: &[String]) -> bool {
        !self.moves.is_empty() && uci_moves.starts_with(&self.moves)
    }
}

/// One record of a JSON opening book, before its moves are resolved.
///
/// `moves` is whitespace separated and may mix UCI ("e2e4") and SAN
/// ("Nf3") tokens; move numbers such as "1." are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookEntry {
    #[serde(default, alias = "ECO")]
    pub eco: String,
    pub name: String,
    pub moves: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(moves: &[&str]) -> Vec<String> {
        moves.iter().map(|m| m.to_string()).collect()
    }

    #[test]
    fn test_opening_new() {
        let opening = Opening::new("C44", "King's Pawn Game", line(&["e2e4", "e7e5"]));
        assert_eq!(opening.eco, "C44");
        assert_eq!(opening.name, "King's Pawn Game");
        assert_eq!(opening.moves.len(), 2);
        assert_eq!(opening.label(), "C44 King's Pawn Game");
    }

    #[test]
    fn test_opening_matches_prefix() {
        let opening = Opening::new("B20", "Sicilian Defense", line(&["e2e4", "c7c5"]));
        assert!(opening.matches(&line(&["e2e4", "c7c5"])));
        assert!(opening.matches(&line(&["e2e4", "c7c5", "g1f3"])));
        assert!(!opening.matches(&line(&["e2e4"])));
        assert!(!opening.matches(&line(&["d2d4", "c7c5"])));
    }

    #[test]
    fn test_book_entry_accepts_uppercase_eco_key() {
        let entry: BookEntry =
            serde_json::from_str(r#"{"ECO": "A00", "name": "Grob", "moves": "g4"}"#).unwrap();
        assert_eq!(entry.eco, "A00");
        let entry: BookEntry = serde_json::from_str(r#"{"name": "Odd", "moves": "a3"}"#).unwrap();
        assert!(entry.eco.is_empty());
    }
}
