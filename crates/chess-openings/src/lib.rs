//! Chess opening book loading and lookup.
//!
//! A book maps move sequences to named openings. Lookups take the moves
//! played so far in UCI form and return the longest book line that is a
//! prefix of them. Books can be loaded from JSON, where lines may be written
//! in UCI or SAN, and a built-in table of common openings is included.

pub mod builtin;
pub mod database;
pub mod opening;

pub use database::{OpeningBook, OpeningError};
pub use opening::{BookEntry, Opening};

/// Something that can name the opening of a game in progress.
///
/// A miss is `None`, never an error.
pub trait OpeningLookup: Send + Sync {
    /// Finds the most specific opening whose line starts `uci_moves`.
    fn lookup(&self, uci_moves: &[String]) -> Option<&Opening>;
}

impl OpeningLookup for OpeningBook {
    fn lookup(&self, uci_moves: &[String]) -> Option<&Opening> {
        OpeningBook::lookup(self, uci_moves)
    }
}
