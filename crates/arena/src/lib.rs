//! Chess engine arena: runs games between UCI engines (or a person and an
//! engine), records the results and exports them.
//!
//! # Modules
//!
//! - [`uci_client`] - drives one engine process through the UCI protocol
//! - [`source`] - the [`source::MoveSource`] seam and its engine adapter
//! - [`human`] - a move source fed by a person through a handle
//! - [`game_runner`] - the match orchestrator, with pause and abort
//! - [`analysis`] - move grading by a separate analysis engine
//! - [`pgn`] - PGN export and import
//! - [`json_output`] - JSON export with engine search information
//! - [`storage`] - SQLite game store and per-engine statistics
//! - [`elo`] - ratings computed from stored games
//! - [`config`] - `arena.toml` loading

pub mod analysis;
pub mod config;
pub mod elo;
pub mod game_runner;
pub mod human;
pub mod json_output;
pub mod pgn;
pub mod source;
pub mod storage;
pub mod uci_client;
