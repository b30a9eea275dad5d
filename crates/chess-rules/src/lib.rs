//! Chess rules on a bitboard position.
//!
//! This crate provides:
//! - [`Bitboard`] - 64-bit square sets used for piece placement and attacks
//! - [`Position`] - piece placement plus side to move, castling, en passant and clocks
//! - [`Game`] - the authoritative game state with history and termination checks
//! - Legal move generation and validation in [`movegen`]
//! - SAN rendering and parsing in [`san`]
//!
//! # Example
//!
//! ```
//! use chess_rules::{Game, GameResult, Termination};
//! use chess_core::Color;
//!
//! let mut game = Game::new();
//! assert_eq!(game.legal_moves().len(), 20);
//!
//! for uci in ["f2f3", "e7e5", "g2g4"] {
//!     game.try_apply_uci(uci).unwrap();
//! }
//! let result = game.try_apply_san("Qh4#").unwrap();
//! assert_eq!(result, GameResult::win(Color::Black, Termination::Checkmate));
//! ```

mod bitboard;
mod game;
pub mod movegen;
mod position;
pub mod rules;
pub mod san;

pub use bitboard::Bitboard;
pub use game::{Game, GameError, HistoryEntry};
pub use movegen::{apply, find_legal, is_in_check, legal_moves, IllegalMove};
pub use position::{CastlingRights, Position, PositionError, PositionKey};
pub use rules::{evaluate, GameResult, Outcome, Termination};
pub use san::{move_to_san, san_to_move, SanError};
