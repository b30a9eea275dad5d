//! Core types for chess.
//!
//! This crate provides the vocabulary shared by the rules engine, the UCI
//! driver and the arena:
//! - [`Piece`], [`PieceKind`] and [`Color`]
//! - [`Square`], [`File`], and [`Rank`] for board coordinates
//! - [`Move`] and its [`MoveFlag`]
//! - FEN parsing and formatting

mod color;
mod fen;
mod mov;
mod piece;
mod square;

pub use color::Color;
pub use fen::{FenCastling, FenError, FenRecord, STARTPOS_FEN};
pub use mov::{Move, MoveFlag};
pub use piece::{Piece, PieceKind};
pub use square::{File, Rank, Square};
