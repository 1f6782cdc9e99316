//! Category x week grid projection of placed units.
//!
//! # Responsibility
//! - Turn a flat unit list into the quarter/row/week structure the
//!   presentation layer renders.
//!
//! # Invariants
//! - The transform is pure and never overwrites a cell.
//! - Every unit with a valid position and a resolvable catalog entry appears
//!   in exactly one cell.

pub mod transform;
