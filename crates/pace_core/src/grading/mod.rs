//! Grade entry and retry history.
//!
//! # Responsibility
//! - Run the two-phase grade entry (grade, then optional note).
//! - Aggregate failed attempts for reporting.
//!
//! # Invariants
//! - Grades are within `0..=100`.
//! - History is append-only; ungrading never removes attempts.

pub mod flow;
pub mod history;
