//! Projection drafting: subject selection, available codes and expansion.
//!
//! # Responsibility
//! - Constrain which subjects may be combined in one draft.
//! - Expose pace codes per subject, optionally extended into next levels.
//! - Validate the wizard payload and expand it into planned placements.
//!
//! # Invariants
//! - A rejected selection never mutates the draft.
//! - Planned placements respect lineage ordering.

pub mod availability;
pub mod plan;
pub mod request;
pub mod selection;
