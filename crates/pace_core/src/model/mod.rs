//! Domain model for curriculum catalogs and student projections.
//!
//! # Responsibility
//! - Define the catalog reference data (categories, subjects, pace entries).
//! - Define placed units and the projection aggregate that owns them.
//!
//! # Invariants
//! - Catalog `order_index` values never change after authoring.
//! - A unit's position is always a valid `(Quarter, week 1..=9)` pair once
//!   it has passed snapshot normalization.

pub mod catalog;
pub mod placement;
pub mod projection;
