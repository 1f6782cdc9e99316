//! Placement rules for adding, moving, deleting and ungrading units.
//!
//! # Responsibility
//! - Pre-validate unit mutations against the curriculum ordering invariant.
//! - Guard against duplicate codes and quarter overload.
//! - Describe ordering conflicts in a structured, localizable form.
//!
//! # Invariants
//! - Within a lineage, a lower `order_index` never sits chronologically
//!   after a higher one.
//! - Validation is side-effect free; a rejection leaves state untouched.

pub mod guard;
pub mod rules;
pub mod violation;
