//! Core placement and projection engine for paced curricula.
//! This crate is the single source of truth for placement invariants.

pub mod clock;
pub mod config;
pub mod draft;
pub mod grading;
pub mod grid;
pub mod logging;
pub mod model;
pub mod placement;
pub mod repo;
pub mod service;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, EngineConfig, SelectionMode};
pub use grid::transform::{build_grid, GridCell, GridRow, ProjectionGrid};
pub use logging::{
    default_log_level, flush_logs, init_logging, init_logging_with, logging_status, LogArea,
    LogSettings,
};
pub use model::catalog::{Catalog, CatalogEntry, CatalogError, Category, Lineage, Subject};
pub use model::placement::{GradeEntry, PaceStatus, PlacedUnit, Quarter, Slot};
pub use model::projection::{Projection, ProjectionSnapshot, ProjectionStatus, StudentSummary};
pub use placement::rules::PlacementRejection;
pub use placement::violation::OrderingViolation;
pub use repo::memory_store::InMemoryProjectionStore;
pub use repo::projection_store::{ProjectionStore, RemoteFailure, RemoteRejection, StoreError};
pub use service::draft_service::{DraftService, SubmitOutcome};
pub use service::error::ServiceError;
pub use service::projection_service::{AddOutcome, CommitOutcome, Mutation, ProjectionService};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
