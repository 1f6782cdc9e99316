//! Projection store contract.
//!
//! # Responsibility
//! - Define the remote operations the engine commits mutations through.
//! - Translate remote failures into typed rejections at one boundary.
//!
//! # Invariants
//! - The store re-validates every mutation and is authoritative.
//! - Free-text error parsing happens only in `RemoteFailure::classify`.

use crate::draft::request::DraftRequest;
use crate::model::catalog::CatalogEntryId;
use crate::model::placement::{Quarter, UnitId};
use crate::model::projection::{ProjectionId, ProjectionSnapshot, ProjectionStatus};
use crate::placement::violation::OrderingViolation;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Result type used by projection store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Failure envelope returned by the store for a rejected mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFailure {
    /// Stable machine-readable code.
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub retryable: bool,
    /// Structured ordering violation, when the store provides one.
    #[serde(default)]
    pub violation: Option<OrderingViolation>,
}

impl RemoteFailure {
    pub fn new(code: impl Into<String>, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            retryable,
            violation: None,
        }
    }

    /// Envelope for an ordering violation. `structured` controls whether the
    /// violation travels as data or only inside the message text.
    pub fn ordering(violation: OrderingViolation, structured: bool) -> Self {
        Self {
            code: "ordering_violation".to_string(),
            message: violation.to_string(),
            retryable: false,
            violation: structured.then_some(violation),
        }
    }

    /// Classifies into the engine's rejection taxonomy.
    ///
    /// Structured data wins; message text is parsed only as a fallback.
    pub fn classify(&self) -> RemoteRejection {
        if let Some(violation) = &self.violation {
            return RemoteRejection::Ordering(*violation);
        }
        match OrderingViolation::parse_text(&self.message) {
            Some(violation) => RemoteRejection::Ordering(violation),
            None => RemoteRejection::Generic {
                code: self.code.clone(),
                message: self.message.clone(),
            },
        }
    }
}

impl Display for RemoteFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Typed remote rejection surfaced to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteRejection {
    Ordering(OrderingViolation),
    Generic { code: String, message: String },
}

impl Display for RemoteRejection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ordering(violation) => write!(f, "{violation}"),
            Self::Generic { code, message } => write!(f, "[{code}] {message}"),
        }
    }
}

impl Error for RemoteRejection {}

/// Errors from projection store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Store processed and rejected the request.
    Rejected(RemoteFailure),
    /// Request did not complete.
    Transport(String),
    /// Projection id is unknown to the store.
    NotFound(ProjectionId),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected(failure) => write!(f, "store rejected request: {failure}"),
            Self::Transport(message) => write!(f, "store transport failure: {message}"),
            Self::NotFound(id) => write!(f, "projection not found: {id}"),
        }
    }
}

impl Error for StoreError {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddUnitRequest {
    pub catalog_entry_id: CatalogEntryId,
    pub quarter: Quarter,
    pub week: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveUnitRequest {
    pub unit_id: UnitId,
    pub quarter: Quarter,
    pub week: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeUnitRequest {
    pub unit_id: UnitId,
    pub grade: u8,
    pub note: Option<String>,
    /// Attempt date in epoch milliseconds.
    pub recorded_at_ms: i64,
}

/// Remote projection store. Implementations re-validate every mutation.
pub trait ProjectionStore {
    /// Loads the current authoritative projection.
    fn fetch_projection(&self, projection_id: ProjectionId) -> StoreResult<ProjectionSnapshot>;
    /// Places one catalog entry; returns the new unit id.
    fn add_unit(&self, projection_id: ProjectionId, request: &AddUnitRequest)
        -> StoreResult<UnitId>;
    fn move_unit(&self, projection_id: ProjectionId, request: &MoveUnitRequest) -> StoreResult<()>;
    /// Deletes one ungraded unit.
    fn delete_unit(&self, projection_id: ProjectionId, unit_id: UnitId) -> StoreResult<()>;
    fn grade_unit(&self, projection_id: ProjectionId, request: &GradeUnitRequest)
        -> StoreResult<()>;
    /// Clears the current grade; history is kept.
    fn mark_ungraded(&self, projection_id: ProjectionId, unit_id: UnitId) -> StoreResult<()>;
    fn set_status(&self, projection_id: ProjectionId, status: ProjectionStatus) -> StoreResult<()>;
    /// Generates a projection from a validated draft.
    fn generate_projection(&self, request: &DraftRequest) -> StoreResult<ProjectionId>;
}

impl<S: ProjectionStore + ?Sized> ProjectionStore for &S {
    fn fetch_projection(&self, projection_id: ProjectionId) -> StoreResult<ProjectionSnapshot> {
        (**self).fetch_projection(projection_id)
    }

    fn add_unit(
        &self,
        projection_id: ProjectionId,
        request: &AddUnitRequest,
    ) -> StoreResult<UnitId> {
        (**self).add_unit(projection_id, request)
    }

    fn move_unit(&self, projection_id: ProjectionId, request: &MoveUnitRequest) -> StoreResult<()> {
        (**self).move_unit(projection_id, request)
    }

    fn delete_unit(&self, projection_id: ProjectionId, unit_id: UnitId) -> StoreResult<()> {
        (**self).delete_unit(projection_id, unit_id)
    }

    fn grade_unit(
        &self,
        projection_id: ProjectionId,
        request: &GradeUnitRequest,
    ) -> StoreResult<()> {
        (**self).grade_unit(projection_id, request)
    }

    fn mark_ungraded(&self, projection_id: ProjectionId, unit_id: UnitId) -> StoreResult<()> {
        (**self).mark_ungraded(projection_id, unit_id)
    }

    fn set_status(&self, projection_id: ProjectionId, status: ProjectionStatus) -> StoreResult<()> {
        (**self).set_status(projection_id, status)
    }

    fn generate_projection(&self, request: &DraftRequest) -> StoreResult<ProjectionId> {
        (**self).generate_projection(request)
    }
}
