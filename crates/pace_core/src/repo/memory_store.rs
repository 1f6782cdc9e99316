//! In-memory store of record.
//!
//! # Responsibility
//! - Hold authoritative projections for tests and the CLI demo.
//! - Re-validate every mutation with the placement rules.
//! - Expand draft requests into placed units.
//!
//! # Invariants
//! - A rejected mutation leaves stored state untouched.
//! - Injected failures are consumed in FIFO order, one per call; a failure
//!   targeted at a named call takes precedence for that call.
//! - Draft requests are re-checked against the selection rules, not only
//!   the per-subject ranges.

use crate::config::EngineConfig;
use crate::draft::plan::plan_draft;
use crate::draft::request::{validate_request, DraftError, DraftRequest};
use crate::draft::selection::verify_subjects;
use crate::model::catalog::Catalog;
use crate::model::placement::{GradeEntry, PlacedUnit, Slot, UnitId};
use crate::model::projection::{
    Projection, ProjectionId, ProjectionSnapshot, ProjectionStatus, StudentId, StudentSummary,
};
use crate::placement::rules::{
    validate_add, validate_delete, validate_grade, validate_mark_ungraded, validate_move,
    PlacementRejection,
};
use crate::repo::projection_store::{
    AddUnitRequest, GradeUnitRequest, MoveUnitRequest, ProjectionStore, RemoteFailure,
    StoreError, StoreResult,
};
use crate::logging::field;
use log::{info, warn};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct StoreState {
    students: BTreeMap<StudentId, StudentSummary>,
    projections: BTreeMap<ProjectionId, Projection>,
    injected: VecDeque<StoreError>,
    targeted: Vec<(&'static str, StoreError)>,
    structured_errors: bool,
    calls: Vec<&'static str>,
}

/// Mutex-guarded reference implementation of [`ProjectionStore`].
#[derive(Debug)]
pub struct InMemoryProjectionStore {
    catalog: Catalog,
    config: EngineConfig,
    state: Mutex<StoreState>,
}

impl InMemoryProjectionStore {
    pub fn new(catalog: Catalog, config: EngineConfig) -> Self {
        Self {
            catalog,
            config,
            state: Mutex::new(StoreState {
                structured_errors: true,
                ..StoreState::default()
            }),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn register_student(&self, student: StudentSummary) -> StoreResult<()> {
        self.lock()?.students.insert(student.id, student);
        Ok(())
    }

    /// Stores `projection` as-is, bypassing validation.
    pub fn insert_projection(&self, projection: Projection) -> StoreResult<ProjectionId> {
        let id = projection.id;
        let mut state = self.lock()?;
        state
            .students
            .insert(projection.student.id, projection.student.clone());
        state.projections.insert(id, projection);
        Ok(id)
    }

    /// Typed copy of the stored projection.
    pub fn projection(&self, projection_id: ProjectionId) -> StoreResult<Projection> {
        self.lock()?
            .projections
            .get(&projection_id)
            .cloned()
            .ok_or(StoreError::NotFound(projection_id))
    }

    /// Edits stored state directly, simulating another writer.
    pub fn with_projection_mut<T>(
        &self,
        projection_id: ProjectionId,
        edit: impl FnOnce(&mut Projection) -> T,
    ) -> StoreResult<T> {
        let mut state = self.lock()?;
        let projection = state
            .projections
            .get_mut(&projection_id)
            .ok_or(StoreError::NotFound(projection_id))?;
        Ok(edit(projection))
    }

    /// Queues `error` to be returned by the next store call.
    pub fn fail_next(&self, error: StoreError) -> StoreResult<()> {
        self.lock()?.injected.push_back(error);
        Ok(())
    }

    /// Queues `error` for the next call named `call`, leaving other calls
    /// untouched.
    pub fn fail_call(&self, call: &'static str, error: StoreError) -> StoreResult<()> {
        self.lock()?.targeted.push((call, error));
        Ok(())
    }

    /// When disabled, ordering violations travel only as message text.
    pub fn set_structured_errors(&self, enabled: bool) -> StoreResult<()> {
        self.lock()?.structured_errors = enabled;
        Ok(())
    }

    /// Names of store calls received so far, in order.
    pub fn calls(&self) -> StoreResult<Vec<&'static str>> {
        Ok(self.lock()?.calls.clone())
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, StoreState>> {
        self.state
            .lock()
            .map_err(|_| StoreError::Transport("in-memory store state poisoned".to_string()))
    }

    fn begin(&self, call: &'static str) -> StoreResult<MutexGuard<'_, StoreState>> {
        let mut state = self.lock()?;
        state.calls.push(call);
        let targeted = state
            .targeted
            .iter()
            .position(|(name, _)| *name == call)
            .map(|index| state.targeted.remove(index).1);
        if let Some(error) = targeted.or_else(|| state.injected.pop_front()) {
            warn!(
                "event=store_injected_failure module=store status=error call={} error={}",
                call,
                field(&error.to_string())
            );
            return Err(error);
        }
        Ok(state)
    }

    fn mutate<T>(
        &self,
        call: &'static str,
        projection_id: ProjectionId,
        apply: impl FnOnce(&mut Projection, &Catalog) -> Result<T, PlacementRejection>,
    ) -> StoreResult<T> {
        let mut state = self.begin(call)?;
        let structured = state.structured_errors;
        let projection = state
            .projections
            .get_mut(&projection_id)
            .ok_or(StoreError::NotFound(projection_id))?;
        apply(projection, &self.catalog).map_err(|rejection| {
            warn!(
                "event=store_reject module=store status=rejected call={} projection_id={} code={}",
                call,
                projection_id,
                rejection.code()
            );
            StoreError::Rejected(to_failure(rejection, structured))
        })
    }
}

fn to_failure(rejection: PlacementRejection, structured: bool) -> RemoteFailure {
    match rejection {
        PlacementRejection::Ordering(violation) => RemoteFailure::ordering(violation, structured),
        other => RemoteFailure::new(other.code(), other.to_string(), false),
    }
}

impl ProjectionStore for InMemoryProjectionStore {
    fn fetch_projection(&self, projection_id: ProjectionId) -> StoreResult<ProjectionSnapshot> {
        let state = self.begin("fetch_projection")?;
        state
            .projections
            .get(&projection_id)
            .map(Projection::to_snapshot)
            .ok_or(StoreError::NotFound(projection_id))
    }

    fn add_unit(
        &self,
        projection_id: ProjectionId,
        request: &AddUnitRequest,
    ) -> StoreResult<UnitId> {
        self.mutate("add_unit", projection_id, |projection, catalog| {
            let slot = Slot::new(request.quarter, request.week);
            validate_add(projection, catalog, request.catalog_entry_id, slot)?;
            let unit = PlacedUnit::new(request.catalog_entry_id, slot);
            let unit_id = unit.id;
            projection.units.push(unit);
            Ok(unit_id)
        })
    }

    fn move_unit(&self, projection_id: ProjectionId, request: &MoveUnitRequest) -> StoreResult<()> {
        self.mutate("move_unit", projection_id, |projection, catalog| {
            let target = Slot::new(request.quarter, request.week);
            validate_move(projection, catalog, request.unit_id, target)?;
            if let Some(unit) = projection.unit_mut(request.unit_id) {
                unit.relocate(target);
            }
            Ok(())
        })
    }

    fn delete_unit(&self, projection_id: ProjectionId, unit_id: UnitId) -> StoreResult<()> {
        self.mutate("delete_unit", projection_id, |projection, _| {
            validate_delete(projection, unit_id)?;
            projection.remove_unit(unit_id);
            Ok(())
        })
    }

    fn grade_unit(
        &self,
        projection_id: ProjectionId,
        request: &GradeUnitRequest,
    ) -> StoreResult<()> {
        let pass_threshold = self.config.pass_threshold;
        self.mutate("grade_unit", projection_id, |projection, _| {
            validate_grade(projection, request.unit_id, request.grade)?;
            if let Some(unit) = projection.unit_mut(request.unit_id) {
                unit.record_grade(
                    GradeEntry {
                        grade: request.grade,
                        date: request.recorded_at_ms,
                        note: request.note.clone(),
                    },
                    pass_threshold,
                );
            }
            Ok(())
        })
    }

    fn mark_ungraded(&self, projection_id: ProjectionId, unit_id: UnitId) -> StoreResult<()> {
        self.mutate("mark_ungraded", projection_id, |projection, _| {
            validate_mark_ungraded(projection, unit_id)?;
            if let Some(unit) = projection.unit_mut(unit_id) {
                unit.clear_grade();
            }
            Ok(())
        })
    }

    fn set_status(&self, projection_id: ProjectionId, status: ProjectionStatus) -> StoreResult<()> {
        let mut state = self.begin("set_status")?;
        let projection = state
            .projections
            .get_mut(&projection_id)
            .ok_or(StoreError::NotFound(projection_id))?;
        projection.status = status;
        Ok(())
    }

    fn generate_projection(&self, request: &DraftRequest) -> StoreResult<ProjectionId> {
        let mut state = self.begin("generate_projection")?;
        verify_subjects(
            &self.catalog,
            self.config.selection_mode,
            request.subjects.iter().map(|subject| subject.subject_id),
        )
        .map_err(DraftError::from)
        .and_then(|()| validate_request(request, &self.catalog, &self.config))
        .map_err(|err| {
            warn!(
                "event=projection_generate module=store status=rejected student_id={} error={}",
                request.student_id,
                field(&err.to_string())
            );
            StoreError::Rejected(RemoteFailure::new("invalid_draft", err.to_string(), false))
        })?;
        let student = state
            .students
            .get(&request.student_id)
            .cloned()
            .ok_or_else(|| {
                StoreError::Rejected(RemoteFailure::new(
                    "student_not_found",
                    format!("student not found: {}", request.student_id),
                    false,
                ))
            })?;

        let mut projection = Projection::new(student);
        projection.units = plan_draft(
            &self.catalog,
            &request.subjects,
            self.config.max_extension_levels,
        )
        .into_iter()
        .map(|planned| PlacedUnit::new(planned.catalog_entry_id, planned.slot))
        .collect();

        let projection_id = projection.id;
        info!(
            "event=projection_generate module=store status=ok projection_id={} school_year={} units={}",
            projection_id,
            field(&request.school_year),
            projection.units.len()
        );
        state.projections.insert(projection_id, projection);
        Ok(projection_id)
    }
}
