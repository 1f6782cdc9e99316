//! Projection editing use-case service.
//!
//! # Responsibility
//! - Hold the caller's local view of one projection.
//! - Run unit mutations as optimistic apply, remote commit, then reconcile.
//! - Guard re-entrancy with a set of in-flight loading keys.
//!
//! # Invariants
//! - Local validation rejections leave the view untouched.
//! - After every commit, successful or not, the view is replaced by a fresh
//!   store fetch; if that fetch fails after a failed commit, the pre-mutation
//!   view is restored.
//! - A failed fetch after an accepted commit marks the view stale; mutations
//!   are refused until `refresh` succeeds.
//! - A loading key is held from `apply_local` until `commit` or `discard`.

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::grading::flow::GradeCommit;
use crate::grading::history::{quarter_progress, FailureReport, QuarterProgress};
use crate::grid::transform::{build_grid, ProjectionGrid};
use crate::logging::field;
use crate::model::catalog::{Catalog, CatalogEntryId};
use crate::model::placement::{GradeEntry, PlacedUnit, Quarter, Slot, UnitId};
use crate::model::projection::{Projection, ProjectionId, ProjectionStatus};
use crate::placement::guard::{OverloadDecision, OverloadGuard, OverloadPrompt};
use crate::placement::rules::{
    ensure_open, validate_add, validate_delete, validate_grade, validate_mark_ungraded,
    validate_move, PlacementRejection,
};
use crate::repo::projection_store::{
    AddUnitRequest, GradeUnitRequest, MoveUnitRequest, ProjectionStore, StoreError,
};
use crate::service::error::ServiceError;
use log::{info, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

/// One unit mutation requested by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Add {
        catalog_entry_id: CatalogEntryId,
        slot: Slot,
    },
    Move {
        unit_id: UnitId,
        to: Slot,
    },
    Delete {
        unit_id: UnitId,
    },
    Grade(GradeCommit),
    MarkUngraded {
        unit_id: UnitId,
    },
}

/// Store request matching one mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreRequest {
    Add(AddUnitRequest),
    Move(MoveUnitRequest),
    Delete(UnitId),
    Grade(GradeUnitRequest),
    MarkUngraded(UnitId),
}

impl StoreRequest {
    fn operation(&self) -> &'static str {
        match self {
            Self::Add(_) => "add",
            Self::Move(_) => "move",
            Self::Delete(_) => "delete",
            Self::Grade(_) => "grade",
            Self::MarkUngraded(_) => "mark_ungraded",
        }
    }
}

/// Mutation applied locally and awaiting `commit` or `discard`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "an applied mutation holds its loading key until committed or discarded"]
pub struct PendingMutation {
    key: String,
    request: StoreRequest,
    baseline: Projection,
}

impl PendingMutation {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn request(&self) -> &StoreRequest {
        &self.request
    }
}

/// Settled mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    pub key: String,
    /// Id assigned by the store for adds.
    pub unit_id: Option<UnitId>,
}

/// Result of an add that may need an overload confirmation first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Committed(CommitOutcome),
    ConfirmationRequired(OverloadPrompt),
}

/// Projection editing facade over one store.
pub struct ProjectionService<S: ProjectionStore, C: Clock = SystemClock> {
    store: S,
    catalog: Catalog,
    config: EngineConfig,
    clock: C,
    guard: OverloadGuard,
    projection_id: ProjectionId,
    view: Option<Projection>,
    excluded: Vec<UnitId>,
    in_flight: BTreeSet<String>,
    stale: bool,
}

impl<S: ProjectionStore> ProjectionService<S, SystemClock> {
    pub fn new(
        store: S,
        catalog: Catalog,
        config: EngineConfig,
        projection_id: ProjectionId,
    ) -> Self {
        Self::with_clock(store, catalog, config, projection_id, SystemClock)
    }
}

impl<S: ProjectionStore, C: Clock> ProjectionService<S, C> {
    pub fn with_clock(
        store: S,
        catalog: Catalog,
        config: EngineConfig,
        projection_id: ProjectionId,
        clock: C,
    ) -> Self {
        let guard = OverloadGuard::from_config(&config);
        Self {
            store,
            catalog,
            config,
            clock,
            guard,
            projection_id,
            view: None,
            excluded: Vec::new(),
            in_flight: BTreeSet::new(),
            stale: false,
        }
    }

    pub fn projection_id(&self) -> ProjectionId {
        self.projection_id
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current local view, including any uncommitted optimistic mutation.
    pub fn projection(&self) -> Option<&Projection> {
        self.view.as_ref()
    }

    /// Unit ids dropped by the last snapshot normalization.
    pub fn excluded(&self) -> &[UnitId] {
        &self.excluded
    }

    /// True after an accepted commit whose follow-up fetch failed.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        self.in_flight.contains(key)
    }

    pub fn in_flight_keys(&self) -> impl Iterator<Item = &str> {
        self.in_flight.iter().map(String::as_str)
    }

    /// Fetches and normalizes the authoritative projection.
    pub fn load(&mut self) -> Result<&Projection, ServiceError> {
        self.fetch("load")?;
        self.view.as_ref().ok_or(ServiceError::NotLoaded)
    }

    pub fn refresh(&mut self) -> Result<&Projection, ServiceError> {
        self.fetch("refresh")?;
        self.view.as_ref().ok_or(ServiceError::NotLoaded)
    }

    pub fn grid(&self) -> Result<ProjectionGrid, ServiceError> {
        let view = self.view()?;
        Ok(build_grid(&view.units, &self.catalog))
    }

    pub fn failure_report(&self) -> Result<FailureReport, ServiceError> {
        Ok(FailureReport::build(
            self.view()?,
            &self.catalog,
            self.config.pass_threshold,
        ))
    }

    pub fn quarter_progress(&self) -> Result<BTreeMap<Quarter, QuarterProgress>, ServiceError> {
        Ok(quarter_progress(self.view()?, self.config.quarter_unit_cap))
    }

    /// Confirms the last overload prompt; `remember` suppresses further
    /// prompts for the configured window. False when no prompt is pending.
    pub fn confirm_overload(&mut self, remember: bool) -> bool {
        let now_ms = self.clock.now_ms();
        self.guard.confirm(remember, now_ms)
    }

    pub fn cancel_overload(&mut self) {
        self.guard.cancel();
    }

    /// Validates `mutation`, applies it to the local view, and reserves its
    /// loading key.
    pub fn apply_local(&mut self, mutation: Mutation) -> Result<PendingMutation, ServiceError> {
        if self.stale {
            return Err(ServiceError::StaleView);
        }
        let view = self.view()?;
        ensure_open(view)?;
        let key = self.loading_key(view, &mutation)?;
        if self.in_flight.contains(&key) {
            return Err(ServiceError::OperationInFlight(key));
        }

        let request = match &mutation {
            Mutation::Add {
                catalog_entry_id,
                slot,
            } => {
                validate_add(view, &self.catalog, *catalog_entry_id, *slot)?;
                StoreRequest::Add(AddUnitRequest {
                    catalog_entry_id: *catalog_entry_id,
                    quarter: slot.quarter,
                    week: slot.week,
                })
            }
            Mutation::Move { unit_id, to } => {
                validate_move(view, &self.catalog, *unit_id, *to)?;
                StoreRequest::Move(MoveUnitRequest {
                    unit_id: *unit_id,
                    quarter: to.quarter,
                    week: to.week,
                })
            }
            Mutation::Delete { unit_id } => {
                validate_delete(view, *unit_id)?;
                StoreRequest::Delete(*unit_id)
            }
            Mutation::Grade(commit) => {
                validate_grade(view, commit.unit_id, commit.grade)?;
                StoreRequest::Grade(GradeUnitRequest {
                    unit_id: commit.unit_id,
                    grade: commit.grade,
                    note: commit.note.clone(),
                    recorded_at_ms: self.clock.now_ms(),
                })
            }
            Mutation::MarkUngraded { unit_id } => {
                validate_mark_ungraded(view, *unit_id)?;
                StoreRequest::MarkUngraded(*unit_id)
            }
        };

        if let Mutation::Add { slot, .. } = &mutation {
            let expected = view.units_in_quarter(slot.quarter) + 1;
            let leveled = view.student.is_leveled;
            let now_ms = self.clock.now_ms();
            if let OverloadDecision::PromptRequired(prompt) =
                self.guard.admit(slot.quarter, expected, leveled, now_ms)
            {
                info!(
                    "event=overload_prompt module=service status=rejected projection_id={} quarter={} expected={} cap={}",
                    self.projection_id, prompt.quarter, prompt.expected_units, prompt.cap
                );
                return Err(ServiceError::OverloadConfirmationRequired(prompt));
            }
        }

        let baseline = self.view()?.clone();
        let pass_threshold = self.config.pass_threshold;
        let view = self.view.as_mut().ok_or(ServiceError::NotLoaded)?;
        apply_optimistic(view, &request, pass_threshold);
        self.in_flight.insert(key.clone());
        info!(
            "event=mutation_apply module=service status=start projection_id={} op={} key={}",
            self.projection_id,
            request.operation(),
            field(&key)
        );
        Ok(PendingMutation {
            key,
            request,
            baseline,
        })
    }

    /// Sends a pending mutation to the store, then reconciles or rolls back.
    pub fn commit(&mut self, pending: PendingMutation) -> Result<CommitOutcome, ServiceError> {
        let started = Instant::now();
        let PendingMutation {
            key,
            request,
            baseline,
        } = pending;
        let result = self.send(&request);
        self.in_flight.remove(&key);
        let op = request.operation();

        match result {
            Ok(unit_id) => {
                if let Err(err) = self.fetch("reconcile") {
                    self.stale = true;
                    warn!(
                        "event=mutation_reconcile module=service status=error projection_id={} op={} key={} duration_ms={} error={}",
                        self.projection_id,
                        op,
                        field(&key),
                        started.elapsed().as_millis(),
                        field(&err.to_string())
                    );
                    return Err(ServiceError::Unreconciled {
                        key,
                        unit_id,
                        message: err.to_string(),
                    });
                }
                info!(
                    "event=mutation_commit module=service status=ok projection_id={} op={} key={} duration_ms={}",
                    self.projection_id,
                    op,
                    field(&key),
                    started.elapsed().as_millis()
                );
                Ok(CommitOutcome { key, unit_id })
            }
            Err(err) => {
                let err = ServiceError::from_store(err, "commit");
                self.rollback(baseline);
                warn!(
                    "event=mutation_commit module=service status=error projection_id={} op={} key={} retryable={} duration_ms={} error={}",
                    self.projection_id,
                    op,
                    field(&key),
                    err.is_retryable(),
                    started.elapsed().as_millis(),
                    field(&err.to_string())
                );
                Err(err)
            }
        }
    }

    /// Abandons a pending mutation without contacting the store.
    pub fn discard(&mut self, pending: PendingMutation) {
        self.in_flight.remove(&pending.key);
        self.view = Some(pending.baseline);
    }

    /// Adds one catalog entry, asking for confirmation when the quarter
    /// would exceed the cap.
    pub fn add_unit(
        &mut self,
        catalog_entry_id: CatalogEntryId,
        slot: Slot,
    ) -> Result<AddOutcome, ServiceError> {
        match self.apply_local(Mutation::Add {
            catalog_entry_id,
            slot,
        }) {
            Ok(pending) => self.commit(pending).map(AddOutcome::Committed),
            Err(ServiceError::OverloadConfirmationRequired(prompt)) => {
                Ok(AddOutcome::ConfirmationRequired(prompt))
            }
            Err(err) => Err(err),
        }
    }

    pub fn move_unit(&mut self, unit_id: UnitId, to: Slot) -> Result<CommitOutcome, ServiceError> {
        let pending = self.apply_local(Mutation::Move { unit_id, to })?;
        self.commit(pending)
    }

    pub fn delete_unit(&mut self, unit_id: UnitId) -> Result<CommitOutcome, ServiceError> {
        let pending = self.apply_local(Mutation::Delete { unit_id })?;
        self.commit(pending)
    }

    pub fn grade_unit(&mut self, grade: GradeCommit) -> Result<CommitOutcome, ServiceError> {
        let pending = self.apply_local(Mutation::Grade(grade))?;
        self.commit(pending)
    }

    pub fn mark_ungraded(&mut self, unit_id: UnitId) -> Result<CommitOutcome, ServiceError> {
        let pending = self.apply_local(Mutation::MarkUngraded { unit_id })?;
        self.commit(pending)
    }

    pub fn close_projection(&mut self) -> Result<&Projection, ServiceError> {
        self.set_status(ProjectionStatus::Closed)
    }

    pub fn reopen_projection(&mut self) -> Result<&Projection, ServiceError> {
        self.set_status(ProjectionStatus::Open)
    }

    fn set_status(&mut self, status: ProjectionStatus) -> Result<&Projection, ServiceError> {
        self.store
            .set_status(self.projection_id, status)
            .map_err(|err| ServiceError::from_store(err, "status"))?;
        info!(
            "event=projection_status module=service status=ok projection_id={} new_status={:?}",
            self.projection_id, status
        );
        if let Err(err) = self.fetch("status") {
            self.stale = true;
            return Err(err);
        }
        self.view.as_ref().ok_or(ServiceError::NotLoaded)
    }

    fn view(&self) -> Result<&Projection, ServiceError> {
        self.view.as_ref().ok_or(ServiceError::NotLoaded)
    }

    fn fetch(&mut self, stage: &'static str) -> Result<(), ServiceError> {
        let snapshot = self
            .store
            .fetch_projection(self.projection_id)
            .map_err(|err| ServiceError::from_store(err, stage))?;
        let normalized = snapshot.normalize();
        self.view = Some(normalized.projection);
        self.excluded = normalized.excluded;
        self.stale = false;
        Ok(())
    }

    fn rollback(&mut self, baseline: Projection) {
        if let Err(err) = self.fetch("rollback") {
            warn!(
                "event=mutation_rollback module=service status=error projection_id={} restored=baseline error={}",
                self.projection_id,
                field(&err.to_string())
            );
            self.view = Some(baseline);
        }
    }

    fn send(&self, request: &StoreRequest) -> Result<Option<UnitId>, StoreError> {
        let id = self.projection_id;
        match request {
            StoreRequest::Add(add) => self.store.add_unit(id, add).map(Some),
            StoreRequest::Move(request) => self.store.move_unit(id, request).map(|_| None),
            StoreRequest::Delete(unit_id) => self.store.delete_unit(id, *unit_id).map(|_| None),
            StoreRequest::Grade(request) => self.store.grade_unit(id, request).map(|_| None),
            StoreRequest::MarkUngraded(unit_id) => {
                self.store.mark_ungraded(id, *unit_id).map(|_| None)
            }
        }
    }

    /// Builds the per-operation loading key.
    ///
    /// Shapes: `add-{quarter}-{subject}-{week}`,
    /// `move-{quarter}-{subject}-{fromWeek}-{toWeek}` (source quarter),
    /// `delete-{unit}`, `grade-{unit}`, `unmark-{unit}`.
    fn loading_key(&self, view: &Projection, mutation: &Mutation) -> Result<String, ServiceError> {
        let key = match mutation {
            Mutation::Add {
                catalog_entry_id,
                slot,
            } => format!(
                "add-{}-{}-{}",
                slot.quarter,
                self.subject_label(*catalog_entry_id)?,
                slot.week
            ),
            Mutation::Move { unit_id, to } => {
                let unit = view
                    .unit(*unit_id)
                    .ok_or(PlacementRejection::UnitNotFound(*unit_id))?;
                format!(
                    "move-{}-{}-{}-{}",
                    unit.quarter,
                    self.subject_label(unit.catalog_entry_id)?,
                    unit.week,
                    to.week
                )
            }
            Mutation::Delete { unit_id } => format!("delete-{unit_id}"),
            Mutation::Grade(commit) => format!("grade-{}", commit.unit_id),
            Mutation::MarkUngraded { unit_id } => format!("unmark-{unit_id}"),
        };
        Ok(key)
    }

    fn subject_label(&self, catalog_entry_id: CatalogEntryId) -> Result<String, ServiceError> {
        let entry = self
            .catalog
            .entry(catalog_entry_id)
            .ok_or(PlacementRejection::UnknownCatalogEntry(catalog_entry_id))?;
        Ok(self
            .catalog
            .subject(entry.subject_id)
            .map(|subject| subject.name.clone())
            .unwrap_or_else(|| entry.subject_id.to_string()))
    }
}

fn apply_optimistic(view: &mut Projection, request: &StoreRequest, pass_threshold: u8) {
    match request {
        StoreRequest::Add(add) => view.units.push(PlacedUnit::new(
            add.catalog_entry_id,
            Slot::new(add.quarter, add.week),
        )),
        StoreRequest::Move(request) => {
            if let Some(unit) = view.unit_mut(request.unit_id) {
                unit.relocate(Slot::new(request.quarter, request.week));
            }
        }
        StoreRequest::Delete(unit_id) => {
            view.remove_unit(*unit_id);
        }
        StoreRequest::Grade(request) => {
            if let Some(unit) = view.unit_mut(request.unit_id) {
                unit.record_grade(
                    GradeEntry {
                        grade: request.grade,
                        date: request.recorded_at_ms,
                        note: request.note.clone(),
                    },
                    pass_threshold,
                );
            }
        }
        StoreRequest::MarkUngraded(unit_id) => {
            if let Some(unit) = view.unit_mut(*unit_id) {
                unit.clear_grade();
            }
        }
    }
}
