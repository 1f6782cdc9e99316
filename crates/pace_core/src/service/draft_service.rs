//! Projection drafting use-case service.
//!
//! # Responsibility
//! - Own the wizard state: subject slots, per-subject options, and the
//!   available-codes cache.
//! - Validate and submit a draft as one generation request.
//!
//! # Invariants
//! - A rejected selection leaves the draft unchanged.
//! - Nothing reaches the store until the whole draft validates.
//! - Submit and cancel both discard the draft.

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::draft::availability::PaceAvailability;
use crate::draft::plan::{plan_draft, quarter_load, PlannedUnit};
use crate::draft::request::{validate_request, DraftRequest, SchoolId, SubjectDraftConfig};
use crate::draft::selection::{DraftSelection, SelectionRejection};
use crate::logging::field;
use crate::model::catalog::{Catalog, SubjectId};
use crate::model::placement::Quarter;
use crate::model::projection::{ProjectionId, StudentSummary};
use crate::placement::guard::{OverloadDecision, OverloadGuard, OverloadPrompt};
use crate::repo::projection_store::ProjectionStore;
use crate::service::error::ServiceError;
use log::info;
use std::collections::BTreeMap;

/// Result of a draft submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Generated(ProjectionId),
    /// Draft kept; confirm the overload and submit again.
    ConfirmationRequired(OverloadPrompt),
}

/// Drafting facade over one store.
pub struct DraftService<S: ProjectionStore, C: Clock = SystemClock> {
    store: S,
    catalog: Catalog,
    config: EngineConfig,
    clock: C,
    selection: DraftSelection,
    availability: PaceAvailability,
    guard: OverloadGuard,
}

impl<S: ProjectionStore> DraftService<S, SystemClock> {
    pub fn new(store: S, catalog: Catalog, config: EngineConfig) -> Self {
        Self::with_clock(store, catalog, config, SystemClock)
    }
}

impl<S: ProjectionStore, C: Clock> DraftService<S, C> {
    pub fn with_clock(store: S, catalog: Catalog, config: EngineConfig, clock: C) -> Self {
        Self {
            selection: DraftSelection::new(config.max_draft_subjects),
            availability: PaceAvailability::new(config.max_extension_levels),
            guard: OverloadGuard::from_config(&config),
            store,
            catalog,
            config,
            clock,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Replaces the fetched catalog; cached codes are dropped on next lookup.
    pub fn set_catalog(&mut self, catalog: Catalog) {
        self.catalog = catalog;
    }

    pub fn selection(&self) -> &DraftSelection {
        &self.selection
    }

    pub fn select_subject(
        &mut self,
        slot: usize,
        subject_id: SubjectId,
    ) -> Result<&mut SubjectDraftConfig, SelectionRejection> {
        let result =
            self.selection
                .select_subject(&self.catalog, self.config.selection_mode, slot, subject_id);
        if let Err(rejection) = &result {
            info!(
                "event=draft_select module=draft status=rejected slot={} subject_id={} reason={}",
                slot,
                subject_id,
                field(&rejection.to_string())
            );
        }
        result
    }

    pub fn clear_slot(&mut self, slot: usize) -> Option<SubjectDraftConfig> {
        self.selection.clear_slot(slot)
    }

    /// Mutable options of an occupied slot.
    pub fn subject_config_mut(&mut self, slot: usize) -> Option<&mut SubjectDraftConfig> {
        self.selection.slot_mut(slot)
    }

    /// Codes selectable for the subject in `slot`, honoring its extend flag.
    pub fn available_codes(&mut self, slot: usize) -> Option<&[u32]> {
        let config = self.selection.slot(slot)?;
        let (subject_id, extend) = (config.subject_id, config.extend_to_next_level);
        let draft_len = self.selection.selected_count();
        Some(
            self.availability
                .codes(&self.catalog, draft_len, subject_id, extend),
        )
    }

    /// Placements the current draft would generate.
    pub fn plan(&self) -> Vec<PlannedUnit> {
        plan_draft(
            &self.catalog,
            &self.selection.configs(),
            self.config.max_extension_levels,
        )
    }

    pub fn quarter_load(&self) -> BTreeMap<Quarter, usize> {
        quarter_load(&self.plan())
    }

    pub fn confirm_overload(&mut self, remember: bool) -> bool {
        let now_ms = self.clock.now_ms();
        self.guard.confirm(remember, now_ms)
    }

    /// Discards the draft.
    pub fn cancel(&mut self) {
        self.guard.cancel();
        self.reset();
    }

    /// Validates the draft and asks the store to generate a projection.
    pub fn submit(
        &mut self,
        student: &StudentSummary,
        school_id: SchoolId,
        school_year: impl Into<String>,
    ) -> Result<SubmitOutcome, ServiceError> {
        self.selection
            .verify(&self.catalog, self.config.selection_mode)?;
        let request = DraftRequest {
            student_id: student.id,
            school_id,
            school_year: school_year.into(),
            subjects: self.selection.configs(),
        };
        validate_request(&request, &self.catalog, &self.config)?;

        // Only the heaviest quarter is checked so one confirmation covers the draft.
        let heaviest = self
            .quarter_load()
            .into_iter()
            .max_by_key(|(quarter, load)| (*load, std::cmp::Reverse(*quarter)));
        if let Some((quarter, load)) = heaviest {
            let now_ms = self.clock.now_ms();
            if let OverloadDecision::PromptRequired(prompt) =
                self.guard.admit(quarter, load, student.is_leveled, now_ms)
            {
                info!(
                    "event=draft_submit module=draft status=rejected reason=overload quarter={} expected={} cap={}",
                    prompt.quarter, prompt.expected_units, prompt.cap
                );
                return Ok(SubmitOutcome::ConfirmationRequired(prompt));
            }
        }

        let projection_id = self
            .store
            .generate_projection(&request)
            .map_err(|err| ServiceError::from_store(err, "generate"))?;
        info!(
            "event=draft_submit module=draft status=ok projection_id={} subjects={}",
            projection_id,
            request.subjects.len()
        );
        self.reset();
        Ok(SubmitOutcome::Generated(projection_id))
    }

    fn reset(&mut self) {
        self.selection = DraftSelection::new(self.config.max_draft_subjects);
        self.availability.clear();
    }
}
