//! Duplicate-code and quarter-overload guards.
//!
//! # Invariants
//! - A catalog code appears at most once per lineage.
//! - Overload never blocks a mutation by itself; it only asks the caller for
//!   a confirmation, which can be remembered for a bounded window.

use crate::config::EngineConfig;
use crate::model::catalog::{Catalog, CatalogEntry};
use crate::model::placement::Quarter;
use crate::model::projection::Projection;
use crate::placement::rules::PlacementRejection;
use log::info;
use std::fmt::{Display, Formatter};

/// Rejects `entry` when its code is already placed in the same lineage.
pub fn ensure_unique_code(
    projection: &Projection,
    catalog: &Catalog,
    entry: &CatalogEntry,
) -> Result<(), PlacementRejection> {
    let Some(lineage) = catalog.lineage_of_subject(entry.subject_id) else {
        return Err(PlacementRejection::UnknownCatalogEntry(entry.id));
    };
    let duplicate = projection
        .lineage_units(catalog, lineage)
        .into_iter()
        .any(|(_, placed)| placed.code == entry.code);
    if duplicate {
        let subject = catalog
            .subject(entry.subject_id)
            .map(|subject| subject.name.clone())
            .unwrap_or_else(|| entry.subject_id.to_string());
        return Err(PlacementRejection::DuplicateCode {
            code: entry.code.clone(),
            subject,
        });
    }
    Ok(())
}

/// Caller-facing overload confirmation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverloadPrompt {
    pub quarter: Quarter,
    pub expected_units: usize,
    pub cap: usize,
}

impl Display for OverloadPrompt {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} would hold {} units, above the recommended {}",
            self.quarter, self.expected_units, self.cap
        )
    }
}

/// Outcome of one overload evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverloadDecision {
    WithinCapacity,
    /// Over capacity but the caller already confirmed.
    Confirmed,
    /// Over capacity inside a remembered confirmation window.
    Suppressed { until_ms: i64 },
    PromptRequired(OverloadPrompt),
}

impl OverloadDecision {
    pub fn may_proceed(&self) -> bool {
        !matches!(self, Self::PromptRequired(_))
    }
}

/// Confirmation answering one prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Allowance {
    quarter: Quarter,
    expires_at_ms: i64,
}

/// Soft per-quarter capacity guard for leveled students.
///
/// A confirmation only answers the prompt issued just before it. It is spent
/// by the next `admit` whatever that call decides, and lapses with the
/// remember window if never used.
#[derive(Debug, Clone)]
pub struct OverloadGuard {
    cap: usize,
    remember_window_ms: i64,
    remember_until_ms: Option<i64>,
    last_prompt: Option<OverloadPrompt>,
    allowance: Option<Allowance>,
}

impl OverloadGuard {
    pub fn new(cap: usize, remember_window_ms: i64) -> Self {
        Self {
            cap,
            remember_window_ms,
            remember_until_ms: None,
            last_prompt: None,
            allowance: None,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.quarter_unit_cap, config.overload_remember_window_ms)
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn remember_until_ms(&self) -> Option<i64> {
        self.remember_until_ms
    }

    /// Prompt awaiting an answer, if any.
    pub fn pending_prompt(&self) -> Option<OverloadPrompt> {
        self.last_prompt
    }

    /// Evaluates `expected_units` for `quarter` without consuming a
    /// confirmation.
    pub fn evaluate(
        &self,
        quarter: Quarter,
        expected_units: usize,
        student_is_leveled: bool,
        now_ms: i64,
    ) -> OverloadDecision {
        if !student_is_leveled || expected_units <= self.cap {
            return OverloadDecision::WithinCapacity;
        }
        if let Some(until_ms) = self.remember_until_ms {
            if now_ms < until_ms {
                return OverloadDecision::Suppressed { until_ms };
            }
        }
        if let Some(allowance) = self.allowance {
            if allowance.quarter == quarter && now_ms < allowance.expires_at_ms {
                return OverloadDecision::Confirmed;
            }
        }
        OverloadDecision::PromptRequired(OverloadPrompt {
            quarter,
            expected_units,
            cap: self.cap,
        })
    }

    /// Evaluates and spends any outstanding confirmation.
    ///
    /// A `PromptRequired` result becomes the prompt the next `confirm`
    /// answers.
    pub fn admit(
        &mut self,
        quarter: Quarter,
        expected_units: usize,
        student_is_leveled: bool,
        now_ms: i64,
    ) -> OverloadDecision {
        let decision = self.evaluate(quarter, expected_units, student_is_leveled, now_ms);
        self.allowance = None;
        self.last_prompt = match decision {
            OverloadDecision::PromptRequired(prompt) => Some(prompt),
            _ => None,
        };
        decision
    }

    /// Records the caller's answer to the pending prompt.
    ///
    /// `remember` suppresses further prompts until `now_ms + window`.
    /// Returns false, changing nothing, when no prompt is pending.
    pub fn confirm(&mut self, remember: bool, now_ms: i64) -> bool {
        let Some(prompt) = self.last_prompt.take() else {
            info!("event=overload_confirm module=placement status=rejected reason=no_prompt");
            return false;
        };
        let expires_at_ms = now_ms.saturating_add(self.remember_window_ms);
        self.allowance = Some(Allowance {
            quarter: prompt.quarter,
            expires_at_ms,
        });
        if remember {
            self.remember_until_ms = Some(expires_at_ms);
        }
        info!(
            "event=overload_confirm module=placement status=ok quarter={} remember={} until_ms={}",
            prompt.quarter,
            remember,
            self.remember_until_ms.unwrap_or(0)
        );
        true
    }

    /// Drops the pending prompt and any unused confirmation.
    pub fn cancel(&mut self) {
        self.last_prompt = None;
        self.allowance = None;
    }
}
