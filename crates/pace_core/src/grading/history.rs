//! Retry-history aggregation and quarter progress.

use crate::model::catalog::{Catalog, SubjectId};
use crate::model::placement::{PaceStatus, Quarter, UnitId};
use crate::model::projection::Projection;
use std::collections::BTreeMap;

/// Failed attempts (grade below threshold) across a projection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureReport {
    pub by_unit: BTreeMap<UnitId, usize>,
    pub by_subject: BTreeMap<SubjectId, usize>,
    pub by_quarter: BTreeMap<Quarter, usize>,
    pub total: usize,
}

impl FailureReport {
    /// Units whose entry is unknown to `catalog` still count per unit and per
    /// quarter, but not per subject.
    pub fn build(projection: &Projection, catalog: &Catalog, pass_threshold: u8) -> Self {
        let mut report = Self::default();
        for unit in &projection.units {
            let failed = unit.failed_attempts(pass_threshold);
            if failed == 0 {
                continue;
            }
            report.by_unit.insert(unit.id, failed);
            *report.by_quarter.entry(unit.quarter).or_default() += failed;
            if let Some(entry) = catalog.entry(unit.catalog_entry_id) {
                *report.by_subject.entry(entry.subject_id).or_default() += failed;
            }
            report.total += failed;
        }
        report
    }

    pub fn for_unit(&self, unit_id: UnitId) -> usize {
        self.by_unit.get(&unit_id).copied().unwrap_or(0)
    }

    pub fn for_subject(&self, subject_id: SubjectId) -> usize {
        self.by_subject.get(&subject_id).copied().unwrap_or(0)
    }

    pub fn for_quarter(&self, quarter: Quarter) -> usize {
        self.by_quarter.get(&quarter).copied().unwrap_or(0)
    }
}

/// Status counts for one quarter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuarterProgress {
    pub pending: usize,
    pub completed: usize,
    pub failed: usize,
    pub unfinished: usize,
    /// More units than the configured per-quarter cap.
    pub over_cap: bool,
}

impl QuarterProgress {
    pub fn total(&self) -> usize {
        self.pending + self.completed + self.failed + self.unfinished
    }
}

/// Per-quarter status counts; all four quarters are present.
pub fn quarter_progress(projection: &Projection, cap: usize) -> BTreeMap<Quarter, QuarterProgress> {
    let mut progress: BTreeMap<Quarter, QuarterProgress> = Quarter::ALL
        .iter()
        .map(|quarter| (*quarter, QuarterProgress::default()))
        .collect();
    for unit in &projection.units {
        let counts = progress.entry(unit.quarter).or_default();
        match unit.status {
            PaceStatus::Pending => counts.pending += 1,
            PaceStatus::Completed => counts.completed += 1,
            PaceStatus::Failed => counts.failed += 1,
            PaceStatus::Unfinished => counts.unfinished += 1,
        }
    }
    for counts in progress.values_mut() {
        counts.over_cap = counts.total() > cap;
    }
    progress
}
