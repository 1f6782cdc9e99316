//! Projection aggregate and its inbound snapshot form.
//!
//! # Responsibility
//! - Own the placed units of one student's school year.
//! - Normalize store snapshots (mixed quarter encodings) into typed units.
//!
//! # Invariants
//! - A `CLOSED` projection accepts no unit mutation.
//! - Normalization never fails on a bad unit position; it excludes the unit
//!   and reports its id.

use crate::model::catalog::{Catalog, CatalogEntry, Lineage};
use crate::model::placement::{
    GradeEntry, PaceStatus, PlacedUnit, Quarter, RawQuarter, UnitId, WEEKS_PER_QUARTER,
};
use log::warn;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ProjectionId = Uuid;
pub type StudentId = Uuid;

/// Projection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectionStatus {
    Open,
    Closed,
}

/// Student fields the engine needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub id: StudentId,
    pub name: String,
    /// Leveled-down students get the per-quarter overload prompt.
    #[serde(default)]
    pub is_leveled: bool,
}

/// Academic-year plan for one student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Projection {
    pub id: ProjectionId,
    pub status: ProjectionStatus,
    pub student: StudentSummary,
    pub units: Vec<PlacedUnit>,
}

impl Projection {
    pub fn new(student: StudentSummary) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: ProjectionStatus::Open,
            student,
            units: Vec::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == ProjectionStatus::Open
    }

    pub fn unit(&self, id: UnitId) -> Option<&PlacedUnit> {
        self.units.iter().find(|unit| unit.id == id)
    }

    pub fn unit_mut(&mut self, id: UnitId) -> Option<&mut PlacedUnit> {
        self.units.iter_mut().find(|unit| unit.id == id)
    }

    /// Removes one unit, returning it when present.
    pub fn remove_unit(&mut self, id: UnitId) -> Option<PlacedUnit> {
        let position = self.units.iter().position(|unit| unit.id == id)?;
        Some(self.units.remove(position))
    }

    pub fn units_in_quarter(&self, quarter: Quarter) -> usize {
        self.units
            .iter()
            .filter(|unit| unit.quarter == quarter)
            .count()
    }

    /// Units of one lineage paired with their catalog entries.
    ///
    /// Units whose entry is missing from `catalog` are skipped.
    pub fn lineage_units<'a>(
        &'a self,
        catalog: &'a Catalog,
        lineage: Lineage,
    ) -> Vec<(&'a PlacedUnit, &'a CatalogEntry)> {
        self.units
            .iter()
            .filter_map(|unit| {
                let entry = catalog.entry(unit.catalog_entry_id)?;
                (catalog.lineage_of_subject(entry.subject_id)? == lineage).then_some((unit, entry))
            })
            .collect()
    }

    /// Converts to the wire snapshot form.
    pub fn to_snapshot(&self) -> ProjectionSnapshot {
        ProjectionSnapshot {
            id: self.id,
            status: self.status,
            student: self.student.clone(),
            units: self.units.iter().map(UnitSnapshot::from).collect(),
        }
    }
}

/// Inbound projection as delivered by the store of record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionSnapshot {
    pub id: ProjectionId,
    pub status: ProjectionStatus,
    pub student: StudentSummary,
    #[serde(default)]
    pub units: Vec<UnitSnapshot>,
}

/// Inbound unit with a raw quarter encoding and unchecked week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitSnapshot {
    pub id: UnitId,
    pub catalog_entry_id: Uuid,
    pub quarter: RawQuarter,
    pub week: i64,
    #[serde(default)]
    pub grade: Option<u8>,
    pub status: PaceStatus,
    #[serde(default)]
    pub original_quarter: Option<RawQuarter>,
    #[serde(default)]
    pub original_week: Option<i64>,
    #[serde(default)]
    pub grade_history: Vec<GradeEntry>,
}

impl From<&PlacedUnit> for UnitSnapshot {
    fn from(unit: &PlacedUnit) -> Self {
        Self {
            id: unit.id,
            catalog_entry_id: unit.catalog_entry_id,
            quarter: unit.quarter.into(),
            week: i64::from(unit.week),
            grade: unit.grade,
            status: unit.status,
            original_quarter: unit.original_quarter.map(RawQuarter::from),
            original_week: unit.original_week.map(i64::from),
            grade_history: unit.grade_history.clone(),
        }
    }
}

/// Result of snapshot normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedProjection {
    pub projection: Projection,
    /// Units dropped for an unrecognized quarter or out-of-range week.
    pub excluded: Vec<UnitId>,
}

impl ProjectionSnapshot {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn normalize(self) -> NormalizedProjection {
        let mut units = Vec::with_capacity(self.units.len());
        let mut excluded = Vec::new();
        for raw in self.units {
            match normalize_unit(&raw) {
                Some(unit) => units.push(unit),
                None => {
                    warn!(
                        "event=snapshot_unit_excluded module=model status=rejected projection_id={} unit_id={} quarter={} week={}",
                        self.id, raw.id, raw.quarter, raw.week
                    );
                    excluded.push(raw.id);
                }
            }
        }

        NormalizedProjection {
            projection: Projection {
                id: self.id,
                status: self.status,
                student: self.student,
                units,
            },
            excluded,
        }
    }
}

fn normalize_unit(raw: &UnitSnapshot) -> Option<PlacedUnit> {
    let quarter = raw.quarter.normalize()?;
    let week = normalize_week(raw.week)?;
    // Provenance is informational; a malformed pair is dropped, not the unit.
    let original = match (
        raw.original_quarter.as_ref().and_then(RawQuarter::normalize),
        raw.original_week.and_then(normalize_week),
    ) {
        (Some(quarter), Some(week)) => Some((quarter, week)),
        _ => None,
    };

    Some(PlacedUnit {
        id: raw.id,
        catalog_entry_id: raw.catalog_entry_id,
        quarter,
        week,
        grade: raw.grade,
        status: raw.status,
        original_quarter: original.map(|(quarter, _)| quarter),
        original_week: original.map(|(_, week)| week),
        grade_history: raw.grade_history.clone(),
    })
}

fn normalize_week(value: i64) -> Option<u8> {
    if (1..=i64::from(WEEKS_PER_QUARTER)).contains(&value) {
        Some(value as u8)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::{ProjectionSnapshot, ProjectionStatus};
    use crate::model::placement::Quarter;

    #[test]
    fn normalize_accepts_mixed_quarter_encodings_and_drops_bad_positions() {
        let raw = r#"{
            "id": "11111111-2222-4333-8444-555555555555",
            "status": "OPEN",
            "student": {"id": "21111111-2222-4333-8444-555555555555", "name": "Ana"},
            "units": [
                {"id": "31111111-2222-4333-8444-555555555551", "catalogEntryId": "41111111-2222-4333-8444-555555555555",
                 "quarter": 2, "week": 3, "grade": null, "status": "PENDING"},
                {"id": "31111111-2222-4333-8444-555555555552", "catalogEntryId": "41111111-2222-4333-8444-555555555555",
                 "quarter": "Q4", "week": 9, "grade": 91, "status": "COMPLETED",
                 "gradeHistory": [{"grade": 91, "date": 1700000000000}]},
                {"id": "31111111-2222-4333-8444-555555555553", "catalogEntryId": "41111111-2222-4333-8444-555555555555",
                 "quarter": "Q5", "week": 1, "grade": null, "status": "PENDING"},
                {"id": "31111111-2222-4333-8444-555555555554", "catalogEntryId": "41111111-2222-4333-8444-555555555555",
                 "quarter": 1, "week": 10, "grade": null, "status": "PENDING"}
            ]
        }"#;

        let normalized = ProjectionSnapshot::from_json(raw)
            .expect("snapshot should parse")
            .normalize();

        assert_eq!(normalized.projection.status, ProjectionStatus::Open);
        assert_eq!(normalized.projection.units.len(), 2);
        assert_eq!(normalized.projection.units[0].quarter, Quarter::Q2);
        assert_eq!(normalized.projection.units[1].quarter, Quarter::Q4);
        assert_eq!(normalized.projection.units[1].grade_history.len(), 1);
        assert_eq!(normalized.excluded.len(), 2);
        assert!(!normalized.projection.student.is_leveled);
    }
}
