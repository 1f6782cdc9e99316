//! Ordering, lifecycle and grading pre-checks for unit mutations.
//!
//! These checks run before any request leaves the engine. The store of
//! record runs the same rules again and stays authoritative.

use crate::model::catalog::{Catalog, CatalogEntryId, Lineage};
use crate::model::placement::{Slot, UnitId};
use crate::model::projection::{Projection, ProjectionId};
use crate::placement::guard::ensure_unique_code;
use crate::placement::violation::{OperationKind, OrderingViolation, ViolationRelation};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Local validation rejection. Never reaches the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlacementRejection {
    /// Projection is closed for edits.
    ProjectionClosed(ProjectionId),
    UnitNotFound(UnitId),
    UnknownCatalogEntry(CatalogEntryId),
    /// Week outside `1..=9`.
    InvalidWeek(u8),
    /// Code already placed in the same lineage.
    DuplicateCode { code: String, subject: String },
    Ordering(OrderingViolation),
    /// Graded units must be marked ungraded before deletion.
    GradedUnitDelete { unit_id: UnitId, grade: u8 },
    /// Grade outside `0..=100`.
    InvalidGrade(i32),
}

impl Display for PlacementRejection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ProjectionClosed(id) => write!(f, "projection is closed: {id}"),
            Self::UnitNotFound(id) => write!(f, "placed unit not found: {id}"),
            Self::UnknownCatalogEntry(id) => write!(f, "catalog entry not found: {id}"),
            Self::InvalidWeek(week) => write!(f, "week must be within 1..=9, got {week}"),
            Self::DuplicateCode { code, subject } => {
                write!(f, "pace {code} is already placed for {subject}")
            }
            Self::Ordering(violation) => write!(f, "{violation}"),
            Self::GradedUnitDelete { unit_id, grade } => write!(
                f,
                "unit {unit_id} has grade {grade}; mark it ungraded before deleting"
            ),
            Self::InvalidGrade(grade) => write!(f, "grade must be within 0..=100, got {grade}"),
        }
    }
}

impl PlacementRejection {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ProjectionClosed(_) => "projection_closed",
            Self::UnitNotFound(_) => "unit_not_found",
            Self::UnknownCatalogEntry(_) => "catalog_entry_not_found",
            Self::InvalidWeek(_) => "invalid_week",
            Self::DuplicateCode { .. } => "duplicate_code",
            Self::Ordering(_) => "ordering_violation",
            Self::GradedUnitDelete { .. } => "graded_unit_delete",
            Self::InvalidGrade(_) => "invalid_grade",
        }
    }
}

impl Error for PlacementRejection {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Ordering(violation) => Some(violation),
            _ => None,
        }
    }
}

impl From<OrderingViolation> for PlacementRejection {
    fn from(value: OrderingViolation) -> Self {
        Self::Ordering(value)
    }
}

pub fn ensure_open(projection: &Projection) -> Result<(), PlacementRejection> {
    if projection.is_open() {
        Ok(())
    } else {
        Err(PlacementRejection::ProjectionClosed(projection.id))
    }
}

/// Checks that a unit of `order_index` may sit at `target` among `others`.
///
/// `others` are `(slot, order_index)` pairs of the same lineage, excluding the
/// unit being placed. A unit before `target` must not have a higher order; a
/// unit at or after `target` must not have a lower one.
pub fn check_ordering(
    others: impl IntoIterator<Item = (Slot, i64)>,
    order_index: i64,
    target: Slot,
    operation: OperationKind,
) -> Result<(), OrderingViolation> {
    let mut others: Vec<(Slot, i64)> = others.into_iter().collect();
    others.sort();

    for (slot, other_order) in others {
        let relation = if slot < target && other_order > order_index {
            ViolationRelation::After
        } else if slot == target && other_order < order_index {
            ViolationRelation::PositionConflict
        } else if slot > target && other_order < order_index {
            ViolationRelation::Before
        } else {
            continue;
        };
        return Err(OrderingViolation {
            operation,
            relation,
            order_index,
            conflicting_order_index: other_order,
            position: slot,
        });
    }
    Ok(())
}

pub fn validate_add(
    projection: &Projection,
    catalog: &Catalog,
    entry_id: CatalogEntryId,
    target: Slot,
) -> Result<(), PlacementRejection> {
    ensure_open(projection)?;
    ensure_valid_slot(target)?;
    let entry = catalog
        .entry(entry_id)
        .ok_or(PlacementRejection::UnknownCatalogEntry(entry_id))?;
    ensure_unique_code(projection, catalog, entry)?;
    let lineage = catalog
        .lineage_of_subject(entry.subject_id)
        .ok_or(PlacementRejection::UnknownCatalogEntry(entry_id))?;

    let others = projection
        .lineage_units(catalog, lineage)
        .into_iter()
        .map(|(unit, other)| (unit.slot(), other.order_index));
    check_ordering(others, entry.order_index, target, OperationKind::Add)?;
    Ok(())
}

pub fn validate_move(
    projection: &Projection,
    catalog: &Catalog,
    unit_id: UnitId,
    target: Slot,
) -> Result<(), PlacementRejection> {
    ensure_open(projection)?;
    ensure_valid_slot(target)?;
    let unit = projection
        .unit(unit_id)
        .ok_or(PlacementRejection::UnitNotFound(unit_id))?;
    let entry = catalog
        .entry(unit.catalog_entry_id)
        .ok_or(PlacementRejection::UnknownCatalogEntry(unit.catalog_entry_id))?;
    let lineage = catalog
        .lineage_of_subject(entry.subject_id)
        .ok_or(PlacementRejection::UnknownCatalogEntry(entry.id))?;

    let others = projection
        .lineage_units(catalog, lineage)
        .into_iter()
        .filter(|(other, _)| other.id != unit_id)
        .map(|(other, other_entry)| (other.slot(), other_entry.order_index));
    check_ordering(others, entry.order_index, target, OperationKind::Move)?;
    Ok(())
}

pub fn validate_delete(projection: &Projection, unit_id: UnitId) -> Result<(), PlacementRejection> {
    ensure_open(projection)?;
    let unit = projection
        .unit(unit_id)
        .ok_or(PlacementRejection::UnitNotFound(unit_id))?;
    match unit.grade {
        Some(grade) => Err(PlacementRejection::GradedUnitDelete { unit_id, grade }),
        None => Ok(()),
    }
}

pub fn validate_mark_ungraded(
    projection: &Projection,
    unit_id: UnitId,
) -> Result<(), PlacementRejection> {
    ensure_open(projection)?;
    projection
        .unit(unit_id)
        .map(|_| ())
        .ok_or(PlacementRejection::UnitNotFound(unit_id))
}

pub fn validate_grade(
    projection: &Projection,
    unit_id: UnitId,
    grade: u8,
) -> Result<(), PlacementRejection> {
    ensure_open(projection)?;
    if grade > 100 {
        return Err(PlacementRejection::InvalidGrade(i32::from(grade)));
    }
    projection
        .unit(unit_id)
        .map(|_| ())
        .ok_or(PlacementRejection::UnitNotFound(unit_id))
}

/// Whether every pair of units in `lineage` respects the ordering invariant.
pub fn lineage_is_ordered(projection: &Projection, catalog: &Catalog, lineage: Lineage) -> bool {
    let mut placed: Vec<(i64, Slot)> = projection
        .lineage_units(catalog, lineage)
        .into_iter()
        .map(|(unit, entry)| (entry.order_index, unit.slot()))
        .collect();
    placed.sort();
    placed.windows(2).all(|pair| pair[0].1 <= pair[1].1)
}

/// Whether every lineage present in the projection is ordered.
pub fn projection_is_ordered(projection: &Projection, catalog: &Catalog) -> bool {
    let mut lineages: Vec<Lineage> = projection
        .units
        .iter()
        .filter_map(|unit| catalog.lineage_of_entry(unit.catalog_entry_id))
        .collect();
    lineages.sort();
    lineages.dedup();
    lineages
        .into_iter()
        .all(|lineage| lineage_is_ordered(projection, catalog, lineage))
}

fn ensure_valid_slot(slot: Slot) -> Result<(), PlacementRejection> {
    if slot.is_valid() {
        Ok(())
    } else {
        Err(PlacementRejection::InvalidWeek(slot.week))
    }
}

#[cfg(test)]
mod tests {
    use super::check_ordering;
    use crate::model::placement::{Quarter, Slot};
    use crate::placement::violation::{OperationKind, ViolationRelation};

    fn slot(quarter: Quarter, week: u8) -> Slot {
        Slot::new(quarter, week)
    }

    #[test]
    fn accepts_placement_between_neighbours() {
        let others = [(slot(Quarter::Q1, 2), 1), (slot(Quarter::Q1, 6), 3)];
        assert!(check_ordering(others, 2, slot(Quarter::Q1, 4), OperationKind::Add).is_ok());
    }

    #[test]
    fn same_slot_with_higher_order_is_allowed() {
        let others = [(slot(Quarter::Q2, 1), 9)];
        assert!(check_ordering(others, 4, slot(Quarter::Q2, 1), OperationKind::Add).is_ok());
    }

    #[test]
    fn classifies_each_relation() {
        let err = check_ordering(
            [(slot(Quarter::Q1, 1), 7)],
            4,
            slot(Quarter::Q1, 3),
            OperationKind::Add,
        )
        .expect_err("later unit placed earlier must fail");
        assert_eq!(err.relation, ViolationRelation::After);
        assert_eq!(err.conflicting_order_index, 7);

        let err = check_ordering(
            [(slot(Quarter::Q3, 1), 2)],
            4,
            slot(Quarter::Q2, 9),
            OperationKind::Move,
        )
        .expect_err("earlier unit placed later must fail");
        assert_eq!(err.relation, ViolationRelation::Before);
        assert_eq!(err.position, slot(Quarter::Q3, 1));

        let err = check_ordering(
            [(slot(Quarter::Q1, 5), 3)],
            4,
            slot(Quarter::Q1, 5),
            OperationKind::Add,
        )
        .expect_err("lower order in the same slot must fail");
        assert_eq!(err.relation, ViolationRelation::PositionConflict);
    }
}
