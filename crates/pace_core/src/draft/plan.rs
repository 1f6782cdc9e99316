//! Expansion of a validated draft into planned placements.
//!
//! Each lineage's selected paces are merged, ordered by `order_index`, and
//! spread evenly over the 36-week year so that the plan already satisfies
//! the ordering invariant.

use crate::draft::availability::{available_codes, subject_span};
use crate::draft::request::SubjectDraftConfig;
use crate::model::catalog::{Catalog, CatalogEntry, CatalogEntryId, Lineage};
use crate::model::placement::{Quarter, Slot, WEEKS_PER_YEAR};
use std::collections::{BTreeMap, BTreeSet};

/// One catalog entry with its planned slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedUnit {
    pub catalog_entry_id: CatalogEntryId,
    pub slot: Slot,
}

/// Expands subject configs into ordered placements.
///
/// Configs referencing unknown subjects contribute nothing; run
/// `validate_request` first.
pub fn plan_draft(
    catalog: &Catalog,
    subjects: &[SubjectDraftConfig],
    max_levels: u32,
) -> Vec<PlannedUnit> {
    let mut by_lineage: BTreeMap<Lineage, BTreeMap<CatalogEntryId, &CatalogEntry>> =
        BTreeMap::new();

    for draft in subjects {
        let Some(lineage) = catalog.lineage_of_subject(draft.subject_id) else {
            continue;
        };
        let codes: BTreeSet<u32> = draft
            .selected_codes(&available_codes(
                catalog,
                draft.subject_id,
                draft.extend_to_next_level,
                max_levels,
            ))
            .into_iter()
            .collect();
        let bucket = by_lineage.entry(lineage).or_default();
        for subject_id in subject_span(catalog, draft.subject_id, draft.extend_to_next_level, max_levels)
        {
            for entry in catalog.entries_for_subject(subject_id) {
                if entry.code_number().is_some_and(|code| codes.contains(&code)) {
                    bucket.insert(entry.id, entry);
                }
            }
        }
    }

    let mut planned = Vec::new();
    for entries in by_lineage.into_values() {
        let mut ordered: Vec<&CatalogEntry> = entries.into_values().collect();
        ordered.sort_by_key(|entry| entry.order_index);
        // Same code reachable through two subjects of one lineage: keep the first.
        let mut seen_codes = BTreeSet::new();
        ordered.retain(|entry| seen_codes.insert(entry.code.clone()));

        let slots = spread_slots(ordered.len());
        planned.extend(
            ordered
                .into_iter()
                .zip(slots)
                .map(|(entry, slot)| PlannedUnit {
                    catalog_entry_id: entry.id,
                    slot,
                }),
        );
    }
    planned
}

/// `count` non-decreasing slots spread evenly over the year.
pub fn spread_slots(count: usize) -> Vec<Slot> {
    (0..count)
        .filter_map(|index| Slot::from_year_index(index * WEEKS_PER_YEAR / count))
        .collect()
}

/// Expected units per quarter; all four quarters are present.
pub fn quarter_load(plan: &[PlannedUnit]) -> BTreeMap<Quarter, usize> {
    let mut load: BTreeMap<Quarter, usize> =
        Quarter::ALL.iter().map(|quarter| (*quarter, 0)).collect();
    for unit in plan {
        *load.entry(unit.slot.quarter).or_default() += 1;
    }
    load
}

#[cfg(test)]
mod tests {
    use super::spread_slots;
    use crate::model::placement::{Quarter, Slot};

    #[test]
    fn spreads_evenly_and_in_order() {
        let slots = spread_slots(12);
        assert_eq!(slots.len(), 12);
        assert_eq!(slots[0], Slot::new(Quarter::Q1, 1));
        assert_eq!(slots[1], Slot::new(Quarter::Q1, 4));
        assert_eq!(slots[11], Slot::new(Quarter::Q4, 7));
        assert!(slots.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn more_units_than_weeks_share_slots() {
        let slots = spread_slots(72);
        assert_eq!(slots.len(), 72);
        assert_eq!(slots[0], slots[1]);
        assert!(slots.windows(2).all(|pair| pair[0] <= pair[1]));
    }
}
