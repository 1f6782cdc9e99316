//! Grid transformer.

use crate::model::catalog::{Catalog, Lineage};
use crate::model::placement::{PlacedUnit, Quarter, UnitId, WEEKS_PER_QUARTER};
use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet};

const WEEK_COUNT: usize = WEEKS_PER_QUARTER as usize;

/// Units sharing one `(row, week)` position.
///
/// Empty, one unit, or several (paired subjects) are all represented by the
/// length of the list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GridCell {
    units: Vec<PlacedUnit>,
}

impl GridCell {
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn units(&self) -> &[PlacedUnit] {
        &self.units
    }

    /// The only unit, when the cell holds exactly one.
    pub fn single(&self) -> Option<&PlacedUnit> {
        match self.units.as_slice() {
            [unit] => Some(unit),
            _ => None,
        }
    }

    fn push(&mut self, unit: PlacedUnit) {
        self.units.push(unit);
    }
}

/// Nine week cells of one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridRow {
    /// Category the row belongs to.
    pub category: String,
    pub display_order: i32,
    pub cells: [GridCell; WEEK_COUNT],
}

impl GridRow {
    fn new(category: String, display_order: i32) -> Self {
        Self {
            category,
            display_order,
            cells: std::array::from_fn(|_| GridCell::default()),
        }
    }

    pub fn unit_count(&self) -> usize {
        self.cells.iter().map(GridCell::len).sum()
    }
}

/// Display grid for a whole projection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProjectionGrid {
    /// `quarter -> row key -> row`. All four quarters are always present.
    pub quarters: BTreeMap<Quarter, BTreeMap<String, GridRow>>,
    /// Subject name to category name.
    pub subject_to_category: BTreeMap<String, String>,
    /// Subject name to its category display order.
    pub subject_to_category_display_order: BTreeMap<String, i32>,
    /// `quarter -> category -> distinct row count`.
    pub category_counts: BTreeMap<Quarter, BTreeMap<String, usize>>,
    /// Units skipped for an invalid week or unknown catalog entry.
    pub excluded: Vec<UnitId>,
}

impl ProjectionGrid {
    pub fn rows(&self, quarter: Quarter) -> Option<&BTreeMap<String, GridRow>> {
        self.quarters.get(&quarter)
    }

    pub fn cell(&self, quarter: Quarter, row_key: &str, week: u8) -> Option<&GridCell> {
        let index = usize::from(week).checked_sub(1)?;
        self.quarters.get(&quarter)?.get(row_key)?.cells.get(index)
    }

    /// Rows of one quarter sorted by category display order, then row key.
    pub fn rows_in_display_order(&self, quarter: Quarter) -> Vec<(&str, &GridRow)> {
        let mut rows: Vec<(&str, &GridRow)> = self
            .quarters
            .get(&quarter)
            .map(|rows| rows.iter().map(|(key, row)| (key.as_str(), row)).collect())
            .unwrap_or_default();
        rows.sort_by(|(key_a, row_a), (key_b, row_b)| {
            row_a
                .display_order
                .cmp(&row_b.display_order)
                .then_with(|| key_a.cmp(key_b))
        });
        rows
    }

    /// Categories that hold more than one row in any quarter.
    pub fn categories_with_multiple_rows(&self) -> BTreeSet<&str> {
        self.category_counts
            .values()
            .flat_map(|counts| counts.iter())
            .filter(|(_, count)| **count > 1)
            .map(|(category, _)| category.as_str())
            .collect()
    }

    /// All placed units in the grid, in quarter/row/week order.
    pub fn flatten(&self) -> Vec<PlacedUnit> {
        self.quarters
            .values()
            .flat_map(|rows| rows.values())
            .flat_map(|row| row.cells.iter())
            .flat_map(|cell| cell.units().iter().cloned())
            .collect()
    }
}

/// Row key of a lineage: category name for ordinary categories, subject name
/// for the exemption category.
pub fn row_key(catalog: &Catalog, lineage: Lineage) -> Option<String> {
    match lineage {
        Lineage::Category(id) => catalog.category(id).map(|category| category.name.clone()),
        Lineage::Subject(id) => catalog.subject(id).map(|subject| subject.name.clone()),
    }
}

/// Buckets units into the quarter/row/week grid.
pub fn build_grid(units: &[PlacedUnit], catalog: &Catalog) -> ProjectionGrid {
    let mut grid = ProjectionGrid {
        quarters: Quarter::ALL
            .iter()
            .map(|quarter| (*quarter, BTreeMap::new()))
            .collect(),
        ..ProjectionGrid::default()
    };
    let mut rows_per_category: BTreeMap<Quarter, BTreeMap<String, BTreeSet<String>>> =
        BTreeMap::new();

    for unit in units {
        let Some(week_index) = week_index(unit.week) else {
            warn!(
                "event=grid_unit_excluded module=grid status=rejected unit_id={} reason=week_out_of_range week={}",
                unit.id, unit.week
            );
            grid.excluded.push(unit.id);
            continue;
        };
        let resolved = catalog.entry(unit.catalog_entry_id).and_then(|entry| {
            let subject = catalog.subject(entry.subject_id)?;
            let category = catalog.category(subject.category_id)?;
            let lineage = catalog.lineage_of_subject(subject.id)?;
            Some((subject, category, row_key(catalog, lineage)?))
        });
        let Some((subject, category, key)) = resolved else {
            warn!(
                "event=grid_unit_excluded module=grid status=rejected unit_id={} reason=unknown_catalog_entry",
                unit.id
            );
            grid.excluded.push(unit.id);
            continue;
        };

        grid.subject_to_category
            .insert(subject.name.clone(), category.name.clone());
        grid.subject_to_category_display_order
            .insert(subject.name.clone(), category.display_order);
        rows_per_category
            .entry(unit.quarter)
            .or_default()
            .entry(category.name.clone())
            .or_default()
            .insert(key.clone());

        grid.quarters
            .entry(unit.quarter)
            .or_default()
            .entry(key)
            .or_insert_with(|| GridRow::new(category.name.clone(), category.display_order))
            .cells[week_index]
            .push(unit.clone());
    }

    grid.category_counts = rows_per_category
        .into_iter()
        .map(|(quarter, categories)| {
            let counts = categories
                .into_iter()
                .map(|(category, rows)| (category, rows.len()))
                .collect();
            (quarter, counts)
        })
        .collect();

    debug!(
        "event=grid_build module=grid status=ok units={} excluded={}",
        units.len(),
        grid.excluded.len()
    );
    grid
}

fn week_index(week: u8) -> Option<usize> {
    if (1..=WEEKS_PER_QUARTER).contains(&week) {
        Some(usize::from(week) - 1)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::{build_grid, GridCell};
    use crate::model::catalog::{Catalog, CatalogEntry, Category, Subject};
    use crate::model::placement::{PlacedUnit, Quarter, Slot};

    #[test]
    fn stacks_units_sharing_a_cell() {
        let mut catalog = Catalog::default();
        let math = catalog
            .insert_category(Category::new("Math", 1))
            .expect("category");
        let math1 = catalog
            .insert_subject(Subject::new("Math 1", math, Some(1)))
            .expect("subject");
        let first = catalog
            .insert_entry(CatalogEntry::new(math1, "1001", 1))
            .expect("entry");
        let second = catalog
            .insert_entry(CatalogEntry::new(math1, "1002", 2))
            .expect("entry");

        let units = vec![
            PlacedUnit::new(first, Slot::new(Quarter::Q1, 4)),
            PlacedUnit::new(second, Slot::new(Quarter::Q1, 4)),
        ];
        let grid = build_grid(&units, &catalog);

        let cell = grid.cell(Quarter::Q1, "Math", 4).expect("cell exists");
        assert_eq!(cell.len(), 2);
        assert!(cell.single().is_none());
        assert_eq!(grid.cell(Quarter::Q1, "Math", 5), Some(&GridCell::default()));
        assert_eq!(grid.cell(Quarter::Q1, "Math", 0), None);
    }
}
