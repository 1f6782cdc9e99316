mod common;

use common::Fixture;
use pace_core::model::placement::{PlacedUnit, Quarter, Slot};
use pace_core::{build_grid, ProjectionSnapshot};
use std::collections::BTreeSet;

fn ids(units: &[PlacedUnit]) -> BTreeSet<uuid::Uuid> {
    units.iter().map(|unit| unit.id).collect()
}

#[test]
fn flatten_returns_every_valid_unit() {
    let fixture = Fixture::new();
    let projection = fixture.projection(
        false,
        &[
            ("1001", Quarter::Q1, 1),
            ("1002", Quarter::Q1, 1),
            ("1013", Quarter::Q2, 5),
            ("2001", Quarter::Q1, 1),
            ("3001", Quarter::Q3, 9),
            ("4001", Quarter::Q3, 9),
        ],
    );

    let grid = build_grid(&projection.units, &fixture.catalog);

    assert!(grid.excluded.is_empty());
    let flattened = grid.flatten();
    assert_eq!(flattened.len(), projection.units.len());
    assert_eq!(ids(&flattened), ids(&projection.units));
}

#[test]
fn ordinary_category_shares_one_row_and_electives_split_per_subject() {
    let fixture = Fixture::new();
    let projection = fixture.projection(
        false,
        &[
            ("1001", Quarter::Q1, 1),
            ("1013", Quarter::Q1, 2),
            ("1025", Quarter::Q1, 3),
            ("3001", Quarter::Q1, 1),
            ("4001", Quarter::Q1, 1),
        ],
    );

    let grid = build_grid(&projection.units, &fixture.catalog);
    let rows = grid.rows(Quarter::Q1).unwrap();

    assert_eq!(
        rows.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["Art", "Math", "Music"]
    );
    assert_eq!(rows["Math"].unit_count(), 3);
    assert_eq!(rows["Art"].category, "Electives");
    assert_eq!(grid.category_counts[&Quarter::Q1]["Math"], 1);
    assert_eq!(grid.category_counts[&Quarter::Q1]["Electives"], 2);
    assert_eq!(grid.subject_to_category["Math 2"], "Math");
    assert_eq!(grid.subject_to_category_display_order["Music"], 9);
    assert!(grid.categories_with_multiple_rows().contains("Electives"));
    assert!(!grid.categories_with_multiple_rows().contains("Math"));

    let ordered: Vec<&str> = grid
        .rows_in_display_order(Quarter::Q1)
        .into_iter()
        .map(|(key, _)| key)
        .collect();
    assert_eq!(ordered.first(), Some(&"Math"));
}

#[test]
fn shared_cell_keeps_both_units() {
    let fixture = Fixture::new();
    let projection = fixture.projection(
        false,
        &[("1001", Quarter::Q2, 4), ("1002", Quarter::Q2, 4)],
    );

    let grid = build_grid(&projection.units, &fixture.catalog);
    let cell = grid.cell(Quarter::Q2, "Math", 4).unwrap();

    assert_eq!(cell.len(), 2);
    assert!(cell.single().is_none());
    assert!(grid.cell(Quarter::Q2, "Math", 5).unwrap().is_empty());
}

#[test]
fn all_quarters_present_even_when_empty() {
    let fixture = Fixture::new();
    let grid = build_grid(&[], &fixture.catalog);
    for quarter in Quarter::ALL {
        assert!(grid.rows(quarter).unwrap().is_empty());
    }
}

#[test]
fn unknown_entries_and_bad_weeks_are_excluded() {
    let fixture = Fixture::new();
    let mut projection = fixture.projection(false, &[("1001", Quarter::Q1, 1)]);
    let orphan = PlacedUnit::new(uuid::Uuid::new_v4(), Slot::new(Quarter::Q1, 2));
    let mut late = PlacedUnit::new(fixture.entry("1002"), Slot::new(Quarter::Q1, 3));
    late.week = 12;
    projection.units.push(orphan.clone());
    projection.units.push(late.clone());

    let grid = build_grid(&projection.units, &fixture.catalog);

    assert_eq!(grid.flatten().len(), 1);
    assert_eq!(grid.excluded, vec![orphan.id, late.id]);
}

#[test]
fn snapshot_with_numeric_and_label_quarters_lands_in_same_rows() {
    let fixture = Fixture::new();
    let raw = serde_json::json!({
        "id": uuid::Uuid::new_v4(),
        "status": "OPEN",
        "student": {"id": uuid::Uuid::new_v4(), "name": "Ana", "isLeveled": true},
        "units": [
            {"id": uuid::Uuid::new_v4(), "catalogEntryId": fixture.entry("1001"),
             "quarter": 1, "week": 2, "grade": null, "status": "PENDING"},
            {"id": uuid::Uuid::new_v4(), "catalogEntryId": fixture.entry("1002"),
             "quarter": "q1", "week": 3, "grade": null, "status": "PENDING"},
            {"id": uuid::Uuid::new_v4(), "catalogEntryId": fixture.entry("1003"),
             "quarter": "Q7", "week": 3, "grade": null, "status": "PENDING"}
        ]
    });

    let snapshot: ProjectionSnapshot = serde_json::from_value(raw).unwrap();
    let normalized = snapshot.normalize();
    assert!(normalized.projection.student.is_leveled);
    assert_eq!(normalized.excluded.len(), 1);

    let grid = build_grid(&normalized.projection.units, &fixture.catalog);
    assert_eq!(grid.rows(Quarter::Q1).unwrap()["Math"].unit_count(), 2);
}
