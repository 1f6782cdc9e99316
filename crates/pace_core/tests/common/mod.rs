#![allow(dead_code)]

use pace_core::model::catalog::{CatalogEntryId, CategoryId, SubjectId};
use pace_core::model::placement::{PlacedUnit, Quarter, Slot};
use pace_core::{
    Catalog, CatalogEntry, Category, EngineConfig, InMemoryProjectionStore, ManualClock,
    Projection, ProjectionService, StudentSummary, Subject,
};
use uuid::Uuid;

pub const START_MS: i64 = 1_700_000_000_000;

/// Demo catalog:
/// - Math: Math 1/2/3 (levels 1..3), codes 1001..1036, order 1..36.
/// - English: English 1 (level 1), codes 2001..2012, order 1..12.
/// - Electives: Art (3001..3020) and Music (4001..4010), unleveled.
pub struct Fixture {
    pub catalog: Catalog,
    pub math: CategoryId,
    pub english: CategoryId,
    pub electives: CategoryId,
    pub math1: SubjectId,
    pub math2: SubjectId,
    pub math3: SubjectId,
    pub english1: SubjectId,
    pub art: SubjectId,
    pub music: SubjectId,
}

impl Fixture {
    pub fn new() -> Self {
        let mut catalog = Catalog::default();
        let math = catalog.insert_category(Category::new("Math", 1)).unwrap();
        let english = catalog.insert_category(Category::new("English", 2)).unwrap();
        let electives = catalog
            .insert_category(Category::new("Electives", 9))
            .unwrap();

        let math1 = catalog
            .insert_subject(Subject::new("Math 1", math, Some(1)))
            .unwrap();
        let math2 = catalog
            .insert_subject(Subject::new("Math 2", math, Some(2)))
            .unwrap();
        let math3 = catalog
            .insert_subject(Subject::new("Math 3", math, Some(3)))
            .unwrap();
        let english1 = catalog
            .insert_subject(Subject::new("English 1", english, Some(1)))
            .unwrap();
        let art = catalog
            .insert_subject(Subject::new("Art", electives, None))
            .unwrap();
        let music = catalog
            .insert_subject(Subject::new("Music", electives, None))
            .unwrap();

        for (index, subject) in [math1, math2, math3].into_iter().enumerate() {
            for offset in 1..=12 {
                let order = (index as i64) * 12 + offset;
                catalog
                    .insert_entry(CatalogEntry::new(subject, format!("{}", 1000 + order), order))
                    .unwrap();
            }
        }
        for order in 1..=12 {
            catalog
                .insert_entry(CatalogEntry::new(english1, format!("{}", 2000 + order), order))
                .unwrap();
        }
        for order in 1..=20 {
            catalog
                .insert_entry(CatalogEntry::new(art, format!("{}", 3000 + order), order))
                .unwrap();
        }
        for order in 1..=10 {
            catalog
                .insert_entry(CatalogEntry::new(music, format!("{}", 4000 + order), order))
                .unwrap();
        }

        Self {
            catalog,
            math,
            english,
            electives,
            math1,
            math2,
            math3,
            english1,
            art,
            music,
        }
    }

    /// Entry id for a catalog code; codes are unique across this catalog.
    pub fn entry(&self, code: &str) -> CatalogEntryId {
        self.catalog
            .subjects()
            .flat_map(|subject| self.catalog.entries_for_subject(subject.id))
            .find(|entry| entry.code == code)
            .map(|entry| entry.id)
            .unwrap_or_else(|| panic!("fixture has no code {code}"))
    }

    /// Open projection with units placed as `(code, quarter, week)`.
    pub fn projection(&self, leveled: bool, placements: &[(&str, Quarter, u8)]) -> Projection {
        let mut projection = Projection::new(student(leveled));
        for (code, quarter, week) in placements {
            projection
                .units
                .push(PlacedUnit::new(self.entry(code), Slot::new(*quarter, *week)));
        }
        projection
    }

    pub fn store(&self) -> InMemoryProjectionStore {
        InMemoryProjectionStore::new(self.catalog.clone(), EngineConfig::default())
    }
}

pub fn student(leveled: bool) -> StudentSummary {
    StudentSummary {
        id: Uuid::new_v4(),
        name: "Ana".to_string(),
        is_leveled: leveled,
    }
}

/// Loaded service over a borrowed store with a manual clock at `START_MS`.
pub fn service<'a>(
    fixture: &Fixture,
    store: &'a InMemoryProjectionStore,
    clock: &'a ManualClock,
    projection: Projection,
) -> ProjectionService<&'a InMemoryProjectionStore, &'a ManualClock> {
    let projection_id = store.insert_projection(projection).unwrap();
    let mut service = ProjectionService::with_clock(
        store,
        fixture.catalog.clone(),
        EngineConfig::default(),
        projection_id,
        clock,
    );
    service.load().unwrap();
    service
}

pub fn unit_at(projection: &Projection, entry: CatalogEntryId) -> &PlacedUnit {
    projection
        .units
        .iter()
        .find(|unit| unit.catalog_entry_id == entry)
        .unwrap()
}
