mod common;

use common::{student, Fixture};
use pace_core::draft::availability::{available_codes, next_levels_count, PaceAvailability};
use pace_core::draft::plan::{plan_draft, quarter_load};
use pace_core::draft::request::{validate_request, DraftError, DraftRequest, SubjectDraftConfig};
use pace_core::draft::selection::{DraftSelection, SelectionRejection};
use pace_core::model::placement::Quarter;
use pace_core::placement::rules::projection_is_ordered;
use pace_core::{
    CatalogEntry, DraftService, EngineConfig, ProjectionStore, SelectionMode, ServiceError,
    SubmitOutcome,
};
use std::collections::BTreeSet;
use uuid::Uuid;

fn ranged(config: &mut SubjectDraftConfig, start: u32, end: u32) {
    config.start_code = Some(start);
    config.end_code = Some(end);
}

#[test]
fn contiguous_mode_accepts_neighbors_of_selected_run() {
    let fixture = Fixture::new();
    let catalog = &fixture.catalog;

    for neighbor in [fixture.math1, fixture.math3] {
        let mut selection = DraftSelection::new(6);
        selection
            .select_subject(catalog, SelectionMode::Contiguous, 0, fixture.math2)
            .unwrap();
        selection
            .select_subject(catalog, SelectionMode::Contiguous, 1, neighbor)
            .unwrap();
    }
}

#[test]
fn contiguous_mode_rejects_gap_and_reports_selected() {
    let fixture = Fixture::new();
    let mut selection = DraftSelection::new(6);
    selection
        .select_subject(&fixture.catalog, SelectionMode::Contiguous, 0, fixture.math1)
        .unwrap();

    let err = selection
        .select_subject(&fixture.catalog, SelectionMode::Contiguous, 1, fixture.math3)
        .unwrap_err();
    assert_eq!(
        err,
        SelectionRejection::NotContiguous {
            subject: "Math 3".to_string(),
            category: "Math".to_string(),
            selected: vec!["Math 1".to_string()],
        }
    );
    assert_eq!(selection.selected_count(), 1);
}

#[test]
fn electives_allow_several_subjects_in_single_subject_mode() {
    let fixture = Fixture::new();
    let mut selection = DraftSelection::new(6);
    selection
        .select_subject(&fixture.catalog, SelectionMode::SingleSubject, 0, fixture.art)
        .unwrap();
    selection
        .select_subject(&fixture.catalog, SelectionMode::SingleSubject, 1, fixture.music)
        .unwrap();
    selection
        .select_subject(&fixture.catalog, SelectionMode::SingleSubject, 2, fixture.math1)
        .unwrap();

    let err = selection
        .select_subject(&fixture.catalog, SelectionMode::SingleSubject, 3, fixture.math2)
        .unwrap_err();
    assert!(matches!(err, SelectionRejection::CategoryTaken { .. }));
    assert!(err.to_string().contains("Math 1"));

    let err = selection
        .select_subject(&fixture.catalog, SelectionMode::SingleSubject, 4, fixture.art)
        .unwrap_err();
    assert_eq!(
        err,
        SelectionRejection::AlreadySelected {
            subject: "Art".to_string()
        }
    );
}

#[test]
fn extension_is_capped_and_limited_to_fetched_levels() {
    let fixture = Fixture::new();
    let catalog = &fixture.catalog;

    assert_eq!(next_levels_count(catalog, fixture.math1, 2), 2);
    assert_eq!(next_levels_count(catalog, fixture.math2, 2), 1);
    assert_eq!(next_levels_count(catalog, fixture.math3, 2), 0);
    assert_eq!(next_levels_count(catalog, fixture.math1, 1), 1);
    assert_eq!(next_levels_count(catalog, fixture.art, 2), 0);

    let plain = available_codes(catalog, fixture.math1, false, 2);
    assert_eq!(plain, (1001..=1012).collect::<Vec<u32>>());
    let extended = available_codes(catalog, fixture.math1, true, 2);
    assert_eq!(extended, (1001..=1036).collect::<Vec<u32>>());
}

#[test]
fn availability_cache_invalidates_on_draft_or_catalog_change() {
    let mut fixture = Fixture::new();
    let mut availability = PaceAvailability::new(2);

    assert_eq!(availability.codes(&fixture.catalog, 1, fixture.math2, false).len(), 12);
    availability.codes(&fixture.catalog, 1, fixture.math2, true);
    assert_eq!(availability.cached_len(), 2);

    availability.codes(&fixture.catalog, 2, fixture.math2, false);
    assert_eq!(availability.cached_len(), 1);

    fixture
        .catalog
        .insert_entry(CatalogEntry::new(fixture.math2, "1099", 99))
        .unwrap();
    let refreshed = availability.codes(&fixture.catalog, 2, fixture.math2, false);
    assert_eq!(refreshed.len(), 13);
    assert_eq!(refreshed.last(), Some(&1099));
}

#[test]
fn request_validation_reports_first_bad_subject() {
    let fixture = Fixture::new();
    let config = EngineConfig::default();
    let mut math = SubjectDraftConfig::new(fixture.math, fixture.math1);
    let mut request = DraftRequest {
        student_id: Uuid::new_v4(),
        school_id: Uuid::new_v4(),
        school_year: "2026-2027".to_string(),
        subjects: vec![],
    };
    assert_eq!(
        validate_request(&request, &fixture.catalog, &config).unwrap_err(),
        DraftError::NoSubjects
    );

    request.subjects = vec![math.clone()];
    assert_eq!(
        validate_request(&request, &fixture.catalog, &config).unwrap_err(),
        DraftError::MissingRange {
            subject: "Math 1".to_string()
        }
    );

    ranged(&mut math, 1010, 1003);
    request.subjects = vec![math.clone()];
    assert!(matches!(
        validate_request(&request, &fixture.catalog, &config).unwrap_err(),
        DraftError::InvertedRange { .. }
    ));

    // 1020 belongs to Math 2 and needs the extension.
    ranged(&mut math, 1001, 1020);
    request.subjects = vec![math.clone()];
    assert_eq!(
        validate_request(&request, &fixture.catalog, &config).unwrap_err(),
        DraftError::CodeUnavailable {
            subject: "Math 1".to_string(),
            code: 1020
        }
    );
    math.extend_to_next_level = true;
    request.subjects = vec![math.clone()];
    validate_request(&request, &fixture.catalog, &config).unwrap();

    math.skip_codes = BTreeSet::from([1030]);
    request.subjects = vec![math.clone()];
    assert_eq!(
        validate_request(&request, &fixture.catalog, &config).unwrap_err(),
        DraftError::SkipOutOfRange {
            subject: "Math 1".to_string(),
            code: 1030
        }
    );

    math.skip_codes.clear();
    math.not_pair_with = BTreeSet::from([fixture.art]);
    request.subjects = vec![math.clone()];
    assert!(matches!(
        validate_request(&request, &fixture.catalog, &config).unwrap_err(),
        DraftError::InvalidPairing { .. }
    ));

    let mut art = SubjectDraftConfig::new(fixture.electives, fixture.art);
    ranged(&mut art, 3001, 3004);
    request.subjects = vec![math, art];
    validate_request(&request, &fixture.catalog, &config).unwrap();

    let mut music = SubjectDraftConfig::new(fixture.electives, fixture.music);
    ranged(&mut music, 4001, 4002);
    music.extend_to_next_level = true;
    request.subjects = vec![music];
    assert_eq!(
        validate_request(&request, &fixture.catalog, &config).unwrap_err(),
        DraftError::ExtensionUnavailable {
            subject: "Music".to_string()
        }
    );
}

#[test]
fn plan_skips_codes_and_spreads_in_order() {
    let fixture = Fixture::new();
    let mut math = SubjectDraftConfig::new(fixture.math, fixture.math1);
    ranged(&mut math, 1001, 1012);
    math.skip_codes = BTreeSet::from([1005]);

    let plan = plan_draft(&fixture.catalog, &[math], 2);
    assert_eq!(plan.len(), 11);
    assert!(plan
        .iter()
        .all(|unit| unit.catalog_entry_id != fixture.entry("1005")));
    assert!(plan.windows(2).all(|pair| pair[0].slot <= pair[1].slot));

    let load = quarter_load(&plan);
    assert_eq!(load[&Quarter::Q1], 3);
    assert_eq!(load[&Quarter::Q2], 3);
    assert_eq!(load[&Quarter::Q3], 3);
    assert_eq!(load[&Quarter::Q4], 2);
}

fn fill_heavy_draft<S: ProjectionStore>(draft: &mut DraftService<S>, fixture: &Fixture) {
    let math = draft.select_subject(0, fixture.math1).unwrap();
    math.start_code = Some(1001);
    math.end_code = Some(1036);
    math.extend_to_next_level = true;
    let english = draft.select_subject(1, fixture.english1).unwrap();
    english.start_code = Some(2001);
    english.end_code = Some(2012);
    let art = draft.select_subject(2, fixture.art).unwrap();
    art.start_code = Some(3001);
    art.end_code = Some(3020);
    let music = draft.select_subject(3, fixture.music).unwrap();
    music.start_code = Some(4001);
    music.end_code = Some(4010);
}

#[test]
fn draft_submit_generates_ordered_projection() {
    let fixture = Fixture::new();
    let store = fixture.store();
    let learner = student(false);
    store.register_student(learner.clone()).unwrap();

    let mut draft = DraftService::new(&store, fixture.catalog.clone(), EngineConfig::default());
    fill_heavy_draft(&mut draft, &fixture);
    assert_eq!(draft.available_codes(0).unwrap().len(), 36);
    assert_eq!(draft.plan().len(), 78);

    let outcome = draft.submit(&learner, Uuid::new_v4(), "2026-2027").unwrap();
    let SubmitOutcome::Generated(projection_id) = outcome else {
        panic!("expected generation, got {outcome:?}");
    };
    assert_eq!(draft.selection().selected_count(), 0);

    let projection = store.projection(projection_id).unwrap();
    assert_eq!(projection.units.len(), 78);
    assert_eq!(projection.student, learner);
    assert!(projection_is_ordered(&projection, &fixture.catalog));
}

#[test]
fn heavy_draft_for_leveled_student_needs_confirmation() {
    let fixture = Fixture::new();
    let store = fixture.store();
    let learner = student(true);
    store.register_student(learner.clone()).unwrap();

    let mut draft = DraftService::new(&store, fixture.catalog.clone(), EngineConfig::default());
    fill_heavy_draft(&mut draft, &fixture);
    let load = draft.quarter_load();
    assert_eq!(load[&Quarter::Q1], 20);
    assert_eq!(load[&Quarter::Q2], 19);

    let outcome = draft.submit(&learner, Uuid::new_v4(), "2026-2027").unwrap();
    let SubmitOutcome::ConfirmationRequired(prompt) = outcome else {
        panic!("expected overload prompt, got {outcome:?}");
    };
    assert_eq!(prompt.quarter, Quarter::Q1);
    assert_eq!(prompt.expected_units, 20);
    assert_eq!(prompt.cap, 18);
    assert_eq!(draft.selection().selected_count(), 4);
    assert!(!store.calls().unwrap().contains(&"generate_projection"));

    draft.confirm_overload(false);
    let outcome = draft.submit(&learner, Uuid::new_v4(), "2026-2027").unwrap();
    assert!(matches!(outcome, SubmitOutcome::Generated(_)));
}

#[test]
fn invalid_draft_never_reaches_store() {
    let fixture = Fixture::new();
    let store = fixture.store();
    let learner = student(false);
    let mut draft = DraftService::new(&store, fixture.catalog.clone(), EngineConfig::default());
    draft.select_subject(0, fixture.math1).unwrap();

    let err = draft.submit(&learner, Uuid::new_v4(), "2026-2027").unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Draft(DraftError::MissingRange { .. })
    ));
    let err = draft.submit(&learner, Uuid::new_v4(), "  ").unwrap_err();
    assert_eq!(err, ServiceError::Draft(DraftError::BlankSchoolYear));
    assert!(store.calls().unwrap().is_empty());
}

#[test]
fn store_rechecks_selection_rules_on_generate() {
    let fixture = Fixture::new();
    let store = fixture.store();
    let learner = student(false);
    store.register_student(learner.clone()).unwrap();

    let mut math1 = SubjectDraftConfig::new(fixture.math, fixture.math1);
    ranged(&mut math1, 1001, 1012);
    let mut math2 = SubjectDraftConfig::new(fixture.math, fixture.math2);
    ranged(&mut math2, 1013, 1024);
    let request = DraftRequest {
        student_id: learner.id,
        school_id: Uuid::new_v4(),
        school_year: "2026-2027".to_string(),
        subjects: vec![math1, math2],
    };
    validate_request(&request, &fixture.catalog, &EngineConfig::default()).unwrap();

    let err = store.generate_projection(&request).unwrap_err();
    let pace_core::StoreError::Rejected(failure) = err else {
        panic!("expected rejection, got {err:?}");
    };
    assert_eq!(failure.code, "invalid_draft");
    assert!(failure.message.contains("Math"));
}

#[test]
fn neighbor_level_needs_contiguous_mode() {
    let fixture = Fixture::new();
    let default_mode = EngineConfig::default().selection_mode;

    let mut selection = DraftSelection::new(6);
    selection
        .select_subject(&fixture.catalog, default_mode, 0, fixture.math2)
        .unwrap();
    let err = selection
        .select_subject(&fixture.catalog, default_mode, 1, fixture.math1)
        .unwrap_err();
    assert!(matches!(err, SelectionRejection::CategoryTaken { .. }));

    selection
        .select_subject(&fixture.catalog, SelectionMode::Contiguous, 1, fixture.math1)
        .unwrap();
    assert_eq!(selection.selected_count(), 2);
}
