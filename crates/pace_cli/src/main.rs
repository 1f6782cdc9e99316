//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `pace_core` wiring end to end.
//! - Draft a demo projection, generate it in the in-memory store, and print
//!   the resulting grid.
//!
//! Usage: `pace_cli [config.json] [log_dir] [area=level ...]`,
//! e.g. `store=debug grid=off`.

use log::info;
use pace_core::model::catalog::{CatalogEntry, Category, Subject};
use pace_core::model::placement::Quarter;
use pace_core::{
    Catalog, DraftService, EngineConfig, InMemoryProjectionStore, LogArea, LogSettings,
    ProjectionService, StudentSummary, SubmitOutcome,
};
use std::process::ExitCode;
use uuid::Uuid;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("pace_cli error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), String> {
    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => {
            let raw = std::fs::read_to_string(&path).map_err(|err| format!("{path}: {err}"))?;
            EngineConfig::from_json(&raw).map_err(|err| err.to_string())?
        }
        None => EngineConfig::default(),
    };
    if let Some(log_dir) = args.next() {
        let mut settings = LogSettings::new(pace_core::default_log_level())?;
        for area_level in args {
            let (area, level) = area_level
                .split_once('=')
                .ok_or_else(|| format!("expected area=level, got `{area_level}`"))?;
            let area = LogArea::parse(area).ok_or_else(|| format!("unknown log area `{area}`"))?;
            settings = settings.with_area(area, level)?;
        }
        pace_core::init_logging_with(&settings, &log_dir)?;
    }

    println!("pace_core version={}", pace_core::core_version());
    let catalog = demo_catalog(&config).map_err(|err| err.to_string())?;
    let store = InMemoryProjectionStore::new(catalog.clone(), config.clone());
    let student = StudentSummary {
        id: Uuid::new_v4(),
        name: "Demo Student".to_string(),
        is_leveled: false,
    };
    store
        .register_student(student.clone())
        .map_err(|err| err.to_string())?;

    let mut draft = DraftService::new(&store, catalog.clone(), config.clone());
    for (slot, (name, start, end)) in [("Math 1", 1001, 1012), ("Art", 3001, 3009)]
        .into_iter()
        .enumerate()
    {
        let subject_id = catalog
            .subjects()
            .find(|subject| subject.name == name)
            .map(|subject| subject.id)
            .ok_or_else(|| format!("demo subject missing: {name}"))?;
        let selected = draft
            .select_subject(slot, subject_id)
            .map_err(|err| err.to_string())?;
        selected.start_code = Some(start);
        selected.end_code = Some(end);
    }

    let projection_id = match draft
        .submit(&student, Uuid::new_v4(), "2026-2027")
        .map_err(|err| err.to_string())?
    {
        SubmitOutcome::Generated(id) => id,
        SubmitOutcome::ConfirmationRequired(prompt) => {
            return Err(format!("unexpected overload prompt: {prompt}"))
        }
    };
    info!(
        "event=cli_demo module=cli status=ok projection_id={}",
        projection_id
    );

    let mut service = ProjectionService::new(&store, catalog, config, projection_id);
    service.load().map_err(|err| err.to_string())?;
    let grid = service.grid().map_err(|err| err.to_string())?;
    for quarter in Quarter::ALL {
        println!("{quarter}");
        for (key, row) in grid.rows_in_display_order(quarter) {
            let cells: Vec<String> = row
                .cells
                .iter()
                .map(|cell| match cell.len() {
                    0 => ".".to_string(),
                    count => count.to_string(),
                })
                .collect();
            println!("  {key:<10} {}", cells.join(" "));
        }
    }
    pace_core::flush_logs();
    Ok(())
}

fn demo_catalog(config: &EngineConfig) -> Result<Catalog, pace_core::CatalogError> {
    let mut catalog = Catalog::new(config.exemption_category.clone());
    let math = catalog.insert_category(Category::new("Math", 1))?;
    let electives =
        catalog.insert_category(Category::new(config.exemption_category.clone(), 9))?;
    let math1 = catalog.insert_subject(Subject::new("Math 1", math, Some(1)))?;
    let art = catalog.insert_subject(Subject::new("Art", electives, None))?;
    for order in 1..=12 {
        catalog.insert_entry(CatalogEntry::new(math1, format!("{}", 1000 + order), order))?;
    }
    for order in 1..=9 {
        catalog.insert_entry(CatalogEntry::new(art, format!("{}", 3000 + order), order))?;
    }
    Ok(catalog)
}
