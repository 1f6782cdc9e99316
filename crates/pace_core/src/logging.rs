//! Rolling file logs for the engine.
//!
//! # Responsibility
//! - Start one flexi_logger instance per process, with a default level and
//!   optional per-area overrides (`grid`, `draft`, `store`, ...).
//! - Render free text (subject names, loading keys, notes, panic payloads)
//!   as single bounded `key=value` tokens.
//!
//! # Invariants
//! - Re-init with the same spec and directory is a no-op; any other spec or
//!   directory is refused.
//! - Init never panics.

use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::{error, info, LevelFilter};
use once_cell::sync::OnceCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const LOG_FILE_BASENAME: &str = "pace_engine";
const MAX_LOG_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
const MAX_LOG_FILES: usize = 5;
const MAX_FIELD_CHARS: usize = 80;

static LOGGING_STATE: OnceCell<LoggingState> = OnceCell::new();
static PANIC_HOOK_INSTALLED: OnceCell<()> = OnceCell::new();

struct LoggingState {
    spec: String,
    log_dir: PathBuf,
    handle: LoggerHandle,
}

/// Engine area with its own log target, matching the `module=` field of
/// its events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogArea {
    Model,
    Grid,
    Draft,
    Placement,
    Grading,
    Store,
    Service,
}

impl LogArea {
    pub const ALL: [LogArea; 7] = [
        LogArea::Model,
        LogArea::Grid,
        LogArea::Draft,
        LogArea::Placement,
        LogArea::Grading,
        LogArea::Store,
        LogArea::Service,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Grid => "grid",
            Self::Draft => "draft",
            Self::Placement => "placement",
            Self::Grading => "grading",
            Self::Store => "store",
            Self::Service => "service",
        }
    }

    /// Rust module path the area logs from.
    pub fn target(self) -> &'static str {
        match self {
            Self::Model => "pace_core::model",
            Self::Grid => "pace_core::grid",
            Self::Draft => "pace_core::draft",
            Self::Placement => "pace_core::placement",
            Self::Grading => "pace_core::grading",
            Self::Store => "pace_core::repo",
            Self::Service => "pace_core::service",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|area| area.name().eq_ignore_ascii_case(name))
    }
}

/// Default level plus per-area overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    level: LevelFilter,
    areas: BTreeMap<LogArea, LevelFilter>,
}

impl LogSettings {
    pub fn new(level: &str) -> Result<Self, String> {
        Ok(Self {
            level: parse_level(level)?,
            areas: BTreeMap::new(),
        })
    }

    /// Overrides one area; `off` silences it.
    pub fn with_area(mut self, area: LogArea, level: &str) -> Result<Self, String> {
        self.areas.insert(area, parse_level(level)?);
        Ok(self)
    }

    /// flexi_logger spec string, default level first.
    pub fn spec(&self) -> String {
        let mut parts = vec![level_name(self.level)];
        parts.extend(
            self.areas
                .iter()
                .map(|(area, level)| format!("{}={}", area.target(), level_name(*level))),
        );
        parts.join(", ")
    }
}

/// Initializes engine logging at one level for every area.
///
/// # Errors
/// - `level` is not one of trace|debug|info|warn|error|off.
/// - `log_dir` is blank, relative, or cannot be created.
/// - Logging is already active with another spec or directory.
pub fn init_logging(level: &str, log_dir: &str) -> Result<(), String> {
    init_logging_with(&LogSettings::new(level)?, log_dir)
}

/// Initializes engine logging with per-area overrides.
pub fn init_logging_with(settings: &LogSettings, log_dir: &str) -> Result<(), String> {
    let spec = settings.spec();
    let dir = absolute_dir(log_dir)?;

    if let Some(state) = LOGGING_STATE.get() {
        return ensure_same(state, &spec, &dir);
    }

    let state = LOGGING_STATE.get_or_try_init(|| start_logger(&spec, &dir))?;
    ensure_same(state, &spec, &dir)
}

fn start_logger(spec: &str, dir: &Path) -> Result<LoggingState, String> {
    std::fs::create_dir_all(dir)
        .map_err(|err| format!("failed to create log directory `{}`: {err}", dir.display()))?;

    let handle = Logger::try_with_str(spec)
        .map_err(|err| format!("invalid log spec `{spec}`: {err}"))?
        .log_to_file(FileSpec::default().directory(dir).basename(LOG_FILE_BASENAME))
        .rotate(
            Criterion::Size(MAX_LOG_FILE_SIZE_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(MAX_LOG_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .map_err(|err| format!("failed to start logger: {err}"))?;

    install_panic_hook_once();
    info!(
        "event=logging_init module=core status=ok version={} spec={} log_dir={}",
        env!("CARGO_PKG_VERSION"),
        field(spec),
        field(&dir.display().to_string())
    );

    Ok(LoggingState {
        spec: spec.to_string(),
        log_dir: dir.to_path_buf(),
        handle,
    })
}

/// Returns `(spec, log_dir)` when logging is active.
pub fn logging_status() -> Option<(String, PathBuf)> {
    LOGGING_STATE
        .get()
        .map(|state| (state.spec.clone(), state.log_dir.clone()))
}

/// Writes buffered lines to disk.
pub fn flush_logs() {
    if let Some(state) = LOGGING_STATE.get() {
        state.handle.flush();
    }
}

pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

/// Renders free text as one log token: whitespace flattened, capped, and
/// quoted when it contains spaces or `=`.
pub(crate) fn field(value: &str) -> String {
    let flat: String = value
        .chars()
        .map(|ch| if ch.is_whitespace() { ' ' } else { ch })
        .collect();
    let mut capped: String = flat.chars().take(MAX_FIELD_CHARS).collect();
    if flat.chars().count() > MAX_FIELD_CHARS {
        capped.push_str("...");
    }
    if capped.contains([' ', '=', '"']) {
        format!("\"{}\"", capped.replace('"', "'"))
    } else {
        capped
    }
}

fn ensure_same(state: &LoggingState, spec: &str, dir: &Path) -> Result<(), String> {
    if state.log_dir != dir {
        return Err(format!(
            "logging already writes to `{}`; refusing to switch to `{}`",
            state.log_dir.display(),
            dir.display()
        ));
    }
    if state.spec != spec {
        return Err(format!(
            "logging already runs with `{}`; refusing to switch to `{spec}`",
            state.spec
        ));
    }
    Ok(())
}

fn parse_level(level: &str) -> Result<LevelFilter, String> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok(LevelFilter::Trace),
        "debug" => Ok(LevelFilter::Debug),
        "info" => Ok(LevelFilter::Info),
        "warn" | "warning" => Ok(LevelFilter::Warn),
        "error" => Ok(LevelFilter::Error),
        "off" => Ok(LevelFilter::Off),
        other => Err(format!(
            "unsupported log level `{other}`; expected trace|debug|info|warn|error|off"
        )),
    }
}

fn level_name(level: LevelFilter) -> String {
    level.to_string().to_ascii_lowercase()
}

fn absolute_dir(log_dir: &str) -> Result<PathBuf, String> {
    let trimmed = log_dir.trim();
    if trimmed.is_empty() {
        return Err("log_dir cannot be empty".to_string());
    }
    let path = PathBuf::from(trimmed);
    if !path.is_absolute() {
        return Err(format!("log_dir must be an absolute path, got `{trimmed}`"));
    }
    Ok(path)
}

fn install_panic_hook_once() {
    if PANIC_HOOK_INSTALLED.set(()).is_err() {
        return;
    }
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .map(|message| (*message).to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        error!(
            "event=panic_captured module=core status=error thread={} location={} payload={}",
            field(std::thread::current().name().unwrap_or("unnamed")),
            field(&location),
            field(&payload)
        );
        flush_logs();
        previous(info);
    }));
}
