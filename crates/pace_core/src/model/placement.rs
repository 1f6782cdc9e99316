//! Placed unit model and calendar coordinates.
//!
//! # Responsibility
//! - Define the 4 quarter x 9 week calendar grid coordinates.
//! - Define a placed pace with its grade and append-only grade history.
//!
//! # Invariants
//! - `Slot` ordering is chronological: quarter first, then week.
//! - `grade_history` only ever grows.

use crate::model::catalog::CatalogEntryId;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type UnitId = Uuid;

/// Weeks in one academic quarter.
pub const WEEKS_PER_QUARTER: u8 = 9;
/// Weeks in one academic year.
pub const WEEKS_PER_YEAR: usize = 4 * WEEKS_PER_QUARTER as usize;

/// Academic quarter, totally ordered `Q1 < Q2 < Q3 < Q4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Quarter {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Quarter {
    pub const ALL: [Quarter; 4] = [Quarter::Q1, Quarter::Q2, Quarter::Q3, Quarter::Q4];

    /// 1-based quarter number.
    pub fn number(self) -> u8 {
        match self {
            Self::Q1 => 1,
            Self::Q2 => 2,
            Self::Q3 => 3,
            Self::Q4 => 4,
        }
    }

    pub fn from_number(value: i64) -> Option<Self> {
        match value {
            1 => Some(Self::Q1),
            2 => Some(Self::Q2),
            3 => Some(Self::Q3),
            4 => Some(Self::Q4),
            _ => None,
        }
    }

    /// Parses `"Q<n>"` (case-insensitive) or a bare digit string.
    pub fn parse_label(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        let digits = trimmed
            .strip_prefix('Q')
            .or_else(|| trimmed.strip_prefix('q'))
            .unwrap_or(trimmed);
        digits.parse::<i64>().ok().and_then(Self::from_number)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Q1 => "Q1",
            Self::Q2 => "Q2",
            Self::Q3 => "Q3",
            Self::Q4 => "Q4",
        }
    }
}

impl Display for Quarter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Quarter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for Quarter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawQuarter::deserialize(deserializer)?;
        raw.normalize()
            .ok_or_else(|| D::Error::custom(format!("unrecognized quarter `{raw}`")))
    }
}

/// Quarter as it arrives on the wire: a 1-based integer or a `"Q<n>"` label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawQuarter {
    Number(i64),
    Label(String),
}

impl RawQuarter {
    pub fn normalize(&self) -> Option<Quarter> {
        match self {
            Self::Number(value) => Quarter::from_number(*value),
            Self::Label(value) => Quarter::parse_label(value),
        }
    }
}

impl From<Quarter> for RawQuarter {
    fn from(value: Quarter) -> Self {
        Self::Label(value.label().to_string())
    }
}

impl Display for RawQuarter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{value}"),
            Self::Label(value) => f.write_str(value),
        }
    }
}

/// One position on the calendar grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Slot {
    pub quarter: Quarter,
    /// 1-based week within the quarter.
    pub week: u8,
}

impl Slot {
    pub fn new(quarter: Quarter, week: u8) -> Self {
        Self { quarter, week }
    }

    pub fn is_valid(&self) -> bool {
        (1..=WEEKS_PER_QUARTER).contains(&self.week)
    }

    /// Zero-based week index across the whole year.
    pub fn year_index(&self) -> usize {
        (self.quarter.number() as usize - 1) * WEEKS_PER_QUARTER as usize
            + (self.week as usize).saturating_sub(1)
    }

    pub fn from_year_index(index: usize) -> Option<Self> {
        if index >= WEEKS_PER_YEAR {
            return None;
        }
        let quarter = Quarter::from_number((index / WEEKS_PER_QUARTER as usize) as i64 + 1)?;
        let week = (index % WEEKS_PER_QUARTER as usize) as u8 + 1;
        Some(Self { quarter, week })
    }
}

impl Display for Slot {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} week {}", self.quarter, self.week)
    }
}

/// Completion state of a placed unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaceStatus {
    Pending,
    Completed,
    Failed,
    Unfinished,
}

impl PaceStatus {
    pub fn from_grade(grade: u8, pass_threshold: u8) -> Self {
        if grade >= pass_threshold {
            Self::Completed
        } else {
            Self::Failed
        }
    }
}

/// One recorded grading attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeEntry {
    pub grade: u8,
    /// Unix epoch milliseconds.
    pub date: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// A pace placed on a student's projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedUnit {
    pub id: UnitId,
    pub catalog_entry_id: CatalogEntryId,
    pub quarter: Quarter,
    pub week: u8,
    pub grade: Option<u8>,
    pub status: PaceStatus,
    /// Slot the unit occupied before its first move.
    #[serde(default)]
    pub original_quarter: Option<Quarter>,
    #[serde(default)]
    pub original_week: Option<u8>,
    #[serde(default)]
    pub grade_history: Vec<GradeEntry>,
}

impl PlacedUnit {
    /// Creates an ungraded, pending unit at `slot`.
    pub fn new(catalog_entry_id: CatalogEntryId, slot: Slot) -> Self {
        Self {
            id: Uuid::new_v4(),
            catalog_entry_id,
            quarter: slot.quarter,
            week: slot.week,
            grade: None,
            status: PaceStatus::Pending,
            original_quarter: None,
            original_week: None,
            grade_history: Vec::new(),
        }
    }

    pub fn slot(&self) -> Slot {
        Slot::new(self.quarter, self.week)
    }

    pub fn is_graded(&self) -> bool {
        self.grade.is_some()
    }

    /// Moves the unit, remembering the first planned slot.
    pub fn relocate(&mut self, to: Slot) {
        if to == self.slot() {
            return;
        }
        if self.original_quarter.is_none() {
            self.original_quarter = Some(self.quarter);
            self.original_week = Some(self.week);
        }
        self.quarter = to.quarter;
        self.week = to.week;
    }

    /// Appends one attempt and derives the current grade/status from it.
    pub fn record_grade(&mut self, entry: GradeEntry, pass_threshold: u8) {
        self.grade = Some(entry.grade);
        self.status = PaceStatus::from_grade(entry.grade, pass_threshold);
        self.grade_history.push(entry);
    }

    /// Clears the current grade; history is kept.
    pub fn clear_grade(&mut self) {
        self.grade = None;
        self.status = PaceStatus::Pending;
    }

    pub fn failed_attempts(&self, pass_threshold: u8) -> usize {
        self.grade_history
            .iter()
            .filter(|entry| entry.grade < pass_threshold)
            .count()
    }
}
