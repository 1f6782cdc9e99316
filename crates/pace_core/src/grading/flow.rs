//! Two-phase grade entry.

use crate::model::placement::{GradeEntry, UnitId};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Grade entry errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradingError {
    OutOfRange(i32),
}

impl Display for GradingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfRange(value) => write!(f, "grade must be within 0..=100, got {value}"),
        }
    }
}

impl Error for GradingError {}

/// Phase one: a validated numeric grade awaiting its optional note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradeCapture {
    unit_id: UnitId,
    grade: u8,
}

impl GradeCapture {
    pub fn begin(unit_id: UnitId, grade: i32) -> Result<Self, GradingError> {
        if !(0..=100).contains(&grade) {
            return Err(GradingError::OutOfRange(grade));
        }
        Ok(Self {
            unit_id,
            grade: grade as u8,
        })
    }

    pub fn unit_id(&self) -> UnitId {
        self.unit_id
    }

    pub fn grade(&self) -> u8 {
        self.grade
    }

    /// Phase two with a note. A blank note is treated as no note.
    pub fn with_note(self, note: impl Into<String>) -> GradeCommit {
        let note = note.into();
        let trimmed = note.trim();
        GradeCommit {
            unit_id: self.unit_id,
            grade: self.grade,
            note: (!trimmed.is_empty()).then(|| trimmed.to_string()),
        }
    }

    /// Phase two skipped: commit the grade alone.
    pub fn skip_comment(self) -> GradeCommit {
        GradeCommit {
            unit_id: self.unit_id,
            grade: self.grade,
            note: None,
        }
    }
}

/// Completed grade entry ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradeCommit {
    pub unit_id: UnitId,
    pub grade: u8,
    pub note: Option<String>,
}

impl GradeCommit {
    pub fn into_entry(self, date_ms: i64) -> GradeEntry {
        GradeEntry {
            grade: self.grade,
            date: date_ms,
            note: self.note,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{GradeCapture, GradingError};
    use uuid::Uuid;

    #[test]
    fn rejects_grades_outside_scale() {
        let unit = Uuid::new_v4();
        assert_eq!(
            GradeCapture::begin(unit, 101).expect_err("101 must fail"),
            GradingError::OutOfRange(101)
        );
        assert_eq!(
            GradeCapture::begin(unit, -1).expect_err("-1 must fail"),
            GradingError::OutOfRange(-1)
        );
        assert!(GradeCapture::begin(unit, 0).is_ok());
        assert!(GradeCapture::begin(unit, 100).is_ok());
    }

    #[test]
    fn skip_and_blank_note_commit_without_note() {
        let unit = Uuid::new_v4();
        let capture = GradeCapture::begin(unit, 85).expect("valid grade");
        assert_eq!(capture.skip_comment().note, None);
        assert_eq!(capture.with_note("   ").note, None);

        let commit = capture.with_note(" retook after review ");
        assert_eq!(commit.note.as_deref(), Some("retook after review"));
        assert_eq!(commit.into_entry(42).date, 42);
    }
}
