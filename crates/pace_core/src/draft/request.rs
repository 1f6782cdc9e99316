//! Wizard payload and its submit-time validation.

use crate::config::EngineConfig;
use crate::draft::availability::{available_codes, next_levels_count};
use crate::draft::selection::SelectionRejection;
use crate::model::catalog::{Catalog, CategoryId, SubjectId};
use crate::model::projection::StudentId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type SchoolId = Uuid;

/// Per-subject drafting options. Lives only until submit or cancel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectDraftConfig {
    pub category_id: CategoryId,
    pub subject_id: SubjectId,
    pub start_code: Option<u32>,
    pub end_code: Option<u32>,
    #[serde(default)]
    pub skip_codes: BTreeSet<u32>,
    /// Subjects this one should not share weeks with.
    #[serde(default)]
    pub not_pair_with: BTreeSet<SubjectId>,
    #[serde(default)]
    pub extend_to_next_level: bool,
}

impl SubjectDraftConfig {
    pub fn new(category_id: CategoryId, subject_id: SubjectId) -> Self {
        Self {
            category_id,
            subject_id,
            start_code: None,
            end_code: None,
            skip_codes: BTreeSet::new(),
            not_pair_with: BTreeSet::new(),
            extend_to_next_level: false,
        }
    }

    /// Codes the config expands to, given the subject's available codes.
    pub fn selected_codes(&self, available: &[u32]) -> Vec<u32> {
        let (Some(start), Some(end)) = (self.start_code, self.end_code) else {
            return Vec::new();
        };
        available
            .iter()
            .copied()
            .filter(|code| (start..=end).contains(code) && !self.skip_codes.contains(code))
            .collect()
    }
}

/// Projection generation request, submitted as one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftRequest {
    pub student_id: StudentId,
    pub school_id: SchoolId,
    pub school_year: String,
    pub subjects: Vec<SubjectDraftConfig>,
}

/// Submit-time draft validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftError {
    NoSubjects,
    TooManySubjects { count: usize, max: usize },
    BlankSchoolYear,
    Selection(SelectionRejection),
    MissingRange { subject: String },
    InvertedRange { subject: String, start: u32, end: u32 },
    CodeUnavailable { subject: String, code: u32 },
    SkipOutOfRange { subject: String, code: u32 },
    EmptyRange { subject: String },
    InvalidPairing { subject: String, other: SubjectId },
    ExtensionUnavailable { subject: String },
}

impl Display for DraftError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoSubjects => write!(f, "draft has no selected subjects"),
            Self::TooManySubjects { count, max } => {
                write!(f, "draft has {count} subjects, at most {max} allowed")
            }
            Self::BlankSchoolYear => write!(f, "school year must not be blank"),
            Self::Selection(err) => write!(f, "{err}"),
            Self::MissingRange { subject } => {
                write!(f, "{subject}: start and end codes are required")
            }
            Self::InvertedRange {
                subject,
                start,
                end,
            } => write!(f, "{subject}: start code {start} is after end code {end}"),
            Self::CodeUnavailable { subject, code } => {
                write!(f, "{subject}: pace {code} is not available")
            }
            Self::SkipOutOfRange { subject, code } => {
                write!(f, "{subject}: skipped pace {code} is outside the selected range")
            }
            Self::EmptyRange { subject } => write!(f, "{subject}: range selects no paces"),
            Self::InvalidPairing { subject, other } => {
                write!(f, "{subject}: cannot un-pair with unselected subject {other}")
            }
            Self::ExtensionUnavailable { subject } => {
                write!(f, "{subject}: no next level is available to extend into")
            }
        }
    }
}

impl Error for DraftError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Selection(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SelectionRejection> for DraftError {
    fn from(value: SelectionRejection) -> Self {
        Self::Selection(value)
    }
}

/// Validates a whole request against the catalog.
///
/// Selection rules are checked separately by `verify_subjects`;
/// this covers per-subject ranges and cross-subject references.
pub fn validate_request(
    request: &DraftRequest,
    catalog: &Catalog,
    config: &EngineConfig,
) -> Result<(), DraftError> {
    if request.subjects.is_empty() {
        return Err(DraftError::NoSubjects);
    }
    if request.subjects.len() > config.max_draft_subjects {
        return Err(DraftError::TooManySubjects {
            count: request.subjects.len(),
            max: config.max_draft_subjects,
        });
    }
    if request.school_year.trim().is_empty() {
        return Err(DraftError::BlankSchoolYear);
    }

    let selected: BTreeSet<SubjectId> = request
        .subjects
        .iter()
        .map(|subject| subject.subject_id)
        .collect();
    for subject in &request.subjects {
        validate_config(subject, &selected, catalog, config.max_extension_levels)?;
    }
    Ok(())
}

/// Validates one subject config.
pub fn validate_config(
    draft: &SubjectDraftConfig,
    selected: &BTreeSet<SubjectId>,
    catalog: &Catalog,
    max_levels: u32,
) -> Result<(), DraftError> {
    let subject = catalog
        .subject(draft.subject_id)
        .ok_or(SelectionRejection::UnknownSubject(draft.subject_id))?;
    let name = subject.name.clone();

    if draft.extend_to_next_level && next_levels_count(catalog, subject.id, max_levels) == 0 {
        return Err(DraftError::ExtensionUnavailable { subject: name });
    }

    let (Some(start), Some(end)) = (draft.start_code, draft.end_code) else {
        return Err(DraftError::MissingRange { subject: name });
    };
    if start > end {
        return Err(DraftError::InvertedRange {
            subject: name,
            start,
            end,
        });
    }

    let available = available_codes(catalog, subject.id, draft.extend_to_next_level, max_levels);
    for code in [start, end] {
        if available.binary_search(&code).is_err() {
            return Err(DraftError::CodeUnavailable {
                subject: name,
                code,
            });
        }
    }
    if let Some(code) = draft
        .skip_codes
        .iter()
        .copied()
        .find(|code| !(start..=end).contains(code))
    {
        return Err(DraftError::SkipOutOfRange {
            subject: name,
            code,
        });
    }
    if draft.selected_codes(&available).is_empty() {
        return Err(DraftError::EmptyRange { subject: name });
    }

    if let Some(other) = draft
        .not_pair_with
        .iter()
        .copied()
        .find(|other| *other == subject.id || !selected.contains(other))
    {
        return Err(DraftError::InvalidPairing {
            subject: name,
            other,
        });
    }
    Ok(())
}
