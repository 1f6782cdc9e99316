//! Subject slot selection rules for the projection wizard.
//!
//! # Invariants
//! - Ordinary categories hold one subject per draft in single-subject mode,
//!   or an unbroken level run in contiguous mode.
//! - The exemption category accepts any number of distinct subjects.

use crate::config::SelectionMode;
use crate::draft::request::SubjectDraftConfig;
use crate::model::catalog::{Catalog, CategoryId, SubjectId};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Reason a subject cannot be placed into a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionRejection {
    SlotOutOfRange { slot: usize, slots: usize },
    UnknownSubject(SubjectId),
    AlreadySelected { subject: String },
    /// Another subject of the category is already selected.
    CategoryTaken { category: String, selected: Vec<String> },
    /// Subject is not adjacent to the selected run of its category.
    NotContiguous {
        subject: String,
        category: String,
        selected: Vec<String>,
    },
}

impl Display for SelectionRejection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SlotOutOfRange { slot, slots } => {
                write!(f, "draft slot {slot} is out of range (0..{slots})")
            }
            Self::UnknownSubject(id) => write!(f, "subject not found: {id}"),
            Self::AlreadySelected { subject } => {
                write!(f, "subject {subject} is already selected")
            }
            Self::CategoryTaken { category, selected } => write!(
                f,
                "category {category} already has a selected subject: {}",
                selected.join(", ")
            ),
            Self::NotContiguous {
                subject,
                category,
                selected,
            } => write!(
                f,
                "subject {subject} is not next to the selected {category} subjects: {}",
                selected.join(", ")
            ),
        }
    }
}

impl Error for SelectionRejection {}

/// Fixed set of subject slots being drafted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftSelection {
    slots: Vec<Option<SubjectDraftConfig>>,
}

impl DraftSelection {
    pub fn new(slot_count: usize) -> Self {
        Self {
            slots: vec![None; slot_count],
        }
    }

    pub fn slots(&self) -> &[Option<SubjectDraftConfig>] {
        &self.slots
    }

    pub fn slot(&self, slot: usize) -> Option<&SubjectDraftConfig> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    pub fn slot_mut(&mut self, slot: usize) -> Option<&mut SubjectDraftConfig> {
        self.slots.get_mut(slot).and_then(Option::as_mut)
    }

    /// Selected configs in slot order.
    pub fn configs(&self) -> Vec<SubjectDraftConfig> {
        self.slots.iter().flatten().cloned().collect()
    }

    pub fn selected_count(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn clear_slot(&mut self, slot: usize) -> Option<SubjectDraftConfig> {
        self.slots.get_mut(slot).and_then(Option::take)
    }

    /// Checks whether `subject_id` may go into `slot` without applying it.
    pub fn check_selection(
        &self,
        catalog: &Catalog,
        mode: SelectionMode,
        slot: usize,
        subject_id: SubjectId,
    ) -> Result<(), SelectionRejection> {
        if slot >= self.slots.len() {
            return Err(SelectionRejection::SlotOutOfRange {
                slot,
                slots: self.slots.len(),
            });
        }
        let subject = catalog
            .subject(subject_id)
            .ok_or(SelectionRejection::UnknownSubject(subject_id))?;

        let others: Vec<SubjectId> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(index, _)| *index != slot)
            .filter_map(|(_, config)| config.as_ref().map(|config| config.subject_id))
            .collect();
        if others.contains(&subject_id) {
            return Err(SelectionRejection::AlreadySelected {
                subject: subject.name.clone(),
            });
        }
        if catalog.is_exemption_category(subject.category_id) {
            return Ok(());
        }

        let same_category: Vec<SubjectId> = others
            .into_iter()
            .filter(|other| {
                catalog
                    .subject(*other)
                    .is_some_and(|other| other.category_id == subject.category_id)
            })
            .collect();
        if same_category.is_empty() {
            return Ok(());
        }

        match mode {
            SelectionMode::SingleSubject => Err(SelectionRejection::CategoryTaken {
                category: category_name(catalog, subject.category_id),
                selected: subject_names(catalog, &same_category),
            }),
            SelectionMode::Contiguous => {
                check_contiguous(catalog, subject.category_id, subject_id, &same_category)
            }
        }
    }

    /// Places a fresh config for `subject_id` into `slot`.
    pub fn select_subject(
        &mut self,
        catalog: &Catalog,
        mode: SelectionMode,
        slot: usize,
        subject_id: SubjectId,
    ) -> Result<&mut SubjectDraftConfig, SelectionRejection> {
        self.check_selection(catalog, mode, slot, subject_id)?;
        let category_id = catalog
            .subject(subject_id)
            .map(|subject| subject.category_id)
            .ok_or(SelectionRejection::UnknownSubject(subject_id))?;
        let config = self.slots[slot].insert(SubjectDraftConfig::new(category_id, subject_id));
        Ok(config)
    }

    /// Re-checks the whole selection.
    ///
    /// Clearing a middle slot in contiguous mode can split a run; this
    /// catches that before submission.
    pub fn verify(&self, catalog: &Catalog, mode: SelectionMode) -> Result<(), SelectionRejection> {
        verify_subjects(
            catalog,
            mode,
            self.slots.iter().flatten().map(|config| config.subject_id),
        )
    }
}

/// Checks a full set of drafted subjects against the selection rules:
/// no repeats, and per ordinary category either one subject or an unbroken
/// run, depending on `mode`.
pub fn verify_subjects(
    catalog: &Catalog,
    mode: SelectionMode,
    subject_ids: impl IntoIterator<Item = SubjectId>,
) -> Result<(), SelectionRejection> {
    let mut seen = BTreeSet::new();
    let mut by_category: BTreeMap<CategoryId, Vec<SubjectId>> = BTreeMap::new();
    for subject_id in subject_ids {
        let subject = catalog
            .subject(subject_id)
            .ok_or(SelectionRejection::UnknownSubject(subject_id))?;
        if !seen.insert(subject.id) {
            return Err(SelectionRejection::AlreadySelected {
                subject: subject.name.clone(),
            });
        }
        if !catalog.is_exemption_category(subject.category_id) {
            by_category
                .entry(subject.category_id)
                .or_default()
                .push(subject.id);
        }
    }

    for (category_id, selected) in by_category {
        if selected.len() < 2 {
            continue;
        }
        if mode == SelectionMode::SingleSubject {
            return Err(SelectionRejection::CategoryTaken {
                category: category_name(catalog, category_id),
                selected: subject_names(catalog, &selected),
            });
        }
        let ordered = catalog.subjects_in_category(category_id);
        let mut positions: Vec<usize> = selected
            .iter()
            .filter_map(|id| ordered.iter().position(|subject| subject.id == *id))
            .collect();
        positions.sort_unstable();
        if let Some(gap) = positions.windows(2).find(|pair| pair[1] - pair[0] > 1) {
            let stray = ordered[gap[1]].id;
            let rest: Vec<SubjectId> = selected.iter().copied().filter(|id| *id != stray).collect();
            return Err(SelectionRejection::NotContiguous {
                subject: ordered[gap[1]].name.clone(),
                category: category_name(catalog, category_id),
                selected: subject_names(catalog, &rest),
            });
        }
    }
    Ok(())
}

fn check_contiguous(
    catalog: &Catalog,
    category_id: CategoryId,
    subject_id: SubjectId,
    selected: &[SubjectId],
) -> Result<(), SelectionRejection> {
    let ordered = catalog.subjects_in_category(category_id);
    let position_of = |id: SubjectId| ordered.iter().position(|subject| subject.id == id);
    let selected_positions: Vec<usize> = selected.iter().filter_map(|id| position_of(*id)).collect();
    let (Some(candidate), Some(min), Some(max)) = (
        position_of(subject_id),
        selected_positions.iter().min().copied(),
        selected_positions.iter().max().copied(),
    ) else {
        return Ok(());
    };

    if candidate + 1 >= min && candidate <= max + 1 {
        return Ok(());
    }
    Err(SelectionRejection::NotContiguous {
        subject: ordered[candidate].name.clone(),
        category: category_name(catalog, category_id),
        selected: subject_names(catalog, selected),
    })
}

fn category_name(catalog: &Catalog, category_id: CategoryId) -> String {
    catalog
        .category(category_id)
        .map(|category| category.name.clone())
        .unwrap_or_else(|| category_id.to_string())
}

fn subject_names(catalog: &Catalog, ids: &[SubjectId]) -> Vec<String> {
    let mut names: Vec<String> = ids
        .iter()
        .map(|id| {
            catalog
                .subject(*id)
                .map(|subject| subject.name.clone())
                .unwrap_or_else(|| id.to_string())
        })
        .collect();
    names.sort();
    names
}
