//! Level extension and available pace codes.

use crate::model::catalog::{Catalog, Subject, SubjectId};
use log::debug;
use std::collections::{BTreeSet, HashMap};

/// Number of following levels a subject may extend into.
///
/// `min(max_fetched_level - level, max_levels)`; zero for exemption-category
/// subjects and subjects without a level.
pub fn next_levels_count(catalog: &Catalog, subject_id: SubjectId, max_levels: u32) -> u32 {
    let Some(subject) = catalog.subject(subject_id) else {
        return 0;
    };
    if catalog.is_exemption_category(subject.category_id) {
        return 0;
    }
    let Some(level) = subject.level_number else {
        return 0;
    };
    catalog
        .max_fetched_level(subject.category_id)
        .map(|max_level| max_level.saturating_sub(level).min(max_levels))
        .unwrap_or(0)
}

/// Subjects in the levels directly after `subject_id`, nearest first.
pub fn extension_subjects(catalog: &Catalog, subject_id: SubjectId, max_levels: u32) -> Vec<&Subject> {
    let count = next_levels_count(catalog, subject_id, max_levels);
    let (Some(subject), true) = (catalog.subject(subject_id), count > 0) else {
        return Vec::new();
    };
    let Some(level) = subject.level_number else {
        return Vec::new();
    };
    catalog
        .subjects_in_category(subject.category_id)
        .into_iter()
        .filter(|candidate| {
            candidate
                .level_number
                .is_some_and(|candidate_level| candidate_level > level && candidate_level <= level + count)
        })
        .collect()
}

/// The subject plus, when `extend` is set, its extension subjects.
pub fn subject_span(
    catalog: &Catalog,
    subject_id: SubjectId,
    extend: bool,
    max_levels: u32,
) -> Vec<SubjectId> {
    let mut span = vec![subject_id];
    if extend {
        span.extend(
            extension_subjects(catalog, subject_id, max_levels)
                .into_iter()
                .map(|subject| subject.id),
        );
    }
    span
}

/// Sorted, de-duplicated integer codes across the subject span.
pub fn available_codes(
    catalog: &Catalog,
    subject_id: SubjectId,
    extend: bool,
    max_levels: u32,
) -> Vec<u32> {
    subject_span(catalog, subject_id, extend, max_levels)
        .into_iter()
        .flat_map(|id| catalog.entries_for_subject(id))
        .filter_map(|entry| entry.code_number())
        .collect::<BTreeSet<u32>>()
        .into_iter()
        .collect()
}

/// Memoized available codes keyed by `(subject, extend)`.
///
/// The whole cache is dropped when the draft subject count or the catalog
/// revision differs from the last lookup.
#[derive(Debug, Clone)]
pub struct PaceAvailability {
    max_levels: u32,
    draft_len: usize,
    catalog_revision: u64,
    cache: HashMap<(SubjectId, bool), Vec<u32>>,
}

impl PaceAvailability {
    pub fn new(max_levels: u32) -> Self {
        Self {
            max_levels,
            draft_len: 0,
            catalog_revision: 0,
            cache: HashMap::new(),
        }
    }

    pub fn codes(
        &mut self,
        catalog: &Catalog,
        draft_len: usize,
        subject_id: SubjectId,
        extend: bool,
    ) -> &[u32] {
        if self.draft_len != draft_len || self.catalog_revision != catalog.revision() {
            if !self.cache.is_empty() {
                debug!(
                    "event=availability_invalidate module=draft status=ok entries={}",
                    self.cache.len()
                );
            }
            self.cache.clear();
            self.draft_len = draft_len;
            self.catalog_revision = catalog.revision();
        }
        let max_levels = self.max_levels;
        self.cache
            .entry((subject_id, extend))
            .or_insert_with(|| available_codes(catalog, subject_id, extend, max_levels))
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }
}
