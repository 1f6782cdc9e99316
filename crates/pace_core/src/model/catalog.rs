//! Catalog reference data.
//!
//! # Responsibility
//! - Hold categories, subjects and pace entries with referential checks.
//! - Resolve the ordering lineage of a subject or entry.
//!
//! # Invariants
//! - Every subject references an existing category.
//! - Every entry references an existing subject and has a 4-digit code.
//! - `revision` grows on every successful insert.

use crate::config::DEFAULT_EXEMPTION_CATEGORY;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type CategoryId = Uuid;
pub type SubjectId = Uuid;
pub type CatalogEntryId = Uuid;

/// Immutable pace reference record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub id: CatalogEntryId,
    /// Four ASCII digits, e.g. `"1002"`.
    pub code: String,
    pub subject_id: SubjectId,
    /// Required completion position inside the lineage.
    pub order_index: i64,
    /// Free-form authoring label.
    #[serde(default)]
    pub difficulty: Option<String>,
}

impl CatalogEntry {
    pub fn new(subject_id: SubjectId, code: impl Into<String>, order_index: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            code: code.into(),
            subject_id,
            order_index,
            difficulty: None,
        }
    }

    /// Numeric value of `code`, when it is well formed.
    pub fn code_number(&self) -> Option<u32> {
        if is_pace_code(&self.code) {
            self.code.parse().ok()
        } else {
            None
        }
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        if !is_pace_code(&self.code) {
            return Err(CatalogError::InvalidCode(self.code.clone()));
        }
        Ok(())
    }
}

/// Subject grouping with a display position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub display_order: i32,
}

impl Category {
    pub fn new(name: impl Into<String>, display_order: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            display_order,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
    pub category_id: CategoryId,
    /// Absent for exemption-category subjects.
    #[serde(default)]
    pub level_number: Option<u32>,
}

impl Subject {
    pub fn new(name: impl Into<String>, category_id: CategoryId, level_number: Option<u32>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            category_id,
            level_number,
        }
    }
}

/// Ordering scope of placed units.
///
/// Ordinary categories form one leveled curriculum, so every subject in them
/// shares the category lineage. Exemption-category subjects are independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Lineage {
    Category(CategoryId),
    Subject(SubjectId),
}

/// Catalog registry errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    InvalidCode(String),
    BlankName,
    DuplicateId(Uuid),
    CategoryNotFound(CategoryId),
    SubjectNotFound(SubjectId),
}

impl Display for CatalogError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCode(code) => write!(f, "pace code must be 4 digits, got `{code}`"),
            Self::BlankName => write!(f, "catalog names must not be blank"),
            Self::DuplicateId(id) => write!(f, "catalog id already registered: {id}"),
            Self::CategoryNotFound(id) => write!(f, "category not found: {id}"),
            Self::SubjectNotFound(id) => write!(f, "subject not found: {id}"),
        }
    }
}

impl Error for CatalogError {}

/// In-memory catalog registry.
#[derive(Debug, Clone)]
pub struct Catalog {
    exemption_category: String,
    categories: BTreeMap<CategoryId, Category>,
    subjects: BTreeMap<SubjectId, Subject>,
    entries: BTreeMap<CatalogEntryId, CatalogEntry>,
    revision: u64,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(DEFAULT_EXEMPTION_CATEGORY)
    }
}

impl Catalog {
    /// Creates an empty catalog using `exemption_category` as the
    /// multi-subject category name.
    pub fn new(exemption_category: impl Into<String>) -> Self {
        Self {
            exemption_category: exemption_category.into().trim().to_string(),
            categories: BTreeMap::new(),
            subjects: BTreeMap::new(),
            entries: BTreeMap::new(),
            revision: 0,
        }
    }

    pub fn exemption_category(&self) -> &str {
        &self.exemption_category
    }

    /// Monotonic change counter for cache invalidation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn insert_category(&mut self, category: Category) -> Result<CategoryId, CatalogError> {
        if category.name.trim().is_empty() {
            return Err(CatalogError::BlankName);
        }
        if self.categories.contains_key(&category.id) {
            return Err(CatalogError::DuplicateId(category.id));
        }
        let id = category.id;
        self.categories.insert(id, category);
        self.revision += 1;
        Ok(id)
    }

    pub fn insert_subject(&mut self, subject: Subject) -> Result<SubjectId, CatalogError> {
        if subject.name.trim().is_empty() {
            return Err(CatalogError::BlankName);
        }
        if !self.categories.contains_key(&subject.category_id) {
            return Err(CatalogError::CategoryNotFound(subject.category_id));
        }
        if self.subjects.contains_key(&subject.id) {
            return Err(CatalogError::DuplicateId(subject.id));
        }
        let id = subject.id;
        self.subjects.insert(id, subject);
        self.revision += 1;
        Ok(id)
    }

    pub fn insert_entry(&mut self, entry: CatalogEntry) -> Result<CatalogEntryId, CatalogError> {
        entry.validate()?;
        if !self.subjects.contains_key(&entry.subject_id) {
            return Err(CatalogError::SubjectNotFound(entry.subject_id));
        }
        if self.entries.contains_key(&entry.id) {
            return Err(CatalogError::DuplicateId(entry.id));
        }
        let id = entry.id;
        self.entries.insert(id, entry);
        self.revision += 1;
        Ok(id)
    }

    pub fn category(&self, id: CategoryId) -> Option<&Category> {
        self.categories.get(&id)
    }

    pub fn subject(&self, id: SubjectId) -> Option<&Subject> {
        self.subjects.get(&id)
    }

    pub fn entry(&self, id: CatalogEntryId) -> Option<&CatalogEntry> {
        self.entries.get(&id)
    }

    pub fn categories(&self) -> impl Iterator<Item = &Category> {
        self.categories.values()
    }

    pub fn subjects(&self) -> impl Iterator<Item = &Subject> {
        self.subjects.values()
    }

    pub fn category_of(&self, subject_id: SubjectId) -> Option<&Category> {
        let subject = self.subjects.get(&subject_id)?;
        self.categories.get(&subject.category_id)
    }

    pub fn is_exemption_category(&self, category_id: CategoryId) -> bool {
        self.categories
            .get(&category_id)
            .map(|category| {
                category
                    .name
                    .trim()
                    .eq_ignore_ascii_case(&self.exemption_category)
            })
            .unwrap_or(false)
    }

    pub fn lineage_of_subject(&self, subject_id: SubjectId) -> Option<Lineage> {
        let subject = self.subjects.get(&subject_id)?;
        if self.is_exemption_category(subject.category_id) {
            Some(Lineage::Subject(subject.id))
        } else {
            Some(Lineage::Category(subject.category_id))
        }
    }

    pub fn lineage_of_entry(&self, entry_id: CatalogEntryId) -> Option<Lineage> {
        let entry = self.entries.get(&entry_id)?;
        self.lineage_of_subject(entry.subject_id)
    }

    /// Subjects of one category in level order (unleveled last), then name.
    pub fn subjects_in_category(&self, category_id: CategoryId) -> Vec<&Subject> {
        let mut subjects: Vec<&Subject> = self
            .subjects
            .values()
            .filter(|subject| subject.category_id == category_id)
            .collect();
        subjects.sort_by(|a, b| {
            let level_a = a.level_number.unwrap_or(u32::MAX);
            let level_b = b.level_number.unwrap_or(u32::MAX);
            level_a.cmp(&level_b).then_with(|| a.name.cmp(&b.name))
        });
        subjects
    }

    /// Entries of one subject sorted by `order_index`.
    pub fn entries_for_subject(&self, subject_id: SubjectId) -> Vec<&CatalogEntry> {
        let mut entries: Vec<&CatalogEntry> = self
            .entries
            .values()
            .filter(|entry| entry.subject_id == subject_id)
            .collect();
        entries.sort_by_key(|entry| entry.order_index);
        entries
    }

    /// Highest subject level in a category that has fetched entries.
    pub fn max_fetched_level(&self, category_id: CategoryId) -> Option<u32> {
        self.subjects
            .values()
            .filter(|subject| subject.category_id == category_id)
            .filter(|subject| {
                self.entries
                    .values()
                    .any(|entry| entry.subject_id == subject.id)
            })
            .filter_map(|subject| subject.level_number)
            .max()
    }
}

fn is_pace_code(value: &str) -> bool {
    value.len() == 4 && value.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::{Catalog, CatalogEntry, CatalogError, Category, Lineage, Subject};
    use uuid::Uuid;

    #[test]
    fn rejects_malformed_codes_and_dangling_references() {
        let mut catalog = Catalog::default();
        let math = catalog
            .insert_category(Category::new("Math", 1))
            .expect("category insert");
        let math1 = catalog
            .insert_subject(Subject::new("Math 1", math, Some(1)))
            .expect("subject insert");

        let err = catalog
            .insert_entry(CatalogEntry::new(math1, "10a2", 1))
            .expect_err("non-digit code must fail");
        assert_eq!(err, CatalogError::InvalidCode("10a2".to_string()));

        let orphan = Uuid::new_v4();
        let err = catalog
            .insert_entry(CatalogEntry::new(orphan, "1001", 1))
            .expect_err("unknown subject must fail");
        assert_eq!(err, CatalogError::SubjectNotFound(orphan));

        let before = catalog.revision();
        catalog
            .insert_entry(CatalogEntry::new(math1, "1001", 1))
            .expect("valid entry");
        assert_eq!(catalog.revision(), before + 1);
    }

    #[test]
    fn exemption_subjects_have_their_own_lineage() {
        let mut catalog = Catalog::new("Electives");
        let math = catalog
            .insert_category(Category::new("Math", 1))
            .expect("category insert");
        let electives = catalog
            .insert_category(Category::new(" electives ", 9))
            .expect("category insert");
        let math1 = catalog
            .insert_subject(Subject::new("Math 1", math, Some(1)))
            .expect("subject insert");
        let art = catalog
            .insert_subject(Subject::new("Art", electives, None))
            .expect("subject insert");

        assert_eq!(catalog.lineage_of_subject(math1), Some(Lineage::Category(math)));
        assert_eq!(catalog.lineage_of_subject(art), Some(Lineage::Subject(art)));
    }

    #[test]
    fn max_fetched_level_ignores_subjects_without_entries() {
        let mut catalog = Catalog::default();
        let math = catalog
            .insert_category(Category::new("Math", 1))
            .expect("category insert");
        let math1 = catalog
            .insert_subject(Subject::new("Math 1", math, Some(1)))
            .expect("subject insert");
        catalog
            .insert_subject(Subject::new("Math 2", math, Some(2)))
            .expect("subject insert");
        catalog
            .insert_entry(CatalogEntry::new(math1, "1001", 1))
            .expect("entry insert");

        assert_eq!(catalog.max_fetched_level(math), Some(1));
    }
}
