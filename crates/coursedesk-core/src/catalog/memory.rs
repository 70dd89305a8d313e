use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{
    CatalogError, CatalogNode, CatalogStore, Chapter, Course, Document, Institution, ParentRef,
    SubUnit,
};
use crate::BoxFuture;
use crate::token::DELIMITER;

/// On-disk layout of a catalog seed file.
///
/// ```toml
/// [[institutions]]
/// id = "eng"
/// name = "Faculty of Engineering"
///
/// [[units]]
/// id = "cs"
/// institution = "eng"
/// name = "Computer Science"
///
/// [[courses]]
/// id = "cs101"
/// unit = "cs"
/// year = 1
/// term = 1
/// code = "cs101"
/// name = "Introduction to Programming"
///
/// [[documents]]
/// id = "d1"
/// course = "cs101"
/// chapter = "Chapter 1"
/// title = "Intro Slides"
/// kind = "slide"
/// ```
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub institutions: Vec<Institution>,
    #[serde(default)]
    pub units: Vec<SubUnit>,
    #[serde(default)]
    pub courses: Vec<Course>,
    #[serde(default)]
    pub documents: Vec<Document>,
}

/// Catalog held entirely in memory, in seed order.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    institutions: Vec<Institution>,
    units: Vec<SubUnit>,
    courses: Vec<Course>,
    documents: Vec<Document>,
}

impl InMemoryCatalog {
    /// A catalog with no entries.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a catalog from a seed, enforcing the schema constraints.
    ///
    /// Course codes are upper-cased. Ids must be non-empty, free of the token
    /// delimiter, unique across the whole catalog, and every parent reference
    /// must resolve.
    pub fn from_seed(mut seed: CatalogSeed) -> Result<Self, CatalogError> {
        let mut errors = Vec::new();

        for course in &mut seed.courses {
            course.code = course.code.trim().to_uppercase();
        }

        let records = seed
            .institutions
            .iter()
            .map(|i| i.validate())
            .chain(seed.units.iter().map(|u| u.validate()))
            .chain(seed.courses.iter().map(|c| c.validate()))
            .chain(seed.documents.iter().map(|d| d.validate()));
        for result in records {
            if let Err(messages) = result {
                errors.extend(messages);
            }
        }

        let mut ids = HashSet::new();
        let all_ids = seed
            .institutions
            .iter()
            .map(|i| &i.id)
            .chain(seed.units.iter().map(|u| &u.id))
            .chain(seed.courses.iter().map(|c| &c.id))
            .chain(seed.documents.iter().map(|d| &d.id));
        for id in all_ids {
            if id.contains(DELIMITER) {
                errors.push(format!("id {id:?} contains {DELIMITER:?}"));
            }
            if !ids.insert(id.as_str()) {
                errors.push(format!("duplicate id {id:?}"));
            }
        }

        let institution_ids: HashSet<&str> =
            seed.institutions.iter().map(|i| i.id.as_str()).collect();
        let unit_ids: HashSet<&str> = seed.units.iter().map(|u| u.id.as_str()).collect();
        let course_ids: HashSet<&str> = seed.courses.iter().map(|c| c.id.as_str()).collect();

        for unit in &seed.units {
            if !institution_ids.contains(unit.institution.as_str()) {
                errors.push(format!(
                    "unit {:?} references unknown institution {:?}",
                    unit.id, unit.institution
                ));
            }
        }
        for course in &seed.courses {
            if !unit_ids.contains(course.unit.as_str()) {
                errors.push(format!(
                    "course {:?} references unknown unit {:?}",
                    course.id, course.unit
                ));
            }
        }
        for document in &seed.documents {
            if !course_ids.contains(document.course.as_str()) {
                errors.push(format!(
                    "document {:?} references unknown course {:?}",
                    document.id, document.course
                ));
            }
        }

        if !errors.is_empty() {
            return Err(CatalogError::Invalid(errors.join("; ")));
        }

        for document in &mut seed.documents {
            document.chapter = document.chapter.trim().to_string();
        }

        Ok(Self {
            institutions: seed.institutions,
            units: seed.units,
            courses: seed.courses,
            documents: seed.documents,
        })
    }

    /// Parse and validate a TOML seed.
    pub fn parse(s: &str) -> Result<Self, CatalogError> {
        let seed: CatalogSeed = toml::from_str(s)?;
        Self::from_seed(seed)
    }

    /// Load a TOML seed file using async I/O.
    pub async fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = tokio::fs::read_to_string(path).await?;
        let catalog = Self::parse(&content)?;
        info!(
            path = %path.display(),
            institutions = catalog.institutions.len(),
            units = catalog.units.len(),
            courses = catalog.courses.len(),
            documents = catalog.documents.len(),
            "Catalog loaded"
        );
        Ok(catalog)
    }

    fn lookup(&self, id: &str) -> Option<CatalogNode> {
        if let Some(i) = self.institutions.iter().find(|i| i.id == id) {
            return Some(CatalogNode::Institution(i.clone()));
        }
        if let Some(u) = self.units.iter().find(|u| u.id == id) {
            return Some(CatalogNode::SubUnit(u.clone()));
        }
        if let Some(c) = self.courses.iter().find(|c| c.id == id) {
            return Some(CatalogNode::Course(c.clone()));
        }
        self.documents
            .iter()
            .find(|d| d.id == id)
            .map(|d| CatalogNode::Document(d.clone()))
    }

    fn children(&self, parent: &ParentRef) -> Vec<CatalogNode> {
        match parent {
            ParentRef::Root => self
                .institutions
                .iter()
                .cloned()
                .map(CatalogNode::Institution)
                .collect(),
            ParentRef::Institution(id) => self
                .units
                .iter()
                .filter(|u| &u.institution == id)
                .cloned()
                .map(CatalogNode::SubUnit)
                .collect(),
            ParentRef::SubUnit(id) => self
                .courses
                .iter()
                .filter(|c| &c.unit == id)
                .cloned()
                .map(CatalogNode::Course)
                .collect(),
            ParentRef::Course(id) => {
                let mut seen = HashSet::new();
                self.documents
                    .iter()
                    .filter(|d| &d.course == id && !d.chapter.is_empty())
                    .filter(|d| seen.insert(d.chapter.as_str()))
                    .map(|d| {
                        CatalogNode::Chapter(Chapter {
                            course: d.course.clone(),
                            label: d.chapter.clone(),
                        })
                    })
                    .collect()
            }
            ParentRef::Chapter { course, label } => self
                .documents
                .iter()
                .filter(|d| &d.course == course && &d.chapter == label)
                .cloned()
                .map(CatalogNode::Document)
                .collect(),
        }
    }
}

fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

impl CatalogStore for InMemoryCatalog {
    fn node<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<CatalogNode>, CatalogError>> {
        Box::pin(async move { Ok(self.lookup(id)) })
    }

    fn list_children<'a>(
        &'a self,
        parent: &'a ParentRef,
    ) -> BoxFuture<'a, Result<Vec<CatalogNode>, CatalogError>> {
        Box::pin(async move { Ok(self.children(parent)) })
    }

    fn search_courses<'a>(
        &'a self,
        keyword: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Course>, CatalogError>> {
        Box::pin(async move {
            let needle = keyword.to_lowercase();
            let hits: Vec<Course> = self
                .courses
                .iter()
                .filter(|c| {
                    contains_ci(&c.name, &needle)
                        || contains_ci(&c.description, &needle)
                        || contains_ci(&c.code, &needle)
                })
                .cloned()
                .collect();
            debug!(keyword, hits = hits.len(), "Course search");
            Ok(hits)
        })
    }

    fn search_documents<'a>(
        &'a self,
        keyword: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Document>, CatalogError>> {
        Box::pin(async move {
            let needle = keyword.to_lowercase();
            let hits: Vec<Document> = self
                .documents
                .iter()
                .filter(|d| contains_ci(&d.title, &needle) || contains_ci(&d.chapter, &needle))
                .cloned()
                .collect();
            debug!(keyword, hits = hits.len(), "Document search");
            Ok(hits)
        })
    }
}
