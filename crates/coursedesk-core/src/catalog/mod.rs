//! The read-only academic catalog.
//!
//! Navigation and search only ever read from a [`CatalogStore`]. Ingestion and
//! document storage live elsewhere; [`InMemoryCatalog`] serves a TOML seed.

mod memory;

use std::fmt;

use coursedesk_macros::Validate;
use serde::{Deserialize, Serialize};

use crate::BoxFuture;

pub use memory::{CatalogSeed, InMemoryCatalog};

/// A university, college or faculty. The root of the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[validate(section = "institution")]
pub struct Institution {
    #[validate(non_empty)]
    pub id: String,
    #[validate(non_empty)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// A department inside an institution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[validate(section = "unit")]
pub struct SubUnit {
    #[validate(non_empty)]
    pub id: String,
    pub institution: String,
    #[validate(non_empty)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// A course taught by a sub-unit in a given year and term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[validate(section = "course")]
pub struct Course {
    #[validate(non_empty)]
    pub id: String,
    pub unit: String,
    #[validate(range(min = 1, max = 6))]
    pub year: u8,
    #[validate(range(min = 1, max = 2))]
    pub term: u8,
    #[validate(non_empty)]
    pub code: String,
    #[validate(non_empty)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// A chapter of a course. Derived from document labels, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Chapter {
    pub course: String,
    pub label: String,
}

/// Kind of a document. Declaration order is the display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Slide,
    Book,
    Exam,
}

impl DocumentKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Slide => "slide",
            DocumentKind::Book => "book",
            DocumentKind::Exam => "exam",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single document attached to a course chapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[validate(section = "document")]
pub struct Document {
    #[validate(non_empty)]
    pub id: String,
    pub course: String,
    /// Chapter label; empty when the document belongs to no chapter.
    #[serde(default)]
    pub chapter: String,
    #[validate(non_empty)]
    pub title: String,
    pub kind: DocumentKind,
}

/// Any node of the catalog hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CatalogNode {
    Institution(Institution),
    SubUnit(SubUnit),
    Course(Course),
    Chapter(Chapter),
    Document(Document),
}

impl CatalogNode {
    /// Display name of the node.
    pub fn name(&self) -> &str {
        match self {
            CatalogNode::Institution(i) => &i.name,
            CatalogNode::SubUnit(u) => &u.name,
            CatalogNode::Course(c) => &c.name,
            CatalogNode::Chapter(c) => &c.label,
            CatalogNode::Document(d) => &d.title,
        }
    }

    /// Where this node hangs in the hierarchy.
    pub fn parent(&self) -> ParentRef {
        match self {
            CatalogNode::Institution(_) => ParentRef::Root,
            CatalogNode::SubUnit(u) => ParentRef::Institution(u.institution.clone()),
            CatalogNode::Course(c) => ParentRef::SubUnit(c.unit.clone()),
            CatalogNode::Chapter(c) => ParentRef::Course(c.course.clone()),
            CatalogNode::Document(d) => ParentRef::Chapter {
                course: d.course.clone(),
                label: d.chapter.clone(),
            },
        }
    }
}

/// Parent selector for [`CatalogStore::list_children`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParentRef {
    Root,
    Institution(String),
    SubUnit(String),
    Course(String),
    Chapter { course: String, label: String },
}

/// Errors from catalog access.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog unavailable: {0}")]
    Unavailable(String),

    #[error("failed to read catalog seed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse catalog seed: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid catalog seed: {0}")]
    Invalid(String),
}

/// Read-only access to the catalog.
///
/// Implementations return nodes in a stable order; callers impose the display
/// order. Keyword matching is case-insensitive substring matching.
pub trait CatalogStore: Send + Sync {
    /// Look up an institution, sub-unit, course or document by id.
    fn node<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<CatalogNode>, CatalogError>>;

    /// Children of `parent`: institutions under `Root`, sub-units of an
    /// institution, every course of a sub-unit, the distinct non-empty chapters
    /// of a course, or the documents of a chapter.
    fn list_children<'a>(
        &'a self,
        parent: &'a ParentRef,
    ) -> BoxFuture<'a, Result<Vec<CatalogNode>, CatalogError>>;

    /// Courses whose name, description or code contains `keyword`.
    fn search_courses<'a>(
        &'a self,
        keyword: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Course>, CatalogError>>;

    /// Documents whose title or chapter label contains `keyword`.
    fn search_documents<'a>(
        &'a self,
        keyword: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Document>, CatalogError>>;
}
