//! Catalog fixtures.
//!
//! [`sample_catalog`] is a small two-institution catalog that the scenario
//! tests walk and search. [`CountingCatalog`] wraps any store and records how
//! often each query was issued.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use coursedesk_core::BoxFuture;
use coursedesk_core::catalog::{
    CatalogError, CatalogNode, CatalogStore, Course, Document, InMemoryCatalog, ParentRef,
};

/// Seed for [`sample_catalog`].
///
/// - `eng` / `cs` / `cs101` (year 1, term 1): "Chapter 1" holds one slide,
///   "Intro Slides"; "Chapter 2" holds one pdf.
/// - `eng` / `cs` / `cs102` (year 1, term 2): three exams in chapter "Midterm".
/// - `sci` / `bio` / `bio101` (year 1, term 1) and `bio201` (year 2, term 1).
pub const SAMPLE_CATALOG_TOML: &str = r#"
[[institutions]]
id = "eng"
name = "Faculty of Engineering"
description = "Engineering programmes"

[[institutions]]
id = "sci"
name = "Faculty of Science"

[[units]]
id = "cs"
institution = "eng"
name = "Computer Science"

[[units]]
id = "ee"
institution = "eng"
name = "Electrical Engineering"

[[units]]
id = "bio"
institution = "sci"
name = "Life Sciences"

[[courses]]
id = "cs101"
unit = "cs"
year = 1
term = 1
code = "cs101"
name = "Introduction to Programming"

[[courses]]
id = "cs102"
unit = "cs"
year = 1
term = 2
code = "CS102"
name = "Data Structures"

[[courses]]
id = "bio101"
unit = "bio"
year = 1
term = 1
code = "BIO101"
name = "General Biology"
description = "Cells, genetics and evolution"

[[courses]]
id = "bio201"
unit = "bio"
year = 2
term = 1
code = "BIO201"
name = "Molecular Biology"

[[documents]]
id = "d1"
course = "cs101"
chapter = "Chapter 1"
title = "Intro Slides"
kind = "slide"

[[documents]]
id = "d2"
course = "cs101"
chapter = "Chapter 2"
title = "Loops and Recursion"
kind = "pdf"

[[documents]]
id = "m1"
course = "cs102"
chapter = "Midterm"
title = "Exam 2021"
kind = "exam"

[[documents]]
id = "m2"
course = "cs102"
chapter = "Midterm"
title = "Exam 2022"
kind = "exam"

[[documents]]
id = "m3"
course = "cs102"
chapter = "Midterm"
title = "Exam 2023"
kind = "exam"

[[documents]]
id = "b1"
course = "bio101"
chapter = "Cells"
title = "Cell structure"
kind = "pdf"
"#;

/// The sample catalog, ready to serve.
pub fn sample_catalog() -> InMemoryCatalog {
    InMemoryCatalog::parse(SAMPLE_CATALOG_TOML).expect("sample catalog must be valid")
}

/// A [`CatalogStore`] that counts calls before delegating.
pub struct CountingCatalog {
    inner: Arc<dyn CatalogStore>,
    nodes: AtomicUsize,
    children: AtomicUsize,
    course_searches: AtomicUsize,
    document_searches: AtomicUsize,
}

impl CountingCatalog {
    pub fn new(inner: Arc<dyn CatalogStore>) -> Self {
        Self {
            inner,
            nodes: AtomicUsize::new(0),
            children: AtomicUsize::new(0),
            course_searches: AtomicUsize::new(0),
            document_searches: AtomicUsize::new(0),
        }
    }

    /// Wraps [`sample_catalog`].
    pub fn sample() -> Self {
        Self::new(Arc::new(sample_catalog()))
    }

    pub fn node_calls(&self) -> usize {
        self.nodes.load(Ordering::SeqCst)
    }

    pub fn children_calls(&self) -> usize {
        self.children.load(Ordering::SeqCst)
    }

    pub fn search_calls(&self) -> usize {
        self.course_searches.load(Ordering::SeqCst) + self.document_searches.load(Ordering::SeqCst)
    }

    /// Every call of any kind.
    pub fn total_calls(&self) -> usize {
        self.node_calls() + self.children_calls() + self.search_calls()
    }
}

impl CatalogStore for CountingCatalog {
    fn node<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<CatalogNode>, CatalogError>> {
        self.nodes.fetch_add(1, Ordering::SeqCst);
        self.inner.node(id)
    }

    fn list_children<'a>(
        &'a self,
        parent: &'a ParentRef,
    ) -> BoxFuture<'a, Result<Vec<CatalogNode>, CatalogError>> {
        self.children.fetch_add(1, Ordering::SeqCst);
        self.inner.list_children(parent)
    }

    fn search_courses<'a>(
        &'a self,
        keyword: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Course>, CatalogError>> {
        self.course_searches.fetch_add(1, Ordering::SeqCst);
        self.inner.search_courses(keyword)
    }

    fn search_documents<'a>(
        &'a self,
        keyword: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Document>, CatalogError>> {
        self.document_searches.fetch_add(1, Ordering::SeqCst);
        self.inner.search_documents(keyword)
    }
}
