//! Guided descent through the catalog hierarchy.
//!
//! Every step checks the requested node against the conversation's current
//! selections, records it in the [`SessionStore`] and lists the children of
//! the new position.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::catalog::{CatalogNode, CatalogStore, Course, Document, Institution, ParentRef, SubUnit};
use crate::outcome::{
    DirectoryEntry, DocumentView, Item, NavigationError, NavigationView, StaleSession,
};
use crate::session::{Depth, Level, NavigationSession, Selection, SessionStore};
use crate::token::{Action, MAX_TERM, TokenCodec};

/// Where a descent step goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Institution(String),
    SubUnit(String),
    Year(u8),
    Term(u8),
    Course(String),
    Chapter(String),
}

/// Navigation over a read-only catalog.
pub struct NavigationEngine {
    catalog: Arc<dyn CatalogStore>,
    sessions: Arc<SessionStore>,
    codec: TokenCodec,
    years: u8,
}

impl NavigationEngine {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        sessions: Arc<SessionStore>,
        codec: TokenCodec,
        years: u8,
    ) -> Self {
        Self {
            catalog,
            sessions,
            codec,
            years,
        }
    }

    /// Start over at the institution list.
    pub async fn browse(&self, conversation: &str) -> Result<NavigationView, NavigationError> {
        self.sessions.clear(conversation);
        self.view(&NavigationSession::new()).await
    }

    /// Select `target` below the current position.
    pub async fn descend(
        &self,
        conversation: &str,
        target: Target,
    ) -> Result<NavigationView, NavigationError> {
        let snapshot = self.sessions.get(conversation);
        let selection = self.resolve(&snapshot, target).await?;
        let level = selection.level();
        let ancestors = snapshot
            .selections()
            .get(..level.index())
            .ok_or_else(|| missing_above(level))?;

        // The catalog lookups above may have raced another interaction for
        // this conversation; the store rejects the step if they moved an
        // ancestor.
        let session = self.sessions.update_if(conversation, ancestors, selection)?;
        debug!(conversation, %level, "Descended");
        self.view(&session).await
    }

    /// Jump to a course found by search, rebuilding the path above it.
    pub async fn open_course(
        &self,
        conversation: &str,
        course_id: &str,
    ) -> Result<NavigationView, NavigationError> {
        let path = self.course_path(course_id).await?;
        self.install(conversation, path).await
    }

    /// Jump to a chapter found by search, rebuilding the path above it.
    pub async fn open_chapter(
        &self,
        conversation: &str,
        course_id: &str,
        label: &str,
    ) -> Result<NavigationView, NavigationError> {
        let mut path = self.course_path(course_id).await?;
        self.ensure_chapter(course_id, label).await?;
        path.push(Selection::Chapter {
            label: label.to_string(),
        });
        self.install(conversation, path).await
    }

    /// Describe a document. The session is left as it is.
    pub async fn open_document(&self, document_id: &str) -> Result<DocumentView, NavigationError> {
        let document = self.expect_document(document_id).await?;
        let mut path = self.course_path(&document.course).await?;

        let back = if document.chapter.is_empty() {
            Action::SearchCourse(document.course.clone())
        } else {
            path.push(Selection::Chapter {
                label: document.chapter.clone(),
            });
            Action::SearchChapter {
                label: document.chapter.clone(),
                course: document.course.clone(),
            }
        };
        let breadcrumb = NavigationSession::from_path(path)
            .map(|s| s.breadcrumb())
            .unwrap_or_default();

        Ok(DocumentView {
            back: self.token(&back),
            document,
            breadcrumb,
            search_back: None,
            favorite: None,
        })
    }

    /// Every institution with the names of its sub-units, both sorted by
    /// name. The session is left as it is.
    pub async fn directory(&self) -> Result<Vec<DirectoryEntry>, NavigationError> {
        let mut institutions = self.children_of(ParentRef::Root, as_institution).await?;
        institutions.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));

        let mut entries = Vec::with_capacity(institutions.len());
        for institution in institutions {
            let parent = ParentRef::Institution(institution.id.clone());
            let mut units: Vec<String> = self
                .children_of(parent, as_unit)
                .await?
                .into_iter()
                .map(|u| u.name)
                .collect();
            units.sort();
            entries.push(DirectoryEntry {
                token: self.token(&Action::Institution(institution.id)),
                label: institution.name,
                units,
            });
        }
        Ok(entries)
    }

    async fn install(
        &self,
        conversation: &str,
        path: Vec<Selection>,
    ) -> Result<NavigationView, NavigationError> {
        let session = NavigationSession::from_path(path).ok_or_else(|| StaleSession::NotFound {
            id: "navigation path".to_string(),
        })?;
        self.sessions.replace(conversation, session.clone());
        debug!(conversation, depth = ?session.depth(), "Resumed navigation from search");
        self.view(&session).await
    }

    /// Check a target against the session and turn it into a selection.
    async fn resolve(
        &self,
        session: &NavigationSession,
        target: Target,
    ) -> Result<Selection, NavigationError> {
        let selection = match target {
            Target::Institution(id) => {
                let institution = self.expect_institution(&id).await?;
                Selection::Institution {
                    id: institution.id,
                    name: institution.name,
                }
            }
            Target::SubUnit(id) => {
                let institution = session
                    .institution_id()
                    .ok_or_else(|| missing(Level::Institution))?;
                let unit = self.expect_unit(&id).await?;
                if unit.institution != institution {
                    return Err(mismatch(Level::Institution).into());
                }
                Selection::SubUnit {
                    id: unit.id,
                    name: unit.name,
                }
            }
            Target::Year(year) => {
                session.unit_id().ok_or_else(|| missing(Level::SubUnit))?;
                if !(1..=self.years).contains(&year) {
                    return Err(not_found(format!("year {year}")).into());
                }
                Selection::Year { year }
            }
            Target::Term(term) => {
                session.year().ok_or_else(|| missing(Level::Year))?;
                if !(1..=MAX_TERM).contains(&term) {
                    return Err(not_found(format!("term {term}")).into());
                }
                Selection::Term { term }
            }
            Target::Course(id) => {
                let term = session.term().ok_or_else(|| missing(Level::Term))?;
                let course = self.expect_course(&id).await?;
                if Some(course.unit.as_str()) != session.unit_id() {
                    return Err(mismatch(Level::SubUnit).into());
                }
                if Some(course.year) != session.year() {
                    return Err(mismatch(Level::Year).into());
                }
                if course.term != term {
                    return Err(mismatch(Level::Term).into());
                }
                Selection::Course {
                    id: course.id,
                    code: course.code,
                    name: course.name,
                }
            }
            Target::Chapter(label) => {
                let course = session.course_id().ok_or_else(|| missing(Level::Course))?;
                self.ensure_chapter(course, &label).await?;
                Selection::Chapter { label }
            }
        };
        Ok(selection)
    }

    /// The full path down to a course, read from the catalog.
    async fn course_path(&self, course_id: &str) -> Result<Vec<Selection>, NavigationError> {
        let course = self.expect_course(course_id).await?;
        let unit = self.expect_unit(&course.unit).await?;
        let institution = self.expect_institution(&unit.institution).await?;
        Ok(vec![
            Selection::Institution {
                id: institution.id,
                name: institution.name,
            },
            Selection::SubUnit {
                id: unit.id,
                name: unit.name,
            },
            Selection::Year { year: course.year },
            Selection::Term { term: course.term },
            Selection::Course {
                id: course.id,
                code: course.code,
                name: course.name,
            },
        ])
    }

    async fn ensure_chapter(&self, course_id: &str, label: &str) -> Result<(), NavigationError> {
        let chapters = self
            .catalog
            .list_children(&ParentRef::Course(course_id.to_string()))
            .await?;
        let exists = chapters
            .iter()
            .any(|node| matches!(node, CatalogNode::Chapter(c) if c.label == label));
        if exists {
            Ok(())
        } else {
            Err(not_found(label.to_string()).into())
        }
    }

    /// List the children of the session's current position.
    async fn view(&self, session: &NavigationSession) -> Result<NavigationView, NavigationError> {
        let (items, back) = match session.depth() {
            Depth::Empty => {
                let mut institutions = self.children_of(ParentRef::Root, as_institution).await?;
                institutions.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
                let items = institutions
                    .into_iter()
                    .map(|i| self.item(i.name, non_empty(i.description), Action::Institution(i.id)))
                    .collect();
                (items, None)
            }
            Depth::InstitutionSelected => {
                let institution = session.institution_id().unwrap_or_default();
                let parent = ParentRef::Institution(institution.to_string());
                let mut units = self.children_of(parent, as_unit).await?;
                units.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
                let items = units
                    .into_iter()
                    .map(|u| self.item(u.name, non_empty(u.description), Action::SubUnit(u.id)))
                    .collect();
                (items, Some(Action::Browse))
            }
            Depth::SubUnitSelected => {
                let items = (1..=self.years)
                    .map(|year| self.item(format!("Year {year}"), None, Action::Year(year)))
                    .collect();
                let back = session.institution_id().map(|id| Action::Institution(id.to_string()));
                (items, back)
            }
            Depth::YearSelected => {
                let items = (1..=MAX_TERM)
                    .map(|term| self.item(format!("Term {term}"), None, Action::Term(term)))
                    .collect();
                let back = session.unit_id().map(|id| Action::SubUnit(id.to_string()));
                (items, back)
            }
            Depth::TermSelected => {
                let unit = session.unit_id().unwrap_or_default();
                let courses = self
                    .children_of(ParentRef::SubUnit(unit.to_string()), as_course)
                    .await?;
                let mut courses: Vec<Course> = courses
                    .into_iter()
                    .filter(|c| Some(c.year) == session.year() && Some(c.term) == session.term())
                    .collect();
                courses.sort_by(|a, b| a.code.cmp(&b.code).then_with(|| a.id.cmp(&b.id)));
                let items = courses
                    .into_iter()
                    .map(|c| self.item(c.code, Some(c.name), Action::Course(c.id)))
                    .collect();
                (items, session.year().map(Action::Year))
            }
            Depth::CourseSelected => {
                let course = session.course_id().unwrap_or_default();
                let nodes = self
                    .catalog
                    .list_children(&ParentRef::Course(course.to_string()))
                    .await?;
                let mut labels: Vec<String> = nodes
                    .into_iter()
                    .filter_map(|node| match node {
                        CatalogNode::Chapter(c) if !c.label.is_empty() => Some(c.label),
                        _ => None,
                    })
                    .collect();
                labels.sort();
                labels.dedup();
                let items = labels
                    .into_iter()
                    .map(|label| self.item(label.clone(), None, Action::Chapter(label)))
                    .collect();
                (items, session.term().map(Action::Term))
            }
            Depth::ChapterSelected => {
                let course = session.course_id().unwrap_or_default();
                let parent = ParentRef::Chapter {
                    course: course.to_string(),
                    label: session.chapter().unwrap_or_default().to_string(),
                };
                let mut documents = self.children_of(parent, as_document).await?;
                documents.sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.title.cmp(&b.title)));
                let items = documents
                    .into_iter()
                    .map(|d| {
                        self.item(d.title, Some(d.kind.to_string()), Action::Document(d.id))
                    })
                    .collect();
                (items, Some(Action::Course(course.to_string())))
            }
        };

        Ok(NavigationView {
            breadcrumb: session.breadcrumb(),
            level: session.selections().last().map(Selection::level),
            items,
            back: back.map(|action| self.token(&action)),
            search_back: None,
        })
    }

    async fn children_of<T>(
        &self,
        parent: ParentRef,
        pick: fn(CatalogNode) -> Option<T>,
    ) -> Result<Vec<T>, NavigationError> {
        let nodes = self.catalog.list_children(&parent).await?;
        Ok(nodes.into_iter().filter_map(pick).collect())
    }

    async fn expect_institution(&self, id: &str) -> Result<Institution, NavigationError> {
        self.expect(id, as_institution).await
    }

    async fn expect_unit(&self, id: &str) -> Result<SubUnit, NavigationError> {
        self.expect(id, as_unit).await
    }

    async fn expect_course(&self, id: &str) -> Result<Course, NavigationError> {
        self.expect(id, as_course).await
    }

    async fn expect_document(&self, id: &str) -> Result<Document, NavigationError> {
        self.expect(id, as_document).await
    }

    async fn expect<T>(
        &self,
        id: &str,
        pick: fn(CatalogNode) -> Option<T>,
    ) -> Result<T, NavigationError> {
        self.catalog
            .node(id)
            .await?
            .and_then(pick)
            .ok_or_else(|| not_found(id.to_string()).into())
    }

    fn item(&self, label: String, detail: Option<String>, action: Action) -> Item {
        Item {
            label,
            detail,
            token: self.token(&action),
        }
    }

    /// Encode an action, degrading to `noop` when it does not fit.
    fn token(&self, action: &Action) -> String {
        self.codec.encode_action(action).unwrap_or_else(|e| {
            warn!(error = %e, verb = %action.verb(), "Item token does not fit, using noop");
            Action::Noop.verb().wire().to_string()
        })
    }
}

fn as_institution(node: CatalogNode) -> Option<Institution> {
    match node {
        CatalogNode::Institution(i) => Some(i),
        _ => None,
    }
}

fn as_unit(node: CatalogNode) -> Option<SubUnit> {
    match node {
        CatalogNode::SubUnit(u) => Some(u),
        _ => None,
    }
}

fn as_course(node: CatalogNode) -> Option<Course> {
    match node {
        CatalogNode::Course(c) => Some(c),
        _ => None,
    }
}

fn as_document(node: CatalogNode) -> Option<Document> {
    match node {
        CatalogNode::Document(d) => Some(d),
        _ => None,
    }
}

fn non_empty(s: String) -> Option<String> {
    (!s.is_empty()).then_some(s)
}

fn missing(level: Level) -> StaleSession {
    StaleSession::MissingAncestor { level }
}

fn missing_above(level: Level) -> StaleSession {
    missing(level.parent().unwrap_or(level))
}

fn mismatch(level: Level) -> StaleSession {
    StaleSession::ParentMismatch { level }
}

fn not_found(id: String) -> StaleSession {
    StaleSession::NotFound { id }
}
