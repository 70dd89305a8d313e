//! Per-conversation navigation, search and library state.
//!
//! A [`NavigationSession`] is a path of selections, one per [`Level`], always
//! filled from the top. Selecting at a level drops everything below it, so the
//! session can never hold a course without the term and year above it.

mod library;
mod store;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use library::{Bookmark, FavoriteStore, HistoryStore, SaveOutcome};
pub use store::{SearchSession, SearchSessionStore, SessionStore};

/// Separator between breadcrumb parts.
pub const BREADCRUMB_SEPARATOR: &str = " → ";

/// Levels of the catalog hierarchy that hold a selection, top-down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Institution,
    SubUnit,
    Year,
    Term,
    Course,
    Chapter,
}

impl Level {
    pub const ALL: [Level; 6] = [
        Level::Institution,
        Level::SubUnit,
        Level::Year,
        Level::Term,
        Level::Course,
        Level::Chapter,
    ];

    /// Position of the level in the path.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The level directly above, if any.
    pub fn parent(self) -> Option<Level> {
        self.index().checked_sub(1).map(|i| Level::ALL[i])
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::Institution => "institution",
            Level::SubUnit => "sub-unit",
            Level::Year => "year",
            Level::Term => "term",
            Level::Course => "course",
            Level::Chapter => "chapter",
        };
        f.write_str(name)
    }
}

/// A single selection, carrying what the breadcrumb needs to render it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "level", rename_all = "snake_case")]
pub enum Selection {
    Institution { id: String, name: String },
    SubUnit { id: String, name: String },
    Year { year: u8 },
    Term { term: u8 },
    Course { id: String, code: String, name: String },
    Chapter { label: String },
}

impl Selection {
    pub fn level(&self) -> Level {
        match self {
            Selection::Institution { .. } => Level::Institution,
            Selection::SubUnit { .. } => Level::SubUnit,
            Selection::Year { .. } => Level::Year,
            Selection::Term { .. } => Level::Term,
            Selection::Course { .. } => Level::Course,
            Selection::Chapter { .. } => Level::Chapter,
        }
    }

    /// How this selection appears in a breadcrumb.
    pub fn crumb(&self) -> String {
        match self {
            Selection::Institution { name, .. } | Selection::SubUnit { name, .. } => name.clone(),
            Selection::Year { year } => format!("Year {year}"),
            Selection::Term { term } => format!("Term {term}"),
            Selection::Course { code, .. } => code.clone(),
            Selection::Chapter { label } => label.clone(),
        }
    }
}

/// How deep a session has descended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Depth {
    Empty,
    InstitutionSelected,
    SubUnitSelected,
    YearSelected,
    TermSelected,
    CourseSelected,
    ChapterSelected,
}

/// The guided-navigation position of one conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationSession {
    path: Vec<Selection>,
}

impl NavigationSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a session from a complete top-down path.
    ///
    /// Returns `None` unless the i-th selection sits at the i-th level.
    pub fn from_path(path: Vec<Selection>) -> Option<Self> {
        let consistent = path
            .iter()
            .enumerate()
            .all(|(i, selection)| selection.level().index() == i);
        consistent.then_some(Self { path })
    }

    /// Record `selection`, dropping every deeper selection.
    ///
    /// Returns `false` and leaves the session untouched when a level above the
    /// selection is unset.
    pub fn select(&mut self, selection: Selection) -> bool {
        let index = selection.level().index();
        if index > self.path.len() {
            return false;
        }
        self.path.truncate(index);
        self.path.push(selection);
        true
    }

    pub fn get(&self, level: Level) -> Option<&Selection> {
        self.path.get(level.index())
    }

    pub fn selections(&self) -> &[Selection] {
        &self.path
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    pub fn institution_id(&self) -> Option<&str> {
        match self.get(Level::Institution)? {
            Selection::Institution { id, .. } => Some(id),
            _ => None,
        }
    }

    pub fn unit_id(&self) -> Option<&str> {
        match self.get(Level::SubUnit)? {
            Selection::SubUnit { id, .. } => Some(id),
            _ => None,
        }
    }

    pub fn year(&self) -> Option<u8> {
        match self.get(Level::Year)? {
            Selection::Year { year } => Some(*year),
            _ => None,
        }
    }

    pub fn term(&self) -> Option<u8> {
        match self.get(Level::Term)? {
            Selection::Term { term } => Some(*term),
            _ => None,
        }
    }

    pub fn course_id(&self) -> Option<&str> {
        match self.get(Level::Course)? {
            Selection::Course { id, .. } => Some(id),
            _ => None,
        }
    }

    pub fn chapter(&self) -> Option<&str> {
        match self.get(Level::Chapter)? {
            Selection::Chapter { label } => Some(label),
            _ => None,
        }
    }

    pub fn depth(&self) -> Depth {
        match self.path.last().map(Selection::level) {
            None => Depth::Empty,
            Some(Level::Institution) => Depth::InstitutionSelected,
            Some(Level::SubUnit) => Depth::SubUnitSelected,
            Some(Level::Year) => Depth::YearSelected,
            Some(Level::Term) => Depth::TermSelected,
            Some(Level::Course) => Depth::CourseSelected,
            Some(Level::Chapter) => Depth::ChapterSelected,
        }
    }

    /// Top-down rendering of every selection.
    pub fn breadcrumb(&self) -> String {
        self.path
            .iter()
            .map(Selection::crumb)
            .collect::<Vec<_>>()
            .join(BREADCRUMB_SEPARATOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn full_path() -> Vec<Selection> {
        vec![
            Selection::Institution {
                id: "eng".to_string(),
                name: "Engineering".to_string(),
            },
            Selection::SubUnit {
                id: "cs".to_string(),
                name: "Computer Science".to_string(),
            },
            Selection::Year { year: 1 },
            Selection::Term { term: 2 },
            Selection::Course {
                id: "c1".to_string(),
                code: "CS101".to_string(),
                name: "Intro".to_string(),
            },
            Selection::Chapter {
                label: "Chapter 1".to_string(),
            },
        ]
    }

    #[test]
    fn test_select_requires_ancestors() {
        let mut session = NavigationSession::new();
        assert!(!session.select(Selection::Year { year: 1 }));
        assert!(session.is_empty());
        assert_eq!(session.depth(), Depth::Empty);
    }

    #[test]
    fn test_cascade_invalidation_at_every_level() {
        for level in Level::ALL {
            let mut session = NavigationSession::from_path(full_path()).unwrap();
            let replacement = full_path()[level.index()].clone();
            assert!(session.select(replacement));
            assert_eq!(session.selections().len(), level.index() + 1);
            for deeper in Level::ALL.iter().filter(|l| **l > level) {
                assert!(session.get(*deeper).is_none(), "{deeper} survived {level}");
            }
        }
    }

    #[test]
    fn test_reselect_year_clears_term_and_course() {
        let mut session = NavigationSession::from_path(full_path()).unwrap();
        assert!(session.select(Selection::Year { year: 3 }));
        assert_eq!(session.year(), Some(3));
        assert_eq!(session.term(), None);
        assert_eq!(session.course_id(), None);
        assert_eq!(session.unit_id(), Some("cs"));
        assert_eq!(session.depth(), Depth::YearSelected);
    }

    #[test]
    fn test_from_path_rejects_gaps() {
        let mut path = full_path();
        path.remove(2);
        assert!(NavigationSession::from_path(path).is_none());
    }

    #[test]
    fn test_breadcrumb_renders_every_level() {
        let session = NavigationSession::from_path(full_path()).unwrap();
        assert_eq!(
            session.breadcrumb(),
            "Engineering → Computer Science → Year 1 → Term 2 → CS101 → Chapter 1"
        );
        assert_eq!(session.depth(), Depth::ChapterSelected);
        assert_eq!(NavigationSession::new().breadcrumb(), "");
    }

    #[test]
    fn test_level_parent() {
        assert_eq!(Level::Institution.parent(), None);
        assert_eq!(Level::Course.parent(), Some(Level::Term));
    }
}
