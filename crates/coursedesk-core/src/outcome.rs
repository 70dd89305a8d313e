//! Engine errors and the structured replies the dispatcher produces.
//!
//! Nothing here is rendered: a [`Reply`] is data for the chat transport (or
//! the CLI) to turn into messages and buttons.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::catalog::{CatalogError, Document};
use crate::session::{Level, SaveOutcome};
use crate::token::{EncodingError, SearchFilter};

/// Input rejected before any catalog access.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("keyword must be at least {min} characters, got {actual}")]
    KeywordTooShort { min: usize, actual: usize },

    #[error("payload needs {actual} bytes, limit is {limit}")]
    PayloadTooLong { limit: usize, actual: usize },
}

/// The conversation's navigation state no longer matches the request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StaleSession {
    #[error("no {level} selected")]
    MissingAncestor { level: Level },

    #[error("selection does not belong to the current {level}")]
    ParentMismatch { level: Level },

    #[error("{id} no longer exists")]
    NotFound { id: String },
}

/// Errors from the navigation engine.
#[derive(Debug, thiserror::Error)]
pub enum NavigationError {
    #[error(transparent)]
    Stale(#[from] StaleSession),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Errors from the search engine.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{count} results exceed the limit of {cap}")]
    TooManyResults { count: usize, cap: usize },

    #[error("no results")]
    NoResults,

    #[error("no previous search to return to")]
    NoSearchToResume,

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// One selectable entry of a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub token: String,
}

/// Kind of a search result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitKind {
    CourseHit,
    ChapterHit,
    ResourceHit,
}

/// One entry of a search result page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResultItem {
    pub kind: HitKind,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub token: String,
    /// Position among hits of the same kind, in catalog order.
    pub sort_key: usize,
}

/// A guided-navigation position and its children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationView {
    pub breadcrumb: String,
    /// Deepest selected level; `None` at the institution list.
    pub level: Option<Level>,
    pub items: Vec<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub back: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_back: Option<String>,
}

/// A single document and where it lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentView {
    pub document: Document,
    pub breadcrumb: String,
    pub back: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_back: Option<String>,
    /// Saves the document to the conversation's favorites.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favorite: Option<String>,
}

/// Per-type hit counts of a search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCounts {
    pub courses: usize,
    pub chapters: usize,
    pub resources: usize,
}

impl SearchCounts {
    pub fn total(&self) -> usize {
        self.courses + self.chapters + self.resources
    }
}

/// Zero-based page position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: usize,
    pub total_pages: usize,
}

impl Pagination {
    /// Place `page` over `total` items shown `page_size` at a time, with the
    /// index range of its items. Pages past the end are empty.
    pub fn locate(page: usize, total: usize, page_size: usize) -> (Self, Range<usize>) {
        let page_size = page_size.max(1);
        let start = page.saturating_mul(page_size).min(total);
        let end = start.saturating_add(page_size).min(total);
        let pagination = Self {
            page,
            total_pages: total.div_ceil(page_size),
        };
        (pagination, start..end)
    }

    /// The page a "previous" button leads to. Past the end it is the last page.
    pub fn previous(&self) -> Option<usize> {
        if self.page >= self.total_pages {
            self.total_pages.checked_sub(1)
        } else {
            self.page.checked_sub(1)
        }
    }

    pub fn next(&self) -> Option<usize> {
        self.page.checked_add(1).filter(|next| *next < self.total_pages)
    }
}

/// A token that switches the search to another filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOption {
    pub filter: SearchFilter,
    pub token: String,
    pub current: bool,
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchView {
    pub keyword: String,
    pub filter: SearchFilter,
    pub counts: SearchCounts,
    pub items: Vec<SearchResultItem>,
    pub pagination: Pagination,
    pub filters: Vec<FilterOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

/// Which per-conversation list a [`ShelfView`] shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shelf {
    Favorites,
    History,
}

/// One saved or viewed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShelfEntry {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Opens the document.
    pub token: String,
    /// Drops the document from favorites.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove: Option<String>,
}

/// One page of favorites or view history, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShelfView {
    pub shelf: Shelf,
    /// Entries on every page, including ones whose document is gone.
    pub total: usize,
    pub items: Vec<ShelfEntry>,
    pub pagination: Pagination,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    /// Empties the history. Absent on favorites and on an empty history.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clear: Option<String>,
    pub browse: String,
}

/// An institution and the names of its sub-units, for the full listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub label: String,
    pub token: String,
    pub units: Vec<String>,
}

/// A command and what it does, for `/help`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandHelp {
    pub command: String,
    pub description: String,
}

/// Everything the dispatcher can answer with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reply {
    Home {
        items: Vec<Item>,
        min_keyword_len: usize,
    },
    Help {
        commands: Vec<CommandHelp>,
    },
    Status {
        version: String,
        uptime_secs: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sessions: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        search_sessions: Option<usize>,
    },
    Navigation(NavigationView),
    Document(DocumentView),
    Search(SearchView),
    Shelf(ShelfView),
    FavoriteSaved {
        title: String,
        outcome: SaveOutcome,
        favorites: String,
    },
    HistoryCleared {
        removed: usize,
        browse: String,
    },
    Directory {
        institutions: Vec<DirectoryEntry>,
    },
    SearchSuggestion {
        keyword: String,
        token: String,
    },
    Stale {
        reason: String,
        restart: String,
    },
    KeywordTooShort {
        min: usize,
        actual: usize,
    },
    PayloadTooLong {
        limit: usize,
        actual: usize,
    },
    TooManyResults {
        keyword: String,
        count: usize,
        cap: usize,
    },
    NoResults {
        keyword: String,
        filter: SearchFilter,
    },
    NoSearchToResume {
        browse: String,
    },
    InvalidToken {
        reason: String,
    },
    UnknownCommand {
        command: String,
    },
    Unavailable {
        reason: String,
    },
    Ignored,
}

impl From<EncodingError> for Reply {
    fn from(err: EncodingError) -> Self {
        Reply::InvalidToken {
            reason: err.to_string(),
        }
    }
}

impl From<ValidationError> for Reply {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::KeywordTooShort { min, actual } => Reply::KeywordTooShort { min, actual },
            ValidationError::PayloadTooLong { limit, actual } => {
                Reply::PayloadTooLong { limit, actual }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_reply_json_is_tagged() {
        let reply = Reply::KeywordTooShort { min: 3, actual: 2 };
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["type"], "keyword_too_short");
        assert_eq!(json["min"], 3);

        let back: Reply = serde_json::from_value(json).unwrap();
        assert_eq!(back, reply);
    }

    #[test]
    fn test_navigation_reply_omits_empty_tokens() {
        let reply = Reply::Navigation(NavigationView {
            breadcrumb: String::new(),
            level: None,
            items: vec![Item {
                label: "Engineering".to_string(),
                detail: None,
                token: "inst_eng".to_string(),
            }],
            back: None,
            search_back: None,
        });
        let json = serde_json::to_string(&reply).unwrap();
        assert!(!json.contains("search_back"));
        assert!(!json.contains("detail"));
        assert!(json.contains("\"type\":\"navigation\""));
    }

    #[test]
    fn test_stale_session_messages() {
        let err = StaleSession::MissingAncestor {
            level: Level::SubUnit,
        };
        assert_eq!(err.to_string(), "no sub-unit selected");
        let err = StaleSession::NotFound {
            id: "c9".to_string(),
        };
        assert_eq!(err.to_string(), "c9 no longer exists");
    }

    #[test]
    fn test_pagination_locate() {
        let (pagination, range) = Pagination::locate(1, 7, 3);
        assert_eq!(pagination, Pagination { page: 1, total_pages: 3 });
        assert_eq!(range, 3..6);
        assert_eq!(pagination.previous(), Some(0));
        assert_eq!(pagination.next(), Some(2));

        let (last, range) = Pagination::locate(2, 7, 3);
        assert_eq!(range, 6..7);
        assert_eq!(last.next(), None);

        let (empty, range) = Pagination::locate(0, 0, 3);
        assert_eq!(empty.total_pages, 0);
        assert!(range.is_empty());
        assert_eq!(empty.previous(), None);
        assert_eq!(empty.next(), None);
    }

    #[test]
    fn test_pagination_past_the_end() {
        let (past, range) = Pagination::locate(usize::MAX, 7, 3);
        assert!(range.is_empty());
        assert_eq!(past.previous(), Some(2));
        assert_eq!(past.next(), None);

        let first = Pagination {
            page: 0,
            total_pages: 3,
        };
        assert_eq!(first.previous(), None);
    }

    #[test]
    fn test_counts_total() {
        let counts = SearchCounts {
            courses: 1,
            chapters: 2,
            resources: 3,
        };
        assert_eq!(counts.total(), 6);
    }
}
