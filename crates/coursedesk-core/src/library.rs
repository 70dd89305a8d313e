//! Favorites and view history over the catalog.
//!
//! Both shelves store document ids only. Titles and course codes are read
//! from the catalog when a page is shown, and entries whose document has
//! since disappeared are left off the page.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::catalog::{CatalogNode, CatalogStore, Document};
use crate::outcome::{NavigationError, Pagination, Shelf, ShelfEntry, ShelfView, StaleSession};
use crate::session::{Bookmark, FavoriteStore, HistoryStore, SaveOutcome};
use crate::token::{Action, TokenCodec};

/// Per-conversation favorites and view history.
pub struct LibraryEngine {
    catalog: Arc<dyn CatalogStore>,
    favorites: Arc<FavoriteStore>,
    history: Arc<HistoryStore>,
    codec: TokenCodec,
    page_size: usize,
}

impl LibraryEngine {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        favorites: Arc<FavoriteStore>,
        history: Arc<HistoryStore>,
        codec: TokenCodec,
        page_size: usize,
    ) -> Self {
        Self {
            catalog,
            favorites,
            history,
            codec,
            page_size,
        }
    }

    /// Save a document. It must still exist in the catalog.
    pub async fn add_favorite(
        &self,
        conversation: &str,
        document_id: &str,
    ) -> Result<(Document, SaveOutcome), NavigationError> {
        let document = self
            .document(document_id)
            .await?
            .ok_or_else(|| StaleSession::NotFound {
                id: document_id.to_string(),
            })?;
        let outcome = self.favorites.add(conversation, document_id);
        info!(conversation, document = document_id, ?outcome, "Favorite requested");
        Ok((document, outcome))
    }

    /// Drop a document from favorites and show the first page again.
    pub async fn remove_favorite(
        &self,
        conversation: &str,
        document_id: &str,
    ) -> Result<ShelfView, NavigationError> {
        if !self.favorites.remove(conversation, document_id) {
            debug!(conversation, document = document_id, "Favorite already gone");
        }
        self.favorites_page(conversation, 0).await
    }

    pub async fn favorites_page(
        &self,
        conversation: &str,
        page: usize,
    ) -> Result<ShelfView, NavigationError> {
        let saved = self.favorites.list(conversation);
        self.shelf(Shelf::Favorites, &saved, page).await
    }

    /// Remember that the conversation opened a document.
    pub fn record_view(&self, conversation: &str, document_id: &str) {
        self.history.record(conversation, document_id);
    }

    pub async fn history_page(
        &self,
        conversation: &str,
        page: usize,
    ) -> Result<ShelfView, NavigationError> {
        let viewed = self.history.list(conversation);
        self.shelf(Shelf::History, &viewed, page).await
    }

    /// Forget the conversation's history, returning how many entries it had.
    pub fn clear_history(&self, conversation: &str) -> usize {
        let removed = self.history.clear(conversation);
        info!(conversation, removed, "History cleared");
        removed
    }

    /// The "save" button for a document, unless it is already saved.
    pub fn favorite_token(&self, conversation: &str, document_id: &str) -> Option<String> {
        if self.favorites.contains(conversation, document_id) {
            return None;
        }
        self.codec
            .encode_action(&Action::FavoriteAdd(document_id.to_string()))
            .ok()
    }

    pub fn favorites(&self) -> &FavoriteStore {
        &self.favorites
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    async fn shelf(
        &self,
        shelf: Shelf,
        bookmarks: &[Bookmark],
        page: usize,
    ) -> Result<ShelfView, NavigationError> {
        let total = bookmarks.len();
        let (pagination, range) = Pagination::locate(page, total, self.page_size);

        let mut items = Vec::with_capacity(range.len());
        for bookmark in &bookmarks[range] {
            let Some(document) = self.document(&bookmark.document_id).await? else {
                debug!(document = %bookmark.document_id, ?shelf, "Skipping vanished document");
                continue;
            };
            let code = match self.catalog.node(&document.course).await? {
                Some(CatalogNode::Course(course)) => Some(course.code),
                _ => None,
            };
            let remove = (shelf == Shelf::Favorites)
                .then(|| self.token(&Action::FavoriteRemove(document.id.clone())));
            items.push(ShelfEntry {
                token: self.token(&Action::Document(document.id)),
                label: document.title,
                detail: code,
                remove,
            });
        }

        let page_token = |p: usize| match shelf {
            Shelf::Favorites => self.token(&Action::FavoritePage(p)),
            Shelf::History => self.token(&Action::HistoryPage(p)),
        };
        let clear = (shelf == Shelf::History && total > 0)
            .then(|| self.token(&Action::HistoryClear));

        Ok(ShelfView {
            shelf,
            total,
            items,
            pagination,
            prev: pagination.previous().map(&page_token),
            next: pagination.next().map(&page_token),
            clear,
            browse: self.token(&Action::Browse),
        })
    }

    async fn document(&self, id: &str) -> Result<Option<Document>, NavigationError> {
        Ok(match self.catalog.node(id).await? {
            Some(CatalogNode::Document(document)) => Some(document),
            _ => None,
        })
    }

    fn token(&self, action: &Action) -> String {
        self.codec.encode_action(action).unwrap_or_else(|e| {
            warn!(error = %e, verb = %action.verb(), "Shelf token does not fit, using noop");
            Action::Noop.verb().wire().to_string()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    const SEED: &str = r#"
        [[institutions]]
        id = "eng"
        name = "Engineering"

        [[units]]
        id = "cs"
        institution = "eng"
        name = "Computer Science"

        [[courses]]
        id = "c1"
        unit = "cs"
        year = 1
        term = 1
        code = "CS101"
        name = "Intro"

        [[documents]]
        id = "d1"
        course = "c1"
        chapter = "Chapter 1"
        title = "Lecture 1"
        kind = "pdf"

        [[documents]]
        id = "d2"
        course = "c1"
        chapter = "Chapter 1"
        title = "Lecture 2"
        kind = "slide"

        [[documents]]
        id = "d3"
        course = "c1"
        title = "Syllabus"
        kind = "book"
    "#;

    fn engine(page_size: usize) -> LibraryEngine {
        let catalog = Arc::new(InMemoryCatalog::parse(SEED).unwrap());
        let ttl = Duration::from_secs(3600);
        LibraryEngine::new(
            catalog,
            Arc::new(FavoriteStore::with_limits(ttl, 10, 10)),
            Arc::new(HistoryStore::with_limits(ttl, 10, 10)),
            TokenCodec::default(),
            page_size,
        )
    }

    fn labels(view: &ShelfView) -> Vec<&str> {
        view.items.iter().map(|i| i.label.as_str()).collect()
    }

    #[tokio::test]
    async fn test_favorites_page_newest_first_with_remove_buttons() {
        let engine = engine(2);
        for id in ["d1", "d2", "d3"] {
            let (_, outcome) = engine.add_favorite("c", id).await.unwrap();
            assert_eq!(outcome, SaveOutcome::Added);
        }

        let first = engine.favorites_page("c", 0).await.unwrap();
        assert_eq!(first.total, 3);
        assert_eq!(labels(&first), vec!["Syllabus", "Lecture 2"]);
        assert_eq!(first.items[0].detail.as_deref(), Some("CS101"));
        assert_eq!(first.items[0].token, "doc_d3");
        assert_eq!(first.items[0].remove.as_deref(), Some("fav_remove_d3"));
        assert_eq!(first.pagination, Pagination { page: 0, total_pages: 2 });
        assert_eq!(first.prev, None);
        assert_eq!(first.next.as_deref(), Some("fav_page_1"));
        assert_eq!(first.clear, None);

        let second = engine.favorites_page("c", 1).await.unwrap();
        assert_eq!(labels(&second), vec!["Lecture 1"]);
        assert_eq!(second.prev.as_deref(), Some("fav_page_0"));
        assert_eq!(second.next, None);
    }

    #[tokio::test]
    async fn test_add_favorite_twice_and_unknown_document() {
        let engine = engine(5);
        engine.add_favorite("c", "d1").await.unwrap();
        let (document, outcome) = engine.add_favorite("c", "d1").await.unwrap();
        assert_eq!(document.title, "Lecture 1");
        assert_eq!(outcome, SaveOutcome::AlreadySaved);
        assert_eq!(engine.favorite_token("c", "d1"), None);
        assert_eq!(engine.favorite_token("c", "d2").as_deref(), Some("fav_add_d2"));

        let err = engine.add_favorite("c", "nope").await.unwrap_err();
        assert!(matches!(
            err,
            NavigationError::Stale(StaleSession::NotFound { .. })
        ));
        // Courses are not documents.
        assert!(engine.add_favorite("c", "c1").await.is_err());
    }

    #[tokio::test]
    async fn test_remove_favorite_returns_first_page() {
        let engine = engine(5);
        engine.add_favorite("c", "d1").await.unwrap();
        engine.add_favorite("c", "d2").await.unwrap();

        let view = engine.remove_favorite("c", "d2").await.unwrap();
        assert_eq!(view.pagination.page, 0);
        assert_eq!(labels(&view), vec!["Lecture 1"]);

        let empty = engine.remove_favorite("c", "d1").await.unwrap();
        assert_eq!(empty.total, 0);
        assert!(empty.items.is_empty());
        assert_eq!(empty.pagination.total_pages, 0);
        assert_eq!(empty.browse, "browse");
    }

    #[tokio::test]
    async fn test_history_page_and_clear() {
        let engine = engine(5);
        for id in ["d1", "d2", "d1"] {
            engine.record_view("c", id);
        }

        let view = engine.history_page("c", 0).await.unwrap();
        assert_eq!(view.shelf, Shelf::History);
        assert_eq!(labels(&view), vec!["Lecture 1", "Lecture 2", "Lecture 1"]);
        assert!(view.items.iter().all(|i| i.remove.is_none()));
        assert_eq!(view.clear.as_deref(), Some("hist_clear"));

        assert_eq!(engine.clear_history("c"), 3);
        let cleared = engine.history_page("c", 0).await.unwrap();
        assert_eq!(cleared.total, 0);
        assert_eq!(cleared.clear, None);
    }

    #[tokio::test]
    async fn test_vanished_documents_are_skipped() {
        let engine = engine(5);
        engine.record_view("c", "d1");
        engine.record_view("c", "gone");

        let view = engine.history_page("c", 0).await.unwrap();
        assert_eq!(view.total, 2);
        assert_eq!(labels(&view), vec!["Lecture 1"]);
    }

    #[tokio::test]
    async fn test_page_past_the_end_points_back() {
        let engine = engine(2);
        for id in ["d1", "d2", "d3"] {
            engine.record_view("c", id);
        }
        let view = engine.history_page("c", usize::MAX).await.unwrap();
        assert!(view.items.is_empty());
        assert_eq!(view.prev.as_deref(), Some("hist_page_1"));
        assert_eq!(view.next, None);
    }
}
