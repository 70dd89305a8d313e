//! Keyword search across courses, chapters and documents.
//!
//! Results are grouped by type (courses, then chapters, then documents) in
//! catalog order, capped, and paginated. Every successful page is recorded
//! so the conversation can return to it later.

use std::collections::HashSet;
use std::sync::Arc;

use coursedesk_config::SearchConfig;
use tracing::{debug, info, warn};

use crate::catalog::{CatalogStore, Course, Document};
use crate::outcome::{
    FilterOption, HitKind, Pagination, SearchCounts, SearchError, SearchResultItem, SearchView,
    ValidationError,
};
use crate::session::{SearchSession, SearchSessionStore};
use crate::token::{Action, EncodingError, SearchFilter, TokenCodec};

/// Keyword search over a read-only catalog.
pub struct SearchEngine {
    catalog: Arc<dyn CatalogStore>,
    searches: Arc<SearchSessionStore>,
    codec: TokenCodec,
    limits: SearchConfig,
}

impl SearchEngine {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        searches: Arc<SearchSessionStore>,
        codec: TokenCodec,
        limits: SearchConfig,
    ) -> Self {
        Self {
            catalog,
            searches,
            codec,
            limits,
        }
    }

    /// Run a search and return page `page` of the merged results.
    pub async fn search(
        &self,
        conversation: &str,
        keyword: &str,
        filter: SearchFilter,
        page: usize,
    ) -> Result<SearchView, SearchError> {
        let keyword = keyword.trim();
        let actual = keyword.chars().count();
        if actual < self.limits.min_keyword_len {
            return Err(ValidationError::KeywordTooShort {
                min: self.limits.min_keyword_len,
                actual,
            }
            .into());
        }
        self.check_keyword_fits(keyword, page)?;

        let courses = if filter.includes_courses() {
            self.catalog.search_courses(keyword).await?
        } else {
            Vec::new()
        };
        let documents = if filter.includes_chapters() || filter.includes_resources() {
            self.catalog.search_documents(keyword).await?
        } else {
            Vec::new()
        };

        let (items, counts) = self.merge(filter, courses, documents);
        let total = items.len();
        if total > self.limits.max_results {
            info!(conversation, keyword, total, "Search refused, too many results");
            return Err(SearchError::TooManyResults {
                count: total,
                cap: self.limits.max_results,
            });
        }
        if total == 0 {
            return Err(SearchError::NoResults);
        }

        let (pagination, range) = Pagination::locate(page, total, self.limits.page_size);
        let slice = items[range].to_vec();

        self.searches
            .record(conversation, SearchSession::new(keyword, filter, page));
        debug!(conversation, keyword, %filter, page, total, "Search page produced");

        let filters = SearchFilter::ALL
            .into_iter()
            .map(|option| FilterOption {
                filter: option,
                token: self.token(&Action::SearchFilter {
                    filter: option,
                    keyword: keyword.to_string(),
                }),
                current: option == filter,
            })
            .collect();
        let page_token = |p: usize| {
            self.token(&Action::SearchPage {
                page: p,
                filter,
                keyword: keyword.to_string(),
            })
        };

        Ok(SearchView {
            keyword: keyword.to_string(),
            filter,
            counts,
            items: slice,
            pagination,
            filters,
            prev: pagination.previous().map(&page_token),
            next: pagination.next().map(&page_token),
        })
    }

    /// Re-run the conversation's last search.
    pub async fn resume(&self, conversation: &str) -> Result<SearchView, SearchError> {
        let last = self
            .searches
            .get(conversation)
            .ok_or(SearchError::NoSearchToResume)?;
        self.search(conversation, &last.keyword, last.filter, last.page)
            .await
    }

    /// Every token carrying `keyword` must fit before the catalog is queried.
    fn check_keyword_fits(&self, keyword: &str, page: usize) -> Result<(), ValidationError> {
        for filter in SearchFilter::ALL {
            let candidates = [
                Action::SearchFilter {
                    filter,
                    keyword: keyword.to_string(),
                },
                Action::SearchPage {
                    page: page.saturating_add(1),
                    filter,
                    keyword: keyword.to_string(),
                },
            ];
            for action in &candidates {
                match self.codec.encode_action(action) {
                    Ok(_) => {}
                    Err(EncodingError::TooLong { limit, actual }) => {
                        return Err(ValidationError::PayloadTooLong { limit, actual });
                    }
                    Err(e) => {
                        warn!(error = %e, "Unexpected keyword token failure");
                        return Err(ValidationError::PayloadTooLong {
                            limit: self.codec.max_bytes(),
                            actual: keyword.len(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn merge(
        &self,
        filter: SearchFilter,
        courses: Vec<Course>,
        documents: Vec<Document>,
    ) -> (Vec<SearchResultItem>, SearchCounts) {
        let course_hits: Vec<SearchResultItem> = courses
            .into_iter()
            .enumerate()
            .map(|(i, course)| SearchResultItem {
                kind: HitKind::CourseHit,
                token: self.token(&Action::SearchCourse(course.id)),
                label: course.name,
                detail: Some(course.code),
                sort_key: i,
            })
            .collect();

        let chapter_hits: Vec<SearchResultItem> = if filter.includes_chapters() {
            let mut seen = HashSet::new();
            documents
                .iter()
                .filter(|d| !d.chapter.is_empty())
                .filter(|d| seen.insert((d.course.as_str(), d.chapter.as_str())))
                .enumerate()
                .map(|(i, d)| SearchResultItem {
                    kind: HitKind::ChapterHit,
                    label: d.chapter.clone(),
                    detail: None,
                    token: self.token(&Action::SearchChapter {
                        label: d.chapter.clone(),
                        course: d.course.clone(),
                    }),
                    sort_key: i,
                })
                .collect()
        } else {
            Vec::new()
        };

        let resource_hits: Vec<SearchResultItem> = if filter.includes_resources() {
            documents
                .into_iter()
                .enumerate()
                .map(|(i, d)| SearchResultItem {
                    kind: HitKind::ResourceHit,
                    token: self.token(&Action::Document(d.id)),
                    label: d.title,
                    detail: Some(d.kind.to_string()),
                    sort_key: i,
                })
                .collect()
        } else {
            Vec::new()
        };

        let counts = SearchCounts {
            courses: course_hits.len(),
            chapters: chapter_hits.len(),
            resources: resource_hits.len(),
        };
        let mut items = course_hits;
        items.extend(chapter_hits);
        items.extend(resource_hits);
        (items, counts)
    }

    /// Encode an action, degrading to `noop` when it does not fit.
    fn token(&self, action: &Action) -> String {
        self.codec.encode_action(action).unwrap_or_else(|e| {
            warn!(error = %e, verb = %action.verb(), "Result token does not fit, using noop");
            Action::Noop.verb().wire().to_string()
        })
    }
}
