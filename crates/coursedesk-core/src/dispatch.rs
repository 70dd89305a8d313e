//! Routes chat commands and action tokens to the engines.
//!
//! [`Dispatcher::handle`] never fails: every engine condition becomes a
//! [`Reply`] variant.

use std::sync::Arc;
use std::time::Instant;

use coursedesk_config::AppConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::catalog::CatalogStore;
use crate::library::LibraryEngine;
use crate::navigation::{NavigationEngine, Target};
use crate::outcome::{
    CommandHelp, Item, NavigationError, Reply, SearchError, ShelfView, StaleSession,
};
use crate::search::SearchEngine;
use crate::session::{FavoriteStore, HistoryStore, SearchSessionStore, SessionStore};
use crate::token::{Action, SearchFilter, TokenCodec};

/// Who is asking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub conversation: String,
    #[serde(default)]
    pub is_admin: bool,
}

impl Caller {
    pub fn new(conversation: impl Into<String>, is_admin: bool) -> Self {
        Self {
            conversation: conversation.into(),
            is_admin,
        }
    }
}

/// What arrived from the user: typed text or a pressed button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Input {
    Command(String),
    Token(String),
}

const COMMANDS: [(&str, &str); 8] = [
    ("/start", "Show the home menu and forget the current position"),
    ("/browse", "Browse the catalog from the top"),
    ("/search <keyword>", "Search courses, chapters and documents"),
    ("/favorites", "List your saved documents"),
    ("/history", "List the documents you opened recently"),
    ("/units", "List every institution with its sub-units"),
    ("/help", "List the available commands"),
    ("/status", "Show service status"),
];

/// Entry point for every user interaction.
pub struct Dispatcher {
    navigation: NavigationEngine,
    search: SearchEngine,
    library: LibraryEngine,
    sessions: Arc<SessionStore>,
    searches: Arc<SearchSessionStore>,
    codec: TokenCodec,
    min_keyword_len: usize,
    started_at: Instant,
}

impl Dispatcher {
    /// Wire the engines to `catalog` using the limits in `config`.
    pub fn new(config: &AppConfig, catalog: Arc<dyn CatalogStore>) -> Self {
        let codec = TokenCodec::new(config.tokens.max_bytes);
        let sessions = Arc::new(SessionStore::new(&config.sessions));
        let searches = Arc::new(SearchSessionStore::new(&config.sessions));
        let conversations = config.sessions.max_conversations;
        let library = LibraryEngine::new(
            Arc::clone(&catalog),
            Arc::new(FavoriteStore::new(&config.library, conversations)),
            Arc::new(HistoryStore::new(&config.library, conversations)),
            codec,
            config.library.page_size,
        );
        Self {
            navigation: NavigationEngine::new(
                Arc::clone(&catalog),
                Arc::clone(&sessions),
                codec,
                config.navigation.years,
            ),
            search: SearchEngine::new(
                catalog,
                Arc::clone(&searches),
                codec,
                config.search.clone(),
            ),
            library,
            sessions,
            searches,
            codec,
            min_keyword_len: config.search.min_keyword_len,
            started_at: Instant::now(),
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn searches(&self) -> &SearchSessionStore {
        &self.searches
    }

    pub fn favorites(&self) -> &FavoriteStore {
        self.library.favorites()
    }

    pub fn history(&self) -> &HistoryStore {
        self.library.history()
    }

    /// Drop idle sessions, favorites and history.
    pub fn prune(&self) -> usize {
        self.sessions.prune()
            + self.searches.prune()
            + self.library.favorites().prune()
            + self.library.history().prune()
    }

    /// Answer one interaction.
    pub async fn handle(&self, caller: &Caller, input: Input) -> Reply {
        match input {
            Input::Command(text) => self.handle_text(caller, &text).await,
            Input::Token(token) => self.handle_token(caller, &token).await,
        }
    }

    async fn handle_text(&self, caller: &Caller, text: &str) -> Reply {
        let text = text.trim();
        let Some(command) = text.strip_prefix('/') else {
            return self.suggest(text);
        };

        let (name, rest) = command
            .split_once(char::is_whitespace)
            .unwrap_or((command, ""));
        // Group chats address commands as `/name@bot`.
        let name = name.split('@').next().unwrap_or(name);
        debug!(conversation = %caller.conversation, command = name, "Command");

        match name {
            "start" => {
                self.sessions.clear(&caller.conversation);
                self.searches.clear(&caller.conversation);
                self.home()
            }
            "browse" => self.navigation_reply(caller, self.navigation.browse(&caller.conversation).await),
            "search" => {
                let result = self
                    .search
                    .search(&caller.conversation, rest, SearchFilter::All, 0)
                    .await;
                self.search_reply(rest.trim(), SearchFilter::All, result)
            }
            "favorites" => {
                let result = self.library.favorites_page(&caller.conversation, 0).await;
                self.shelf_reply(caller, result)
            }
            "history" => {
                let result = self.library.history_page(&caller.conversation, 0).await;
                self.shelf_reply(caller, result)
            }
            "units" => self.directory(caller).await,
            "help" => Reply::Help {
                commands: COMMANDS
                    .iter()
                    .map(|(command, description)| CommandHelp {
                        command: command.to_string(),
                        description: description.to_string(),
                    })
                    .collect(),
            },
            "status" => Reply::Status {
                version: crate::build_info::version_string(),
                uptime_secs: self.started_at.elapsed().as_secs(),
                sessions: caller.is_admin.then(|| self.sessions.len()),
                search_sessions: caller.is_admin.then(|| self.searches.len()),
            },
            other => Reply::UnknownCommand {
                command: format!("/{other}"),
            },
        }
    }

    /// Offer to search for plain text.
    fn suggest(&self, text: &str) -> Reply {
        if text.chars().count() < self.min_keyword_len {
            return Reply::Ignored;
        }
        let action = Action::SearchPage {
            page: 0,
            filter: SearchFilter::All,
            keyword: text.to_string(),
        };
        match self.codec.encode_action(&action) {
            Ok(token) => Reply::SearchSuggestion {
                keyword: text.to_string(),
                token,
            },
            Err(e) => {
                debug!(error = %e, "Text too long to suggest a search");
                Reply::Ignored
            }
        }
    }

    async fn handle_token(&self, caller: &Caller, token: &str) -> Reply {
        let action = match self.codec.decode_action(token) {
            Ok(action) => action,
            Err(e) => {
                warn!(conversation = %caller.conversation, error = %e, "Rejected token");
                return e.into();
            }
        };
        debug!(conversation = %caller.conversation, verb = %action.verb(), "Token");

        let conversation = caller.conversation.as_str();
        match action {
            Action::Browse => self.navigation_reply(caller, self.navigation.browse(conversation).await),
            Action::Restart => {
                // Only navigation starts over; the last search stays reachable.
                info!(conversation, "Restart requested");
                self.sessions.clear(conversation);
                self.home()
            }
            Action::Institution(id) => self.descend(caller, Target::Institution(id)).await,
            Action::SubUnit(id) => self.descend(caller, Target::SubUnit(id)).await,
            Action::Year(year) => self.descend(caller, Target::Year(year)).await,
            Action::Term(term) => self.descend(caller, Target::Term(term)).await,
            Action::Course(id) => self.descend(caller, Target::Course(id)).await,
            Action::Chapter(label) => self.descend(caller, Target::Chapter(label)).await,
            Action::Document(id) => match self.navigation.open_document(&id).await {
                Ok(mut view) => {
                    self.library.record_view(conversation, &id);
                    view.search_back = self.search_back(caller);
                    view.favorite = self.library.favorite_token(conversation, &id);
                    Reply::Document(view)
                }
                Err(e) => self.navigation_error(caller, e),
            },
            Action::SearchPage {
                page,
                filter,
                keyword,
            } => {
                let result = self.search.search(conversation, &keyword, filter, page).await;
                self.search_reply(&keyword, filter, result)
            }
            Action::SearchFilter { filter, keyword } => {
                let result = self.search.search(conversation, &keyword, filter, 0).await;
                self.search_reply(&keyword, filter, result)
            }
            Action::SearchCourse(id) => {
                let result = self.navigation.open_course(conversation, &id).await;
                self.navigation_reply(caller, result)
            }
            Action::SearchChapter { label, course } => {
                let result = self.navigation.open_chapter(conversation, &course, &label).await;
                self.navigation_reply(caller, result)
            }
            Action::SearchBack => match self.search.resume(conversation).await {
                Ok(view) => Reply::Search(view),
                Err(SearchError::NoSearchToResume) => Reply::NoSearchToResume {
                    browse: self.encode_or_noop(&Action::Browse),
                },
                Err(e) => {
                    let last = self.searches.get(conversation);
                    let (keyword, filter) = last
                        .map(|s| (s.keyword, s.filter))
                        .unwrap_or_else(|| (String::new(), SearchFilter::All));
                    self.search_reply(&keyword, filter, Err(e))
                }
            },
            Action::FavoriteAdd(id) => match self.library.add_favorite(conversation, &id).await {
                Ok((document, outcome)) => Reply::FavoriteSaved {
                    title: document.title,
                    outcome,
                    favorites: self.encode_or_noop(&Action::FavoritePage(0)),
                },
                Err(e) => self.navigation_error(caller, e),
            },
            Action::FavoriteRemove(id) => {
                let result = self.library.remove_favorite(conversation, &id).await;
                self.shelf_reply(caller, result)
            }
            Action::FavoritePage(page) => {
                let result = self.library.favorites_page(conversation, page).await;
                self.shelf_reply(caller, result)
            }
            Action::HistoryPage(page) => {
                let result = self.library.history_page(conversation, page).await;
                self.shelf_reply(caller, result)
            }
            Action::HistoryClear => Reply::HistoryCleared {
                removed: self.library.clear_history(conversation),
                browse: self.encode_or_noop(&Action::Browse),
            },
            Action::Directory => self.directory(caller).await,
            Action::Noop => Reply::Ignored,
        }
    }

    async fn descend(&self, caller: &Caller, target: Target) -> Reply {
        let result = self.navigation.descend(&caller.conversation, target).await;
        self.navigation_reply(caller, result)
    }

    async fn directory(&self, caller: &Caller) -> Reply {
        match self.navigation.directory().await {
            Ok(institutions) => Reply::Directory { institutions },
            Err(e) => self.navigation_error(caller, e),
        }
    }

    fn home(&self) -> Reply {
        let entries = [
            ("Browse the catalog", Action::Browse),
            ("My favorites", Action::FavoritePage(0)),
            ("Recently viewed", Action::HistoryPage(0)),
            ("All sub-units", Action::Directory),
        ];
        Reply::Home {
            items: entries
                .into_iter()
                .map(|(label, action)| Item {
                    label: label.to_string(),
                    detail: None,
                    token: self.encode_or_noop(&action),
                })
                .collect(),
            min_keyword_len: self.min_keyword_len,
        }
    }

    fn shelf_reply(&self, caller: &Caller, result: Result<ShelfView, NavigationError>) -> Reply {
        match result {
            Ok(view) => Reply::Shelf(view),
            Err(e) => self.navigation_error(caller, e),
        }
    }

    fn navigation_reply(
        &self,
        caller: &Caller,
        result: Result<crate::outcome::NavigationView, NavigationError>,
    ) -> Reply {
        match result {
            Ok(mut view) => {
                view.search_back = self.search_back(caller);
                Reply::Navigation(view)
            }
            Err(e) => self.navigation_error(caller, e),
        }
    }

    fn navigation_error(&self, caller: &Caller, err: NavigationError) -> Reply {
        match err {
            NavigationError::Stale(stale) => self.stale(caller, stale),
            NavigationError::Catalog(e) => {
                warn!(conversation = %caller.conversation, error = %e, "Catalog unavailable");
                Reply::Unavailable {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Stale selections degrade to a fresh start.
    fn stale(&self, caller: &Caller, stale: StaleSession) -> Reply {
        info!(conversation = %caller.conversation, reason = %stale, "Stale session");
        Reply::Stale {
            reason: stale.to_string(),
            restart: self.encode_or_noop(&Action::Restart),
        }
    }

    fn search_reply(
        &self,
        keyword: &str,
        filter: SearchFilter,
        result: Result<crate::outcome::SearchView, SearchError>,
    ) -> Reply {
        match result {
            Ok(view) => Reply::Search(view),
            Err(SearchError::Validation(e)) => e.into(),
            Err(SearchError::TooManyResults { count, cap }) => Reply::TooManyResults {
                keyword: keyword.to_string(),
                count,
                cap,
            },
            Err(SearchError::NoResults) => Reply::NoResults {
                keyword: keyword.to_string(),
                filter,
            },
            Err(SearchError::NoSearchToResume) => Reply::NoSearchToResume {
                browse: self.encode_or_noop(&Action::Browse),
            },
            Err(SearchError::Catalog(e)) => {
                warn!(error = %e, "Catalog unavailable during search");
                Reply::Unavailable {
                    reason: e.to_string(),
                }
            }
        }
    }

    fn search_back(&self, caller: &Caller) -> Option<String> {
        self.searches
            .get(&caller.conversation)
            .map(|_| self.encode_or_noop(&Action::SearchBack))
    }

    fn encode_or_noop(&self, action: &Action) -> String {
        self.codec
            .encode_action(action)
            .unwrap_or_else(|_| Action::Noop.verb().wire().to_string())
    }
}
