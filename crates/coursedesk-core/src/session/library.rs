//! Per-conversation favorites and view history.
//!
//! Both lists hold document ids, newest first, in the same bounded maps as
//! sessions. Favorites are unique and refuse new entries once full; history
//! keeps duplicates and forgets its oldest entries.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant, SystemTime};

use coursedesk_config::LibraryConfig;
use serde::{Deserialize, Serialize};

use super::store::BoundedMap;

/// A document remembered for a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bookmark {
    pub document_id: String,
    pub at: SystemTime,
}

impl Bookmark {
    fn new(document_id: &str) -> Self {
        Self {
            document_id: document_id.to_string(),
            at: SystemTime::now(),
        }
    }
}

/// What happened to a favorite request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveOutcome {
    Added,
    AlreadySaved,
    Full,
}

fn limits(config: &LibraryConfig) -> Duration {
    Duration::from_secs(config.idle_ttl_secs)
}

/// Saved documents keyed by conversation id.
pub struct FavoriteStore {
    inner: Mutex<BoundedMap<Vec<Bookmark>>>,
    max_per_conversation: usize,
}

impl FavoriteStore {
    /// `conversations` caps how many conversations are tracked at once.
    pub fn new(config: &LibraryConfig, conversations: usize) -> Self {
        Self::with_limits(limits(config), conversations, config.max_favorites)
    }

    pub fn with_limits(ttl: Duration, conversations: usize, max_per_conversation: usize) -> Self {
        Self {
            inner: Mutex::new(BoundedMap::new(ttl, conversations)),
            max_per_conversation: max_per_conversation.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BoundedMap<Vec<Bookmark>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add(&self, conversation: &str, document_id: &str) -> SaveOutcome {
        let now = Instant::now();
        let mut map = self.lock();
        let mut saved = map.get(conversation, now).unwrap_or_default();
        if saved.iter().any(|b| b.document_id == document_id) {
            return SaveOutcome::AlreadySaved;
        }
        if saved.len() >= self.max_per_conversation {
            return SaveOutcome::Full;
        }
        saved.insert(0, Bookmark::new(document_id));
        map.put(conversation, saved, now);
        SaveOutcome::Added
    }

    /// Returns `false` when the document was not saved.
    pub fn remove(&self, conversation: &str, document_id: &str) -> bool {
        let now = Instant::now();
        let mut map = self.lock();
        let Some(mut saved) = map.get(conversation, now) else {
            return false;
        };
        let before = saved.len();
        saved.retain(|b| b.document_id != document_id);
        if saved.len() == before {
            return false;
        }
        if saved.is_empty() {
            map.remove(conversation);
        } else {
            map.put(conversation, saved, now);
        }
        true
    }

    pub fn contains(&self, conversation: &str, document_id: &str) -> bool {
        self.list(conversation)
            .iter()
            .any(|b| b.document_id == document_id)
    }

    /// Newest first.
    pub fn list(&self, conversation: &str) -> Vec<Bookmark> {
        self.lock()
            .get(conversation, Instant::now())
            .unwrap_or_default()
    }

    pub fn prune(&self) -> usize {
        self.lock().prune(Instant::now())
    }

    /// Conversations with at least one favorite.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Viewed documents keyed by conversation id.
pub struct HistoryStore {
    inner: Mutex<BoundedMap<Vec<Bookmark>>>,
    max_per_conversation: usize,
}

impl HistoryStore {
    /// `conversations` caps how many conversations are tracked at once.
    pub fn new(config: &LibraryConfig, conversations: usize) -> Self {
        Self::with_limits(limits(config), conversations, config.max_history)
    }

    pub fn with_limits(ttl: Duration, conversations: usize, max_per_conversation: usize) -> Self {
        Self {
            inner: Mutex::new(BoundedMap::new(ttl, conversations)),
            max_per_conversation: max_per_conversation.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BoundedMap<Vec<Bookmark>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Put `document_id` at the front, dropping the oldest entries past the cap.
    pub fn record(&self, conversation: &str, document_id: &str) {
        let now = Instant::now();
        let mut map = self.lock();
        let mut viewed = map.get(conversation, now).unwrap_or_default();
        viewed.insert(0, Bookmark::new(document_id));
        viewed.truncate(self.max_per_conversation);
        map.put(conversation, viewed, now);
    }

    /// Newest first.
    pub fn list(&self, conversation: &str) -> Vec<Bookmark> {
        self.lock()
            .get(conversation, Instant::now())
            .unwrap_or_default()
    }

    /// Forget the conversation's history, returning how many entries it had.
    pub fn clear(&self, conversation: &str) -> usize {
        let mut map = self.lock();
        let removed = map
            .get(conversation, Instant::now())
            .map_or(0, |viewed| viewed.len());
        map.remove(conversation);
        removed
    }

    pub fn prune(&self) -> usize {
        self.lock().prune(Instant::now())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
