//! Bounded, conversation-keyed session maps.
//!
//! Entries idle longer than the TTL are treated as absent and dropped by
//! `prune`. When the map is full, inserting a new conversation evicts the
//! entry touched least recently.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant, SystemTime};

use coursedesk_config::SessionConfig;
use tracing::debug;

use super::{NavigationSession, Selection};
use crate::outcome::StaleSession;
use crate::token::SearchFilter;

struct Entry<V> {
    value: V,
    touched: Instant,
}

pub(super) struct BoundedMap<V> {
    entries: HashMap<String, Entry<V>>,
    ttl: Duration,
    capacity: usize,
}

impl<V: Clone> BoundedMap<V> {
    pub(super) fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            capacity: capacity.max(1),
        }
    }

    fn expired(&self, entry: &Entry<V>, now: Instant) -> bool {
        now.saturating_duration_since(entry.touched) > self.ttl
    }

    pub(super) fn get(&mut self, key: &str, now: Instant) -> Option<V> {
        let expired = self.entries.get(key).map(|e| self.expired(e, now))?;
        if expired {
            self.entries.remove(key);
            return None;
        }
        let entry = self.entries.get_mut(key)?;
        entry.touched = now;
        Some(entry.value.clone())
    }

    pub(super) fn put(&mut self, key: &str, value: V, now: Instant) {
        if !self.entries.contains_key(key) && self.entries.len() >= self.capacity {
            self.prune(now);
            if self.entries.len() >= self.capacity {
                let oldest = self
                    .entries
                    .iter()
                    .min_by_key(|(_, e)| e.touched)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    debug!(conversation = %oldest, "Evicting least recently used session");
                    self.entries.remove(&oldest);
                }
            }
        }
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                touched: now,
            },
        );
    }

    pub(super) fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }

    pub(super) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(super) fn prune(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries
            .retain(|_, e| now.saturating_duration_since(e.touched) <= ttl);
        before - self.entries.len()
    }
}

fn limits(config: &SessionConfig) -> (Duration, usize) {
    (
        Duration::from_secs(config.idle_ttl_secs),
        config.max_conversations,
    )
}

/// Navigation sessions keyed by conversation id.
pub struct SessionStore {
    inner: Mutex<BoundedMap<NavigationSession>>,
}

impl SessionStore {
    pub fn new(config: &SessionConfig) -> Self {
        let (ttl, capacity) = limits(config);
        Self::with_limits(ttl, capacity)
    }

    pub fn with_limits(ttl: Duration, capacity: usize) -> Self {
        Self {
            inner: Mutex::new(BoundedMap::new(ttl, capacity)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BoundedMap<NavigationSession>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The conversation's session, or a fresh empty one.
    pub fn get(&self, conversation: &str) -> NavigationSession {
        self.get_at(conversation, Instant::now())
    }

    /// Set `selection` and clear every deeper level.
    ///
    /// Returns `false` without changing anything when an ancestor level is
    /// unset.
    pub fn update(&self, conversation: &str, selection: Selection) -> bool {
        self.update_at(conversation, selection, Instant::now())
    }

    /// Set `selection` only while the stored levels above it still equal
    /// `ancestors`, and return the session as stored.
    ///
    /// The check and the write happen under one lock, so a concurrent change
    /// to an ancestor makes this fail instead of saving a mixed path.
    pub fn update_if(
        &self,
        conversation: &str,
        ancestors: &[Selection],
        selection: Selection,
    ) -> Result<NavigationSession, StaleSession> {
        self.update_if_at(conversation, ancestors, selection, Instant::now())
    }

    pub fn clear(&self, conversation: &str) {
        self.lock().remove(conversation);
    }

    /// Install a whole, already-consistent session.
    pub fn replace(&self, conversation: &str, session: NavigationSession) {
        self.lock().put(conversation, session, Instant::now());
    }

    /// Drop idle sessions, returning how many were removed.
    pub fn prune(&self) -> usize {
        self.lock().prune(Instant::now())
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get_at(&self, conversation: &str, now: Instant) -> NavigationSession {
        self.lock().get(conversation, now).unwrap_or_default()
    }

    fn update_at(&self, conversation: &str, selection: Selection, now: Instant) -> bool {
        let mut map = self.lock();
        let mut session = map.get(conversation, now).unwrap_or_default();
        if !session.select(selection) {
            return false;
        }
        map.put(conversation, session, now);
        true
    }

    fn update_if_at(
        &self,
        conversation: &str,
        ancestors: &[Selection],
        selection: Selection,
        now: Instant,
    ) -> Result<NavigationSession, StaleSession> {
        let level = selection.level();
        let mut map = self.lock();
        let mut session = map.get(conversation, now).unwrap_or_default();
        for (i, expected) in ancestors.iter().enumerate() {
            match session.selections().get(i) {
                None => {
                    return Err(StaleSession::MissingAncestor {
                        level: expected.level(),
                    });
                }
                Some(current) if current != expected => {
                    return Err(StaleSession::ParentMismatch {
                        level: expected.level(),
                    });
                }
                Some(_) => {}
            }
        }
        if ancestors.len() != level.index() || !session.select(selection) {
            return Err(StaleSession::MissingAncestor {
                level: level.parent().unwrap_or(level),
            });
        }
        map.put(conversation, session.clone(), now);
        Ok(session)
    }
}

/// The last search a conversation ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSession {
    pub keyword: String,
    pub filter: SearchFilter,
    pub page: usize,
    pub recorded_at: SystemTime,
}

impl SearchSession {
    pub fn new(keyword: impl Into<String>, filter: SearchFilter, page: usize) -> Self {
        Self {
            keyword: keyword.into(),
            filter,
            page,
            recorded_at: SystemTime::now(),
        }
    }
}

/// Search sessions keyed by conversation id.
pub struct SearchSessionStore {
    inner: Mutex<BoundedMap<SearchSession>>,
}

impl SearchSessionStore {
    pub fn new(config: &SessionConfig) -> Self {
        let (ttl, capacity) = limits(config);
        Self::with_limits(ttl, capacity)
    }

    pub fn with_limits(ttl: Duration, capacity: usize) -> Self {
        Self {
            inner: Mutex::new(BoundedMap::new(ttl, capacity)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BoundedMap<SearchSession>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, conversation: &str) -> Option<SearchSession> {
        self.lock().get(conversation, Instant::now())
    }

    /// Overwrite the conversation's last search.
    pub fn record(&self, conversation: &str, session: SearchSession) {
        self.lock().put(conversation, session, Instant::now());
    }

    pub fn clear(&self, conversation: &str) {
        self.lock().remove(conversation);
    }

    pub fn prune(&self) -> usize {
        self.lock().prune(Instant::now())
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Depth;
    use pretty_assertions::assert_eq;

    fn institution(id: &str) -> Selection {
        Selection::Institution {
            id: id.to_string(),
            name: id.to_uppercase(),
        }
    }

    fn unit(id: &str) -> Selection {
        Selection::SubUnit {
            id: id.to_string(),
            name: id.to_uppercase(),
        }
    }

    #[test]
    fn test_get_unknown_conversation_is_empty() {
        let store = SessionStore::new(&SessionConfig::default());
        assert_eq!(store.get("nobody"), NavigationSession::new());
        assert!(store.is_empty());
    }

    #[test]
    fn test_update_rejects_missing_ancestor() {
        let store = SessionStore::new(&SessionConfig::default());
        assert!(!store.update("c", unit("cs")));
        assert_eq!(store.get("c").depth(), Depth::Empty);
        assert!(store.is_empty());
    }

    #[test]
    fn test_update_cascades() {
        let store = SessionStore::new(&SessionConfig::default());
        assert!(store.update("c", institution("eng")));
        assert!(store.update("c", unit("cs")));
        assert!(store.update("c", Selection::Year { year: 2 }));
        assert!(store.update("c", institution("med")));

        let session = store.get("c");
        assert_eq!(session.institution_id(), Some("med"));
        assert_eq!(session.unit_id(), None);
        assert_eq!(session.year(), None);
    }

    #[test]
    fn test_update_if_rechecks_ancestors() {
        let store = SessionStore::new(&SessionConfig::default());
        store.update("c", institution("eng"));
        let stored = store
            .update_if("c", &[institution("eng")], unit("cs"))
            .unwrap();
        assert_eq!(stored.breadcrumb(), "ENG → CS");

        // The institution changed after the caller looked at the session.
        store.update("c", institution("sci"));
        let err = store
            .update_if("c", &[institution("eng")], unit("cs"))
            .unwrap_err();
        assert_eq!(
            err,
            StaleSession::ParentMismatch {
                level: crate::session::Level::Institution
            }
        );
        assert_eq!(store.get("c").breadcrumb(), "SCI");

        store.clear("c");
        let err = store
            .update_if("c", &[institution("eng")], unit("cs"))
            .unwrap_err();
        assert_eq!(
            err,
            StaleSession::MissingAncestor {
                level: crate::session::Level::Institution
            }
        );
        assert!(store.is_empty());
    }

    #[test]
    fn test_conversations_are_isolated() {
        let store = SessionStore::new(&SessionConfig::default());
        store.update("a", institution("eng"));
        store.update("b", institution("med"));
        store.clear("a");
        assert!(store.get("a").is_empty());
        assert_eq!(store.get("b").institution_id(), Some("med"));
    }

    #[test]
    fn test_idle_sessions_expire() {
        let store = SessionStore::with_limits(Duration::from_secs(60), 10);
        let start = Instant::now();
        assert!(store.update_at("c", institution("eng"), start));

        let later = start + Duration::from_secs(30);
        assert_eq!(store.get_at("c", later).institution_id(), Some("eng"));

        // The read above refreshed the entry.
        let after_refresh = later + Duration::from_secs(45);
        assert!(!store.get_at("c", after_refresh).is_empty());

        let much_later = after_refresh + Duration::from_secs(61);
        assert!(store.get_at("c", much_later).is_empty());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_prune_drops_only_idle_entries() {
        let store = SessionStore::with_limits(Duration::from_secs(10), 10);
        let start = Instant::now();
        store.update_at("old", institution("eng"), start);
        store.update_at("new", institution("eng"), start + Duration::from_secs(8));

        let removed = store.lock().prune(start + Duration::from_secs(12));
        assert_eq!(removed, 1);
        assert_eq!(store.len(), 1);
        assert!(!store.get_at("new", start + Duration::from_secs(12)).is_empty());
    }

    #[test]
    fn test_capacity_evicts_least_recently_touched() {
        let store = SessionStore::with_limits(Duration::from_secs(3600), 2);
        let start = Instant::now();
        store.update_at("a", institution("eng"), start);
        store.update_at("b", institution("eng"), start + Duration::from_secs(1));
        // Touch "a" so "b" becomes the oldest.
        store.get_at("a", start + Duration::from_secs(2));
        store.update_at("c", institution("eng"), start + Duration::from_secs(3));

        let now = start + Duration::from_secs(4);
        assert_eq!(store.len(), 2);
        assert!(!store.get_at("a", now).is_empty());
        assert!(store.get_at("b", now).is_empty());
        assert!(!store.get_at("c", now).is_empty());
    }

    #[test]
    fn test_search_session_overwrite_and_clear() {
        let store = SearchSessionStore::new(&SessionConfig::default());
        assert!(store.get("c").is_none());

        store.record("c", SearchSession::new("bio", SearchFilter::All, 0));
        store.record("c", SearchSession::new("chem", SearchFilter::Courses, 2));
        let session = store.get("c").unwrap();
        assert_eq!(session.keyword, "chem");
        assert_eq!(session.filter, SearchFilter::Courses);
        assert_eq!(session.page, 2);

        store.clear("c");
        assert!(store.get("c").is_none());
    }
}
