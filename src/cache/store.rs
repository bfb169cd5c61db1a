//! Cache Store
//!
//! Owns every query result of one entity kind together with its tags. Reads
//! hand out copies; the only ways to change a result are [`CacheStore::put`]
//! (a fetch landed), [`CacheStore::patch`] / [`CacheStore::undo`] (optimistic
//! edits), and [`CacheStore::invalidate`]. None of them suspend, so each is
//! atomic with respect to other tasks on the runtime.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use board_types::{EntityId, Record};
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::{debug, trace};

use super::draft::{Draft, QueryData, UndoToken};
use super::{QueryKey, Tag};

const EVENT_CAPACITY: usize = 256;

/// Notifications published by a cache.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEvent {
    /// A fetched result was stored
    Stored(QueryKey),
    /// A patch or undo changed a result
    Patched(QueryKey),
    /// The result is stale and should be refetched
    Invalidated(QueryKey),
}

#[derive(Debug, Clone)]
struct CacheEntry<E> {
    data: QueryData<E>,
    tags: Vec<Tag>,
    stale: bool,
    fetched_at: DateTime<Utc>,
}

/// Anything that can drop results by tag. Lets one mutation invalidate
/// caches of other entity kinds.
pub trait Invalidate: Send + Sync {
    fn invalidate(&self, tags: &[Tag]) -> Vec<QueryKey>;
}

pub struct CacheStore<E: Record> {
    entries: RwLock<HashMap<QueryKey, CacheEntry<E>>>,
    subscribers: RwLock<HashMap<QueryKey, usize>>,
    events: broadcast::Sender<CacheEvent>,
}

impl<E: Record> CacheStore<E> {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            entries: RwLock::new(HashMap::new()),
            subscribers: RwLock::new(HashMap::new()),
            events,
        }
    }

    fn read_entries(&self) -> RwLockReadGuard<'_, HashMap<QueryKey, CacheEntry<E>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, HashMap<QueryKey, CacheEntry<E>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: CacheEvent) {
        // No receivers is fine: nobody is listening for refetches.
        let _ = self.events.send(event);
    }

    // ── Reads ──

    pub fn read(&self, key: &QueryKey) -> Option<QueryData<E>> {
        self.read_entries().get(key).map(|e| e.data.clone())
    }

    /// Records of a result, empty when absent.
    pub fn records(&self, key: &QueryKey) -> Vec<E> {
        self.read_entries()
            .get(key)
            .map(|e| e.data.records().to_vec())
            .unwrap_or_default()
    }

    pub fn find(&self, key: &QueryKey, id: &EntityId) -> Option<E> {
        self.read_entries()
            .get(key)
            .and_then(|e| e.data.find(id).cloned())
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.read_entries().contains_key(key)
    }

    pub fn is_stale(&self, key: &QueryKey) -> bool {
        self.read_entries().get(key).is_some_and(|e| e.stale)
    }

    pub fn tags(&self, key: &QueryKey) -> Vec<Tag> {
        self.read_entries()
            .get(key)
            .map(|e| e.tags.clone())
            .unwrap_or_default()
    }

    pub fn fetched_at(&self, key: &QueryKey) -> Option<DateTime<Utc>> {
        self.read_entries().get(key).map(|e| e.fetched_at)
    }

    // ── Writes ──

    /// Store a fetched result. Server ordering replaces any local ordering.
    pub fn put(&self, key: QueryKey, data: QueryData<E>, tags: Vec<Tag>) {
        debug!(key = %key, records = data.len(), "cache store");
        self.write_entries().insert(
            key.clone(),
            CacheEntry {
                data,
                tags,
                stale: false,
                fetched_at: Utc::now(),
            },
        );
        self.publish(CacheEvent::Stored(key));
    }

    pub fn remove(&self, key: &QueryKey) -> Option<QueryData<E>> {
        self.write_entries().remove(key).map(|e| e.data)
    }

    /// Edit the result under `key` in place.
    ///
    /// Patching an absent key does nothing and yields a no-op token.
    pub fn patch<F>(&self, key: &QueryKey, mutator: F) -> UndoToken<E>
    where
        F: FnOnce(&mut Draft<'_, E>),
    {
        let ops = {
            let mut entries = self.write_entries();
            let Some(entry) = entries.get_mut(key) else {
                trace!(key = %key, "patch on absent key ignored");
                return UndoToken::noop(key.clone());
            };
            let mut draft = Draft::new(&mut entry.data);
            mutator(&mut draft);
            draft.into_journal()
        };

        trace!(key = %key, ops = ops.len(), "cache patch");
        if !ops.is_empty() {
            self.publish(CacheEvent::Patched(key.clone()));
        }
        UndoToken::new(key.clone(), ops)
    }

    /// Reverse the edit recorded in `token`.
    ///
    /// Consuming the token makes a second undo impossible. If the result was
    /// dropped since the patch, there is nothing to restore.
    pub fn undo(&self, token: UndoToken<E>) {
        let (key, ops) = token.into_parts();
        if ops.is_empty() {
            return;
        }

        {
            let mut entries = self.write_entries();
            let Some(entry) = entries.get_mut(&key) else {
                trace!(key = %key, "undo on absent key ignored");
                return;
            };
            for op in ops.into_iter().rev() {
                op.apply(&mut entry.data);
            }
        }

        debug!(key = %key, "cache patch undone");
        self.publish(CacheEvent::Patched(key));
    }

    /// Mark every result carrying any of `tags` stale and announce it.
    pub fn invalidate(&self, tags: &[Tag]) -> Vec<QueryKey> {
        let stale: Vec<QueryKey> = {
            let mut entries = self.write_entries();
            entries
                .iter_mut()
                .filter(|(_, entry)| entry.tags.iter().any(|t| tags.contains(t)))
                .map(|(key, entry)| {
                    entry.stale = true;
                    key.clone()
                })
                .collect()
        };

        for key in &stale {
            debug!(key = %key, "cache invalidated");
            self.publish(CacheEvent::Invalidated(key.clone()));
        }
        stale
    }

    // ── Subscriptions ──

    /// A view is showing `key`; invalidation should refetch it.
    pub fn subscribe(&self, key: &QueryKey) {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *subscribers.entry(key.clone()).or_default() += 1;
    }

    pub fn unsubscribe(&self, key: &QueryKey) {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(count) = subscribers.get_mut(key) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                subscribers.remove(key);
            }
        }
    }

    pub fn subscriber_count(&self, key: &QueryKey) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .copied()
            .unwrap_or_default()
    }

    pub fn events(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }
}

impl<E: Record> Default for CacheStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Record> Invalidate for CacheStore<E> {
    fn invalidate(&self, tags: &[Tag]) -> Vec<QueryKey> {
        CacheStore::invalidate(self, tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use board_types::{EntityKind, Priority, Project, ProjectPatch, ProjectStatus};

    fn project(id: i64, name: &str) -> Project {
        Project {
            id: EntityId::Server(id),
            name: name.into(),
            description: None,
            status: ProjectStatus::OnTrack,
            priority: Priority::Medium,
            owner_id: None,
            start_date: None,
            end_date: None,
            created_at: None,
        }
    }

    fn store_with(records: Vec<Project>) -> CacheStore<Project> {
        let cache = CacheStore::new();
        cache.put(
            QueryKey::Projects,
            QueryData::List(records),
            QueryKey::Projects.default_tags(),
        );
        cache
    }

    #[test]
    fn test_patch_absent_key_is_noop() {
        let cache: CacheStore<Project> = CacheStore::new();
        let token = cache.patch(&QueryKey::Projects, |d| {
            d.insert_at_head(project(1, "Alpha"));
        });
        assert!(token.is_noop());
        cache.undo(token);
        assert!(cache.read(&QueryKey::Projects).is_none());
    }

    #[test]
    fn test_insert_then_undo_restores_list() {
        let cache = store_with(vec![project(1, "Alpha")]);
        let before = cache.read(&QueryKey::Projects);

        let token = cache.patch(&QueryKey::Projects, |d| {
            d.insert_at_head(project(2, "Beta"));
        });
        assert_eq!(cache.records(&QueryKey::Projects)[0].name, "Beta");

        cache.undo(token);
        assert_eq!(cache.read(&QueryKey::Projects), before);
    }

    #[test]
    fn test_remove_many_then_undo_restores_order() {
        let cache = store_with(vec![
            project(1, "A"),
            project(2, "B"),
            project(3, "C"),
            project(4, "D"),
        ]);
        let before = cache.read(&QueryKey::Projects);

        let token = cache.patch(&QueryKey::Projects, |d| {
            assert_eq!(d.remove_ids(&[EntityId::Server(2), EntityId::Server(4)]), 2);
        });
        assert_eq!(cache.records(&QueryKey::Projects).len(), 2);

        cache.undo(token);
        assert_eq!(cache.read(&QueryKey::Projects), before);
    }

    #[test]
    fn test_merge_on_point_query() {
        let cache: CacheStore<Project> = CacheStore::new();
        let key = QueryKey::Project(EntityId::Server(1));
        cache.put(key.clone(), QueryData::Item(project(1, "Alpha")), key.default_tags());

        let token = cache.patch(&key, |d| {
            let merged = d.merge_fields(
                &EntityId::Server(1),
                &ProjectPatch {
                    name: Some("Alpha 2".into()),
                    ..Default::default()
                },
            );
            assert!(merged.is_some());
        });
        assert_eq!(cache.find(&key, &EntityId::Server(1)).unwrap().name, "Alpha 2");

        cache.undo(token);
        assert_eq!(cache.find(&key, &EntityId::Server(1)).unwrap().name, "Alpha");
    }

    #[test]
    fn test_undo_after_result_dropped_is_harmless() {
        let cache = store_with(vec![project(1, "Alpha")]);
        let token = cache.patch(&QueryKey::Projects, |d| {
            d.remove_by_id(&EntityId::Server(1));
        });
        cache.remove(&QueryKey::Projects);
        cache.undo(token);
        assert!(!cache.contains(&QueryKey::Projects));
    }

    #[test]
    fn test_invalidate_marks_tagged_results_stale() {
        let cache = store_with(vec![project(1, "Alpha")]);
        let point = QueryKey::Project(EntityId::Server(1));
        cache.put(point.clone(), QueryData::Item(project(1, "Alpha")), point.default_tags());
        let mut events = cache.events();

        let stale = cache.invalidate(&[Tag::list(EntityKind::Project)]);
        assert_eq!(stale, vec![QueryKey::Projects]);
        assert!(cache.is_stale(&QueryKey::Projects));
        assert!(!cache.is_stale(&point));
        assert_eq!(
            events.try_recv().unwrap(),
            CacheEvent::Invalidated(QueryKey::Projects)
        );
    }

    #[test]
    fn test_subscriber_counts() {
        let cache: CacheStore<Project> = CacheStore::new();
        cache.subscribe(&QueryKey::Projects);
        cache.subscribe(&QueryKey::Projects);
        cache.unsubscribe(&QueryKey::Projects);
        assert_eq!(cache.subscriber_count(&QueryKey::Projects), 1);
        cache.unsubscribe(&QueryKey::Projects);
        cache.unsubscribe(&QueryKey::Projects);
        assert_eq!(cache.subscriber_count(&QueryKey::Projects), 0);
    }
}
