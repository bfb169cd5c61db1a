//! Query loading and background refetch
//!
//! A [`Fetcher`] knows how to turn a [`QueryKey`] into a gateway call for one
//! entity kind. [`load`] runs it and stores the result; [`spawn_refetcher`]
//! keeps subscribed results fresh after invalidation.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use board_client::{BoardGateway, GatewayResult, RemoteError};
use board_types::{CalendarItem, Project, ProjectMember, Record, Task};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{CacheEvent, CacheStore, QueryData, QueryKey};

#[async_trait]
pub trait Fetcher<E: Record>: Send + Sync {
    async fn fetch(&self, key: &QueryKey) -> GatewayResult<QueryData<E>>;
}

fn unsupported(key: &QueryKey) -> RemoteError {
    RemoteError::new("fetch", format!("no fetcher for {key}"))
}

// ============================================================================
// PER-ENTITY FETCHERS
// ============================================================================

#[derive(Clone)]
pub struct ProjectQueries {
    gateway: BoardGateway,
}

impl ProjectQueries {
    pub fn new(gateway: BoardGateway) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Fetcher<Project> for ProjectQueries {
    async fn fetch(&self, key: &QueryKey) -> GatewayResult<QueryData<Project>> {
        match key {
            QueryKey::Projects => self.gateway.list_projects().await.map(QueryData::List),
            QueryKey::ProjectsByOwner(owner) => self
                .gateway
                .list_projects_by_owner(owner)
                .await
                .map(QueryData::List),
            QueryKey::Project(id) => self.gateway.get_project(id).await.map(QueryData::Item),
            other => Err(unsupported(other)),
        }
    }
}

#[derive(Clone)]
pub struct TaskQueries {
    gateway: BoardGateway,
}

impl TaskQueries {
    pub fn new(gateway: BoardGateway) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Fetcher<Task> for TaskQueries {
    async fn fetch(&self, key: &QueryKey) -> GatewayResult<QueryData<Task>> {
        match key {
            QueryKey::Tasks => self.gateway.list_tasks().await.map(QueryData::List),
            QueryKey::TasksForProject(project) => self
                .gateway
                .list_tasks_for_project(project)
                .await
                .map(QueryData::List),
            QueryKey::Task(id) => self.gateway.get_task(id).await.map(QueryData::Item),
            other => Err(unsupported(other)),
        }
    }
}

#[derive(Clone)]
pub struct MemberQueries {
    gateway: BoardGateway,
}

impl MemberQueries {
    pub fn new(gateway: BoardGateway) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Fetcher<ProjectMember> for MemberQueries {
    async fn fetch(&self, key: &QueryKey) -> GatewayResult<QueryData<ProjectMember>> {
        match key {
            QueryKey::Members(project) => self
                .gateway
                .list_members(project)
                .await
                .map(QueryData::List),
            other => Err(unsupported(other)),
        }
    }
}

#[derive(Clone)]
pub struct CalendarQueries {
    gateway: BoardGateway,
}

impl CalendarQueries {
    pub fn new(gateway: BoardGateway) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Fetcher<CalendarItem> for CalendarQueries {
    async fn fetch(&self, key: &QueryKey) -> GatewayResult<QueryData<CalendarItem>> {
        match key {
            QueryKey::CalendarMonth { year, month } => self
                .gateway
                .calendar_month(*year, *month)
                .await
                .map(QueryData::List),
            other => Err(unsupported(other)),
        }
    }
}

// ============================================================================
// LOADING
// ============================================================================

/// Fetch `key` and store the result with its default tags.
pub async fn load<E: Record>(
    cache: &CacheStore<E>,
    fetcher: &dyn Fetcher<E>,
    key: &QueryKey,
) -> GatewayResult<QueryData<E>> {
    let data = fetcher.fetch(key).await?;
    cache.put(key.clone(), data.clone(), key.default_tags());
    Ok(data)
}

/// Cached result when fresh, otherwise a fetch.
pub async fn ensure_loaded<E: Record>(
    cache: &CacheStore<E>,
    fetcher: &dyn Fetcher<E>,
    key: &QueryKey,
) -> GatewayResult<QueryData<E>> {
    if !cache.is_stale(key) {
        if let Some(data) = cache.read(key) {
            return Ok(data);
        }
    }
    load(cache, fetcher, key).await
}

/// Reload invalidated results that a view is still subscribed to.
///
/// The task ends once the cache is dropped.
pub fn spawn_refetcher<E: Record>(
    cache: &Arc<CacheStore<E>>,
    fetcher: Arc<dyn Fetcher<E>>,
) -> JoinHandle<()> {
    let mut events = cache.events();
    let weak: Weak<CacheStore<E>> = Arc::downgrade(cache);

    tokio::spawn(async move {
        info!(kind = %E::KIND, "refetcher started");
        loop {
            let key = match events.recv().await {
                Ok(CacheEvent::Invalidated(key)) => key,
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(kind = %E::KIND, skipped, "refetcher lagged behind invalidations");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            let Some(cache) = weak.upgrade() else {
                break;
            };
            if cache.subscriber_count(&key) == 0 {
                debug!(key = %key, "no subscribers, refetch skipped");
                continue;
            }

            match load(&cache, fetcher.as_ref(), &key).await {
                Ok(data) => debug!(key = %key, records = data.len(), "refetched"),
                Err(err) => warn!(key = %key, error = %err, "refetch failed"),
            }
        }
        debug!(kind = %E::KIND, "refetcher stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Tag;
    use board_client::{MemoryTableStore, StaticCredentials};
    use board_types::EntityKind;
    use serde_json::json;
    use std::time::Duration;

    fn gateway() -> (Arc<MemoryTableStore>, BoardGateway) {
        let store = Arc::new(MemoryTableStore::new());
        store.seed(
            "projects",
            [
                json!({ "id": 1, "name": "Alpha", "owner_id": "u-1" }),
                json!({ "id": 2, "name": "Beta", "owner_id": "u-2" }),
            ],
        );
        let gw = BoardGateway::new(store.clone(), Arc::new(StaticCredentials::new("token")));
        (store, gw)
    }

    #[tokio::test]
    async fn test_load_stores_server_order() {
        let (_, gw) = gateway();
        let cache = CacheStore::new();
        let data = load(&cache, &ProjectQueries::new(gw), &QueryKey::Projects)
            .await
            .unwrap();

        let names: Vec<String> = data.records().iter().map(|p| p.name.clone()).collect();
        assert_eq!(names, vec!["Beta", "Alpha"]);
        assert_eq!(cache.tags(&QueryKey::Projects), vec![Tag::list(EntityKind::Project)]);
    }

    #[tokio::test]
    async fn test_wrong_key_is_an_error() {
        let (_, gw) = gateway();
        let err = TaskQueries::new(gw).fetch(&QueryKey::Projects).await.unwrap_err();
        assert!(err.message.contains("no fetcher"));
    }

    #[tokio::test]
    async fn test_ensure_loaded_uses_fresh_cache() {
        let (store, gw) = gateway();
        let cache = CacheStore::new();
        let fetcher = ProjectQueries::new(gw);

        ensure_loaded(&cache, &fetcher, &QueryKey::Projects).await.unwrap();
        ensure_loaded(&cache, &fetcher, &QueryKey::Projects).await.unwrap();
        assert_eq!(store.call_count(), 1);

        cache.invalidate(&[Tag::list(EntityKind::Project)]);
        ensure_loaded(&cache, &fetcher, &QueryKey::Projects).await.unwrap();
        assert_eq!(store.call_count(), 2);
    }

    #[tokio::test]
    async fn test_refetcher_reloads_subscribed_keys() {
        let (store, gw) = gateway();
        let cache = Arc::new(CacheStore::new());
        let fetcher: Arc<dyn Fetcher<Project>> = Arc::new(ProjectQueries::new(gw));
        load(&cache, fetcher.as_ref(), &QueryKey::Projects).await.unwrap();
        cache.subscribe(&QueryKey::Projects);

        let handle = spawn_refetcher(&cache, fetcher);
        store.seed("projects", [json!({ "id": 3, "name": "Gamma" })]);
        cache.invalidate(&[Tag::list(EntityKind::Project)]);

        for _ in 0..100 {
            if !cache.is_stale(&QueryKey::Projects) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(!cache.is_stale(&QueryKey::Projects));
        assert_eq!(cache.records(&QueryKey::Projects).len(), 3);

        drop(cache);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
