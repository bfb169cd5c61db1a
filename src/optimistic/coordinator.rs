use std::future::Future;
use std::sync::Arc;

use board_client::{GatewayResult, RemoteError};
use board_types::{EntityId, Record, Speculate, Validate, ValidationError};
use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::MutationSpec;
use crate::cache::{CacheStore, Invalidate, UndoToken};
use crate::error::MutationError;
use crate::notify::{Notification, Notifier, Severity};

/// Runs optimistic create / update / delete against one cache store.
///
/// Holds no per-mutation state: undo tokens live on the stack of the call
/// that created them and are settled before it returns.
#[derive(Clone)]
pub struct MutationCoordinator {
    notifier: Arc<dyn Notifier>,
    invalidator: Arc<dyn Invalidate>,
}

impl MutationCoordinator {
    pub fn new(notifier: Arc<dyn Notifier>, invalidator: Arc<dyn Invalidate>) -> Self {
        Self {
            notifier,
            invalidator,
        }
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    // ── Create ──

    /// Insert a speculative record at the head of every listed result, then
    /// swap it for the record the gateway returns.
    pub async fn create<E, I, F, Fut>(
        &self,
        cache: &CacheStore<E>,
        spec: &MutationSpec,
        input: &I,
        call: F,
    ) -> Result<E, MutationError>
    where
        E: Record,
        I: Validate + Speculate<E>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = GatewayResult<E>>,
    {
        self.validate(spec, input)?;

        let temp_id = EntityId::temp();
        let speculative = input.speculate(temp_id.clone(), Utc::now());
        let tokens: Vec<UndoToken<E>> = spec
            .keys
            .iter()
            .map(|key| {
                cache.patch(key, |draft| {
                    draft.insert_at_head(speculative.clone());
                })
            })
            .collect();
        debug!(operation = spec.operation, id = %temp_id, patched = tokens.len(), "speculative insert");

        match call().await {
            Ok(record) => {
                settle_swap(cache, spec, tokens, &temp_id, &record, true);
                self.succeeded(spec, record.id());
                Ok(record)
            }
            Err(err) => Err(self.failed(cache, spec, tokens, err, false)),
        }
    }

    // ── Update ──

    /// Shallow-merge `patch` onto the cached copy of `id` wherever it appears,
    /// then replace it with the record the gateway returns.
    ///
    /// Racing updates to the same record are not serialised: the last
    /// response to arrive is what the cache shows.
    pub async fn update<E, F, Fut>(
        &self,
        cache: &CacheStore<E>,
        spec: &MutationSpec,
        id: &EntityId,
        patch: &E::Patch,
        call: F,
    ) -> Result<E, MutationError>
    where
        E: Record,
        E::Patch: Validate,
        F: FnOnce() -> Fut,
        Fut: Future<Output = GatewayResult<E>>,
    {
        self.validate(spec, patch)?;

        let tokens: Vec<UndoToken<E>> = spec
            .keys
            .iter()
            .map(|key| {
                cache.patch(key, |draft| {
                    draft.merge_fields(id, patch);
                })
            })
            .collect();
        debug!(operation = spec.operation, %id, "speculative merge");

        match call().await {
            Ok(record) => {
                settle_swap(cache, spec, tokens, id, &record, false);
                self.succeeded(spec, record.id());
                Ok(record)
            }
            Err(err) => Err(self.failed(cache, spec, tokens, err, false)),
        }
    }

    // ── Delete ──

    /// Remove every id from every listed result in one patch per result.
    ///
    /// The call is all-or-nothing from the cache's point of view: on any
    /// failure, including a partial batched delete, every removal is put
    /// back and the affected tags are invalidated so a refetch shows what
    /// the store really holds.
    pub async fn delete<E, F, Fut>(
        &self,
        cache: &CacheStore<E>,
        spec: &MutationSpec,
        ids: &[EntityId],
        call: F,
    ) -> Result<(), MutationError>
    where
        E: Record,
        F: FnOnce() -> Fut,
        Fut: Future<Output = GatewayResult<()>>,
    {
        if ids.is_empty() {
            return Ok(());
        }
        if let Some(temp) = ids.iter().find(|id| id.is_temporary()) {
            let err = ValidationError::new("id", format!("record {temp} is still being created"));
            return Err(self.rejected(spec, err));
        }

        let tokens: Vec<UndoToken<E>> = spec
            .keys
            .iter()
            .map(|key| {
                cache.patch(key, |draft| {
                    draft.remove_ids(ids);
                })
            })
            .collect();
        debug!(operation = spec.operation, count = ids.len(), "speculative removal");

        match call().await {
            Ok(()) => {
                settle_removal(cache, spec, tokens, ids);
                self.invalidator.invalidate(&spec.invalidate);
                info!(operation = spec.operation, count = ids.len(), "mutation settled");
                if let Some(title) = &spec.success {
                    self.notifier
                        .notify(Notification::new(Severity::Success, title.clone()));
                }
                Ok(())
            }
            Err(err) => Err(self.failed(cache, spec, tokens, err, true)),
        }
    }

    // ── Follow-up ──

    /// Run a secondary side effect of an already-settled mutation.
    ///
    /// Never blocks the caller and never undoes anything: a failure is only
    /// reported as a warning titled `label`.
    pub fn follow_up<T, Fut>(&self, label: impl Into<String>, work: Fut) -> JoinHandle<()>
    where
        T: Send + 'static,
        Fut: Future<Output = GatewayResult<T>> + Send + 'static,
    {
        let label = label.into();
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            match work.await {
                Ok(_) => debug!(label = %label, "follow-up completed"),
                Err(err) => {
                    warn!(label = %label, error = %err, "follow-up failed");
                    notifier.notify(
                        Notification::new(Severity::Warning, label.as_str())
                            .with_detail(err.user_message("The follow-up step failed")),
                    );
                }
            }
        })
    }

    // ── Settlement helpers ──

    fn validate<V: Validate + ?Sized>(
        &self,
        spec: &MutationSpec,
        input: &V,
    ) -> Result<(), MutationError> {
        input.validate().map_err(|err| self.rejected(spec, err))
    }

    /// Report input rejected before anything was patched or sent.
    pub fn rejected(&self, spec: &MutationSpec, err: ValidationError) -> MutationError {
        debug!(operation = spec.operation, field = err.field, "validation rejected");
        self.notifier.notify(
            Notification::new(Severity::Error, spec.fallback.as_str()).with_detail(err.to_string()),
        );
        MutationError::Validation(err)
    }

    fn succeeded(&self, spec: &MutationSpec, id: &EntityId) {
        self.invalidator.invalidate(&spec.invalidate);
        info!(operation = spec.operation, %id, "mutation settled");
        if let Some(title) = &spec.success {
            self.notifier
                .notify(Notification::new(Severity::Success, title.clone()));
        }
    }

    fn failed<E: Record>(
        &self,
        cache: &CacheStore<E>,
        spec: &MutationSpec,
        tokens: Vec<UndoToken<E>>,
        err: RemoteError,
        invalidate: bool,
    ) -> MutationError {
        // Same order the patches were applied in.
        for token in tokens {
            cache.undo(token);
        }
        if invalidate {
            self.invalidator.invalidate(&spec.invalidate);
        }

        warn!(operation = spec.operation, error = %err, "mutation rolled back");
        self.notifier.notify(
            Notification::new(Severity::Error, spec.fallback.as_str())
                .with_detail(err.user_message(&spec.fallback)),
        );
        MutationError::Remote(err)
    }
}

/// Replace the record keyed `from` with the authoritative one in every
/// patched result. One patch per result, so the id switch is atomic.
///
/// A result refetched while the call was pending no longer holds `from`.
/// The confirmed record then replaces its own id if the refetch already
/// has it, or goes to the head of a list when `insert_missing` is set.
/// Either way the result is marked stale so the next read reconciles order
/// with the server.
fn settle_swap<E: Record>(
    cache: &CacheStore<E>,
    spec: &MutationSpec,
    tokens: Vec<UndoToken<E>>,
    from: &EntityId,
    record: &E,
    insert_missing: bool,
) {
    for token in tokens {
        token.commit();
    }
    for key in &spec.keys {
        let mut displaced = false;
        cache
            .patch(key, |draft| {
                if draft.replace_by_id(from, record.clone()) {
                    return;
                }
                displaced = true;
                if !draft.replace_by_id(record.id(), record.clone()) && insert_missing {
                    draft.insert_at_head(record.clone());
                }
            })
            .commit();
        if displaced {
            debug!(key = %key, id = %record.id(), "settled over a refetched result");
            cache.invalidate(&key.default_tags());
        }
    }
}

/// Commit a confirmed delete. A refetch that landed mid-call may have
/// brought deleted rows back; they are dropped again and the result is
/// marked stale.
fn settle_removal<E: Record>(
    cache: &CacheStore<E>,
    spec: &MutationSpec,
    tokens: Vec<UndoToken<E>>,
    ids: &[EntityId],
) {
    for token in tokens {
        token.commit();
    }
    for key in &spec.keys {
        let token = cache.patch(key, |draft| {
            draft.remove_ids(ids);
        });
        if !token.is_noop() {
            debug!(key = %key, "settled over a refetched result");
            cache.invalidate(&key.default_tags());
        }
        token.commit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{QueryData, QueryKey, Tag};
    use crate::notify::RecordingNotifier;
    use board_types::{EntityKind, NewProject, Priority, Project, ProjectPatch, ProjectStatus};

    fn project(id: i64, name: &str) -> Project {
        Project {
            id: EntityId::Server(id),
            name: name.into(),
            description: None,
            status: ProjectStatus::OnTrack,
            priority: Priority::Medium,
            owner_id: Some("u-1".into()),
            start_date: None,
            end_date: None,
            created_at: None,
        }
    }

    struct Fixture {
        cache: Arc<CacheStore<Project>>,
        notifier: Arc<RecordingNotifier>,
        coordinator: MutationCoordinator,
    }

    fn fixture(records: Vec<Project>) -> Fixture {
        let cache = Arc::new(CacheStore::new());
        cache.put(
            QueryKey::Projects,
            QueryData::List(records.clone()),
            QueryKey::Projects.default_tags(),
        );
        let by_owner = QueryKey::ProjectsByOwner("u-1".into());
        cache.put(by_owner.clone(), QueryData::List(records), by_owner.default_tags());

        let notifier = Arc::new(RecordingNotifier::new());
        let coordinator = MutationCoordinator::new(notifier.clone(), cache.clone());
        Fixture {
            cache,
            notifier,
            coordinator,
        }
    }

    fn spec() -> MutationSpec {
        MutationSpec::new("test_mutation", "Failed to save project")
            .patch(QueryKey::Projects)
            .patch(QueryKey::ProjectsByOwner("u-1".into()))
            .invalidate(Tag::list(EntityKind::Calendar))
    }

    #[tokio::test]
    async fn test_create_swaps_temp_for_authoritative_in_every_list() {
        let f = fixture(vec![project(1, "Alpha")]);
        let input = NewProject {
            name: "Beta".into(),
            owner_id: Some("u-1".into()),
            ..Default::default()
        };

        let created = f
            .coordinator
            .create(&f.cache, &spec(), &input, || async { Ok(project(2, "Beta")) })
            .await
            .unwrap();

        assert_eq!(created.id, EntityId::Server(2));
        for key in [QueryKey::Projects, QueryKey::ProjectsByOwner("u-1".into())] {
            let ids: Vec<EntityId> = f.cache.records(&key).into_iter().map(|p| p.id).collect();
            assert_eq!(ids, vec![EntityId::Server(2), EntityId::Server(1)]);
        }
    }

    #[tokio::test]
    async fn test_create_failure_restores_and_notifies_with_backend_message() {
        let f = fixture(vec![project(1, "Alpha")]);
        let before = f.cache.read(&QueryKey::Projects);
        let input = NewProject {
            name: "Beta".into(),
            ..Default::default()
        };

        let err = f
            .coordinator
            .create(&f.cache, &spec(), &input, || async {
                Err(RemoteError::new("create_project", "duplicate name"))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, MutationError::Remote(_)));
        assert_eq!(f.cache.read(&QueryKey::Projects), before);
        let notes = f.notifier.drain();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].severity, Severity::Error);
        assert_eq!(notes[0].detail.as_deref(), Some("duplicate name"));
    }

    #[tokio::test]
    async fn test_failure_without_message_uses_fallback() {
        let f = fixture(vec![project(1, "Alpha")]);
        let _ = f
            .coordinator
            .update(
                &f.cache,
                &spec(),
                &EntityId::Server(1),
                &ProjectPatch {
                    name: Some("Renamed".into()),
                    ..Default::default()
                },
                || async { Err(RemoteError::new("update_project", "")) },
            )
            .await;

        let notes = f.notifier.drain();
        assert_eq!(notes[0].detail.as_deref(), Some("Failed to save project"));
    }

    #[tokio::test]
    async fn test_validation_failure_makes_no_call() {
        let f = fixture(vec![project(1, "Alpha")]);
        let before = f.cache.read(&QueryKey::Projects);
        let mut called = false;

        let err = f
            .coordinator
            .create(&f.cache, &spec(), &NewProject::default(), || {
                called = true;
                async { Ok(project(2, "never")) }
            })
            .await
            .unwrap_err();

        assert!(err.is_validation());
        assert!(!called);
        assert_eq!(f.cache.read(&QueryKey::Projects), before);
    }

    #[tokio::test]
    async fn test_delete_rejects_temp_ids() {
        let f = fixture(vec![project(1, "Alpha")]);
        let err = f
            .coordinator
            .delete(&f.cache, &spec(), &[EntityId::temp()], || async { Ok(()) })
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_delete_failure_restores_and_invalidates() {
        let f = fixture(vec![project(1, "A"), project(2, "B"), project(3, "C")]);
        let before = f.cache.read(&QueryKey::Projects);
        let spec = spec().invalidate(Tag::list(EntityKind::Project));

        let result = f
            .coordinator
            .delete(
                &f.cache,
                &spec,
                &[EntityId::Server(1), EntityId::Server(3)],
                || async { Err(RemoteError::new("delete_projects", "deleted 1 of 2 projects")) },
            )
            .await;

        assert!(result.is_err());
        assert_eq!(f.cache.read(&QueryKey::Projects), before);
        assert!(f.cache.is_stale(&QueryKey::Projects));
    }

    fn ids(cache: &CacheStore<Project>, key: &QueryKey) -> Vec<EntityId> {
        cache.records(key).into_iter().map(|p| p.id).collect()
    }

    fn refetched(cache: &CacheStore<Project>, records: Vec<Project>) {
        cache.put(
            QueryKey::Projects,
            QueryData::List(records),
            QueryKey::Projects.default_tags(),
        );
    }

    #[tokio::test]
    async fn test_create_keeps_confirmed_record_when_refetch_drops_temp() {
        let f = fixture(vec![project(1, "Alpha")]);
        let input = NewProject {
            name: "Beta".into(),
            ..Default::default()
        };
        let cache = f.cache.clone();

        let created = f
            .coordinator
            .create(&f.cache, &spec(), &input, move || async move {
                refetched(&cache, vec![project(1, "Alpha")]);
                Ok(project(2, "Beta"))
            })
            .await
            .unwrap();

        assert_eq!(
            ids(&f.cache, &QueryKey::Projects),
            vec![created.id.clone(), EntityId::Server(1)]
        );
        assert!(f.cache.is_stale(&QueryKey::Projects));
        assert_eq!(
            ids(&f.cache, &QueryKey::ProjectsByOwner("u-1".into())),
            vec![created.id, EntityId::Server(1)]
        );
    }

    #[tokio::test]
    async fn test_create_does_not_duplicate_record_a_refetch_already_has() {
        let f = fixture(vec![project(1, "Alpha")]);
        let input = NewProject {
            name: "Beta".into(),
            ..Default::default()
        };
        let cache = f.cache.clone();

        f.coordinator
            .create(&f.cache, &spec(), &input, move || async move {
                refetched(&cache, vec![project(1, "Alpha"), project(2, "beta (stale)")]);
                Ok(project(2, "Beta"))
            })
            .await
            .unwrap();

        let list = f.cache.records(&QueryKey::Projects);
        assert_eq!(list.len(), 2);
        assert_eq!(list[1], project(2, "Beta"));
    }

    #[tokio::test]
    async fn test_failed_delete_does_not_duplicate_refetched_record() {
        let f = fixture(vec![project(1, "Alpha"), project(2, "Beta")]);
        let cache = f.cache.clone();

        let result = f
            .coordinator
            .delete(&f.cache, &spec(), &[EntityId::Server(1)], move || async move {
                refetched(&cache, vec![project(1, "Alpha"), project(2, "Beta")]);
                Err(RemoteError::new("delete_project", "row is locked"))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(
            ids(&f.cache, &QueryKey::Projects),
            vec![EntityId::Server(1), EntityId::Server(2)]
        );
    }

    #[tokio::test]
    async fn test_confirmed_delete_drops_rows_a_refetch_brought_back() {
        let f = fixture(vec![project(1, "Alpha"), project(2, "Beta")]);
        let cache = f.cache.clone();

        f.coordinator
            .delete(&f.cache, &spec(), &[EntityId::Server(1)], move || async move {
                refetched(&cache, vec![project(1, "Alpha"), project(2, "Beta")]);
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(ids(&f.cache, &QueryKey::Projects), vec![EntityId::Server(2)]);
        assert!(f.cache.is_stale(&QueryKey::Projects));
    }

    #[tokio::test]
    async fn test_follow_up_failure_is_a_warning() {
        let f = fixture(Vec::new());
        f.coordinator
            .follow_up("Invitations not sent", async {
                Err::<usize, _>(RemoteError::new("send_invitations", "mailer down"))
            })
            .await
            .unwrap();

        let notes = f.notifier.drain();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].severity, Severity::Warning);
        assert_eq!(notes[0].detail.as_deref(), Some("mailer down"));
    }
}
