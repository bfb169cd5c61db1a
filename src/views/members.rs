//! Project membership

use board_client::GatewayResult;
use board_types::{EntityId, EntityKind, MemberRole, NewMember, ProjectMember};
use serde::Serialize;

use super::{InFlight, ViewContext};
use crate::cache::{QueryKey, Tag};
use crate::error::MutationError;
use crate::optimistic::MutationSpec;
use crate::queries::{ensure_loaded, MemberQueries};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberRow {
    pub id: EntityId,
    pub email: String,
    pub role: &'static str,
    pub pending: bool,
}

pub struct MembersView {
    ctx: ViewContext,
    project_id: EntityId,
    in_flight: InFlight,
}

impl MembersView {
    pub fn new(ctx: ViewContext, project_id: EntityId) -> Self {
        Self {
            ctx,
            project_id,
            in_flight: InFlight::default(),
        }
    }

    pub fn key(&self) -> QueryKey {
        QueryKey::Members(self.project_id.clone())
    }

    pub async fn mount(&self) -> GatewayResult<()> {
        let key = self.key();
        self.ctx.caches.members.subscribe(&key);
        let fetcher = MemberQueries::new(self.ctx.gateway.clone());
        ensure_loaded(&self.ctx.caches.members, &fetcher, &key).await?;
        Ok(())
    }

    pub fn unmount(&self) {
        self.ctx.caches.members.unsubscribe(&self.key());
    }

    pub fn members(&self) -> Vec<ProjectMember> {
        self.ctx.caches.members.records(&self.key())
    }

    pub fn rows(&self) -> Vec<MemberRow> {
        self.members()
            .into_iter()
            .map(|m| MemberRow {
                pending: m.id.is_temporary(),
                role: m.role.as_str(),
                email: m.email,
                id: m.id,
            })
            .collect()
    }

    pub async fn submit_add(
        &self,
        email: &str,
        role: MemberRole,
    ) -> Result<ProjectMember, MutationError> {
        let _guard = self.in_flight.try_claim().ok_or(MutationError::InFlight)?;

        let input = NewMember {
            project_id: self.project_id.clone(),
            email: email.trim().to_string(),
            role,
        };
        let spec = MutationSpec::new("add_member", "Failed to add member")
            .patch(self.key())
            .on_success("Member added");

        let gateway = &self.ctx.gateway;
        self.ctx
            .coordinator
            .create(&self.ctx.caches.members, &spec, &input, || {
                gateway.add_member(&input)
            })
            .await
    }

    pub async fn submit_remove(&self, id: &EntityId) -> Result<(), MutationError> {
        let _guard = self.in_flight.try_claim().ok_or(MutationError::InFlight)?;

        let spec = MutationSpec::new("remove_member", "Failed to remove member")
            .patch(self.key())
            .invalidate(Tag::list(EntityKind::Member))
            .on_success("Member removed");

        let gateway = &self.ctx.gateway;
        self.ctx
            .coordinator
            .delete(&self.ctx.caches.members, &spec, std::slice::from_ref(id), || {
                gateway.remove_member(id)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Caches;
    use crate::config::DisplayConfig;
    use crate::notify::RecordingNotifier;
    use board_client::{BoardGateway, MemoryTableStore, StaticCredentials, StoreOp};
    use serde_json::json;
    use std::sync::Arc;

    async fn fixture() -> (Arc<MemoryTableStore>, MembersView) {
        let store = Arc::new(MemoryTableStore::new());
        store.seed(
            "project_members",
            [json!({ "id": 1, "project_id": 3, "email": "owner@example.com", "role": "owner" })],
        );
        let gateway = BoardGateway::new(store.clone(), Arc::new(StaticCredentials::new("t")));
        let ctx = ViewContext::new(
            gateway,
            Caches::new(),
            Arc::new(RecordingNotifier::new()),
            DisplayConfig::default(),
        );
        let view = MembersView::new(ctx, EntityId::Server(3));
        view.mount().await.unwrap();
        (store, view)
    }

    #[tokio::test]
    async fn test_add_member() {
        let (_, view) = fixture().await;
        let member = view
            .submit_add(" ana@example.com ", MemberRole::Viewer)
            .await
            .unwrap();
        assert_eq!(member.email, "ana@example.com");

        let rows = view.rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].role, "viewer");
        assert!(!rows[0].pending);
    }

    #[tokio::test]
    async fn test_invalid_email_makes_no_call() {
        let (store, view) = fixture().await;
        let calls = store.call_count();
        let err = view.submit_add("not-an-email", MemberRole::Editor).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(store.call_count(), calls);
    }

    #[tokio::test]
    async fn test_remove_failure_restores_member() {
        let (store, view) = fixture().await;
        store.fail_next("project_members", StoreOp::Delete, "forbidden");
        assert!(view.submit_remove(&EntityId::Server(1)).await.is_err());
        assert_eq!(view.members().len(), 1);
    }
}
