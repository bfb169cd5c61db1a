//! Projects screen
//!
//! Lists every project (and, when an owner is set, that owner's projects),
//! with create / edit dialogs, multi-select bulk delete and inline edits of
//! single fields.

use std::collections::BTreeSet;
use std::sync::{Mutex, PoisonError, RwLock, RwLockWriteGuard};

use board_client::GatewayResult;
use board_types::{
    EntityId, EntityKind, NewProject, Priority, Project, ProjectPatch, ProjectStatus, Record,
    Validate, ValidationError,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;

use super::derive::{format_due_date, progress_percent};
use super::{Dialog, InFlight, ViewContext};
use crate::cache::{QueryKey, Tag};
use crate::error::MutationError;
use crate::optimistic::MutationSpec;
use crate::queries::{ensure_loaded, ProjectQueries};

/// Create / edit form fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectForm {
    pub name: String,
    pub description: String,
    pub status: ProjectStatus,
    pub priority: Priority,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Only used on create
    pub member_emails: Vec<String>,
}

impl ProjectForm {
    pub fn from_project(project: &Project) -> Self {
        Self {
            name: project.name.clone(),
            description: project.description.clone().unwrap_or_default(),
            status: project.status,
            priority: project.priority,
            start_date: project.start_date,
            end_date: project.end_date,
            member_emails: Vec::new(),
        }
    }

    pub fn to_input(&self, owner_id: Option<String>) -> NewProject {
        NewProject {
            name: self.name.trim().to_string(),
            description: non_empty(&self.description),
            status: self.status,
            priority: self.priority,
            owner_id,
            start_date: self.start_date,
            end_date: self.end_date,
            member_emails: self
                .member_emails
                .iter()
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    pub fn to_patch(&self) -> ProjectPatch {
        ProjectPatch {
            name: Some(self.name.trim().to_string()),
            description: Some(non_empty(&self.description)),
            status: Some(self.status),
            priority: Some(self.priority),
            start_date: Some(self.start_date),
            end_date: Some(self.end_date),
        }
    }
}

fn non_empty(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// One field changed in place from the list.
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectField {
    Name(String),
    Description(String),
    Status(ProjectStatus),
    Priority(Priority),
    StartDate(NaiveDate),
    EndDate(NaiveDate),
}

impl ProjectField {
    fn into_patch(self) -> ProjectPatch {
        let mut patch = ProjectPatch::default();
        match self {
            ProjectField::Name(name) => patch.name = Some(name.trim().to_string()),
            ProjectField::Description(text) => patch.description = Some(non_empty(&text)),
            ProjectField::Status(status) => patch.status = Some(status),
            ProjectField::Priority(priority) => patch.priority = Some(priority),
            ProjectField::StartDate(date) => patch.start_date = Some(Some(date)),
            ProjectField::EndDate(date) => patch.end_date = Some(Some(date)),
        }
        patch
    }
}

/// Display projection of a [`Project`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectRow {
    pub id: EntityId,
    pub name: String,
    pub description: String,
    pub status: &'static str,
    pub priority: &'static str,
    pub due: String,
    pub progress: u8,
    /// Not yet confirmed by the server
    pub pending: bool,
    pub selected: bool,
}

#[derive(Debug, Default)]
struct ProjectsState {
    form: ProjectForm,
    dialog: Dialog,
    selection: BTreeSet<EntityId>,
}

pub struct ProjectsView {
    ctx: ViewContext,
    owner_id: Option<String>,
    state: RwLock<ProjectsState>,
    in_flight: InFlight,
    follow_ups: Mutex<Vec<JoinHandle<()>>>,
}

impl ProjectsView {
    pub fn new(ctx: ViewContext, owner_id: Option<String>) -> Self {
        Self {
            ctx,
            owner_id,
            state: RwLock::new(ProjectsState::default()),
            in_flight: InFlight::default(),
            follow_ups: Mutex::new(Vec::new()),
        }
    }

    fn state(&self) -> RwLockWriteGuard<'_, ProjectsState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lists this view shows, global list first.
    pub fn keys(&self) -> Vec<QueryKey> {
        let mut keys = vec![QueryKey::Projects];
        if let Some(owner) = &self.owner_id {
            keys.push(QueryKey::ProjectsByOwner(owner.clone()));
        }
        keys
    }

    // ── Lifecycle ──

    pub async fn mount(&self) -> GatewayResult<()> {
        let fetcher = ProjectQueries::new(self.ctx.gateway.clone());
        for key in self.keys() {
            self.ctx.caches.projects.subscribe(&key);
            ensure_loaded(&self.ctx.caches.projects, &fetcher, &key).await?;
        }
        Ok(())
    }

    pub fn unmount(&self) {
        for key in self.keys() {
            self.ctx.caches.projects.unsubscribe(&key);
        }
    }

    // ── Projection ──

    pub fn projects(&self) -> Vec<Project> {
        self.ctx.caches.projects.records(&QueryKey::Projects)
    }

    pub fn rows(&self, now: DateTime<Utc>) -> Vec<ProjectRow> {
        self.rows_in(&QueryKey::Projects, now)
    }

    /// Rows of one of [`keys`](Self::keys), e.g. the owner's own list.
    pub fn rows_in(&self, key: &QueryKey, now: DateTime<Utc>) -> Vec<ProjectRow> {
        let selection = self.selected();
        self.ctx
            .caches
            .projects
            .records(key)
            .into_iter()
            .map(|p| ProjectRow {
                pending: p.id.is_temporary(),
                selected: selection.contains(&p.id),
                description: p.description.clone().unwrap_or_default(),
                status: p.status.as_str(),
                priority: p.priority.as_str(),
                due: format_due_date(p.end_date, &self.ctx.display.date_format),
                progress: progress_percent(p.start_date, p.end_date, now),
                name: p.name,
                id: p.id,
            })
            .collect()
    }

    pub fn is_submitting(&self) -> bool {
        self.in_flight.is_busy()
    }

    // ── Form and dialog ──

    pub fn form(&self) -> ProjectForm {
        self.state().form.clone()
    }

    pub fn edit_form(&self, edit: impl FnOnce(&mut ProjectForm)) {
        edit(&mut self.state().form);
    }

    pub fn dialog(&self) -> Dialog {
        self.state().dialog.clone()
    }

    pub fn open_create(&self) {
        let mut state = self.state();
        state.form = ProjectForm::default();
        state.dialog = Dialog::Create;
    }

    /// Open the edit dialog prefilled from the cached record.
    pub fn open_edit(&self, id: &EntityId) -> bool {
        let Some(project) = self.ctx.caches.projects.find(&QueryKey::Projects, id) else {
            return false;
        };
        let mut state = self.state();
        state.form = ProjectForm::from_project(&project);
        state.dialog = Dialog::Edit(id.clone());
        true
    }

    pub fn open_confirm_delete(&self, ids: Vec<EntityId>) {
        self.state().dialog = Dialog::ConfirmDelete(ids);
    }

    pub fn close_dialog(&self) {
        let mut state = self.state();
        state.dialog = Dialog::Closed;
        state.form = ProjectForm::default();
    }

    // ── Selection ──

    pub fn toggle_selected(&self, id: &EntityId) {
        let mut state = self.state();
        if !state.selection.remove(id) {
            state.selection.insert(id.clone());
        }
    }

    /// Select every confirmed project. Pending ones cannot be deleted yet.
    pub fn select_all(&self) {
        let ids: BTreeSet<EntityId> = self
            .projects()
            .into_iter()
            .map(|p| p.id)
            .filter(|id| !id.is_temporary())
            .collect();
        self.state().selection = ids;
    }

    pub fn clear_selection(&self) {
        self.state().selection.clear();
    }

    pub fn selected(&self) -> BTreeSet<EntityId> {
        self.state().selection.clone()
    }

    // ── Intents ──

    pub async fn submit_create(&self) -> Result<Project, MutationError> {
        let _guard = self.in_flight.try_claim().ok_or(MutationError::InFlight)?;

        let input = self.form().to_input(self.owner_id.clone());
        let mut spec = MutationSpec::new("create_project", "Failed to create project")
            .invalidate(Tag::list(EntityKind::Calendar))
            .on_success("Project created");
        for key in self.keys() {
            spec = spec.patch(key);
        }

        let gateway = &self.ctx.gateway;
        let project = self
            .ctx
            .coordinator
            .create(&self.ctx.caches.projects, &spec, &input, || {
                gateway.create_project(&input)
            })
            .await?;

        self.close_dialog();

        if !input.member_emails.is_empty() {
            let gateway = gateway.clone();
            let project_id = project.id.clone();
            let emails = input.member_emails;
            let handle = self.ctx.coordinator.follow_up(
                "Project created, but invitations could not be sent",
                async move { gateway.send_invitations(&project_id, &emails).await },
            );
            self.follow_ups
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(handle);
        }
        Ok(project)
    }

    /// Wait for outstanding follow-ups such as invitations.
    pub async fn settle_follow_ups(&self) {
        let handles = std::mem::take(
            &mut *self
                .follow_ups
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for handle in handles {
            if let Err(err) = handle.await {
                tracing::warn!(error = %err, "follow-up task aborted");
            }
        }
    }

    /// Save the edit dialog.
    pub async fn submit_update(&self) -> Result<Project, MutationError> {
        let _guard = self.in_flight.try_claim().ok_or(MutationError::InFlight)?;

        let (id, patch) = {
            let state = self.state();
            let Dialog::Edit(id) = &state.dialog else {
                return Err(ValidationError::new("id", "no project is being edited").into());
            };
            (id.clone(), state.form.to_patch())
        };

        let project = self.update(&id, &patch, "Project updated").await?;
        self.close_dialog();
        Ok(project)
    }

    pub async fn submit_inline_field_edit(
        &self,
        id: &EntityId,
        field: ProjectField,
    ) -> Result<Project, MutationError> {
        let _guard = self.in_flight.try_claim().ok_or(MutationError::InFlight)?;
        self.update(id, &field.into_patch(), "Project updated").await
    }

    pub async fn submit_delete(&self, id: &EntityId) -> Result<(), MutationError> {
        let _guard = self.in_flight.try_claim().ok_or(MutationError::InFlight)?;

        let spec = self
            .delete_spec("delete_project", "Failed to delete project")
            .on_success("Project deleted");
        let gateway = &self.ctx.gateway;
        self.ctx
            .coordinator
            .delete(&self.ctx.caches.projects, &spec, std::slice::from_ref(id), || {
                gateway.delete_project(id)
            })
            .await?;

        let mut state = self.state();
        state.selection.remove(id);
        state.dialog = Dialog::Closed;
        Ok(())
    }

    /// Delete every selected project in one batched call.
    pub async fn submit_bulk_delete(&self) -> Result<usize, MutationError> {
        let _guard = self.in_flight.try_claim().ok_or(MutationError::InFlight)?;

        let ids: Vec<EntityId> = self.selected().into_iter().collect();
        if ids.is_empty() {
            return Ok(0);
        }

        let spec = self
            .delete_spec("delete_projects", "Failed to delete projects")
            .invalidate(Tag::list(EntityKind::Project))
            .on_success(format!("Deleted {} projects", ids.len()));
        let gateway = &self.ctx.gateway;
        self.ctx
            .coordinator
            .delete(&self.ctx.caches.projects, &spec, &ids, || {
                gateway.delete_projects(&ids)
            })
            .await?;

        let mut state = self.state();
        state.selection.clear();
        state.dialog = Dialog::Closed;
        Ok(ids.len())
    }

    // ── Helpers ──

    async fn update(
        &self,
        id: &EntityId,
        patch: &ProjectPatch,
        success: &str,
    ) -> Result<Project, MutationError> {
        let mut spec = MutationSpec::new("update_project", "Failed to update project")
            .invalidate(Tag::list(EntityKind::Calendar))
            .on_success(success);
        for key in self.keys() {
            spec = spec.patch(key);
        }
        spec = spec.patch(QueryKey::Project(id.clone()));

        if let Some(mut merged) = self.ctx.caches.projects.find(&QueryKey::Projects, id) {
            merged.apply_patch(patch);
            merged
                .validate()
                .map_err(|err| self.ctx.coordinator.rejected(&spec, err))?;
        }

        let gateway = &self.ctx.gateway;
        self.ctx
            .coordinator
            .update(&self.ctx.caches.projects, &spec, id, patch, || {
                gateway.update_project(id, patch)
            })
            .await
    }

    fn delete_spec(&self, operation: &'static str, fallback: &str) -> MutationSpec {
        let mut spec = MutationSpec::new(operation, fallback)
            .invalidate(Tag::list(EntityKind::Calendar))
            .invalidate(Tag::list(EntityKind::Task));
        for key in self.keys() {
            spec = spec.patch(key);
        }
        spec
    }
}
