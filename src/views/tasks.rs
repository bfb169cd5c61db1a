//! Task board for one project

use std::collections::BTreeSet;
use std::sync::{PoisonError, RwLock, RwLockWriteGuard};

use board_client::GatewayResult;
use board_types::{
    EntityId, EntityKind, NewTask, Priority, Task, TaskPatch, TaskStatus, ValidationError,
};
use chrono::NaiveDate;
use serde::Serialize;

use super::derive::{format_due_date, is_overdue};
use super::{Dialog, InFlight, ViewContext};
use crate::cache::{QueryKey, Tag};
use crate::error::MutationError;
use crate::optimistic::MutationSpec;
use crate::queries::{ensure_loaded, TaskQueries};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskForm {
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: Priority,
    pub assignee: String,
    pub due_date: Option<NaiveDate>,
}

impl TaskForm {
    pub fn from_task(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone().unwrap_or_default(),
            status: task.status,
            priority: task.priority,
            assignee: task.assignee.clone().unwrap_or_default(),
            due_date: task.due_date,
        }
    }

    pub fn to_input(&self, project_id: EntityId) -> NewTask {
        NewTask {
            description: non_empty(&self.description),
            status: self.status,
            priority: self.priority,
            assignee: non_empty(&self.assignee),
            due_date: self.due_date,
            ..NewTask::new(project_id, self.title.trim())
        }
    }

    pub fn to_patch(&self) -> TaskPatch {
        TaskPatch {
            title: Some(self.title.trim().to_string()),
            description: Some(non_empty(&self.description)),
            status: Some(self.status),
            priority: Some(self.priority),
            assignee: Some(non_empty(&self.assignee)),
            due_date: Some(self.due_date),
        }
    }
}

fn non_empty(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskField {
    Title(String),
    Status(TaskStatus),
    Priority(Priority),
    Assignee(String),
    DueDate(NaiveDate),
}

impl TaskField {
    fn into_patch(self) -> TaskPatch {
        let mut patch = TaskPatch::default();
        match self {
            TaskField::Title(title) => patch.title = Some(title.trim().to_string()),
            TaskField::Status(status) => patch.status = Some(status),
            TaskField::Priority(priority) => patch.priority = Some(priority),
            TaskField::Assignee(who) => patch.assignee = Some(non_empty(&who)),
            TaskField::DueDate(date) => patch.due_date = Some(Some(date)),
        }
        patch
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskRow {
    pub id: EntityId,
    pub title: String,
    pub status: &'static str,
    pub priority: &'static str,
    pub assignee: Option<String>,
    pub due: String,
    pub overdue: bool,
    pub pending: bool,
    pub selected: bool,
}

#[derive(Debug, Default)]
struct TasksState {
    form: TaskForm,
    dialog: Dialog,
    selection: BTreeSet<EntityId>,
}

pub struct TasksView {
    ctx: ViewContext,
    project_id: EntityId,
    state: RwLock<TasksState>,
    in_flight: InFlight,
}

impl TasksView {
    pub fn new(ctx: ViewContext, project_id: EntityId) -> Self {
        Self {
            ctx,
            project_id,
            state: RwLock::new(TasksState::default()),
            in_flight: InFlight::default(),
        }
    }

    fn state(&self) -> RwLockWriteGuard<'_, TasksState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn key(&self) -> QueryKey {
        QueryKey::TasksForProject(self.project_id.clone())
    }

    pub async fn mount(&self) -> GatewayResult<()> {
        let key = self.key();
        self.ctx.caches.tasks.subscribe(&key);
        let fetcher = TaskQueries::new(self.ctx.gateway.clone());
        ensure_loaded(&self.ctx.caches.tasks, &fetcher, &key).await?;
        Ok(())
    }

    pub fn unmount(&self) {
        self.ctx.caches.tasks.unsubscribe(&self.key());
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.ctx.caches.tasks.records(&self.key())
    }

    pub fn rows(&self, today: NaiveDate) -> Vec<TaskRow> {
        let selection = self.selected();
        self.tasks()
            .into_iter()
            .map(|t| TaskRow {
                pending: t.id.is_temporary(),
                selected: selection.contains(&t.id),
                status: t.status.as_str(),
                priority: t.priority.as_str(),
                due: format_due_date(t.due_date, &self.ctx.display.date_format),
                overdue: is_overdue(t.due_date, t.status, today),
                assignee: t.assignee,
                title: t.title,
                id: t.id,
            })
            .collect()
    }

    pub fn is_submitting(&self) -> bool {
        self.in_flight.is_busy()
    }

    // ── Form, dialog, selection ──

    pub fn form(&self) -> TaskForm {
        self.state().form.clone()
    }

    pub fn edit_form(&self, edit: impl FnOnce(&mut TaskForm)) {
        edit(&mut self.state().form);
    }

    pub fn dialog(&self) -> Dialog {
        self.state().dialog.clone()
    }

    pub fn open_create(&self) {
        let mut state = self.state();
        state.form = TaskForm::default();
        state.dialog = Dialog::Create;
    }

    pub fn open_edit(&self, id: &EntityId) -> bool {
        let Some(task) = self.ctx.caches.tasks.find(&self.key(), id) else {
            return false;
        };
        let mut state = self.state();
        state.form = TaskForm::from_task(&task);
        state.dialog = Dialog::Edit(id.clone());
        true
    }

    pub fn close_dialog(&self) {
        let mut state = self.state();
        state.dialog = Dialog::Closed;
        state.form = TaskForm::default();
    }

    pub fn toggle_selected(&self, id: &EntityId) {
        let mut state = self.state();
        if !state.selection.remove(id) {
            state.selection.insert(id.clone());
        }
    }

    pub fn selected(&self) -> BTreeSet<EntityId> {
        self.state().selection.clone()
    }

    // ── Intents ──

    pub async fn submit_create(&self) -> Result<Task, MutationError> {
        let _guard = self.in_flight.try_claim().ok_or(MutationError::InFlight)?;

        let input = self.form().to_input(self.project_id.clone());
        let spec = MutationSpec::new("create_task", "Failed to create task")
            .patch(self.key())
            .patch(QueryKey::Tasks)
            .invalidate(Tag::list(EntityKind::Calendar))
            .on_success("Task created");

        let gateway = &self.ctx.gateway;
        let task = self
            .ctx
            .coordinator
            .create(&self.ctx.caches.tasks, &spec, &input, || {
                gateway.create_task(&input)
            })
            .await?;

        self.close_dialog();
        Ok(task)
    }

    pub async fn submit_update(&self) -> Result<Task, MutationError> {
        let _guard = self.in_flight.try_claim().ok_or(MutationError::InFlight)?;

        let (id, patch) = {
            let state = self.state();
            let Dialog::Edit(id) = &state.dialog else {
                return Err(ValidationError::new("id", "no task is being edited").into());
            };
            (id.clone(), state.form.to_patch())
        };

        let task = self.update(&id, &patch).await?;
        self.close_dialog();
        Ok(task)
    }

    pub async fn submit_inline_field_edit(
        &self,
        id: &EntityId,
        field: TaskField,
    ) -> Result<Task, MutationError> {
        let _guard = self.in_flight.try_claim().ok_or(MutationError::InFlight)?;
        self.update(id, &field.into_patch()).await
    }

    pub async fn submit_delete(&self, id: &EntityId) -> Result<(), MutationError> {
        let _guard = self.in_flight.try_claim().ok_or(MutationError::InFlight)?;

        let spec = self.delete_spec("delete_task", "Failed to delete task");
        let gateway = &self.ctx.gateway;
        self.ctx
            .coordinator
            .delete(&self.ctx.caches.tasks, &spec, std::slice::from_ref(id), || {
                gateway.delete_task(id)
            })
            .await?;

        self.state().selection.remove(id);
        Ok(())
    }

    pub async fn submit_bulk_delete(&self) -> Result<usize, MutationError> {
        let _guard = self.in_flight.try_claim().ok_or(MutationError::InFlight)?;

        let ids: Vec<EntityId> = self.selected().into_iter().collect();
        if ids.is_empty() {
            return Ok(0);
        }

        let spec = self
            .delete_spec("delete_tasks", "Failed to delete tasks")
            .invalidate(Tag::list(EntityKind::Task));
        let gateway = &self.ctx.gateway;
        self.ctx
            .coordinator
            .delete(&self.ctx.caches.tasks, &spec, &ids, || gateway.delete_tasks(&ids))
            .await?;

        self.state().selection.clear();
        Ok(ids.len())
    }

    async fn update(&self, id: &EntityId, patch: &TaskPatch) -> Result<Task, MutationError> {
        let spec = MutationSpec::new("update_task", "Failed to update task")
            .patch(self.key())
            .patch(QueryKey::Tasks)
            .patch(QueryKey::Task(id.clone()))
            .invalidate(Tag::list(EntityKind::Calendar));

        let gateway = &self.ctx.gateway;
        self.ctx
            .coordinator
            .update(&self.ctx.caches.tasks, &spec, id, patch, || {
                gateway.update_task(id, patch)
            })
            .await
    }

    fn delete_spec(&self, operation: &'static str, fallback: &str) -> MutationSpec {
        MutationSpec::new(operation, fallback)
            .patch(self.key())
            .patch(QueryKey::Tasks)
            .invalidate(Tag::list(EntityKind::Calendar))
    }
}
