//! Remote Data Gateway
//!
//! Typed CRUD operations over the named remote collections. Every operation
//! returns [`GatewayResult`]: store failures are logged with their original
//! cause and converted into a [`RemoteError`] here, so nothing past this
//! boundary has to deal with transport errors. There is no caching and no
//! retry; a failed call surfaces immediately.

use std::sync::Arc;

use board_types::{
    CalendarItem, EntityId, NewMember, NewProject, NewTask, Project, ProjectMember, ProjectPatch,
    Task, TaskPatch,
};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error};

use crate::session::CredentialProvider;
use crate::store::{Filter, Row, TableStore};
use crate::{RemoteError, StoreError};

pub type GatewayResult<T> = Result<T, RemoteError>;

const PROJECTS: &str = "projects";
const TASKS: &str = "tasks";
const MEMBERS: &str = "project_members";
const INVITATIONS: &str = "invitations";

#[derive(Clone)]
pub struct BoardGateway {
    store: Arc<dyn TableStore>,
    credentials: Arc<dyn CredentialProvider>,
}

impl BoardGateway {
    pub fn new(store: Arc<dyn TableStore>, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self { store, credentials }
    }

    // ── Projects ──

    pub async fn list_projects(&self) -> GatewayResult<Vec<Project>> {
        self.list("list_projects", PROJECTS, Filter::all()).await
    }

    pub async fn list_projects_by_owner(&self, owner_id: &str) -> GatewayResult<Vec<Project>> {
        self.list(
            "list_projects_by_owner",
            PROJECTS,
            Filter::all().eq("owner_id", owner_id),
        )
        .await
    }

    pub async fn get_project(&self, id: &EntityId) -> GatewayResult<Project> {
        self.get("get_project", PROJECTS, id).await
    }

    pub async fn create_project(&self, input: &NewProject) -> GatewayResult<Project> {
        self.insert("create_project", PROJECTS, input).await
    }

    pub async fn update_project(
        &self,
        id: &EntityId,
        patch: &ProjectPatch,
    ) -> GatewayResult<Project> {
        self.update("update_project", PROJECTS, id, patch).await
    }

    pub async fn delete_project(&self, id: &EntityId) -> GatewayResult<()> {
        self.delete("delete_project", PROJECTS, std::slice::from_ref(id))
            .await
    }

    /// One batched call for every id; succeeds only if every row was removed.
    pub async fn delete_projects(&self, ids: &[EntityId]) -> GatewayResult<()> {
        self.delete("delete_projects", PROJECTS, ids).await
    }

    // ── Tasks ──

    pub async fn list_tasks(&self) -> GatewayResult<Vec<Task>> {
        self.list("list_tasks", TASKS, Filter::all()).await
    }

    pub async fn list_tasks_for_project(&self, project_id: &EntityId) -> GatewayResult<Vec<Task>> {
        let operation = "list_tasks_for_project";
        let project = id_value(operation, project_id)?;
        self.list(operation, TASKS, Filter::all().eq("project_id", project))
            .await
    }

    pub async fn get_task(&self, id: &EntityId) -> GatewayResult<Task> {
        self.get("get_task", TASKS, id).await
    }

    pub async fn create_task(&self, input: &NewTask) -> GatewayResult<Task> {
        self.insert("create_task", TASKS, input).await
    }

    pub async fn update_task(&self, id: &EntityId, patch: &TaskPatch) -> GatewayResult<Task> {
        self.update("update_task", TASKS, id, patch).await
    }

    pub async fn delete_task(&self, id: &EntityId) -> GatewayResult<()> {
        self.delete("delete_task", TASKS, std::slice::from_ref(id))
            .await
    }

    pub async fn delete_tasks(&self, ids: &[EntityId]) -> GatewayResult<()> {
        self.delete("delete_tasks", TASKS, ids).await
    }

    // ── Members (relation table) ──

    pub async fn list_members(&self, project_id: &EntityId) -> GatewayResult<Vec<ProjectMember>> {
        let operation = "list_members";
        let project = id_value(operation, project_id)?;
        self.list(operation, MEMBERS, Filter::all().eq("project_id", project))
            .await
    }

    pub async fn add_member(&self, input: &NewMember) -> GatewayResult<ProjectMember> {
        self.insert("add_member", MEMBERS, input).await
    }

    pub async fn remove_member(&self, id: &EntityId) -> GatewayResult<()> {
        self.delete("remove_member", MEMBERS, std::slice::from_ref(id))
            .await
    }

    pub async fn remove_members(&self, ids: &[EntityId]) -> GatewayResult<()> {
        self.delete("remove_members", MEMBERS, ids).await
    }

    /// Record a pending invitation per email. Stops at the first failure.
    pub async fn send_invitations(
        &self,
        project_id: &EntityId,
        emails: &[String],
    ) -> GatewayResult<usize> {
        let operation = "send_invitations";
        let project = id_value(operation, project_id)?;
        let auth = self.credentials.bearer().await;

        for email in emails {
            let mut row = Row::new();
            row.insert("project_id".into(), project.clone());
            row.insert("email".into(), Value::from(email.as_str()));
            row.insert("status".into(), Value::from("pending"));

            if let Err(e) = self.store.insert(auth.as_deref(), INVITATIONS, row).await {
                return Err(self.convert(operation, INVITATIONS, e).await);
            }
        }

        debug!(operation, invitations = emails.len(), "gateway call succeeded");
        Ok(emails.len())
    }

    // ── Calendar aggregate ──

    /// Task due dates and project deadlines falling in the given month,
    /// ordered by date.
    pub async fn calendar_month(&self, year: i32, month: u32) -> GatewayResult<Vec<CalendarItem>> {
        let operation = "calendar_month";
        if NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(RemoteError::new(
                operation,
                format!("invalid month {year}-{month:02}"),
            ));
        }

        let projects = self.list_projects().await?;
        let tasks = self.list_tasks().await?;

        let mut items: Vec<CalendarItem> = projects
            .iter()
            .filter_map(CalendarItem::from_project)
            .chain(tasks.iter().filter_map(CalendarItem::from_task))
            .filter(|item| item.in_month(year, month))
            .collect();
        items.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.title.cmp(&b.title)));

        debug!(
            operation,
            year,
            month,
            items = items.len(),
            "gateway call succeeded"
        );
        Ok(items)
    }

    // ── Generic plumbing ──

    async fn list<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        table: &'static str,
        filter: Filter,
    ) -> GatewayResult<Vec<T>> {
        let auth = self.credentials.bearer().await;
        let rows = match self.store.select(auth.as_deref(), table, &filter).await {
            Ok(rows) => rows,
            Err(e) => return Err(self.convert(operation, table, e).await),
        };

        let records = match rows.into_iter().map(from_row).collect::<Result<Vec<T>, _>>() {
            Ok(records) => records,
            Err(e) => return Err(self.convert(operation, table, e).await),
        };

        debug!(operation, table, rows = records.len(), "gateway call succeeded");
        Ok(records)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        table: &'static str,
        id: &EntityId,
    ) -> GatewayResult<T> {
        let filter = Filter::all().eq("id", id_value(operation, id)?);
        let mut records: Vec<T> = self.list(operation, table, filter).await?;
        if records.is_empty() {
            return Err(RemoteError::not_found(operation, format!("{table} #{id}")));
        }
        Ok(records.swap_remove(0))
    }

    async fn insert<T: DeserializeOwned, I: Serialize + Sync>(
        &self,
        operation: &'static str,
        table: &'static str,
        input: &I,
    ) -> GatewayResult<T> {
        let auth = self.credentials.bearer().await;
        let result = match to_row(input) {
            Ok(row) => self.store.insert(auth.as_deref(), table, row).await,
            Err(e) => Err(e),
        };
        match result.and_then(from_row) {
            Ok(record) => {
                debug!(operation, table, "gateway call succeeded");
                Ok(record)
            }
            Err(e) => Err(self.convert(operation, table, e).await),
        }
    }

    async fn update<T: DeserializeOwned, P: Serialize + Sync>(
        &self,
        operation: &'static str,
        table: &'static str,
        id: &EntityId,
        patch: &P,
    ) -> GatewayResult<T> {
        let filter = Filter::all().eq("id", id_value(operation, id)?);
        let auth = self.credentials.bearer().await;
        let result = match to_row(patch) {
            Ok(changes) => {
                self.store
                    .update(auth.as_deref(), table, &filter, changes)
                    .await
            }
            Err(e) => Err(e),
        };

        let mut rows = match result {
            Ok(rows) => rows,
            Err(e) => return Err(self.convert(operation, table, e).await),
        };
        if rows.is_empty() {
            return Err(RemoteError::not_found(operation, format!("{table} #{id}")));
        }
        match from_row(rows.swap_remove(0)) {
            Ok(record) => {
                debug!(operation, table, %id, "gateway call succeeded");
                Ok(record)
            }
            Err(e) => Err(self.convert(operation, table, e).await),
        }
    }

    async fn delete(
        &self,
        operation: &'static str,
        table: &'static str,
        ids: &[EntityId],
    ) -> GatewayResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let values = ids
            .iter()
            .map(|id| id_value(operation, id))
            .collect::<GatewayResult<Vec<Value>>>()?;

        let filter = match values.as_slice() {
            [single] => Filter::all().eq("id", single.clone()),
            _ => Filter::all().is_in("id", values),
        };

        let auth = self.credentials.bearer().await;
        let removed = match self.store.delete(auth.as_deref(), table, &filter).await {
            Ok(removed) => removed,
            Err(e) => return Err(self.convert(operation, table, e).await),
        };

        if removed != ids.len() as u64 {
            error!(
                operation,
                table,
                requested = ids.len(),
                removed,
                "delete affected fewer rows than requested"
            );
            return Err(RemoteError::new(
                operation,
                format!("deleted {removed} of {} {table}", ids.len()),
            ));
        }

        debug!(operation, table, removed, "gateway call succeeded");
        Ok(())
    }

    /// Log the original cause and normalise it. A rejected session is signed
    /// out so the user re-authenticates.
    async fn convert(&self, operation: &'static str, table: &str, err: StoreError) -> RemoteError {
        error!(operation, table, error = %err, "gateway call failed");

        let unauthorized = err.is_unauthorized();
        if unauthorized {
            self.credentials.sign_out().await;
        }

        let message = match err {
            StoreError::Rejected { message, .. } => message,
            StoreError::Unauthorized(_) => "Your session has expired. Please sign in again.".into(),
            other => other.to_string(),
        };

        RemoteError {
            operation,
            message,
            unauthorized,
        }
    }
}

fn id_value(operation: &'static str, id: &EntityId) -> GatewayResult<Value> {
    id.server_id().map(Value::from).ok_or_else(|| {
        RemoteError::new(operation, format!("record {id} has not been saved yet"))
    })
}

fn to_row<S: Serialize>(input: &S) -> Result<Row, StoreError> {
    match serde_json::to_value(input)? {
        Value::Object(row) => Ok(row),
        other => Err(StoreError::InvalidRequest(format!(
            "expected an object, got {other}"
        ))),
    }
}

fn from_row<T: DeserializeOwned>(row: Row) -> Result<T, StoreError> {
    Ok(serde_json::from_value(Value::Object(row))?)
}
