//! In-process table store.
//!
//! Backs tests and offline runs. Each table keeps its rows plus an
//! auto-increment counter for the `id` column. Calls can be made to fail once
//! ([`MemoryTableStore::fail_next`]) or held open until released
//! ([`MemoryTableStore::hold`]), which lets callers observe state while a
//! remote call is still pending.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;

use crate::store::{Filter, Row, TableStore};
use crate::StoreError;

/// Store operation, used to target injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Select,
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Default)]
struct Table {
    next_id: i64,
    rows: Vec<Row>,
}

#[derive(Debug)]
struct InjectedFailure {
    table: String,
    op: StoreOp,
    message: String,
}

pub struct MemoryTableStore {
    tables: RwLock<HashMap<String, Table>>,
    accepted_token: Option<String>,
    failures: Mutex<VecDeque<InjectedFailure>>,
    calls: AtomicUsize,
    gate: watch::Sender<bool>,
}

impl MemoryTableStore {
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            tables: RwLock::new(HashMap::new()),
            accepted_token: None,
            failures: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            gate,
        }
    }

    /// Reject every call whose bearer credential differs from `token`.
    pub fn with_required_token(mut self, token: impl Into<String>) -> Self {
        self.accepted_token = Some(token.into());
        self
    }

    /// Insert rows directly, bypassing call accounting. Rows without an
    /// `id` get the next auto-increment value.
    pub fn seed(&self, table: &str, rows: impl IntoIterator<Item = Value>) {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let data = tables.entry(table.to_string()).or_default();
        for value in rows {
            let Value::Object(row) = value else {
                tracing::warn!(table, "ignoring non-object seed row");
                continue;
            };
            data.push(row);
        }
    }

    /// Fail the next `op` on `table` with `message`.
    pub fn fail_next(&self, table: &str, op: StoreOp, message: impl Into<String>) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(InjectedFailure {
                table: table.to_string(),
                op,
                message: message.into(),
            });
    }

    /// Hold every subsequent call open until [`release`](Self::release).
    pub fn hold(&self) {
        self.gate.send_replace(false);
    }

    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    /// Number of store calls made so far (seeding excluded).
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Snapshot of a table in id order.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    async fn enter(&self, auth: Option<&str>, table: &str, op: StoreOp) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut gate = self.gate.subscribe();
        // The sender lives in self, so the channel cannot close while we wait.
        let _ = gate.wait_for(|open| *open).await;

        if let Some(expected) = &self.accepted_token {
            if auth != Some(expected.as_str()) {
                return Err(StoreError::Unauthorized(
                    "missing or expired bearer credential".into(),
                ));
            }
        }

        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pos) = failures
            .iter()
            .position(|f| f.table == table && f.op == op)
        {
            if let Some(failure) = failures.remove(pos) {
                return Err(StoreError::Rejected {
                    status: 500,
                    message: failure.message,
                });
            }
        }
        Ok(())
    }
}

impl Default for MemoryTableStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Table {
    fn push(&mut self, mut row: Row) -> Row {
        match row.get("id").and_then(Value::as_i64) {
            Some(id) => self.next_id = self.next_id.max(id),
            None => {
                self.next_id += 1;
                row.insert("id".into(), Value::from(self.next_id));
            }
        }
        self.rows.push(row.clone());
        row
    }
}

fn row_id(row: &Row) -> i64 {
    row.get("id").and_then(Value::as_i64).unwrap_or_default()
}

#[async_trait]
impl TableStore for MemoryTableStore {
    async fn select(
        &self,
        auth: Option<&str>,
        table: &str,
        filter: &Filter,
    ) -> Result<Vec<Row>, StoreError> {
        self.enter(auth, table, StoreOp::Select).await?;

        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        let mut rows: Vec<Row> = tables
            .get(table)
            .map(|t| t.rows.iter().filter(|r| filter.matches(r)).cloned().collect())
            .unwrap_or_default();
        // Newest first, same as the HTTP store's `order=id.desc`.
        rows.sort_by_key(|r| std::cmp::Reverse(row_id(r)));
        Ok(rows)
    }

    async fn insert(&self, auth: Option<&str>, table: &str, mut row: Row) -> Result<Row, StoreError> {
        self.enter(auth, table, StoreOp::Insert).await?;

        // Ids are always assigned by the store.
        row.remove("id");
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        Ok(tables.entry(table.to_string()).or_default().push(row))
    }

    async fn update(
        &self,
        auth: Option<&str>,
        table: &str,
        filter: &Filter,
        changes: Row,
    ) -> Result<Vec<Row>, StoreError> {
        self.enter(auth, table, StoreOp::Update).await?;

        if filter.is_empty() {
            return Err(StoreError::InvalidRequest("update without filter".into()));
        }

        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let Some(data) = tables.get_mut(table) else {
            return Ok(Vec::new());
        };

        let mut updated = Vec::new();
        for row in data.rows.iter_mut().filter(|r| filter.matches(r)) {
            for (column, value) in &changes {
                if column != "id" {
                    row.insert(column.clone(), value.clone());
                }
            }
            updated.push(row.clone());
        }
        Ok(updated)
    }

    async fn delete(
        &self,
        auth: Option<&str>,
        table: &str,
        filter: &Filter,
    ) -> Result<u64, StoreError> {
        self.enter(auth, table, StoreOp::Delete).await?;

        if filter.is_empty() {
            return Err(StoreError::InvalidRequest("delete without filter".into()));
        }

        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let Some(data) = tables.get_mut(table) else {
            return Ok(0);
        };
        let before = data.rows.len();
        data.rows.retain(|r| !filter.matches(r));
        Ok((before - data.rows.len()) as u64)
    }
}
