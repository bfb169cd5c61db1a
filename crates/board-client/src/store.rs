//! Core trait and filter types for the remote table store.
//!
//! The gateway treats the backend as a generic "query by equality filter,
//! insert, update by filter, delete by filter" capability. Implementations
//! must be Send + Sync and make each call atomic on its own.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::StoreError;

/// A row as exchanged with the store.
pub type Row = Map<String, Value>;

/// One filter condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `column = value`
    Eq(String, Value),
    /// `column IN (values)`
    In(String, Vec<Value>),
}

impl Condition {
    fn column(&self) -> &str {
        match self {
            Condition::Eq(column, _) | Condition::In(column, _) => column,
        }
    }

    fn matches(&self, row: &Row) -> bool {
        let Some(actual) = row.get(self.column()) else {
            return false;
        };
        match self {
            Condition::Eq(_, expected) => actual == expected,
            Condition::In(_, values) => values.contains(actual),
        }
    }
}

/// Conjunction of conditions. An empty filter matches every row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Eq(column.into(), value.into()));
        self
    }

    pub fn is_in<V: Into<Value>>(
        mut self,
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.conditions.push(Condition::In(
            column.into(),
            values.into_iter().map(Into::into).collect(),
        ));
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.conditions.iter().all(|c| c.matches(row))
    }

    /// REST query parameters (`col=eq.v`, `col=in.(a,b)`).
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        self.conditions
            .iter()
            .map(|condition| match condition {
                Condition::Eq(column, value) => {
                    (column.clone(), format!("eq.{}", render_value(value)))
                }
                Condition::In(column, values) => {
                    let rendered: Vec<String> = values.iter().map(render_value).collect();
                    (column.clone(), format!("in.({})", rendered.join(",")))
                }
            })
            .collect()
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Persistence boundary for every remote collection.
///
/// `auth` is the bearer credential of the current session, if any.
#[async_trait]
pub trait TableStore: Send + Sync {
    async fn select(
        &self,
        auth: Option<&str>,
        table: &str,
        filter: &Filter,
    ) -> Result<Vec<Row>, StoreError>;

    /// Insert one row and return it as stored (server-assigned id included).
    async fn insert(&self, auth: Option<&str>, table: &str, row: Row) -> Result<Row, StoreError>;

    /// Apply `changes` to every matching row and return the updated rows.
    async fn update(
        &self,
        auth: Option<&str>,
        table: &str,
        filter: &Filter,
        changes: Row,
    ) -> Result<Vec<Row>, StoreError>;

    /// Delete every matching row and return how many were removed.
    async fn delete(&self, auth: Option<&str>, table: &str, filter: &Filter)
        -> Result<u64, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_filter_matches_eq_and_in() {
        let r = row(json!({ "id": 2, "project_id": 9 }));
        assert!(Filter::all().matches(&r));
        assert!(Filter::all().eq("project_id", 9).matches(&r));
        assert!(!Filter::all().eq("project_id", 8).matches(&r));
        assert!(Filter::all().is_in("id", [1, 2, 3]).matches(&r));
        assert!(!Filter::all().is_in("id", [4]).matches(&r));
        assert!(!Filter::all().eq("missing", 1).matches(&r));
    }

    #[test]
    fn test_query_pairs_rendering() {
        let filter = Filter::all().eq("owner_id", "u-1").is_in("id", [1, 2]);
        assert_eq!(
            filter.to_query_pairs(),
            vec![
                ("owner_id".to_string(), "eq.u-1".to_string()),
                ("id".to_string(), "in.(1,2)".to_string()),
            ]
        );
    }
}
