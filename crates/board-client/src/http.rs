//! HTTP table store for a REST table API
//!
//! Each collection is exposed at `<base>/rest/v1/<table>`. Filters travel as
//! query parameters and writes ask for the stored representation back.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use url::Url;

use crate::store::{Filter, Row, TableStore};
use crate::StoreError;

#[derive(Debug, Clone)]
pub struct HttpStoreConfig {
    pub base_url: String,
    /// Project API key sent as `apikey` on every request
    pub api_key: Option<String>,
    pub timeout: Duration,
}

#[derive(Clone)]
pub struct HttpTableStore {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl HttpTableStore {
    pub fn new(config: HttpStoreConfig) -> Result<Self, StoreError> {
        let mut base_url = Url::parse(&config.base_url)
            .map_err(|e| StoreError::InvalidRequest(format!("base url: {e}")))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder().timeout(config.timeout).build()?;

        tracing::info!(base_url = %base_url, "HTTP table store configured");

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key,
        })
    }

    fn table_url(&self, table: &str, filter: &Filter) -> Result<Url, StoreError> {
        let mut url = self
            .base_url
            .join(&format!("rest/v1/{table}"))
            .map_err(|e| StoreError::InvalidRequest(format!("table url: {e}")))?;
        if !filter.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (column, expr) in filter.to_query_pairs() {
                pairs.append_pair(&column, &expr);
            }
        }
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder, auth: Option<&str>) -> RequestBuilder {
        let request = match &self.api_key {
            Some(key) => request.header("apikey", key),
            None => request,
        };
        match auth {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn check(response: Response) -> Result<Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
            .unwrap_or(text);

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(StoreError::Unauthorized(message));
        }
        Err(StoreError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl TableStore for HttpTableStore {
    async fn select(
        &self,
        auth: Option<&str>,
        table: &str,
        filter: &Filter,
    ) -> Result<Vec<Row>, StoreError> {
        let mut url = self.table_url(table, filter)?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("order", "id.desc");

        let request = self.authorize(self.client.get(url), auth);
        let response = Self::check(request.send().await?).await?;
        Ok(response.json::<Vec<Row>>().await?)
    }

    async fn insert(&self, auth: Option<&str>, table: &str, row: Row) -> Result<Row, StoreError> {
        let url = self.table_url(table, &Filter::all())?;
        let request = self
            .authorize(self.client.post(url), auth)
            .header("Prefer", "return=representation")
            .json(&row);
        let response = Self::check(request.send().await?).await?;

        let mut rows = response.json::<Vec<Row>>().await?;
        if rows.is_empty() {
            return Err(StoreError::Rejected {
                status: 200,
                message: format!("insert into {table} returned no row"),
            });
        }
        Ok(rows.swap_remove(0))
    }

    async fn update(
        &self,
        auth: Option<&str>,
        table: &str,
        filter: &Filter,
        changes: Row,
    ) -> Result<Vec<Row>, StoreError> {
        if filter.is_empty() {
            return Err(StoreError::InvalidRequest("update without filter".into()));
        }
        let url = self.table_url(table, filter)?;
        let request = self
            .authorize(self.client.patch(url), auth)
            .header("Prefer", "return=representation")
            .json(&changes);
        let response = Self::check(request.send().await?).await?;
        Ok(response.json::<Vec<Row>>().await?)
    }

    async fn delete(
        &self,
        auth: Option<&str>,
        table: &str,
        filter: &Filter,
    ) -> Result<u64, StoreError> {
        if filter.is_empty() {
            return Err(StoreError::InvalidRequest("delete without filter".into()));
        }
        let url = self.table_url(table, filter)?;
        let request = self
            .authorize(self.client.delete(url), auth)
            .header("Prefer", "return=representation");
        let response = Self::check(request.send().await?).await?;
        let removed = response.json::<Vec<Row>>().await?;
        Ok(removed.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> HttpTableStore {
        HttpTableStore::new(HttpStoreConfig {
            base_url: "https://board.example.com".into(),
            api_key: Some("anon".into()),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn test_table_url_carries_filter() {
        let url = store()
            .table_url("tasks", &Filter::all().eq("project_id", 4))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://board.example.com/rest/v1/tasks?project_id=eq.4"
        );
    }

    #[test]
    fn test_in_filter_is_encoded() {
        let url = store()
            .table_url("projects", &Filter::all().is_in("id", [1, 2]))
            .unwrap();
        assert_eq!(url.query(), Some("id=in.%281%2C2%29"));
    }

    #[test]
    fn test_bad_base_url_is_rejected() {
        let err = HttpTableStore::new(HttpStoreConfig {
            base_url: "not a url".into(),
            api_key: None,
            timeout: Duration::from_secs(1),
        });
        assert!(matches!(err, Err(StoreError::InvalidRequest(_))));
    }
}
