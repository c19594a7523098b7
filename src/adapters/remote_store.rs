use crate::domain::ports::MarkStore;
use crate::domain::table::MarkTable;
use crate::utils::error::{MarkingError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Wire shape of a spreadsheet values range: header row first.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Serialize)]
struct ValueRangeUpdate<'a> {
    values: &'a [Vec<String>],
}

fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Mark store kept in a shared online spreadsheet, read and written wholesale.
#[derive(Debug, Clone)]
pub struct RemoteSheetStore {
    url: String,
    token: Option<String>,
    client: Client,
}

impl RemoteSheetStore {
    pub fn new(url: impl Into<String>, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MarkingError::ConfigError {
                message: format!("cannot build HTTP client: {}", e),
            })?;

        Ok(Self {
            url: url.into(),
            token,
            client,
        })
    }

    fn unavailable(&self, message: impl ToString) -> MarkingError {
        MarkingError::store_unavailable(self.location(), message)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// `None` when the sheet does not exist or holds no rows.
    async fn fetch_rows(&self) -> Result<Option<Vec<Vec<String>>>> {
        tracing::debug!("Fetching mark sheet from: {}", self.url);
        let response = self
            .authorize(self.client.get(&self.url))
            .send()
            .await
            .map_err(|e| self.unavailable(e))?;

        let status = response.status();
        tracing::debug!("Mark sheet response status: {}", status);
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(self.unavailable(format!("server answered {}", status)));
        }

        let range: ValueRange = response.json().await.map_err(|e| self.unavailable(e))?;
        if range.values.is_empty() {
            return Ok(None);
        }

        Ok(Some(
            range
                .values
                .iter()
                .map(|row| row.iter().map(cell_text).collect())
                .collect(),
        ))
    }
}

#[async_trait]
impl MarkStore for RemoteSheetStore {
    fn location(&self) -> String {
        self.url.clone()
    }

    async fn exists(&self) -> Result<bool> {
        Ok(self.fetch_rows().await?.is_some())
    }

    async fn read_all(&self) -> Result<MarkTable> {
        let rows = self
            .fetch_rows()
            .await?
            .ok_or_else(|| self.unavailable("no mark table at this address"))?;
        MarkTable::from_rows(&rows).map_err(|e| self.unavailable(e))
    }

    async fn write_all(&self, table: &MarkTable) -> Result<()> {
        let rows = table.to_rows();
        tracing::debug!("Uploading {} rows to: {}", rows.len(), self.url);

        let response = self
            .authorize(self.client.put(&self.url))
            .json(&ValueRangeUpdate { values: &rows })
            .send()
            .await
            .map_err(|e| self.unavailable(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.unavailable(format!("server answered {}", status)));
        }
        Ok(())
    }
}
