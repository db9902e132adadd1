//! REST adapter for the hosted row store.
//!
//! Speaks the PostgREST dialect: filters and ordering as query parameters,
//! upsert via `Prefer: resolution=merge-duplicates` with `on_conflict`,
//! inserted rows echoed back with `return=representation` so callers get
//! the assigned id.

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use url::Url;

use crate::domain::{ExecutionPatch, ExecutionStatus, NewOutcome, NewStrategyExecution, Outcome, Signal};
use crate::error::StoreError;

use super::Store;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Hosted row store client (URL + anonymous key).
pub struct RestStore {
    client: reqwest::Client,
    base: String,
}

/// Minimal row echo used to extract assigned ids.
#[derive(Debug, Deserialize)]
struct IdRow {
    id: i64,
}

impl RestStore {
    /// Build a store client for the given base URL and anonymous key.
    pub fn new(base_url: &Url, anon_key: &str) -> Result<Self, StoreError> {
        let mut headers = HeaderMap::new();
        let key_value = HeaderValue::from_str(anon_key)
            .map_err(|_| StoreError::Auth("anonymous key contains invalid characters".into()))?;
        headers.insert("apikey", key_value);
        let bearer = HeaderValue::from_str(&format!("Bearer {anon_key}"))
            .map_err(|_| StoreError::Auth("anonymous key contains invalid characters".into()))?;
        headers.insert(AUTHORIZATION, bearer);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(StoreError::Transport)?;

        Ok(Self {
            client,
            base: base_url.as_str().trim_end_matches('/').to_string(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base)
    }

    /// Map a non-success response to a structured error. 401/403 break the
    /// credential contract; other 4xx mean the schema contract is broken;
    /// the rest are classified by [`StoreError::is_transient`].
    async fn check(operation: &'static str, response: Response) -> Result<Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(StoreError::Auth(body)),
            s if s.is_client_error()
                && s != StatusCode::REQUEST_TIMEOUT
                && s != StatusCode::TOO_MANY_REQUESTS =>
            {
                Err(StoreError::Schema(format!("{operation}: {status}: {body}")))
            }
            _ => Err(StoreError::Status {
                operation,
                status: status.as_u16(),
                body,
            }),
        }
    }

    fn map_send_error(operation: &'static str, err: reqwest::Error) -> StoreError {
        if err.is_timeout() {
            StoreError::Timeout { operation }
        } else {
            StoreError::Transport(err)
        }
    }

    async fn first_id(operation: &'static str, response: Response) -> Result<i64, StoreError> {
        let rows: Vec<IdRow> = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        rows.first()
            .map(|r| r.id)
            .ok_or_else(|| StoreError::Decode(format!("{operation}: empty representation")))
    }
}

#[async_trait::async_trait]
impl Store for RestStore {
    async fn read_recent_outcomes(
        &self,
        bot_name: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Outcome>, StoreError> {
        const OP: &str = "read_recent_outcomes";
        let mut request = self
            .client
            .get(self.table_url("operation_log"))
            .query(&[("order", "id.desc"), ("limit", &limit.to_string())]);
        if let Some(bot) = bot_name {
            request = request.query(&[("bot_name", format!("eq.{bot}"))]);
        }
        let response = request
            .send()
            .await
            .map_err(|e| Self::map_send_error(OP, e))?;
        Self::check(OP, response)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }

    async fn upsert_signal(&self, signal: &Signal) -> Result<i64, StoreError> {
        const OP: &str = "upsert_signal";
        let response = self
            .client
            .post(self.table_url("signal"))
            .query(&[("on_conflict", "bot_name")])
            .header(
                "Prefer",
                "resolution=merge-duplicates,return=representation",
            )
            .json(&[signal])
            .send()
            .await
            .map_err(|e| Self::map_send_error(OP, e))?;
        Self::first_id(OP, Self::check(OP, response).await?).await
    }

    async fn read_signal(&self, bot_name: &str) -> Result<Option<Signal>, StoreError> {
        const OP: &str = "read_signal";
        let response = self
            .client
            .get(self.table_url("signal"))
            .query(&[("bot_name", format!("eq.{bot_name}")), ("limit", "1".into())])
            .send()
            .await
            .map_err(|e| Self::map_send_error(OP, e))?;
        let mut rows: Vec<Signal> = Self::check(OP, response)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok(rows.pop())
    }

    async fn insert_strategy_execution(
        &self,
        execution: &NewStrategyExecution,
    ) -> Result<i64, StoreError> {
        const OP: &str = "insert_strategy_execution";
        let response = self
            .client
            .post(self.table_url("strategy_execution"))
            .header("Prefer", "return=representation")
            .json(&[execution])
            .send()
            .await
            .map_err(|e| Self::map_send_error(OP, e))?;
        Self::first_id(OP, Self::check(OP, response).await?).await
    }

    async fn update_strategy_execution(
        &self,
        id: i64,
        patch: &ExecutionPatch,
    ) -> Result<(), StoreError> {
        const OP: &str = "update_strategy_execution";
        let response = self
            .client
            .patch(self.table_url("strategy_execution"))
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=minimal")
            .json(patch)
            .send()
            .await
            .map_err(|e| Self::map_send_error(OP, e))?;
        Self::check(OP, response).await?;
        Ok(())
    }

    async fn append_outcome(&self, outcome: &NewOutcome) -> Result<i64, StoreError> {
        const OP: &str = "append_outcome";
        let response = self
            .client
            .post(self.table_url("operation_log"))
            .header("Prefer", "return=representation")
            .json(&[outcome])
            .send()
            .await
            .map_err(|e| Self::map_send_error(OP, e))?;
        Self::first_id(OP, Self::check(OP, response).await?).await
    }

    async fn timeout_stale_executions(
        &self,
        bot_name: &str,
        older_than: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        const OP: &str = "timeout_stale_executions";
        let cutoff = older_than.to_rfc3339_opts(SecondsFormat::Secs, true);
        let response = self
            .client
            .patch(self.table_url("strategy_execution"))
            .query(&[
                ("bot_name", format!("eq.{bot_name}")),
                ("status", "in.(WAITING,MONITORING)".to_string()),
                ("created_at", format!("lt.{cutoff}")),
            ])
            .header("Prefer", "return=representation")
            .json(&json!({
                "status": ExecutionStatus::Timeout,
                "updated_at": Utc::now(),
            }))
            .send()
            .await
            .map_err(|e| Self::map_send_error(OP, e))?;
        let rows: Vec<IdRow> = Self::check(OP, response)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok(rows.len() as u64)
    }
}
