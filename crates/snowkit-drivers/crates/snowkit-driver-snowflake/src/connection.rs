//! Snowflake SQL API session

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use snowkit_core::{
    BulkLoadOutcome, BulkLoadRequest, ColumnMeta, Connection, Cursor, QueryParams, Result,
    SnowkitError, Table, Value,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::binding::{bind_named, Bindings};
use crate::bulk::{create_table_sql, infer_column_types, insert_chunk_sql};
use crate::convert::{convert_cell, RowType};
use crate::driver::SessionContext;

const STATEMENTS_PATH: &str = "/api/v2/statements";
/// Returned with HTTP 202 while a statement is still running
const STILL_RUNNING_CODE: &str = "333334";

#[derive(Debug, Serialize)]
struct StatementRequest<'a> {
    statement: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    database: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warehouse: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    bindings: Bindings,
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    parameters: serde_json::Map<String, serde_json::Value>,
}

/// Any body the statements endpoint returns: result set, pending status or failure
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StatementResponse {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub sql_state: Option<String>,
    #[serde(default)]
    pub statement_handle: Option<String>,
    #[serde(default)]
    pub result_set_meta_data: Option<ResultSetMetaData>,
    #[serde(default)]
    pub data: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    pub stats: Option<StatementStats>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ResultSetMetaData {
    #[serde(default)]
    pub num_rows: Option<u64>,
    #[serde(default)]
    pub row_type: Vec<RowType>,
    #[serde(default)]
    pub partition_info: Vec<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StatementStats {
    #[serde(default)]
    pub num_rows_inserted: Option<u64>,
    #[serde(default)]
    pub num_rows_updated: Option<u64>,
    #[serde(default)]
    pub num_rows_deleted: Option<u64>,
}

impl StatementStats {
    fn affected(&self) -> Option<u64> {
        let parts = [self.num_rows_inserted, self.num_rows_updated, self.num_rows_deleted];
        if parts.iter().all(Option::is_none) {
            return None;
        }
        Some(parts.iter().flatten().sum())
    }
}

/// A session against the Snowflake SQL API
///
/// The API is stateless; the "session" is the HTTP client plus the context
/// (database, schema, warehouse, role) sent with every statement.
pub struct SnowflakeConnection {
    client: reqwest::Client,
    base_url: String,
    context: SessionContext,
    poll_interval: Duration,
    closed: AtomicBool,
}

impl SnowflakeConnection {
    pub(crate) fn new(client: reqwest::Client, base_url: String, context: SessionContext) -> Self {
        Self {
            client,
            base_url,
            context,
            poll_interval: Duration::from_millis(250),
            closed: AtomicBool::new(false),
        }
    }

    /// Base URL statements are posted to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn database(&self) -> Option<&str> {
        self.context.database.as_deref()
    }

    pub fn schema(&self) -> Option<&str> {
        self.context.schema.as_deref()
    }

    fn ensure_not_closed(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SnowkitError::Connection("Connection is closed".to_string()));
        }
        Ok(())
    }

    fn request_body<'a>(&'a self, sql: &'a str, bindings: Bindings) -> StatementRequest<'a> {
        StatementRequest {
            statement: sql,
            database: self.context.database.as_deref(),
            schema: self.context.schema.as_deref(),
            warehouse: self.context.warehouse.as_deref(),
            role: self.context.role.as_deref(),
            bindings,
            parameters: self.context.parameters.clone(),
        }
    }

    /// Submit a statement and collect every partition of its result
    async fn run(&self, sql: &str, bindings: Bindings) -> Result<SnowflakeCursor> {
        self.ensure_not_closed()?;
        let start = Instant::now();

        let url = format!("{}{}", self.base_url, STATEMENTS_PATH);
        let request_id = uuid::Uuid::new_v4().to_string();
        let response = self
            .client
            .post(&url)
            .query(&[("requestId", request_id.as_str())])
            .json(&self.request_body(sql, bindings))
            .send()
            .await
            .map_err(map_transport_error)?;

        let mut body = read_statement_response(response).await?;
        if body.result_set_meta_data.is_none() {
            body = self.wait_for_result(&body).await?;
        }

        let cursor = self.collect(body).await?;
        tracing::debug!(
            duration_ms = start.elapsed().as_millis() as u64,
            rows = cursor.rows.len(),
            "statement completed"
        );
        Ok(cursor)
    }

    /// Poll a running statement until its first result partition is ready
    async fn wait_for_result(&self, pending: &StatementResponse) -> Result<StatementResponse> {
        let handle = pending.statement_handle.as_deref().ok_or_else(|| {
            SnowkitError::Driver("statement is running but no handle was returned".into())
        })?;
        let url = format!("{}{}/{}", self.base_url, STATEMENTS_PATH, handle);

        loop {
            tokio::time::sleep(self.poll_interval).await;
            self.ensure_not_closed()?;
            tracing::trace!(statement_handle = %handle, "polling statement status");

            let response = self.client.get(&url).send().await.map_err(map_transport_error)?;
            let body = read_statement_response(response).await?;
            if body.result_set_meta_data.is_some() {
                return Ok(body);
            }
            if body.code.as_deref() != Some(STILL_RUNNING_CODE) {
                return Err(SnowkitError::Driver(format!(
                    "unexpected status while waiting for statement {}: {}",
                    handle,
                    body.message.unwrap_or_default()
                )));
            }
        }
    }

    /// Turn the first partition into a cursor, fetching any further partitions
    async fn collect(&self, first: StatementResponse) -> Result<SnowflakeCursor> {
        let meta = first.result_set_meta_data.unwrap_or_default();
        let mut data = first.data.unwrap_or_default();

        if meta.partition_info.len() > 1 {
            let handle = first.statement_handle.as_deref().ok_or_else(|| {
                SnowkitError::Driver("partitioned result without a statement handle".into())
            })?;
            for partition in 1..meta.partition_info.len() {
                let url = format!("{}{}/{}", self.base_url, STATEMENTS_PATH, handle);
                let response = self
                    .client
                    .get(&url)
                    .query(&[("partition", partition.to_string())])
                    .send()
                    .await
                    .map_err(map_transport_error)?;
                let page = read_statement_response(response).await?;
                data.extend(page.data.unwrap_or_default());
            }
        }

        let affected = first.stats.as_ref().and_then(StatementStats::affected);
        Ok(SnowflakeCursor::from_parts(meta.row_type, data, affected.or(meta.num_rows)))
    }
}

/// Read a statements endpoint response, mapping failures to errors
async fn read_statement_response(response: reqwest::Response) -> Result<StatementResponse> {
    let status = response.status();
    let text = response.text().await.map_err(map_transport_error)?;
    parse_statement_response(status, &text)
}

pub(crate) fn parse_statement_response(status: StatusCode, text: &str) -> Result<StatementResponse> {
    let body: StatementResponse = if text.trim().is_empty() {
        StatementResponse::default()
    } else {
        serde_json::from_str(text).map_err(|e| {
            SnowkitError::Driver(format!("unreadable response (HTTP {}): {}", status.as_u16(), e))
        })?
    };

    match status {
        StatusCode::OK | StatusCode::ACCEPTED => Ok(body),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(SnowkitError::Connection(format!(
            "authentication failed: {}",
            body.message.unwrap_or_else(|| status.to_string())
        ))),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => Err(SnowkitError::Timeout(
            body.message.unwrap_or_else(|| status.to_string()),
        )),
        _ => Err(SnowkitError::Query(format!(
            "{} ({}): {}",
            body.code.as_deref().unwrap_or("unknown"),
            body.sql_state.as_deref().unwrap_or("-"),
            body.message.unwrap_or_else(|| status.to_string())
        ))),
    }
}

fn map_transport_error(error: reqwest::Error) -> SnowkitError {
    if error.is_timeout() {
        SnowkitError::Timeout(error.to_string())
    } else {
        SnowkitError::Connection(error.to_string())
    }
}

#[async_trait]
impl Connection for SnowflakeConnection {
    fn driver_name(&self) -> &str {
        "snowflake"
    }

    fn is_live(&self) -> Result<bool> {
        Ok(!self.closed.load(Ordering::SeqCst))
    }

    #[tracing::instrument(skip(self, sql, params), fields(bound = params.is_some()))]
    async fn execute(&self, sql: &str, params: Option<&QueryParams>) -> Result<Box<dyn Cursor>> {
        let (sql, bindings) = bind_named(sql, params)?;
        let cursor = self.run(&sql, bindings).await?;
        Ok(Box::new(cursor))
    }

    #[tracing::instrument(skip(self, table, request), fields(table = %request.qualified_table_name(), rows = table.row_count()))]
    async fn bulk_load(&self, table: &Table, request: &BulkLoadRequest) -> Result<BulkLoadOutcome> {
        if table.column_count() == 0 {
            return Err(SnowkitError::Query("cannot load a table with no columns".into()));
        }

        let qualified = request.qualified_table_name();
        if request.auto_create_table {
            self.run(&create_table_sql(&qualified, table), Bindings::new()).await?;
        }

        let column_types = infer_column_types(table);
        let chunk_size = request.chunk_size.max(1);
        let mut outcome = BulkLoadOutcome {
            success: true,
            ..Default::default()
        };

        let mut start = 0;
        while start < table.row_count() {
            let len = chunk_size.min(table.row_count() - start);
            let (sql, bindings) = insert_chunk_sql(&qualified, table, &column_types, start, len);
            let cursor = self.run(&sql, bindings).await?;
            let inserted = cursor.row_count().map_or(len, |n| n as usize);

            outcome.chunk_count += 1;
            outcome.row_count += inserted;
            outcome
                .diagnostics
                .push(format!("chunk {}: {} rows loaded", outcome.chunk_count, inserted));
            start += len;
        }

        tracing::info!(
            chunks = outcome.chunk_count,
            rows = outcome.row_count,
            "bulk load completed"
        );
        Ok(outcome)
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        tracing::debug!("Snowflake connection closed");
        Ok(())
    }
}

impl std::fmt::Debug for SnowflakeConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnowflakeConnection")
            .field("base_url", &self.base_url)
            .field("database", &self.context.database)
            .field("schema", &self.context.schema)
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

/// Fully materialised result of one statement
#[derive(Debug)]
pub struct SnowflakeCursor {
    columns: Vec<ColumnMeta>,
    rows: Vec<Vec<Value>>,
    row_count: Option<u64>,
}

impl SnowflakeCursor {
    fn from_parts(row_types: Vec<RowType>, data: Vec<Vec<Option<String>>>, row_count: Option<u64>) -> Self {
        let columns = row_types
            .iter()
            .enumerate()
            .map(|(idx, rt)| rt.to_column_meta(idx))
            .collect();
        let rows = data
            .into_iter()
            .map(|cells| {
                row_types
                    .iter()
                    .enumerate()
                    .map(|(idx, rt)| convert_cell(cells.get(idx).and_then(|c| c.as_deref()), rt))
                    .collect()
            })
            .collect();
        Self {
            columns,
            rows,
            row_count,
        }
    }

    #[cfg(test)]
    pub(crate) fn from_response(response: StatementResponse) -> Self {
        let meta = response.result_set_meta_data.unwrap_or_default();
        let affected = response.stats.as_ref().and_then(StatementStats::affected);
        Self::from_parts(meta.row_type, response.data.unwrap_or_default(), affected.or(meta.num_rows))
    }
}

#[async_trait]
impl Cursor for SnowflakeCursor {
    fn description(&self) -> &[ColumnMeta] {
        &self.columns
    }

    fn row_count(&self) -> Option<u64> {
        self.row_count
    }

    async fn fetch_table(&mut self) -> Result<Table> {
        let mut table = Table::new(self.columns.clone());
        for record in std::mem::take(&mut self.rows) {
            table.push_record(record);
        }
        Ok(table)
    }

    async fn fetch_all(&mut self) -> Result<Vec<Vec<Value>>> {
        Ok(std::mem::take(&mut self.rows))
    }
}
