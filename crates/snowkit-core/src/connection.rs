//! Connection and cursor traits

use crate::{ColumnMeta, QueryParams, Result, SnowkitError, Table, Value};
use async_trait::async_trait;

/// Parameters for a bulk load into a warehouse table
#[derive(Debug, Clone, PartialEq)]
pub struct BulkLoadRequest {
    /// Destination table name (optionally qualified)
    pub table_name: String,
    /// Database override
    pub database: Option<String>,
    /// Schema override
    pub schema: Option<String>,
    /// Rows per uploaded chunk
    pub chunk_size: usize,
    /// Create the destination table when it does not exist
    pub auto_create_table: bool,
}

impl BulkLoadRequest {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            database: None,
            schema: None,
            chunk_size: 16_000,
            auto_create_table: true,
        }
    }

    /// Fully qualified destination, `database.schema.table` where known
    pub fn qualified_table_name(&self) -> String {
        match (&self.database, &self.schema) {
            (Some(db), Some(schema)) => format!("{}.{}.{}", db, schema, self.table_name),
            (None, Some(schema)) => format!("{}.{}", schema, self.table_name),
            (Some(db), None) => format!("{}..{}", db, self.table_name),
            (None, None) => self.table_name.clone(),
        }
    }
}

/// Outcome reported by a connector's bulk-load utility
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BulkLoadOutcome {
    pub success: bool,
    pub chunk_count: usize,
    pub row_count: usize,
    /// Per-chunk diagnostics as reported by the connector
    pub diagnostics: Vec<String>,
}

impl BulkLoadOutcome {
    pub fn into_tuple(self) -> (bool, usize, usize, Vec<String>) {
        (self.success, self.chunk_count, self.row_count, self.diagnostics)
    }
}

/// A live warehouse session handle
#[async_trait]
pub trait Connection: Send + Sync {
    /// Get the driver name (e.g., "snowflake")
    fn driver_name(&self) -> &str;

    /// Report whether the session is still usable.
    ///
    /// `Ok(false)` means the handle is stale. An `Err` means liveness could not
    /// be determined; the lifecycle manager decides what that means.
    fn is_live(&self) -> Result<bool>;

    /// Execute a statement and return a cursor positioned to read its results.
    ///
    /// `params` is `None` when there is nothing to bind.
    async fn execute(&self, sql: &str, params: Option<&QueryParams>) -> Result<Box<dyn Cursor>>;

    /// Load a table into the warehouse using the connector's bulk path.
    async fn bulk_load(&self, _table: &Table, _request: &BulkLoadRequest) -> Result<BulkLoadOutcome> {
        Err(SnowkitError::NotSupported(format!(
            "bulk load is not supported by the {} driver",
            self.driver_name()
        )))
    }

    /// Stream bytes to a remote stage location.
    ///
    /// Connectors that cannot stream return `NotSupported`; callers fall back
    /// to a file-based upload.
    async fn upload_stream(&self, _data: Vec<u8>, remote_path: &str, _compress: bool) -> Result<()> {
        Err(SnowkitError::NotSupported(format!(
            "streaming upload to {}",
            remote_path
        )))
    }

    /// Close the session
    async fn close(&self) -> Result<()>;
}

/// Results of an executed statement
#[async_trait]
pub trait Cursor: Send {
    /// Column metadata for the result set; empty for statements without results
    fn description(&self) -> &[ColumnMeta];

    /// Rows affected or returned, if the connector reports it
    fn row_count(&self) -> Option<u64> {
        None
    }

    /// Fetch the whole result in one columnar pass.
    ///
    /// Connectors without a bulk path return `NotSupported`.
    async fn fetch_table(&mut self) -> Result<Table> {
        Err(SnowkitError::NotSupported("bulk fetch".into()))
    }

    /// Fetch all remaining rows
    async fn fetch_all(&mut self) -> Result<Vec<Vec<Value>>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_table_name() {
        let mut request = BulkLoadRequest::new("ORDERS");
        assert_eq!(request.qualified_table_name(), "ORDERS");

        request.schema = Some("PUBLIC".into());
        assert_eq!(request.qualified_table_name(), "PUBLIC.ORDERS");

        request.database = Some("DB".into());
        assert_eq!(request.qualified_table_name(), "DB.PUBLIC.ORDERS");
    }

    #[test]
    fn test_bulk_load_defaults() {
        let request = BulkLoadRequest::new("T");
        assert_eq!(request.chunk_size, 16_000);
        assert!(request.auto_create_table);
    }
}
