//! Bulk writes into warehouse tables

use snowkit_connection::ConnectionManager;
use snowkit_core::{BulkLoadOutcome, BulkLoadRequest, Result, Table};

/// Where and how [`write_table`] loads data
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOptions {
    pub table_name: String,
    /// Defaults to the manager configuration's database
    pub database: Option<String>,
    /// Defaults to the manager configuration's schema
    pub schema: Option<String>,
    pub chunk_size: usize,
    pub auto_create_table: bool,
    /// Truncate the destination before loading
    pub overwrite: bool,
}

impl WriteOptions {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            database: None,
            schema: None,
            chunk_size: 16_000,
            auto_create_table: true,
            overwrite: false,
        }
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn auto_create_table(mut self, auto_create_table: bool) -> Self {
        self.auto_create_table = auto_create_table;
        self
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

/// Load `table` into a warehouse table.
///
/// With `overwrite` the destination is truncated first; rows are otherwise
/// appended. The connector's outcome is returned as reported.
#[tracing::instrument(skip(manager, table, options), fields(table = %options.table_name, rows = table.row_count()))]
pub async fn write_table(
    manager: &ConnectionManager,
    table: &Table,
    options: &WriteOptions,
) -> Result<BulkLoadOutcome> {
    let config = manager.config();
    let request = BulkLoadRequest {
        table_name: options.table_name.clone(),
        database: options.database.clone().or_else(|| config.database.clone()),
        schema: options.schema.clone().or_else(|| config.schema.clone()),
        chunk_size: options.chunk_size,
        auto_create_table: options.auto_create_table,
    };

    let conn = manager.get_connection().await?;

    if options.overwrite {
        let sql = format!("TRUNCATE TABLE {}", request.qualified_table_name());
        tracing::debug!(sql = %sql, "truncating destination before load");
        conn.execute(&sql, None).await?;
    }

    let outcome = conn.bulk_load(table, &request).await?;
    tracing::info!(
        success = outcome.success,
        chunks = outcome.chunk_count,
        rows = outcome.row_count,
        "bulk load finished"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{RecordingConnection, manager_for};
    use pretty_assertions::assert_eq;
    use snowkit_config::SnowflakeConfig;
    use snowkit_core::Value;
    use std::sync::Arc;

    fn table() -> Table {
        Table::from_records(["ID"], vec![vec![Value::Int64(1)], vec![Value::Int64(2)]])
    }

    #[test]
    fn test_write_options_defaults() {
        let options = WriteOptions::new("T");
        assert_eq!(options.chunk_size, 16_000);
        assert!(options.auto_create_table);
        assert!(!options.overwrite);
    }

    #[tokio::test]
    async fn test_overwrite_truncates_before_load() {
        let conn = Arc::new(RecordingConnection::default());
        let manager = manager_for(SnowflakeConfig::default(), conn.clone());

        let outcome = write_table(&manager, &table(), &WriteOptions::new("T").overwrite(true))
            .await
            .unwrap();

        assert_eq!(outcome.row_count, 2);
        assert_eq!(conn.log(), vec!["TRUNCATE TABLE T".to_string(), "BULK LOAD T".to_string()]);
    }

    #[tokio::test]
    async fn test_append_never_truncates() {
        let conn = Arc::new(RecordingConnection::default());
        let manager = manager_for(SnowflakeConfig::default(), conn.clone());

        write_table(&manager, &table(), &WriteOptions::new("T")).await.unwrap();

        assert_eq!(conn.log(), vec!["BULK LOAD T".to_string()]);
    }

    #[tokio::test]
    async fn test_location_defaults_to_config() {
        let conn = Arc::new(RecordingConnection::default());
        let config = SnowflakeConfig {
            database: Some("ANALYTICS".into()),
            schema: Some("PUBLIC".into()),
            ..Default::default()
        };
        let manager = manager_for(config, conn.clone());

        write_table(&manager, &table(), &WriteOptions::new("T").schema("STAGING").overwrite(true))
            .await
            .unwrap();

        assert_eq!(
            conn.log(),
            vec![
                "TRUNCATE TABLE ANALYTICS.STAGING.T".to_string(),
                "BULK LOAD ANALYTICS.STAGING.T".to_string()
            ]
        );
        let request = conn.last_bulk_request().unwrap();
        assert_eq!(request.chunk_size, 16_000);
        assert!(request.auto_create_table);
    }
}
