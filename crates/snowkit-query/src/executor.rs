//! Query execution with optional memoisation

use snowkit_connection::ConnectionManager;
use snowkit_core::{Cursor, QueryOutput, QueryParams, Result, Table};
use std::sync::Arc;
use std::time::Duration;

use crate::{CacheKey, CacheStrategy};

/// Shape a read is returned in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Named columns; bulk fetch where the connector supports it
    #[default]
    Table,
    /// Raw positional rows
    Rows,
}

/// Runs reads through a [`ConnectionManager`]
///
/// Cache entries are scoped to the manager's configuration fingerprint, so
/// executors over different configurations can share one cache.
#[derive(Clone)]
pub struct QueryExecutor {
    manager: Arc<ConnectionManager>,
    strategy: CacheStrategy,
    format: OutputFormat,
    scope: String,
}

impl QueryExecutor {
    pub fn new(manager: Arc<ConnectionManager>, strategy: CacheStrategy, format: OutputFormat) -> Self {
        let scope = manager.config().fingerprint();
        Self {
            manager,
            strategy,
            format,
            scope,
        }
    }

    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    pub fn strategy(&self) -> &CacheStrategy {
        &self.strategy
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Read through the cache.
    ///
    /// A live entry for the same SQL and parameters is returned without
    /// touching the warehouse. With [`CacheStrategy::Disabled`] every call
    /// runs the statement.
    #[tracing::instrument(skip(self, params), fields(cached = self.strategy.is_enabled()))]
    pub async fn cached_read(
        &self,
        sql: &str,
        params: Option<&QueryParams>,
        ttl: Option<Duration>,
    ) -> Result<Arc<QueryOutput>> {
        let CacheStrategy::Memoize(cache) = &self.strategy else {
            return self.run(sql, params).await.map(Arc::new);
        };

        let key = CacheKey::new(sql, params)?.with_scope(self.scope.as_str());
        if let Some(hit) = cache.get(&key) {
            return Ok(hit);
        }

        let output = Arc::new(self.run(sql, params).await?);
        cache.insert(key, output.clone(), ttl);
        Ok(output)
    }

    /// Run the statement without consulting the cache
    pub async fn read(&self, sql: &str, params: Option<&QueryParams>) -> Result<QueryOutput> {
        self.run(sql, params).await
    }

    /// Run the statement and hand back the cursor unread
    pub async fn read_cursor(&self, sql: &str, params: Option<&QueryParams>) -> Result<Box<dyn Cursor>> {
        self.manager.execute(sql, params).await
    }

    async fn run(&self, sql: &str, params: Option<&QueryParams>) -> Result<QueryOutput> {
        let mut cursor = self.manager.execute(sql, params).await?;
        match self.format {
            OutputFormat::Rows => Ok(QueryOutput::Rows(cursor.fetch_all().await?)),
            OutputFormat::Table => Ok(QueryOutput::Table(fetch_as_table(cursor.as_mut()).await?)),
        }
    }
}

/// Bulk fetch when available, otherwise rows plus the cursor's column names.
///
/// A cursor without metadata gets positional `column_N` names.
pub(crate) async fn fetch_as_table(cursor: &mut dyn Cursor) -> Result<Table> {
    match cursor.fetch_table().await {
        Ok(table) => Ok(table),
        Err(e) => {
            tracing::debug!(error = %e, "bulk fetch unavailable, falling back to row fetch");
            let mut names: Vec<String> = cursor.description().iter().map(|c| c.name.clone()).collect();
            let rows = cursor.fetch_all().await?;
            if names.is_empty() {
                let width = rows.iter().map(Vec::len).max().unwrap_or(0);
                names = (0..width).map(|i| format!("column_{}", i)).collect();
            }
            Ok(Table::from_records(names, rows))
        }
    }
}

impl std::fmt::Debug for QueryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryExecutor")
            .field("strategy", &self.strategy)
            .field("format", &self.format)
            .finish()
    }
}
