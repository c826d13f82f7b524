//! Listing warehouse objects and drafting queries against them

use std::sync::Arc;

use snowkit_connection::ConnectionManager;
use snowkit_core::{Cursor, Result, Value};

/// `SHOW ...` output carries the object name in its second column
const SHOW_NAME_COLUMN: usize = 1;
/// `DESCRIBE TABLE` output carries the column name first
const DESCRIBE_NAME_COLUMN: usize = 0;

/// Walks databases, schemas, tables and columns through one manager
#[derive(Clone)]
pub struct SchemaBrowser {
    manager: Arc<ConnectionManager>,
}

impl SchemaBrowser {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self { manager }
    }

    pub async fn databases(&self) -> Result<Vec<String>> {
        self.names("SHOW DATABASES", SHOW_NAME_COLUMN).await
    }

    pub async fn schemas(&self, database: &str) -> Result<Vec<String>> {
        self.names(&format!("SHOW SCHEMAS IN DATABASE {}", database), SHOW_NAME_COLUMN)
            .await
    }

    pub async fn tables(&self, database: &str, schema: &str) -> Result<Vec<String>> {
        self.names(
            &format!("SHOW TABLES IN SCHEMA {}.{}", database, schema),
            SHOW_NAME_COLUMN,
        )
        .await
    }

    pub async fn columns(&self, database: &str, schema: &str, table: &str) -> Result<Vec<String>> {
        self.names(
            &format!("DESCRIBE TABLE {}.{}.{}", database, schema, table),
            DESCRIBE_NAME_COLUMN,
        )
        .await
    }

    /// `SELECT` over the chosen columns, or every column when none are chosen
    pub fn select_snippet(database: &str, schema: &str, table: &str, columns: &[String]) -> String {
        let column_list = if columns.is_empty() {
            "*".to_string()
        } else {
            columns.join(", ")
        };
        format!("SELECT {} FROM {}.{}.{}", column_list, database, schema, table)
    }

    async fn names(&self, sql: &str, index: usize) -> Result<Vec<String>> {
        let mut cursor = self.manager.execute(sql, None).await?;
        let rows = cursor.fetch_all().await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| match row.into_iter().nth(index) {
                Some(Value::Null) | None => None,
                Some(Value::String(name)) => Some(name),
                Some(other) => Some(other.to_string()),
            })
            .collect())
    }
}

impl std::fmt::Debug for SchemaBrowser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaBrowser")
            .field("driver", &self.manager.driver_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_snippet() {
        let columns = vec!["ID".to_string(), "NAME".to_string()];
        assert_eq!(
            SchemaBrowser::select_snippet("DB", "PUBLIC", "USERS", &columns),
            "SELECT ID, NAME FROM DB.PUBLIC.USERS"
        );
        assert_eq!(
            SchemaBrowser::select_snippet("DB", "PUBLIC", "USERS", &[]),
            "SELECT * FROM DB.PUBLIC.USERS"
        );
    }
}
