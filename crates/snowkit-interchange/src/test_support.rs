//! Recording connection shared by the writer and stager tests

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use snowkit_config::SnowflakeConfig;
use snowkit_connection::{ConnectionFactory, ConnectionManager};
use snowkit_core::{
    BulkLoadOutcome, BulkLoadRequest, ColumnMeta, Connection, Cursor, QueryParams, Result,
    SnowkitError, Table, Value,
};

struct EmptyCursor;

#[async_trait]
impl Cursor for EmptyCursor {
    fn description(&self) -> &[ColumnMeta] {
        &[]
    }

    async fn fetch_all(&mut self) -> Result<Vec<Vec<Value>>> {
        Ok(Vec::new())
    }
}

/// Remembers every statement, bulk load and streamed upload it sees
#[derive(Default)]
pub(crate) struct RecordingConnection {
    streaming: bool,
    fail_put: bool,
    log: Mutex<Vec<String>>,
    uploads: Mutex<Vec<(String, Vec<u8>, bool)>>,
    bulk_requests: Mutex<Vec<BulkLoadRequest>>,
}

impl RecordingConnection {
    pub fn streaming() -> Self {
        Self {
            streaming: true,
            ..Default::default()
        }
    }

    pub fn failing_put() -> Self {
        Self {
            fail_put: true,
            ..Default::default()
        }
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    pub fn uploads(&self) -> Vec<(String, Vec<u8>, bool)> {
        self.uploads.lock().clone()
    }

    pub fn last_bulk_request(&self) -> Option<BulkLoadRequest> {
        self.bulk_requests.lock().last().cloned()
    }
}

#[async_trait]
impl Connection for RecordingConnection {
    fn driver_name(&self) -> &str {
        "recording"
    }

    fn is_live(&self) -> Result<bool> {
        Ok(true)
    }

    async fn execute(&self, sql: &str, _params: Option<&QueryParams>) -> Result<Box<dyn Cursor>> {
        self.log.lock().push(sql.to_string());
        if self.fail_put && sql.starts_with("PUT") {
            return Err(SnowkitError::Query("stage does not exist".into()));
        }
        Ok(Box::new(EmptyCursor))
    }

    async fn bulk_load(&self, table: &Table, request: &BulkLoadRequest) -> Result<BulkLoadOutcome> {
        self.log
            .lock()
            .push(format!("BULK LOAD {}", request.qualified_table_name()));
        self.bulk_requests.lock().push(request.clone());
        Ok(BulkLoadOutcome {
            success: true,
            chunk_count: 1,
            row_count: table.row_count(),
            diagnostics: Vec::new(),
        })
    }

    async fn upload_stream(&self, data: Vec<u8>, remote_path: &str, compress: bool) -> Result<()> {
        if !self.streaming {
            return Err(SnowkitError::NotSupported("streaming upload".into()));
        }
        self.uploads
            .lock()
            .push((remote_path.to_string(), data, compress));
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

struct SharedFactory(Arc<RecordingConnection>);

#[async_trait]
impl ConnectionFactory for SharedFactory {
    async fn create(&self) -> Result<Arc<dyn Connection>> {
        Ok(self.0.clone())
    }

    fn driver_name(&self) -> &str {
        "recording"
    }
}

pub(crate) fn manager_for(config: SnowflakeConfig, conn: Arc<RecordingConnection>) -> ConnectionManager {
    ConnectionManager::with_factory(config, Arc::new(SharedFactory(conn)))
}
