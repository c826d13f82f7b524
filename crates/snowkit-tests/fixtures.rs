//! In-process mock warehouse and shared fixtures.
//!
//! [`MockWarehouse`] registers under the `snowflake` driver name, so a
//! [`Snowkit`] built with [`test_kit`] routes every session through it. All
//! activity across the sessions it opens is appended to one [`Journal`] that
//! tests inspect afterwards.
//!
//! # Usage
//!
//! ```rust,ignore
//! use rstest::rstest;
//! use snowkit_tests::fixtures::{warehouse, MockWarehouse};
//!
//! #[rstest]
//! #[tokio::test]
//! async fn test_something(warehouse: Arc<MockWarehouse>) {
//!     let kit = test_kit(warehouse.clone(), CacheStrategy::in_memory());
//!     // ...
//! }
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Once};

use async_trait::async_trait;
use parking_lot::Mutex;
use rstest::fixture;
use snowkit::Snowkit;
use snowkit_config::{ConfigResolver, EnvSource, SecretsStore};
use snowkit_core::{
    BulkLoadOutcome, BulkLoadRequest, ColumnMeta, Connection, ConnectionParams, Cursor,
    QueryParams, Result, SnowkitError, Table, Value, WarehouseDriver,
};
use snowkit_drivers::DriverRegistry;
use snowkit_query::CacheStrategy;

static INIT_LOGGING: Once = Once::new();

/// Route test logs through the test writer; `RUST_LOG` controls the level
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Something the mock warehouse observed
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A session was opened with these parameters
    Connect {
        /// Session number, starting at 1
        session: usize,
        /// Parameters handed to the driver
        params: ConnectionParams,
    },
    /// A statement ran
    Execute {
        /// Session that ran it
        session: usize,
        /// SQL text
        sql: String,
        /// Bound parameters, `None` when nothing was bound
        params: Option<Vec<(String, Value)>>,
    },
    /// A bulk load ran
    BulkLoad {
        /// Session that ran it
        session: usize,
        /// Destination as the connector saw it
        table: String,
        /// Rows loaded
        rows: usize,
    },
    /// Bytes were streamed to a stage
    Upload {
        /// Remote path written
        remote: String,
        /// Payload
        data: Vec<u8>,
        /// Whether compression was requested
        compress: bool,
    },
    /// A session was closed
    Close {
        /// Session closed
        session: usize,
    },
}

/// Ordered record of everything the mock warehouse saw
#[derive(Debug, Default, Clone)]
pub struct Journal {
    events: Arc<Mutex<Vec<Event>>>,
}

impl Journal {
    fn push(&self, event: Event) {
        self.events.lock().push(event);
    }

    /// Snapshot of all events
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// SQL text of every executed statement, in order
    pub fn statements(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Execute { sql, .. } => Some(sql),
                _ => None,
            })
            .collect()
    }

    /// Number of sessions opened
    pub fn connects(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, Event::Connect { .. }))
            .count()
    }
}

/// What the mock connector supports
#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    /// Cursors support the columnar bulk fetch
    pub bulk_fetch: bool,
    /// Sessions support the bulk-load utility
    pub bulk_load: bool,
    /// Sessions can stream uploads to a stage
    pub upload_stream: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            bulk_fetch: true,
            bulk_load: true,
            upload_stream: true,
        }
    }
}

/// Result every non-administrative statement returns
pub fn sample_table() -> Table {
    Table::from_records(
        ["ID", "REGION"],
        vec![
            vec![Value::Int64(1), Value::String("EU".into())],
            vec![Value::Int64(2), Value::Null],
        ],
    )
}

/// Cursor over [`sample_table`]
pub struct MockCursor {
    table: Table,
    bulk_fetch: bool,
}

#[async_trait]
impl Cursor for MockCursor {
    fn description(&self) -> &[ColumnMeta] {
        &self.table.columns
    }

    fn row_count(&self) -> Option<u64> {
        Some(self.table.row_count() as u64)
    }

    async fn fetch_table(&mut self) -> Result<Table> {
        if !self.bulk_fetch {
            return Err(SnowkitError::Driver("columnar fetch unavailable".into()));
        }
        Ok(std::mem::take(&mut self.table))
    }

    async fn fetch_all(&mut self) -> Result<Vec<Vec<Value>>> {
        let records = self.table.records();
        self.table.rows.clear();
        Ok(records)
    }
}

/// Session handle opened by [`MockWarehouse`]
pub struct MockConnection {
    session: usize,
    capabilities: Capabilities,
    journal: Journal,
    stale: AtomicBool,
    liveness_unknown: AtomicBool,
}

impl MockConnection {
    /// Session number, starting at 1
    pub fn session(&self) -> usize {
        self.session
    }

    /// Make the next liveness check report stale
    pub fn mark_stale(&self) {
        self.stale.store(true, Ordering::SeqCst);
    }

    /// Make liveness checks fail to answer
    pub fn mark_liveness_unknown(&self) {
        self.liveness_unknown.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn driver_name(&self) -> &str {
        "snowflake"
    }

    fn is_live(&self) -> Result<bool> {
        if self.liveness_unknown.load(Ordering::SeqCst) {
            return Err(SnowkitError::Connection("session state unavailable".into()));
        }
        Ok(!self.stale.load(Ordering::SeqCst))
    }

    async fn execute(&self, sql: &str, params: Option<&QueryParams>) -> Result<Box<dyn Cursor>> {
        self.journal.push(Event::Execute {
            session: self.session,
            sql: sql.to_string(),
            params: params.map(|p| p.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()),
        });
        if sql.contains("FAIL") {
            return Err(SnowkitError::Query("002003 (42S02): object does not exist".into()));
        }
        let table = if sql.starts_with("TRUNCATE") || sql.starts_with("PUT") {
            Table::default()
        } else {
            sample_table()
        };
        Ok(Box::new(MockCursor {
            table,
            bulk_fetch: self.capabilities.bulk_fetch,
        }))
    }

    async fn bulk_load(&self, table: &Table, request: &BulkLoadRequest) -> Result<BulkLoadOutcome> {
        if !self.capabilities.bulk_load {
            return Err(SnowkitError::NotSupported("bulk load".into()));
        }
        let target = request.qualified_table_name();
        self.journal.push(Event::BulkLoad {
            session: self.session,
            table: target,
            rows: table.row_count(),
        });
        let chunk_count = table.row_count().div_ceil(request.chunk_size.max(1)).max(1);
        Ok(BulkLoadOutcome {
            success: true,
            chunk_count,
            row_count: table.row_count(),
            diagnostics: vec![format!("{} rows loaded", table.row_count())],
        })
    }

    async fn upload_stream(&self, data: Vec<u8>, remote_path: &str, compress: bool) -> Result<()> {
        if !self.capabilities.upload_stream {
            return Err(SnowkitError::NotSupported("streaming upload".into()));
        }
        self.journal.push(Event::Upload {
            remote: remote_path.to_string(),
            data,
            compress,
        });
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.journal.push(Event::Close {
            session: self.session,
        });
        Ok(())
    }
}

/// Mock connector registered as `snowflake`
#[derive(Default)]
pub struct MockWarehouse {
    capabilities: Capabilities,
    journal: Journal,
    sessions: Mutex<Vec<Arc<MockConnection>>>,
    opened: AtomicUsize,
    /// Open every session already stale, up to this many times
    stale_on_open: AtomicUsize,
}

impl MockWarehouse {
    /// Warehouse with the given capabilities
    pub fn with_capabilities(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            ..Default::default()
        }
    }

    /// Hand out the next `n` sessions already stale
    pub fn open_stale(&self, n: usize) {
        self.stale_on_open.store(n, Ordering::SeqCst);
    }

    /// Activity log
    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Every session opened so far
    pub fn sessions(&self) -> Vec<Arc<MockConnection>> {
        self.sessions.lock().clone()
    }

    /// Most recently opened session
    pub fn last_session(&self) -> Option<Arc<MockConnection>> {
        self.sessions.lock().last().cloned()
    }
}

#[async_trait]
impl WarehouseDriver for MockWarehouse {
    fn name(&self) -> &'static str {
        "snowflake"
    }

    fn display_name(&self) -> &'static str {
        "Mock Snowflake"
    }

    async fn connect(&self, params: &ConnectionParams) -> Result<Arc<dyn Connection>> {
        if params.get("account").is_none() {
            return Err(SnowkitError::invalid_config("account", "required"));
        }
        let session = self.opened.fetch_add(1, Ordering::SeqCst) + 1;
        let stale = self
            .stale_on_open
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();

        self.journal.push(Event::Connect {
            session,
            params: params.clone(),
        });
        let conn = Arc::new(MockConnection {
            session,
            capabilities: self.capabilities,
            journal: self.journal.clone(),
            stale: AtomicBool::new(stale),
            liveness_unknown: AtomicBool::new(false),
        });
        self.sessions.lock().push(conn.clone());
        Ok(conn)
    }
}

/// Secrets document used by [`test_kit`]
pub const TEST_SECRETS: &str = r#"
[snowflake]
account = "acct"
user = "u"
warehouse = "WH_TEST"
database = "ANALYTICS"
schema = "PUBLIC"
"#;

/// Resolver over [`TEST_SECRETS`] and the given environment pairs
pub fn test_resolver(env: &[(&str, &str)]) -> ConfigResolver {
    let secrets = SecretsStore::from_toml_str(TEST_SECRETS).unwrap_or_else(|_| SecretsStore::empty());
    ConfigResolver::new(secrets, EnvSource::from_pairs(env.iter().copied()))
}

/// Application root over `warehouse`
pub fn test_kit(warehouse: Arc<MockWarehouse>, cache: CacheStrategy) -> Snowkit {
    init_test_logging();
    let mut drivers = DriverRegistry::new();
    drivers.register(warehouse);
    Snowkit::builder()
        .drivers(drivers)
        .resolver(test_resolver(&[]))
        .cache(cache)
        .build()
        .unwrap_or_else(|e| panic!("test kit failed to build: {}", e))
}

/// Fresh mock warehouse with every capability
#[fixture]
pub fn warehouse() -> Arc<MockWarehouse> {
    init_test_logging();
    Arc::new(MockWarehouse::default())
}
