//! Tests for the application root

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::json;
use snowkit_config::{ConfigResolver, EnvSource, SecretsStore, SnowflakeConfig};
use snowkit_core::{
    ColumnMeta, Connection, ConnectionParams, Cursor, QueryOutput, QueryParams, Result,
    SnowkitError, Table, Value, WarehouseDriver,
};
use snowkit_drivers::DriverRegistry;
use snowkit_interchange::WriteOptions;
use snowkit_query::CacheStrategy;

use crate::{ConfigInput, ReadOptions, SchemaBrowser, Snowkit};

struct RowsCursor {
    columns: Vec<ColumnMeta>,
    rows: Vec<Vec<Value>>,
}

#[async_trait]
impl Cursor for RowsCursor {
    fn description(&self) -> &[ColumnMeta] {
        &self.columns
    }

    async fn fetch_all(&mut self) -> Result<Vec<Vec<Value>>> {
        Ok(std::mem::take(&mut self.rows))
    }
}

#[derive(Default)]
struct ScriptedConnection {
    statements: Mutex<Vec<String>>,
    closed: AtomicUsize,
}

#[async_trait]
impl Connection for ScriptedConnection {
    fn driver_name(&self) -> &str {
        "scripted"
    }

    fn is_live(&self) -> Result<bool> {
        Ok(self.closed.load(Ordering::SeqCst) == 0)
    }

    async fn execute(&self, sql: &str, _params: Option<&QueryParams>) -> Result<Box<dyn Cursor>> {
        let run = {
            let mut statements = self.statements.lock();
            statements.push(sql.to_string());
            statements.len() as i64
        };
        let (columns, rows) = if sql.starts_with("SHOW") {
            (
                vec![ColumnMeta::named("created_on", 0), ColumnMeta::named("name", 1)],
                vec![
                    vec![Value::String("2024-01-01".into()), Value::String("ALPHA".into())],
                    vec![Value::String("2024-01-02".into()), Value::String("BETA".into())],
                ],
            )
        } else if sql.starts_with("DESCRIBE") {
            (
                vec![ColumnMeta::named("name", 0), ColumnMeta::named("type", 1)],
                vec![
                    vec![Value::String("ID".into()), Value::String("NUMBER(38,0)".into())],
                    vec![Value::String("EMAIL".into()), Value::String("VARCHAR".into())],
                ],
            )
        } else {
            (vec![ColumnMeta::named("RUN", 0)], vec![vec![Value::Int64(run)]])
        };
        Ok(Box::new(RowsCursor { columns, rows }))
    }

    async fn close(&self) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct ScriptedDriver {
    connects: Mutex<Vec<ConnectionParams>>,
    last: Mutex<Option<Arc<ScriptedConnection>>>,
}

impl ScriptedDriver {
    fn statements(&self) -> Vec<String> {
        self.last
            .lock()
            .as_ref()
            .map(|conn| conn.statements.lock().clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl WarehouseDriver for ScriptedDriver {
    fn name(&self) -> &'static str {
        "snowflake"
    }

    async fn connect(&self, params: &ConnectionParams) -> Result<Arc<dyn Connection>> {
        self.connects.lock().push(params.clone());
        let conn = Arc::new(ScriptedConnection::default());
        *self.last.lock() = Some(conn.clone());
        Ok(conn)
    }
}

fn kit_with(driver: Arc<ScriptedDriver>, cache: CacheStrategy) -> Snowkit {
    let mut drivers = DriverRegistry::new();
    drivers.register(driver);
    let resolver = ConfigResolver::new(
        SecretsStore::from_toml_str("[snowflake]\naccount = \"acme\"\nwarehouse = \"WH\"\n").unwrap(),
        EnvSource::from_pairs([("SNOWFLAKE_ROLE", "ANALYST")]),
    );
    Snowkit::builder()
        .drivers(drivers)
        .resolver(resolver)
        .cache(cache)
        .build()
        .unwrap()
}

#[test]
fn test_missing_driver_is_configuration_error() {
    let err = Snowkit::builder()
        .drivers(DriverRegistry::new())
        .resolver(ConfigResolver::empty())
        .build()
        .unwrap_err();
    assert!(matches!(err, SnowkitError::Configuration(msg) if msg.contains("snowflake")));
}

#[test]
fn test_config_inputs_resolve_alike() {
    let kit = kit_with(Arc::new(ScriptedDriver::default()), CacheStrategy::Disabled);

    let typed = kit
        .resolve(SnowflakeConfig {
            user: Some("APP".into()),
            ..Default::default()
        })
        .unwrap();
    let mapped = kit.resolve(json!({"user": "APP"})).unwrap();

    assert_eq!(typed, mapped);
    assert_eq!(typed.account.as_deref(), Some("acme"));
    assert_eq!(typed.role.as_deref(), Some("ANALYST"));

    let err = kit.resolve(json!({"login_timeout": "soon"})).unwrap_err();
    assert!(matches!(err, SnowkitError::InvalidConfig { .. }));
}

#[tokio::test]
async fn test_connect_passes_resolved_params() {
    let driver = Arc::new(ScriptedDriver::default());
    let kit = kit_with(driver.clone(), CacheStrategy::Disabled);

    let first = kit.connect(ConfigInput::None).await.unwrap();
    let second = kit.connect(ConfigInput::None).await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let connects = driver.connects.lock().clone();
    assert_eq!(connects.len(), 1);
    assert_eq!(connects[0].get("account"), Some(&json!("acme")));
    assert_eq!(connects[0].get("role"), Some(&json!("ANALYST")));
    assert_eq!(connects[0].get("client_session_keepalive"), Some(&json!(true)));
}

#[tokio::test]
async fn test_read_table_memoizes() {
    let driver = Arc::new(ScriptedDriver::default());
    let kit = kit_with(driver.clone(), CacheStrategy::in_memory());

    let first = kit
        .read_table("SELECT 1", None, ReadOptions::default())
        .await
        .unwrap()
        .into_output()
        .unwrap();
    let second = kit
        .read_table("SELECT 1", Some(&QueryParams::new()), ReadOptions::default())
        .await
        .unwrap()
        .into_output()
        .unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(driver.statements(), vec!["SELECT 1".to_string()]);
    assert_eq!(
        *first,
        QueryOutput::Table(Table::from_records(["RUN"], vec![vec![Value::Int64(1)]]))
    );
}

#[tokio::test]
async fn test_raw_cursor_is_never_cached() {
    let driver = Arc::new(ScriptedDriver::default());
    let kit = kit_with(driver.clone(), CacheStrategy::in_memory());

    for _ in 0..2 {
        let result = kit
            .read_table("SELECT 1", None, ReadOptions::default().raw_cursor())
            .await
            .unwrap();
        assert!(result.is_cursor());
    }
    assert_eq!(driver.statements().len(), 2);
}

#[tokio::test]
async fn test_write_table_truncates_before_load() {
    let driver = Arc::new(ScriptedDriver::default());
    let kit = kit_with(driver.clone(), CacheStrategy::Disabled);
    let table = Table::from_records(["ID"], vec![vec![Value::Int64(1)]]);

    let err = kit
        .write_table(&table, &WriteOptions::new("EVENTS").overwrite(true), ConfigInput::None)
        .await
        .unwrap_err();

    // The scripted connection has no bulk path, so the load itself is rejected
    assert!(err.is_not_supported());
    assert_eq!(driver.statements(), vec!["TRUNCATE TABLE EVENTS".to_string()]);
}

#[tokio::test]
async fn test_schema_browser_reads_name_columns() {
    let driver = Arc::new(ScriptedDriver::default());
    let kit = kit_with(driver.clone(), CacheStrategy::Disabled);
    let browser = kit.schema(ConfigInput::None).unwrap();

    assert_eq!(browser.databases().await.unwrap(), vec!["ALPHA", "BETA"]);
    assert_eq!(browser.schemas("ALPHA").await.unwrap(), vec!["ALPHA", "BETA"]);
    let columns = browser.columns("ALPHA", "PUBLIC", "USERS").await.unwrap();
    assert_eq!(columns, vec!["ID", "EMAIL"]);
    assert_eq!(
        SchemaBrowser::select_snippet("ALPHA", "PUBLIC", "USERS", &columns),
        "SELECT ID, EMAIL FROM ALPHA.PUBLIC.USERS"
    );
    assert_eq!(
        driver.statements(),
        vec![
            "SHOW DATABASES".to_string(),
            "SHOW SCHEMAS IN DATABASE ALPHA".to_string(),
            "DESCRIBE TABLE ALPHA.PUBLIC.USERS".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_shutdown_closes_sessions() {
    let driver = Arc::new(ScriptedDriver::default());
    let kit = kit_with(driver.clone(), CacheStrategy::Disabled);

    kit.connect(ConfigInput::None).await.unwrap();
    kit.shutdown().await.unwrap();

    let conn = driver.last.lock().clone().unwrap();
    assert_eq!(conn.closed.load(Ordering::SeqCst), 1);
    assert!(kit.managers().is_empty());
}

#[test]
fn test_blocking_facade() {
    let driver = Arc::new(ScriptedDriver::default());
    let kit = kit_with(driver.clone(), CacheStrategy::in_memory());
    let blocking = kit.blocking();

    let output = blocking
        .read_table("SELECT 1", None, ReadOptions::default())
        .unwrap()
        .into_output()
        .unwrap();
    assert_eq!(output.row_count(), 1);
    blocking.shutdown().unwrap();
}
