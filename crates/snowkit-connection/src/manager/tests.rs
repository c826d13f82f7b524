//! Tests for the connection manager

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use snowkit_config::SnowflakeConfig;
use snowkit_core::{ColumnMeta, Connection, Cursor, QueryParams, Result, SnowkitError, Value};

use super::*;

/// What a freshly created mock reports from `is_live`
#[derive(Debug, Clone, Copy)]
enum Liveness {
    Live,
    Stale,
    Unknown,
}

struct MockConnection {
    id: usize,
    liveness: Mutex<Liveness>,
    closed: AtomicBool,
    /// (sql, whether params were passed)
    query_log: Arc<Mutex<Vec<(String, bool)>>>,
}

impl MockConnection {
    fn set_liveness(&self, liveness: Liveness) {
        *self.liveness.lock() = liveness;
    }
}

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

#[async_trait]
impl Connection for MockConnection {
    fn driver_name(&self) -> &str {
        "mock"
    }

    fn is_live(&self) -> Result<bool> {
        match *self.liveness.lock() {
            Liveness::Live => Ok(!self.closed.load(Ordering::SeqCst)),
            Liveness::Stale => Ok(false),
            Liveness::Unknown => Err(SnowkitError::NotSupported("liveness probe".into())),
        }
    }

    async fn execute(&self, sql: &str, params: Option<&QueryParams>) -> Result<Box<dyn Cursor>> {
        self.query_log.lock().push((sql.to_string(), params.is_some()));
        Ok(Box::new(EmptyCursor))
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Factory handing out mocks whose initial liveness follows a script
struct MockFactory {
    counter: AtomicUsize,
    script: Mutex<VecDeque<Liveness>>,
    created: Mutex<Vec<Arc<MockConnection>>>,
    query_log: Arc<Mutex<Vec<(String, bool)>>>,
    fail: AtomicBool,
    delay: Option<Duration>,
}

impl MockFactory {
    fn new() -> Self {
        Self {
            counter: AtomicUsize::new(0),
            script: Mutex::new(VecDeque::new()),
            created: Mutex::new(Vec::new()),
            query_log: Arc::new(Mutex::new(Vec::new())),
            fail: AtomicBool::new(false),
            delay: None,
        }
    }

    fn scripted(script: &[Liveness]) -> Self {
        let factory = Self::new();
        factory.script.lock().extend(script.iter().copied());
        factory
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn count(&self) -> usize {
        self.counter.load(Ordering::SeqCst)
    }

    fn connection(&self, index: usize) -> Arc<MockConnection> {
        self.created.lock()[index].clone()
    }
}

#[async_trait]
impl ConnectionFactory for MockFactory {
    async fn create(&self) -> Result<Arc<dyn Connection>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(SnowkitError::Connection("authentication failed".into()));
        }
        let id = self.counter.fetch_add(1, Ordering::SeqCst);
        let liveness = self.script.lock().pop_front().unwrap_or(Liveness::Live);
        let connection = Arc::new(MockConnection {
            id,
            liveness: Mutex::new(liveness),
            closed: AtomicBool::new(false),
            query_log: self.query_log.clone(),
        });
        self.created.lock().push(connection.clone());
        Ok(connection)
    }

    fn driver_name(&self) -> &str {
        "mock"
    }
}

fn manager(factory: &Arc<MockFactory>) -> ConnectionManager {
    ConnectionManager::with_factory(SnowflakeConfig::default(), factory.clone())
}

#[tokio::test]
async fn test_reuses_live_handle() {
    let factory = Arc::new(MockFactory::new());
    let manager = manager(&factory);

    let first = manager.get_connection().await.unwrap();
    let second = manager.get_connection().await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(factory.count(), 1);
    assert_eq!(manager.stats(), ManagerStats { created: 1, holding: true });
}

#[tokio::test]
async fn test_stale_on_creation_retries_once() {
    let factory = Arc::new(MockFactory::scripted(&[Liveness::Stale]));
    let manager = manager(&factory);

    let connection = manager.get_connection().await.unwrap();

    assert_eq!(factory.count(), 2);
    assert!(connection.is_live().unwrap());
    let second: Arc<dyn Connection> = factory.connection(1);
    assert!(Arc::ptr_eq(&connection, &second));
    assert_eq!(factory.connection(1).id, 1);
}

#[tokio::test]
async fn test_stale_twice_on_creation_does_not_loop() {
    let factory = Arc::new(MockFactory::scripted(&[Liveness::Stale, Liveness::Stale]));
    let manager = manager(&factory);

    manager.get_connection().await.unwrap();
    assert_eq!(factory.count(), 2);
}

#[tokio::test]
async fn test_stale_handle_is_replaced_not_closed() {
    let factory = Arc::new(MockFactory::new());
    let manager = manager(&factory);

    let first = manager.get_connection().await.unwrap();
    factory.connection(0).set_liveness(Liveness::Stale);

    let second = manager.get_connection().await.unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(factory.count(), 2);
    assert_eq!(factory.connection(1).id, 1);
    assert!(!factory.connection(0).closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_optimistic_policy_keeps_unknown_handle() {
    let factory = Arc::new(MockFactory::scripted(&[Liveness::Unknown]));
    let manager = manager(&factory);

    let first = manager.get_connection().await.unwrap();
    let second = manager.get_connection().await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(factory.count(), 1);
}

#[tokio::test]
async fn test_strict_policy_replaces_unknown_handle() {
    let factory = Arc::new(MockFactory::new());
    let manager = manager(&factory).with_policy(LivenessPolicy::Strict);

    manager.get_connection().await.unwrap();
    factory.connection(0).set_liveness(Liveness::Unknown);
    manager.get_connection().await.unwrap();

    assert_eq!(factory.count(), 2);
}

#[tokio::test]
async fn test_creation_error_propagates() {
    let factory = Arc::new(MockFactory::new());
    factory.fail.store(true, Ordering::SeqCst);
    let manager = manager(&factory);

    let err = manager.get_connection().await.err().unwrap();
    assert!(matches!(err, SnowkitError::Connection(_)));
    assert!(!manager.stats().holding);

    // Nothing cached; the next call tries again
    factory.fail.store(false, Ordering::SeqCst);
    manager.get_connection().await.unwrap();
    assert_eq!(factory.count(), 1);
}

#[tokio::test]
async fn test_concurrent_gets_create_one_handle() {
    let factory = Arc::new(MockFactory::new().with_delay(Duration::from_millis(20)));
    let manager = Arc::new(manager(&factory));

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let manager = manager.clone();
            tokio::spawn(async move { manager.get_connection().await })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }
    assert_eq!(factory.count(), 1);
}

#[tokio::test]
async fn test_execute_normalizes_empty_params() {
    let factory = Arc::new(MockFactory::new());
    let manager = manager(&factory);

    manager.execute("SELECT 1", None).await.unwrap();
    manager.execute("SELECT 2", Some(&QueryParams::new())).await.unwrap();
    manager
        .execute("SELECT :x", Some(&QueryParams::new().with("x", 1i64)))
        .await
        .unwrap();

    assert_eq!(
        *factory.query_log.lock(),
        vec![
            ("SELECT 1".to_string(), false),
            ("SELECT 2".to_string(), false),
            ("SELECT :x".to_string(), true),
        ]
    );
}

#[tokio::test]
async fn test_close_then_recreate() {
    let factory = Arc::new(MockFactory::new());
    let manager = manager(&factory);

    manager.get_connection().await.unwrap();
    manager.close().await.unwrap();
    assert!(factory.connection(0).closed.load(Ordering::SeqCst));
    assert!(!manager.stats().holding);

    manager.get_connection().await.unwrap();
    assert_eq!(factory.count(), 2);
}

#[tokio::test]
async fn test_stats_not_holding_while_first_creation_in_flight() {
    let factory = Arc::new(MockFactory::new().with_delay(Duration::from_millis(100)));
    let manager = Arc::new(manager(&factory));

    let pending = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.get_connection().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(manager.stats(), ManagerStats { created: 0, holding: false });

    pending.await.unwrap().unwrap();
    assert_eq!(manager.stats(), ManagerStats { created: 1, holding: true });

    manager.close().await.unwrap();
    assert!(!manager.stats().holding);
}
