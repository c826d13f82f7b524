//! Lazily created, self-replacing session handle

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use snowkit_config::SnowflakeConfig;
use snowkit_core::{Connection, Cursor, QueryParams, Result, WarehouseDriver};
use tokio::sync::Mutex;

use crate::{ConnectionFactory, DriverConnectionFactory};

#[cfg(test)]
mod tests;

/// How to treat a handle whose liveness cannot be determined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LivenessPolicy {
    /// Keep using the handle; a dead session surfaces on the next query
    #[default]
    Optimistic,
    /// Replace the handle
    Strict,
}

/// Point-in-time counters for a manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerStats {
    /// Handles created over the manager's lifetime
    pub created: usize,
    /// Whether a handle is currently held
    pub holding: bool,
}

/// Owns at most one session handle for one configuration
///
/// The handle is created on the first [`get_connection`](Self::get_connection)
/// and replaced whenever it reports stale. Stale handles are dropped, not
/// closed; only [`close`](Self::close) closes a handle.
pub struct ConnectionManager {
    config: SnowflakeConfig,
    factory: Arc<dyn ConnectionFactory>,
    policy: LivenessPolicy,
    /// Guards creation and replacement; held across the liveness check
    handle: Mutex<Option<Arc<dyn Connection>>>,
    created: AtomicUsize,
    /// Mirrors whether `handle` is `Some`, readable without the lock
    holding: AtomicBool,
}

impl ConnectionManager {
    /// Manager that opens sessions through `driver` using `config`
    pub fn new(config: SnowflakeConfig, driver: Arc<dyn WarehouseDriver>) -> Self {
        let factory = DriverConnectionFactory::new(driver, &config);
        Self::with_factory(config, Arc::new(factory))
    }

    /// Manager over an arbitrary connection factory
    pub fn with_factory(config: SnowflakeConfig, factory: Arc<dyn ConnectionFactory>) -> Self {
        Self {
            config,
            factory,
            policy: LivenessPolicy::default(),
            handle: Mutex::new(None),
            created: AtomicUsize::new(0),
            holding: AtomicBool::new(false),
        }
    }

    pub fn with_policy(mut self, policy: LivenessPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The configuration this manager was built with
    pub fn config(&self) -> &SnowflakeConfig {
        &self.config
    }

    pub fn policy(&self) -> LivenessPolicy {
        self.policy
    }

    pub fn driver_name(&self) -> &str {
        self.factory.driver_name()
    }

    /// Return a usable handle, creating or replacing it as needed.
    ///
    /// A handle that is stale straight after creation is recreated exactly
    /// once; the second handle is returned whatever it reports. Creation
    /// errors propagate unchanged.
    #[tracing::instrument(skip(self), fields(driver = %self.factory.driver_name()))]
    pub async fn get_connection(&self) -> Result<Arc<dyn Connection>> {
        let mut slot = self.handle.lock().await;

        let current = slot.take();
        self.holding.store(false, Ordering::SeqCst);
        let connection = match current {
            Some(existing) if self.is_usable(existing.as_ref()) => existing,
            Some(_stale) => {
                tracing::info!("connection is stale, replacing");
                self.create().await?
            }
            None => {
                let fresh = self.create().await?;
                if self.is_usable(fresh.as_ref()) {
                    fresh
                } else {
                    tracing::warn!("new connection reported stale, creating once more");
                    self.create().await?
                }
            }
        };

        *slot = Some(connection.clone());
        self.holding.store(true, Ordering::SeqCst);
        Ok(connection)
    }

    /// Run a statement on the managed handle.
    ///
    /// Empty parameter maps are passed to the connection as `None`. The
    /// manager lock is released before the statement runs.
    #[tracing::instrument(skip(self, sql, params), fields(sql = %sql.chars().take(120).collect::<String>()))]
    pub async fn execute(&self, sql: &str, params: Option<&QueryParams>) -> Result<Box<dyn Cursor>> {
        let connection = self.get_connection().await?;
        connection.execute(sql, QueryParams::non_empty(params)).await
    }

    /// Close and drop the held handle; the next call recreates it
    pub async fn close(&self) -> Result<()> {
        let held = {
            let mut slot = self.handle.lock().await;
            self.holding.store(false, Ordering::SeqCst);
            slot.take()
        };
        if let Some(connection) = held {
            tracing::debug!(driver = %connection.driver_name(), "closing managed connection");
            connection.close().await?;
        }
        Ok(())
    }

    pub fn stats(&self) -> ManagerStats {
        ManagerStats {
            created: self.created.load(Ordering::SeqCst),
            holding: self.holding.load(Ordering::SeqCst),
        }
    }

    async fn create(&self) -> Result<Arc<dyn Connection>> {
        let connection = self.factory.create().await.map_err(|e| {
            tracing::error!(error = %e, "failed to create connection");
            e
        })?;
        let count = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(created = count, "connection established");
        Ok(connection)
    }

    fn is_usable(&self, connection: &dyn Connection) -> bool {
        match connection.is_live() {
            Ok(live) => live,
            Err(e) => {
                let usable = self.policy == LivenessPolicy::Optimistic;
                tracing::debug!(error = %e, policy = ?self.policy, usable, "liveness undetermined");
                usable
            }
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("driver", &self.factory.driver_name())
            .field("config", &self.config)
            .field("policy", &self.policy)
            .field("created", &self.created.load(Ordering::SeqCst))
            .finish()
    }
}
