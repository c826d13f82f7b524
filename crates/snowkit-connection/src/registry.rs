//! One manager per configuration

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use snowkit_config::SnowflakeConfig;
use snowkit_core::{Result, WarehouseDriver};

use crate::{ConnectionManager, LivenessPolicy};

/// Registry of connection managers keyed by configuration fingerprint
///
/// Owned by the application root. Every manager it hands out is closed by
/// [`shutdown`](Self::shutdown).
pub struct ManagerRegistry {
    driver: Arc<dyn WarehouseDriver>,
    policy: LivenessPolicy,
    managers: Mutex<HashMap<String, Arc<ConnectionManager>>>,
}

impl ManagerRegistry {
    pub fn new(driver: Arc<dyn WarehouseDriver>) -> Self {
        Self {
            driver,
            policy: LivenessPolicy::default(),
            managers: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_policy(mut self, policy: LivenessPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The manager for `config`, creating it on first request
    pub fn get_or_create(&self, config: SnowflakeConfig) -> Arc<ConnectionManager> {
        let fingerprint = config.fingerprint();
        let mut managers = self.managers.lock();
        managers
            .entry(fingerprint)
            .or_insert_with_key(|fingerprint| {
                tracing::debug!(fingerprint = %fingerprint, driver = %self.driver.name(), "creating connection manager");
                Arc::new(ConnectionManager::new(config, self.driver.clone()).with_policy(self.policy))
            })
            .clone()
    }

    /// Number of managers held
    pub fn len(&self) -> usize {
        self.managers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.managers.lock().is_empty()
    }

    /// Close every managed handle and forget the managers.
    ///
    /// All managers are closed even if some fail; the first error is returned.
    pub async fn shutdown(&self) -> Result<()> {
        let managers: Vec<_> = self.managers.lock().drain().map(|(_, m)| m).collect();
        tracing::info!(count = managers.len(), "shutting down connection managers");

        let mut first_error = None;
        for manager in managers {
            if let Err(e) = manager.close().await {
                tracing::warn!(error = %e, "failed to close managed connection");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl std::fmt::Debug for ManagerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagerRegistry")
            .field("driver", &self.driver.name())
            .field("policy", &self.policy)
            .field("managers", &self.len())
            .finish()
    }
}
