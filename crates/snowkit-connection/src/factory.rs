//! Connection factories

use async_trait::async_trait;
use snowkit_config::SnowflakeConfig;
use snowkit_core::{Connection, ConnectionParams, Result, WarehouseDriver};
use std::sync::Arc;

/// Factory trait for creating connections
///
/// Used by [`crate::ConnectionManager`] to create the first handle and to
/// replace stale ones.
#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    /// Create a new connection
    async fn create(&self) -> Result<Arc<dyn Connection>>;

    /// Name of the driver behind this factory, for logs
    fn driver_name(&self) -> &str;
}

#[async_trait]
impl<T: ConnectionFactory> ConnectionFactory for Arc<T> {
    async fn create(&self) -> Result<Arc<dyn Connection>> {
        (**self).create().await
    }

    fn driver_name(&self) -> &str {
        (**self).driver_name()
    }
}

/// Opens sessions through a [`WarehouseDriver`] with a fixed parameter map
pub struct DriverConnectionFactory {
    driver: Arc<dyn WarehouseDriver>,
    params: ConnectionParams,
}

impl DriverConnectionFactory {
    pub fn new(driver: Arc<dyn WarehouseDriver>, config: &SnowflakeConfig) -> Self {
        Self {
            driver,
            params: config.to_params(),
        }
    }

    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }
}

#[async_trait]
impl ConnectionFactory for DriverConnectionFactory {
    async fn create(&self) -> Result<Arc<dyn Connection>> {
        self.driver.connect(&self.params).await
    }

    fn driver_name(&self) -> &str {
        self.driver.name()
    }
}
