//! Driver registry for managing available warehouse drivers

use snowkit_core::{Result, SnowkitError, WarehouseDriver};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of available warehouse drivers
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<dyn WarehouseDriver>>,
}

impl DriverRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            drivers: HashMap::new(),
        }
    }

    /// Create a registry with all built-in drivers registered
    pub fn with_defaults() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();

        #[cfg(feature = "snowflake")]
        registry.register(Arc::new(crate::snowflake::SnowflakeDriver::new()));

        registry
    }

    /// Register a driver, replacing any previous one with the same name
    pub fn register(&mut self, driver: Arc<dyn WarehouseDriver>) {
        let name = driver.name().to_string();
        tracing::info!(driver = %name, "registering warehouse driver");
        self.drivers.insert(name, driver);
    }

    /// Get a driver by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn WarehouseDriver>> {
        let driver = self.drivers.get(name).cloned();
        if driver.is_none() {
            tracing::warn!(driver = %name, "driver not found in registry");
        }
        driver
    }

    /// Get a driver by name, treating absence as a configuration error
    pub fn require(&self, name: &str) -> Result<Arc<dyn WarehouseDriver>> {
        self.get(name).ok_or_else(|| {
            SnowkitError::Configuration(format!(
                "warehouse driver '{}' is not available; enable the '{}' feature or register it",
                name, name
            ))
        })
    }

    /// List all registered driver names, sorted
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.drivers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Check if a driver is registered
    pub fn has(&self, name: &str) -> bool {
        self.drivers.contains_key(name)
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("drivers", &self.list())
            .finish()
    }
}
