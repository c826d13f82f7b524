//! Warehouse driver trait definition

use crate::{Connection, Result, SnowkitError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Effective connection parameters handed to a driver, keyed by parameter name
pub type ConnectionParams = BTreeMap<String, serde_json::Value>;

/// Connector adapter that knows how to open sessions against a warehouse
#[async_trait]
pub trait WarehouseDriver: Send + Sync {
    /// Unique identifier for this driver (e.g., "snowflake")
    fn name(&self) -> &'static str;

    /// Display name for logs and the CLI
    fn display_name(&self) -> &'static str {
        self.name()
    }

    /// Driver version
    fn version(&self) -> &'static str {
        "0.1.0"
    }

    /// Open a new session. Parameter validation is the driver's job.
    async fn connect(&self, params: &ConnectionParams) -> Result<Arc<dyn Connection>>;
}

/// Read a string parameter; numbers and booleans are rendered as text
pub fn param_str(params: &ConnectionParams, key: &str) -> Option<String> {
    match params.get(key)? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Read an unsigned integer parameter, accepting numeric strings
pub fn param_u64(params: &ConnectionParams, key: &str) -> Result<Option<u64>> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| SnowkitError::invalid_config(key, format!("expected a non-negative integer, got {}", n))),
        Some(serde_json::Value::String(s)) => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| SnowkitError::invalid_config(key, format!("expected a non-negative integer, got '{}'", s))),
        Some(other) => Err(SnowkitError::invalid_config(
            key,
            format!("expected a non-negative integer, got {}", other),
        )),
    }
}
