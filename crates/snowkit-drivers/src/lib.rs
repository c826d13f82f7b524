//! Snowkit Drivers - Warehouse driver implementations
//!
//! This crate provides concrete implementations of the driver traits defined
//! in `snowkit-core`, a registry to look them up by name, and the shared
//! runtime used by synchronous callers.

#[cfg(feature = "snowflake")]
pub use snowkit_driver_snowflake as snowflake;

mod registry;
mod runtime;

pub use registry::DriverRegistry;
pub use runtime::{block_on_tokio, get_tokio_runtime};

/// Re-export commonly used types from snowkit-core
pub use snowkit_core::{Connection, Cursor, Result, SnowkitError, WarehouseDriver};
