//! Snowkit - cached warehouse connections for interactive apps
//!
//! [`Snowkit`] is the application root. It resolves configuration, hands out
//! one lazily reconnecting connection manager per configuration, and runs
//! reads through an optional result cache:
//!
//! ```ignore
//! let kit = Snowkit::builder().build()?;
//! let output = kit
//!     .read_table("SELECT * FROM ORDERS WHERE REGION = :region", Some(&params), ReadOptions::default())
//!     .await?;
//! kit.shutdown().await?;
//! ```
//!
//! Synchronous callers use [`Snowkit::blocking`].

mod app;
pub mod blocking;
pub mod logging;
mod schema;

#[cfg(test)]
mod app_tests;

pub use app::{ConfigInput, ReadOptions, ReadResult, Snowkit, SnowkitBuilder};
pub use logging::{ConsoleFormat, JsonFileSink, LogRotation, LoggingConfig, timed};
pub use schema::SchemaBrowser;

pub use snowkit_config::{ConfigResolver, EnvSource, SecretsStore, SnowflakeConfig};
pub use snowkit_connection::{ConnectionManager, LivenessPolicy, ManagerStats};
pub use snowkit_core::{
    BulkLoadOutcome, ColumnMeta, Connection, Cursor, QueryOutput, QueryParams, Result, Row,
    SnowkitError, Table, Value,
};
pub use snowkit_drivers::DriverRegistry;
pub use snowkit_interchange::{Compression, FileFormat, StageOptions, WriteOptions};
pub use snowkit_query::{CacheStrategy, MemoryResultCache, OutputFormat, ResultCache};
