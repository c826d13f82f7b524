//! Application root

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value as JsonValue;
use snowkit_config::{ConfigResolver, SnowflakeConfig};
use snowkit_connection::{ConnectionManager, LivenessPolicy, ManagerRegistry};
use snowkit_core::{BulkLoadOutcome, Connection, Cursor, QueryOutput, QueryParams, Result, Table};
use snowkit_drivers::DriverRegistry;
use snowkit_interchange::{StageOptions, WriteOptions};
use snowkit_query::{CacheStrategy, OutputFormat, QueryExecutor};

use crate::logging::timed;
use crate::schema::SchemaBrowser;

/// Configuration supplied by a caller, merged with secrets and environment
#[derive(Debug, Clone, Default)]
pub enum ConfigInput {
    /// Secrets and environment only
    #[default]
    None,
    Typed(SnowflakeConfig),
    /// Loose key/value object; unknown keys become extras
    Map(JsonValue),
}

impl From<SnowflakeConfig> for ConfigInput {
    fn from(config: SnowflakeConfig) -> Self {
        ConfigInput::Typed(config)
    }
}

impl From<Option<SnowflakeConfig>> for ConfigInput {
    fn from(config: Option<SnowflakeConfig>) -> Self {
        config.map_or(ConfigInput::None, ConfigInput::Typed)
    }
}

impl From<JsonValue> for ConfigInput {
    fn from(value: JsonValue) -> Self {
        ConfigInput::Map(value)
    }
}

/// Per-call knobs for [`Snowkit::read_table`]
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Cache lifetime; `None` keeps the entry until the cache is cleared
    pub ttl: Option<Duration>,
    /// Return the unread cursor instead of the result; never cached
    pub raw_cursor: bool,
    pub config: ConfigInput,
}

impl ReadOptions {
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn raw_cursor(mut self) -> Self {
        self.raw_cursor = true;
        self
    }

    pub fn config(mut self, config: impl Into<ConfigInput>) -> Self {
        self.config = config.into();
        self
    }
}

/// What a read produced
pub enum ReadResult {
    Output(Arc<QueryOutput>),
    Cursor(Box<dyn Cursor>),
}

impl ReadResult {
    pub fn into_output(self) -> Option<Arc<QueryOutput>> {
        match self {
            ReadResult::Output(output) => Some(output),
            ReadResult::Cursor(_) => None,
        }
    }

    pub fn into_cursor(self) -> Option<Box<dyn Cursor>> {
        match self {
            ReadResult::Cursor(cursor) => Some(cursor),
            ReadResult::Output(_) => None,
        }
    }

    pub fn is_cursor(&self) -> bool {
        matches!(self, ReadResult::Cursor(_))
    }
}

impl std::fmt::Debug for ReadResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadResult::Output(output) => f.debug_tuple("Output").field(output).finish(),
            ReadResult::Cursor(cursor) => f
                .debug_struct("Cursor")
                .field("columns", &cursor.description().len())
                .finish(),
        }
    }
}

/// Builder for [`Snowkit`]
pub struct SnowkitBuilder {
    drivers: Option<DriverRegistry>,
    resolver: Option<ConfigResolver>,
    driver_name: String,
    cache: CacheStrategy,
    format: OutputFormat,
    policy: LivenessPolicy,
}

impl Default for SnowkitBuilder {
    fn default() -> Self {
        Self {
            drivers: None,
            resolver: None,
            driver_name: "snowflake".to_string(),
            cache: CacheStrategy::default(),
            format: OutputFormat::default(),
            policy: LivenessPolicy::default(),
        }
    }
}

impl SnowkitBuilder {
    /// Use `drivers` instead of the built-in registry
    pub fn drivers(mut self, drivers: DriverRegistry) -> Self {
        self.drivers = Some(drivers);
        self
    }

    /// Use `resolver` instead of reading the process environment and secrets file
    pub fn resolver(mut self, resolver: ConfigResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn driver_name(mut self, name: impl Into<String>) -> Self {
        self.driver_name = name.into();
        self
    }

    pub fn cache(mut self, cache: CacheStrategy) -> Self {
        self.cache = cache;
        self
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn liveness_policy(mut self, policy: LivenessPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Fails if the driver is not registered or the secrets file is unreadable
    pub fn build(self) -> Result<Snowkit> {
        let drivers = self.drivers.unwrap_or_else(DriverRegistry::with_defaults);
        let resolver = match self.resolver {
            Some(resolver) => resolver,
            None => ConfigResolver::from_environment()?,
        };
        let driver = drivers.require(&self.driver_name)?;
        let managers = ManagerRegistry::new(driver).with_policy(self.policy);

        tracing::debug!(
            driver = %self.driver_name,
            cache = ?self.cache,
            format = ?self.format,
            "snowkit initialized"
        );

        Ok(Snowkit {
            drivers,
            resolver,
            managers,
            cache: self.cache,
            format: self.format,
        })
    }
}

/// Entry point owning drivers, configuration and connection managers
///
/// Managers are shared per configuration fingerprint and live until
/// [`shutdown`](Self::shutdown).
pub struct Snowkit {
    drivers: DriverRegistry,
    resolver: ConfigResolver,
    managers: ManagerRegistry,
    cache: CacheStrategy,
    format: OutputFormat,
}

impl Snowkit {
    pub fn builder() -> SnowkitBuilder {
        SnowkitBuilder::default()
    }

    pub fn drivers(&self) -> &DriverRegistry {
        &self.drivers
    }

    pub fn resolver(&self) -> &ConfigResolver {
        &self.resolver
    }

    pub fn managers(&self) -> &ManagerRegistry {
        &self.managers
    }

    pub fn cache_strategy(&self) -> &CacheStrategy {
        &self.cache
    }

    pub fn output_format(&self) -> OutputFormat {
        self.format
    }

    /// Merge `input` with the secrets store and environment
    pub fn resolve(&self, input: impl Into<ConfigInput>) -> Result<SnowflakeConfig> {
        let explicit = match input.into() {
            ConfigInput::None => None,
            ConfigInput::Typed(config) => Some(config),
            ConfigInput::Map(value) => Some(SnowflakeConfig::from_map(&value)?),
        };
        self.resolver.resolve(explicit)
    }

    /// The shared manager for the resolved configuration
    pub fn connection_manager(&self, input: impl Into<ConfigInput>) -> Result<Arc<ConnectionManager>> {
        let config = self.resolve(input)?;
        Ok(self.managers.get_or_create(config))
    }

    /// A live session handle for the resolved configuration
    pub async fn connect(&self, input: impl Into<ConfigInput>) -> Result<Arc<dyn Connection>> {
        self.connection_manager(input)?.get_connection().await
    }

    /// Run a read, memoised unless caching is disabled or a raw cursor is requested
    #[tracing::instrument(skip_all, fields(raw_cursor = options.raw_cursor))]
    pub async fn read_table(
        &self,
        sql: &str,
        params: Option<&QueryParams>,
        options: ReadOptions,
    ) -> Result<ReadResult> {
        let ReadOptions {
            ttl,
            raw_cursor,
            config,
        } = options;
        let manager = self.connection_manager(config)?;
        let executor = QueryExecutor::new(manager, self.cache.clone(), self.format);

        timed(format!("Query: {}", sql), async {
            if raw_cursor {
                executor.read_cursor(sql, params).await.map(ReadResult::Cursor)
            } else {
                executor
                    .cached_read(sql, params, ttl)
                    .await
                    .map(ReadResult::Output)
            }
        })
        .await
    }

    /// Bulk load `table`, truncating first when `options.overwrite` is set
    pub async fn write_table(
        &self,
        table: &Table,
        options: &WriteOptions,
        config: impl Into<ConfigInput>,
    ) -> Result<BulkLoadOutcome> {
        let manager = self.connection_manager(config)?;
        timed(
            format!("Write table to {}", options.table_name),
            snowkit_interchange::write_table(&manager, table, options),
        )
        .await
    }

    /// Upload `table` to a stage and return the remote path
    pub async fn stage_table(
        &self,
        table: &Table,
        options: &StageOptions,
        config: impl Into<ConfigInput>,
    ) -> Result<String> {
        let manager = self.connection_manager(config)?;
        timed(
            format!("Upload table to stage {}", options.stage),
            snowkit_interchange::stage_table(&manager, table, options),
        )
        .await
    }

    pub fn schema(&self, config: impl Into<ConfigInput>) -> Result<SchemaBrowser> {
        Ok(SchemaBrowser::new(self.connection_manager(config)?))
    }

    /// Close every managed session
    pub async fn shutdown(&self) -> Result<()> {
        self.managers.shutdown().await
    }
}

impl std::fmt::Debug for Snowkit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snowkit")
            .field("drivers", &self.drivers.list())
            .field("managers", &self.managers)
            .field("cache", &self.cache)
            .field("format", &self.format)
            .finish()
    }
}
