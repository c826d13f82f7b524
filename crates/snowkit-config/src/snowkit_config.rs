//! Snowkit Config - Connection parameter resolution
//!
//! Connection parameters come from three places, merged field by field with
//! later sources winning:
//!
//! 1. An explicit [`SnowflakeConfig`] supplied by the application
//! 2. The `[snowflake]` section of a TOML secrets file
//! 3. `SNOWFLAKE_*` environment variables
//!
//! ```toml
//! [snowflake]
//! account   = "orgname-account"
//! user      = "APP_USER"
//! token     = "..."
//! warehouse = "WH_DEV"
//! role      = "ROLE_READONLY"
//! ```
//!
//! Keys that do not name a known field are kept as extras and passed to the
//! connector untouched.

mod config;
mod env;
mod resolver;
mod secrets;

#[cfg(test)]
mod tests;

pub use config::{SnowflakeConfig, FIELD_NAMES};
pub use env::{load_from_env, EnvSource, ENV_PREFIX};
pub use resolver::ConfigResolver;
pub use secrets::{load_from_secrets, SecretsStore, SECRETS_FILE_ENV, SECRETS_SECTION};
