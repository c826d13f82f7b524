//! Environment variable source

use crate::SnowflakeConfig;
use snowkit_core::Result;

/// Default prefix for connection variables, e.g. `SNOWFLAKE_ACCOUNT`
pub const ENV_PREFIX: &str = "SNOWFLAKE_";

/// Where environment variables are read from.
///
/// `Fixed` holds an explicit snapshot so resolution can be exercised without
/// touching the process environment.
#[derive(Debug, Clone, Default)]
pub enum EnvSource {
    #[default]
    Process,
    Fixed(Vec<(String, String)>),
}

impl EnvSource {
    pub fn from_process() -> Self {
        Self::Process
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self::Fixed(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Snapshot of all variables, skipping ones that are not valid unicode
    pub fn vars(&self) -> Vec<(String, String)> {
        match self {
            Self::Process => std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
            Self::Fixed(pairs) => pairs.clone(),
        }
    }
}

/// Collect every variable starting with `prefix` into a configuration.
///
/// `PREFIX_LOGIN_TIMEOUT` maps to `login_timeout`. Suffixes that do not name
/// a field are kept as string extras. A malformed value for a typed field is
/// an error.
pub fn load_from_env(source: &EnvSource, prefix: &str) -> Result<SnowflakeConfig> {
    let mut config = SnowflakeConfig::default();
    let mut vars = source.vars();
    // Process order is unspecified; sort so duplicate keys resolve the same way.
    vars.sort();

    for (name, value) in vars {
        let Some(suffix) = name.strip_prefix(prefix) else {
            continue;
        };
        if suffix.is_empty() {
            continue;
        }
        config.assign(suffix, serde_json::Value::String(value))?;
    }

    if !config.is_empty() {
        tracing::debug!(
            prefix = %prefix,
            keys = ?config.to_params().keys().collect::<Vec<_>>(),
            "loaded connection settings from environment"
        );
    }
    Ok(config)
}
