//! TOML secrets store

use crate::SnowflakeConfig;
use serde_json::Value as JsonValue;
use snowkit_core::{Result, SnowkitError};
use std::path::{Path, PathBuf};

/// Section of the secrets document holding connection settings
pub const SECRETS_SECTION: &str = "snowflake";

/// Variable naming an explicit secrets file
pub const SECRETS_FILE_ENV: &str = "SNOWKIT_SECRETS_FILE";

const SECRETS_DIR: &str = ".snowkit";
const SECRETS_FILE: &str = "secrets.toml";

/// A parsed secrets document
#[derive(Debug, Clone, Default)]
pub struct SecretsStore {
    document: toml::Table,
    source: Option<PathBuf>,
}

impl SecretsStore {
    /// A store with no sections
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let document: toml::Table = content
            .parse()
            .map_err(|e: toml::de::Error| SnowkitError::Configuration(format!("invalid secrets file: {}", e)))?;
        Ok(Self {
            document,
            source: None,
        })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut store = Self::from_toml_str(&content).map_err(|e| {
            SnowkitError::Configuration(format!("{}: {}", path.display(), e))
        })?;
        store.source = Some(path.to_path_buf());
        tracing::debug!(path = %path.display(), "loaded secrets file");
        Ok(store)
    }

    /// Locate the secrets file.
    ///
    /// Checks `$SNOWKIT_SECRETS_FILE` first (it must exist when set), then
    /// `./.snowkit/secrets.toml`, then `~/.snowkit/secrets.toml`. Returns an
    /// empty store when none is found.
    pub fn discover() -> Result<Self> {
        if let Some(explicit) = std::env::var_os(SECRETS_FILE_ENV) {
            let path = PathBuf::from(explicit);
            if !path.is_file() {
                return Err(SnowkitError::Configuration(format!(
                    "{} points at {}, which does not exist",
                    SECRETS_FILE_ENV,
                    path.display()
                )));
            }
            return Self::from_path(path);
        }

        let mut candidates = vec![PathBuf::from(SECRETS_DIR).join(SECRETS_FILE)];
        if let Some(home) = dirs::home_dir() {
            candidates.push(home.join(SECRETS_DIR).join(SECRETS_FILE));
        }

        for candidate in candidates {
            if candidate.is_file() {
                return Self::from_path(candidate);
            }
        }

        tracing::debug!("no secrets file found");
        Ok(Self::empty())
    }

    /// A top-level table by name
    pub fn section(&self, name: &str) -> Option<&toml::Table> {
        self.document.get(name)?.as_table()
    }

    pub fn is_empty(&self) -> bool {
        self.document.is_empty()
    }

    /// File the store was read from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

/// Read connection settings from a section of the secrets store.
///
/// Returns `None` when the section is absent.
pub fn load_from_secrets(store: &SecretsStore, section: &str) -> Result<Option<SnowflakeConfig>> {
    let Some(table) = store.section(section) else {
        return Ok(None);
    };

    let mut config = SnowflakeConfig::default();
    for (key, value) in table {
        config.assign(key, toml_to_json(value))?;
    }
    Ok(Some(config))
}

fn toml_to_json(value: &toml::Value) -> JsonValue {
    match value {
        toml::Value::String(s) => JsonValue::String(s.clone()),
        toml::Value::Integer(i) => JsonValue::from(*i),
        toml::Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        toml::Value::Boolean(b) => JsonValue::Bool(*b),
        toml::Value::Datetime(dt) => JsonValue::String(dt.to_string()),
        toml::Value::Array(items) => JsonValue::Array(items.iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => JsonValue::Object(
            table
                .iter()
                .map(|(k, v)| (k.clone(), toml_to_json(v)))
                .collect(),
        ),
    }
}
