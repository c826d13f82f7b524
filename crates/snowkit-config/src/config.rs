//! Snowflake connection settings

use ring::digest::{digest, SHA256};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use snowkit_core::{ConnectionParams, Result, SnowkitError};

/// Names of the fields that map onto [`SnowflakeConfig`] members.
///
/// Any other key found in a source is kept in [`SnowflakeConfig::extra`].
pub const FIELD_NAMES: &[&str] = &[
    "account",
    "user",
    "password",
    "private_key",
    "private_key_file",
    "private_key_passphrase",
    "token",
    "authenticator",
    "warehouse",
    "role",
    "database",
    "schema",
    "client_session_keepalive",
    "login_timeout",
    "network_timeout",
    "retries",
    "retry_delay",
];

const REDACTED_FIELDS: &[&str] = &["password", "private_key", "private_key_passphrase", "token"];

/// Connection parameters for a Snowflake session.
///
/// No field is required at this layer; the connector validates what it needs.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnowflakeConfig {
    pub account: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub private_key: Option<String>,
    pub private_key_file: Option<String>,
    pub private_key_passphrase: Option<String>,
    pub token: Option<String>,
    pub authenticator: Option<String>,
    pub warehouse: Option<String>,
    pub role: Option<String>,
    pub database: Option<String>,
    pub schema: Option<String>,
    /// Keep the server session alive; treated as `true` when absent
    pub client_session_keepalive: Option<bool>,
    /// Seconds to wait for login
    pub login_timeout: Option<u64>,
    /// Seconds to wait for any network round trip
    pub network_timeout: Option<u64>,
    pub retries: Option<u32>,
    /// Seconds between connector-level retries
    pub retry_delay: Option<f64>,
    /// Vendor-specific parameters passed through verbatim
    #[serde(default)]
    pub extra: BTreeMap<String, JsonValue>,
}

impl SnowflakeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from a loose key/value object.
    ///
    /// Keys are matched case-insensitively against [`FIELD_NAMES`]; the rest
    /// become extras.
    pub fn from_map(value: &JsonValue) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| {
            SnowkitError::invalid_config("config", format!("expected a key/value object, got {}", value))
        })?;
        let mut config = Self::default();
        for (key, value) in object {
            config.assign(key, value.clone())?;
        }
        Ok(config)
    }

    /// Whether `key` (any case) names a known field
    pub fn is_field(key: &str) -> bool {
        FIELD_NAMES.contains(&key.to_ascii_lowercase().as_str())
    }

    /// Assign one source value.
    ///
    /// Recognised keys are converted to the field's type; strings are parsed
    /// for typed fields so that environment values work. `null` leaves the
    /// field untouched. Unknown keys are stored as extras.
    pub fn assign(&mut self, key: &str, value: JsonValue) -> Result<()> {
        let key = key.to_ascii_lowercase();
        if value.is_null() {
            return Ok(());
        }
        match key.as_str() {
            "account" => self.account = Some(as_text(&key, value)?),
            "user" => self.user = Some(as_text(&key, value)?),
            "password" => self.password = Some(as_text(&key, value)?),
            "private_key" => self.private_key = Some(as_text(&key, value)?),
            "private_key_file" => self.private_key_file = Some(as_text(&key, value)?),
            "private_key_passphrase" => self.private_key_passphrase = Some(as_text(&key, value)?),
            "token" => self.token = Some(as_text(&key, value)?),
            "authenticator" => self.authenticator = Some(as_text(&key, value)?),
            "warehouse" => self.warehouse = Some(as_text(&key, value)?),
            "role" => self.role = Some(as_text(&key, value)?),
            "database" => self.database = Some(as_text(&key, value)?),
            "schema" => self.schema = Some(as_text(&key, value)?),
            "client_session_keepalive" => {
                self.client_session_keepalive = Some(as_bool(&key, value)?)
            }
            "login_timeout" => self.login_timeout = Some(as_u64(&key, value)?),
            "network_timeout" => self.network_timeout = Some(as_u64(&key, value)?),
            "retries" => {
                let retries = as_u64(&key, value)?;
                self.retries = Some(u32::try_from(retries).map_err(|_| {
                    SnowkitError::invalid_config(&key, format!("{} is out of range", retries))
                })?);
            }
            "retry_delay" => self.retry_delay = Some(as_f64(&key, value)?),
            _ => {
                self.extra.insert(key, value);
            }
        }
        Ok(())
    }

    /// Overlay `other` onto `self`.
    ///
    /// A field is overwritten only when `other` supplies it; extras are merged
    /// key by key.
    pub fn merge_from(&mut self, other: &SnowflakeConfig) {
        fn overlay<T: Clone>(target: &mut Option<T>, source: &Option<T>) {
            if let Some(value) = source {
                *target = Some(value.clone());
            }
        }

        overlay(&mut self.account, &other.account);
        overlay(&mut self.user, &other.user);
        overlay(&mut self.password, &other.password);
        overlay(&mut self.private_key, &other.private_key);
        overlay(&mut self.private_key_file, &other.private_key_file);
        overlay(&mut self.private_key_passphrase, &other.private_key_passphrase);
        overlay(&mut self.token, &other.token);
        overlay(&mut self.authenticator, &other.authenticator);
        overlay(&mut self.warehouse, &other.warehouse);
        overlay(&mut self.role, &other.role);
        overlay(&mut self.database, &other.database);
        overlay(&mut self.schema, &other.schema);
        overlay(&mut self.client_session_keepalive, &other.client_session_keepalive);
        overlay(&mut self.login_timeout, &other.login_timeout);
        overlay(&mut self.network_timeout, &other.network_timeout);
        overlay(&mut self.retries, &other.retries);
        overlay(&mut self.retry_delay, &other.retry_delay);

        for (key, value) in &other.extra {
            self.extra.insert(key.clone(), value.clone());
        }
    }

    /// Effective parameters for the connector.
    ///
    /// Absent fields are omitted, extras are merged in, and
    /// `client_session_keepalive` defaults to `true`.
    pub fn to_params(&self) -> ConnectionParams {
        let mut params = ConnectionParams::new();
        let mut put = |key: &str, value: Option<JsonValue>| {
            if let Some(value) = value {
                params.insert(key.to_string(), value);
            }
        };

        put("account", self.account.clone().map(JsonValue::from));
        put("user", self.user.clone().map(JsonValue::from));
        put("password", self.password.clone().map(JsonValue::from));
        put("private_key", self.private_key.clone().map(JsonValue::from));
        put("private_key_file", self.private_key_file.clone().map(JsonValue::from));
        put(
            "private_key_passphrase",
            self.private_key_passphrase.clone().map(JsonValue::from),
        );
        put("token", self.token.clone().map(JsonValue::from));
        put("authenticator", self.authenticator.clone().map(JsonValue::from));
        put("warehouse", self.warehouse.clone().map(JsonValue::from));
        put("role", self.role.clone().map(JsonValue::from));
        put("database", self.database.clone().map(JsonValue::from));
        put("schema", self.schema.clone().map(JsonValue::from));
        put(
            "client_session_keepalive",
            self.client_session_keepalive.map(JsonValue::from),
        );
        put("login_timeout", self.login_timeout.map(JsonValue::from));
        put("network_timeout", self.network_timeout.map(JsonValue::from));
        put("retries", self.retries.map(JsonValue::from));
        put("retry_delay", self.retry_delay.map(JsonValue::from));

        for (key, value) in &self.extra {
            params.insert(key.clone(), value.clone());
        }
        params
            .entry("client_session_keepalive".to_string())
            .or_insert(JsonValue::Bool(true));
        params
    }

    /// Hex SHA-256 of the canonical parameter map.
    ///
    /// Configurations that resolve to the same parameters share a fingerprint.
    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::to_vec(&self.to_params()).unwrap_or_default();
        hex::encode(digest(&SHA256, &canonical).as_ref())
    }

    /// Parameter map with secret values masked, for logs and the CLI
    pub fn redacted_params(&self) -> ConnectionParams {
        let mut params = self.to_params();
        for key in REDACTED_FIELDS {
            if let Some(value) = params.get_mut(*key) {
                *value = JsonValue::from("***");
            }
        }
        params
    }

    /// True when no field and no extra is set
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl std::fmt::Debug for SnowflakeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |v: &Option<String>| v.as_ref().map(|_| "***");
        f.debug_struct("SnowflakeConfig")
            .field("account", &self.account)
            .field("user", &self.user)
            .field("password", &mask(&self.password))
            .field("private_key", &mask(&self.private_key))
            .field("private_key_file", &self.private_key_file)
            .field("private_key_passphrase", &mask(&self.private_key_passphrase))
            .field("token", &mask(&self.token))
            .field("authenticator", &self.authenticator)
            .field("warehouse", &self.warehouse)
            .field("role", &self.role)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("client_session_keepalive", &self.client_session_keepalive)
            .field("login_timeout", &self.login_timeout)
            .field("network_timeout", &self.network_timeout)
            .field("retries", &self.retries)
            .field("retry_delay", &self.retry_delay)
            .field("extra", &self.extra.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn as_text(key: &str, value: JsonValue) -> Result<String> {
    match value {
        JsonValue::String(s) => Ok(s),
        other => Err(SnowkitError::invalid_config(
            key,
            format!("expected a string, got {}", other),
        )),
    }
}

fn as_bool(key: &str, value: JsonValue) -> Result<bool> {
    match value {
        JsonValue::Bool(b) => Ok(b),
        JsonValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(SnowkitError::invalid_config(
                key,
                format!("expected a boolean, got '{}'", s),
            )),
        },
        other => Err(SnowkitError::invalid_config(
            key,
            format!("expected a boolean, got {}", other),
        )),
    }
}

fn as_u64(key: &str, value: JsonValue) -> Result<u64> {
    match value {
        JsonValue::Number(n) => n.as_u64().ok_or_else(|| {
            SnowkitError::invalid_config(key, format!("expected a non-negative integer, got {}", n))
        }),
        JsonValue::String(s) => s.trim().parse::<u64>().map_err(|_| {
            SnowkitError::invalid_config(key, format!("expected a non-negative integer, got '{}'", s))
        }),
        other => Err(SnowkitError::invalid_config(
            key,
            format!("expected a non-negative integer, got {}", other),
        )),
    }
}

fn as_f64(key: &str, value: JsonValue) -> Result<f64> {
    match value {
        JsonValue::Number(n) => n
            .as_f64()
            .ok_or_else(|| SnowkitError::invalid_config(key, format!("expected a number, got {}", n))),
        JsonValue::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| SnowkitError::invalid_config(key, format!("expected a number, got '{}'", s))),
        other => Err(SnowkitError::invalid_config(
            key,
            format!("expected a number, got {}", other),
        )),
    }
}
