//! Snowflake driver implementation

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use snowkit_core::{param_str, param_u64, Connection, ConnectionParams, Result, SnowkitError, WarehouseDriver};
use std::sync::Arc;
use std::time::Duration;

use crate::connection::SnowflakeConnection;

/// Header naming the kind of bearer token sent
pub const TOKEN_TYPE_HEADER: &str = "x-snowflake-authorization-token-type";

/// Snowflake warehouse driver
///
/// Opens stateless SQL API sessions. Opening a session does not touch the
/// network; credentials are checked by the first statement.
pub struct SnowflakeDriver;

impl SnowflakeDriver {
    /// Create a new Snowflake driver instance
    pub fn new() -> Self {
        tracing::debug!("Snowflake driver initialized");
        Self
    }
}

impl Default for SnowflakeDriver {
    fn default() -> Self {
        Self::new()
    }
}

/// Statement context sent with every request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionContext {
    pub database: Option<String>,
    pub schema: Option<String>,
    pub warehouse: Option<String>,
    pub role: Option<String>,
    /// Session parameters applied to each statement
    pub parameters: serde_json::Map<String, serde_json::Value>,
}

impl SessionContext {
    pub fn from_params(params: &ConnectionParams) -> Self {
        let mut parameters = match params.get("session_parameters") {
            Some(serde_json::Value::Object(map)) => map.clone(),
            _ => serde_json::Map::new(),
        };
        if let Some(tag) = param_str(params, "query_tag") {
            parameters.insert("QUERY_TAG".into(), serde_json::Value::String(tag));
        }
        Self {
            database: param_str(params, "database"),
            schema: param_str(params, "schema"),
            warehouse: param_str(params, "warehouse"),
            role: param_str(params, "role"),
            parameters,
        }
    }
}

/// Kind of bearer token, from the `authenticator` parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    OAuth,
    ProgrammaticAccessToken,
    KeyPairJwt,
}

impl TokenType {
    pub fn from_authenticator(authenticator: Option<&str>) -> Result<Self> {
        match authenticator.map(|a| a.to_ascii_lowercase()).as_deref() {
            None | Some("oauth") => Ok(Self::OAuth),
            Some("programmatic_access_token") => Ok(Self::ProgrammaticAccessToken),
            Some("snowflake_jwt") => Ok(Self::KeyPairJwt),
            Some(other) => Err(SnowkitError::invalid_config(
                "authenticator",
                format!(
                    "'{}' is not supported; use oauth, programmatic_access_token or snowflake_jwt",
                    other
                ),
            )),
        }
    }

    pub fn header_value(self) -> &'static str {
        match self {
            Self::OAuth => "OAUTH",
            Self::ProgrammaticAccessToken => "PROGRAMMATIC_ACCESS_TOKEN",
            Self::KeyPairJwt => "KEYPAIR_JWT",
        }
    }
}

/// Account URL, honouring a `base_url` override
pub fn account_url(params: &ConnectionParams) -> Result<String> {
    if let Some(base) = param_str(params, "base_url").filter(|s| !s.is_empty()) {
        return Ok(base.trim_end_matches('/').to_string());
    }
    let account = param_str(params, "account")
        .filter(|s| !s.is_empty())
        .ok_or_else(|| SnowkitError::Configuration("Snowflake connection requires 'account'".into()))?;
    // Underscores are not valid in host names
    let host = account.to_ascii_lowercase().replace('_', "-");
    Ok(format!("https://{}.snowflakecomputing.com", host))
}

/// Bearer token from the parameters, with a pointed error when only
/// unsupported credentials were supplied
fn bearer_token(params: &ConnectionParams) -> Result<String> {
    if let Some(token) = param_str(params, "token").filter(|s| !s.is_empty()) {
        return Ok(token);
    }
    let hint = if params.contains_key("private_key") || params.contains_key("private_key_file") {
        "; key-pair credentials must be exchanged for a JWT and passed as 'token' with authenticator = \"snowflake_jwt\""
    } else if params.contains_key("password") {
        "; password login is not available over the SQL API, use a programmatic access token"
    } else {
        ""
    };
    Err(SnowkitError::Configuration(format!(
        "Snowflake connection requires 'token'{}",
        hint
    )))
}

pub(crate) fn build_client(params: &ConnectionParams) -> Result<reqwest::Client> {
    let token = bearer_token(params)?;
    let token_type = TokenType::from_authenticator(param_str(params, "authenticator").as_deref())?;

    let mut headers = HeaderMap::new();
    let mut auth = HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|_| SnowkitError::invalid_config("token", "contains characters not allowed in a header"))?;
    auth.set_sensitive(true);
    headers.insert(AUTHORIZATION, auth);
    headers.insert(TOKEN_TYPE_HEADER, HeaderValue::from_static(token_type.header_value()));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    let mut builder = reqwest::Client::builder()
        .default_headers(headers)
        .user_agent(concat!("snowkit/", env!("CARGO_PKG_VERSION")));
    if let Some(secs) = param_u64(params, "login_timeout")? {
        builder = builder.connect_timeout(Duration::from_secs(secs));
    }
    if let Some(secs) = param_u64(params, "network_timeout")? {
        builder = builder.timeout(Duration::from_secs(secs));
    }

    builder
        .build()
        .map_err(|e| SnowkitError::Driver(format!("failed to build HTTP client: {}", e)))
}

#[async_trait]
impl WarehouseDriver for SnowflakeDriver {
    fn name(&self) -> &'static str {
        "snowflake"
    }

    fn display_name(&self) -> &'static str {
        "Snowflake"
    }

    #[tracing::instrument(skip(self, params), fields(account = param_str(params, "account").as_deref()))]
    async fn connect(&self, params: &ConnectionParams) -> Result<Arc<dyn Connection>> {
        tracing::debug!("opening Snowflake session");

        let base_url = account_url(params)?;
        let client = build_client(params)?;
        let context = SessionContext::from_params(params);

        tracing::debug!(base_url = %base_url, "Snowflake session ready");
        Ok(Arc::new(SnowflakeConnection::new(client, base_url, context)))
    }
}
