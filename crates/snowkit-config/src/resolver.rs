//! Layered configuration resolution

use crate::{load_from_env, load_from_secrets, EnvSource, SecretsStore, SnowflakeConfig};
use crate::{ENV_PREFIX, SECRETS_SECTION};
use snowkit_core::Result;

/// Merges explicit, secrets and environment settings.
///
/// Later sources win field by field; a source only overrides what it
/// actually supplies.
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    secrets: SecretsStore,
    env: EnvSource,
    env_prefix: String,
    secrets_section: String,
}

impl ConfigResolver {
    pub fn new(secrets: SecretsStore, env: EnvSource) -> Self {
        Self {
            secrets,
            env,
            env_prefix: ENV_PREFIX.to_string(),
            secrets_section: SECRETS_SECTION.to_string(),
        }
    }

    /// Resolver over the process environment and the discovered secrets file
    pub fn from_environment() -> Result<Self> {
        Ok(Self::new(SecretsStore::discover()?, EnvSource::from_process()))
    }

    /// Resolver with no secrets and no environment variables
    pub fn empty() -> Self {
        Self::new(SecretsStore::empty(), EnvSource::Fixed(Vec::new()))
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn with_secrets_section(mut self, section: impl Into<String>) -> Self {
        self.secrets_section = section.into();
        self
    }

    pub fn secrets(&self) -> &SecretsStore {
        &self.secrets
    }

    /// Produce the effective configuration.
    ///
    /// Precedence, lowest first: `explicit`, secrets, environment. Empty
    /// sources yield an all-absent configuration.
    #[tracing::instrument(skip(self, explicit), fields(explicit = explicit.is_some()))]
    pub fn resolve(&self, explicit: Option<SnowflakeConfig>) -> Result<SnowflakeConfig> {
        let mut resolved = explicit.unwrap_or_default();

        if let Some(from_secrets) = load_from_secrets(&self.secrets, &self.secrets_section)? {
            tracing::debug!(section = %self.secrets_section, "applying secrets");
            resolved.merge_from(&from_secrets);
        }

        let from_env = load_from_env(&self.env, &self.env_prefix)?;
        resolved.merge_from(&from_env);

        tracing::debug!(fingerprint = %resolved.fingerprint(), "resolved connection configuration");
        Ok(resolved)
    }
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::empty()
    }
}
