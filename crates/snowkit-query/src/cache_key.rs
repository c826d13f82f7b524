//! Canonical cache keys

use snowkit_core::{QueryParams, Result};

/// Identity of a read: SQL text plus bind parameters.
///
/// Parameters are sorted by name and their values serialised, so insertion
/// order does not matter. No parameters and an empty parameter map give the
/// same key. An optional scope separates reads issued against different
/// configurations that share one cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    scope: String,
    sql: String,
    params: Vec<(String, String)>,
}

impl CacheKey {
    pub fn new(sql: &str, params: Option<&QueryParams>) -> Result<Self> {
        let params = match params {
            Some(params) => params.normalized()?,
            None => Vec::new(),
        };
        Ok(Self {
            scope: String::new(),
            sql: sql.to_string(),
            params,
        })
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }
}
