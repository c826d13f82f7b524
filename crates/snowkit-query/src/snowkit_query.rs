//! Snowkit Query - Cached query execution
//!
//! [`QueryExecutor`] runs SQL through a connection manager and, when built
//! with a memoising [`CacheStrategy`], serves repeated reads of the same
//! statement and parameters from a [`ResultCache`] until their TTL lapses.

mod cache;
mod cache_key;
mod executor;
#[cfg(test)]
mod executor_tests;

pub use cache::{CacheStrategy, MemoryResultCache, ResultCache};
pub use cache_key::CacheKey;
pub use executor::{OutputFormat, QueryExecutor};
