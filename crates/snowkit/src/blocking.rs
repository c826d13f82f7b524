//! Synchronous wrappers for scripts and other non-async callers
//!
//! Every call blocks on the shared snowkit runtime. Calling these from
//! inside an async context panics; use the async methods on [`Snowkit`]
//! there instead.

use std::sync::Arc;

use snowkit_core::{BulkLoadOutcome, Connection, QueryParams, Result, Table};
use snowkit_drivers::block_on_tokio;
use snowkit_interchange::{StageOptions, WriteOptions};

use crate::app::{ConfigInput, ReadOptions, ReadResult, Snowkit};

/// Borrowed blocking view of a [`Snowkit`]
#[derive(Debug, Clone, Copy)]
pub struct Blocking<'a> {
    kit: &'a Snowkit,
}

impl Snowkit {
    pub fn blocking(&self) -> Blocking<'_> {
        Blocking { kit: self }
    }
}

impl<'a> Blocking<'a> {
    pub fn connect(&self, config: impl Into<ConfigInput>) -> Result<Arc<dyn Connection>> {
        block_on_tokio(self.kit.connect(config))
    }

    pub fn read_table(
        &self,
        sql: &str,
        params: Option<&QueryParams>,
        options: ReadOptions,
    ) -> Result<ReadResult> {
        block_on_tokio(self.kit.read_table(sql, params, options))
    }

    pub fn write_table(
        &self,
        table: &Table,
        options: &WriteOptions,
        config: impl Into<ConfigInput>,
    ) -> Result<BulkLoadOutcome> {
        block_on_tokio(self.kit.write_table(table, options, config))
    }

    pub fn stage_table(
        &self,
        table: &Table,
        options: &StageOptions,
        config: impl Into<ConfigInput>,
    ) -> Result<String> {
        block_on_tokio(self.kit.stage_table(table, options, config))
    }

    pub fn shutdown(&self) -> Result<()> {
        block_on_tokio(self.kit.shutdown())
    }
}
