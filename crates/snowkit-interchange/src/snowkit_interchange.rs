//! Moving tables into the warehouse
//!
//! Two paths are provided:
//!
//! - [`write_table`] - bulk load into a warehouse table, optionally truncating first
//! - [`stage_table`] - serialise to CSV and upload the file to a stage
//!
//! Both borrow a [`ConnectionManager`](snowkit_connection::ConnectionManager)
//! and go through its current session handle.

mod csv;
mod stage;
mod writer;

#[cfg(test)]
mod test_support;

pub use csv::{CsvOptions, to_csv};
pub use stage::{Compression, FileFormat, StageOptions, stage_table};
pub use writer::{WriteOptions, write_table};
