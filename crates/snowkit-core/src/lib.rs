//! Snowkit Core - Shared abstractions for the warehouse convenience layer
//!
//! This crate provides the types and traits every other snowkit crate
//! depends on:
//!
//! - `WarehouseDriver` - Trait for connector adapters that open sessions
//! - `Connection` - Trait for a live warehouse session handle
//! - `Cursor` - Trait for reading the results of an executed statement
//! - Common types like `Value`, `Row`, `Table`, `QueryParams`

mod connection;
mod driver;
mod error;
mod params;
mod types;

pub use connection::*;
pub use driver::*;
pub use error::*;
pub use params::*;
pub use types::*;
