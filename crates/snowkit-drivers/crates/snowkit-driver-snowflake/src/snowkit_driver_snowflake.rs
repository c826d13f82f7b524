//! Snowflake driver for snowkit
//!
//! Talks to the Snowflake SQL API (`/api/v2/statements`) over HTTPS with a
//! bearer token (OAuth, programmatic access token or a pre-signed key-pair
//! JWT). Named `:param` placeholders are rewritten to positional bindings.
//!
//! The SQL API has no file transfer endpoint, so streaming uploads and `PUT`
//! are not available through this driver.

mod binding;
mod bulk;
mod connection;
mod convert;
mod driver;
#[cfg(test)]
mod driver_tests;

pub use binding::{rewrite_named_placeholders, Binding};
pub use connection::{SnowflakeConnection, SnowflakeCursor};
pub use convert::convert_cell;
pub use driver::*;
