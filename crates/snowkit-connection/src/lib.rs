//! Snowkit Connection - Connection lifecycle management
//!
//! A [`ConnectionManager`] owns at most one session handle for one resolved
//! configuration. The handle is created on first use and replaced when it
//! reports itself stale. [`ManagerRegistry`] hands out one manager per
//! configuration fingerprint and tears them all down on shutdown.

mod factory;
mod manager;
mod registry;

pub use factory::{ConnectionFactory, DriverConnectionFactory};
pub use manager::{ConnectionManager, LivenessPolicy, ManagerStats};
pub use registry::ManagerRegistry;
