//! Pooled PostgreSQL connection factory with per-thread connection sharing.

pub mod config;
pub mod db;
pub mod error;

pub use config::DatabaseConfig;
pub use db::{ConnectionFactory, ConnectionSource, PoolSettings, SharedConnection};
pub use error::{FactoryError, FactoryResult};
