use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Pool, Postgres};

use crate::error::FactoryResult;

/// The pool a [`ConnectionFactory`](super::ConnectionFactory) draws from.
///
/// Sizing, eviction, validation and acquire timeouts all live behind this
/// trait. A connection goes back to the pool when it is dropped.
#[cfg_attr(test, mockall::automock(type Connection = u32;))]
#[async_trait]
pub trait ConnectionSource: Send + Sync + 'static {
    type Connection: Send + 'static;

    /// Check a connection out of the pool
    async fn acquire(&self) -> FactoryResult<Self::Connection>;

    /// Shut the pool down. Later acquires fail.
    async fn close(&self);

    fn is_closed(&self) -> bool;
}

#[async_trait]
impl ConnectionSource for PgPool {
    type Connection = PoolConnection<Postgres>;

    async fn acquire(&self) -> FactoryResult<Self::Connection> {
        Ok(Pool::acquire(self).await?)
    }

    async fn close(&self) {
        Pool::close(self).await
    }

    fn is_closed(&self) -> bool {
        Pool::is_closed(self)
    }
}
