use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use sqlx::PgPool;

use super::postgres::{create_pool, PoolSettings};
use super::shared::{self, SharedConnection};
use super::source::ConnectionSource;
use crate::config::DatabaseConfig;
use crate::error::{FactoryError, FactoryResult};

static NEXT_FACTORY_ID: AtomicU64 = AtomicU64::new(1);

/// Hands out pooled connections, one shared physical connection per thread.
///
/// Every call to [`connection`](Self::connection) on a thread that already
/// holds a live handle from this factory returns another handle to the same
/// connection instead of checking out a new one.
pub struct ConnectionFactory<S: ConnectionSource = PgPool> {
    id: u64,
    source: S,
    closed: AtomicBool,
}

impl ConnectionFactory<PgPool> {
    /// Builds the pool described by `config` and connects to the server.
    pub async fn connect(config: &DatabaseConfig) -> FactoryResult<Self> {
        let settings = PoolSettings::from(config);

        match create_pool(&settings, &config.url).await {
            Ok(pool) => {
                tracing::info!(
                    max_connections = settings.max_connections,
                    min_idle = settings.min_idle,
                    catalog = ?settings.catalog,
                    "ConnectionFactory: Connected to database server"
                );
                Ok(Self::from_source(pool))
            }
            Err(e) => {
                tracing::error!(error = %e, "ConnectionFactory: Failed to init database connections");
                Err(e)
            }
        }
    }
}

impl<S: ConnectionSource> ConnectionFactory<S> {
    pub fn from_source(source: S) -> Self {
        Self {
            id: NEXT_FACTORY_ID.fetch_add(1, Ordering::Relaxed),
            source,
            closed: AtomicBool::new(false),
        }
    }

    /// Returns this thread's shared connection, checking one out of the pool
    /// if the thread holds none.
    pub async fn connection(&self) -> FactoryResult<SharedConnection<S::Connection>> {
        if self.is_shut_down() {
            return Err(FactoryError::Closed);
        }

        if let Some(shared) = self.reuse() {
            return Ok(shared);
        }

        let lock = shared::acquire_lock(self.id);
        let result = {
            let _guard = lock.lock().await;
            // A call site that held the lock before us may have checked one out.
            match self.reuse() {
                Some(shared) => Ok(shared),
                None => self.checkout().await,
            }
        };
        shared::release_acquire_lock(self.id, lock);

        result
    }

    fn reuse(&self) -> Option<SharedConnection<S::Connection>> {
        let shared = SharedConnection::current(self.id)?;
        tracing::debug!(
            factory_id = self.id,
            ref_count = shared.ref_count(),
            "Reusing thread-local connection"
        );
        Some(shared)
    }

    async fn checkout(&self) -> FactoryResult<SharedConnection<S::Connection>> {
        let connection = self.source.acquire().await?;
        let shared = SharedConnection::register(self.id, connection);
        tracing::debug!(factory_id = self.id, "Acquired connection from pool");
        Ok(shared)
    }

    /// The underlying pool
    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether the calling thread currently holds a connection from this factory
    pub fn thread_holds_connection(&self) -> bool {
        shared::thread_holds(self.id)
    }

    pub fn is_shut_down(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.source.is_closed()
    }

    /// Closes the pool.
    ///
    /// Closing waits for checked-out connections to come back, so it is
    /// refused with [`FactoryError::ConnectionHeld`] while the calling thread
    /// still holds a handle from this factory. The factory stays usable in
    /// that case.
    pub async fn shutdown(&self) -> FactoryResult<()> {
        if self.thread_holds_connection() {
            tracing::warn!(
                factory_id = self.id,
                "ConnectionFactory: Shutdown refused, calling thread holds a connection"
            );
            return Err(FactoryError::ConnectionHeld);
        }
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.source.close().await;
        tracing::info!(factory_id = self.id, "ConnectionFactory: Pool shut down");
        Ok(())
    }
}
