/// Connection factory errors
#[derive(thiserror::Error, Debug)]
pub enum FactoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Connection factory is shut down")]
    Closed,

    #[error("Connection is already borrowed by another call site on this thread")]
    ConnectionBusy,

    #[error("Cannot shut down while this thread still holds a pooled connection")]
    ConnectionHeld,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl FactoryError {
    /// Whether no connection could be handed out because the factory is shut
    /// down or the pool timed out or closed, rather than a database failure.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            FactoryError::Closed
                | FactoryError::Database(sqlx::Error::PoolTimedOut)
                | FactoryError::Database(sqlx::Error::PoolClosed)
        )
    }
}

pub type FactoryResult<T> = Result<T, FactoryError>;
