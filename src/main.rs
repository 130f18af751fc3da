use pooled_conn::{ConnectionFactory, DatabaseConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = DatabaseConfig::from_env()?;
    let factory = ConnectionFactory::connect(&config).await?;

    {
        // Two call sites on this thread end up on one physical connection.
        let outer = factory.connection().await?;
        let inner = factory.connection().await?;

        let one: i32 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&mut **outer.borrow_mut()?)
            .await?;
        let two: i32 = sqlx::query_scalar("SELECT 2")
            .fetch_one(&mut **inner.borrow_mut()?)
            .await?;

        tracing::info!(
            one,
            two,
            shared = outer.same_connection(&inner),
            ref_count = inner.ref_count(),
            "Queries completed"
        );
    }

    factory.shutdown().await?;
    Ok(())
}
