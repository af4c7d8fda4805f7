use std::sync::Arc;

use anyhow::{Context, Result};
use simtani_core::VerificationPolicy;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use simtani_server::{
    router, AppState, Config, InMemoryStore, RegistryStore, SqliteStore, StorageBackend,
    SystemClock,
};

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting farmer group registry");

    let config = Config::from_env().context("failed to load configuration")?;

    let store: Arc<dyn RegistryStore> = match config.storage {
        StorageBackend::Sqlite => {
            let db_path = config.database_path();
            info!("Using registry database: {}", db_path.display());
            Arc::new(
                SqliteStore::new(&db_path)
                    .with_context(|| format!("failed to open {}", db_path.display()))?,
            )
        }
        StorageBackend::Memory => {
            info!("Using in-memory registry; data is lost on shutdown");
            Arc::new(InMemoryStore::new())
        }
    };

    let policy = VerificationPolicy {
        allow_reverification: config.allow_reverification,
    };
    info!(
        allow_reverification = policy.allow_reverification,
        "Verification policy loaded"
    );

    let state = AppState::new(store, Arc::new(SystemClock), policy);
    let app = router(state);

    let listener = TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    info!("Server listening on port {}", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
