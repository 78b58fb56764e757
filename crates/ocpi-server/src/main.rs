//! OCPI Credentials Plane Server Binary

use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use ocpi_bridge::PeerClient;
use ocpi_server::{create_router, AppState, MemoryStore, OcpiStore, ServerConfig};

#[tokio::main]
async fn main() {
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {}", e);
            std::process::exit(2);
        }
    };

    // Initialize logging
    let log_level = config.log_level.parse().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    let store = open_store(&config).await;
    let client = Arc::new(PeerClient::new(config.negotiation_timeout));

    info!(
        party = %config.identity(),
        role = %config.role,
        public_url = %config.public_url,
        admin = config.admin_key.is_some(),
        "Starting OCPI credentials plane"
    );

    let state = Arc::new(AppState::new(config, store, client.clone(), client));
    let sweeper = state
        .bootstrap
        .clone()
        .spawn_sweeper(state.config.bootstrap_sweep_interval);

    let addr = format!("0.0.0.0:{}", state.config.port);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    info!(addr = %addr, "Credentials plane listening");

    axum::serve(listener, app)
        .await
        .expect("Server error");

    sweeper.abort();
}

#[cfg(feature = "postgres")]
async fn open_store(config: &ServerConfig) -> Arc<dyn OcpiStore> {
    match &config.database_url {
        Some(url) => Arc::new(
            ocpi_server::storage::PostgresStore::new(url)
                .await
                .expect("Failed to connect to PostgreSQL"),
        ),
        None => {
            info!("DATABASE_URL not set, using in-memory storage");
            Arc::new(MemoryStore::new())
        }
    }
}

#[cfg(not(feature = "postgres"))]
async fn open_store(_config: &ServerConfig) -> Arc<dyn OcpiStore> {
    Arc::new(MemoryStore::new())
}
