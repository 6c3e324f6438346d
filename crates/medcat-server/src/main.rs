//! MedCat Server - Main entry point

use anyhow::Result;
use medcat_common::logging::{init_logging, LogConfig};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::signal;
use tracing::info;

use medcat_server::{
    api,
    config::{Config, StoreBackend},
    db::{self, DbConfig},
    extraction::{EntityParser, KeywordEntityParser},
    features::FeatureState,
    provider::{DatasetProvider, DisabledProvider, KaggleClient},
    store::{CatalogStore, InMemoryStore, PgCatalogStore},
};

#[tokio::main]
async fn main() -> Result<()> {
    // .env must be loaded before the logging variables are read
    dotenvy::dotenv().ok();

    // Environment variables take precedence over these defaults
    let log_config = LogConfig::builder()
        .log_file_prefix("medcat-server")
        .filter_directives("medcat_server=debug,tower_http=debug,sqlx=warn")
        .build()
        .merge_env()?;

    let _log_guard = init_logging(&log_config)?;

    info!("Starting MedCat Server");

    let config = Config::load()?;
    info!(
        "Configuration loaded - server will bind to {}:{}",
        config.server.host, config.server.port
    );

    let store = build_store(&config).await?;
    let provider = build_provider(&config)?;
    let parser: Arc<dyn EntityParser> = Arc::new(KeywordEntityParser::new()?);

    let state = FeatureState::new(store, provider, parser);
    let app = api::create_router(state, &config.cors);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(config.server.shutdown_timeout_secs))
        .await?;

    info!("Server shut down gracefully");

    Ok(())
}

async fn build_store(config: &Config) -> Result<Arc<dyn CatalogStore>> {
    match config.store {
        StoreBackend::Postgres => {
            let pool = db::create_pool(&DbConfig::from(&config.database)).await?;
            db::migrate(&pool).await?;
            Ok(Arc::new(PgCatalogStore::new(pool)))
        },
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory catalog store, data is lost on shutdown");
            Ok(Arc::new(InMemoryStore::new()))
        },
    }
}

fn build_provider(config: &Config) -> Result<Arc<dyn DatasetProvider>> {
    if !config.provider.enabled {
        info!("External provider disabled (PROVIDER_ENABLED=false)");
        return Ok(Arc::new(DisabledProvider));
    }

    let client = KaggleClient::new(&config.provider)?;
    info!(base_url = client.base_url(), "External provider client initialized");
    Ok(Arc::new(client))
}

/// Graceful shutdown signal handler
async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }

    info!("Waiting up to {} seconds for connections to close", timeout_secs);
    tokio::time::sleep(Duration::from_secs(timeout_secs.min(5))).await;
}
