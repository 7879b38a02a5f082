use anyhow::Context;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod key;
mod resolver;
mod routes;
mod store;
mod utils;
mod weather;

use config::Config;
use resolver::CacheAside;
use routes::{create_router, AppState, RetryPolicy};
use store::RedisStore;
use weather::VisualCrossingClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A .env file is optional; real deployments set the environment directly.
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "weather_cache_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Invalid configuration")?;
    tracing::debug!(?config, "Loaded configuration");

    // The store must be reachable at boot even though later outages are tolerated.
    let store = tokio::time::timeout(config.store_timeout * 10, RedisStore::connect(&config.redis_url))
        .await
        .context("Timed out connecting to Redis")?
        .context("Could not connect to Redis")?;
    tracing::info!("Connected to Redis");

    let origin = VisualCrossingClient::new(&config).context("Failed to create HTTP client")?;

    let resolver = CacheAside::new(
        Arc::new(store),
        Arc::new(origin),
        config.cache_ttl,
        config.store_timeout,
    );

    let state = AppState {
        resolver: Arc::new(resolver),
        retry: RetryPolicy {
            max_retries: config.origin_max_retries,
            base_delay: config.origin_retry_base,
            deadline: config.request_timeout,
        },
    };

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    tracing::info!("Server starting on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
