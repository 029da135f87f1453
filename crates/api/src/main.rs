use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use peercode_core::memory::InMemorySessionStore;
use peercode_core::registry::SessionRegistry;
use peercode_core::store::SessionStoreRef;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use peercode_api::background::session_sweep;
use peercode_api::config::{ServerConfig, StoreBackend};
use peercode_api::router::build_app_router;
use peercode_api::state::AppState;

const DEFAULT_LOG_FILTER: &str =
    "peercode_api=debug,peercode_core=debug,peercode_db=debug,tower_http=debug";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    init_tracing();

    // --- Configuration ---
    let config = ServerConfig::from_env().context("Invalid configuration")?;
    tracing::info!(
        host = %config.host,
        port = config.port,
        ttl_secs = config.registry.ttl.num_seconds(),
        max_code_attempts = config.registry.max_code_attempts,
        "Loaded server configuration"
    );

    // --- Session store ---
    let store = connect_store(&config.store).await?;
    let registry = Arc::new(SessionRegistry::new(store, config.registry));

    // --- Housekeeping sweep ---
    let sweep_cancel = CancellationToken::new();
    let sweep_handle = config.sweep_interval.map(|interval| {
        tokio::spawn(session_sweep::run(
            Arc::clone(&registry),
            interval,
            sweep_cancel.clone(),
        ))
    });

    // --- Router ---
    let state = AppState { registry };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let host: IpAddr = config
        .host
        .parse()
        .with_context(|| format!("Invalid HOST address '{}'", config.host))?;
    let addr = SocketAddr::new(host, config.port);
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    sweep_cancel.cancel();
    if let Some(handle) = sweep_handle {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
        tracing::info!("Session sweep stopped");
    }

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the default filter; `LOG_FORMAT=json` switches to
/// JSON lines.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Build the configured session store, running migrations for PostgreSQL.
async fn connect_store(backend: &StoreBackend) -> anyhow::Result<SessionStoreRef> {
    match backend {
        StoreBackend::Postgres { database_url, pool } => {
            let pool = peercode_db::create_pool(database_url, *pool)
                .await
                .context("Failed to connect to database")?;
            tracing::info!("Database connection pool created");

            peercode_db::health_check(&pool)
                .await
                .context("Database health check failed")?;
            tracing::info!("Database health check passed");

            peercode_db::run_migrations(&pool)
                .await
                .context("Failed to run database migrations")?;
            tracing::info!("Database migrations applied");

            Ok(Arc::new(peercode_db::PgSessionStore::new(pool)))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory session store; sessions are lost on restart");
            Ok(Arc::new(InMemorySessionStore::new()))
        }
    }
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
