use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use scripthub_api::config::ServerConfig;
use scripthub_api::router::build_app_router;
use scripthub_api::service::CommandService;
use scripthub_api::state::AppState;
use scripthub_core::store::CommandStore;
use scripthub_db::store::PgCommandStore;
use scripthub_engine::Engine;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "scripthub_api=debug,scripthub_engine=debug,tower_http=debug";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ServerConfig::from_env().context("Invalid configuration")?;
    tracing::info!(
        host = %config.host,
        port = config.port,
        workers = config.worker_count,
        queue_capacity = config.queue_capacity,
        "Loaded server configuration",
    );

    let pool = scripthub_db::create_pool(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connection pool created");

    scripthub_db::health_check(&pool)
        .await
        .context("Database health check failed")?;

    scripthub_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    let store: Arc<dyn CommandStore> = Arc::new(PgCommandStore::new(pool.clone()));
    let engine = Arc::new(
        Engine::start(config.engine_config(), Arc::clone(&store))
            .context("Failed to start execution engine")?,
    );

    let state = AppState {
        pool: Some(pool.clone()),
        store: Arc::clone(&store),
        commands: Arc::new(CommandService::new(store, Arc::clone(&engine))),
        config: Arc::new(config.clone()),
    };
    let app = build_app_router(state, &config);

    let host = config
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

    tracing::info!("Server stopped accepting connections, cleaning up");

    let report = engine.shutdown(config.shutdown_timeout()).await;
    tracing::info!(
        drained = report.drained,
        discarded = report.discarded,
        force_cancelled = report.force_cancelled,
        "Execution engine shut down",
    );

    pool.close().await;
    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Install the global subscriber. `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Resolve on Ctrl-C or SIGTERM.
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
