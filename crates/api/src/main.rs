//! API server entry point.

use std::error::Error;

use api::config::{Config, LogFormat};
use metrics_exporter_prometheus::PrometheusHandle;
use reservation::PendingHoldSweeper;
use seat_store::{InMemoryReservationStore, PostgresReservationStore, ReservationStore};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn serve<S: ReservationStore + Clone + 'static>(
    store: S,
    config: Config,
    metrics_handle: PrometheusHandle,
    seed_demo: bool,
) -> Result<(), Box<dyn Error>> {
    let (state, collaborators) = api::create_default_state(store.clone(), &config)?;

    if seed_demo {
        api::demo::seed(&store, &collaborators.catalog).await?;
    }

    if let Some(ttl) = config.pending_hold_ttl {
        let sweeper = PendingHoldSweeper::new(state.coordinator.clone(), ttl)?;
        tracing::info!(
            ttl_secs = ttl.as_secs(),
            every_secs = config.hold_sweep_interval.as_secs(),
            "pending hold expiry enabled"
        );
        tokio::spawn(sweeper.run(config.hold_sweep_interval));
    }

    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, claim_timing = %config.claim_timing, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shut down gracefully");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env();
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    // 3. Pick the store and serve
    match config.database_url.clone() {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.db_pool_size)
                .connect(&url)
                .await?;
            let store = PostgresReservationStore::new(pool);
            store.run_migrations().await?;
            tracing::info!("using PostgreSQL reservation store");
            serve(store, config, metrics_handle, false).await
        }
        None => {
            tracing::info!("using in-memory reservation store");
            let seed_demo = config.seed_demo_catalog;
            serve(InMemoryReservationStore::new(), config, metrics_handle, seed_demo).await
        }
    }
}
