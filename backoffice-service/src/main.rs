use anyhow::Context;
use backoffice_service::store::{MemoryStore, PgStore, Store};
use backoffice_service::{build_router, cors_layer, AppState, ServiceConfig, StoreBackend};
use common_money::{log_rounding_mode_once, set_rounding_mode};
use common_observability::BackofficeMetrics;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = ServiceConfig::from_env().context("invalid configuration")?;
    if !set_rounding_mode(config.pricing.rounding) {
        warn!("money rounding mode was resolved before configuration was loaded");
    }
    log_rounding_mode_once();
    info!(
        proration = config.pricing.proration.as_str(),
        profit_mode = config.pricing.profit_mode.as_str(),
        iva_rate = %config.pricing.iva_rate,
        "pricing configured"
    );

    let metrics = Arc::new(BackofficeMetrics::new().context("failed to register metrics")?);

    let store: Arc<dyn Store> = match config.store {
        StoreBackend::Postgres => {
            let database_url = config.database_url.as_deref().context("DATABASE_URL must be set")?;
            let pool = PgPool::connect(database_url).await.context("failed to connect to Postgres")?;
            sqlx::migrate!("./migrations").run(&pool).await.context("failed to run migrations")?;
            Arc::new(PgStore::new(pool))
        }
        StoreBackend::Memory => {
            warn!("using the in-memory store; records are lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let state = AppState::new(store, &config, metrics).context("invalid pricing configuration")?;
    state.jobs.spawn_sweeper(config.job_sweep_interval);

    let app = build_router(state).layer(cors_layer(&config.allowed_origins));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await.with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "starting backoffice-service");
    axum::serve(listener, app).await?;
    Ok(())
}
