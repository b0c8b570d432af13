use jobdoctor::analysis::default_registry;
use jobdoctor::api;
use jobdoctor::config;
use jobdoctor::db;
use jobdoctor::jobs::{HttpJobSource, Poller};
use jobdoctor::reports::PgReportStore;

use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod shutdown;
use shutdown::install_shutdown_handler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = config::Config::from_env()?;
    let poller_cfg = cfg.poller();
    let api_addr = cfg.admin_addr.clone();

    tracing::info!(
        source = %cfg.source_url,
        interval_secs = cfg.poll_interval.as_secs(),
        name_max_len = cfg.name_max_len,
        analysis_concurrency = cfg.analysis_concurrency,
        admin = api_addr.as_deref().unwrap_or("disabled"),
        migrate_on_startup = cfg.migrate_on_startup,
        "jobdoctor starting"
    );

    let pool = db::make_pool(&cfg.database_url, &cfg.pool).await?;
    if cfg.migrate_on_startup {
        db::run_migrations(&pool).await?;
    }

    let store = Arc::new(PgReportStore::new(pool.clone()));
    let source = Arc::new(HttpJobSource::new(&cfg.source_url, cfg.source_timeout)?);
    let registry = default_registry();
    tracing::info!(heuristics = ?registry.names(), "heuristics loaded");

    let shutdown = install_shutdown_handler();
    let poller = Poller::new(source, registry, store.clone(), poller_cfg)
        .with_shutdown(shutdown.clone());
    let handle = poller.handle();

    // ---- Admin API task ----
    // bound before anything is spawned: a busy port fails startup
    let listener = api::bind(api_addr.as_deref()).await?;
    let app = api::router(api::ApiState {
        store,
        poller: handle.clone(),
    });
    let api_shutdown = shutdown.clone();
    let api_handle = tokio::spawn(async move {
        let Some(listener) = listener else {
            return;
        };
        match listener.local_addr() {
            Ok(addr) => tracing::info!("admin api listening on http://{addr}"),
            Err(e) => tracing::warn!(error = %e, "admin api listening on unknown address"),
        }
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async move { api_shutdown.cancelled().await })
            .await;
        if let Err(e) = served {
            tracing::error!(error = %e, "admin api stopped serving");
        }
    });

    // ---- Poller task ----
    let poller_handle = tokio::spawn(poller.run());

    let result = poller_handle.await?;
    // a fatal poller error also brings the admin API down
    handle.stop();
    api_handle.await?;

    result?;
    tracing::info!("jobdoctor exited cleanly");
    Ok(())
}
