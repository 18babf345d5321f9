mod api;
mod catalog_store;
mod middleware;
mod password;
mod scrape;
mod session;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, default_rate_limit_state, AppState},
    catalog_store::PgCatalogStore,
    scrape::{ScrapeCache, ScrapeService},
    session::SessionKey,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = shopcat_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = shopcat_db::PoolConfig::from_app_config(&config);
    let pool = shopcat_db::connect_pool(&config.database_url, pool_config).await?;
    let applied = shopcat_db::run_migrations(&pool).await?;
    tracing::info!(applied, "migrations up to date");

    let sessions = SessionKey::new(&config.session_secret)
        .map_err(|e| anyhow::anyhow!("invalid SESSION_SECRET: {e}"))?;
    let client = shopcat_scraper::ShopifyClient::new(
        config.scraper_request_timeout_secs,
        &config.scraper_user_agent,
    )
    .context("failed to build storefront client")?;
    let cache = ScrapeCache::new(
        Duration::from_secs(config.scrape_cache_ttl_secs),
        config.scrape_cache_max_entries,
    );
    let scrapes = Arc::new(ScrapeService::new(
        client,
        Arc::new(PgCatalogStore::new(pool.clone())),
        cache,
    ));

    let state = AppState {
        pool,
        scrapes,
        sessions,
        secure_cookies: !config.is_development(),
    };
    let app = build_app(state, default_rate_limit_state());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
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
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
