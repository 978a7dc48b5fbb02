//! ranked-channel HTTP server binary

use ranked_channel::server::run_server;
use ranked_channel::{HttpExtractor, SessionEngine, Settings, SqliteStore};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_level(true)
        .init();

    let settings = Settings::from_env()?;
    info!("ranked-channel server v{}", env!("CARGO_PKG_VERSION"));
    info!("Store: {}", settings.db_path);
    info!(
        "Ranking: w_related={} w_sim={} w_div={} w_novelty={} T={} top_m={}",
        settings.w_related,
        settings.w_sim,
        settings.w_div,
        settings.w_novelty,
        settings.temperature,
        settings.sample_top_m
    );

    let store = Arc::new(SqliteStore::open(&settings.db_path)?);
    let extractor = Arc::new(HttpExtractor::new(&settings)?);
    let addr = settings.bind_addr.clone();
    let engine = SessionEngine::new(store, extractor, settings);

    run_server(engine, &addr).await?;

    Ok(())
}
