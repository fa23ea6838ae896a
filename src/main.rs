//! Reddit Sentiment Exporter — Binary Entrypoint
//! Boots the Axum HTTP server, wiring routes, shared state, and middleware.

mod api;
mod batch;
mod config;
mod error;
mod export;
mod metrics;
mod normalize;
mod reddit;
mod sentiment;

use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::api::AppState;
use crate::config::AppConfig;
use crate::metrics::Metrics;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("reddit_sentiment_exporter=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = AppConfig::from_env();
    let metrics = Metrics::init(&config);

    let state = AppState::production(config.clone());

    // Parse the embedded lexicon up front; a broken asset should fail the
    // boot, not the first scrape.
    let lexicon_entries = state.classifier.warm_up();
    info!(
        lexicon_entries,
        classifier = config::CLASSIFIER_ID,
        "sentiment classifier ready"
    );

    let app = api::router(state).merge(metrics.router());

    info!(addr = %config.bind_addr, "starting server");
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
