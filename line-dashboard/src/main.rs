use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::source::JsonlDirSource;
use crate::state::AppState;

mod background;
mod cancellation;
mod config;
mod line_settings;
mod routes;
mod source;
mod state;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    shared::init_tracing!()?;
    let env = shared::load_dashboard_env!()?;

    let settings = line_settings::load(&env.settings_path)
        .with_context(|| format!("loading line settings from {}", env.settings_path.display()))?;
    info!(
        boundaries = %settings.boundaries(),
        bucket_width = %settings.bucket_width(),
        "loaded line settings"
    );

    let state = Arc::new(AppState::new(settings, env.settings_path.clone()));
    let ticker = background::spawn_aggregation_worker(
        Arc::clone(&state),
        JsonlDirSource::new(env.events_dir.clone()),
        env.poll_interval,
    );

    let listener = TcpListener::bind(env.bind)
        .await
        .with_context(|| format!("failed to bind to {}", env.bind))?;
    info!(addr = %env.bind, events = %env.events_dir.display(), "serving line dashboard");
    axum::serve(listener, routes::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    ticker.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
    }
}
