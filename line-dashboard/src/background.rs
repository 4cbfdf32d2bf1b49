use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use shift_metrics::inventory::normalize;
use shift_metrics::{CycleInput, EventBatch, Snapshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::cancellation::TickerHandle;
use crate::config::STAGES;
use crate::source::EventSource;
use crate::state::AppState;

/// Starts the periodic aggregation pass.
///
/// Overrunning ticks are skipped rather than queued, so passes never overlap.
pub fn spawn_aggregation_worker<S>(state: Arc<AppState>, source: S, period: Duration) -> TickerHandle
where
    S: EventSource + 'static,
{
    let (stop, mut token) = TickerHandle::channel();
    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("aggregation worker stopped");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = run_pass(&state, &source, Utc::now()).await {
                        warn!(error = %e, "aggregation pass failed, keeping previous snapshot");
                    }
                }
            }
        }
    });
    TickerHandle::new(stop, task)
}

/// Fetches every stage, computes a snapshot and publishes it.
///
/// Nothing is published unless every fetch succeeds.
pub async fn run_pass<S: EventSource>(
    state: &AppState,
    source: &S,
    now: DateTime<Utc>,
) -> anyhow::Result<Arc<Snapshot>> {
    let settings = state.settings.current();

    let mut batch = EventBatch::default();
    for stage in STAGES {
        let fetched = source
            .fetch_counts(stage)
            .await
            .with_context(|| format!("fetching {stage} counts"))?;
        let mut parsed = EventBatch::from_records(&fetched.records, settings.site_offset(), Some(stage));
        parsed.malformed += fetched.unreadable;
        batch.extend(parsed);
    }

    let fetched = source.fetch_inventory().await.context("fetching inventory")?;
    let (inventory, dropped) = normalize(&fetched.records);
    if dropped > 0 {
        debug!(dropped, "inventory records without a quantity");
    }

    let snapshot = Snapshot::compute(&CycleInput {
        now,
        settings: &settings,
        batch: &batch,
        stages: &STAGES,
        inventory: &inventory,
    });
    info!(
        events = batch.events.len(),
        malformed = snapshot.malformed,
        shift = ?snapshot.current_shift.map(|p| p.shift),
        "published snapshot"
    );
    Ok(state.snapshot.replace(snapshot))
}
