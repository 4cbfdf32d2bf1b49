use std::sync::Arc;

use axum::Router;
use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use serde::Serialize;
use shift_metrics::{SettingsUpdate, Snapshot, Stage, StageSnapshot};
use tracing::warn;

use crate::line_settings;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/snapshot", get(get_snapshot))
        .route("/api/stages/{stage}", get(get_stage))
        .route("/api/settings", get(get_settings).put(put_settings))
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    error: String,
}

pub async fn get_snapshot(State(state): State<Arc<AppState>>) -> Json<Arc<Snapshot>> {
    Json(state.snapshot.latest())
}

pub async fn get_stage(
    State(state): State<Arc<AppState>>,
    Path(stage): Path<Stage>,
) -> Result<Json<StageSnapshot>, StatusCode> {
    state
        .snapshot
        .latest()
        .stages
        .get(&stage)
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

pub async fn get_settings(State(state): State<Arc<AppState>>) -> Json<SettingsUpdate> {
    Json(state.settings.current().into())
}

/// Applies new settings from the next pass on. Invalid settings are rejected
/// with 400 and the previous ones stay in effect.
pub async fn put_settings(
    State(state): State<Arc<AppState>>,
    Json(update): Json<SettingsUpdate>,
) -> Result<Json<SettingsUpdate>, (StatusCode, Json<ErrorResponse>)> {
    let applied = state.settings.validate_and_apply(update).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
    })?;

    if let Err(e) = line_settings::save(&state.settings_path, &applied) {
        warn!(path = %state.settings_path.display(), error = %e, "failed to persist line settings");
    }
    Ok(Json(applied.into()))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use shift_metrics::{AggregationSettings, AnchorMode, CountEvent, CycleInput, EventBatch, RateStrategy};

    use super::*;

    fn state_in(dir: &tempfile::TempDir) -> Arc<AppState> {
        Arc::new(AppState::new(
            AggregationSettings::default(),
            dir.path().join("line.toml"),
        ))
    }

    fn update(s1: &str, s2: &str) -> SettingsUpdate {
        SettingsUpdate {
            shift1_start: s1.to_owned(),
            shift2_start: s2.to_owned(),
            utc_offset_minutes: 0,
            bucket_width_minutes: 30,
            anchor: AnchorMode::ShiftStart,
            rate: RateStrategy::ElapsedShift,
        }
    }

    #[tokio::test]
    async fn test_put_settings_applies_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(&dir);

        let Json(applied) = put_settings(State(Arc::clone(&state)), Json(update("07:00", "19:00")))
            .await
            .unwrap();
        assert_eq!(applied.shift1_start, "07:00");

        let Json(current) = get_settings(State(Arc::clone(&state))).await;
        assert_eq!(current, applied);
        assert_eq!(
            line_settings::load(&state.settings_path).unwrap(),
            state.settings.current()
        );
    }

    #[tokio::test]
    async fn test_put_settings_rejects_coinciding_boundaries() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(&dir);
        let before = state.settings.current();

        let (status, Json(body)) = put_settings(State(Arc::clone(&state)), Json(update("09:00", "09:00")))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!body.error.is_empty());
        assert_eq!(state.settings.current(), before);
        assert!(!state.settings_path.exists());
    }

    #[tokio::test]
    async fn test_stage_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(&dir);
        assert_eq!(
            get_stage(State(Arc::clone(&state)), Path(Stage::Capper)).await.unwrap_err(),
            StatusCode::NOT_FOUND
        );

        let settings = state.settings.current();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let batch = EventBatch::new(vec![CountEvent::new(now, 4, Stage::Capper)]);
        state.snapshot.replace(Snapshot::compute(&CycleInput {
            now,
            settings: &settings,
            batch: &batch,
            stages: &[Stage::Capper],
            inventory: &[],
        }));

        let Json(stage) = get_stage(State(Arc::clone(&state)), Path(Stage::Capper)).await.unwrap();
        assert_eq!(stage.totals.total(), 4);
        let Json(snapshot) = get_snapshot(State(state)).await;
        assert_eq!(snapshot.computed_at, Some(now));
    }
}
