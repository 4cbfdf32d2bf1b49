use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use shift_metrics::{AggregationSettings, SettingsCell, Snapshot};

/// Holds the most recent snapshot. Readers get a whole pass or the previous one.
pub struct SnapshotCell {
    latest: RwLock<Arc<Snapshot>>,
}

impl SnapshotCell {
    pub fn new(initial: Snapshot) -> Self {
        SnapshotCell {
            latest: RwLock::new(Arc::new(initial)),
        }
    }

    pub fn latest(&self) -> Arc<Snapshot> {
        Arc::clone(&self.latest.read().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn replace(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(snapshot);
        *self.latest.write().unwrap_or_else(|e| e.into_inner()) = Arc::clone(&snapshot);
        snapshot
    }
}

pub struct AppState {
    pub settings: SettingsCell,
    pub snapshot: SnapshotCell,
    pub settings_path: PathBuf,
}

impl AppState {
    pub fn new(settings: AggregationSettings, settings_path: PathBuf) -> Self {
        AppState {
            settings: SettingsCell::new(settings),
            snapshot: SnapshotCell::new(Snapshot::empty(settings)),
            settings_path,
        }
    }
}
