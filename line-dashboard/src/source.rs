//! Where each pass reads its raw records from.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::de::DeserializeOwned;
use shift_metrics::{RawCountRecord, RawInventoryRecord, Stage};
use tracing::{debug, warn};

use crate::config::{EVENTS_EXTENSION, INVENTORY_FILE};

/// Records returned by one fetch, plus lines that could not be decoded at all.
#[derive(Debug, Clone)]
pub struct Fetched<T> {
    pub records: Vec<T>,
    pub unreadable: usize,
}

pub trait EventSource: Send + Sync {
    /// Every count record currently available for `stage`.
    fn fetch_counts(&self, stage: Stage) -> impl Future<Output = anyhow::Result<Fetched<RawCountRecord>>> + Send;

    fn fetch_inventory(&self) -> impl Future<Output = anyhow::Result<Fetched<RawInventoryRecord>>> + Send;
}

/// Reads `<dir>/<stage>.jsonl` and `<dir>/inventory.jsonl`, one JSON object per line.
pub struct JsonlDirSource {
    dir: PathBuf,
}

impl JsonlDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        JsonlDirSource { dir: dir.into() }
    }

    fn stage_path(&self, stage: Stage) -> PathBuf {
        self.dir.join(format!("{stage}.{EVENTS_EXTENSION}"))
    }
}

impl EventSource for JsonlDirSource {
    async fn fetch_counts(&self, stage: Stage) -> anyhow::Result<Fetched<RawCountRecord>> {
        read_jsonl(&self.stage_path(stage)).await
    }

    async fn fetch_inventory(&self) -> anyhow::Result<Fetched<RawInventoryRecord>> {
        read_jsonl(&self.dir.join(INVENTORY_FILE)).await
    }
}

/// A missing file is an empty batch, not an error.
async fn read_jsonl<T: DeserializeOwned + Send>(path: &Path) -> anyhow::Result<Fetched<T>> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no event file yet");
            return Ok(Fetched {
                records: Vec::new(),
                unreadable: 0,
            });
        }
        Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
    };

    let mut fetched = Fetched {
        records: Vec::new(),
        unreadable: 0,
    };
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(record) => fetched.records.push(record),
            Err(e) => {
                warn!(path = %path.display(), line = index + 1, error = %e, "skipping undecodable line");
                fetched.unreadable += 1;
            }
        }
    }
    Ok(fetched)
}
