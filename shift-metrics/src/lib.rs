//! Shift-relative aggregation of production-line count events.
//!
//! Every entry point is a pure function of an event batch, a shift-boundary
//! configuration and a bucket width; nothing here performs I/O.

use std::time::Duration;

pub mod aggregator;
pub mod bucketer;
pub mod error;
pub mod event;
pub mod inventory;
pub mod loss;
pub mod rate;
pub mod settings;
pub mod shift_clock;
pub mod snapshot;

pub use aggregator::{AggregateReport, ShiftTotals, aggregate, aggregate_batch};
pub use bucketer::{Anchor, AnchorMode, Bucket, BucketSeries, BucketWidth, bucket};
pub use error::{ConfigError, MalformedEvent};
pub use event::{CountEvent, EventBatch, RawCountRecord, Shift, Stage};
pub use inventory::{InventoryItem, RawInventoryRecord};
pub use loss::{LossReport, loss};
pub use rate::{Rate, RateStrategy, RateUnit, rate};
pub use settings::{AggregationSettings, SettingsCell, SettingsUpdate};
pub use shift_clock::{ProductionDay, ShiftBoundaryConfig, ShiftClock, ShiftPosition};
pub use snapshot::{CycleInput, Snapshot, StageSnapshot};

pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Trailing window used when none is configured.
pub const DEFAULT_TRAILING_WINDOW: Duration = Duration::from_secs(60);
