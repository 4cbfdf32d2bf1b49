//! Fixed-width time buckets over a 24h cycle, for plotting.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::MINUTES_PER_DAY;
use crate::error::ConfigError;
use crate::event::{CountEvent, Shift};
use crate::shift_clock::{ShiftBoundaryConfig, ShiftClock, format_minute};

/// Supported bucket widths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum BucketWidth {
    Min15,
    Min30,
    #[default]
    Min60,
    Min120,
}

impl BucketWidth {
    pub fn minutes(&self) -> u32 {
        match self {
            BucketWidth::Min15 => 15,
            BucketWidth::Min30 => 30,
            BucketWidth::Min60 => 60,
            BucketWidth::Min120 => 120,
        }
    }

    /// Number of buckets covering a full day.
    pub fn bucket_count(&self) -> usize {
        (MINUTES_PER_DAY / self.minutes()) as usize
    }
}

impl TryFrom<u32> for BucketWidth {
    type Error = ConfigError;

    fn try_from(minutes: u32) -> Result<Self, Self::Error> {
        match minutes {
            15 => Ok(BucketWidth::Min15),
            30 => Ok(BucketWidth::Min30),
            60 => Ok(BucketWidth::Min60),
            120 => Ok(BucketWidth::Min120),
            other => Err(ConfigError::BucketWidth(other)),
        }
    }
}

impl From<BucketWidth> for u32 {
    fn from(width: BucketWidth) -> Self {
        width.minutes()
    }
}

impl fmt::Display for BucketWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}m", self.minutes())
    }
}

/// Where bucket 0 starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    /// Minute 0 of the calendar day.
    CalendarDay,
    /// The start minute of the given shift; times before it wrap to the next day.
    ShiftStart(Shift),
}

impl Anchor {
    pub fn start_minute(&self, config: &ShiftBoundaryConfig) -> u32 {
        match self {
            Anchor::CalendarDay => 0,
            Anchor::ShiftStart(shift) => config.start_minute(*shift),
        }
    }
}

/// Anchoring as configured, before the active shift is known.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorMode {
    CalendarDay,
    #[default]
    ShiftStart,
}

impl AnchorMode {
    /// Resolves shift anchoring against the shift active at `now`.
    pub fn resolve(&self, clock: &ShiftClock, now: DateTime<Utc>) -> Anchor {
        match self {
            AnchorMode::CalendarDay => Anchor::CalendarDay,
            AnchorMode::ShiftStart => Anchor::ShiftStart(clock.shift_of(now).shift),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bucket {
    pub index: usize,
    pub window_start_offset_minutes: u32,
    pub count: u64,
    /// Wall-clock `HH:MM` at which the bucket starts.
    pub label: String,
}

/// An ordered run of buckets covering one 24h cycle from the anchor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketSeries {
    pub width: BucketWidth,
    pub anchor: Anchor,
    pub anchor_minute: u32,
    pub buckets: Vec<Bucket>,
}

impl BucketSeries {
    pub fn labels(&self) -> Vec<&str> {
        self.buckets.iter().map(|b| b.label.as_str()).collect()
    }

    pub fn counts(&self) -> Vec<u64> {
        self.buckets.iter().map(|b| b.count).collect()
    }

    pub fn total(&self) -> u64 {
        self.buckets.iter().fold(0u64, |acc, b| acc.saturating_add(b.count))
    }

    /// Offset in minutes of a wall-clock minute from the anchor, wrapping past midnight.
    pub fn offset_of(&self, minute_of_day: u32) -> u32 {
        wrapped_offset(minute_of_day, self.anchor_minute)
    }

    /// The buckets spanning the anchored shift only.
    ///
    /// Calendar-day series are returned whole.
    pub fn within_shift(&self, config: &ShiftBoundaryConfig) -> &[Bucket] {
        match self.anchor {
            Anchor::CalendarDay => &self.buckets,
            Anchor::ShiftStart(shift) => {
                let len = config.shift_length(shift).div_ceil(self.width.minutes()) as usize;
                &self.buckets[..len.min(self.buckets.len())]
            }
        }
    }

    /// The buckets that have started by `now`, the partial current one included.
    pub fn elapsed(&self, clock: &ShiftClock, now: DateTime<Utc>) -> &[Bucket] {
        let offset = self.offset_of(clock.minute_of_day(now));
        let len = offset.div_ceil(self.width.minutes()) as usize;
        &self.buckets[..len.min(self.buckets.len())]
    }
}

fn wrapped_offset(minute_of_day: u32, anchor_minute: u32) -> u32 {
    let minute = if minute_of_day < anchor_minute {
        minute_of_day + MINUTES_PER_DAY
    } else {
        minute_of_day
    };
    minute - anchor_minute
}

/// Sums event counts into `1440 / width` buckets starting at `anchor`.
///
/// Events whose index falls outside the series are dropped.
pub fn bucket<'a, I>(events: I, width: BucketWidth, anchor: Anchor, clock: &ShiftClock) -> BucketSeries
where
    I: IntoIterator<Item = &'a CountEvent>,
{
    let anchor_minute = anchor.start_minute(clock.config());
    let step = width.minutes();
    let mut buckets: Vec<Bucket> = (0..width.bucket_count())
        .map(|index| {
            let offset = index as u32 * step;
            Bucket {
                index,
                window_start_offset_minutes: offset,
                count: 0,
                label: format_minute(anchor_minute + offset),
            }
        })
        .collect();

    for event in events {
        let offset = wrapped_offset(clock.minute_of_day(event.timestamp), anchor_minute);
        let idx = (offset / step) as usize;
        match buckets.get_mut(idx) {
            Some(b) => b.count = b.count.saturating_add(event.count),
            None => debug!(idx, timestamp = %event.timestamp, "event outside bucket range"),
        }
    }

    BucketSeries {
        width,
        anchor,
        anchor_minute,
        buckets,
    }
}
