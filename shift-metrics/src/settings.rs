//! Validated aggregation settings and the cell that holds the current ones.

use std::sync::RwLock;

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::bucketer::{AnchorMode, BucketWidth};
use crate::error::ConfigError;
use crate::event::Shift;
use crate::rate::RateStrategy;
use crate::shift_clock::{ShiftBoundaryConfig, ShiftClock, site_offset};

/// Settings as supplied by the caller, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub shift1_start: String,
    pub shift2_start: String,
    #[serde(default)]
    pub utc_offset_minutes: i32,
    #[serde(default = "default_bucket_width")]
    pub bucket_width_minutes: u32,
    #[serde(default)]
    pub anchor: AnchorMode,
    #[serde(default)]
    pub rate: RateStrategy,
}

fn default_bucket_width() -> u32 {
    BucketWidth::default().minutes()
}

/// A validated, immutable set of aggregation settings.
///
/// One copy is taken per aggregation pass, so a concurrent update never
/// changes the configuration mid-computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SettingsUpdate", into = "SettingsUpdate")]
pub struct AggregationSettings {
    boundaries: ShiftBoundaryConfig,
    site_offset: FixedOffset,
    bucket_width: BucketWidth,
    anchor: AnchorMode,
    rate: RateStrategy,
}

impl AggregationSettings {
    pub fn new(boundaries: ShiftBoundaryConfig) -> Self {
        AggregationSettings {
            boundaries,
            ..AggregationSettings::default()
        }
    }

    pub fn with_site_offset(mut self, utc_offset_minutes: i32) -> Result<Self, ConfigError> {
        self.site_offset = site_offset(utc_offset_minutes)?;
        Ok(self)
    }

    pub fn with_bucket_width(mut self, width: BucketWidth) -> Self {
        self.bucket_width = width;
        self
    }

    pub fn with_anchor(mut self, anchor: AnchorMode) -> Self {
        self.anchor = anchor;
        self
    }

    pub fn with_rate(mut self, rate: RateStrategy) -> Result<Self, ConfigError> {
        rate.validate()?;
        self.rate = rate;
        Ok(self)
    }

    pub fn boundaries(&self) -> &ShiftBoundaryConfig {
        &self.boundaries
    }

    pub fn bucket_width(&self) -> BucketWidth {
        self.bucket_width
    }

    pub fn anchor(&self) -> AnchorMode {
        self.anchor
    }

    pub fn rate(&self) -> RateStrategy {
        self.rate
    }

    pub fn utc_offset_minutes(&self) -> i32 {
        self.site_offset.local_minus_utc() / 60
    }

    pub fn site_offset(&self) -> FixedOffset {
        self.site_offset
    }

    pub fn clock(&self) -> ShiftClock {
        ShiftClock::new(self.boundaries, self.site_offset)
    }
}

impl Default for AggregationSettings {
    fn default() -> Self {
        AggregationSettings {
            boundaries: ShiftBoundaryConfig::default(),
            site_offset: Utc.fix(),
            bucket_width: BucketWidth::default(),
            anchor: AnchorMode::default(),
            rate: RateStrategy::default(),
        }
    }
}

impl TryFrom<SettingsUpdate> for AggregationSettings {
    type Error = ConfigError;

    fn try_from(update: SettingsUpdate) -> Result<Self, Self::Error> {
        let boundaries = ShiftBoundaryConfig::parse(&update.shift1_start, &update.shift2_start)?;
        AggregationSettings::new(boundaries)
            .with_site_offset(update.utc_offset_minutes)?
            .with_bucket_width(BucketWidth::try_from(update.bucket_width_minutes)?)
            .with_anchor(update.anchor)
            .with_rate(update.rate)
    }
}

impl From<AggregationSettings> for SettingsUpdate {
    fn from(settings: AggregationSettings) -> Self {
        SettingsUpdate {
            shift1_start: settings.boundaries.label(Shift::Day),
            shift2_start: settings.boundaries.label(Shift::Night),
            utc_offset_minutes: settings.utc_offset_minutes(),
            bucket_width_minutes: settings.bucket_width.minutes(),
            anchor: settings.anchor,
            rate: settings.rate,
        }
    }
}

/// Holds the current settings; rejected updates leave them untouched.
#[derive(Debug, Default)]
pub struct SettingsCell {
    current: RwLock<AggregationSettings>,
}

impl SettingsCell {
    pub fn new(settings: AggregationSettings) -> Self {
        SettingsCell {
            current: RwLock::new(settings),
        }
    }

    /// A copy of the current settings for one aggregation pass.
    pub fn current(&self) -> AggregationSettings {
        *self.current.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Validates `update` and, if valid, swaps it in.
    pub fn validate_and_apply(&self, update: SettingsUpdate) -> Result<AggregationSettings, ConfigError> {
        match AggregationSettings::try_from(update) {
            Ok(settings) => {
                *self.current.write().unwrap_or_else(|e| e.into_inner()) = settings;
                info!(boundaries = %settings.boundaries, "applied new line settings");
                Ok(settings)
            }
            Err(e) => {
                warn!(error = %e, "rejected line settings, keeping previous");
                Err(e)
            }
        }
    }
}
