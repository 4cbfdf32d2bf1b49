//! Shift boundaries and the clock that classifies instants into shifts.

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDateTime, NaiveTime, Offset, TimeDelta, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::MINUTES_PER_DAY;
use crate::error::ConfigError;
use crate::event::Shift;

/// Start times of the two shifts, partitioning each 24h cycle.
///
/// The day shift runs from `shift1_start` up to `shift2_start`, the night shift
/// covers the rest of the cycle. Either window may wrap past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BoundaryStrings", into = "BoundaryStrings")]
pub struct ShiftBoundaryConfig {
    shift1_start: NaiveTime,
    shift2_start: NaiveTime,
}

#[derive(Serialize, Deserialize)]
struct BoundaryStrings {
    shift1_start: String,
    shift2_start: String,
}

impl TryFrom<BoundaryStrings> for ShiftBoundaryConfig {
    type Error = ConfigError;

    fn try_from(raw: BoundaryStrings) -> Result<Self, Self::Error> {
        ShiftBoundaryConfig::parse(&raw.shift1_start, &raw.shift2_start)
    }
}

impl From<ShiftBoundaryConfig> for BoundaryStrings {
    fn from(config: ShiftBoundaryConfig) -> Self {
        BoundaryStrings {
            shift1_start: format_hhmm(config.shift1_start),
            shift2_start: format_hhmm(config.shift2_start),
        }
    }
}

impl ShiftBoundaryConfig {
    /// Builds a config from two times of day. Seconds are discarded.
    pub fn new(shift1_start: NaiveTime, shift2_start: NaiveTime) -> Result<Self, ConfigError> {
        let shift1_start = truncate_to_minute(shift1_start);
        let shift2_start = truncate_to_minute(shift2_start);
        if shift1_start == shift2_start {
            return Err(ConfigError::CoincidingBoundaries(format_hhmm(shift1_start)));
        }
        Ok(ShiftBoundaryConfig {
            shift1_start,
            shift2_start,
        })
    }

    /// Parses two `HH:MM` strings.
    pub fn parse(shift1_start: &str, shift2_start: &str) -> Result<Self, ConfigError> {
        ShiftBoundaryConfig::new(parse_hhmm(shift1_start)?, parse_hhmm(shift2_start)?)
    }

    pub fn shift1_start(&self) -> NaiveTime {
        self.shift1_start
    }

    pub fn shift2_start(&self) -> NaiveTime {
        self.shift2_start
    }

    /// Time of day at which `shift` begins.
    pub fn start_of(&self, shift: Shift) -> NaiveTime {
        match shift {
            Shift::Day => self.shift1_start,
            Shift::Night => self.shift2_start,
        }
    }

    /// `HH:MM` at which `shift` begins.
    pub fn label(&self, shift: Shift) -> String {
        format_hhmm(self.start_of(shift))
    }

    /// Minute of day at which `shift` begins.
    pub fn start_minute(&self, shift: Shift) -> u32 {
        minute_of_day(self.start_of(shift))
    }

    /// Length of `shift` in minutes. The two lengths always add up to a day.
    pub fn shift_length(&self, shift: Shift) -> u32 {
        let day = (self.start_minute(Shift::Night) + MINUTES_PER_DAY
            - self.start_minute(Shift::Day))
            % MINUTES_PER_DAY;
        match shift {
            Shift::Day => day,
            Shift::Night => MINUTES_PER_DAY - day,
        }
    }

    /// Which shift a wall-clock time of day falls into.
    pub fn shift_at(&self, time: NaiveTime) -> Shift {
        let (s1, s2) = (self.shift1_start, self.shift2_start);
        let in_day = if s1 < s2 {
            s1 <= time && time < s2
        } else {
            time >= s1 || time < s2
        };
        if in_day { Shift::Day } else { Shift::Night }
    }
}

impl Default for ShiftBoundaryConfig {
    fn default() -> Self {
        ShiftBoundaryConfig {
            shift1_start: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
            shift2_start: NaiveTime::from_hms_opt(20, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl fmt::Display for ShiftBoundaryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "day {} / night {}",
            format_hhmm(self.shift1_start),
            format_hhmm(self.shift2_start)
        )
    }
}

/// The shift an instant belongs to and when that shift began.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShiftPosition {
    pub shift: Shift,
    pub shift_start: DateTime<Utc>,
    pub shift_end: DateTime<Utc>,
}

/// One 24h cycle starting at a shift-1 boundary, `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProductionDay {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ProductionDay {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

/// Classifies instants into shifts using the site's wall clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftClock {
    config: ShiftBoundaryConfig,
    site_offset: FixedOffset,
}

impl ShiftClock {
    pub fn new(config: ShiftBoundaryConfig, site_offset: FixedOffset) -> Self {
        ShiftClock {
            config,
            site_offset,
        }
    }

    /// A clock whose wall time is UTC.
    pub fn utc(config: ShiftBoundaryConfig) -> Self {
        ShiftClock::new(config, Utc.fix())
    }

    pub fn config(&self) -> &ShiftBoundaryConfig {
        &self.config
    }

    pub fn site_offset(&self) -> FixedOffset {
        self.site_offset
    }

    /// Wall-clock representation of `instant` at the site.
    pub fn local(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        instant.with_timezone(&self.site_offset).naive_local()
    }

    /// Minute of the site's calendar day, `0..1440`.
    pub fn minute_of_day(&self, instant: DateTime<Utc>) -> u32 {
        minute_of_day(self.local(instant).time())
    }

    /// Classifies `instant`, comparing full time of day against both boundaries.
    ///
    /// An instant in the early-morning tail of a shift that began the previous
    /// calendar day gets yesterday's boundary as its `shift_start`.
    pub fn shift_of(&self, instant: DateTime<Utc>) -> ShiftPosition {
        let local = self.local(instant);
        let shift = self.config.shift_at(local.time());
        let shift_start = self.latest_start(local, self.config.start_of(shift));
        let shift_end =
            shift_start + TimeDelta::minutes(i64::from(self.config.shift_length(shift)));

        ShiftPosition {
            shift,
            shift_start,
            shift_end,
        }
    }

    /// The production day holding `instant`: shift 1 followed by shift 2.
    pub fn production_day(&self, instant: DateTime<Utc>) -> ProductionDay {
        let start = self.latest_start(self.local(instant), self.config.start_of(Shift::Day));
        ProductionDay {
            start,
            end: start + TimeDelta::days(1),
        }
    }

    /// Most recent wall-clock occurrence of `start_time` at or before `local`.
    fn latest_start(&self, local: NaiveDateTime, start_time: NaiveTime) -> DateTime<Utc> {
        let mut start_local = local.date().and_time(start_time);
        if local.time() < start_time {
            start_local -= TimeDelta::days(1);
        }
        self.to_utc(start_local)
    }

    fn to_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        let utc = local - TimeDelta::seconds(i64::from(self.site_offset.local_minus_utc()));
        DateTime::from_naive_utc_and_offset(utc, Utc)
    }
}

/// Builds a site offset from a signed minute count.
pub fn site_offset(utc_offset_minutes: i32) -> Result<FixedOffset, ConfigError> {
    utc_offset_minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or(ConfigError::UtcOffset(utc_offset_minutes))
}

pub(crate) fn minute_of_day(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

/// Renders a minute of day as `HH:MM`, wrapping past midnight.
pub fn format_minute(minute: u32) -> String {
    let minute = minute % MINUTES_PER_DAY;
    format!("{:02}:{:02}", minute / 60, minute % 60)
}

fn format_hhmm(time: NaiveTime) -> String {
    format_minute(minute_of_day(time))
}

fn truncate_to_minute(time: NaiveTime) -> NaiveTime {
    NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(time)
}

fn parse_hhmm(raw: &str) -> Result<NaiveTime, ConfigError> {
    let invalid = || ConfigError::TimeOfDay(raw.to_owned());
    let (h, m) = raw.trim().split_once(':').ok_or_else(invalid)?;
    let digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if h.is_empty() || h.len() > 2 || m.len() != 2 || !digits(h) || !digits(m) {
        return Err(invalid());
    }
    let hour: u32 = h.parse().map_err(|_| invalid())?;
    let minute: u32 = m.parse().map_err(|_| invalid())?;
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(invalid)
}
