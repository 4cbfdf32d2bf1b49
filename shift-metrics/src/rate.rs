//! Live throughput estimates.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::DEFAULT_TRAILING_WINDOW;
use crate::error::ConfigError;
use crate::event::CountEvent;
use crate::shift_clock::ShiftClock;

/// Longest accepted trailing window, one full day.
pub const MAX_TRAILING_WINDOW_SECS: u64 = 24 * 60 * 60;

/// How the live rate is derived.
///
/// The two strategies answer different questions and are kept side by side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RateStrategy {
    /// Current shift total divided by minutes elapsed since the shift began.
    #[default]
    ElapsedShift,
    /// Raw sum of counts in `[now - window, now)`.
    TrailingWindow { window_secs: u64 },
}

impl RateStrategy {
    pub fn trailing_default() -> Self {
        RateStrategy::TrailingWindow {
            window_secs: DEFAULT_TRAILING_WINDOW.as_secs(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            RateStrategy::TrailingWindow { window_secs }
                if !(1..=MAX_TRAILING_WINDOW_SECS).contains(window_secs) =>
            {
                Err(ConfigError::TrailingWindow)
            }
            _ => Ok(()),
        }
    }
}

/// Unit attached to a rate value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "unit", rename_all = "snake_case")]
pub enum RateUnit {
    PerMinute,
    PerWindow { secs: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rate {
    pub value: f64,
    #[serde(flatten)]
    pub unit: RateUnit,
}

impl Rate {
    pub fn zero(unit: RateUnit) -> Self {
        Rate { value: 0.0, unit }
    }

    /// The rate normalised to count per minute.
    pub fn per_minute(&self) -> f64 {
        match self.unit {
            RateUnit::PerMinute => self.value,
            RateUnit::PerWindow { secs } => guard_finite(self.value * 60.0 / secs as f64),
        }
    }

    pub fn per_hour(&self) -> f64 {
        guard_finite(self.per_minute() * 60.0)
    }
}

/// Replaces non-finite or negative values with zero.
pub fn guard_finite(value: f64) -> f64 {
    if value.is_finite() && value >= 0.0 {
        value
    } else {
        debug!(value, "arithmetic guard replaced non-finite or negative rate with 0");
        0.0
    }
}

/// Estimates throughput at `now` from `events` using `strategy`.
///
/// The result is always finite and non-negative.
pub fn rate<'a, I>(events: I, now: DateTime<Utc>, clock: &ShiftClock, strategy: RateStrategy) -> Rate
where
    I: IntoIterator<Item = &'a CountEvent>,
{
    match strategy {
        RateStrategy::ElapsedShift => elapsed_shift_rate(events, now, clock),
        RateStrategy::TrailingWindow { window_secs } => {
            trailing_window_sum(events, now, Duration::from_secs(window_secs))
        }
    }
}

fn elapsed_shift_rate<'a, I>(events: I, now: DateTime<Utc>, clock: &ShiftClock) -> Rate
where
    I: IntoIterator<Item = &'a CountEvent>,
{
    let position = clock.shift_of(now);
    let total: u64 = events
        .into_iter()
        .filter(|e| e.timestamp >= position.shift_start && e.timestamp <= now)
        .fold(0u64, |acc, e| acc.saturating_add(e.count));

    let elapsed_minutes = (now - position.shift_start).num_milliseconds() as f64 / 60_000.0;
    if elapsed_minutes <= 0.0 {
        return Rate::zero(RateUnit::PerMinute);
    }
    Rate {
        value: guard_finite(total as f64 / elapsed_minutes),
        unit: RateUnit::PerMinute,
    }
}

fn trailing_window_sum<'a, I>(events: I, now: DateTime<Utc>, window: Duration) -> Rate
where
    I: IntoIterator<Item = &'a CountEvent>,
{
    let unit = RateUnit::PerWindow {
        secs: window.as_secs(),
    };
    let Some(start) = TimeDelta::from_std(window)
        .ok()
        .and_then(|span| now.checked_sub_signed(span))
    else {
        return Rate::zero(unit);
    };
    let sum = events
        .into_iter()
        .filter(|e| e.timestamp >= start && e.timestamp < now)
        .fold(0u64, |acc, e| acc.saturating_add(e.count));
    Rate {
        value: guard_finite(sum as f64),
        unit,
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::event::Stage;
    use crate::shift_clock::ShiftBoundaryConfig;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, m, s).unwrap()
    }

    fn clock() -> ShiftClock {
        ShiftClock::utc(ShiftBoundaryConfig::parse("08:00", "20:00").unwrap())
    }

    fn ev(h: u32, m: u32, s: u32, count: u64) -> CountEvent {
        CountEvent::new(at(h, m, s), count, Stage::Capper)
    }

    #[test]
    fn test_elapsed_shift_rate() {
        let events = vec![ev(7, 59, 0, 500), ev(8, 10, 0, 60), ev(9, 0, 0, 60)];
        let r = rate(&events, at(10, 0, 0), &clock(), RateStrategy::ElapsedShift);
        assert_eq!(r.unit, RateUnit::PerMinute);
        assert!((r.value - 1.0).abs() < 1e-9, "got {}", r.value);
        assert!((r.per_hour() - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_elapsed_zero_minutes_is_zero() {
        let events = vec![ev(8, 0, 0, 10)];
        let r = rate(&events, at(8, 0, 0), &clock(), RateStrategy::ElapsedShift);
        assert_eq!(r.value, 0.0);
    }

    #[test]
    fn test_empty_batch_is_zero_for_both_strategies() {
        for strategy in [RateStrategy::ElapsedShift, RateStrategy::trailing_default()] {
            let r = rate(&[], at(12, 0, 0), &clock(), strategy);
            assert_eq!(r.value, 0.0);
        }
    }

    #[test]
    fn test_trailing_window_is_half_open() {
        let events = vec![
            ev(11, 58, 59, 100),
            ev(11, 59, 0, 3),
            ev(11, 59, 30, 4),
            ev(12, 0, 0, 50),
        ];
        let r = rate(&events, at(12, 0, 0), &clock(), RateStrategy::trailing_default());
        assert_eq!(r.value, 7.0);
        assert_eq!(r.unit, RateUnit::PerWindow { secs: 60 });
        assert_eq!(r.per_minute(), 7.0);
    }

    #[test]
    fn test_trailing_window_normalisation() {
        let r = Rate {
            value: 30.0,
            unit: RateUnit::PerWindow { secs: 30 },
        };
        assert_eq!(r.per_minute(), 60.0);
        let degenerate = Rate {
            value: 30.0,
            unit: RateUnit::PerWindow { secs: 0 },
        };
        assert_eq!(degenerate.per_minute(), 0.0);
    }

    #[test]
    fn test_oversized_window_is_rejected_and_never_panics() {
        let huge = RateStrategy::TrailingWindow {
            window_secs: 10_000_000_000_000,
        };
        assert_eq!(huge.validate(), Err(ConfigError::TrailingWindow));
        assert_eq!(
            RateStrategy::TrailingWindow { window_secs: MAX_TRAILING_WINDOW_SECS + 1 }.validate(),
            Err(ConfigError::TrailingWindow)
        );

        let events = vec![ev(11, 0, 0, 5)];
        let r = rate(&events, at(12, 0, 0), &clock(), huge);
        assert_eq!(r.value, 0.0);
    }

    #[test]
    fn test_sums_saturate_instead_of_overflowing() {
        let half = u64::MAX / 2 + 1;
        let events = vec![ev(11, 59, 10, half), ev(11, 59, 20, half)];
        let elapsed = rate(&events, at(12, 0, 0), &clock(), RateStrategy::ElapsedShift);
        assert!((elapsed.value - u64::MAX as f64 / 240.0).abs() / elapsed.value < 1e-9);
        let trailing = rate(&events, at(12, 0, 0), &clock(), RateStrategy::trailing_default());
        assert_eq!(trailing.value, u64::MAX as f64);
    }

    #[test]
    fn test_guard_finite() {
        assert_eq!(guard_finite(f64::NAN), 0.0);
        assert_eq!(guard_finite(f64::INFINITY), 0.0);
        assert_eq!(guard_finite(-1.5), 0.0);
        assert_eq!(guard_finite(2.5), 2.5);
    }

    #[test]
    fn test_strategy_serde() {
        let s: RateStrategy = serde_json::from_str(r#"{"kind":"trailing_window","window_secs":120}"#).unwrap();
        assert_eq!(s, RateStrategy::TrailingWindow { window_secs: 120 });
        assert!(RateStrategy::TrailingWindow { window_secs: 0 }.validate().is_err());
        assert!(RateStrategy::TrailingWindow { window_secs: MAX_TRAILING_WINDOW_SECS }.validate().is_ok());
        let r = Rate::zero(RateUnit::PerWindow { secs: 60 });
        let json = serde_json::to_value(r).unwrap();
        assert_eq!(json, serde_json::json!({ "value": 0.0, "unit": "per_window", "secs": 60 }));
    }
}
