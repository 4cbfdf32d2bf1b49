//! Per-shift count totals for each stage.

use std::collections::BTreeMap;

use serde::ser::{Serialize, SerializeStruct, Serializer};
use tracing::debug;

use crate::event::{CountEvent, EventBatch, Shift, Stage};
use crate::shift_clock::ShiftClock;

/// Counts summed per shift. The total is always derived from the two shifts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShiftTotals {
    shift1: u64,
    shift2: u64,
}

impl ShiftTotals {
    pub fn new(shift1: u64, shift2: u64) -> Self {
        ShiftTotals { shift1, shift2 }
    }

    pub fn shift1(&self) -> u64 {
        self.shift1
    }

    pub fn shift2(&self) -> u64 {
        self.shift2
    }

    pub fn total(&self) -> u64 {
        self.shift1.saturating_add(self.shift2)
    }

    pub fn get(&self, shift: Shift) -> u64 {
        match shift {
            Shift::Day => self.shift1,
            Shift::Night => self.shift2,
        }
    }

    pub fn add(&mut self, shift: Shift, count: u64) {
        let slot = match shift {
            Shift::Day => &mut self.shift1,
            Shift::Night => &mut self.shift2,
        };
        *slot = slot.saturating_add(count);
    }
}

impl Serialize for ShiftTotals {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("ShiftTotals", 3)?;
        s.serialize_field("shift1", &self.shift1)?;
        s.serialize_field("shift2", &self.shift2)?;
        s.serialize_field("total", &self.total())?;
        s.end()
    }
}

/// Totals for every requested stage plus batch-level bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct AggregateReport {
    pub totals: BTreeMap<Stage, ShiftTotals>,
    pub malformed: usize,
    /// Events whose upstream shift label disagreed with the clock.
    pub hint_mismatches: usize,
}

impl AggregateReport {
    pub fn totals_for(&self, stage: Stage) -> ShiftTotals {
        self.totals.get(&stage).copied().unwrap_or_default()
    }
}

/// Sums the counts of `stage` events by the shift the clock assigns them.
pub fn aggregate<'a, I>(events: I, stage: Stage, clock: &ShiftClock) -> ShiftTotals
where
    I: IntoIterator<Item = &'a CountEvent>,
{
    let mut totals = ShiftTotals::default();
    for event in events.into_iter().filter(|e| e.stage == stage) {
        totals.add(clock.shift_of(event.timestamp).shift, event.count);
    }
    totals
}

/// Aggregates a whole batch for each of `stages`.
///
/// Stages without events still get a zeroed entry.
pub fn aggregate_batch(batch: &EventBatch, stages: &[Stage], clock: &ShiftClock) -> AggregateReport {
    let mut report = AggregateReport {
        totals: stages.iter().map(|&s| (s, ShiftTotals::default())).collect(),
        malformed: batch.malformed,
        hint_mismatches: 0,
    };

    for event in &batch.events {
        let Some(totals) = report.totals.get_mut(&event.stage) else {
            continue;
        };
        let shift = clock.shift_of(event.timestamp).shift;
        if event.shift_hint.is_some_and(|hint| hint != shift) {
            report.hint_mismatches += 1;
        }
        totals.add(shift, event.count);
    }

    if report.hint_mismatches > 0 {
        debug!(
            mismatches = report.hint_mismatches,
            "upstream shift labels overridden by configured boundaries"
        );
    }
    report
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};

    use super::*;
    use crate::shift_clock::ShiftBoundaryConfig;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, m, 0).unwrap()
    }

    fn clock() -> ShiftClock {
        ShiftClock::utc(ShiftBoundaryConfig::parse("08:00", "20:00").unwrap())
    }

    #[test]
    fn test_boundary_events_split_by_exact_time() {
        let events = vec![
            CountEvent::new(at(7, 59), 5, Stage::Capper),
            CountEvent::new(at(8, 0), 10, Stage::Capper),
            CountEvent::new(at(19, 59), 3, Stage::Capper),
            CountEvent::new(at(20, 0), 7, Stage::Capper),
            CountEvent::new(at(12, 0), 99, Stage::Boxer),
        ];
        let totals = aggregate(&events, Stage::Capper, &clock());
        assert_eq!(totals, ShiftTotals::new(13, 12));
        assert_eq!(totals.total(), 25);
    }

    #[test]
    fn test_batch_reports_every_requested_stage() {
        let batch = EventBatch {
            events: vec![CountEvent::new(at(9, 0), 4, Stage::Labeler)],
            malformed: 2,
        };
        let report = aggregate_batch(&batch, &Stage::ALL, &clock());
        assert_eq!(report.totals.len(), 3);
        assert_eq!(report.totals_for(Stage::Labeler), ShiftTotals::new(4, 0));
        assert_eq!(report.totals_for(Stage::Capper), ShiftTotals::default());
        assert_eq!(report.malformed, 2);
    }

    #[test]
    fn test_clock_overrides_shift_hint() {
        let mut labelled_day = CountEvent::new(at(21, 0), 6, Stage::Capper);
        labelled_day.shift_hint = Some(Shift::Day);
        let mut labelled_night = CountEvent::new(at(22, 0), 1, Stage::Capper);
        labelled_night.shift_hint = Some(Shift::Night);

        let batch = EventBatch::new(vec![labelled_day, labelled_night]);
        let report = aggregate_batch(&batch, &[Stage::Capper], &clock());
        assert_eq!(report.totals_for(Stage::Capper), ShiftTotals::new(0, 7));
        assert_eq!(report.hint_mismatches, 1);
    }

    #[test]
    fn test_serialized_totals_include_total() {
        let json = serde_json::to_value(ShiftTotals::new(100, 90)).unwrap();
        assert_eq!(json, serde_json::json!({ "shift1": 100, "shift2": 90, "total": 190 }));
    }
}
