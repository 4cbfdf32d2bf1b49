//! One aggregation pass over a fully materialised batch.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::aggregator::{ShiftTotals, aggregate_batch};
use crate::bucketer::{BucketSeries, bucket};
use crate::event::{EventBatch, Stage};
use crate::inventory::InventoryItem;
use crate::loss::LossReport;
use crate::rate::{Rate, rate};
use crate::settings::AggregationSettings;
use crate::shift_clock::{ProductionDay, ShiftPosition};

/// Everything a pass needs, captured up front.
#[derive(Debug, Clone, Copy)]
pub struct CycleInput<'a> {
    pub now: DateTime<Utc>,
    pub settings: &'a AggregationSettings,
    pub batch: &'a EventBatch,
    pub stages: &'a [Stage],
    pub inventory: &'a [InventoryItem],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageSnapshot {
    pub totals: ShiftTotals,
    pub buckets: BucketSeries,
    pub rate: Rate,
}

/// The complete output set of one pass. Replaced wholesale, never patched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub computed_at: Option<DateTime<Utc>>,
    pub settings: AggregationSettings,
    pub current_shift: Option<ShiftPosition>,
    /// Events outside this window are left out of every figure.
    pub production_day: Option<ProductionDay>,
    pub stages: BTreeMap<Stage, StageSnapshot>,
    pub losses: Vec<LossReport>,
    pub malformed: usize,
    pub hint_mismatches: usize,
    pub inventory: Vec<InventoryItem>,
}

impl Snapshot {
    /// The snapshot served before the first pass completes.
    pub fn empty(settings: AggregationSettings) -> Self {
        Snapshot {
            computed_at: None,
            settings,
            current_shift: None,
            production_day: None,
            stages: BTreeMap::new(),
            losses: Vec::new(),
            malformed: 0,
            hint_mismatches: 0,
            inventory: Vec::new(),
        }
    }

    /// Derives every output from `input` alone.
    ///
    /// Only events inside the production day holding `now` are counted.
    pub fn compute(input: &CycleInput<'_>) -> Self {
        let settings = *input.settings;
        let clock = settings.clock();
        let anchor = settings.anchor().resolve(&clock, input.now);
        let production_day = clock.production_day(input.now);
        let batch = EventBatch {
            events: input
                .batch
                .events
                .iter()
                .filter(|e| production_day.contains(e.timestamp))
                .cloned()
                .collect(),
            malformed: input.batch.malformed,
        };
        let report = aggregate_batch(&batch, input.stages, &clock);

        let stages: BTreeMap<Stage, StageSnapshot> = report
            .totals
            .iter()
            .map(|(&stage, &totals)| {
                let events: Vec<_> = batch.for_stage(stage).collect();
                let snapshot = StageSnapshot {
                    totals,
                    buckets: bucket(events.iter().copied(), settings.bucket_width(), anchor, &clock),
                    rate: rate(events.iter().copied(), input.now, &clock, settings.rate()),
                };
                (stage, snapshot)
            })
            .collect();

        let losses = LossReport::for_line(&report.totals);
        debug!(
            stages = stages.len(),
            events = batch.events.len(),
            outside_day = input.batch.events.len() - batch.events.len(),
            malformed = report.malformed,
            "aggregation pass complete"
        );

        Snapshot {
            computed_at: Some(input.now),
            settings,
            current_shift: Some(clock.shift_of(input.now)),
            production_day: Some(production_day),
            stages,
            losses,
            malformed: report.malformed,
            hint_mismatches: report.hint_mismatches,
            inventory: input.inventory.to_vec(),
        }
    }

    pub fn totals(&self, stage: Stage) -> Option<ShiftTotals> {
        self.stages.get(&stage).map(|s| s.totals)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::bucketer::Anchor;
    use crate::event::{CountEvent, Shift};
    use crate::rate::RateUnit;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, m, 0).unwrap()
    }

    #[test]
    fn test_compute_full_line() {
        let batch = EventBatch {
            events: vec![
                CountEvent::new(at(9, 0), 100, Stage::Capper),
                CountEvent::new(at(9, 30), 95, Stage::Labeler),
                CountEvent::new(at(10, 0), 90, Stage::Boxer),
            ],
            malformed: 1,
        };
        let settings = AggregationSettings::default();
        let inventory = vec![InventoryItem::new("Jars", 10.0)];
        let snapshot = Snapshot::compute(&CycleInput {
            now: at(11, 0),
            settings: &settings,
            batch: &batch,
            stages: &Stage::ALL,
            inventory: &inventory,
        });

        assert_eq!(snapshot.computed_at, Some(at(11, 0)));
        assert_eq!(snapshot.current_shift.map(|p| p.shift), Some(Shift::Day));
        assert_eq!(snapshot.totals(Stage::Capper), Some(ShiftTotals::new(100, 0)));
        assert_eq!(snapshot.losses.len(), 2);
        assert_eq!(snapshot.losses[0].total(), -5);
        assert_eq!(snapshot.losses[1].total(), -5);
        assert_eq!(snapshot.malformed, 1);
        assert_eq!(snapshot.inventory.len(), 1);

        let capper = &snapshot.stages[&Stage::Capper];
        assert_eq!(capper.buckets.anchor, Anchor::ShiftStart(Shift::Day));
        assert_eq!(capper.buckets.buckets[1].count, 100);
        assert_eq!(capper.rate.unit, RateUnit::PerMinute);
        assert!((capper.rate.value - 100.0 / 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_earlier_days_are_left_out() {
        let old = Utc.with_ymd_and_hms(2024, 4, 22, 9, 0, 0).unwrap();
        let batch = EventBatch::new(vec![
            CountEvent::new(old, 100, Stage::Capper),
            CountEvent::new(at(9, 0), 5, Stage::Capper),
        ]);
        let settings = AggregationSettings::default();
        let snapshot = Snapshot::compute(&CycleInput {
            now: at(10, 0),
            settings: &settings,
            batch: &batch,
            stages: &[Stage::Capper],
            inventory: &[],
        });

        let capper = &snapshot.stages[&Stage::Capper];
        assert_eq!(capper.totals, ShiftTotals::new(5, 0));
        assert_eq!(capper.buckets.total(), 5);
        assert_eq!(capper.buckets.buckets[1].count, 5);
        assert_eq!(snapshot.production_day.map(|d| d.start), Some(at(8, 0)));
    }

    #[test]
    fn test_single_stage_has_no_losses() {
        let batch = EventBatch::new(vec![CountEvent::new(at(9, 0), 5, Stage::Capper)]);
        let settings = AggregationSettings::default();
        let snapshot = Snapshot::compute(&CycleInput {
            now: at(8, 0),
            settings: &settings,
            batch: &batch,
            stages: &[Stage::Capper],
            inventory: &[],
        });
        assert!(snapshot.losses.is_empty());
        assert_eq!(snapshot.stages.len(), 1);
        assert_eq!(snapshot.stages[&Stage::Capper].rate.value, 0.0);
    }
}
