//! Signed count differences between consecutive stages.

use std::collections::BTreeMap;

use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::aggregator::ShiftTotals;
use crate::event::Stage;

/// Downstream minus upstream, per shift.
///
/// Negative values are ordinary attrition, positive ones mean the downstream
/// stage recorded more than it was fed. Neither is clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LossReport {
    pub upstream: Stage,
    pub downstream: Stage,
    shift1: i64,
    shift2: i64,
}

impl LossReport {
    pub fn shift1(&self) -> i64 {
        self.shift1
    }

    pub fn shift2(&self) -> i64 {
        self.shift2
    }

    pub fn total(&self) -> i64 {
        self.shift1.saturating_add(self.shift2)
    }

    /// Reports for every adjacent stage pair present in `totals`, in line order.
    pub fn for_line(totals: &BTreeMap<Stage, ShiftTotals>) -> Vec<LossReport> {
        totals
            .iter()
            .filter_map(|(&upstream, up)| {
                let downstream = upstream.downstream()?;
                let down = totals.get(&downstream)?;
                Some(loss(upstream, up, downstream, down))
            })
            .collect()
    }
}

impl Serialize for LossReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("LossReport", 4)?;
        s.serialize_field("stage_pair", &(self.upstream, self.downstream))?;
        s.serialize_field("shift1", &self.shift1)?;
        s.serialize_field("shift2", &self.shift2)?;
        s.serialize_field("total", &self.total())?;
        s.end()
    }
}

fn signed(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

/// Computes the loss between `upstream` and `downstream` totals.
pub fn loss(
    upstream: Stage,
    upstream_totals: &ShiftTotals,
    downstream: Stage,
    downstream_totals: &ShiftTotals,
) -> LossReport {
    LossReport {
        upstream,
        downstream,
        shift1: signed(downstream_totals.shift1()).saturating_sub(signed(upstream_totals.shift1())),
        shift2: signed(downstream_totals.shift2()).saturating_sub(signed(upstream_totals.shift2())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_loss_per_shift() {
        let report = loss(
            Stage::Capper,
            &ShiftTotals::new(100, 90),
            Stage::Labeler,
            &ShiftTotals::new(95, 92),
        );
        assert_eq!(report.shift1(), -5);
        assert_eq!(report.shift2(), 2);
        assert_eq!(report.total(), -3);
    }

    #[test]
    fn test_for_line_skips_missing_stages() {
        let mut totals = BTreeMap::new();
        totals.insert(Stage::Capper, ShiftTotals::new(10, 10));
        totals.insert(Stage::Boxer, ShiftTotals::new(8, 8));
        assert!(LossReport::for_line(&totals).is_empty());

        totals.insert(Stage::Labeler, ShiftTotals::new(9, 11));
        let reports = LossReport::for_line(&totals);
        assert_eq!(reports.len(), 2);
        assert_eq!((reports[0].upstream, reports[0].downstream), (Stage::Capper, Stage::Labeler));
        assert_eq!((reports[0].shift1(), reports[0].shift2()), (-1, 1));
        assert_eq!((reports[1].upstream, reports[1].downstream), (Stage::Labeler, Stage::Boxer));
        assert_eq!(reports[1].total(), -4);
    }

    #[test]
    fn test_serialized_shape() {
        let report = loss(Stage::Labeler, &ShiftTotals::new(5, 5), Stage::Boxer, &ShiftTotals::new(4, 6));
        let json = serde_json::to_value(report).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "stage_pair": ["labeler", "boxer"],
                "shift1": -1,
                "shift2": 1,
                "total": 0,
            })
        );
    }
}
