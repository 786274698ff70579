use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::data::{Pivot, Side, Zone};
use crate::series::BarSeries;

/// Refinement bars before the matched bar considered when widening the band.
/// Backward-only; empirically tuned.
pub const EXPANSION_BARS: usize = 2;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RefineError {
    #[error("no refinement bar matches {side} pivot price {price} at {pivot_time}")]
    NoMatchFound {
        side: Side,
        pivot_time: DateTime<Utc>,
        price: f64,
    },

    #[error("insufficient history for {side} pivot at {pivot_time}: {reason}")]
    InsufficientHistory {
        side: Side,
        pivot_time: DateTime<Utc>,
        reason: &'static str,
    },
}

impl RefineError {
    pub fn pivot_time(&self) -> DateTime<Utc> {
        match self {
            RefineError::NoMatchFound { pivot_time, .. }
            | RefineError::InsufficientHistory { pivot_time, .. } => *pivot_time,
        }
    }
}

/// Tighten a pivot into a zone using the finer refinement series and anchor
/// it on the chart series.
///
/// The pivot bar is bracketed on the refinement series by its own open time
/// and the next pivot bar's open time. The first refinement bar in that span
/// whose extreme equals the pivot price seeds the band; the band's inner
/// boundary is then widened from up to [`EXPANSION_BARS`] earlier bars.
pub fn refine_pivot(
    pivot: &Pivot,
    pivot_series: &BarSeries,
    refinement: &BarSeries,
    chart: &BarSeries,
) -> Result<Zone, RefineError> {
    let insufficient = |reason| RefineError::InsufficientHistory {
        side: pivot.side,
        pivot_time: pivot.open_time,
        reason,
    };

    let next_open = pivot_series
        .open_time(pivot.index + 1)
        .ok_or_else(|| insufficient("pivot bar has no following bar"))?;

    match refinement.first() {
        Some(first) if first.timestamp <= pivot.open_time => {}
        _ => return Err(insufficient("refinement series starts after the pivot bar")),
    }
    let start = refinement
        .index_at_or_after(pivot.open_time)
        .ok_or_else(|| insufficient("refinement series ends before the pivot bar"))?;
    let end = refinement
        .index_at_or_after(next_open)
        .unwrap_or(refinement.len());

    let bars = refinement.bars();
    let matched = (start..end)
        .find(|&i| match pivot.side {
            Side::Supply => bars[i].high == pivot.price,
            Side::Demand => bars[i].low == pivot.price,
        })
        .ok_or(RefineError::NoMatchFound {
            side: pivot.side,
            pivot_time: pivot.open_time,
            price: pivot.price,
        })?;

    let mut high = bars[matched].high;
    let mut low = bars[matched].low;
    let mut anchor_bar = matched;
    for offset in 1..=EXPANSION_BARS {
        let idx = matched.checked_sub(offset).ok_or_else(|| {
            insufficient("boundary expansion runs past the refinement series start")
        })?;
        let earlier = &bars[idx];
        match pivot.side {
            Side::Supply if earlier.low < low => {
                low = earlier.low;
                anchor_bar = idx;
            }
            Side::Demand if earlier.high < high => {
                high = earlier.high;
                anchor_bar = idx;
            }
            _ => {}
        }
    }

    let anchor_time = bars[anchor_bar].timestamp;
    match chart.first() {
        Some(first) if first.timestamp <= anchor_time => {}
        _ => return Err(insufficient("chart series starts after the zone anchor")),
    }
    let anchor_index = chart
        .index_at_or_after(anchor_time)
        .ok_or_else(|| insufficient("chart series ends before the zone anchor"))?;

    Ok(Zone::new(anchor_index, high, low))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    use crate::data::Bar;
    use crate::series::tests::bar_at;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn quarter_hours(bands: &[(f64, f64)]) -> BarSeries {
        BarSeries::new(
            bands
                .iter()
                .enumerate()
                .map(|(i, &(h, l))| bar_at(start() + Duration::minutes(15 * i as i64), h, l))
                .collect(),
        )
    }

    fn hourly(bars: &[Bar]) -> BarSeries {
        crate::series::resample(bars, crate::data::Timeframe::H1)
    }

    fn pivot(series: &BarSeries, index: usize, side: Side) -> Pivot {
        let bar = &series.bars()[index];
        Pivot {
            index,
            side,
            price: match side {
                Side::Supply => bar.high,
                Side::Demand => bar.low,
            },
            open_time: bar.timestamp,
        }
    }

    #[test]
    fn supply_widens_low_from_earlier_bars() {
        // Hour 1 holds quarter hours 4..8; the high of 110 sits at index 6.
        let refinement = quarter_hours(&[
            (101.0, 100.0),
            (101.0, 100.0),
            (101.0, 100.0),
            (101.0, 100.0),
            (104.0, 102.0),
            (106.0, 101.0),
            (110.0, 105.0),
            (108.0, 104.0),
            (103.0, 100.5),
        ]);
        let pivots = hourly(refinement.bars());
        let p = pivot(&pivots, 1, Side::Supply);
        assert_eq!(p.price, 110.0);

        let zone = refine_pivot(&p, &pivots, &refinement, &refinement).unwrap();
        assert_eq!(zone.high, 110.0);
        // 101 at index 5 beats 105; 102 at index 4 does not beat 101.
        assert_eq!(zone.low, 101.0);
        assert_eq!(zone.anchor_index, 5);
    }

    #[test]
    fn demand_tightens_high_from_earlier_bars() {
        let refinement = quarter_hours(&[
            (101.0, 100.0),
            (101.0, 100.0),
            (101.0, 100.0),
            (101.0, 100.0),
            (97.0, 95.0),
            (99.0, 96.0),
            (98.0, 90.0),
            (99.0, 94.0),
            (101.0, 98.0),
        ]);
        let pivots = hourly(refinement.bars());
        let p = pivot(&pivots, 1, Side::Demand);
        assert_eq!(p.price, 90.0);

        let zone = refine_pivot(&p, &pivots, &refinement, &refinement).unwrap();
        assert_eq!(zone.low, 90.0);
        // 99 at index 5 is not below 98; 97 at index 4 is.
        assert_eq!(zone.high, 97.0);
        assert_eq!(zone.anchor_index, 4);
        assert!(zone.high >= zone.low);
    }

    #[test]
    fn anchor_maps_onto_a_coarser_chart() {
        let refinement = quarter_hours(&[
            (101.0, 100.0),
            (101.0, 100.0),
            (101.0, 100.0),
            (101.0, 100.0),
            (107.0, 106.0),
            (106.0, 105.5),
            (110.0, 105.0),
            (108.0, 104.0),
            (103.0, 100.5),
        ]);
        let pivots = hourly(refinement.bars());
        let chart = BarSeries::new(
            [0, 30, 60, 90, 120]
                .iter()
                .map(|m| bar_at(start() + Duration::minutes(*m), 1.0, 0.0))
                .collect(),
        );
        let p = pivot(&pivots, 1, Side::Supply);
        let zone = refine_pivot(&p, &pivots, &refinement, &chart).unwrap();
        // Matched bar opens at 01:30 and no earlier bar widens the low.
        assert_eq!(zone.anchor_index, 3);
        assert_eq!(zone.low, 105.0);
    }

    #[test]
    fn missing_exact_match_is_reported() {
        let refinement = quarter_hours(&[(2.0, 1.0); 12]);
        let pivots = hourly(refinement.bars());
        let mut p = pivot(&pivots, 1, Side::Supply);
        p.price = 2.5;

        let err = refine_pivot(&p, &pivots, &refinement, &refinement).unwrap_err();
        assert!(matches!(err, RefineError::NoMatchFound { .. }));
        assert_eq!(err.pivot_time(), p.open_time);
    }

    #[test]
    fn expansion_before_series_start_is_insufficient_history() {
        let refinement = quarter_hours(&[(5.0, 1.0), (2.0, 1.0), (2.0, 1.0), (2.0, 1.0), (2.0, 1.0)]);
        let pivots = hourly(refinement.bars());
        let p = pivot(&pivots, 0, Side::Supply);

        let err = refine_pivot(&p, &pivots, &refinement, &refinement).unwrap_err();
        assert!(matches!(err, RefineError::InsufficientHistory { .. }));
    }

    #[test]
    fn refinement_starting_after_pivot_is_insufficient_history() {
        let base = quarter_hours(&[(2.0, 1.0); 12]);
        let pivots = hourly(base.bars());
        let refinement = BarSeries::new(base.bars()[5..].to_vec());
        let p = pivot(&pivots, 0, Side::Supply);

        let err = refine_pivot(&p, &pivots, &refinement, &base).unwrap_err();
        assert!(matches!(err, RefineError::InsufficientHistory { .. }));
    }

    #[test]
    fn last_pivot_bar_has_no_bracket() {
        let refinement = quarter_hours(&[(2.0, 1.0); 8]);
        let pivots = hourly(refinement.bars());
        let p = pivot(&pivots, 1, Side::Demand);
        assert!(matches!(
            refine_pivot(&p, &pivots, &refinement, &refinement),
            Err(RefineError::InsufficientHistory { .. })
        ));
    }
}
