use chrono::{DateTime, Duration, Utc};
use itertools::Itertools;

use crate::data::{Bar, Timeframe};

/// Time-ordered bar sequence with positional access and time lookup.
#[derive(Debug, Clone, Default)]
pub struct BarSeries {
    bars: Vec<Bar>,
}

impl BarSeries {
    /// Bars must already be sorted by strictly increasing open time.
    pub fn new(bars: Vec<Bar>) -> Self {
        debug_assert!(bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        Self { bars }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn first(&self) -> Option<&Bar> {
        self.bars.first()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn open_time(&self, index: usize) -> Option<DateTime<Utc>> {
        self.bars.get(index).map(|bar| bar.timestamp)
    }

    /// Index of the first bar opening at or after `time`, or `None` when every
    /// bar opens before it.
    pub fn index_at_or_after(&self, time: DateTime<Utc>) -> Option<usize> {
        let idx = self.bars.partition_point(|bar| bar.timestamp < time);
        (idx < self.bars.len()).then_some(idx)
    }
}

/// Smallest gap between consecutive bars, taken as the native resolution.
pub fn infer_resolution(bars: &[Bar]) -> Option<Duration> {
    bars.windows(2)
        .map(|pair| pair[1].timestamp - pair[0].timestamp)
        .filter(|gap| *gap > Duration::zero())
        .min()
}

// 1970-01-01 was a Thursday; shift weekly buckets so they open on Monday.
const WEEK_ALIGN_SECS: i64 = 4 * 86_400;

fn bucket_start(timestamp: DateTime<Utc>, timeframe: Timeframe) -> i64 {
    let span = timeframe.as_secs();
    let secs = timestamp.timestamp();
    match timeframe {
        Timeframe::W1 => (secs - WEEK_ALIGN_SECS).div_euclid(span) * span + WEEK_ALIGN_SECS,
        _ => secs.div_euclid(span) * span,
    }
}

/// Aggregate base bars into epoch-aligned buckets of `timeframe`.
pub fn resample(bars: &[Bar], timeframe: Timeframe) -> BarSeries {
    let mut out = Vec::new();
    for (start, group) in &bars.iter().group_by(|bar| bucket_start(bar.timestamp, timeframe)) {
        let group: Vec<&Bar> = group.collect();
        let (Some(first), Some(last)) = (group.first(), group.last()) else {
            continue;
        };
        let Some(timestamp) = DateTime::from_timestamp(start, 0) else {
            continue;
        };
        out.push(Bar {
            timestamp,
            open: first.open,
            high: group.iter().map(|b| b.high).fold(f64::MIN, f64::max),
            low: group.iter().map(|b| b.low).fold(f64::MAX, f64::min),
            close: last.close,
            volume: group.iter().map(|b| b.volume).sum(),
        });
    }
    BarSeries::new(out)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;

    pub(crate) fn bar_at(timestamp: DateTime<Utc>, high: f64, low: f64) -> Bar {
        Bar {
            timestamp,
            open: low,
            high,
            low,
            close: high,
            volume: 1.0,
        }
    }

    fn minutes(start: DateTime<Utc>, count: usize, step: i64) -> Vec<Bar> {
        (0..count)
            .map(|i| {
                let t = start + Duration::minutes(step * i as i64);
                bar_at(t, 10.0 + i as f64, 5.0 + i as f64)
            })
            .collect()
    }

    #[test]
    fn index_at_or_after_uses_first_bar_not_before_time() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let series = BarSeries::new(minutes(start, 4, 15));

        assert_eq!(series.index_at_or_after(start), Some(0));
        assert_eq!(series.index_at_or_after(start - Duration::hours(1)), Some(0));
        assert_eq!(series.index_at_or_after(start + Duration::minutes(15)), Some(1));
        assert_eq!(series.index_at_or_after(start + Duration::minutes(16)), Some(2));
        assert_eq!(series.index_at_or_after(start + Duration::minutes(45)), Some(3));
        assert_eq!(series.index_at_or_after(start + Duration::minutes(46)), None);
    }

    #[test]
    fn lookup_on_empty_series_is_none() {
        let series = BarSeries::default();
        assert!(series.is_empty());
        assert!(series.index_at_or_after(Utc::now()).is_none());
    }

    #[test]
    fn resample_aggregates_ohlcv() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let bars = minutes(start, 8, 15);
        let hourly = resample(&bars, Timeframe::H1);

        assert_eq!(hourly.len(), 2);
        let first = &hourly.bars()[0];
        assert_eq!(first.timestamp, start);
        assert_eq!(first.high, 13.0);
        assert_eq!(first.low, 5.0);
        assert_eq!(first.open, bars[0].open);
        assert_eq!(first.close, bars[3].close);
        assert_eq!(first.volume, 4.0);
        assert_eq!(hourly.open_time(1), Some(start + Duration::hours(1)));
    }

    #[test]
    fn resample_aligns_weeks_to_monday() {
        // 2024-01-03 is a Wednesday.
        let wednesday = Utc.with_ymd_and_hms(2024, 1, 3, 12, 0, 0).unwrap();
        let weekly = resample(&[bar_at(wednesday, 2.0, 1.0)], Timeframe::W1);
        assert_eq!(
            weekly.open_time(0),
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn infers_native_resolution() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut bars = minutes(start, 3, 15);
        bars.push(bar_at(start + Duration::hours(5), 1.0, 0.5));
        assert_eq!(infer_resolution(&bars), Some(Duration::minutes(15)));
        assert_eq!(infer_resolution(&bars[..1]), None);
    }
}
