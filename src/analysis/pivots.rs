use crate::data::{Pivot, Side};
use crate::series::BarSeries;

/// True when no bar within `periods` positions on either side of `center`
/// has a strictly greater high. Positions without a full window never qualify.
pub fn is_local_high(series: &BarSeries, center: usize, periods: usize) -> bool {
    is_extreme(series.bars().len(), center, periods, |i| {
        series.bars()[i].high > series.bars()[center].high
    })
}

/// Mirror of [`is_local_high`] on lows.
pub fn is_local_low(series: &BarSeries, center: usize, periods: usize) -> bool {
    is_extreme(series.bars().len(), center, periods, |i| {
        series.bars()[i].low < series.bars()[center].low
    })
}

fn is_extreme(len: usize, center: usize, periods: usize, beats: impl Fn(usize) -> bool) -> bool {
    if periods == 0 || center < periods || center + periods >= len {
        return false;
    }
    !(center - periods..center)
        .chain(center + 1..=center + periods)
        .any(beats)
}

/// Scan every candidate position from oldest to newest, checking highs and
/// lows independently. Ties with neighbours still confirm the pivot.
pub fn detect_pivots(series: &BarSeries, periods: usize) -> Vec<Pivot> {
    let len = series.len();
    if periods == 0 || len < 2 * periods + 1 {
        return Vec::new();
    }

    let mut pivots = Vec::new();
    for center in periods..len - periods {
        let bar = &series.bars()[center];
        if is_local_high(series, center, periods) {
            pivots.push(Pivot {
                index: center,
                side: Side::Supply,
                price: bar.high,
                open_time: bar.timestamp,
            });
        }
        if is_local_low(series, center, periods) {
            pivots.push(Pivot {
                index: center,
                side: Side::Demand,
                price: bar.low,
                open_time: bar.timestamp,
            });
        }
    }
    pivots
}
