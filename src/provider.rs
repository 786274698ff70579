use anyhow::Result;
use tracing::{debug, info, warn};

use crate::data::{Bar, Timeframe};
use crate::series::{resample, BarSeries};

/// Source of bar series at arbitrary timeframes with on-demand history.
pub trait BarProvider {
    fn series(&self, timeframe: Timeframe) -> BarSeries;

    /// Extend the available history further back. Returns the number of newly
    /// available base bars; `0` once the source is exhausted.
    fn load_more_history(&mut self) -> Result<usize>;
}

/// Serves an in-memory CSV history, revealed from the newest bar backward in
/// fixed-size chunks.
#[derive(Debug, Clone)]
pub struct CsvBarProvider {
    bars: Vec<Bar>,
    visible_from: usize,
    chunk: usize,
}

impl CsvBarProvider {
    pub fn new(bars: Vec<Bar>, chunk: usize) -> Self {
        let chunk = chunk.max(1);
        let visible_from = bars.len().saturating_sub(chunk);
        Self {
            bars,
            visible_from,
            chunk,
        }
    }

    pub fn visible(&self) -> &[Bar] {
        &self.bars[self.visible_from..]
    }
}

impl BarProvider for CsvBarProvider {
    fn series(&self, timeframe: Timeframe) -> BarSeries {
        resample(self.visible(), timeframe)
    }

    fn load_more_history(&mut self) -> Result<usize> {
        let next = self.visible_from.saturating_sub(self.chunk);
        let added = self.visible_from - next;
        self.visible_from = next;
        debug!(added, visible = self.bars.len() - next, "revealed more history");
        Ok(added)
    }
}

/// Request history until `timeframe` has at least `target` bars or the
/// provider runs dry. A dry or failing provider is not an error; the series is
/// returned with whatever history exists.
pub fn ensure_history<P: BarProvider + ?Sized>(
    provider: &mut P,
    timeframe: Timeframe,
    target: usize,
) -> Result<BarSeries> {
    let mut series = provider.series(timeframe);
    while series.len() < target {
        let added = match provider.load_more_history() {
            Ok(added) => added,
            Err(err) => {
                warn!(%timeframe, available = series.len(), "history request failed: {err}");
                break;
            }
        };
        if added == 0 {
            warn!(
                %timeframe,
                available = series.len(),
                target,
                "history exhausted before reaching target bar count"
            );
            break;
        }
        series = provider.series(timeframe);
    }
    info!(%timeframe, bars = series.len(), "history ready");
    Ok(series)
}
