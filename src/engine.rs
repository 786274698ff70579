use tracing::{debug, info, warn};

use crate::analysis::{detect_pivots, refine_pivot, select_zones, RefineError, ZoneStore};
use crate::config::EngineConfig;
use crate::data::{Side, Zone};
use crate::series::BarSeries;

/// Tally of what a single detection pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub pivots: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub no_match: usize,
    pub insufficient_history: usize,
}

impl PassReport {
    pub fn skipped(&self) -> usize {
        self.no_match + self.insufficient_history
    }
}

/// Everything a detection pass reads and writes. The host owns it between
/// passes and hands it back in for the next one.
#[derive(Debug, Clone)]
pub struct EngineState {
    pub pivot_series: BarSeries,
    pub refinement_series: BarSeries,
    pub chart_series: BarSeries,
    pub supply: ZoneStore,
    pub demand: ZoneStore,
    pub last_pass: PassReport,
}

impl EngineState {
    pub fn new(pivot_series: BarSeries, refinement_series: BarSeries, chart_series: BarSeries) -> Self {
        Self {
            pivot_series,
            refinement_series,
            chart_series,
            supply: ZoneStore::new(Side::Supply),
            demand: ZoneStore::new(Side::Demand),
            last_pass: PassReport::default(),
        }
    }

    /// Swap in new series. Stored zones are anchored to the old chart indices,
    /// so both stores are cleared.
    pub fn replace_series(
        &mut self,
        pivot_series: BarSeries,
        refinement_series: BarSeries,
        chart_series: BarSeries,
    ) {
        self.pivot_series = pivot_series;
        self.refinement_series = refinement_series;
        self.chart_series = chart_series;
        self.supply.clear();
        self.demand.clear();
        self.last_pass = PassReport::default();
    }

    pub fn store(&self, side: Side) -> &ZoneStore {
        match side {
            Side::Supply => &self.supply,
            Side::Demand => &self.demand,
        }
    }

    fn store_mut(&mut self, side: Side) -> &mut ZoneStore {
        match side {
            Side::Supply => &mut self.supply,
            Side::Demand => &mut self.demand,
        }
    }
}

/// Run one full detection pass over the pivot series, merging refined zones
/// into the stores. Pivots that cannot be refined are logged and skipped.
pub fn detect(mut state: EngineState, config: &EngineConfig) -> EngineState {
    let pivots = detect_pivots(&state.pivot_series, config.periods);
    let mut report = PassReport {
        pivots: pivots.len(),
        ..PassReport::default()
    };

    for pivot in &pivots {
        let refined = refine_pivot(
            pivot,
            &state.pivot_series,
            &state.refinement_series,
            &state.chart_series,
        );
        match refined {
            Ok(zone) => {
                if state.store_mut(pivot.side).insert(zone) {
                    debug!(
                        side = %pivot.side,
                        pivot_time = %pivot.open_time,
                        high = zone.high,
                        low = zone.low,
                        anchor = zone.anchor_index,
                        "zone stored"
                    );
                    report.inserted += 1;
                } else {
                    report.duplicates += 1;
                }
            }
            Err(err) => {
                warn!(pivot_time = %err.pivot_time(), "skipping pivot: {err}");
                match err {
                    RefineError::NoMatchFound { .. } => report.no_match += 1,
                    RefineError::InsufficientHistory { .. } => report.insufficient_history += 1,
                }
            }
        }
    }

    info!(
        pivots = report.pivots,
        inserted = report.inserted,
        duplicates = report.duplicates,
        skipped = report.skipped(),
        supply = state.supply.len(),
        demand = state.demand.len(),
        "detection pass complete"
    );
    state.last_pass = report;
    state
}

/// Zones chosen for display on each side, nearest to price first.
#[derive(Debug, Clone)]
pub struct Selection {
    pub price: f64,
    pub current_index: usize,
    pub supply: Vec<Zone>,
    pub demand: Vec<Zone>,
}

impl Selection {
    pub fn zones(&self, side: Side) -> &[Zone] {
        match side {
            Side::Supply => &self.supply,
            Side::Demand => &self.demand,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.supply.is_empty() && self.demand.is_empty()
    }
}

pub fn select(state: &EngineState, price: f64, config: &EngineConfig) -> Selection {
    Selection {
        price,
        current_index: state.chart_series.len().saturating_sub(1),
        supply: select_zones(state.store(Side::Supply), price, config.max_zones),
        demand: select_zones(state.store(Side::Demand), price, config.max_zones),
    }
}
