use std::path::PathBuf;

use chrono::Duration;
use chrono_tz::Tz;
use clap::Parser;
use thiserror::Error;

use crate::data::Timeframe;
use crate::output::Rgba;

/// Command-line configuration for the supply/demand zone tool.
#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct AppConfig {
    /// Input CSV file path containing OHLCV data at the finest available resolution.
    #[arg(short = 'i', long = "input", value_name = "FILE")]
    pub input_path: String,

    /// Bars on each side a swing high/low must dominate.
    #[arg(short = 'p', long, default_value_t = 5)]
    pub periods: usize,

    /// Timeframe swing highs and lows are detected on.
    #[arg(long, default_value = "h4")]
    pub pivot_timeframe: Timeframe,

    /// Finer timeframe used to refine zone boundaries.
    #[arg(long, default_value = "m15")]
    pub zone_timeframe: Timeframe,

    /// Timeframe of the displayed chart that zones are anchored to.
    #[arg(long, default_value = "m15")]
    pub chart_timeframe: Timeframe,

    /// Target number of pivot-timeframe bars of history.
    #[arg(long, default_value_t = 500)]
    pub history_bars: usize,

    /// Base bars revealed per history request.
    #[arg(long, default_value_t = 2000)]
    pub history_chunk: usize,

    /// Maximum zones displayed per side.
    #[arg(short = 'k', long, default_value_t = 3)]
    pub max_zones: usize,

    /// Supply zone color (name or #RRGGBB).
    #[arg(long, default_value = "Red")]
    pub supply_color: String,

    /// Demand zone color (name or #RRGGBB).
    #[arg(long, default_value = "Lime")]
    pub demand_color: String,

    /// Zone fill opacity in percent.
    #[arg(long, default_value_t = 20)]
    pub opacity: u8,

    /// Current reference price. Defaults to the last chart close.
    #[arg(long)]
    pub price: Option<f64>,

    /// Time zone naive CSV timestamps are expressed in.
    #[arg(long, default_value = "UTC")]
    pub timezone: String,

    /// Also write the draw instructions to this CSV file.
    #[arg(long)]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("periods must be at least 1 (got {0})")]
    Periods(usize),

    #[error("max zones must be at least 1 (got {0})")]
    MaxZones(usize),

    #[error("opacity must be between 0 and 100 (got {0})")]
    Opacity(u8),

    #[error("zone timeframe {zone} must be finer than pivot timeframe {pivot}")]
    TimeframeOrder { zone: Timeframe, pivot: Timeframe },

    #[error("{timeframe} is finer than the input resolution of {resolution_secs}s")]
    BelowResolution {
        timeframe: Timeframe,
        resolution_secs: i64,
    },

    #[error("history chunk must be at least 1 bar")]
    HistoryChunk,

    #[error("unknown color '{0}'")]
    Color(String),

    #[error("unknown time zone '{0}'")]
    TimeZone(String),

    #[error("reference price must be finite (got {0})")]
    Price(f64),
}

/// Parameters the detection engine runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub periods: usize,
    pub max_zones: usize,
}

impl EngineConfig {
    pub fn new(periods: usize, max_zones: usize) -> Result<Self, ConfigError> {
        if periods < 1 {
            return Err(ConfigError::Periods(periods));
        }
        if max_zones < 1 {
            return Err(ConfigError::MaxZones(max_zones));
        }
        Ok(Self { periods, max_zones })
    }
}

/// Fully validated run settings.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub engine: EngineConfig,
    pub timezone: Tz,
    pub supply_color: Rgba,
    pub demand_color: Rgba,
}

impl AppConfig {
    pub fn validate(&self) -> Result<RunSettings, ConfigError> {
        let engine = EngineConfig::new(self.periods, self.max_zones)?;
        if self.opacity > 100 {
            return Err(ConfigError::Opacity(self.opacity));
        }
        if self.zone_timeframe >= self.pivot_timeframe {
            return Err(ConfigError::TimeframeOrder {
                zone: self.zone_timeframe,
                pivot: self.pivot_timeframe,
            });
        }
        if self.history_chunk == 0 {
            return Err(ConfigError::HistoryChunk);
        }
        if let Some(price) = self.price {
            if !price.is_finite() {
                return Err(ConfigError::Price(price));
            }
        }
        let timezone: Tz = self
            .timezone
            .parse()
            .map_err(|_| ConfigError::TimeZone(self.timezone.clone()))?;
        let supply_color = Rgba::parse(&self.supply_color)
            .ok_or_else(|| ConfigError::Color(self.supply_color.clone()))?
            .with_opacity(self.opacity);
        let demand_color = Rgba::parse(&self.demand_color)
            .ok_or_else(|| ConfigError::Color(self.demand_color.clone()))?
            .with_opacity(self.opacity);

        Ok(RunSettings {
            engine,
            timezone,
            supply_color,
            demand_color,
        })
    }

    /// Every requested timeframe must be at least as coarse as the input data.
    pub fn check_resolution(&self, resolution: Duration) -> Result<(), ConfigError> {
        for timeframe in [self.pivot_timeframe, self.zone_timeframe, self.chart_timeframe] {
            if timeframe.duration() < resolution {
                return Err(ConfigError::BelowResolution {
                    timeframe,
                    resolution_secs: resolution.num_seconds(),
                });
            }
        }
        Ok(())
    }
}
