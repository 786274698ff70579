use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};

/// Single OHLCV bar sampled at a uniform interval.
#[derive(Debug, Clone)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Supply,
    Demand,
}

impl Side {
    pub fn label(self) -> &'static str {
        match self {
            Side::Supply => "supply",
            Side::Demand => "demand",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Confirmed swing extreme on the pivot-granularity series.
#[derive(Debug, Clone)]
pub struct Pivot {
    pub index: usize,
    pub side: Side,
    /// The pivot bar's high for supply, low for demand.
    pub price: f64,
    pub open_time: DateTime<Utc>,
}

/// Refined price band anchored on the chart series. Never mutated after creation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Zone {
    pub anchor_index: usize,
    pub high: f64,
    pub low: f64,
}

impl Zone {
    pub fn new(anchor_index: usize, a: f64, b: f64) -> Self {
        Self {
            anchor_index,
            high: a.max(b),
            low: a.min(b),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
    W1,
}

impl Timeframe {
    pub fn duration(self) -> Duration {
        match self {
            Timeframe::M1 => Duration::minutes(1),
            Timeframe::M5 => Duration::minutes(5),
            Timeframe::M15 => Duration::minutes(15),
            Timeframe::M30 => Duration::minutes(30),
            Timeframe::H1 => Duration::hours(1),
            Timeframe::H4 => Duration::hours(4),
            Timeframe::D1 => Duration::days(1),
            Timeframe::W1 => Duration::weeks(1),
        }
    }

    pub fn as_secs(self) -> i64 {
        self.duration().num_seconds()
    }

    pub fn code(self) -> &'static str {
        match self {
            Timeframe::M1 => "m1",
            Timeframe::M5 => "m5",
            Timeframe::M15 => "m15",
            Timeframe::M30 => "m30",
            Timeframe::H1 => "h1",
            Timeframe::H4 => "h4",
            Timeframe::D1 => "d1",
            Timeframe::W1 => "w1",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "m1" => Ok(Timeframe::M1),
            "m5" => Ok(Timeframe::M5),
            "m15" => Ok(Timeframe::M15),
            "m30" => Ok(Timeframe::M30),
            "h1" => Ok(Timeframe::H1),
            "h4" => Ok(Timeframe::H4),
            "d1" => Ok(Timeframe::D1),
            "w1" => Ok(Timeframe::W1),
            other => Err(format!(
                "unknown timeframe '{other}' (expected m1, m5, m15, m30, h1, h4, d1 or w1)"
            )),
        }
    }
}
