use std::fs::File;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use csv::StringRecord;
use thiserror::Error;
use tracing::debug;

use crate::data::Bar;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("input file contains no valid rows")]
    Empty,

    #[error("unable to infer timestamp from record: {0:?}")]
    Timestamp(StringRecord),

    #[error("failed to parse numeric field '{field}' from value '{value}'")]
    ParseNumber { field: &'static str, value: String },

    #[error("non-finite value '{value}' in field '{field}'")]
    NonFinite { field: &'static str, value: String },

    #[error("bar at {timestamp} has high {high} below low {low}")]
    InvertedBar {
        timestamp: DateTime<Utc>,
        high: f64,
        low: f64,
    },
}

/// Load OHLCV bars from a CSV file whose naive timestamps are expressed in `tz`.
pub fn load_bars_from_csv<P: AsRef<Path>>(path: P, tz: Tz) -> Result<Vec<Bar>> {
    let path_ref = path.as_ref();
    let file = File::open(path_ref).with_context(|| format!("failed to open {:?}", path_ref))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(file);

    let mut bars = Vec::new();
    let mut skipped = 0usize;
    let mut previous: Option<DateTime<Utc>> = None;
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        match parse_record(&record, tz, previous)? {
            Some(bar) => {
                previous = Some(bar.timestamp);
                bars.push(bar);
            }
            None => skipped += 1,
        }
    }

    if bars.is_empty() {
        return Err(LoaderError::Empty.into());
    }
    debug!(rows = bars.len(), skipped, "parsed csv bars");

    bars.sort_by_key(|bar| bar.timestamp);
    Ok(bars)
}

fn parse_record(
    record: &StringRecord,
    tz: Tz,
    previous: Option<DateTime<Utc>>,
) -> Result<Option<Bar>> {
    // Header rows start with a column name rather than a date.
    if let Some(first) = record.get(0) {
        let first = first.trim();
        if first.eq_ignore_ascii_case("date")
            || first.eq_ignore_ascii_case("time")
            || first.eq_ignore_ascii_case("timestamp")
        {
            return Ok(None);
        }
    }

    let fields: Vec<String> = record
        .iter()
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .collect();
    if fields.len() < 5 {
        return Ok(None);
    }

    let (datetime, offset) = if fields.len() >= 7 {
        let date = fields[0].as_str();
        let time = fields[1].as_str();
        (parse_datetime_pair(date, time)?, 2)
    } else {
        parse_datetime_string(fields[0].as_str())?
            .map(|dt| (dt, 1))
            .ok_or_else(|| anyhow!(LoaderError::Timestamp(record.clone())))?
    };

    let timestamp = to_utc(tz, &datetime, previous);

    let open = parse_number(fields.get(offset).map(String::as_str), "open")?;
    let high = parse_number(fields.get(offset + 1).map(String::as_str), "high")?;
    let low = parse_number(fields.get(offset + 2).map(String::as_str), "low")?;
    let close = parse_number(fields.get(offset + 3).map(String::as_str), "close")?;
    let volume = match fields.get(offset + 4) {
        Some(value) => parse_number(Some(value.as_str()), "volume")?,
        None => 0.0,
    };

    if high < low {
        return Err(LoaderError::InvertedBar {
            timestamp,
            high,
            low,
        }
        .into());
    }

    Ok(Some(Bar {
        timestamp,
        open,
        high,
        low,
        close,
        volume,
    }))
}

/// Resolve a local time to UTC. A repeated fall-back hour takes the later
/// offset once the earlier reading would not move past the previous row.
fn to_utc(tz: Tz, datetime: &NaiveDateTime, previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    match tz.from_local_datetime(datetime) {
        chrono::LocalResult::Single(dt) => dt.with_timezone(&Utc),
        chrono::LocalResult::Ambiguous(earlier, later) => {
            let earlier = earlier.with_timezone(&Utc);
            match previous {
                Some(prev) if earlier <= prev => later.with_timezone(&Utc),
                _ => earlier,
            }
        }
        chrono::LocalResult::None => tz.from_utc_datetime(datetime).with_timezone(&Utc),
    }
}

fn parse_number(value: Option<&str>, field: &'static str) -> Result<f64> {
    let value = value.ok_or_else(|| LoaderError::ParseNumber {
        field,
        value: String::from("<missing>"),
    })?;
    let number = value
        .replace(',', "")
        .parse::<f64>()
        .map_err(|_| LoaderError::ParseNumber {
            field,
            value: value.to_string(),
        })?;
    if !number.is_finite() {
        return Err(LoaderError::NonFinite {
            field,
            value: value.to_string(),
        }
        .into());
    }
    Ok(number)
}

fn parse_datetime_pair(date_str: &str, time_str: &str) -> Result<NaiveDateTime> {
    let date = parse_date(date_str)?;
    let time = parse_time(time_str)?;
    Ok(NaiveDateTime::new(date, time))
}

fn parse_datetime_string(value: &str) -> Result<Option<NaiveDateTime>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let patterns = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y/%m/%d %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%SZ",
    ];

    for pattern in &patterns {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, pattern) {
            return Ok(Some(datetime));
        }
    }

    // Epoch seconds or milliseconds.
    if let Ok(raw) = trimmed.parse::<i64>() {
        let datetime = if raw.abs() >= 100_000_000_000 {
            DateTime::from_timestamp_millis(raw)
        } else {
            DateTime::from_timestamp(raw, 0)
        };
        return Ok(datetime.map(|dt| dt.naive_utc()));
    }

    Ok(None)
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    let patterns = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%Y.%m.%d"];
    for pattern in &patterns {
        if let Ok(date) = NaiveDate::parse_from_str(value, pattern) {
            return Ok(date);
        }
    }
    Err(LoaderError::Timestamp(StringRecord::from(vec![value.to_string()])).into())
}

fn parse_time(value: &str) -> Result<NaiveTime> {
    let patterns = ["%H:%M:%S%.f", "%H:%M:%S", "%H:%M"];
    for pattern in &patterns {
        if let Ok(time) = NaiveTime::parse_from_str(value, pattern) {
            return Ok(time);
        }
    }
    Err(LoaderError::Timestamp(StringRecord::from(vec![value.to_string()])).into())
}

pub fn validate_series(bars: &[Bar]) -> Result<()> {
    if bars.len() < 2 {
        return Err(anyhow!("not enough bars for analysis (need at least 2)"));
    }

    for pair in bars.windows(2) {
        if pair[1].timestamp <= pair[0].timestamp {
            return Err(anyhow!(
                "timestamps must be strictly increasing (duplicate or out of order at {})",
                pair[1].timestamp
            ));
        }
    }

    Ok(())
}
