mod analysis;
mod config;
mod data;
mod engine;
mod loader;
mod output;
mod provider;
mod series;

use std::fs::File;
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::AppConfig;
use engine::{detect, select, EngineState};
use loader::{load_bars_from_csv, validate_series};
use output::{build_instructions, print_report, write_drawings_csv, Renderer, TableRenderer};
use provider::{ensure_history, BarProvider, CsvBarProvider};
use series::infer_resolution;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "supply_demand_zones=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::parse();
    run(&config)
}

fn run(config: &AppConfig) -> Result<()> {
    let settings = config.validate().context("invalid configuration")?;

    let input_path = &config.input_path;
    if !Path::new(input_path).exists() {
        bail!("input file {:?} does not exist", input_path);
    }

    let raw_bars = load_bars_from_csv(input_path, settings.timezone)
        .with_context(|| format!("failed to load input data from {:?}", input_path))?;
    validate_series(&raw_bars)?;
    if let Some(resolution) = infer_resolution(&raw_bars) {
        config
            .check_resolution(resolution)
            .context("invalid configuration")?;
    }

    let start = &raw_bars[0].timestamp;
    let end = &raw_bars[raw_bars.len() - 1].timestamp;
    info!(
        bars = raw_bars.len(),
        from = %start.format("%Y-%m-%d %H:%M"),
        to = %end.format("%Y-%m-%d %H:%M"),
        "loaded input bars"
    );

    let mut provider = CsvBarProvider::new(raw_bars, config.history_chunk);
    let pivot_series = ensure_history(&mut provider, config.pivot_timeframe, config.history_bars)?;
    let refinement_series = provider.series(config.zone_timeframe);
    let chart_series = provider.series(config.chart_timeframe);

    if chart_series.is_empty() {
        bail!("no {} bars available for the chart", config.chart_timeframe);
    }
    let current_price = match (config.price, chart_series.last()) {
        (Some(price), _) => price,
        (None, Some(bar)) => bar.close,
        (None, None) => bail!("chart series is empty"),
    };

    let state = EngineState::new(pivot_series, refinement_series, chart_series);
    let state = detect(state, &settings.engine);
    let selection = select(&state, current_price, &settings.engine);

    let mut renderer = TableRenderer::new();
    for instruction in build_instructions(&selection, settings.supply_color, settings.demand_color) {
        renderer.draw_rectangle(&instruction);
    }

    print_report(&renderer, &selection, &state.last_pass);

    if let Some(path) = &config.export {
        let file = File::create(path).with_context(|| format!("failed to create {:?}", path))?;
        write_drawings_csv(file, renderer.drawings())?;
        info!(path = %path.display(), drawings = renderer.drawings().len(), "exported drawings");
    }

    Ok(())
}
