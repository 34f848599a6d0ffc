//! # Dissonance - Command Line Front End
//!
//! Loads a calculator profile (JSON), runs one calculation mode and prints the
//! result as JSON on stdout. Diagnostics go to stderr through `tracing`; set
//! `RUST_LOG` or pass `--verbose` for more detail.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cli::{Args, Mode};
use dissonance_core::{
    CalculatorProfile, Direction, DissonanceCalculator, DissonanceMap, MapDimensions, PatternSearch,
};

#[derive(Debug, Serialize)]
struct SingleReport {
    model: String,
    dissonance: f64,
    spectra: Vec<SpectrumReport>,
}

#[derive(Debug, Serialize)]
struct SpectrumReport {
    name: String,
    fundamental_dissonance: f64,
    partial_dissonance: Vec<f64>,
    total: f64,
}

#[derive(Debug, Serialize)]
struct MapReport<'a> {
    dimensions: MapDimensions,
    step_size: f64,
    frequencies: Vec<f64>,
    map: &'a DissonanceMap,
}

#[derive(Debug, Serialize)]
struct OptimaReport<'a> {
    direction: Direction,
    /// `(frequency, dissonance)` pairs.
    optima: &'a [(f64, f64)],
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let profile = CalculatorProfile::load(&args.profile)?;
    let mut calc = profile.build().context("failed to build calculator from profile")?;
    info!(
        model = calc.model_name().unwrap_or("none"),
        spectra = calc.num_spectra(),
        "calculator ready"
    );

    let json = match args.mode {
        Mode::Single => serde_json::to_string_pretty(&single(&mut calc)?)?,
        Mode::Batch => serde_json::to_string_pretty(calc.calculate_chord_dissonances()?)?,
        Mode::Map => {
            calc.calculate_dissonance_map()?;
            let frequencies = (0..calc.num_steps())
                .filter_map(|step| calc.frequency_at_step(step as f64))
                .collect();
            serde_json::to_string_pretty(&MapReport {
                dimensions: calc.dimensions(),
                step_size: calc.step_size(),
                frequencies,
                map: calc.dissonance_map(),
            })?
        }
        Mode::Optimize { maxima, lower, upper, growth } => {
            let direction = if maxima { Direction::Maximize } else { Direction::Minimize };
            let bounds = match (lower, upper) {
                (None, None) => None,
                (lower, upper) => {
                    let range = calc.range().context("optimization needs a map range in the profile")?;
                    Some((lower.unwrap_or(range.start), upper.unwrap_or(range.end)))
                }
            };
            let optima = calc.optimize_with(
                &PatternSearch::default(),
                direction,
                bounds,
                growth,
            )?;
            serde_json::to_string_pretty(&OptimaReport { direction, optima })?
        }
    };

    println!("{json}");
    Ok(())
}

fn single(calc: &mut DissonanceCalculator) -> Result<SingleReport> {
    let dissonance = calc.calculate_dissonance()?;
    let spectra = calc
        .spectra()
        .iter()
        .map(|s| SpectrumReport {
            name: s.name().to_string(),
            fundamental_dissonance: s.fundamental_dissonance(),
            partial_dissonance: (0..s.num_partials()).map(|p| s.partial_dissonance(p)).collect(),
            total: s.total_dissonance(),
        })
        .collect();
    Ok(SingleReport {
        model: calc.model_name().unwrap_or_default().to_string(),
        dissonance,
        spectra,
    })
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
