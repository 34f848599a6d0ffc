use clap::{Parser, Subcommand};
use dissonance_core::DEFAULT_GROWTH_FACTOR;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Args {
    /// Calculator profile (.json)
    #[arg(value_name = "PROFILE")]
    pub profile: String,

    /// Log calculation details to stderr
    #[arg(long, short, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub mode: Mode,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Mode {
    /// Dissonance of all spectra sounding together, with per-element shares
    Single,
    /// Dissonance of every chord in the profile
    Batch,
    /// Sweep the variable spectrum (or the x/y pair) across the map range
    Map,
    /// Local dissonance optima of the variable spectrum
    Optimize {
        /// Search for maxima instead of minima
        #[arg(long, default_value_t = false)]
        maxima: bool,

        /// Lower search bound in Hz (defaults to the range start)
        #[arg(long)]
        lower: Option<f64>,

        /// Upper search bound in Hz (defaults to the range end)
        #[arg(long)]
        upper: Option<f64>,

        /// Ratio between successive start points
        #[arg(long, default_value_t = DEFAULT_GROWTH_FACTOR)]
        growth: f64,
    },
}
