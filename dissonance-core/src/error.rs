//! # Error Module
//!
//! Every fallible mutator and evaluation entry point in this crate reports
//! failure through [`DissonanceError`]. Rejected input never changes the
//! state of the object it was passed to.

use thiserror::Error;

/// Errors raised by spectra, preprocessors and the dissonance calculator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DissonanceError {
    /// A frequency (real or ratio) was zero, negative or not finite.
    #[error("frequency must be positive, got {0}")]
    NonPositiveFrequency(f64),

    /// An amplitude (real or ratio) was zero, negative or not finite.
    #[error("amplitude must be positive, got {0}")]
    NonPositiveAmplitude(f64),

    /// The spectrum already holds a partial with this ratio (ratio 1 is the fundamental).
    #[error("spectrum already contains a partial with ratio {0}")]
    DuplicatePartial(f64),

    /// The ratio falls inside the minimum-interval band of an existing partial.
    #[error("ratio {ratio} is closer to ratio {existing} than the minimum interval {min_interval} permits")]
    PartialTooClose {
        ratio: f64,
        existing: f64,
        min_interval: f64,
    },

    #[error("minimum interval must be >= 1, got {0}")]
    InvalidMinInterval(f64),

    #[error("invalid frequency range {start}..{end}: start must be positive and end greater than start")]
    InvalidRange { start: f64, end: f64 },

    #[error("step count must be positive")]
    InvalidStepCount,

    #[error("invalid hearing range {low}..{high}")]
    InvalidHearingRange { low: f64, high: f64 },

    #[error("growth factor must be greater than 1, got {0}")]
    InvalidGrowthFactor(f64),

    /// A chord must carry exactly one tone per configured spectrum.
    #[error("chord has {got} tones but the calculator holds {expected} spectra")]
    ChordSizeMismatch { expected: usize, got: usize },

    #[error("no dissonance model has been assigned")]
    NoModel,

    #[error("spectrum index {index} is out of range for {len} spectra")]
    SpectrumIndexOutOfRange { index: usize, len: usize },

    /// Sweep or optimization requested while the calculator is not ready.
    #[error("calculator is not ready to process: {0}")]
    PreconditionNotMet(&'static str),
}

pub type Result<T> = std::result::Result<T, DissonanceError>;

/// Checks a frequency value, returning it unchanged when valid.
pub(crate) fn positive_frequency(freq: f64) -> Result<f64> {
    if freq.is_finite() && freq > 0.0 {
        Ok(freq)
    } else {
        Err(DissonanceError::NonPositiveFrequency(freq))
    }
}

/// Checks an amplitude value, returning it unchanged when valid.
pub(crate) fn positive_amplitude(amp: f64) -> Result<f64> {
    if amp.is_finite() && amp > 0.0 {
        Ok(amp)
    } else {
        Err(DissonanceError::NonPositiveAmplitude(amp))
    }
}
