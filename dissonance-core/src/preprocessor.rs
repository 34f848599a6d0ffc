//! # Preprocessor Module
//!
//! Transforms applied to a working copy of the spectra before a dissonance model
//! sees them. Preprocessors run in chain order and may mute elements, but must
//! not add, remove or reorder partials: accumulated dissonance is folded back
//! onto the caller's spectra by position.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{DissonanceError, Result};
use crate::spectrum::OvertoneSpectrum;

pub trait Preprocessor: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn process(&self, spectra: &mut [OvertoneSpectrum]);

    fn clone_box(&self) -> Box<dyn Preprocessor>;
}

impl Clone for Box<dyn Preprocessor> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// A bandpass over real frequencies: mutes every fundamental and partial that
/// lies outside the hearing range (20 Hz - 20 kHz unless changed).
#[derive(Debug, Clone, PartialEq)]
pub struct HearingRangePreprocessor {
    low: f64,
    high: f64,
}

impl HearingRangePreprocessor {
    pub const DEFAULT_LOW: f64 = 20.0;
    pub const DEFAULT_HIGH: f64 = 20_000.0;

    pub fn new() -> Self {
        Self {
            low: Self::DEFAULT_LOW,
            high: Self::DEFAULT_HIGH,
        }
    }

    pub fn with_range(low: f64, high: f64) -> Result<Self> {
        let mut preprocessor = Self::new();
        preprocessor.set_hearing_range(low, high)?;
        Ok(preprocessor)
    }

    pub fn set_hearing_range(&mut self, low: f64, high: f64) -> Result<()> {
        if !(low.is_finite() && high.is_finite() && low > 0.0 && high > low) {
            return Err(DissonanceError::InvalidHearingRange { low, high });
        }
        self.low = low;
        self.high = high;
        Ok(())
    }

    pub fn hearing_range(&self) -> (f64, f64) {
        (self.low, self.high)
    }

    fn audible(&self, freq: f64) -> bool {
        freq >= self.low && freq <= self.high
    }
}

impl Default for HearingRangePreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Preprocessor for HearingRangePreprocessor {
    fn name(&self) -> &str {
        "Hearing Range"
    }

    fn description(&self) -> &str {
        "Applies a bandpass filter to remove frequencies that lie outside the human hearing range."
    }

    fn process(&self, spectra: &mut [OvertoneSpectrum]) {
        for spectrum in spectra.iter_mut() {
            if !self.audible(spectrum.fundamental_frequency()) {
                spectrum.mute_fundamental(true);
            }
            for p in 0..spectrum.num_partials() {
                if !self.audible(spectrum.real_frequency(p)) {
                    spectrum.mute_partial(p, true);
                }
            }
        }
    }

    fn clone_box(&self) -> Box<dyn Preprocessor> {
        Box::new(self.clone())
    }
}

/// Serializable description of a preprocessor, built into a trait object on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PreprocessorKind {
    HearingRange {
        #[serde(default = "PreprocessorKind::default_low")]
        low: f64,
        #[serde(default = "PreprocessorKind::default_high")]
        high: f64,
    },
}

impl PreprocessorKind {
    fn default_low() -> f64 {
        HearingRangePreprocessor::DEFAULT_LOW
    }
    fn default_high() -> f64 {
        HearingRangePreprocessor::DEFAULT_HIGH
    }

    pub fn build(&self) -> Result<Box<dyn Preprocessor>> {
        match *self {
            PreprocessorKind::HearingRange { low, high } => {
                Ok(Box::new(HearingRangePreprocessor::with_range(low, high)?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_range_mutes_infrasonic_partials_only() {
        let mut spectrum = OvertoneSpectrum::with_fundamental("low", 5.0, 1.0).unwrap();
        spectrum.add_partial(3.0, 1.0).unwrap(); // 15 Hz
        spectrum.add_partial(200.0, 1.0).unwrap(); // 1000 Hz
        let mut spectra = [spectrum];

        HearingRangePreprocessor::new().process(&mut spectra);

        assert!(spectra[0].fundamental_is_muted());
        assert!(spectra[0].partial_is_muted(0));
        assert!(!spectra[0].partial_is_muted(1));
    }

    #[test]
    fn mutes_above_upper_bound() {
        let mut spectrum = OvertoneSpectrum::with_fundamental("high", 1000.0, 1.0).unwrap();
        spectrum.add_partial(4.0, 1.0).unwrap();
        spectrum.add_partial(6.0, 1.0).unwrap();
        let mut spectra = [spectrum];

        HearingRangePreprocessor::with_range(100.0, 5000.0)
            .unwrap()
            .process(&mut spectra);

        assert!(!spectra[0].fundamental_is_muted());
        assert!(!spectra[0].partial_is_muted(0));
        assert!(spectra[0].partial_is_muted(1));
    }

    #[test]
    fn invalid_range_is_rejected() {
        let mut preprocessor = HearingRangePreprocessor::new();
        assert!(preprocessor.set_hearing_range(500.0, 100.0).is_err());
        assert!(preprocessor.set_hearing_range(0.0, 100.0).is_err());
        assert_eq!(preprocessor.hearing_range(), (20.0, 20_000.0));
    }

    #[test]
    fn kind_builds_with_defaults() {
        let kind: PreprocessorKind = serde_json::from_str(r#"{"kind":"hearing-range"}"#).unwrap();
        let built = kind.build().unwrap();
        assert_eq!(built.name(), "Hearing Range");
        assert_eq!(built.clone().description(), built.description());
    }
}
