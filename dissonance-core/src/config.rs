//! # Calculator Profile Module
//!
//! A serializable description of a full calculator setup: spectra, model,
//! preprocessor chain, map settings and chords. Profiles are stored as JSON and
//! turned into a [`DissonanceCalculator`] with [`CalculatorProfile::build`].

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, warn};

use crate::calculator::{ChordTone, DissonanceCalculator, MapDimensions, StepMode};
use crate::model::ModelKind;
use crate::preprocessor::PreprocessorKind;
use crate::spectrum::OvertoneSpectrum;

/// One overtone spectrum as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumProfile {
    #[serde(default = "SpectrumProfile::default_name")]
    pub name: String,
    #[serde(default = "SpectrumProfile::default_min_interval")]
    pub min_interval: f64,
    pub fundamental_frequency: f64,
    #[serde(default = "SpectrumProfile::default_amplitude")]
    pub fundamental_amplitude: f64,
    /// `(frequency ratio, amplitude ratio)` pairs.
    #[serde(default)]
    pub partials: Vec<(f64, f64)>,
    #[serde(default)]
    pub muted: bool,
}

impl SpectrumProfile {
    fn default_name() -> String {
        "untitled".to_string()
    }
    fn default_min_interval() -> f64 {
        1.0
    }
    fn default_amplitude() -> f64 {
        1.0
    }

    /// Harmonic partials 2..=count with amplitudes decaying by `rolloff` per partial.
    pub fn harmonic(name: &str, fundamental: f64, count: u32, rolloff: f64) -> Self {
        Self {
            name: name.to_string(),
            min_interval: Self::default_min_interval(),
            fundamental_frequency: fundamental,
            fundamental_amplitude: Self::default_amplitude(),
            partials: (2..=count)
                .map(|n| (n as f64, rolloff.powi(n as i32 - 1)))
                .collect(),
            muted: false,
        }
    }

    pub fn to_spectrum(&self) -> Result<OvertoneSpectrum> {
        let mut spectrum = OvertoneSpectrum::new(self.name.clone());
        spectrum.set_min_interval(self.min_interval)?;
        spectrum
            .set_fundamental(self.fundamental_frequency, self.fundamental_amplitude)
            .with_context(|| format!("spectrum '{}' has an invalid fundamental", self.name))?;
        for &(ratio, amplitude) in &self.partials {
            spectrum
                .add_partial(ratio, amplitude)
                .with_context(|| format!("spectrum '{}' rejected partial {ratio}", self.name))?;
        }
        spectrum.set_muted(self.muted);
        Ok(spectrum)
    }

    pub fn from_spectrum(spectrum: &OvertoneSpectrum) -> Self {
        Self {
            name: spectrum.name().to_string(),
            min_interval: spectrum.min_interval(),
            fundamental_frequency: spectrum.fundamental_frequency(),
            fundamental_amplitude: spectrum.fundamental_amplitude(),
            partials: spectrum
                .partials()
                .iter()
                .map(|p| (p.frequency, p.amplitude))
                .collect(),
            muted: spectrum.is_muted(),
        }
    }
}

/// Settings for dissonance maps and optimization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapProfile {
    pub start: f64,
    pub end: f64,
    #[serde(default = "MapProfile::default_steps")]
    pub steps: usize,
    #[serde(default)]
    pub step_mode: StepMode,
    #[serde(default)]
    pub dimensions: MapDimensions,
    #[serde(default)]
    pub variable_spectrum: usize,
    #[serde(default)]
    pub x_spectrum: usize,
    #[serde(default = "MapProfile::default_y_spectrum")]
    pub y_spectrum: usize,
}

impl MapProfile {
    fn default_steps() -> usize {
        1000
    }
    fn default_y_spectrum() -> usize {
        1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculatorProfile {
    #[serde(default)]
    pub model: ModelKind,
    #[serde(default)]
    pub preprocessors: Vec<PreprocessorKind>,
    #[serde(default = "CalculatorProfile::default_accumulate")]
    pub accumulate_partial_dissonance: bool,
    pub spectra: Vec<SpectrumProfile>,
    #[serde(default)]
    pub map: Option<MapProfile>,
    /// One tone per spectrum for each chord.
    #[serde(default)]
    pub chords: Vec<Vec<ChordTone>>,
}

impl CalculatorProfile {
    fn default_accumulate() -> bool {
        true
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("failed to parse calculator profile")
    }

    /// Loads a profile from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        let mut data = String::new();
        file.read_to_string(&mut data)?;
        let profile = Self::from_json_str(&data).with_context(|| format!("in {}", path.display()))?;
        debug!(path = %path.display(), spectra = profile.spectra.len(), "profile loaded");
        Ok(profile)
    }

    /// Saves the profile as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json_string = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
        file.write_all(json_string.as_bytes())?;
        Ok(())
    }

    /// Builds a calculator. Any rejected value aborts the build.
    pub fn build(&self) -> Result<DissonanceCalculator> {
        let mut calc = DissonanceCalculator::new();
        calc.set_model(self.model.build());
        calc.set_accumulate_partial_dissonance(self.accumulate_partial_dissonance);

        for kind in &self.preprocessors {
            calc.add_preprocessor(kind.build().with_context(|| format!("invalid preprocessor {kind:?}"))?);
        }
        for spectrum in &self.spectra {
            calc.add_spectrum(spectrum.to_spectrum()?);
        }

        if let Some(map) = &self.map {
            calc.set_dimensions(map.dimensions);
            calc.set_step_mode(map.step_mode);
            calc.set_range(map.start, map.end).context("invalid map range")?;
            calc.set_num_steps(map.steps).context("invalid map step count")?;
            calc.set_variable_spectrum(map.variable_spectrum);
            calc.set_x_spectrum(map.x_spectrum);
            calc.set_y_spectrum(map.y_spectrum);
        }

        for (i, tones) in self.chords.iter().enumerate() {
            calc.add_chord(tones.clone())
                .with_context(|| format!("invalid chord {i}"))?;
        }

        if self.map.is_some() && !calc.is_ready_to_process() {
            warn!("profile defines a map but the calculator is not ready to process it");
        }
        Ok(calc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROFILE: &str = r#"{
        "model": "vassilakis",
        "preprocessors": [{ "kind": "hearing-range", "low": 30.0 }],
        "spectra": [
            { "name": "reed", "fundamental_frequency": 220.0, "partials": [[2.0, 0.5], [3.0, 0.25]] },
            { "fundamental_frequency": 330.0 }
        ],
        "map": { "start": 200.0, "end": 800.0, "steps": 64, "step_mode": "logarithmic", "variable_spectrum": 1 },
        "chords": [[{ "frequency": 220.0, "amplitude": 1.0 }, { "frequency": 275.0, "amplitude": 0.8 }]]
    }"#;

    #[test]
    fn parses_with_defaults() {
        let profile = CalculatorProfile::from_json_str(PROFILE).unwrap();
        assert_eq!(profile.model, ModelKind::Vassilakis);
        assert!(profile.accumulate_partial_dissonance);
        assert_eq!(profile.spectra[1].name, "untitled");
        assert_eq!(profile.spectra[1].fundamental_amplitude, 1.0);
        assert_eq!(
            profile.preprocessors[0],
            PreprocessorKind::HearingRange { low: 30.0, high: 20_000.0 }
        );
        let map = profile.map.as_ref().unwrap();
        assert_eq!(map.dimensions, MapDimensions::Two);
        assert_eq!(map.y_spectrum, 1);
    }

    #[test]
    fn builds_ready_calculator() {
        let calc = CalculatorProfile::from_json_str(PROFILE).unwrap().build().unwrap();
        assert_eq!(calc.model_name(), Some("Vassilakis"));
        assert_eq!(calc.num_spectra(), 2);
        assert_eq!(calc.spectrum(0).num_partials(), 2);
        assert_eq!(calc.num_chords(), 1);
        assert_eq!(calc.step_mode(), StepMode::Logarithmic);
        assert_eq!(calc.variable_spectrum(), 1);
        assert!(calc.is_ready_to_process());
    }

    #[test]
    fn rejects_invalid_partials() {
        let mut profile = CalculatorProfile::from_json_str(PROFILE).unwrap();
        profile.spectra[0].partials.push((2.0, 0.1));
        let err = profile.build().unwrap_err();
        assert!(format!("{err:#}").contains("rejected partial 2"));
    }

    #[test]
    fn spectrum_round_trips_through_profile() {
        let profile = SpectrumProfile::harmonic("saw", 110.0, 6, 0.5);
        let spectrum = profile.to_spectrum().unwrap();
        assert_eq!(spectrum.num_partials(), 5);
        assert_eq!(SpectrumProfile::from_spectrum(&spectrum), profile);
    }
}
