//! # Dissonance Calculator Module
//!
//! Drives a dissonance model over a set of spectra. Every calculation follows
//! the same cycle: copy the owned spectra, run the preprocessor chain on the
//! copy, hand the copy to the model, discard it. The caller's spectra are only
//! written to when single calculations fold accumulated partial dissonance back.
//!
//! ## Modes
//! - **Single**: one value for the spectra as configured
//! - **Batch**: one value per predefined chord
//! - **Map**: a dense curve (one variable spectrum) or surface (two) over a
//!   frequency range
//! - **Optimize**: multi-start local search for minima or maxima along the curve

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{positive_amplitude, positive_frequency, DissonanceError, Result};
use crate::model::DissonanceModel;
use crate::optimizer::{Direction, LocalOptimizer, PatternSearch};
use crate::preprocessor::Preprocessor;
use crate::spectrum::OvertoneSpectrum;

/// Growth factor between consecutive optimizer start points.
pub const DEFAULT_GROWTH_FACTOR: f64 = 1.0008;

/// Optima closer than this frequency ratio are treated as the same optimum.
const OPTIMUM_TOLERANCE: f64 = 1.001;

/// How the variable spectra advance between map steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepMode {
    /// Constant step in Hz.
    #[default]
    Linear,
    /// Constant step ratio, so resolution follows pitch perception.
    Logarithmic,
}

/// Number of axes in a dissonance map, the dissonance axis included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MapDimensions {
    /// One variable spectrum, producing a curve.
    #[default]
    Two,
    /// Two variable spectra, producing a surface.
    Three,
}

/// A half-open frequency interval `[start, end)` in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyRange {
    pub start: f64,
    pub end: f64,
}

impl FrequencyRange {
    pub fn new(start: f64, end: f64) -> Result<Self> {
        if start.is_finite() && end.is_finite() && start > 0.0 && end > start {
            Ok(Self { start, end })
        } else {
            Err(DissonanceError::InvalidRange { start, end })
        }
    }

    pub fn contains(&self, freq: f64) -> bool {
        freq >= self.start && freq < self.end
    }
}

/// Fundamental override for one spectrum within a chord.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChordTone {
    pub frequency: f64,
    pub amplitude: f64,
}

impl ChordTone {
    pub fn new(frequency: f64, amplitude: f64) -> Self {
        Self { frequency, amplitude }
    }
}

/// Result of a swept calculation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DissonanceMap {
    Curve(Vec<f64>),
    /// Indexed `[x_step][y_step]`.
    Surface(Vec<Vec<f64>>),
}

impl DissonanceMap {
    fn zeroed(dimensions: MapDimensions, steps: usize) -> Self {
        match dimensions {
            MapDimensions::Two => DissonanceMap::Curve(vec![0.0; steps]),
            MapDimensions::Three => DissonanceMap::Surface(vec![vec![0.0; steps]; steps]),
        }
    }

    pub fn at_step(&self, step: usize) -> Option<f64> {
        match self {
            DissonanceMap::Curve(curve) => curve.get(step).copied(),
            DissonanceMap::Surface(_) => None,
        }
    }

    pub fn at_cell(&self, x_step: usize, y_step: usize) -> Option<f64> {
        match self {
            DissonanceMap::Curve(_) => None,
            DissonanceMap::Surface(surface) => surface.get(x_step)?.get(y_step).copied(),
        }
    }
}

/// Orchestrates dissonance calculations over owned spectra.
#[derive(Debug, Clone)]
pub struct DissonanceCalculator {
    model: Option<Box<dyn DissonanceModel>>,
    preprocessors: Vec<Box<dyn Preprocessor>>,
    spectra: Vec<OvertoneSpectrum>,
    accumulate: bool,

    chords: Vec<Vec<ChordTone>>,
    chord_dissonances: Vec<f64>,

    range: Option<FrequencyRange>,
    num_steps: usize,
    step_mode: StepMode,
    step_size: f64,
    dimensions: MapDimensions,
    variable_spectrum: usize,
    x_spectrum: usize,
    y_spectrum: usize,
    map: DissonanceMap,

    minima: Vec<(f64, f64)>,
    maxima: Vec<(f64, f64)>,
}

impl Default for DissonanceCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl DissonanceCalculator {
    pub fn new() -> Self {
        Self {
            model: None,
            preprocessors: Vec::new(),
            spectra: Vec::new(),
            accumulate: true,
            chords: Vec::new(),
            chord_dissonances: Vec::new(),
            range: None,
            num_steps: 0,
            step_mode: StepMode::Linear,
            step_size: 0.0,
            dimensions: MapDimensions::Two,
            variable_spectrum: 0,
            x_spectrum: 0,
            y_spectrum: 0,
            map: DissonanceMap::Curve(Vec::new()),
            minima: Vec::new(),
            maxima: Vec::new(),
        }
    }

    // --- Model and preprocessors ---

    pub fn set_model(&mut self, model: Box<dyn DissonanceModel>) {
        self.model = Some(model);
    }

    pub fn model_name(&self) -> Option<&str> {
        self.model.as_deref().map(|m| m.name())
    }

    /// Appends a preprocessor to the end of the chain.
    pub fn add_preprocessor(&mut self, preprocessor: Box<dyn Preprocessor>) {
        self.preprocessors.push(preprocessor);
    }

    /// Moves a preprocessor to a new position in the chain.
    pub fn move_preprocessor(&mut self, from: usize, to: usize) {
        let preprocessor = self.preprocessors.remove(from);
        self.preprocessors.insert(to, preprocessor);
    }

    pub fn preprocessor_name(&self, index: usize) -> &str {
        self.preprocessors[index].name()
    }

    pub fn remove_preprocessor(&mut self, index: usize) -> Box<dyn Preprocessor> {
        self.preprocessors.remove(index)
    }

    pub fn clear_preprocessors(&mut self) {
        self.preprocessors.clear();
    }

    pub fn num_preprocessors(&self) -> usize {
        self.preprocessors.len()
    }

    // --- Spectra ---

    /// Adds a spectrum. The same sound may be added several times to form a chord.
    pub fn add_spectrum(&mut self, spectrum: OvertoneSpectrum) -> usize {
        self.spectra.push(spectrum);
        self.spectra.len() - 1
    }

    pub fn remove_spectrum(&mut self, index: usize) -> OvertoneSpectrum {
        self.spectra.remove(index)
    }

    pub fn clear_spectra(&mut self) {
        self.spectra.clear();
    }

    pub fn num_spectra(&self) -> usize {
        self.spectra.len()
    }

    pub fn spectra(&self) -> &[OvertoneSpectrum] {
        &self.spectra
    }

    pub fn spectrum(&self, index: usize) -> &OvertoneSpectrum {
        &self.spectra[index]
    }

    pub fn spectrum_mut(&mut self, index: usize) -> &mut OvertoneSpectrum {
        &mut self.spectra[index]
    }

    /// Enables storing each partial's share of single calculations on the owned spectra.
    /// Batch, map and optimize calculations never accumulate.
    pub fn set_accumulate_partial_dissonance(&mut self, accumulate: bool) {
        self.accumulate = accumulate;
    }

    pub fn accumulating_partial_dissonance(&self) -> bool {
        self.accumulate
    }

    // --- Evaluation primitive ---

    fn model(&self) -> Result<&dyn DissonanceModel> {
        self.model.as_deref().ok_or(DissonanceError::NoModel)
    }

    fn preprocess(&self, working: &mut [OvertoneSpectrum]) {
        for preprocessor in &self.preprocessors {
            preprocessor.process(working);
        }
    }

    /// Copies `base`, preprocesses the copy and evaluates it without accumulation.
    fn evaluate_copy(&self, model: &dyn DissonanceModel, base: &[OvertoneSpectrum]) -> f64 {
        let mut working = base.to_vec();
        self.preprocess(&mut working);
        model.evaluate(&mut working, false)
    }

    // --- Single ---

    /// Calculates the dissonance of the owned spectra sounding together.
    ///
    /// With accumulation enabled, each owned fundamental and partial afterwards
    /// holds its share of the returned value.
    pub fn calculate_dissonance(&mut self) -> Result<f64> {
        let (dissonance, working) = {
            let model = self.model()?;
            let mut working = self.spectra.clone();
            self.preprocess(&mut working);
            let dissonance = model.evaluate(&mut working, self.accumulate);
            (dissonance, working)
        };

        if self.accumulate {
            for (own, worked) in self.spectra.iter_mut().zip(working.iter()) {
                own.clear_dissonance();
                own.absorb_dissonance(worked);
            }
        }

        debug!(
            spectra = self.spectra.len(),
            preprocessors = self.preprocessors.len(),
            dissonance,
            "single calculation"
        );
        Ok(dissonance)
    }

    // --- Batch ---

    /// Adds a chord holding one tone per owned spectrum, returning its index.
    pub fn add_chord(&mut self, tones: Vec<ChordTone>) -> Result<usize> {
        if tones.len() != self.spectra.len() {
            return Err(DissonanceError::ChordSizeMismatch {
                expected: self.spectra.len(),
                got: tones.len(),
            });
        }
        for tone in &tones {
            positive_frequency(tone.frequency)?;
            positive_amplitude(tone.amplitude)?;
        }
        self.chords.push(tones);
        Ok(self.chords.len() - 1)
    }

    pub fn set_frequency_in_chord(&mut self, chord: usize, spectrum: usize, frequency: f64) -> Result<()> {
        self.chords[chord][spectrum].frequency = positive_frequency(frequency)?;
        Ok(())
    }

    pub fn set_amplitude_in_chord(&mut self, chord: usize, spectrum: usize, amplitude: f64) -> Result<()> {
        self.chords[chord][spectrum].amplitude = positive_amplitude(amplitude)?;
        Ok(())
    }

    pub fn frequency_in_chord(&self, chord: usize, spectrum: usize) -> f64 {
        self.chords[chord][spectrum].frequency
    }

    pub fn amplitude_in_chord(&self, chord: usize, spectrum: usize) -> f64 {
        self.chords[chord][spectrum].amplitude
    }

    pub fn remove_chord(&mut self, chord: usize) {
        self.chords.remove(chord);
        if chord < self.chord_dissonances.len() {
            self.chord_dissonances.remove(chord);
        }
    }

    pub fn clear_chords(&mut self) {
        self.chords.clear();
        self.chord_dissonances.clear();
    }

    pub fn num_chords(&self) -> usize {
        self.chords.len()
    }

    /// Calculates one dissonance value per chord, in chord order.
    pub fn calculate_chord_dissonances(&mut self) -> Result<&[f64]> {
        let results = {
            let model = self.model()?;
            if let Some(chord) = self.chords.iter().find(|c| c.len() != self.spectra.len()) {
                return Err(DissonanceError::ChordSizeMismatch {
                    expected: self.spectra.len(),
                    got: chord.len(),
                });
            }

            let mut results = Vec::with_capacity(self.chords.len());
            for chord in &self.chords {
                let mut working = self.spectra.clone();
                for (spectrum, tone) in working.iter_mut().zip(chord) {
                    spectrum.set_fundamental(tone.frequency, tone.amplitude)?;
                }
                self.preprocess(&mut working);
                results.push(model.evaluate(&mut working, false));
            }
            results
        };

        debug!(chords = results.len(), "batch calculation");
        self.chord_dissonances = results;
        Ok(self.chord_dissonances.as_slice())
    }

    /// Dissonance of a chord from the last batch calculation.
    pub fn chord_dissonance(&self, chord: usize) -> f64 {
        self.chord_dissonances[chord]
    }

    pub fn chord_dissonances(&self) -> &[f64] {
        &self.chord_dissonances
    }

    // --- Map configuration ---

    pub fn set_dimensions(&mut self, dimensions: MapDimensions) {
        self.dimensions = dimensions;
        self.map = DissonanceMap::zeroed(self.dimensions, self.num_steps);
    }

    pub fn dimensions(&self) -> MapDimensions {
        self.dimensions
    }

    /// Sets the frequency range swept by variable spectra.
    pub fn set_range(&mut self, start: f64, end: f64) -> Result<()> {
        self.range = Some(FrequencyRange::new(start, end)?);
        self.update_step_size();
        Ok(())
    }

    pub fn range(&self) -> Option<FrequencyRange> {
        self.range
    }

    /// Sets the number of data points per map axis.
    pub fn set_num_steps(&mut self, steps: usize) -> Result<()> {
        if steps == 0 {
            return Err(DissonanceError::InvalidStepCount);
        }
        self.num_steps = steps;
        self.map = DissonanceMap::zeroed(self.dimensions, self.num_steps);
        self.update_step_size();
        Ok(())
    }

    pub fn num_steps(&self) -> usize {
        self.num_steps
    }

    pub fn set_step_mode(&mut self, mode: StepMode) {
        self.step_mode = mode;
        self.update_step_size();
    }

    pub fn step_mode(&self) -> StepMode {
        self.step_mode
    }

    /// Hz added per step (linear) or ratio applied per step (logarithmic).
    /// Zero until both a range and a step count are set.
    pub fn step_size(&self) -> f64 {
        self.step_size
    }

    fn update_step_size(&mut self) {
        let Some(range) = self.range else { return };
        if self.num_steps == 0 {
            return;
        }
        let steps = self.num_steps as f64;
        self.step_size = match self.step_mode {
            StepMode::Linear => (range.end - range.start) / steps,
            StepMode::Logarithmic => (range.end / range.start).powf(1.0 / steps),
        };
    }

    fn increment(&self, freq: f64) -> f64 {
        match self.step_mode {
            StepMode::Linear => freq + self.step_size,
            StepMode::Logarithmic => freq * self.step_size,
        }
    }

    /// Chooses the spectrum swept along a curve.
    pub fn set_variable_spectrum(&mut self, index: usize) {
        self.variable_spectrum = index;
    }

    pub fn variable_spectrum(&self) -> usize {
        self.variable_spectrum
    }

    /// Chooses the spectrum swept along the x axis of a surface.
    pub fn set_x_spectrum(&mut self, index: usize) {
        self.x_spectrum = index;
    }

    pub fn x_spectrum(&self) -> usize {
        self.x_spectrum
    }

    /// Chooses the spectrum swept along the y axis of a surface.
    pub fn set_y_spectrum(&mut self, index: usize) {
        self.y_spectrum = index;
    }

    pub fn y_spectrum(&self) -> usize {
        self.y_spectrum
    }

    // --- Readiness ---

    /// True when maps and optimizations can run.
    pub fn is_ready_to_process(&self) -> bool {
        self.readiness().is_ok()
    }

    fn readiness(&self) -> Result<FrequencyRange> {
        use DissonanceError::PreconditionNotMet;

        if self.spectra.len() < 2 {
            return Err(PreconditionNotMet("at least two spectra are required"));
        }
        let Some(range) = self.range else {
            return Err(PreconditionNotMet("no frequency range has been set"));
        };
        if self.model.is_none() {
            return Err(PreconditionNotMet("no dissonance model has been assigned"));
        }
        if self.num_steps <= 1 {
            return Err(PreconditionNotMet("more than one step is required"));
        }
        for spectrum in &self.spectra {
            if !(spectrum.fundamental_frequency() > 0.0) {
                return Err(PreconditionNotMet("every spectrum needs a positive fundamental frequency"));
            }
            if spectrum
                .partials()
                .iter()
                .any(|p| !(p.frequency > 0.0 && p.amplitude > 0.0))
            {
                return Err(PreconditionNotMet("every partial needs positive ratios"));
            }
        }
        Ok(range)
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index < self.spectra.len() {
            Ok(())
        } else {
            Err(DissonanceError::SpectrumIndexOutOfRange {
                index,
                len: self.spectra.len(),
            })
        }
    }

    // --- Map ---

    /// Sweeps the variable spectra across the range and stores one value per step.
    ///
    /// The owned spectra are not modified; the sweep runs on a copy.
    pub fn calculate_dissonance_map(&mut self) -> Result<&DissonanceMap> {
        let map = {
            let range = self.readiness()?;
            let model = self.model()?;
            let steps = self.num_steps;
            let mut base = self.spectra.clone();

            match self.dimensions {
                MapDimensions::Two => {
                    let variable = self.variable_spectrum;
                    self.check_index(variable)?;

                    let mut curve = Vec::with_capacity(steps);
                    let mut freq = range.start;
                    for _ in 0..steps {
                        base[variable].set_fundamental_frequency(freq)?;
                        curve.push(self.evaluate_copy(model, &base));
                        freq = self.increment(freq);
                    }
                    DissonanceMap::Curve(curve)
                }
                MapDimensions::Three => {
                    let (x, y) = (self.x_spectrum, self.y_spectrum);
                    self.check_index(x)?;
                    self.check_index(y)?;

                    let mut surface = Vec::with_capacity(steps);
                    let mut x_freq = range.start;
                    for _ in 0..steps {
                        base[x].set_fundamental_frequency(x_freq)?;
                        let mut y_freq = range.start;
                        let mut column = Vec::with_capacity(steps);
                        for _ in 0..steps {
                            base[y].set_fundamental_frequency(y_freq)?;
                            column.push(self.evaluate_copy(model, &base));
                            y_freq = self.increment(y_freq);
                        }
                        surface.push(column);
                        x_freq = self.increment(x_freq);
                    }
                    DissonanceMap::Surface(surface)
                }
            }
        };

        debug!(
            dimensions = ?self.dimensions,
            steps = self.num_steps,
            step_mode = ?self.step_mode,
            step_size = self.step_size,
            "dissonance map calculated"
        );
        self.map = map;
        Ok(&self.map)
    }

    pub fn dissonance_map(&self) -> &DissonanceMap {
        &self.map
    }

    /// Value at a curve step of the last map calculation.
    pub fn dissonance_at_step(&self, step: usize) -> Option<f64> {
        self.map.at_step(step)
    }

    /// Value at a surface cell of the last map calculation.
    pub fn dissonance_at_cell(&self, x_step: usize, y_step: usize) -> Option<f64> {
        self.map.at_cell(x_step, y_step)
    }

    /// Calculates the dissonance with the variable spectrum moved to `freq`.
    pub fn dissonance_at_frequency(&self, freq: f64) -> Result<f64> {
        let model = self.model()?;
        self.check_index(self.variable_spectrum)?;
        let mut base = self.spectra.clone();
        base[self.variable_spectrum].set_fundamental_frequency(freq)?;
        Ok(self.evaluate_copy(model, &base))
    }

    /// Calculates the dissonance with the x and y spectra moved to the given frequencies.
    pub fn dissonance_at_frequencies(&self, x_freq: f64, y_freq: f64) -> Result<f64> {
        let model = self.model()?;
        self.check_index(self.x_spectrum)?;
        self.check_index(self.y_spectrum)?;
        let mut base = self.spectra.clone();
        base[self.x_spectrum].set_fundamental_frequency(x_freq)?;
        base[self.y_spectrum].set_fundamental_frequency(y_freq)?;
        Ok(self.evaluate_copy(model, &base))
    }

    /// Frequency in Hz at a (possibly fractional) step.
    pub fn frequency_at_step(&self, step: f64) -> Option<f64> {
        let range = self.range?;
        if self.num_steps == 0 {
            return None;
        }
        Some(match self.step_mode {
            StepMode::Linear => self.step_size * step + range.start,
            StepMode::Logarithmic => self.step_size.powf(step) * range.start,
        })
    }

    /// Ratio of the frequency at a step to the range start.
    pub fn ratio_at_step(&self, step: f64) -> Option<f64> {
        let range = self.range?;
        self.frequency_at_step(step).map(|f| f / range.start)
    }

    /// Fractional step at which a frequency lies.
    pub fn step_of_frequency(&self, freq: f64) -> Option<f64> {
        let range = self.range?;
        if self.num_steps == 0 {
            return None;
        }
        Some(match self.step_mode {
            StepMode::Linear => (freq - range.start) / self.step_size,
            StepMode::Logarithmic => (freq / range.start).ln() / self.step_size.ln(),
        })
    }

    // --- Optimize ---

    /// Finds local optima of the curve with the default pattern search.
    ///
    /// `bounds` narrows the search inside the configured range.
    pub fn optimize(&mut self, direction: Direction, bounds: Option<(f64, f64)>) -> Result<&[(f64, f64)]> {
        self.optimize_with(&PatternSearch::default(), direction, bounds, DEFAULT_GROWTH_FACTOR)
    }

    /// Runs `optimizer` once from each start point of a geometric walk across
    /// the bounds and keeps the distinct optima it finds.
    pub fn optimize_with(
        &mut self,
        optimizer: &dyn LocalOptimizer,
        direction: Direction,
        bounds: Option<(f64, f64)>,
        growth: f64,
    ) -> Result<&[(f64, f64)]> {
        if !(growth.is_finite() && growth > 1.0) {
            return Err(DissonanceError::InvalidGrowthFactor(growth));
        }

        let optima = {
            let range = self.readiness()?;
            let model = self.model()?;
            let variable = self.variable_spectrum;
            self.check_index(variable)?;

            let bounds = match bounds {
                Some((low, high)) => FrequencyRange::new(low.max(range.start), high.min(range.end))?,
                None => range,
            };

            let worst = match direction {
                Direction::Minimize => f64::INFINITY,
                Direction::Maximize => f64::NEG_INFINITY,
            };
            let mut base = self.spectra.clone();
            let mut objective = |freq: f64| {
                if base[variable].set_fundamental_frequency(freq).is_err() {
                    return worst;
                }
                self.evaluate_copy(model, &base)
            };

            let mut optima = Vec::new();
            let mut starts = 0usize;
            let mut start = bounds.start;
            while start < bounds.end {
                let candidate = optimizer.optimize(&mut objective, start, bounds.start, bounds.end, direction);
                retain_optimum(&mut optima, candidate, direction);
                start *= growth;
                starts += 1;
            }
            debug!(?direction, starts, found = optima.len(), "optimization finished");
            optima
        };

        let slot = match direction {
            Direction::Minimize => &mut self.minima,
            Direction::Maximize => &mut self.maxima,
        };
        *slot = optima;
        Ok(slot.as_slice())
    }

    /// `(frequency, dissonance)` pairs from the last optimization in `direction`.
    pub fn optima(&self, direction: Direction) -> &[(f64, f64)] {
        match direction {
            Direction::Minimize => &self.minima,
            Direction::Maximize => &self.maxima,
        }
    }

    /// Frequencies of the optima from the last optimization in `direction`.
    pub fn optimal_frequencies(&self, direction: Direction) -> Vec<f64> {
        self.optima(direction).iter().map(|(freq, _)| *freq).collect()
    }
}

/// Inserts `candidate` into the frequency-sorted `optima` unless an existing
/// optimum within the tolerance band is at least as good; worse neighbours in
/// the band are dropped.
fn retain_optimum(optima: &mut Vec<(f64, f64)>, candidate: (f64, f64), direction: Direction) {
    let (freq, value) = candidate;
    let low = freq / OPTIMUM_TOLERANCE;
    let high = freq * OPTIMUM_TOLERANCE;
    let near = |f: f64| f >= low && f <= high;

    if optima
        .iter()
        .any(|&(f, v)| near(f) && !direction.prefers(value, v))
    {
        return;
    }

    optima.retain(|&(f, _)| !near(f));
    let index = optima.partition_point(|&(f, _)| f < freq);
    optima.insert(index, candidate);
}
