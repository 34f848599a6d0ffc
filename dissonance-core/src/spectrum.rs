//! # Overtone Spectrum Module
//!
//! Describes the sinusoidal make-up of a single sound: a fundamental partial
//! carrying a real frequency (Hz) and amplitude, plus any number of overtone
//! partials stored as ratios to the fundamental.
//!
//! ## Invariants
//! - Overtone partials are kept sorted by ascending frequency ratio
//! - No two partials share a ratio, and no partial uses ratio 1 (the fundamental)
//! - With a minimum interval `m > 1`, no two ratios (the fundamental's included)
//!   lie within a factor of `m` of each other
//!
//! Every mutator validates its input first and leaves the spectrum untouched
//! when it returns an error.

use crate::error::{positive_amplitude, positive_frequency, DissonanceError, Result};

/// A single sinusoidal component of a spectrum.
///
/// For overtones `frequency` and `amplitude` are ratios to the fundamental.
/// For the fundamental itself they are real values.
#[derive(Debug, PartialEq)]
pub struct Partial {
    pub frequency: f64,
    pub amplitude: f64,
    pub muted: bool,
    /// How much this partial contributed to the last accumulated calculation.
    pub dissonance: f64,
}

impl Partial {
    pub fn new(frequency: f64, amplitude: f64) -> Self {
        Self {
            frequency,
            amplitude,
            muted: false,
            dissonance: 0.0,
        }
    }
}

// Copies never carry over accumulated dissonance.
impl Clone for Partial {
    fn clone(&self) -> Self {
        Self {
            frequency: self.frequency,
            amplitude: self.amplitude,
            muted: self.muted,
            dissonance: 0.0,
        }
    }
}

impl Default for Partial {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// The overtones of one sound together with its fundamental.
#[derive(Debug, Clone, PartialEq)]
pub struct OvertoneSpectrum {
    name: String,
    fundamental: Partial,
    partials: Vec<Partial>,
    min_interval: f64,
    muted: bool,
}

impl Default for OvertoneSpectrum {
    fn default() -> Self {
        Self {
            name: "untitled".to_string(),
            fundamental: Partial::default(),
            partials: Vec::new(),
            min_interval: 1.0,
            muted: false,
        }
    }
}

impl OvertoneSpectrum {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Builds a spectrum with its fundamental already set.
    pub fn with_fundamental(name: impl Into<String>, frequency: f64, amplitude: f64) -> Result<Self> {
        let mut spectrum = Self::new(name);
        spectrum.set_fundamental(frequency, amplitude)?;
        Ok(spectrum)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Number of overtone partials, not counting the fundamental.
    pub fn num_partials(&self) -> usize {
        self.partials.len()
    }

    pub fn partials(&self) -> &[Partial] {
        &self.partials
    }

    pub fn fundamental(&self) -> &Partial {
        &self.fundamental
    }

    // --- Partials ---

    /// Inserts a partial and returns the index it was sorted into.
    pub fn add_partial(&mut self, ratio: f64, amplitude: f64) -> Result<usize> {
        positive_frequency(ratio)?;
        positive_amplitude(amplitude)?;
        self.check_ratio(ratio, None)?;

        let index = self.partials.partition_point(|p| p.frequency < ratio);
        self.partials.insert(index, Partial::new(ratio, amplitude));
        Ok(index)
    }

    /// Moves partial `index` to a new ratio. The partial keeps its amplitude and
    /// mute state; the returned value is its index after re-sorting.
    pub fn set_ratio(&mut self, index: usize, ratio: f64) -> Result<usize> {
        assert!(index < self.partials.len(), "partial index {index} out of range");
        positive_frequency(ratio)?;
        self.check_ratio(ratio, Some(index))?;

        let mut partial = self.partials.remove(index);
        partial.frequency = ratio;
        let new_index = self.partials.partition_point(|p| p.frequency < ratio);
        self.partials.insert(new_index, partial);
        Ok(new_index)
    }

    pub fn set_amplitude_ratio(&mut self, index: usize, amplitude: f64) -> Result<()> {
        positive_amplitude(amplitude)?;
        self.partials[index].amplitude = amplitude;
        Ok(())
    }

    pub fn ratio(&self, index: usize) -> f64 {
        self.partials[index].frequency
    }

    pub fn amplitude_ratio(&self, index: usize) -> f64 {
        self.partials[index].amplitude
    }

    /// Real frequency in Hz: the partial's ratio times the fundamental frequency.
    pub fn real_frequency(&self, index: usize) -> f64 {
        self.partials[index].frequency * self.fundamental.frequency
    }

    /// Real amplitude: the partial's ratio times the fundamental amplitude.
    pub fn real_amplitude(&self, index: usize) -> f64 {
        self.partials[index].amplitude * self.fundamental.amplitude
    }

    /// Removes a partial. Later partials shift down by one index.
    pub fn remove_partial(&mut self, index: usize) -> Partial {
        self.partials.remove(index)
    }

    pub fn clear_partials(&mut self) {
        self.partials.clear();
    }

    // --- Fundamental ---

    pub fn set_fundamental(&mut self, frequency: f64, amplitude: f64) -> Result<()> {
        positive_frequency(frequency)?;
        positive_amplitude(amplitude)?;
        self.fundamental.frequency = frequency;
        self.fundamental.amplitude = amplitude;
        Ok(())
    }

    pub fn set_fundamental_frequency(&mut self, frequency: f64) -> Result<()> {
        self.fundamental.frequency = positive_frequency(frequency)?;
        Ok(())
    }

    pub fn set_fundamental_amplitude(&mut self, amplitude: f64) -> Result<()> {
        self.fundamental.amplitude = positive_amplitude(amplitude)?;
        Ok(())
    }

    pub fn fundamental_frequency(&self) -> f64 {
        self.fundamental.frequency
    }

    pub fn fundamental_amplitude(&self) -> f64 {
        self.fundamental.amplitude
    }

    // --- Muting ---

    /// Mutes or unmutes the whole spectrum, independently of element flags.
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn mute_fundamental(&mut self, muted: bool) {
        self.fundamental.muted = muted;
    }

    pub fn fundamental_is_muted(&self) -> bool {
        self.fundamental.muted
    }

    pub fn mute_partial(&mut self, index: usize, muted: bool) {
        self.partials[index].muted = muted;
    }

    pub fn partial_is_muted(&self, index: usize) -> bool {
        self.partials[index].muted
    }

    /// True when the fundamental takes part in dissonance calculations.
    pub fn fundamental_is_active(&self) -> bool {
        !self.muted && !self.fundamental.muted
    }

    /// True when partial `index` takes part in dissonance calculations.
    pub fn partial_is_active(&self, index: usize) -> bool {
        !self.muted && !self.partials[index].muted
    }

    // --- Dissonance accumulation ---

    pub fn add_partial_dissonance(&mut self, index: usize, dissonance: f64) {
        self.partials[index].dissonance += dissonance;
    }

    pub fn add_fundamental_dissonance(&mut self, dissonance: f64) {
        self.fundamental.dissonance += dissonance;
    }

    pub fn partial_dissonance(&self, index: usize) -> f64 {
        self.partials[index].dissonance
    }

    pub fn fundamental_dissonance(&self) -> f64 {
        self.fundamental.dissonance
    }

    /// Sum of the fundamental's and every partial's accumulated dissonance.
    pub fn total_dissonance(&self) -> f64 {
        self.fundamental.dissonance + self.partials.iter().map(|p| p.dissonance).sum::<f64>()
    }

    /// Resets every accumulator, the fundamental's included, to zero.
    pub fn clear_dissonance(&mut self) {
        self.fundamental.dissonance = 0.0;
        for partial in self.partials.iter_mut() {
            partial.dissonance = 0.0;
        }
    }

    /// Adds every accumulator of `other` onto the matching element of `self`.
    ///
    /// Elements are paired by position, so `other` must have been copied from
    /// `self` without partials being added, removed or reordered.
    pub(crate) fn absorb_dissonance(&mut self, other: &OvertoneSpectrum) {
        debug_assert_eq!(self.partials.len(), other.partials.len());
        self.fundamental.dissonance += other.fundamental.dissonance;
        for (own, worked) in self.partials.iter_mut().zip(other.partials.iter()) {
            own.dissonance += worked.dissonance;
        }
    }

    // --- Spacing ---

    /// Sets the minimum ratio between any two partials. A value of 1 means no minimum.
    ///
    /// Existing partials are not re-checked; the new value applies to later insertions.
    pub fn set_min_interval(&mut self, min_interval: f64) -> Result<()> {
        if !(min_interval.is_finite() && min_interval >= 1.0) {
            return Err(DissonanceError::InvalidMinInterval(min_interval));
        }
        self.min_interval = min_interval;
        Ok(())
    }

    pub fn min_interval(&self) -> f64 {
        self.min_interval
    }

    /// Validates a candidate ratio against the fundamental and every partial
    /// except `skip` (the partial being moved, if any).
    fn check_ratio(&self, ratio: f64, skip: Option<usize>) -> Result<()> {
        let others = self
            .partials
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != skip)
            .map(|(_, p)| p.frequency);

        for existing in std::iter::once(1.0).chain(others) {
            if ratio == existing {
                return Err(DissonanceError::DuplicatePartial(ratio));
            }
            if self.min_interval > 1.0 {
                let interval = ratio / existing;
                if interval >= 1.0 / self.min_interval && interval <= self.min_interval {
                    return Err(DissonanceError::PartialTooClose {
                        ratio,
                        existing,
                        min_interval: self.min_interval,
                    });
                }
            }
        }
        Ok(())
    }
}
