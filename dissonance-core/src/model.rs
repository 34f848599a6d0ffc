//! # Dissonance Model Module
//!
//! Pluggable dissonance models. Every built-in model sums pairwise roughness
//! between all active partials of a set of spectra (spectral interference, after
//! Plomp & Levelt); the concrete models differ only in their roughness curve.
//!
//! ## Models
//! - [`SetharesModel`]: Sethares, "Tuning, Timbre, Spectrum, Scale" (2005)
//! - [`VassilakisModel`]: Vassilakis, "Perceptual and Physical Properties of
//!   Amplitude Fluctuation and their Musical Significance" (2001)

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::spectrum::OvertoneSpectrum;

/// A dissonance model evaluated over a set of spectra.
pub trait DissonanceModel: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Returns the dissonance of `spectra` sounding together.
    ///
    /// When `accumulate` is true the model also adds each element's share of
    /// the result to that element's dissonance accumulator.
    fn evaluate(&self, spectra: &mut [OvertoneSpectrum], accumulate: bool) -> f64;

    /// Owned copy of this model, for containers that hold models by value.
    fn clone_box(&self) -> Box<dyn DissonanceModel>;
}

impl Clone for Box<dyn DissonanceModel> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

// Plomp-Levelt curve fit shared by both roughness functions.
const MAX_DISSONANCE: f64 = 0.24;
const INTERP_1: f64 = 0.0207;
const INTERP_2: f64 = 18.96;
const DECAY_1: f64 = -3.51;
const DECAY_2: f64 = -5.75;
const FIT_1: f64 = 5.0;
const FIT_2: f64 = -5.0;

/// The frequency-dependent part of the Plomp-Levelt curve fit.
fn plomp_levelt_curve(f1: f64, f2: f64) -> f64 {
    let s = MAX_DISSONANCE / (INTERP_1 * f1.min(f2) + INTERP_2);
    let diff = (f1 - f2).abs();
    FIT_1 * (DECAY_1 * s * diff).exp() + FIT_2 * (DECAY_2 * s * diff).exp()
}

/// Roughness between two sinusoids given real frequencies and amplitudes.
pub trait Roughness: fmt::Debug + Clone + Default + Send + Sync + 'static {
    const NAME: &'static str;

    fn roughness(&self, f1: f64, a1: f64, f2: f64, a2: f64) -> f64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Sethares;

impl Roughness for Sethares {
    const NAME: &'static str = "Sethares";

    fn roughness(&self, f1: f64, a1: f64, f2: f64, a2: f64) -> f64 {
        a1.min(a2) * plomp_levelt_curve(f1, f2)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Vassilakis;

impl Roughness for Vassilakis {
    const NAME: &'static str = "Vassilakis";

    fn roughness(&self, f1: f64, a1: f64, f2: f64, a2: f64) -> f64 {
        let amplitude = (a1 * a2).powf(0.1);
        let fluctuation = 0.5 * (2.0 * a1.min(a2) / (a1 + a2)).powf(3.11);
        amplitude * fluctuation * plomp_levelt_curve(f1, f2)
    }
}

/// Sums roughness over every unordered pair of active elements.
///
/// Fundamental pairs are visited first, then each active partial against every
/// active fundamental (its own included) and against every later active partial.
#[derive(Debug, Clone, Default)]
pub struct SpectralInterference<R> {
    roughness: R,
}

pub type SetharesModel = SpectralInterference<Sethares>;
pub type VassilakisModel = SpectralInterference<Vassilakis>;

impl<R: Roughness> SpectralInterference<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn roughness(&self, f1: f64, a1: f64, f2: f64, a2: f64) -> f64 {
        self.roughness.roughness(f1, a1, f2, a2)
    }
}

impl<R: Roughness> DissonanceModel for SpectralInterference<R> {
    fn name(&self) -> &str {
        R::NAME
    }

    fn evaluate(&self, spectra: &mut [OvertoneSpectrum], accumulate: bool) -> f64 {
        let mut dissonance = 0.0;

        for first in 0..spectra.len() {
            if !spectra[first].fundamental_is_active() {
                continue;
            }
            for second in (first + 1)..spectra.len() {
                if !spectra[second].fundamental_is_active() {
                    continue;
                }
                let d = self.roughness(
                    spectra[first].fundamental_frequency(),
                    spectra[first].fundamental_amplitude(),
                    spectra[second].fundamental_frequency(),
                    spectra[second].fundamental_amplitude(),
                );
                dissonance += d;
                if accumulate {
                    spectra[first].add_fundamental_dissonance(d / 2.0);
                    spectra[second].add_fundamental_dissonance(d / 2.0);
                }
            }
        }

        for first in 0..spectra.len() {
            for partial in 0..spectra[first].num_partials() {
                if !spectra[first].partial_is_active(partial) {
                    continue;
                }
                let freq = spectra[first].real_frequency(partial);
                let amp = spectra[first].real_amplitude(partial);

                for other in 0..spectra.len() {
                    if !spectra[other].fundamental_is_active() {
                        continue;
                    }
                    let d = self.roughness(
                        freq,
                        amp,
                        spectra[other].fundamental_frequency(),
                        spectra[other].fundamental_amplitude(),
                    );
                    dissonance += d;
                    if accumulate {
                        spectra[first].add_partial_dissonance(partial, d / 2.0);
                        spectra[other].add_fundamental_dissonance(d / 2.0);
                    }
                }

                for second in first..spectra.len() {
                    // A lone partial creates no roughness with itself.
                    let start = if second == first { partial + 1 } else { 0 };
                    for other_partial in start..spectra[second].num_partials() {
                        if !spectra[second].partial_is_active(other_partial) {
                            continue;
                        }
                        let d = self.roughness(
                            freq,
                            amp,
                            spectra[second].real_frequency(other_partial),
                            spectra[second].real_amplitude(other_partial),
                        );
                        dissonance += d;
                        if accumulate {
                            spectra[first].add_partial_dissonance(partial, d / 2.0);
                            spectra[second].add_partial_dissonance(other_partial, d / 2.0);
                        }
                    }
                }
            }
        }

        dissonance
    }

    fn clone_box(&self) -> Box<dyn DissonanceModel> {
        Box::new(self.clone())
    }
}

/// The built-in models, for configuration files and front ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelKind {
    #[default]
    Sethares,
    Vassilakis,
}

impl ModelKind {
    pub const ALL: [ModelKind; 2] = [ModelKind::Sethares, ModelKind::Vassilakis];

    pub fn build(self) -> Box<dyn DissonanceModel> {
        match self {
            ModelKind::Sethares => Box::new(SetharesModel::new()),
            ModelKind::Vassilakis => Box::new(VassilakisModel::new()),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ModelKind::Sethares => Sethares::NAME,
            ModelKind::Vassilakis => Vassilakis::NAME,
        }
    }

    /// Case-insensitive lookup by display name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name))
    }
}
