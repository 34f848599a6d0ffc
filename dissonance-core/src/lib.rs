// dissonance-core/src/lib.rs

//! The core logic for perceptual dissonance analysis.
//! This crate models sounds as overtone spectra, scores their combined
//! roughness with pluggable dissonance models, and sweeps or optimizes
//! one spectrum's fundamental against the others. It is completely
//! headless and performs no I/O beyond loading and saving profiles.

pub mod calculator;
pub mod config;
pub mod error;
pub mod model;
pub mod optimizer;
pub mod preprocessor;
pub mod spectrum;

pub use calculator::{
    ChordTone, DissonanceCalculator, DissonanceMap, FrequencyRange, MapDimensions, StepMode,
    DEFAULT_GROWTH_FACTOR,
};
pub use config::{CalculatorProfile, MapProfile, SpectrumProfile};
pub use error::{DissonanceError, Result};
pub use model::{DissonanceModel, ModelKind, SetharesModel, VassilakisModel};
pub use optimizer::{Direction, LocalOptimizer, PatternSearch};
pub use preprocessor::{HearingRangePreprocessor, Preprocessor, PreprocessorKind};
pub use spectrum::{OvertoneSpectrum, Partial};
