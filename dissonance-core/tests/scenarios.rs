use dissonance_core::model::{Roughness, Sethares};
use dissonance_core::{
    CalculatorProfile, ChordTone, Direction, DissonanceCalculator, DissonanceMap, HearingRangePreprocessor,
    ModelKind, OvertoneSpectrum, PatternSearch, SpectrumProfile, StepMode,
};

fn bare(freq: f64) -> OvertoneSpectrum {
    OvertoneSpectrum::with_fundamental("bare", freq, 1.0).unwrap()
}

fn harmonic(freq: f64) -> OvertoneSpectrum {
    SpectrumProfile::harmonic("harmonic", freq, 6, 0.8)
        .to_spectrum()
        .unwrap()
}

fn calculator(spectra: Vec<OvertoneSpectrum>) -> DissonanceCalculator {
    let mut calc = DissonanceCalculator::new();
    calc.set_model(ModelKind::Sethares.build());
    for spectrum in spectra {
        calc.add_spectrum(spectrum);
    }
    calc
}

#[test]
fn close_fundamentals_are_rougher_than_an_octave() {
    let close = calculator(vec![bare(200.0), bare(204.0)]).calculate_dissonance().unwrap();
    let octave = calculator(vec![bare(200.0), bare(400.0)]).calculate_dissonance().unwrap();

    assert!(close > 0.0);
    assert!(close < 1.0);
    assert!(close > octave);
}

#[test]
fn accumulated_shares_sum_to_total() {
    let mut calc = calculator(vec![harmonic(220.0), harmonic(246.94), harmonic(329.63)]);
    calc.add_preprocessor(Box::new(HearingRangePreprocessor::with_range(20.0, 1200.0).unwrap()));

    let total = calc.calculate_dissonance().unwrap();
    let shares: f64 = calc.spectra().iter().map(|s| s.total_dissonance()).sum();
    assert!((total - shares).abs() < 1e-9);

    // Partials muted by the preprocessor contribute nothing.
    let top = calc.spectrum(2);
    assert_eq!(top.partial_dissonance(top.num_partials() - 1), 0.0);
    assert!(!top.partial_is_muted(top.num_partials() - 1));
}

#[test]
fn muting_equals_removing() {
    let mut muted = calculator(vec![harmonic(220.0), harmonic(233.08), harmonic(293.66)]);
    muted.spectrum_mut(1).set_muted(true);
    let mut removed = calculator(vec![harmonic(220.0), harmonic(293.66)]);

    let a = muted.calculate_dissonance().unwrap();
    let b = removed.calculate_dissonance().unwrap();
    assert!((a - b).abs() < 1e-12);
    assert_eq!(muted.spectrum(1).total_dissonance(), 0.0);
}

#[test]
fn linear_steps_span_the_range() {
    let mut calc = calculator(vec![bare(440.0), bare(440.0)]);
    calc.set_range(20.0, 20_000.0).unwrap();
    calc.set_num_steps(2).unwrap();
    calc.set_step_mode(StepMode::Linear);
    calc.set_variable_spectrum(1);

    assert_eq!(calc.step_size(), 9990.0);
    assert_eq!(calc.frequency_at_step(0.0), Some(20.0));
    assert_eq!(calc.frequency_at_step(1.0), Some(10_010.0));
    assert_eq!(calc.frequency_at_step(2.0), Some(20_000.0));

    let curve = match calc.calculate_dissonance_map().unwrap() {
        DissonanceMap::Curve(curve) => curve.clone(),
        other => panic!("expected a curve, got {other:?}"),
    };
    assert_eq!(curve.len(), 2);
    assert_eq!(curve[0], calc.dissonance_at_frequency(20.0).unwrap());
    assert_eq!(curve[1], calc.dissonance_at_frequency(10_010.0).unwrap());

    // The sweep leaves the owned spectra where they were.
    assert_eq!(calc.spectrum(1).fundamental_frequency(), 440.0);
}

#[test]
fn logarithmic_steps_compound_to_the_range_ratio() {
    let mut calc = calculator(vec![bare(100.0), bare(150.0)]);
    calc.set_step_mode(StepMode::Logarithmic);
    calc.set_range(110.0, 1760.0).unwrap();
    calc.set_num_steps(4).unwrap();

    assert!((calc.step_size() - 2.0).abs() < 1e-12);
    assert!((calc.step_size().powi(4) - 1760.0 / 110.0).abs() < 1e-9);
    assert!((calc.frequency_at_step(3.0).unwrap() - 880.0).abs() < 1e-9);
    assert!((calc.step_of_frequency(440.0).unwrap() - 2.0).abs() < 1e-9);
}

#[test]
fn identical_chords_have_identical_dissonance() {
    let mut calc = calculator(vec![harmonic(261.63), harmonic(329.63), harmonic(392.0)]);
    let chord = vec![
        ChordTone::new(220.0, 1.0),
        ChordTone::new(277.18, 0.9),
        ChordTone::new(311.13, 0.7),
    ];
    calc.add_chord(chord.clone()).unwrap();
    calc.add_chord(chord).unwrap();

    let values = calc.calculate_chord_dissonances().unwrap().to_vec();
    assert_eq!(values.len(), 2);
    assert!(values[0] > 0.0);
    assert_eq!(values[0], values[1]);
}

#[test]
fn single_trough_gives_one_minimum() {
    let mut calc = calculator(vec![bare(200.0), bare(195.0)]);
    calc.set_range(190.0, 210.0).unwrap();
    calc.set_num_steps(100).unwrap();
    calc.set_variable_spectrum(1);

    let minima = calc.optimize(Direction::Minimize, None).unwrap().to_vec();
    assert_eq!(minima.len(), 1, "{minima:?}");
    assert!((minima[0].0 - 200.0).abs() < 0.01);
    assert!(minima[0].1 < 1e-3);

    let finer = calc
        .optimize_with(&PatternSearch::default(), Direction::Minimize, None, 1.0004)
        .unwrap();
    assert_eq!(finer.len(), 1);
}

#[test]
fn maxima_match_a_fine_grid() {
    let mut calc = calculator(vec![bare(200.0), bare(180.0)]);
    calc.set_range(150.0, 250.0).unwrap();
    calc.set_num_steps(100).unwrap();
    calc.set_variable_spectrum(1);

    let maxima = calc.optimize(Direction::Maximize, None).unwrap().to_vec();
    assert_eq!(maxima.len(), 2, "{maxima:?}");

    let grid_peak = |from: f64, to: f64| {
        let mut best = (from, f64::NEG_INFINITY);
        let mut f = from;
        while f < to {
            let v = Sethares.roughness(200.0, 1.0, f, 1.0);
            if v > best.1 {
                best = (f, v);
            }
            f += 0.01;
        }
        best
    };
    let below = grid_peak(150.0, 200.0);
    let above = grid_peak(200.0, 250.0);

    for ((freq, value), (grid_freq, grid_value)) in maxima.iter().zip([below, above]) {
        assert!((freq - grid_freq).abs() < 0.5, "{freq} vs {grid_freq}");
        assert!(*value >= grid_value - 1e-9);
    }
    assert_eq!(calc.optimal_frequencies(Direction::Maximize).len(), 2);
    assert!(calc.optima(Direction::Minimize).is_empty());
}

#[test]
fn profile_survives_a_save_and_load() {
    let profile = CalculatorProfile::from_json_str(
        r#"{
            "model": "sethares",
            "spectra": [
                { "name": "a", "fundamental_frequency": 220.0, "partials": [[2.0, 0.5]] },
                { "name": "b", "fundamental_frequency": 261.63, "partials": [[2.0, 0.5]] }
            ],
            "map": { "start": 200.0, "end": 500.0, "steps": 30, "variable_spectrum": 1 }
        }"#,
    )
    .unwrap();

    let path = std::env::temp_dir().join(format!("dissonance-profile-{}.json", std::process::id()));
    profile.save(&path).unwrap();
    let loaded = CalculatorProfile::load(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(loaded, profile);

    let mut calc = loaded.build().unwrap();
    assert!(calc.is_ready_to_process());
    let curve = calc.calculate_dissonance_map().unwrap();
    assert!(matches!(curve, DissonanceMap::Curve(c) if c.len() == 30));
}
