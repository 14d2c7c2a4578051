//! Processor Verification Tests
//!
//! Golden references, A/B comparison and parameter sweeps over small
//! stand-in processors.

use std::cell::Cell;
use std::rc::Rc;

use approx::assert_abs_diff_eq;
use pretty_assertions::assert_eq;
use signal_verify::detect::{
    ClickDetector, ClickDetectorConfig, LpcDetector, LpcDetectorConfig, SpectralAnomalyConfig,
    SpectralAnomalyDetector,
};
use signal_verify::golden::{
    ab_compare, compare_with_reference, AbTolerances, GoldenReferenceConfig,
};
use signal_verify::signals::{hard_clip, insert_click, mix, sine, white_noise};
use signal_verify::sweep::{ParameterSweep, ParameterSweepConfig};

const SAMPLE_RATE: f64 = 44_100.0;

fn test_tone() -> Vec<f32> {
    sine(1_000.0, 0.5, SAMPLE_RATE, 16_384)
}

/// Gain stage that drops one sample to zero, as a buggy buffer swap would
fn glitchy_gain(input: &[f32]) -> Vec<f32> {
    let mut out: Vec<f32> = input.iter().map(|s| s * 0.9).collect();
    out[9_000] = 0.0;
    out
}

#[test]
fn test_golden_reference_catches_dropout() {
    let input = test_tone();
    let reference: Vec<f32> = input.iter().map(|s| s * 0.9).collect();

    let good = compare_with_reference(&reference, &reference, &GoldenReferenceConfig::default());
    assert!(good.passed, "{}", good.summary());

    let bad = compare_with_reference(
        &glitchy_gain(&input),
        &reference,
        &GoldenReferenceConfig::default(),
    );
    assert!(!bad.passed);
    assert!(bad.clicks_detected >= 1);
}

#[test]
fn test_ab_compare_gain_paths() {
    let same = ab_compare(test_tone, |x| x.to_vec(), |x| x.to_vec(), SAMPLE_RATE);
    assert_eq!(same.snr_difference_db, 0.0);
    assert_eq!(same.thd_difference_percent, 0.0);
    assert_eq!(same.click_count_difference, 0);

    // a 1% gain error is -40 dB of "noise" against the input
    let off = ab_compare(
        test_tone,
        |x| x.to_vec(),
        |x| x.iter().map(|s| s * 1.01).collect(),
        SAMPLE_RATE,
    );
    assert_abs_diff_eq!(off.snr_b, 40.0, epsilon = 0.01);
    assert!(!off.equivalent(&AbTolerances::default()));
    assert!(off.equivalent(&AbTolerances {
        snr_db: 200.0,
        ..Default::default()
    }));
}

#[test]
fn test_drive_sweep_finds_clipping_range() {
    let drive = Rc::new(Cell::new(1.0_f32));
    let config = ParameterSweepConfig {
        parameter_name: "drive".into(),
        min_value: 0.5,
        max_value: 4.0,
        num_steps: 8,
        ..Default::default()
    };

    let setter = Rc::clone(&drive);
    let result = ParameterSweep::new(config).run(
        move |value| setter.set(value as f32),
        || sine(1_000.0, 0.5, SAMPLE_RATE, 8192),
        |input| hard_clip(input, drive.get()),
    );

    assert_eq!(result.step_results.len(), 8);
    assert_eq!(result.failing_ranges(), vec![(2.5, 4.0)]);
    for step in result.failed_steps() {
        assert!(step.thd_percent > 1.0);
        assert!(step.failure_reason.starts_with("THD"), "{}", step.failure_reason);
    }
    assert!(result.summary().contains("failing range: 2.5 .. 4"));
}

#[test]
fn test_detectors_agree_on_inserted_click() {
    let mut signal = sine(440.0, 0.5, SAMPLE_RATE, 44_100);
    insert_click(&mut signal, 20_000, 0.5);

    let clicks = ClickDetector::new(ClickDetectorConfig::default()).detect(&signal);
    let residuals = LpcDetector::new(LpcDetectorConfig::default()).detect(&signal);

    assert_eq!(clicks.len(), 1);
    assert!(clicks[0].sample_index.abs_diff(20_000) <= 1);
    assert!(!residuals.is_empty());
    assert!(residuals
        .iter()
        .all(|d| (20_000..20_000 + 64).contains(&d.sample_index)));
}

#[test]
fn test_spectral_detector_finds_noise_burst() {
    let mut signal = sine(440.0, 0.5, SAMPLE_RATE, 44_100);
    mix(&mut signal[30_000..], &white_noise(0.8, 4096, 17));

    let mut detector = SpectralAnomalyDetector::new(SpectralAnomalyConfig::default());
    let anomalies = detector.detect(&signal);
    assert!(!anomalies.is_empty());
    // every flagged frame must start close enough to overlap the burst
    let earliest = 27_000.0 / SAMPLE_RATE;
    let latest = 34_096.0 / SAMPLE_RATE;
    assert!(anomalies
        .iter()
        .all(|a| a.time_seconds > earliest && a.time_seconds < latest));
}
