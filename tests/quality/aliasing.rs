//! Aliasing Tests
//!
//! A non-bandlimited nonlinearity folds harmonics above Nyquist back into
//! the audible band. The measurement must tell that apart from a clean path.

use signal_verify::metrics::SignalMetrics;
use signal_verify::signals::{hard_clip, sine};

const SAMPLE_RATE: f64 = 44_100.0;
const FFT_SIZE: usize = 2048;

#[test]
fn test_identity_has_no_aliasing() {
    let input = sine(5_000.0, 0.5, SAMPLE_RATE, FFT_SIZE);
    let output = input.clone();

    let mut metrics = SignalMetrics::new(SAMPLE_RATE);
    let m = metrics.measure_aliasing(&output, 5_000.0, FFT_SIZE);

    assert!(
        m.fundamental_db - m.aliasing_db > 40.0,
        "fundamental {:.1} dB, aliasing {:.1} dB",
        m.fundamental_db,
        m.aliasing_db
    );
}

#[test]
fn test_hard_clip_aliases() {
    let input = sine(5_000.0, 0.5, SAMPLE_RATE, FFT_SIZE);
    let output = hard_clip(&input, 4.0);

    let mut metrics = SignalMetrics::new(SAMPLE_RATE);
    let clipped = metrics.measure_aliasing(&output, 5_000.0, FFT_SIZE);
    let clean = metrics.measure_aliasing(&input, 5_000.0, FFT_SIZE);

    assert!(clipped.aliasing_db > -100.0, "{:?}", clipped);
    assert!(
        clipped.alias_to_fundamental_db > clean.alias_to_fundamental_db + 20.0,
        "clipped {:?} vs clean {:?}",
        clipped,
        clean
    );
}

#[test]
fn test_aliasing_measurement_is_deterministic() {
    let output = hard_clip(&sine(5_000.0, 0.5, SAMPLE_RATE, FFT_SIZE), 4.0);
    let mut metrics = SignalMetrics::new(SAMPLE_RATE);
    let first = metrics.measure_aliasing(&output, 5_000.0, FFT_SIZE);
    let second = metrics.measure_aliasing(&output, 5_000.0, FFT_SIZE);
    assert_eq!(first, second);
}
