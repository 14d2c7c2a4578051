//! File Workflow Tests
//!
//! WAV fixtures and config files feeding the analyzers.

use std::fs;

use signal_verify::config::VerifyConfig;
use signal_verify::detect::ClickDetector;
use signal_verify::io::{load_wav, save_wav, AudioClip};
use signal_verify::signals::{insert_click, sine};
use signal_verify::VerifyError;
use tempfile::tempdir;

#[test]
fn test_clicks_survive_wav_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("clicky.wav");

    let mut samples = sine(440.0, 0.5, 48_000.0, 48_000);
    insert_click(&mut samples, 12_000, 0.6);
    save_wav(&AudioClip::mono(samples, 48_000).unwrap(), &path).unwrap();

    let clip = load_wav(&path).unwrap();
    let config = VerifyConfig::default().with_sample_rate(f64::from(clip.sample_rate));
    let clicks = ClickDetector::new(config.click).detect(&clip.samples);

    assert_eq!(clicks.len(), 1);
    let click = clicks[0];
    assert!(click.sample_index.abs_diff(12_000) <= 1);
    assert!((click.time_seconds - 0.25).abs() < 1e-3);
}

#[test]
fn test_config_file_drives_detector() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("verify.json");
    fs::write(
        &path,
        r#"{ "click": { "detection_threshold": 1000.0, "merge_gap": 8 } }"#,
    )
    .unwrap();

    let config = VerifyConfig::load(&path).unwrap();
    assert_eq!(config.click.merge_gap, 8);

    // the threshold is now far above any single-sample spike
    let mut samples = sine(440.0, 0.5, 44_100.0, 44_100);
    insert_click(&mut samples, 10_000, 0.6);
    assert!(ClickDetector::new(config.click).detect(&samples).is_empty());
}

#[test]
fn test_invalid_config_file_reports_field() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.json");
    fs::write(&path, r#"{ "spectral": { "fft_size": 1000 } }"#).unwrap();

    match VerifyConfig::load(&path) {
        Err(VerifyError::InvalidConfig { param, .. }) => assert_eq!(param, "fft_size"),
        other => panic!("expected InvalidConfig, got {:?}", other),
    }
}

#[test]
fn test_missing_config_file_is_io_error() {
    let dir = tempdir().unwrap();
    let err = VerifyConfig::load(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, VerifyError::Io(_)));
}
