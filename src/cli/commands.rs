//! CLI Command Implementations
//!
//! Every command returns `Ok(true)` when it found defects so `main` can map
//! that to a failing exit status.

use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};
use walkdir::WalkDir;

use super::SignalKind;
use crate::config::VerifyConfig;
use crate::detect::{ClickDetector, LpcDetector, SpectralAnomalyDetector};
use crate::error::{Result, VerifyError};
use crate::golden::{compare_with_reference, GoldenComparisonResult};
use crate::io::{load_wav, save_wav, AudioClip};
use crate::metrics::{zero_crossing_rate, SignalMetrics};
use crate::signals;

/// Shared state for one CLI invocation
#[derive(Debug, Clone)]
pub struct CommandContext {
    config: VerifyConfig,
    json: bool,
}

impl CommandContext {
    pub fn new(config: VerifyConfig, json: bool) -> Self {
        Self { config, json }
    }

    /// Config rebound to the sample rate of `clip`
    fn config_for(&self, clip: &AudioClip) -> VerifyConfig {
        self.config
            .clone()
            .with_sample_rate(f64::from(clip.sample_rate))
    }

    fn emit<T: Serialize>(&self, report: &T, text: impl FnOnce(&T) -> String) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(report)?);
        } else {
            println!("{}", text(report));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct DetectionReport<T> {
    file: String,
    detector: &'static str,
    sample_rate: u32,
    duration_secs: f64,
    detections: Vec<T>,
}

impl<T> DetectionReport<T> {
    fn new(path: &Path, clip: &AudioClip, detector: &'static str, detections: Vec<T>) -> Self {
        Self {
            file: path.display().to_string(),
            detector,
            sample_rate: clip.sample_rate,
            duration_secs: clip.duration_secs(),
            detections,
        }
    }

    fn header(&self) -> String {
        format!(
            "{} ({:.2}s @ {} Hz): {} {} detection(s)",
            self.file,
            self.duration_secs,
            self.sample_rate,
            self.detections.len(),
            self.detector
        )
    }
}

/// Derivative click detection on one file.
pub fn clicks(ctx: &CommandContext, input: &Path) -> Result<bool> {
    let clip = load_wav(input)?;
    let config = ctx.config_for(&clip);
    info!("Detecting clicks in: {}", input.display());

    let detections = ClickDetector::new(config.click).detect(&clip.samples);
    let report = DetectionReport::new(input, &clip, "click", detections);
    ctx.emit(&report, |r| {
        let mut s = r.header();
        for d in &r.detections {
            s.push_str(&format!(
                "\n  sample {:>10}  {:>9.4}s  amplitude {:+.4}",
                d.sample_index, d.time_seconds, d.amplitude
            ));
        }
        s
    })?;
    Ok(!report.detections.is_empty())
}

/// LPC residual detection on one file.
pub fn lpc(ctx: &CommandContext, input: &Path) -> Result<bool> {
    let clip = load_wav(input)?;
    let config = ctx.config_for(&clip);
    info!("Running LPC residual analysis on: {}", input.display());

    let detections = LpcDetector::new(config.lpc).detect(&clip.samples);
    let report = DetectionReport::new(input, &clip, "lpc", detections);
    ctx.emit(&report, |r| {
        let mut s = r.header();
        for d in &r.detections {
            s.push_str(&format!(
                "\n  sample {:>10}  {:>9.4}s  residual {:+.4}",
                d.sample_index, d.time_seconds, d.amplitude
            ));
        }
        s
    })?;
    Ok(!report.detections.is_empty())
}

/// Spectral-flatness anomaly detection on one file.
pub fn spectral(ctx: &CommandContext, input: &Path) -> Result<bool> {
    let clip = load_wav(input)?;
    let config = ctx.config_for(&clip);
    info!("Running spectral flatness analysis on: {}", input.display());

    let detections = SpectralAnomalyDetector::new(config.spectral).detect(&clip.samples);
    let report = DetectionReport::new(input, &clip, "spectral", detections);
    ctx.emit(&report, |r| {
        let mut s = r.header();
        for d in &r.detections {
            s.push_str(&format!(
                "\n  frame {:>8}  {:>9.4}s  flatness {:.3}",
                d.frame_index, d.time_seconds, d.flatness
            ));
        }
        s
    })?;
    Ok(!report.detections.is_empty())
}

#[derive(Debug, Serialize)]
struct MetricsReport {
    file: String,
    sample_rate: u32,
    fundamental_hz: f32,
    /// Only present when a reference was given
    snr_db: Option<f32>,
    thd_percent: f32,
    thd_db: f32,
    crest_factor_db: f32,
    kurtosis: f32,
    zero_crossing_rate: f32,
    spectral_flatness: f32,
}

/// Quality metrics for one file, optionally against a reference.
pub fn metrics(
    ctx: &CommandContext,
    input: &Path,
    reference: Option<&Path>,
    fundamental: Option<f32>,
) -> Result<bool> {
    let clip = load_wav(input)?;
    let config = ctx.config_for(&clip);
    let reference = reference.map(load_wav).transpose()?;
    if let Some(reference) = &reference {
        check_same_rate(&clip, reference)?;
    }

    let mut metrics = SignalMetrics::from_config(&config.metrics);
    // 0 in the config means auto-detect
    let fundamental_hz = match fundamental.unwrap_or(config.metrics.fundamental_hz) {
        f if f > 0.0 => f,
        _ => metrics.dominant_frequency(&clip.samples),
    };
    let reference_samples = reference.as_ref().map_or(&clip.samples, |r| &r.samples);
    let quality = metrics.measure_quality(&clip.samples, reference_samples, fundamental_hz);

    let report = MetricsReport {
        file: input.display().to_string(),
        sample_rate: clip.sample_rate,
        fundamental_hz,
        snr_db: reference.as_ref().map(|_| quality.snr_db),
        thd_percent: quality.thd_percent,
        thd_db: quality.thd_db,
        crest_factor_db: quality.crest_factor_db,
        kurtosis: quality.kurtosis,
        zero_crossing_rate: zero_crossing_rate(&clip.samples),
        spectral_flatness: metrics.spectral_flatness(&clip.samples),
    };
    ctx.emit(&report, |r| {
        let mut s = format!("{} @ {} Hz", r.file, r.sample_rate);
        if let Some(snr) = r.snr_db {
            s.push_str(&format!("\n  SNR:          {:.2} dB", snr));
        }
        s.push_str(&format!(
            "\n  THD:          {:.4}% ({:.1} dB) at {:.1} Hz\
             \n  Crest factor: {:.2} dB\
             \n  Kurtosis:     {:.3}\
             \n  ZCR:          {:.5}\
             \n  Flatness:     {:.4}",
            r.thd_percent,
            r.thd_db,
            r.fundamental_hz,
            r.crest_factor_db,
            r.kurtosis,
            r.zero_crossing_rate,
            r.spectral_flatness
        ));
        s
    })?;
    Ok(false)
}

#[derive(Debug, Serialize)]
struct CompareReport {
    signal: String,
    reference: String,
    #[serde(flatten)]
    result: GoldenComparisonResult,
}

/// Golden-reference comparison of two files.
pub fn compare(ctx: &CommandContext, signal: &Path, reference: &Path) -> Result<bool> {
    let clip = load_wav(signal)?;
    let golden = load_wav(reference)?;
    check_same_rate(&clip, &golden)?;
    let config = ctx.config_for(&clip);
    info!(
        "Comparing {} against {}",
        signal.display(),
        reference.display()
    );

    let report = CompareReport {
        signal: signal.display().to_string(),
        reference: reference.display().to_string(),
        result: compare_with_reference(&clip.samples, &golden.samples, &config.golden),
    };
    ctx.emit(&report, |r| {
        format!("{} vs {}\n{}", r.signal, r.reference, r.result.summary())
    })?;
    Ok(!report.result.passed)
}

#[derive(Debug, Serialize)]
struct FileScan {
    file: String,
    clicks: usize,
    spectral_anomalies: usize,
    error: Option<String>,
}

impl FileScan {
    fn is_clean(&self) -> bool {
        self.error.is_none() && self.clicks == 0 && self.spectral_anomalies == 0
    }
}

#[derive(Debug, Serialize)]
struct ScanReport {
    dir: String,
    files: Vec<FileScan>,
}

/// Click and spectral detection on every `.wav` under `dir`.
pub fn scan(ctx: &CommandContext, dir: &Path) -> Result<bool> {
    // surface a missing directory as an error rather than an empty scan
    std::fs::metadata(dir)?;
    info!("Scanning: {}", dir.display());

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().is_file() || !is_wav(path) {
            continue;
        }
        files.push(scan_file(ctx, path));
    }

    let report = ScanReport {
        dir: dir.display().to_string(),
        files,
    };
    ctx.emit(&report, |r| {
        let mut s = format!("{}: {} file(s)", r.dir, r.files.len());
        for f in &r.files {
            let status = match &f.error {
                Some(e) => format!("ERROR {}", e),
                None if f.is_clean() => "ok".to_string(),
                None => format!(
                    "{} click(s), {} spectral anomal(ies)",
                    f.clicks, f.spectral_anomalies
                ),
            };
            s.push_str(&format!("\n  {}: {}", f.file, status));
        }
        s
    })?;
    Ok(report.files.iter().any(|f| !f.is_clean()))
}

fn scan_file(ctx: &CommandContext, path: &Path) -> FileScan {
    let file = path.display().to_string();
    match load_wav(path) {
        Ok(clip) => {
            let config = ctx.config_for(&clip);
            FileScan {
                file,
                clicks: ClickDetector::new(config.click).detect(&clip.samples).len(),
                spectral_anomalies: SpectralAnomalyDetector::new(config.spectral)
                    .detect(&clip.samples)
                    .len(),
                error: None,
            }
        }
        Err(e) => {
            warn!("{}: {}", file, e);
            FileScan {
                file,
                clicks: 0,
                spectral_anomalies: 0,
                error: Some(e.to_string()),
            }
        }
    }
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case("wav"))
}

fn check_same_rate(a: &AudioClip, b: &AudioClip) -> Result<()> {
    if a.sample_rate != b.sample_rate {
        return Err(VerifyError::UnsupportedFormat {
            details: format!(
                "sample rate mismatch: {} Hz vs {} Hz",
                a.sample_rate, b.sample_rate
            ),
        });
    }
    Ok(())
}

/// Fixture parameters for `generate`
#[derive(Debug, Clone, Copy)]
pub struct GenerateOptions {
    pub frequency: f32,
    pub amplitude: f32,
    pub duration: f64,
    pub sample_rate: u32,
    pub seed: u64,
}

/// Build the samples for a fixture
pub fn generate_samples(kind: SignalKind, options: &GenerateOptions) -> Vec<f32> {
    let rate = f64::from(options.sample_rate);
    let n = (options.duration * rate).round().max(0.0) as usize;
    let tone = || signals::sine(options.frequency, options.amplitude, rate, n);
    match kind {
        SignalKind::Sine => tone(),
        SignalKind::Noise => signals::white_noise(options.amplitude, n, options.seed),
        SignalKind::Silence => signals::silence(n),
        SignalKind::Clicks => {
            let mut samples = tone();
            for quarter in 1..4 {
                signals::insert_click(&mut samples, n * quarter / 4, options.amplitude);
            }
            samples
        }
        SignalKind::Clipped => signals::hard_clip(&tone(), 4.0),
    }
}

/// Write a fixture WAV.
pub fn generate(kind: SignalKind, output: &Path, options: &GenerateOptions) -> Result<bool> {
    info!("Generating {:?} fixture: {}", kind, output.display());
    let clip = AudioClip::mono(generate_samples(kind, options), options.sample_rate)?;
    save_wav(&clip, output)?;
    println!(
        "Wrote {} ({} samples @ {} Hz)",
        output.display(),
        clip.samples.len(),
        clip.sample_rate
    );
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn options() -> GenerateOptions {
        GenerateOptions {
            frequency: 1_000.0,
            amplitude: 0.5,
            duration: 0.5,
            sample_rate: 44_100,
            seed: 1,
        }
    }

    fn write_fixture(dir: &Path, name: &str, kind: SignalKind) -> std::path::PathBuf {
        let path = dir.join(name);
        generate(kind, &path, &options()).unwrap();
        path
    }

    #[test]
    fn test_generate_lengths() {
        assert_eq!(generate_samples(SignalKind::Sine, &options()).len(), 22_050);
        assert!(generate_samples(SignalKind::Silence, &options())
            .iter()
            .all(|&s| s == 0.0));
        let clipped = generate_samples(SignalKind::Clipped, &options());
        assert!(clipped.iter().any(|&s| s == 1.0));
    }

    #[test]
    fn test_zero_duration_is_an_error() {
        let dir = tempdir().unwrap();
        let opts = GenerateOptions {
            duration: 0.0,
            ..options()
        };
        let err = generate(SignalKind::Sine, &dir.path().join("x.wav"), &opts).unwrap_err();
        assert!(matches!(err, VerifyError::EmptyBuffer));
    }

    #[test]
    fn test_clicks_command_flags_fixture() {
        let dir = tempdir().unwrap();
        let ctx = CommandContext::new(VerifyConfig::default(), true);
        let clean = write_fixture(dir.path(), "clean.wav", SignalKind::Sine);
        let clicky = write_fixture(dir.path(), "clicky.wav", SignalKind::Clicks);

        assert!(!clicks(&ctx, &clean).unwrap());
        assert!(clicks(&ctx, &clicky).unwrap());
    }

    #[test]
    fn test_compare_command() {
        let dir = tempdir().unwrap();
        let ctx = CommandContext::new(VerifyConfig::default(), false);
        let clean = write_fixture(dir.path(), "clean.wav", SignalKind::Sine);
        let clipped = write_fixture(dir.path(), "clipped.wav", SignalKind::Clipped);

        assert!(!compare(&ctx, &clean, &clean).unwrap());
        assert!(compare(&ctx, &clipped, &clean).unwrap());
    }

    #[test]
    fn test_compare_rejects_rate_mismatch() {
        let dir = tempdir().unwrap();
        let ctx = CommandContext::new(VerifyConfig::default(), false);
        let a = write_fixture(dir.path(), "a.wav", SignalKind::Sine);
        let b = dir.path().join("b.wav");
        let opts = GenerateOptions {
            sample_rate: 48_000,
            ..options()
        };
        generate(SignalKind::Sine, &b, &opts).unwrap();

        let err = compare(&ctx, &a, &b).unwrap_err();
        assert!(matches!(err, VerifyError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_scan_reports_defects_and_skips_other_files() {
        let dir = tempdir().unwrap();
        let ctx = CommandContext::new(VerifyConfig::default(), true);
        write_fixture(dir.path(), "a_clean.wav", SignalKind::Sine);
        std::fs::write(dir.path().join("notes.txt"), "not audio").unwrap();

        assert!(!scan(&ctx, dir.path()).unwrap());

        write_fixture(dir.path(), "b_clicky.WAV", SignalKind::Clicks);
        assert!(scan(&ctx, dir.path()).unwrap());
    }

    #[test]
    fn test_scan_missing_directory() {
        let dir = tempdir().unwrap();
        let ctx = CommandContext::new(VerifyConfig::default(), false);
        let err = scan(&ctx, &dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, VerifyError::Io(_)));
    }

    #[test]
    fn test_metrics_never_reports_defects() {
        let dir = tempdir().unwrap();
        let ctx = CommandContext::new(VerifyConfig::default(), true);
        let clean = write_fixture(dir.path(), "clean.wav", SignalKind::Sine);
        assert!(!metrics(&ctx, &clean, Some(clean.as_path()), None).unwrap());
        assert!(!metrics(&ctx, &clean, None, Some(440.0)).unwrap());
    }

    #[test]
    fn test_is_wav() {
        assert!(is_wav(Path::new("a/b.wav")));
        assert!(is_wav(Path::new("b.WAV")));
        assert!(!is_wav(Path::new("b.flac")));
        assert!(!is_wav(Path::new("wav")));
    }
}
