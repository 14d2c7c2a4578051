//! Golden-reference and A/B comparison
//!
//! `compare_with_reference` checks a processed signal against a known-good
//! rendering and explains every threshold it violates. `ab_compare` runs one
//! input through two processing paths and reports how far apart they land.

use crate::detect::{validate_sample_rate, ClickDetector, ClickDetectorConfig};
use crate::error::{Result, VerifyError};
use crate::metrics::{compute_snr, crest_factor_db, SignalMetrics};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Energy floor for click detection on the difference signal
const DIFFERENCE_ENERGY_FLOOR_DB: f32 = -80.0;

/// Pass/fail thresholds for a golden comparison
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoldenReferenceConfig {
    pub sample_rate: f64,
    /// Minimum SNR of signal against reference
    pub snr_threshold_db: f32,
    /// Largest tolerated click in the difference signal
    pub max_click_amplitude: f32,
    pub thd_threshold_percent: f32,
    pub max_crest_factor_db: f32,
    pub max_click_count: usize,
    /// Fundamental for the THD check; 0 disables it
    pub fundamental_hz: f32,
}

impl Default for GoldenReferenceConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100.0,
            snr_threshold_db: 60.0,
            max_click_amplitude: 0.1,
            thd_threshold_percent: 1.0,
            max_crest_factor_db: 20.0,
            max_click_count: 0,
            fundamental_hz: 1_000.0,
        }
    }
}

impl GoldenReferenceConfig {
    pub fn with_sample_rate(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_sample_rate(self.sample_rate)?;
        if !self.snr_threshold_db.is_finite() {
            return Err(VerifyError::invalid_config(
                "snr_threshold_db",
                self.snr_threshold_db,
                "a finite dB value",
            ));
        }
        if !(self.max_click_amplitude >= 0.0) {
            return Err(VerifyError::invalid_config(
                "max_click_amplitude",
                self.max_click_amplitude,
                ">= 0",
            ));
        }
        if !(self.thd_threshold_percent >= 0.0) {
            return Err(VerifyError::invalid_config(
                "thd_threshold_percent",
                self.thd_threshold_percent,
                ">= 0",
            ));
        }
        if !(self.max_crest_factor_db > 0.0) {
            return Err(VerifyError::invalid_config(
                "max_crest_factor_db",
                self.max_crest_factor_db,
                "> 0",
            ));
        }
        if !(self.fundamental_hz >= 0.0 && f64::from(self.fundamental_hz) < self.sample_rate / 2.0)
        {
            return Err(VerifyError::invalid_config(
                "fundamental_hz",
                self.fundamental_hz,
                "0 (disabled) or below Nyquist",
            ));
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

/// Outcome of a golden comparison; every field is filled even on failure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoldenComparisonResult {
    pub passed: bool,
    pub snr_db: f32,
    pub thd_percent: f32,
    pub crest_factor_db: f32,
    pub clicks_detected: usize,
    pub max_click_amplitude: f32,
    pub failure_reasons: Vec<String>,
}

impl GoldenComparisonResult {
    /// One-line verdict followed by one line per failure
    pub fn summary(&self) -> String {
        let mut s = format!(
            "{} | SNR: {:.1} dB | THD: {:.3}% | Crest: {:.1} dB | Clicks: {} (max {:.4})",
            if self.passed { "PASS" } else { "FAIL" },
            self.snr_db,
            self.thd_percent,
            self.crest_factor_db,
            self.clicks_detected,
            self.max_click_amplitude
        );
        for reason in &self.failure_reasons {
            s.push_str(&format!("\n  - {}", reason));
        }
        s
    }
}

/// Compare `signal` against a known-good `reference`.
///
/// Lengths may differ: the common prefix is analysed and the mismatch is
/// reported as a failure.
pub fn compare_with_reference(
    signal: &[f32],
    reference: &[f32],
    config: &GoldenReferenceConfig,
) -> GoldenComparisonResult {
    if let Err(e) = config.validate() {
        warn!("golden comparison skipped: {}", e);
        return GoldenComparisonResult {
            failure_reasons: vec![format!("invalid configuration: {}", e)],
            ..Default::default()
        };
    }

    let mut failure_reasons = Vec::new();
    let n = signal.len().min(reference.len());
    if signal.len() != reference.len() {
        failure_reasons.push(format!(
            "length mismatch: signal has {} samples, reference has {}",
            signal.len(),
            reference.len()
        ));
    }
    let signal = &signal[..n];
    let reference = &reference[..n];

    let snr_db = compute_snr(signal, reference);
    let thd_percent = if config.fundamental_hz > 0.0 {
        SignalMetrics::new(config.sample_rate).measure_thd(signal, config.fundamental_hz)
    } else {
        0.0
    };
    let crest = crest_factor_db(signal);

    let difference: Vec<f32> = signal.iter().zip(reference).map(|(s, r)| s - r).collect();
    let mut detector = ClickDetector::new(ClickDetectorConfig {
        energy_threshold_db: DIFFERENCE_ENERGY_FLOOR_DB,
        ..ClickDetectorConfig::with_sample_rate(config.sample_rate)
    });
    let clicks = detector.detect(&difference);
    let max_click_amplitude = clicks
        .iter()
        .map(|c| c.amplitude.abs())
        .fold(0.0_f32, f32::max);

    if snr_db < config.snr_threshold_db {
        failure_reasons.push(format!(
            "SNR {:.1} dB below threshold {:.1} dB",
            snr_db, config.snr_threshold_db
        ));
    }
    if config.fundamental_hz > 0.0 && thd_percent > config.thd_threshold_percent {
        failure_reasons.push(format!(
            "THD {:.3}% exceeds {:.3}%",
            thd_percent, config.thd_threshold_percent
        ));
    }
    if crest > config.max_crest_factor_db {
        failure_reasons.push(format!(
            "crest factor {:.1} dB exceeds {:.1} dB",
            crest, config.max_crest_factor_db
        ));
    }
    if clicks.len() > config.max_click_count {
        failure_reasons.push(format!(
            "{} clicks detected (max {})",
            clicks.len(),
            config.max_click_count
        ));
    }
    if max_click_amplitude > config.max_click_amplitude {
        failure_reasons.push(format!(
            "click amplitude {:.4} exceeds {:.4}",
            max_click_amplitude, config.max_click_amplitude
        ));
    }

    debug!(
        snr_db,
        thd_percent,
        clicks = clicks.len(),
        failures = failure_reasons.len(),
        "golden comparison complete"
    );

    GoldenComparisonResult {
        passed: failure_reasons.is_empty(),
        snr_db,
        thd_percent,
        crest_factor_db: crest,
        clicks_detected: clicks.len(),
        max_click_amplitude,
        failure_reasons,
    }
}

/// How far apart two processing paths may land and still count as equal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbTolerances {
    pub snr_db: f32,
    pub thd_percent: f32,
    pub click_count: usize,
}

impl Default for AbTolerances {
    fn default() -> Self {
        Self {
            snr_db: 1.0,
            thd_percent: 0.1,
            click_count: 0,
        }
    }
}

/// Differential measurements of path A against path B (A minus B)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AbTestResult {
    pub snr_difference_db: f32,
    pub thd_difference_percent: f32,
    pub click_count_difference: i64,
    pub click_count_a: usize,
    pub click_count_b: usize,
    pub snr_a: f32,
    pub snr_b: f32,
}

impl AbTestResult {
    pub fn equivalent(&self, tolerances: &AbTolerances) -> bool {
        self.snr_difference_db.abs() <= tolerances.snr_db
            && self.thd_difference_percent.abs() <= tolerances.thd_percent
            && self.click_count_difference.unsigned_abs() <= tolerances.click_count as u64
    }
}

/// Run one generated input through two processors and compare the outputs.
///
/// Each output's SNR is measured against the input; THD is measured at the
/// input's dominant frequency.
pub fn ab_compare<G, A, B>(
    mut generate: G,
    mut process_a: A,
    mut process_b: B,
    sample_rate: f64,
) -> AbTestResult
where
    G: FnMut() -> Vec<f32>,
    A: FnMut(&[f32]) -> Vec<f32>,
    B: FnMut(&[f32]) -> Vec<f32>,
{
    let input = generate();
    let output_a = process_a(&input);
    let output_b = process_b(&input);

    let mut metrics = SignalMetrics::new(sample_rate);
    let fundamental = metrics.dominant_frequency(&input);
    let thd_a = metrics.measure_thd(&output_a, fundamental);
    let thd_b = metrics.measure_thd(&output_b, fundamental);
    let snr_a = compute_snr(&output_a, &input);
    let snr_b = compute_snr(&output_b, &input);

    let mut detector = ClickDetector::new(ClickDetectorConfig::with_sample_rate(sample_rate));
    let click_count_a = detector.detect(&output_a).len();
    let click_count_b = detector.detect(&output_b).len();

    debug!(fundamental, snr_a, snr_b, thd_a, thd_b, "A/B comparison complete");

    AbTestResult {
        snr_difference_db: snr_a - snr_b,
        thd_difference_percent: thd_a - thd_b,
        click_count_difference: click_count_a as i64 - click_count_b as i64,
        click_count_a,
        click_count_b,
        snr_a,
        snr_b,
    }
}
