//! Linear-prediction residual detector
//!
//! Each frame is modelled as an all-pole process (Levinson-Durbin on the
//! frame autocorrelation). Anything the model cannot predict shows up as a
//! spike in the residual. The outlier threshold uses median/MAD rather than
//! mean/stddev since residuals of transient-laden audio are heavy-tailed and
//! the artifacts themselves would otherwise inflate the threshold.

use super::click::ClickDetection;
use super::{frame_starts, validate_framing, validate_sample_rate};
use crate::error::{Result, VerifyError};
use crate::numeric::{EPSILON, LEVINSON_ERROR_FLOOR, MAD_FLOOR};
use crate::stats::{compute_mad, compute_median};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

pub const MIN_LPC_ORDER: usize = 4;
pub const MAX_LPC_ORDER: usize = 32;

/// LPC detector parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LpcDetectorConfig {
    /// Sample rate in Hz (22050 to 192000)
    pub sample_rate: f64,
    /// Prediction order (4 to 32)
    pub lpc_order: usize,
    /// Analysis frame length (power of two, more than twice the order)
    pub frame_size: usize,
    /// Frame advance (1 to frame_size)
    pub hop_size: usize,
    /// MAD multiplier above the median |residual|
    pub threshold: f32,
}

impl Default for LpcDetectorConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100.0,
            lpc_order: 16,
            frame_size: 1024,
            hop_size: 512,
            threshold: 8.0,
        }
    }
}

impl LpcDetectorConfig {
    /// Default parameters at the given sample rate
    pub fn with_sample_rate(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            ..Self::default()
        }
    }

    /// Validate parameters are within their supported ranges
    pub fn validate(&self) -> Result<()> {
        validate_sample_rate(self.sample_rate)?;
        if !(MIN_LPC_ORDER..=MAX_LPC_ORDER).contains(&self.lpc_order) {
            return Err(VerifyError::invalid_config(
                "lpc_order",
                self.lpc_order,
                "4 to 32",
            ));
        }
        validate_framing("frame_size", self.frame_size, self.hop_size)?;
        if self.frame_size <= 2 * self.lpc_order {
            return Err(VerifyError::invalid_config(
                "frame_size",
                self.frame_size,
                format!("more than {} samples for order {}", 2 * self.lpc_order, self.lpc_order),
            ));
        }
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(VerifyError::invalid_config(
                "threshold",
                self.threshold,
                "a positive MAD multiplier",
            ));
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

/// Result of a Levinson-Durbin solve
#[derive(Debug, Clone, PartialEq)]
pub struct LpcModel {
    /// Predictor taps `a[1..=order]`: `x[n] ~ sum a[j] * x[n - j]`
    pub coefficients: Vec<f64>,
    /// Reflection (PARCOR) coefficient produced at each order
    pub reflection_coefficients: Vec<f64>,
    /// Final prediction error power (floored)
    pub prediction_error: f64,
}

/// Autocorrelation `R[0..=order]` of a frame
pub fn autocorrelation(frame: &[f32], order: usize) -> Vec<f64> {
    let mut r = vec![0.0; order + 1];
    autocorrelation_into(frame, &mut r);
    r
}

fn autocorrelation_into(frame: &[f32], r: &mut [f64]) {
    let n = frame.len();
    for (lag, slot) in r.iter_mut().enumerate() {
        *slot = if lag < n {
            frame[lag..]
                .iter()
                .zip(frame.iter())
                .map(|(&a, &b)| f64::from(a) * f64::from(b))
                .sum()
        } else {
            0.0
        };
    }
}

/// Solve for predictor taps from an autocorrelation sequence.
///
/// `r` must hold at least `order + 1` lags.
pub fn levinson_durbin(r: &[f64], order: usize) -> LpcModel {
    let mut a = vec![0.0; order + 1];
    let mut scratch = vec![0.0; order + 1];
    let mut reflection = Vec::with_capacity(order);
    let error = levinson_into(r, order, &mut a, &mut scratch, &mut reflection);
    LpcModel {
        coefficients: a[1..].iter().map(|&c| -c).collect(),
        reflection_coefficients: reflection,
        prediction_error: error,
    }
}

/// In-place recursion on the inverse filter `A(z) = 1 + sum a[j] z^-j`.
/// Returns the final prediction error.
fn levinson_into(
    r: &[f64],
    order: usize,
    a: &mut [f64],
    scratch: &mut [f64],
    reflection: &mut Vec<f64>,
) -> f64 {
    a.iter_mut().for_each(|c| *c = 0.0);
    a[0] = 1.0;
    reflection.clear();

    let order = order.min(r.len().saturating_sub(1));
    let mut error = r.first().copied().unwrap_or(0.0).max(LEVINSON_ERROR_FLOOR);

    for i in 1..=order {
        let acc: f64 = (0..i).map(|j| a[j] * r[i - j]).sum();
        let lambda = -acc / error;

        scratch[..=i].copy_from_slice(&a[..=i]);
        for j in 1..i {
            a[j] = scratch[j] + lambda * scratch[i - j];
        }
        a[i] = lambda;

        reflection.push(lambda);
        error = (error * (1.0 - lambda * lambda)).max(LEVINSON_ERROR_FLOOR);
    }
    error
}

/// Linear-prediction residual detector
#[derive(Debug, Clone)]
pub struct LpcDetector {
    config: LpcDetectorConfig,
    autocorr: Vec<f64>,
    /// Inverse-filter coefficients, a[0] = 1
    inverse: Vec<f64>,
    scratch: Vec<f64>,
    reflection: Vec<f64>,
    residual: Vec<f64>,
    /// |residual| copy sorted in place by the median/MAD computation
    abs_residual: Vec<f64>,
    detections: Vec<ClickDetection>,
    prepared: bool,
}

impl LpcDetector {
    pub fn new(config: LpcDetectorConfig) -> Self {
        Self {
            config,
            autocorr: Vec::new(),
            inverse: Vec::new(),
            scratch: Vec::new(),
            reflection: Vec::new(),
            residual: Vec::new(),
            abs_residual: Vec::new(),
            detections: Vec::new(),
            prepared: false,
        }
    }

    pub fn config(&self) -> &LpcDetectorConfig {
        &self.config
    }

    /// Allocate working buffers. Not meant to be called per buffer.
    pub fn prepare(&mut self) {
        let order = self.config.lpc_order;
        let frame = self.config.frame_size;
        self.autocorr = vec![0.0; order + 1];
        self.inverse = vec![0.0; order + 1];
        self.scratch = vec![0.0; order + 1];
        self.reflection = Vec::with_capacity(order);
        self.residual = vec![0.0; frame];
        self.abs_residual = Vec::with_capacity(frame);
        self.detections = Vec::with_capacity(64);
        self.prepared = true;
    }

    /// Clear accumulated detections; working buffers are kept
    pub fn reset(&mut self) {
        self.detections.clear();
    }

    /// Detections from the most recent `detect` call
    pub fn detections(&self) -> &[ClickDetection] {
        &self.detections
    }

    /// Predictor taps fitted to the most recently analysed frame
    pub fn last_coefficients(&self) -> Vec<f64> {
        self.inverse.iter().skip(1).map(|&c| -c).collect()
    }

    /// Scan `samples`, returning one detection per flagged sample,
    /// sorted by index. Buffers shorter than a frame yield nothing.
    pub fn detect(&mut self, samples: &[f32]) -> Vec<ClickDetection> {
        self.reset();
        if let Err(e) = self.config.validate() {
            warn!("LPC detector disabled: {}", e);
            return Vec::new();
        }
        if !self.prepared {
            self.prepare();
        }

        let frame_size = self.config.frame_size;
        let mut frames = 0usize;
        for start in frame_starts(samples.len(), frame_size, self.config.hop_size) {
            self.analyze_frame(&samples[start..start + frame_size], start);
            frames += 1;
        }

        // Overlapping frames can flag the same sample twice
        self.detections.sort_by(|a, b| {
            a.sample_index
                .cmp(&b.sample_index)
                .then(b.amplitude.abs().total_cmp(&a.amplitude.abs()))
        });
        self.detections.dedup_by_key(|d| d.sample_index);

        debug!(frames, detections = self.detections.len(), "LPC detection complete");
        self.detections.clone()
    }

    fn analyze_frame(&mut self, frame: &[f32], offset: usize) {
        let order = self.config.lpc_order;
        let n = frame.len();

        autocorrelation_into(frame, &mut self.autocorr);
        if self.autocorr[0] < EPSILON {
            trace!(offset, "skipping silent frame");
            return;
        }
        levinson_into(
            &self.autocorr,
            order,
            &mut self.inverse,
            &mut self.scratch,
            &mut self.reflection,
        );

        // e[n] = x[n] + sum a[j] x[n-j] with the inverse filter, which is
        // x[n] - prediction
        let residual = &mut self.residual[..n];
        for i in 0..n {
            let taps = i.min(order);
            let mut e = f64::from(frame[i]);
            for j in 1..=taps {
                e += self.inverse[j] * f64::from(frame[i - j]);
            }
            residual[i] = e;
        }

        self.abs_residual.clear();
        self.abs_residual
            .extend(residual[order..].iter().map(|e| e.abs()));
        let median = compute_median(&mut self.abs_residual);
        let mad = compute_mad(&mut self.abs_residual);
        let threshold = median + f64::from(self.config.threshold) * mad.max(MAD_FLOOR);
        trace!(offset, median, mad, threshold, "frame residual statistics");

        for (i, &e) in residual.iter().enumerate().skip(order) {
            if e.abs() > threshold {
                let sample_index = offset + i;
                self.detections.push(ClickDetection {
                    sample_index,
                    amplitude: e as f32,
                    time_seconds: sample_index as f64 / self.config.sample_rate,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::{insert_click, sine, white_noise};
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_default_config_is_valid() {
        assert!(LpcDetectorConfig::default().is_valid());
    }

    #[test]
    fn test_order_out_of_range() {
        for order in [0, 3, 33] {
            let config = LpcDetectorConfig {
                lpc_order: order,
                ..Default::default()
            };
            assert!(!config.is_valid(), "order {} accepted", order);
            assert!(LpcDetector::new(config).detect(&[0.1; 4096]).is_empty());
        }
    }

    #[test]
    fn test_frame_must_exceed_twice_order() {
        let config = LpcDetectorConfig {
            lpc_order: 32,
            frame_size: 64,
            hop_size: 32,
            ..Default::default()
        };
        assert!(!config.is_valid());
    }

    #[test]
    fn test_autocorrelation() {
        let r = autocorrelation(&[1.0, 2.0, 3.0], 3);
        assert_eq!(r, vec![14.0, 8.0, 3.0, 0.0]);
    }

    #[test]
    fn test_levinson_recovers_ar1() {
        // R[k] = 0.9^k is the normalised autocorrelation of an AR(1)
        // process with coefficient 0.9
        let r: Vec<f64> = (0..=4).map(|k| 0.9_f64.powi(k)).collect();
        let model = levinson_durbin(&r, 4);

        assert_abs_diff_eq!(model.coefficients[0], 0.9, epsilon = 1e-9);
        for &c in &model.coefficients[1..] {
            assert_abs_diff_eq!(c, 0.0, epsilon = 1e-9);
        }
        assert_abs_diff_eq!(model.reflection_coefficients[0], -0.9, epsilon = 1e-9);
        assert_abs_diff_eq!(model.prediction_error, 1.0 - 0.81, epsilon = 1e-9);
    }

    #[test]
    fn test_levinson_error_is_floored() {
        let model = levinson_durbin(&[0.0, 0.0, 0.0], 2);
        assert!(model.prediction_error >= LEVINSON_ERROR_FLOOR);
        assert!(model.coefficients.iter().all(|c| c.is_finite()));
    }

    #[test]
    fn test_clean_sine_has_no_detections() {
        let signal = sine(440.0, 0.5, 44_100.0, 16_384);
        let mut detector = LpcDetector::new(LpcDetectorConfig::default());
        detector.prepare();
        assert!(detector.detect(&signal).is_empty());
    }

    #[test]
    fn test_detects_click_in_sine() {
        let mut signal = sine(440.0, 0.5, 44_100.0, 16_384);
        insert_click(&mut signal, 6_000, 0.5);

        let mut detector = LpcDetector::new(LpcDetectorConfig::default());
        let detections = detector.detect(&signal);

        assert!(!detections.is_empty());
        assert!(detections.iter().any(|d| d.sample_index == 6_000));
        assert!(detections
            .iter()
            .all(|d| (6_000..6_000 + 2 * MAX_LPC_ORDER).contains(&d.sample_index)));
        assert!(detections
            .windows(2)
            .all(|w| w[0].sample_index < w[1].sample_index));
    }

    #[test]
    fn test_detects_click_after_last_full_hop() {
        let mut signal = sine(440.0, 0.5, 44_100.0, 44_100);
        insert_click(&mut signal, 44_080, 0.5);

        let mut detector = LpcDetector::new(LpcDetectorConfig::default());
        let detections = detector.detect(&signal);
        assert!(detections.iter().any(|d| d.sample_index == 44_080), "{:?}", detections);
    }

    #[test]
    fn test_overlapping_frames_keep_largest_residual() {
        let config = LpcDetectorConfig {
            frame_size: 1024,
            hop_size: 256,
            ..Default::default()
        };
        let mut signal = sine(440.0, 0.5, 44_100.0, 16_384);
        insert_click(&mut signal, 6_000, 0.5);

        // every frame on the hop grid that holds the click past the first
        // `lpc_order` samples, analysed on its own
        let mut single = LpcDetector::new(config);
        let per_frame: Vec<f32> = [5_120, 5_376, 5_632, 5_888]
            .iter()
            .filter_map(|&start| {
                single
                    .detect(&signal[start..start + 1024])
                    .into_iter()
                    .find(|d| d.sample_index == 6_000 - start)
                    .map(|d| d.amplitude)
            })
            .collect();
        assert!(per_frame.len() >= 2, "{:?}", per_frame);
        let largest = per_frame
            .iter()
            .copied()
            .max_by(|a, b| a.abs().total_cmp(&b.abs()))
            .unwrap();
        assert!(per_frame.iter().any(|&a| a != largest), "{:?}", per_frame);

        let detections = LpcDetector::new(config).detect(&signal);
        let kept: Vec<_> = detections.iter().filter(|d| d.sample_index == 6_000).collect();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].amplitude, largest);
    }

    #[test]
    fn test_silence_is_skipped() {
        let mut detector = LpcDetector::new(LpcDetectorConfig::default());
        assert!(detector.detect(&[0.0; 8192]).is_empty());
    }

    #[test]
    fn test_short_buffer_yields_nothing() {
        let mut detector = LpcDetector::new(LpcDetectorConfig::default());
        assert!(detector.detect(&[0.5, -0.5, 0.5]).is_empty());
    }

    #[test]
    fn test_higher_threshold_never_adds_detections() {
        let noise = white_noise(0.5, 32_768, 11);
        let mut previous = usize::MAX;
        for threshold in [1.0, 2.0, 4.0, 8.0, 16.0] {
            let config = LpcDetectorConfig {
                threshold,
                ..Default::default()
            };
            let count = LpcDetector::new(config).detect(&noise).len();
            assert!(count <= previous, "threshold {} gave {} > {}", threshold, count, previous);
            previous = count;
        }
    }

    #[test]
    fn test_coefficients_track_last_frame() {
        let signal = sine(1_000.0, 0.5, 44_100.0, 4096);
        let mut detector = LpcDetector::new(LpcDetectorConfig::default());
        detector.detect(&signal);
        let coefficients = detector.last_coefficients();
        assert_eq!(coefficients.len(), 16);
        assert!(coefficients.iter().all(|c| c.is_finite()));
    }
}
