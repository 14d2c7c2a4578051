//! Click/pop detector
//!
//! Finds abrupt sample-to-sample jumps with a frame-local outlier test on
//! the first difference of the signal. Statistics are computed per frame
//! because audio energy is non-stationary: a sigma rule adapts to loud and
//! quiet passages without per-material tuning.

use super::{frame_starts, validate_framing, validate_sample_rate};
use crate::error::{Result, VerifyError};
use crate::numeric::{linear_to_db, rms};
use crate::stats::{compute_mean, compute_std_dev};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

/// Click detector parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClickDetectorConfig {
    /// Sample rate in Hz (22050 to 192000)
    pub sample_rate: f64,
    /// Analysis frame length (power of two)
    pub frame_size: usize,
    /// Frame advance (1 to frame_size)
    pub hop_size: usize,
    /// Sigma multiplier above the mean |derivative|
    pub detection_threshold: f32,
    /// Frames with RMS below this level are skipped
    pub energy_threshold_db: f32,
    /// Detections closer than this many samples are merged
    pub merge_gap: usize,
}

impl Default for ClickDetectorConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100.0,
            frame_size: 512,
            hop_size: 256,
            detection_threshold: 5.0,
            energy_threshold_db: -60.0,
            merge_gap: 32,
        }
    }
}

impl ClickDetectorConfig {
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
        validate_framing("frame_size", self.frame_size, self.hop_size)?;
        if !self.detection_threshold.is_finite() || self.detection_threshold <= 0.0 {
            return Err(VerifyError::invalid_config(
                "detection_threshold",
                self.detection_threshold,
                "a positive sigma multiplier",
            ));
        }
        if self.energy_threshold_db.is_nan() {
            return Err(VerifyError::invalid_config(
                "energy_threshold_db",
                self.energy_threshold_db,
                "a level in dB",
            ));
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

/// A single detected discontinuity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClickDetection {
    /// Index into the analysed buffer
    pub sample_index: usize,
    /// Signed jump size (derivative, or residual for LPC detections)
    pub amplitude: f32,
    /// `sample_index / sample_rate`
    pub time_seconds: f64,
}

/// Sort detections by index and collapse every run whose neighbours are at
/// most `merge_gap` samples apart into its largest-|amplitude| member.
pub fn merge_detections(detections: &mut Vec<ClickDetection>, merge_gap: usize) {
    if detections.len() < 2 {
        return;
    }
    detections.sort_by_key(|d| d.sample_index);

    let mut merged: Vec<ClickDetection> = Vec::with_capacity(detections.len());
    let mut cluster_end = 0usize;
    for detection in detections.drain(..) {
        match merged.last_mut() {
            Some(best) if detection.sample_index - cluster_end <= merge_gap => {
                if detection.amplitude.abs() > best.amplitude.abs() {
                    *best = detection;
                }
            }
            _ => merged.push(detection),
        }
        cluster_end = detection.sample_index;
    }
    *detections = merged;
}

/// Derivative-based click detector
#[derive(Debug, Clone)]
pub struct ClickDetector {
    config: ClickDetectorConfig,
    /// First difference of the current frame
    derivative: Vec<f32>,
    /// |derivative|, kept separately for the statistics
    abs_derivative: Vec<f32>,
    /// Detections accumulated by the last `detect` call
    detections: Vec<ClickDetection>,
    prepared: bool,
}

impl ClickDetector {
    pub fn new(config: ClickDetectorConfig) -> Self {
        Self {
            config,
            derivative: Vec::new(),
            abs_derivative: Vec::new(),
            detections: Vec::new(),
            prepared: false,
        }
    }

    pub fn config(&self) -> &ClickDetectorConfig {
        &self.config
    }

    /// Allocate working buffers. Not meant to be called per buffer.
    pub fn prepare(&mut self) {
        let frame = self.config.frame_size;
        self.derivative = vec![0.0; frame];
        self.abs_derivative = vec![0.0; frame];
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

    /// Scan `samples` and return the merged, index-sorted detections
    pub fn detect(&mut self, samples: &[f32]) -> Vec<ClickDetection> {
        self.reset();
        if let Err(e) = self.config.validate() {
            warn!("click detector disabled: {}", e);
            return Vec::new();
        }
        if !self.prepared {
            self.prepare();
        }

        let frame_size = self.config.frame_size;
        let mut frames = 0usize;
        if samples.len() < frame_size {
            if samples.len() >= 2 {
                self.analyze_frame(samples, 0);
                frames = 1;
            }
        } else {
            for start in frame_starts(samples.len(), frame_size, self.config.hop_size) {
                self.analyze_frame(&samples[start..start + frame_size], start);
                frames += 1;
            }
        }

        let raw = self.detections.len();
        merge_detections(&mut self.detections, self.config.merge_gap);
        debug!(
            frames,
            raw,
            merged = self.detections.len(),
            "click detection complete"
        );
        self.detections.clone()
    }

    fn analyze_frame(&mut self, frame: &[f32], offset: usize) {
        let n = frame.len();

        let level_db = linear_to_db(rms(frame) as f32);
        if level_db < self.config.energy_threshold_db {
            trace!(offset, level_db, "skipping quiet frame");
            return;
        }

        let derivative = &mut self.derivative[..n];
        let abs_derivative = &mut self.abs_derivative[..n];
        derivative[0] = 0.0;
        for i in 1..n {
            derivative[i] = frame[i] - frame[i - 1];
        }
        for (a, d) in abs_derivative.iter_mut().zip(derivative.iter()) {
            *a = d.abs();
        }

        let mean = compute_mean(abs_derivative);
        let std_dev = compute_std_dev(abs_derivative);
        let threshold = mean + self.config.detection_threshold * std_dev;

        for (i, &d) in derivative.iter().enumerate() {
            if d.abs() > threshold {
                let sample_index = offset + i;
                self.detections.push(ClickDetection {
                    sample_index,
                    amplitude: d,
                    time_seconds: sample_index as f64 / self.config.sample_rate,
                });
            }
        }
    }
}
