//! Spectral-flatness anomaly detector
//!
//! Flatness is the ratio of geometric to arithmetic mean of a magnitude
//! spectrum: near 0 for tonal content, near 1 for noise. A frame whose
//! flatness jumps above the threshold marks a broadband event (click,
//! glitch, injected noise) against otherwise tonal material.

use super::{frame_starts, validate_sample_rate};
use crate::error::{Result, VerifyError};
use crate::numeric::MAGNITUDE_EPSILON;
use crate::transform::{magnitudes_without_dc, RustFftTransform, Transform};
use rustfft::num_complex::Complex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Spectral anomaly detector parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectralAnomalyConfig {
    /// Sample rate in Hz (22050 to 192000)
    pub sample_rate: f64,
    /// FFT length (power of two)
    pub fft_size: usize,
    /// Frame advance (1 to fft_size)
    pub hop_size: usize,
    /// Frames above this flatness are flagged (0 to 1)
    pub flatness_threshold: f32,
    /// Expected flatness of the clean material (0 to 1)
    pub baseline_flatness: f32,
}

impl Default for SpectralAnomalyConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100.0,
            fft_size: 2048,
            hop_size: 1024,
            flatness_threshold: 0.5,
            baseline_flatness: 0.1,
        }
    }
}

impl SpectralAnomalyConfig {
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
        super::validate_framing("fft_size", self.fft_size, self.hop_size)?;
        if !(0.0..=1.0).contains(&self.flatness_threshold) {
            return Err(VerifyError::invalid_config(
                "flatness_threshold",
                self.flatness_threshold,
                "0 to 1",
            ));
        }
        if !(0.0..=1.0).contains(&self.baseline_flatness) {
            return Err(VerifyError::invalid_config(
                "baseline_flatness",
                self.baseline_flatness,
                "0 to 1",
            ));
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Effective gate: a frame must beat both the threshold and the baseline
    fn gate(&self) -> f32 {
        self.flatness_threshold.max(self.baseline_flatness)
    }
}

/// A frame whose spectrum looked broadband
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpectralAnomalyDetection {
    pub frame_index: usize,
    /// Start of the frame in seconds
    pub time_seconds: f64,
    pub flatness: f32,
}

/// Geometric / arithmetic mean of the magnitudes above `MAGNITUDE_EPSILON`.
///
/// Returns 0 when no bin carries energy.
pub fn spectral_flatness(magnitudes: &[f32]) -> f32 {
    let mut log_sum = 0.0_f64;
    let mut sum = 0.0_f64;
    let mut count = 0usize;
    for &m in magnitudes {
        if m > MAGNITUDE_EPSILON {
            log_sum += f64::from(m).ln();
            sum += f64::from(m);
            count += 1;
        }
    }
    if count == 0 {
        return 0.0;
    }
    let geometric = (log_sum / count as f64).exp();
    let arithmetic = sum / count as f64;
    (geometric / arithmetic).clamp(0.0, 1.0) as f32
}

/// Frame-wise spectral flatness monitor
#[derive(Debug)]
pub struct SpectralAnomalyDetector<T: Transform = RustFftTransform> {
    config: SpectralAnomalyConfig,
    transform: T,
    window: Vec<f32>,
    windowed: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
    detections: Vec<SpectralAnomalyDetection>,
    prepared: bool,
}

impl SpectralAnomalyDetector<RustFftTransform> {
    pub fn new(config: SpectralAnomalyConfig) -> Self {
        Self::with_transform(config, RustFftTransform::new())
    }
}

impl<T: Transform> SpectralAnomalyDetector<T> {
    /// Build a detector around a caller-supplied transform
    pub fn with_transform(config: SpectralAnomalyConfig, transform: T) -> Self {
        Self {
            config,
            transform,
            window: Vec::new(),
            windowed: Vec::new(),
            spectrum: Vec::new(),
            magnitudes: Vec::new(),
            detections: Vec::new(),
            prepared: false,
        }
    }

    pub fn config(&self) -> &SpectralAnomalyConfig {
        &self.config
    }

    /// Allocate the window and FFT buffers. Not meant to be called per buffer.
    pub fn prepare(&mut self) {
        let n = self.config.fft_size;
        self.window = self.transform.hann(n);
        self.windowed = vec![0.0; n];
        self.spectrum = vec![Complex::new(0.0, 0.0); n / 2 + 1];
        self.magnitudes = Vec::with_capacity(n / 2);
        self.detections = Vec::with_capacity(16);
        self.prepared = true;
    }

    /// Clear accumulated detections; working buffers are kept
    pub fn reset(&mut self) {
        self.detections.clear();
    }

    /// Detections from the most recent `detect` call
    pub fn detections(&self) -> &[SpectralAnomalyDetection] {
        &self.detections
    }

    /// Flag every frame whose flatness exceeds the configured gate
    pub fn detect(&mut self, samples: &[f32]) -> Vec<SpectralAnomalyDetection> {
        self.reset();
        let frames = self.flatness_frames(samples);
        let gate = self.config.gate();
        let sample_rate = self.config.sample_rate;

        self.detections.extend(
            frames
                .iter()
                .enumerate()
                .filter(|&(_, &(_, flatness))| flatness > gate)
                .map(|(frame_index, &(start, flatness))| SpectralAnomalyDetection {
                    frame_index,
                    time_seconds: start as f64 / sample_rate,
                    flatness,
                }),
        );
        debug!(
            frames = frames.len(),
            anomalies = self.detections.len(),
            "spectral anomaly detection complete"
        );
        self.detections.clone()
    }

    /// Per-frame flatness with no threshold applied.
    ///
    /// Buffers shorter than one FFT frame produce an empty track.
    pub fn compute_flatness_track(&mut self, samples: &[f32]) -> Vec<f32> {
        self.flatness_frames(samples)
            .into_iter()
            .map(|(_, flatness)| flatness)
            .collect()
    }

    /// `(start, flatness)` for every analysed frame
    fn flatness_frames(&mut self, samples: &[f32]) -> Vec<(usize, f32)> {
        if let Err(e) = self.config.validate() {
            warn!("spectral anomaly detector disabled: {}", e);
            return Vec::new();
        }
        if !self.prepared {
            self.prepare();
        }

        let n = self.config.fft_size;
        frame_starts(samples.len(), n, self.config.hop_size)
            .map(|start| (start, self.frame_flatness(&samples[start..start + n])))
            .collect()
    }

    fn frame_flatness(&mut self, frame: &[f32]) -> f32 {
        for ((w, &x), &h) in self.windowed.iter_mut().zip(frame).zip(&self.window) {
            *w = x * h;
        }
        self.transform.forward(&self.windowed, &mut self.spectrum);
        magnitudes_without_dc(&self.spectrum, &mut self.magnitudes);
        spectral_flatness(&self.magnitudes)
    }
}
