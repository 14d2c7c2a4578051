//! Aggregate signal-quality metrics
//!
//! # Measurements
//! - SNR against a reference (ceiling instead of +inf)
//! - THD via peak-picked harmonic bins
//! - Crest factor (peak/RMS ratio)
//! - Excess kurtosis
//! - Zero-crossing rate
//! - Spectral flatness of a whole buffer
//! - Aliasing: power outside the harmonic series of a known fundamental
//!
//! Time-domain metrics are free functions. Spectral ones live on
//! `SignalMetrics`, which owns the transform and the tunable constants.

use crate::detect::spectral_flatness;
use crate::error::{Result, VerifyError};
use crate::numeric::{
    guarded_div, linear_to_db, peak, power_to_db, prev_power_of_two, rms, DB_FLOOR,
    DEFAULT_MAX_HARMONIC, EPSILON, KURTOSIS_MIN_SAMPLES, MAX_ANALYSIS_FFT, PEAK_SEARCH_BINS,
    SNR_CEILING_DB, THD_MIN_SAMPLES,
};
use crate::stats::{compute_mean, compute_moment};
use crate::transform::{RustFftTransform, Transform};
use rustfft::num_complex::Complex;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

/// Bins either side of each harmonic excluded from the aliasing sum
pub const ALIAS_GUARD_BINS: usize = 8;

/// Tunables for `SignalMetrics`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub sample_rate: f64,
    /// SNR reported when the noise power is negligible
    pub snr_ceiling_db: f32,
    /// ± bins searched around each expected harmonic
    pub peak_search_bins: usize,
    /// Highest harmonic included in THD
    pub max_harmonic: usize,
    /// Fundamental assumed by the CLI when none is given (0 = auto-detect)
    pub fundamental_hz: f32,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100.0,
            snr_ceiling_db: SNR_CEILING_DB,
            peak_search_bins: PEAK_SEARCH_BINS,
            max_harmonic: DEFAULT_MAX_HARMONIC,
            fundamental_hz: 0.0,
        }
    }
}

impl MetricsConfig {
    pub fn validate(&self) -> Result<()> {
        crate::detect::validate_sample_rate(self.sample_rate)?;
        if !(self.snr_ceiling_db > 0.0 && self.snr_ceiling_db.is_finite()) {
            return Err(VerifyError::invalid_config(
                "snr_ceiling_db",
                self.snr_ceiling_db,
                "a positive finite dB value",
            ));
        }
        if self.max_harmonic < 2 {
            return Err(VerifyError::invalid_config(
                "max_harmonic",
                self.max_harmonic,
                ">= 2",
            ));
        }
        if !(self.fundamental_hz >= 0.0 && f64::from(self.fundamental_hz) < self.sample_rate / 2.0)
        {
            return Err(VerifyError::invalid_config(
                "fundamental_hz",
                self.fundamental_hz,
                "0 (auto) or below Nyquist",
            ));
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

/// Bundle of the headline quality numbers for one signal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalQualityMetrics {
    pub snr_db: f32,
    pub thd_percent: f32,
    pub thd_db: f32,
    pub crest_factor_db: f32,
    pub kurtosis: f32,
}

impl SignalQualityMetrics {
    /// True when every field is finite. Says nothing about whether the
    /// values are good.
    pub fn is_valid(&self) -> bool {
        [
            self.snr_db,
            self.thd_percent,
            self.thd_db,
            self.crest_factor_db,
            self.kurtosis,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

/// Power split of a windowed spectrum around a known fundamental
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AliasingMeasurement {
    /// Fundamental power, dB relative to a full-scale sine
    pub fundamental_db: f32,
    /// Power of everything that is not DC, the fundamental or a harmonic
    pub aliasing_db: f32,
    /// `aliasing_db - fundamental_db`
    pub alias_to_fundamental_db: f32,
}

impl Default for AliasingMeasurement {
    fn default() -> Self {
        Self {
            fundamental_db: DB_FLOOR,
            aliasing_db: DB_FLOOR,
            alias_to_fundamental_db: 0.0,
        }
    }
}

/// SNR in dB of `signal` against `reference` over their common length,
/// clamped to `±ceiling_db`.
pub fn snr_db_with_ceiling(signal: &[f32], reference: &[f32], ceiling_db: f32) -> f32 {
    let n = signal.len().min(reference.len());
    let mut signal_power = 0.0_f64;
    let mut noise_power = 0.0_f64;
    for (&s, &r) in signal[..n].iter().zip(&reference[..n]) {
        let r = f64::from(r);
        let d = f64::from(s) - r;
        signal_power += r * r;
        noise_power += d * d;
    }
    if noise_power < EPSILON {
        return ceiling_db;
    }
    let snr = 10.0 * (signal_power.max(EPSILON) / noise_power).log10();
    (snr as f32).clamp(-ceiling_db, ceiling_db)
}

/// SNR in dB with the default 200 dB ceiling
pub fn compute_snr(signal: &[f32], reference: &[f32]) -> f32 {
    snr_db_with_ceiling(signal, reference, SNR_CEILING_DB)
}

/// Crest factor (peak/RMS) in dB; 0 for silence
pub fn crest_factor_db(samples: &[f32]) -> f32 {
    let level = rms(samples);
    if level < EPSILON {
        return 0.0;
    }
    linear_to_db((f64::from(peak(samples)) / level) as f32)
}

/// Excess kurtosis `m4 / m2^2 - 3`; 0 below four samples or for a constant
pub fn kurtosis(samples: &[f32]) -> f32 {
    if samples.len() < KURTOSIS_MIN_SAMPLES {
        return 0.0;
    }
    let data: Vec<f64> = samples.iter().map(|&s| f64::from(s)).collect();
    let mean = compute_mean(&data);
    let m2 = compute_moment(&data, mean, 2);
    if m2 < EPSILON {
        return 0.0;
    }
    let m4 = compute_moment(&data, mean, 4);
    (m4 / (m2 * m2) - 3.0) as f32
}

/// Fraction of adjacent sample pairs whose sign differs
pub fn zero_crossing_rate(samples: &[f32]) -> f32 {
    if samples.len() < 2 {
        return 0.0;
    }
    let crossings = samples
        .windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count();
    crossings as f32 / (samples.len() - 1) as f32
}

/// Convert a THD percentage to dB, floored at `DB_FLOOR`
pub fn thd_percent_to_db(thd_percent: f32) -> f32 {
    linear_to_db(thd_percent / 100.0)
}

/// Spectral quality metrics over whole buffers
#[derive(Debug)]
pub struct SignalMetrics<T: Transform = RustFftTransform> {
    sample_rate: f64,
    transform: T,
    snr_ceiling_db: f32,
    peak_search_bins: usize,
    max_harmonic: usize,
    windowed: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
}

impl SignalMetrics<RustFftTransform> {
    pub fn new(sample_rate: f64) -> Self {
        Self::with_transform(sample_rate, RustFftTransform::new())
    }

    /// Build from a config section, falling back to defaults if it is invalid
    pub fn from_config(config: &MetricsConfig) -> Self {
        if let Err(e) = config.validate() {
            warn!("metrics config ignored: {}", e);
            return Self::new(MetricsConfig::default().sample_rate);
        }
        Self::new(config.sample_rate)
            .with_snr_ceiling(config.snr_ceiling_db)
            .with_peak_search_bins(config.peak_search_bins)
            .with_max_harmonic(config.max_harmonic)
    }
}

impl<T: Transform> SignalMetrics<T> {
    /// Build around a caller-supplied transform
    pub fn with_transform(sample_rate: f64, transform: T) -> Self {
        Self {
            sample_rate,
            transform,
            snr_ceiling_db: SNR_CEILING_DB,
            peak_search_bins: PEAK_SEARCH_BINS,
            max_harmonic: DEFAULT_MAX_HARMONIC,
            windowed: Vec::new(),
            spectrum: Vec::new(),
        }
    }

    /// Override the SNR reported for a noiseless signal
    pub fn with_snr_ceiling(mut self, ceiling_db: f32) -> Self {
        self.snr_ceiling_db = ceiling_db;
        self
    }

    /// Override the ± bin radius searched around each harmonic
    pub fn with_peak_search_bins(mut self, bins: usize) -> Self {
        self.peak_search_bins = bins;
        self
    }

    /// Override the highest harmonic included in THD
    pub fn with_max_harmonic(mut self, harmonic: usize) -> Self {
        self.max_harmonic = harmonic.max(1);
        self
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn measure_snr(&self, signal: &[f32], reference: &[f32]) -> f32 {
        snr_db_with_ceiling(signal, reference, self.snr_ceiling_db)
    }

    /// Total harmonic distortion in percent of the fundamental.
    ///
    /// Returns 0 for buffers under `THD_MIN_SAMPLES`, a fundamental outside
    /// (0, Nyquist), or a fundamental bin with no energy.
    pub fn measure_thd(&mut self, signal: &[f32], fundamental_hz: f32) -> f32 {
        if signal.len() < THD_MIN_SAMPLES || fundamental_hz <= 0.0 || !fundamental_hz.is_finite() {
            return 0.0;
        }
        let n = analysis_size(signal.len());
        let magnitudes = self.magnitude_spectrum(&signal[..n]);
        let bin_hz = self.sample_rate / n as f64;
        let nyquist = self.sample_rate / 2.0;

        let fundamental_bin = (f64::from(fundamental_hz) / bin_hz).round() as usize;
        if fundamental_bin == 0 || fundamental_bin >= n / 2 {
            return 0.0;
        }
        let h1 = self.peak_near(&magnitudes, fundamental_bin);
        if f64::from(h1) < EPSILON {
            return 0.0;
        }

        let mut harmonic_power = 0.0_f64;
        for harmonic in 2..=self.max_harmonic {
            let freq = f64::from(fundamental_hz) * harmonic as f64;
            if freq >= nyquist {
                break;
            }
            let bin = (freq / bin_hz).round() as usize;
            let h = f64::from(self.peak_near(&magnitudes, bin));
            trace!(harmonic, bin, magnitude = h, "harmonic peak");
            harmonic_power += h * h;
        }

        (harmonic_power.sqrt() / f64::from(h1) * 100.0) as f32
    }

    /// Flatness of the whole buffer (largest power-of-two prefix)
    pub fn spectral_flatness(&mut self, samples: &[f32]) -> f32 {
        if samples.len() < 4 {
            return 0.0;
        }
        let n = analysis_size(samples.len());
        let magnitudes = self.magnitude_spectrum(&samples[..n]);
        spectral_flatness(&magnitudes[1..])
    }

    /// Frequency of the strongest non-DC bin; 0 for short or silent input
    pub fn dominant_frequency(&mut self, samples: &[f32]) -> f32 {
        if samples.len() < 4 {
            return 0.0;
        }
        let n = analysis_size(samples.len());
        let magnitudes = self.magnitude_spectrum(&samples[..n]);
        let bin_hz = self.sample_rate / n as f64;
        magnitudes
            .iter()
            .enumerate()
            .skip(1)
            .filter(|&(_, &m)| f64::from(m) > EPSILON)
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(bin, _)| (bin as f64 * bin_hz) as f32)
            .unwrap_or(0.0)
    }

    /// Split the spectrum of the first `fft_size` samples into fundamental,
    /// harmonics and the rest.
    ///
    /// Power is in dB relative to a full-scale sine and corrected for the
    /// window's noise bandwidth. Bins within `ALIAS_GUARD_BINS` of DC, the
    /// fundamental or any harmonic below Nyquist are excluded from the
    /// aliasing sum.
    pub fn measure_aliasing(
        &mut self,
        signal: &[f32],
        fundamental_hz: f32,
        fft_size: usize,
    ) -> AliasingMeasurement {
        if fft_size < 4
            || !fft_size.is_power_of_two()
            || signal.len() < fft_size
            || fundamental_hz <= 0.0
        {
            return AliasingMeasurement::default();
        }
        let window = self.transform.hann(fft_size);
        let magnitudes = self.magnitude_spectrum(&signal[..fft_size]);

        let coherent_gain: f64 = window.iter().map(|&w| f64::from(w)).sum();
        let energy: f64 = window.iter().map(|&w| f64::from(w) * f64::from(w)).sum();
        // equivalent noise bandwidth in bins
        let enbw = guarded_div(fft_size as f64 * energy, coherent_gain * coherent_gain, 1.0);
        let scale = guarded_div(2.0, coherent_gain, 0.0);

        let bin_hz = self.sample_rate / fft_size as f64;
        let nyquist_bin = fft_size / 2;
        let fundamental_bin = (f64::from(fundamental_hz) / bin_hz).round() as usize;
        if fundamental_bin == 0 || fundamental_bin >= nyquist_bin {
            return AliasingMeasurement::default();
        }

        let mut harmonic_bins = Vec::new();
        let mut harmonic = 1usize;
        loop {
            let bin = (f64::from(fundamental_hz) * harmonic as f64 / bin_hz).round() as usize;
            if bin > nyquist_bin {
                break;
            }
            harmonic_bins.push(bin);
            harmonic += 1;
        }

        let near = |bin: usize, centre: usize| bin.abs_diff(centre) <= ALIAS_GUARD_BINS;
        let mut fundamental_power = 0.0_f64;
        let mut aliasing_power = 0.0_f64;
        for (bin, &m) in magnitudes.iter().enumerate() {
            let power = (f64::from(m) * scale).powi(2) / enbw;
            if near(bin, fundamental_bin) {
                fundamental_power += power;
            } else if bin > ALIAS_GUARD_BINS && !harmonic_bins.iter().any(|&h| near(bin, h)) {
                aliasing_power += power;
            }
        }

        // scaled so a sine of amplitude A sums to A^2 over its main lobe
        let fundamental_db = power_to_db(fundamental_power);
        let aliasing_db = power_to_db(aliasing_power);
        AliasingMeasurement {
            fundamental_db,
            aliasing_db,
            alias_to_fundamental_db: aliasing_db - fundamental_db,
        }
    }

    /// SNR, THD, crest factor and kurtosis in one pass
    pub fn measure_quality(
        &mut self,
        signal: &[f32],
        reference: &[f32],
        fundamental_hz: f32,
    ) -> SignalQualityMetrics {
        let thd_percent = self.measure_thd(signal, fundamental_hz);
        SignalQualityMetrics {
            snr_db: self.measure_snr(signal, reference),
            thd_percent,
            thd_db: thd_percent_to_db(thd_percent),
            crest_factor_db: crest_factor_db(signal),
            kurtosis: kurtosis(signal),
        }
    }

    fn peak_near(&self, magnitudes: &[f32], bin: usize) -> f32 {
        let lo = bin.saturating_sub(self.peak_search_bins).max(1);
        let hi = (bin + self.peak_search_bins).min(magnitudes.len().saturating_sub(1));
        if lo > hi {
            return 0.0;
        }
        magnitudes[lo..=hi].iter().copied().fold(0.0_f32, f32::max)
    }

    /// Hann-windowed magnitude spectrum, DC included (n/2 + 1 bins)
    fn magnitude_spectrum(&mut self, frame: &[f32]) -> Vec<f32> {
        let n = frame.len();
        let window = self.transform.hann(n);
        self.windowed.clear();
        self.windowed
            .extend(frame.iter().zip(&window).map(|(&x, &w)| x * w));
        self.spectrum.clear();
        self.spectrum.resize(n / 2 + 1, Complex::new(0.0, 0.0));
        self.transform.forward(&self.windowed, &mut self.spectrum);
        self.spectrum.iter().map(|c| c.norm()).collect()
    }
}

/// FFT length used for whole-buffer analysis
fn analysis_size(len: usize) -> usize {
    prev_power_of_two(len).min(MAX_ANALYSIS_FFT)
}
