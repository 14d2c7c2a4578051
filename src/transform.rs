//! FFT and window primitives
//!
//! Spectral components only see the `Transform` trait: a half-spectrum
//! real-input forward FFT plus a Hann window generator. `RustFftTransform`
//! is the default implementation; hosts with their own FFT can plug it in.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::collections::HashMap;
use std::f32::consts::PI;
use std::sync::Arc;

/// Real-input forward transform with bin resolution `sample_rate / n`
pub trait Transform {
    /// Transform `input` (length n) into `spectrum` (length n/2 + 1).
    ///
    /// Bins beyond `spectrum.len()` are discarded; missing bins are left
    /// untouched.
    fn forward(&mut self, input: &[f32], spectrum: &mut [Complex<f32>]);

    /// Periodic Hann window of length `n`
    fn hann(&self, n: usize) -> Vec<f32> {
        generate_hann(n)
    }
}

/// Periodic Hann window: `0.5 * (1 - cos(2*pi*i/n))`
pub fn generate_hann(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / n as f32).cos()))
        .collect()
}

/// Magnitudes of `spectrum[1..]`, the DC bin excluded
pub fn magnitudes_without_dc(spectrum: &[Complex<f32>], out: &mut Vec<f32>) {
    out.clear();
    out.extend(spectrum.iter().skip(1).map(|c| c.norm()));
}

/// `Transform` backed by rustfft's complex FFT
///
/// Plans are cached per size, and the complex scratch buffer is reused
/// between calls.
pub struct RustFftTransform {
    planner: FftPlanner<f32>,
    plans: HashMap<usize, Arc<dyn Fft<f32>>>,
    buffer: Vec<Complex<f32>>,
}

impl RustFftTransform {
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
            plans: HashMap::new(),
            buffer: Vec::new(),
        }
    }

    fn plan(&mut self, n: usize) -> Arc<dyn Fft<f32>> {
        let planner = &mut self.planner;
        Arc::clone(
            self.plans
                .entry(n)
                .or_insert_with(|| planner.plan_fft_forward(n)),
        )
    }
}

impl Default for RustFftTransform {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RustFftTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RustFftTransform")
            .field("planned_sizes", &self.plans.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Transform for RustFftTransform {
    fn forward(&mut self, input: &[f32], spectrum: &mut [Complex<f32>]) {
        let n = input.len();
        if n == 0 {
            return;
        }
        let fft = self.plan(n);

        self.buffer.clear();
        self.buffer.extend(input.iter().map(|&s| Complex::new(s, 0.0)));
        fft.process(&mut self.buffer);

        let bins = spectrum.len().min(n / 2 + 1);
        spectrum[..bins].copy_from_slice(&self.buffer[..bins]);
    }
}
