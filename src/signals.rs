//! Deterministic test-signal generators
//!
//! Fixtures for tests, benches and the `generate` command. Random signals
//! take an explicit seed so every run produces identical samples.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::TAU;

/// Sine tone starting at zero phase
pub fn sine(frequency: f32, amplitude: f32, sample_rate: f64, num_samples: usize) -> Vec<f32> {
    let step = TAU * f64::from(frequency) / sample_rate;
    (0..num_samples)
        .map(|i| (f64::from(amplitude) * (step * i as f64).sin()) as f32)
        .collect()
}

/// Uniform white noise in `[-amplitude, amplitude)`
pub fn white_noise(amplitude: f32, num_samples: usize, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..num_samples)
        .map(|_| amplitude * rng.gen_range(-1.0_f32..1.0))
        .collect()
}

pub fn silence(num_samples: usize) -> Vec<f32> {
    vec![0.0; num_samples]
}

/// Add a single-sample impulse; out-of-range indices are ignored
pub fn insert_click(samples: &mut [f32], index: usize, amplitude: f32) {
    if let Some(sample) = samples.get_mut(index) {
        *sample += amplitude;
    }
}

/// Scale by `drive` and clip to [-1, 1]
pub fn hard_clip(samples: &[f32], drive: f32) -> Vec<f32> {
    samples.iter().map(|&s| (s * drive).clamp(-1.0, 1.0)).collect()
}

/// Sum `src` into `dst` over their common length
pub fn mix(dst: &mut [f32], src: &[f32]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d += s;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numeric::{peak, rms};
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_sine_shape() {
        let tone = sine(1_000.0, 0.5, 48_000.0, 48_000);
        assert_eq!(tone.len(), 48_000);
        assert_eq!(tone[0], 0.0);
        assert_abs_diff_eq!(peak(&tone), 0.5, epsilon = 1e-4);
        assert_abs_diff_eq!(rms(&tone), 0.5 / 2.0_f64.sqrt(), epsilon = 1e-4);
        // quarter period at 1 kHz / 48 kHz is 12 samples
        assert_abs_diff_eq!(tone[12], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_noise_is_seeded() {
        let a = white_noise(0.5, 1024, 42);
        let b = white_noise(0.5, 1024, 42);
        let c = white_noise(0.5, 1024, 43);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.iter().all(|s| s.abs() <= 0.5));
    }

    #[test]
    fn test_insert_click_adds_and_ignores_out_of_range() {
        let mut samples = vec![0.25; 8];
        insert_click(&mut samples, 3, 0.5);
        insert_click(&mut samples, 100, 0.5);
        assert_eq!(samples[3], 0.75);
        assert_eq!(samples.iter().filter(|&&s| s == 0.25).count(), 7);
    }

    #[test]
    fn test_hard_clip() {
        assert_eq!(hard_clip(&[0.1, 0.5, -0.5], 4.0), vec![0.4, 1.0, -1.0]);
    }

    #[test]
    fn test_mix_and_silence() {
        let mut dst = silence(4);
        mix(&mut dst, &[1.0, 2.0]);
        assert_eq!(dst, vec![1.0, 2.0, 0.0, 0.0]);
    }
}
