//! Shared numeric guards and decibel conversions
//!
//! Every near-zero denominator in the crate goes through the helpers here so
//! the floors and ceilings stay in one auditable place. The values are tuned
//! constants, not precision guarantees; components that use them expose
//! overrides where tests need to probe edge cases.

/// Reported SNR when the noise power is negligible (instead of +inf)
pub const SNR_CEILING_DB: f32 = 200.0;

/// Lower bound for any dB figure derived from a ratio that may be zero
pub const DB_FLOOR: f32 = -200.0;

/// Generic small-number guard for power and magnitude denominators
pub const EPSILON: f64 = 1e-10;

/// Floor applied to the Levinson-Durbin prediction error
pub const LEVINSON_ERROR_FLOOR: f64 = 1e-10;

/// Floor applied to the MAD before it scales the LPC outlier threshold
pub const MAD_FLOOR: f64 = 0.001;

/// Spectrum bins at or below this magnitude are left out of flatness
pub const MAGNITUDE_EPSILON: f32 = 1e-10;

/// Bins searched either side of an expected harmonic when peak-picking
pub const PEAK_SEARCH_BINS: usize = 2;

/// Highest harmonic included in THD by default
pub const DEFAULT_MAX_HARMONIC: usize = 10;

/// Minimum signal length for a THD measurement
pub const THD_MIN_SAMPLES: usize = 256;

/// Largest FFT used for whole-buffer measurements
pub const MAX_ANALYSIS_FFT: usize = 65536;

/// Minimum signal length for kurtosis
pub const KURTOSIS_MIN_SAMPLES: usize = 4;

/// Lowest sample rate any analyzer accepts
pub const MIN_SAMPLE_RATE: f64 = 22_050.0;
/// Highest sample rate any analyzer accepts
pub const MAX_SAMPLE_RATE: f64 = 192_000.0;

/// Convert linear amplitude to decibels, floored at `DB_FLOOR`
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 || !linear.is_finite() {
        DB_FLOOR
    } else {
        (20.0 * linear.log10()).max(DB_FLOOR)
    }
}

/// Convert decibels to linear amplitude
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert a power ratio to decibels, floored at `DB_FLOOR`
pub fn power_to_db(power: f64) -> f32 {
    if power <= 0.0 || !power.is_finite() {
        DB_FLOOR
    } else {
        ((10.0 * power.log10()) as f32).max(DB_FLOOR)
    }
}

/// Divide, returning `fallback` when the denominator is below `EPSILON`
pub fn guarded_div(numerator: f64, denominator: f64, fallback: f64) -> f64 {
    if denominator.abs() < EPSILON {
        fallback
    } else {
        numerator / denominator
    }
}

/// Largest power of two that is `<= n`, or 0 when `n == 0`
pub fn prev_power_of_two(n: usize) -> usize {
    if n == 0 {
        0
    } else {
        1 << (usize::BITS - 1 - n.leading_zeros())
    }
}

/// RMS level of a slice, accumulated in f64
pub fn rms(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = samples.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    (sum_squares / samples.len() as f64).sqrt()
}

/// Peak absolute sample value
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0_f32, f32::max)
}
