//! Artifact detectors
//!
//! Each detector is a two-phase object: a cheap `*Config` value validated
//! with `is_valid()`, and an analyzer that allocates its working buffers in
//! `prepare()` and can then run `detect()` any number of times.
//! An invalid configuration turns the detector into a no-op that returns no
//! detections.

mod click;
mod lpc;
mod spectral;

pub use click::{merge_detections, ClickDetection, ClickDetector, ClickDetectorConfig};
pub use lpc::{autocorrelation, levinson_durbin, LpcDetector, LpcDetectorConfig, LpcModel};
pub use spectral::{
    spectral_flatness, SpectralAnomalyConfig, SpectralAnomalyDetection, SpectralAnomalyDetector,
};

use crate::error::{Result, VerifyError};
use crate::numeric::{MAX_SAMPLE_RATE, MIN_SAMPLE_RATE};

/// Shared sample-rate range check
pub(crate) fn validate_sample_rate(sample_rate: f64) -> Result<()> {
    if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&sample_rate) {
        return Err(VerifyError::invalid_config(
            "sample_rate",
            sample_rate,
            "22050 to 192000 Hz",
        ));
    }
    Ok(())
}

/// Shared frame/hop check: power-of-two frame, hop in `1..=frame`
pub(crate) fn validate_framing(
    frame_param: &str,
    frame_size: usize,
    hop_size: usize,
) -> Result<()> {
    if frame_size < 4 || !frame_size.is_power_of_two() {
        return Err(VerifyError::invalid_config(
            frame_param,
            frame_size,
            "a power of two >= 4",
        ));
    }
    if hop_size == 0 || hop_size > frame_size {
        return Err(VerifyError::invalid_config(
            "hop_size",
            hop_size,
            format!("1 to {}", frame_size),
        ));
    }
    Ok(())
}

/// Start offsets of every full frame in a buffer of `len` samples.
///
/// When the hop grid stops short of the end, one extra frame aligned to
/// `len - frame_size` covers the remaining samples.
pub(crate) fn frame_starts(
    len: usize,
    frame_size: usize,
    hop_size: usize,
) -> impl Iterator<Item = usize> {
    let hop = hop_size.max(1);
    let last = len.checked_sub(frame_size);
    let on_grid = last.map_or(0, |last| last / hop + 1);
    let tail = last.filter(|&last| last % hop != 0);
    (0..on_grid).map(move |i| i * hop).chain(tail)
}
