//! signal-verify - Signal Quality Verification
//!
//! Automated checks for audio processing code: find clicks and other
//! artifacts, measure distortion and noise, compare against golden
//! references and sweep parameters to pin down where a processor breaks.
//!
//! # Architecture
//!
//! - `detect`: click, LPC-residual and spectral-flatness detectors
//! - `metrics`: SNR, THD, crest factor, kurtosis, aliasing
//! - `golden` / `sweep`: verdicts built on top of the detectors and metrics
//! - `stats`, `numeric`, `transform`: shared building blocks
//!
//! Analysis never fails: degenerate input or an invalid configuration yields
//! empty or zero-valued results. Only the edges (config files, WAV I/O)
//! return `Result`.

pub mod config;
pub mod detect;
pub mod error;
pub mod golden;
pub mod io;
pub mod metrics;
pub mod numeric;
pub mod signals;
pub mod stats;
pub mod sweep;
pub mod transform;

pub mod cli;

// Re-export commonly used types
pub use config::VerifyConfig;
pub use detect::{
    ClickDetection, ClickDetector, ClickDetectorConfig, LpcDetector, LpcDetectorConfig,
    SpectralAnomalyConfig, SpectralAnomalyDetection, SpectralAnomalyDetector,
};
pub use error::{Result, VerifyError};
pub use golden::{ab_compare, compare_with_reference, AbTestResult, GoldenReferenceConfig};
pub use io::AudioClip;
pub use metrics::{AliasingMeasurement, SignalMetrics, SignalQualityMetrics};
pub use sweep::{ParameterSweep, ParameterSweepConfig, StepType, SweepResult};
