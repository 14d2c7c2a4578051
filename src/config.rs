//! Configuration file for the `signal-verify` CLI
//!
//! A JSON document with one optional section per component. Missing
//! sections and fields take their defaults:
//!
//! ```json
//! {
//!   "click": { "detection_threshold": 6.0 },
//!   "golden": { "snr_threshold_db": 80.0, "fundamental_hz": 440.0 }
//! }
//! ```

use crate::detect::{ClickDetectorConfig, LpcDetectorConfig, SpectralAnomalyConfig};
use crate::error::{Result, VerifyError};
use crate::golden::GoldenReferenceConfig;
use crate::metrics::MetricsConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VerifyConfig {
    pub click: ClickDetectorConfig,
    pub lpc: LpcDetectorConfig,
    pub spectral: SpectralAnomalyConfig,
    pub golden: GoldenReferenceConfig,
    pub metrics: MetricsConfig,
}

impl VerifyConfig {
    /// Read and validate a JSON config file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text).map_err(|e| VerifyError::ConfigFile {
            path: path.display().to_string(),
            source: e,
        })?;
        config.validate()?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.click.validate()?;
        self.lpc.validate()?;
        self.spectral.validate()?;
        self.golden.validate()?;
        self.metrics.validate()?;
        Ok(())
    }

    /// Rebind every section to `sample_rate` (e.g. that of a loaded file)
    pub fn with_sample_rate(mut self, sample_rate: f64) -> Self {
        self.click.sample_rate = sample_rate;
        self.lpc.sample_rate = sample_rate;
        self.spectral.sample_rate = sample_rate;
        self.golden.sample_rate = sample_rate;
        self.metrics.sample_rate = sample_rate;
        self
    }
}
