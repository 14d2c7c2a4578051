//! Parameter sweeps
//!
//! Drives a processor across a range of values for one parameter and runs
//! click and THD checks at every step, so a failure can be pinned to the
//! parameter interval that causes it.

use crate::detect::{validate_sample_rate, ClickDetector, ClickDetectorConfig};
use crate::error::{Result, VerifyError};
use crate::metrics::{compute_snr, SignalMetrics};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

const MAX_STEPS: usize = 1000;

/// Spacing of sweep values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepType {
    #[default]
    Linear,
    /// Geometric spacing; both bounds must be positive
    Logarithmic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterSweepConfig {
    /// Name used in reports only
    pub parameter_name: String,
    pub min_value: f64,
    pub max_value: f64,
    /// 1 to 1000
    pub num_steps: usize,
    pub step_type: StepType,
    pub check_for_clicks: bool,
    pub check_thd: bool,
    pub thd_threshold_percent: f32,
    /// Sigma multiplier handed to the click detector
    pub click_threshold: f32,
    pub sample_rate: f64,
    /// Fundamental of the generated test signal, used for THD
    pub test_frequency_hz: f32,
}

impl Default for ParameterSweepConfig {
    fn default() -> Self {
        Self {
            parameter_name: "parameter".to_string(),
            min_value: 0.0,
            max_value: 1.0,
            num_steps: 10,
            step_type: StepType::Linear,
            check_for_clicks: true,
            check_thd: true,
            thd_threshold_percent: 1.0,
            click_threshold: 5.0,
            sample_rate: 44_100.0,
            test_frequency_hz: 1_000.0,
        }
    }
}

impl ParameterSweepConfig {
    pub fn validate(&self) -> Result<()> {
        validate_sample_rate(self.sample_rate)?;
        if !self.min_value.is_finite() || !self.max_value.is_finite() {
            return Err(VerifyError::invalid_config(
                "min_value/max_value",
                format!("{}..{}", self.min_value, self.max_value),
                "finite bounds",
            ));
        }
        if self.num_steps == 0 || self.num_steps > MAX_STEPS {
            return Err(VerifyError::invalid_config(
                "num_steps",
                self.num_steps,
                "1 to 1000",
            ));
        }
        if self.step_type == StepType::Logarithmic {
            for (param, value) in [("min_value", self.min_value), ("max_value", self.max_value)] {
                if value <= 0.0 {
                    return Err(VerifyError::invalid_config(
                        param,
                        value,
                        "> 0 for a logarithmic sweep",
                    ));
                }
            }
        }
        if !(self.thd_threshold_percent >= 0.0) {
            return Err(VerifyError::invalid_config(
                "thd_threshold_percent",
                self.thd_threshold_percent,
                ">= 0",
            ));
        }
        if !(self.click_threshold > 0.0) {
            return Err(VerifyError::invalid_config(
                "click_threshold",
                self.click_threshold,
                "> 0",
            ));
        }
        let nyquist = self.sample_rate / 2.0;
        if !(self.test_frequency_hz > 0.0 && f64::from(self.test_frequency_hz) < nyquist) {
            return Err(VerifyError::invalid_config(
                "test_frequency_hz",
                self.test_frequency_hz,
                "between 0 and Nyquist",
            ));
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

/// Values visited by a sweep, in order. Empty for an invalid config.
pub fn generate_parameter_values(config: &ParameterSweepConfig) -> Vec<f64> {
    if let Err(e) = config.validate() {
        warn!("parameter sweep disabled: {}", e);
        return Vec::new();
    }
    let (min, max, n) = (config.min_value, config.max_value, config.num_steps);
    if n == 1 {
        return vec![min];
    }
    let last = (n - 1) as f64;
    (0..n)
        .map(|i| {
            let t = i as f64;
            match config.step_type {
                StepType::Linear => min + t * (max - min) / last,
                StepType::Logarithmic => min * (max / min).powf(t / last),
            }
        })
        .collect()
}

/// Measurements for one sweep value; computed whether or not checks pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub parameter_value: f64,
    pub passed: bool,
    pub clicks_detected: usize,
    pub thd_percent: f32,
    /// Output against the unprocessed input
    pub snr_db: f32,
    /// Empty when the step passed
    pub failure_reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepResult {
    pub parameter_name: String,
    pub step_results: Vec<StepResult>,
}

impl SweepResult {
    pub fn has_failed(&self) -> bool {
        self.step_results.iter().any(|s| !s.passed)
    }

    pub fn failed_steps(&self) -> Vec<&StepResult> {
        self.step_results.iter().filter(|s| !s.passed).collect()
    }

    /// Contiguous runs of failing steps as `(first, last)` parameter values
    pub fn failing_ranges(&self) -> Vec<(f64, f64)> {
        let mut ranges = Vec::new();
        let mut current: Option<(f64, f64)> = None;
        for step in &self.step_results {
            if step.passed {
                ranges.extend(current.take());
            } else {
                let start = current.map_or(step.parameter_value, |(start, _)| start);
                current = Some((start, step.parameter_value));
            }
        }
        ranges.extend(current);
        ranges
    }

    pub fn summary(&self) -> String {
        if !self.has_failed() {
            return format!(
                "{}: all {} steps passed",
                self.parameter_name,
                self.step_results.len()
            );
        }
        let mut s = format!(
            "{}: {} of {} steps failed",
            self.parameter_name,
            self.failed_steps().len(),
            self.step_results.len()
        );
        for (lo, hi) in self.failing_ranges() {
            s.push_str(&format!("\n  failing range: {} .. {}", lo, hi));
        }
        for step in self.failed_steps() {
            s.push_str(&format!(
                "\n  {} = {}: {}",
                self.parameter_name, step.parameter_value, step.failure_reason
            ));
        }
        s
    }
}

/// Runs a processor across a parameter range
#[derive(Debug)]
pub struct ParameterSweep {
    config: ParameterSweepConfig,
    detector: ClickDetector,
    metrics: SignalMetrics,
}

impl ParameterSweep {
    pub fn new(config: ParameterSweepConfig) -> Self {
        let detector = ClickDetector::new(ClickDetectorConfig {
            detection_threshold: config.click_threshold,
            ..ClickDetectorConfig::with_sample_rate(config.sample_rate)
        });
        let metrics = SignalMetrics::new(config.sample_rate);
        Self {
            config,
            detector,
            metrics,
        }
    }

    pub fn config(&self) -> &ParameterSweepConfig {
        &self.config
    }

    /// For each value: `set_parameter(value)`, `generate()`, `process(&input)`,
    /// then measure the output.
    pub fn run<S, G, P>(
        &mut self,
        mut set_parameter: S,
        mut generate: G,
        mut process: P,
    ) -> SweepResult
    where
        S: FnMut(f64),
        G: FnMut() -> Vec<f32>,
        P: FnMut(&[f32]) -> Vec<f32>,
    {
        let values = generate_parameter_values(&self.config);
        let mut step_results = Vec::with_capacity(values.len());

        for value in values {
            set_parameter(value);
            let input = generate();
            let output = process(&input);
            let step = self.measure_step(value, &input, &output);
            trace!(value, passed = step.passed, "sweep step");
            step_results.push(step);
        }

        let result = SweepResult {
            parameter_name: self.config.parameter_name.clone(),
            step_results,
        };
        debug!(
            parameter = %result.parameter_name,
            steps = result.step_results.len(),
            failed = result.failed_steps().len(),
            "parameter sweep complete"
        );
        result
    }

    fn measure_step(&mut self, value: f64, input: &[f32], output: &[f32]) -> StepResult {
        let clicks_detected = self.detector.detect(output).len();
        let thd_percent = self
            .metrics
            .measure_thd(output, self.config.test_frequency_hz);
        let snr_db = compute_snr(output, input);

        let mut reasons = Vec::new();
        if self.config.check_for_clicks && clicks_detected > 0 {
            reasons.push(format!("{} clicks detected", clicks_detected));
        }
        if self.config.check_thd && thd_percent > self.config.thd_threshold_percent {
            reasons.push(format!(
                "THD {:.3}% exceeds {:.3}%",
                thd_percent, self.config.thd_threshold_percent
            ));
        }

        StepResult {
            parameter_value: value,
            passed: reasons.is_empty(),
            clicks_detected,
            thd_percent,
            snr_db,
            failure_reason: reasons.join("; "),
        }
    }
}
