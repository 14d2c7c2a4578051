//! Error types for signal-verify
//!
//! Analysis entry points never fail: they report problems as data in their
//! result structs. `VerifyError` covers the fallible edges around them
//! (configuration validation, WAV I/O, config files) and every variant
//! carries a recovery hint for the CLI.

use thiserror::Error;

/// Result type alias using VerifyError
pub type Result<T> = std::result::Result<T, VerifyError>;

/// All possible errors in signal-verify
#[derive(Error, Debug)]
pub enum VerifyError {
    // Configuration errors
    #[error("Invalid configuration: {param} = {value} (expected {expected})")]
    InvalidConfig {
        param: String,
        value: String,
        expected: String,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ConfigFile {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    // Audio I/O errors
    #[error("Failed to read audio file: {path}")]
    AudioReadError {
        path: String,
        #[source]
        source: hound::Error,
    },

    #[error("Failed to write audio file: {path}")]
    AudioWriteError {
        path: String,
        #[source]
        source: hound::Error,
    },

    #[error("Unsupported audio format: {details}")]
    UnsupportedFormat { details: String },

    #[error("Audio buffer is empty")]
    EmptyBuffer,

    // Generic I/O
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl VerifyError {
    /// Shorthand for a configuration field outside its valid range
    pub fn invalid_config(
        param: impl Into<String>,
        value: impl ToString,
        expected: impl Into<String>,
    ) -> Self {
        Self::InvalidConfig {
            param: param.into(),
            value: value.to_string(),
            expected: expected.into(),
        }
    }

    /// Returns a suggested recovery action for this error
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "Adjust the parameter to be within its valid range",
            Self::ConfigFile { .. } => "Check the JSON syntax and field names of the config file",
            Self::AudioReadError { .. } => "Check that the file exists and is a valid WAV file",
            Self::AudioWriteError { .. } => "Check that the output directory exists and is writable",
            Self::UnsupportedFormat { .. } => "Convert to WAV format (16/24/32-bit int or 32-bit float)",
            Self::EmptyBuffer => "Provide audio with at least one sample",
            _ => "Check the error details and try again",
        }
    }
}
