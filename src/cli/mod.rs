//! CLI Module
//!
//! Command-line interface for signal-verify.

pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// signal-verify - artifact detection and quality metrics for audio files
#[derive(Parser, Debug)]
#[command(name = "signal-verify")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// JSON config file with per-component settings
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Find clicks with the derivative detector
    Clicks {
        /// WAV file to analyse
        input: PathBuf,
    },

    /// Find clicks with the LPC residual detector
    Lpc {
        /// WAV file to analyse
        input: PathBuf,
    },

    /// Find broadband frames by spectral flatness
    Spectral {
        /// WAV file to analyse
        input: PathBuf,
    },

    /// Report SNR, THD, crest factor and related metrics
    Metrics {
        /// WAV file to analyse
        input: PathBuf,

        /// Reference WAV for SNR
        #[arg(short, long)]
        reference: Option<PathBuf>,

        /// Fundamental for THD in Hz (default: strongest bin)
        #[arg(short, long)]
        fundamental: Option<f32>,
    },

    /// Check a processed file against a golden reference
    Compare {
        /// Processed WAV
        signal: PathBuf,

        /// Known-good WAV
        reference: PathBuf,
    },

    /// Run click and spectral detection on every WAV under a directory
    Scan {
        /// Directory to walk
        dir: PathBuf,
    },

    /// Write a test fixture
    Generate {
        /// Kind of signal
        #[arg(value_enum)]
        kind: SignalKind,

        /// Output WAV path
        output: PathBuf,

        /// Tone frequency in Hz
        #[arg(long, default_value_t = 1000.0)]
        frequency: f32,

        /// Peak amplitude
        #[arg(long, default_value_t = 0.5)]
        amplitude: f32,

        /// Length in seconds
        #[arg(long, default_value_t = 1.0)]
        duration: f64,

        #[arg(long, default_value_t = 44100)]
        sample_rate: u32,

        /// Seed for noise
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
}

/// Fixture kinds for `generate`
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Sine,
    Noise,
    Silence,
    /// Sine with an impulse every quarter of the duration
    Clicks,
    /// Sine driven 4x into a hard clipper
    Clipped,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "signal-verify",
            "metrics",
            "in.wav",
            "--fundamental",
            "440",
            "--json",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Metrics {
                fundamental,
                reference,
                ..
            } => {
                assert_eq!(fundamental, Some(440.0));
                assert!(reference.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_generate_defaults() {
        let cli = Cli::try_parse_from(["signal-verify", "generate", "clipped", "out.wav"]).unwrap();
        match cli.command {
            Commands::Generate {
                kind,
                sample_rate,
                duration,
                ..
            } => {
                assert_eq!(kind, SignalKind::Clipped);
                assert_eq!(sample_rate, 44_100);
                assert_eq!(duration, 1.0);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
