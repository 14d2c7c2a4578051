//! WAV file I/O
//!
//! Loads WAV files as mono f32 clips for analysis and writes fixtures back
//! out as 32-bit float, using the hound crate.

use crate::error::{Result, VerifyError};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use serde::Serialize;
use std::path::Path;
use tracing::debug;

/// Mono analysis buffer plus the format it was read from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioClip {
    /// Mono samples (multi-channel files are averaged)
    #[serde(skip)]
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    /// Channel count of the source file
    pub channels: u16,
}

impl AudioClip {
    /// Mono clip; fails on an empty buffer
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if samples.is_empty() {
            return Err(VerifyError::EmptyBuffer);
        }
        Ok(Self {
            samples,
            sample_rate,
            channels: 1,
        })
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }
}

/// Load a WAV file and mix it down to mono
pub fn load_wav<P: AsRef<Path>>(path: P) -> Result<AudioClip> {
    let path = path.as_ref();
    let read_error = |e| VerifyError::AudioReadError {
        path: path.display().to_string(),
        source: e,
    };
    let reader = WavReader::open(path).map_err(read_error)?;

    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(VerifyError::UnsupportedFormat {
            details: format!("{}: zero channels", path.display()),
        });
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .map(|s| s.map_err(read_error))
            .collect::<Result<Vec<f32>>>()?,
        SampleFormat::Int => {
            let bits = spec.bits_per_sample;
            if bits == 0 || bits > 32 {
                return Err(VerifyError::UnsupportedFormat {
                    details: format!("{}: {}-bit integer samples", path.display(), bits),
                });
            }
            let max_val = (1u64 << (bits - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val).map_err(read_error))
                .collect::<Result<Vec<f32>>>()?
        }
    };

    let channels = usize::from(spec.channels);
    let samples: Vec<f32> = interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect();
    if samples.is_empty() {
        return Err(VerifyError::EmptyBuffer);
    }

    debug!(
        path = %path.display(),
        frames = samples.len(),
        channels,
        sample_rate = spec.sample_rate,
        "loaded WAV"
    );

    Ok(AudioClip {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

/// Save a clip as a mono 32-bit float WAV
pub fn save_wav<P: AsRef<Path>>(clip: &AudioClip, path: P) -> Result<()> {
    let path = path.as_ref();
    if clip.samples.is_empty() {
        return Err(VerifyError::EmptyBuffer);
    }
    let write_error = |e| VerifyError::AudioWriteError {
        path: path.display().to_string(),
        source: e,
    };
    let spec = WavSpec {
        channels: 1,
        sample_rate: clip.sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut writer = WavWriter::create(path, spec).map_err(write_error)?;
    for &sample in &clip.samples {
        writer.write_sample(sample).map_err(write_error)?;
    }
    writer.finalize().map_err(write_error)?;

    debug!(path = %path.display(), frames = clip.samples.len(), "saved WAV");
    Ok(())
}
