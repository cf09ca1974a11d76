//! Audio materializer: writes generation output to the fixed artifact path.
//!
//! Every generation lands at the same `output_dir/output_file` path at
//! 32 kHz; the previous file is overwritten. No rotation or uniqueness.

use std::path::{Path, PathBuf};

use candle_core::{IndexOp, Tensor};
use serde::Serialize;

use crate::audio::{AudioFormat, interleave, write_audio};
use crate::config::{SAMPLE_RATE, ServiceConfig};
use crate::{Error, Result};

/// A written audio file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioArtifact {
    pub path: PathBuf,
    pub format: AudioFormat,
    pub sample_rate: u32,
    pub channels: u16,
    /// Frames per channel.
    pub num_frames: usize,
}

impl AudioArtifact {
    pub fn duration_secs(&self) -> f64 {
        self.num_frames as f64 / self.sample_rate as f64
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("audio.{}", self.format.extension()))
    }
}

#[derive(Debug, Clone)]
pub struct Materializer {
    path: PathBuf,
    format: AudioFormat,
}

impl Materializer {
    pub fn new(output_dir: impl AsRef<Path>, file_name: &str) -> Result<Self> {
        let format = AudioFormat::from_path(file_name).ok_or_else(|| {
            Error::Config(format!("unsupported output file '{file_name}'. Use .wav or .ogg"))
        })?;
        Ok(Self {
            path: output_dir.as_ref().join(file_name),
            format,
        })
    }

    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        Self::new(&config.output_dir, &config.output_file)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the first example of a `[channels, time]` or `[batch, channels, time]` tensor.
    pub fn save(&self, output: &Tensor) -> Result<AudioArtifact> {
        let batch = match output.rank() {
            2 => output.unsqueeze(0)?,
            3 => output.clone(),
            _ => {
                return Err(Error::Audio(format!(
                    "generation output must be [channels, time] or [batch, channels, time], got shape {:?}",
                    output.dims()
                )));
            }
        };
        if batch.dim(0)? == 0 {
            return Err(Error::Audio("generation output contains no examples".into()));
        }

        let (samples, channels) = interleave(&batch.i(0)?)?;
        let num_frames = if channels == 0 {
            0
        } else {
            samples.len() / channels as usize
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        write_audio(&self.path, self.format, &samples, SAMPLE_RATE, channels)?;

        tracing::info!(
            path = %self.path.display(),
            channels,
            num_frames,
            "audio written"
        );

        Ok(AudioArtifact {
            path: self.path.clone(),
            format: self.format,
            sample_rate: SAMPLE_RATE,
            channels,
            num_frames,
        })
    }
}
