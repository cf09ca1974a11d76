//! Audio I/O utilities.
//!
//! WAV read/write (file and in-memory), Ogg/Vorbis encoding, and conversion
//! between interleaved sample buffers and `[channels, time]` tensors.

mod ogg;
mod wav;
mod waveform;

use std::path::Path;

pub use ogg::write_ogg;
pub use wav::{decode_wav, encode_wav, read_wav, write_wav};
pub use waveform::{interleave, waveform_from_interleaved, waveform_from_wav};

use crate::Result;

/// Output container for generated audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Wav,
    Ogg,
}

impl AudioFormat {
    /// Parse a file extension (without the dot), case-insensitive.
    pub fn parse(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "wav" => Some(Self::Wav),
            "ogg" => Some(Self::Ogg),
            _ => None,
        }
    }

    /// Infer the format from a path's extension. Paths without an extension are WAV.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        match path.as_ref().extension().and_then(|e| e.to_str()) {
            Some(ext) => Self::parse(ext),
            None => Some(Self::Wav),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Ogg => "ogg",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Wav => "audio/wav",
            Self::Ogg => "audio/ogg",
        }
    }
}

/// Write interleaved f32 samples in the given container format.
pub fn write_audio(
    path: impl AsRef<Path>,
    format: AudioFormat,
    samples: &[f32],
    sample_rate: u32,
    num_channels: u16,
) -> Result<()> {
    match format {
        AudioFormat::Wav => write_wav(path, samples, sample_rate, num_channels),
        AudioFormat::Ogg => write_ogg(path, samples, sample_rate, num_channels),
    }
}
