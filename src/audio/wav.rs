//! WAV file I/O.

use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;

use crate::Result;

/// Read a WAV file, return (samples, sample_rate, num_channels).
///
/// Samples are interleaved f32 in [-1, 1].
pub fn read_wav(path: impl AsRef<Path>) -> Result<(Vec<f32>, u32, u16)> {
    let reader = hound::WavReader::open(path)?;
    read_samples(reader)
}

/// Decode an in-memory WAV file (e.g. an upload), same output as [`read_wav`].
pub fn decode_wav(bytes: &[u8]) -> Result<(Vec<f32>, u32, u16)> {
    let reader = hound::WavReader::new(Cursor::new(bytes))?;
    read_samples(reader)
}

fn read_samples<R: Read>(reader: hound::WavReader<R>) -> Result<(Vec<f32>, u32, u16)> {
    let spec = reader.spec();
    let sample_rate = spec.sample_rate;
    let channels = spec.channels;

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            let max_val = (1u32 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };

    Ok((samples, sample_rate, channels))
}

/// Write interleaved f32 samples as a WAV file.
pub fn write_wav(
    path: impl AsRef<Path>,
    samples: &[f32],
    sample_rate: u32,
    num_channels: u16,
) -> Result<()> {
    let writer = hound::WavWriter::create(path, float_spec(sample_rate, num_channels))?;
    write_samples(writer, samples)
}

/// Encode interleaved f32 samples as an in-memory WAV file.
pub fn encode_wav(samples: &[f32], sample_rate: u32, num_channels: u16) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    let writer = hound::WavWriter::new(&mut buffer, float_spec(sample_rate, num_channels))?;
    write_samples(writer, samples)?;
    Ok(buffer.into_inner())
}

fn float_spec(sample_rate: u32, num_channels: u16) -> hound::WavSpec {
    hound::WavSpec {
        channels: num_channels,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    }
}

fn write_samples<W: Write + Seek>(mut writer: hound::WavWriter<W>, samples: &[f32]) -> Result<()> {
    for &s in samples {
        writer.write_sample(s)?;
    }
    writer.finalize()?;
    Ok(())
}
