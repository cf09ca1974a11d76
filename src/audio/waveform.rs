//! Conversion between interleaved sample buffers and `[channels, time]` tensors.

use candle_core::{DType, Device, Tensor};

use crate::{Error, Result};

/// Build a `[channels, time]` f32 tensor from interleaved samples.
pub fn waveform_from_interleaved(
    samples: Vec<f32>,
    num_channels: u16,
    device: &Device,
) -> Result<Tensor> {
    let channels = num_channels as usize;
    if channels == 0 {
        return Err(Error::Audio("waveform must have at least one channel".into()));
    }
    if samples.len() % channels != 0 {
        return Err(Error::Audio(format!(
            "{} interleaved samples do not divide into {channels} channels",
            samples.len()
        )));
    }
    let frames = samples.len() / channels;
    // [time, channels] → [channels, time]
    let waveform = Tensor::from_vec(samples, (frames, channels), device)?
        .t()?
        .contiguous()?;
    Ok(waveform)
}

/// Decode an in-memory WAV file into a `[channels, time]` tensor and its sample rate.
pub fn waveform_from_wav(bytes: &[u8], device: &Device) -> Result<(Tensor, u32)> {
    let (samples, sample_rate, channels) = super::decode_wav(bytes)?;
    let waveform = waveform_from_interleaved(samples, channels, device)?;
    Ok((waveform, sample_rate))
}

/// Flatten a `[channels, time]` tensor into host-side interleaved f32 samples.
///
/// Returns the samples and the channel count.
pub fn interleave(waveform: &Tensor) -> Result<(Vec<f32>, u16)> {
    if waveform.rank() != 2 {
        return Err(Error::Audio(format!(
            "expected a [channels, time] waveform, got shape {:?}",
            waveform.dims()
        )));
    }
    let per_channel = waveform
        .to_device(&Device::Cpu)?
        .to_dtype(DType::F32)?
        .to_vec2::<f32>()?;
    let num_channels = u16::try_from(per_channel.len())
        .map_err(|_| Error::Audio(format!("too many channels: {}", per_channel.len())))?;
    let frames = per_channel.first().map_or(0, Vec::len);

    let mut samples = Vec::with_capacity(frames * per_channel.len());
    for t in 0..frames {
        for channel in &per_channel {
            samples.push(channel[t]);
        }
    }
    Ok((samples, num_channels))
}
