//! The pretrained-model capability.
//!
//! Model internals (text encoder, token decoder, audio codec) live behind two
//! traits: [`ModelLoader`] turns a [`ModelId`] into a resident model, and
//! [`MusicModel`] runs generation on it. [`remote`] implements both against a
//! MusicGen inference server.

mod id;
pub mod remote;

use std::sync::Arc;

use candle_core::{Device, Tensor};

pub use id::ModelId;

use crate::Result;

/// Sampling controls passed with every generation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct SamplingParams {
    pub use_sampling: bool,
    /// Number of most likely tokens kept at each decoding step.
    pub top_k: usize,
    /// Target length of the generated audio, honored best-effort by the model.
    pub duration_secs: u32,
}

impl SamplingParams {
    pub fn new(duration_secs: u32) -> Self {
        Self {
            use_sampling: true,
            top_k: crate::config::DEFAULT_TOP_K,
            duration_secs,
        }
    }
}

/// A loaded generative model.
///
/// Outputs are `[batch, channels, time]` tensors of decoded samples, one batch
/// entry per description. Implementations may also return `[channels, time]`
/// for a single description.
pub trait MusicModel: Send + Sync {
    fn id(&self) -> ModelId;

    /// Generate audio from text descriptions alone.
    fn generate(&self, descriptions: &[String], params: &SamplingParams) -> Result<Tensor>;

    /// Generate audio guided by the chroma of reference melodies, one per description.
    ///
    /// Each melody is a `[channels, time]` waveform at `melody_sample_rate`.
    fn generate_with_chroma(
        &self,
        descriptions: &[String],
        melody_wavs: &[Tensor],
        melody_sample_rate: u32,
        params: &SamplingParams,
    ) -> Result<Tensor>;
}

/// Loads pretrained models by identifier onto a device.
pub trait ModelLoader: Send {
    fn load(&self, id: ModelId, device: &Device) -> Result<Arc<dyn MusicModel>>;
}
