//! In-process model fakes for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use candle_core::{DType, Device, Tensor};

use crate::config::SAMPLE_RATE;
use crate::model::{ModelId, ModelLoader, MusicModel, SamplingParams};
use crate::{Error, Result};

/// One recorded call into a fake model.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Text {
        model: ModelId,
        descriptions: Vec<String>,
        params: SamplingParams,
    },
    Chroma {
        model: ModelId,
        descriptions: Vec<String>,
        melody_dims: Vec<usize>,
        melody_sample_rate: u32,
        params: SamplingParams,
    },
}

#[derive(Clone)]
pub struct FakeLoader {
    loads: Arc<AtomicUsize>,
    attempts: Arc<AtomicUsize>,
    calls: Arc<Mutex<Vec<Call>>>,
    fail_load: Option<ModelId>,
    fail_generate: bool,
    channels: usize,
    unbatched: bool,
    delay: Duration,
}

impl Default for FakeLoader {
    fn default() -> Self {
        Self {
            loads: Arc::default(),
            attempts: Arc::default(),
            calls: Arc::default(),
            fail_load: None,
            fail_generate: false,
            channels: 1,
            unbatched: false,
            delay: Duration::ZERO,
        }
    }
}

impl FakeLoader {
    pub fn failing_for(mut self, id: ModelId) -> Self {
        self.fail_load = Some(id);
        self
    }

    pub fn failing_generation(mut self) -> Self {
        self.fail_generate = true;
        self
    }

    /// Return `[channels, time]` instead of `[1, channels, time]`.
    pub fn unbatched(mut self) -> Self {
        self.unbatched = true;
        self
    }

    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels;
        self
    }

    /// Sleep this long inside every generation call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

impl ModelLoader for FakeLoader {
    fn load(&self, id: ModelId, device: &Device) -> Result<Arc<dyn MusicModel>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_load == Some(id) {
            return Err(Error::Model(format!("failed to download {id}")));
        }
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeModel {
            id,
            device: device.clone(),
            loader: self.clone(),
        }))
    }
}

struct FakeModel {
    id: ModelId,
    device: Device,
    loader: FakeLoader,
}

impl FakeModel {
    /// A constant quiet signal of `duration * SAMPLE_RATE` frames per channel.
    fn render(&self, batch: usize, params: &SamplingParams) -> Result<Tensor> {
        if !self.loader.delay.is_zero() {
            std::thread::sleep(self.loader.delay);
        }
        if self.loader.fail_generate {
            return Err(Error::Model("CUDA out of memory".into()));
        }
        let frames = params.duration_secs as usize * SAMPLE_RATE as usize;
        let per_channel = Tensor::ones((self.loader.channels, frames), DType::F32, &self.device)?
            .affine(0.1, 0.0)?;
        if self.loader.unbatched {
            return Ok(per_channel);
        }
        Ok(Tensor::stack(&vec![per_channel; batch], 0)?)
    }
}

impl MusicModel for FakeModel {
    fn id(&self) -> ModelId {
        self.id
    }

    fn generate(&self, descriptions: &[String], params: &SamplingParams) -> Result<Tensor> {
        self.loader.calls.lock().unwrap().push(Call::Text {
            model: self.id,
            descriptions: descriptions.to_vec(),
            params: *params,
        });
        self.render(descriptions.len(), params)
    }

    fn generate_with_chroma(
        &self,
        descriptions: &[String],
        melody_wavs: &[Tensor],
        melody_sample_rate: u32,
        params: &SamplingParams,
    ) -> Result<Tensor> {
        self.loader.calls.lock().unwrap().push(Call::Chroma {
            model: self.id,
            descriptions: descriptions.to_vec(),
            melody_dims: melody_wavs
                .first()
                .map(|m| m.dims().to_vec())
                .unwrap_or_default(),
            melody_sample_rate,
            params: *params,
        });
        self.render(descriptions.len(), params)
    }
}

/// A short mono WAV upload.
pub fn melody_wav(sample_rate: u32, frames: usize) -> Vec<u8> {
    let samples: Vec<f32> = (0..frames).map(|i| ((i as f32) * 0.01).sin() * 0.3).collect();
    crate::audio::encode_wav(&samples, sample_rate, 1).unwrap()
}
