//! Generation pipeline.
//!
//! Turns a validated [`GenerationRequest`] into a raw output tensor:
//! 1. Build sampling parameters (sampling on, top-k 250, requested duration)
//! 2. Dispatch to unconditioned or melody-conditioned generation
//! 3. Return the model's `[batch, channels, time]` output untouched
//!
//! Writing the tensor to disk is the job of [`crate::artifact`].

use candle_core::{Device, Tensor};

use crate::audio::waveform_from_wav;
use crate::model::{ModelId, MusicModel, SamplingParams};
use crate::{Error, Result};

/// A reference melody clip as a `[channels, time]` waveform.
#[derive(Debug, Clone)]
pub struct ReferenceAudio {
    pub waveform: Tensor,
    pub sample_rate: u32,
}

impl ReferenceAudio {
    /// Decode an uploaded WAV file. Undecodable uploads are validation errors.
    pub fn from_wav_bytes(bytes: &[u8]) -> Result<Self> {
        let (waveform, sample_rate) = waveform_from_wav(bytes, &Device::Cpu)
            .map_err(|e| Error::validation(format!("could not decode reference audio: {e}")))?;
        Ok(Self {
            waveform,
            sample_rate,
        })
    }

    pub fn num_frames(&self) -> usize {
        self.waveform.dims().last().copied().unwrap_or(0)
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.num_frames() as f64 / self.sample_rate as f64
    }
}

/// Which generation entry point a request uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationMode {
    Unconditioned,
    MelodyConditioned,
}

/// One text-to-music request.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub description: String,
    pub duration_secs: u32,
    pub model: ModelId,
    pub reference: Option<ReferenceAudio>,
}

impl GenerationRequest {
    pub fn new(description: impl Into<String>, duration_secs: u32, model: ModelId) -> Self {
        Self {
            description: description.into(),
            duration_secs,
            model,
            reference: None,
        }
    }

    pub fn with_reference(mut self, reference: ReferenceAudio) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn mode(&self) -> GenerationMode {
        if self.reference.is_some() {
            GenerationMode::MelodyConditioned
        } else {
            GenerationMode::Unconditioned
        }
    }

    /// Check the request before any model is touched.
    ///
    /// The melody model requires a reference clip, and only the melody model
    /// accepts one.
    pub fn validate(&self, max_duration_secs: u32) -> Result<()> {
        if self.description.trim().is_empty() {
            return Err(Error::validation("description is required and must not be empty"));
        }
        if self.duration_secs == 0 {
            return Err(Error::validation("duration must be a positive number of seconds"));
        }
        if self.duration_secs > max_duration_secs {
            return Err(Error::validation(format!(
                "duration must be at most {max_duration_secs} seconds, got {}",
                self.duration_secs
            )));
        }
        match (&self.reference, self.model.supports_melody()) {
            (None, true) => Err(Error::validation(format!(
                "{} requires a reference melody file",
                self.model.short_name()
            ))),
            (Some(_), false) => Err(Error::validation(format!(
                "{} does not accept a reference melody; use {}",
                self.model.short_name(),
                ModelId::Melody.short_name()
            ))),
            (Some(reference), true) if reference.num_frames() == 0 => {
                Err(Error::validation("reference melody contains no audio"))
            }
            _ => Ok(()),
        }
    }
}

/// Run the model for one request and return its raw output.
///
/// The reference waveform is moved to `device` before conditioning.
pub fn generate(
    model: &dyn MusicModel,
    request: &GenerationRequest,
    device: &Device,
) -> Result<Tensor> {
    let params = SamplingParams::new(request.duration_secs);
    let descriptions = [request.description.trim().to_string()];

    match &request.reference {
        None => {
            tracing::info!(
                model = %model.id(),
                duration_secs = params.duration_secs,
                top_k = params.top_k,
                "generating from text"
            );
            model.generate(&descriptions, &params)
        }
        Some(reference) => {
            tracing::info!(
                model = %model.id(),
                duration_secs = params.duration_secs,
                top_k = params.top_k,
                melody_secs = reference.duration_secs(),
                melody_sample_rate = reference.sample_rate,
                "generating with melody conditioning"
            );
            let melody = reference.waveform.to_device(device)?;
            model.generate_with_chroma(&descriptions, &[melody], reference.sample_rate, &params)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelLoader;
    use crate::testing::{Call, FakeLoader, melody_wav};

    fn reference() -> ReferenceAudio {
        ReferenceAudio::from_wav_bytes(&melody_wav(44100, 4410)).unwrap()
    }

    #[test]
    fn test_validate_accepts_small_without_reference() {
        GenerationRequest::new("lofi hip hop", 10, ModelId::Small)
            .validate(20)
            .unwrap();
    }

    #[test]
    fn test_validate_rejects_missing_fields() {
        let blank = GenerationRequest::new("   ", 10, ModelId::Small);
        assert!(blank.validate(20).unwrap_err().is_validation());

        let zero = GenerationRequest::new("jazz", 0, ModelId::Small);
        assert!(zero.validate(20).unwrap_err().is_validation());

        let long = GenerationRequest::new("jazz", 21, ModelId::Small);
        assert!(long.validate(20).unwrap_err().is_validation());
        GenerationRequest::new("jazz", 20, ModelId::Small)
            .validate(20)
            .unwrap();
    }

    #[test]
    fn test_melody_model_requires_reference() {
        let err = GenerationRequest::new("jazz", 5, ModelId::Melody)
            .validate(20)
            .unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("musicgen-melody"));

        GenerationRequest::new("jazz", 5, ModelId::Melody)
            .with_reference(reference())
            .validate(20)
            .unwrap();
    }

    #[test]
    fn test_reference_rejected_for_text_only_model() {
        let err = GenerationRequest::new("jazz", 5, ModelId::Small)
            .with_reference(reference())
            .validate(20)
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_empty_reference_rejected() {
        let empty = ReferenceAudio::from_wav_bytes(&melody_wav(32000, 0)).unwrap();
        let err = GenerationRequest::new("jazz", 5, ModelId::Melody)
            .with_reference(empty)
            .validate(20)
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_undecodable_reference_is_validation_error() {
        let err = ReferenceAudio::from_wav_bytes(b"ID3\x04 not a wav").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_reference_duration() {
        let r = reference();
        assert_eq!(r.num_frames(), 4410);
        assert!((r.duration_secs() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_text_request_uses_unconditioned_generation() {
        let loader = FakeLoader::default();
        let model = loader.load(ModelId::Small, &Device::Cpu).unwrap();
        let request = GenerationRequest::new(" ambient piano ", 2, ModelId::Small);
        assert_eq!(request.mode(), GenerationMode::Unconditioned);

        let output = generate(model.as_ref(), &request, &Device::Cpu).unwrap();
        assert_eq!(output.dims(), &[1, 1, 64000]);
        assert_eq!(
            loader.calls(),
            vec![Call::Text {
                model: ModelId::Small,
                descriptions: vec!["ambient piano".to_string()],
                params: SamplingParams {
                    use_sampling: true,
                    top_k: 250,
                    duration_secs: 2,
                },
            }]
        );
    }

    #[test]
    fn test_melody_request_uses_chroma_generation() {
        let loader = FakeLoader::default();
        let model = loader.load(ModelId::Melody, &Device::Cpu).unwrap();
        let request =
            GenerationRequest::new("bach organ", 3, ModelId::Melody).with_reference(reference());
        assert_eq!(request.mode(), GenerationMode::MelodyConditioned);

        generate(model.as_ref(), &request, &Device::Cpu).unwrap();
        match loader.calls().as_slice() {
            [Call::Chroma {
                melody_dims,
                melody_sample_rate,
                params,
                ..
            }] => {
                assert_eq!(melody_dims, &vec![1, 4410]);
                assert_eq!(*melody_sample_rate, 44100);
                assert_eq!(params.top_k, 250);
                assert_eq!(params.duration_secs, 3);
            }
            other => panic!("expected one chroma call, got {other:?}"),
        }
    }

    #[test]
    fn test_model_failure_propagates() {
        let loader = FakeLoader::default().failing_generation();
        let model = loader.load(ModelId::Small, &Device::Cpu).unwrap();
        let request = GenerationRequest::new("jazz", 1, ModelId::Small);
        let err = generate(model.as_ref(), &request, &Device::Cpu).unwrap_err();
        assert!(matches!(err, Error::Model(_)));
    }
}
