//! HTTP client for a MusicGen inference server.
//!
//! The server keeps the checkpoints resident and runs the actual decoding.
//! Two routes are used:
//!
//! ```text
//! POST {base}/models/load   {"name": "facebook/musicgen-small", "device": "cuda:0"}
//!                        →  {"name": "facebook/musicgen-small", "sample_rate": 32000}
//!
//! POST {base}/generate      {"model": ..., "descriptions": [...],
//!                            "use_sampling": true, "top_k": 250, "duration": 10,
//!                            "melody": {"wav_base64": ..., "sample_rate": 44100}}
//!                        →  audio/wav body
//! ```
//!
//! Any non-2xx status is surfaced as [`Error::Model`] carrying the response text.
//! Audio must come back at 32 kHz; other rates are rejected rather than
//! relabelled.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use base64::Engine;
use candle_core::{Device, Tensor};
use reqwest::blocking::{Client, Response};
use serde::{Deserialize, Serialize};

use super::{ModelId, ModelLoader, MusicModel, SamplingParams};
use crate::audio::{encode_wav, interleave, waveform_from_wav};
use crate::config::SAMPLE_RATE;
use crate::provider::device_label;
use crate::{Error, Result};

/// Loads models by asking the inference server to make them resident.
///
/// The blocking HTTP client is created on first use so that it lives on the
/// generation worker thread rather than inside the async runtime.
pub struct RemoteLoader {
    base_url: String,
    timeout: Duration,
    client: OnceLock<Client>,
}

impl RemoteLoader {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            client: OnceLock::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn client(&self) -> Result<&Client> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let client = Client::builder().timeout(self.timeout).build()?;
        Ok(self.client.get_or_init(|| client))
    }
}

#[derive(Debug, Serialize)]
struct LoadBody<'a> {
    name: &'a str,
    device: String,
}

#[derive(Debug, Deserialize)]
struct LoadReply {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    sample_rate: Option<u32>,
}

impl ModelLoader for RemoteLoader {
    fn load(&self, id: ModelId, device: &Device) -> Result<Arc<dyn MusicModel>> {
        let client = self.client()?;
        let name = id.pretrained_name();
        let body = LoadBody {
            name: &name,
            device: device_label(device),
        };

        let response = client
            .post(format!("{}/models/load", self.base_url))
            .json(&body)
            .send()?;
        let reply: LoadReply = check_status(response, "load")?.json()?;

        if let Some(served) = reply.name.as_deref()
            && served.parse::<ModelId>().ok() != Some(id)
        {
            return Err(Error::Model(format!(
                "backend loaded '{served}' when asked for '{name}'"
            )));
        }

        if let Some(rate) = reply.sample_rate
            && rate != SAMPLE_RATE
        {
            return Err(Error::Model(format!(
                "backend serves '{name}' at {rate} Hz, expected {SAMPLE_RATE} Hz"
            )));
        }

        tracing::debug!(model = %id, sample_rate = ?reply.sample_rate, "backend model resident");

        Ok(Arc::new(RemoteModel {
            id,
            base_url: self.base_url.clone(),
            client: client.clone(),
            device: device.clone(),
        }))
    }
}

/// A model resident on the inference server.
pub struct RemoteModel {
    id: ModelId,
    base_url: String,
    client: Client,
    device: Device,
}

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    model: String,
    descriptions: Vec<&'a str>,
    use_sampling: bool,
    top_k: usize,
    duration: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    melody: Option<MelodyPayload>,
}

#[derive(Debug, Serialize)]
struct MelodyPayload {
    wav_base64: String,
    sample_rate: u32,
}

impl RemoteModel {
    fn generate_one(
        &self,
        description: &str,
        melody: Option<MelodyPayload>,
        params: &SamplingParams,
    ) -> Result<Tensor> {
        let body = GenerateBody {
            model: self.id.pretrained_name(),
            descriptions: vec![description],
            use_sampling: params.use_sampling,
            top_k: params.top_k,
            duration: params.duration_secs,
            melody,
        };
        let response = self
            .client
            .post(format!("{}/generate", self.base_url))
            .json(&body)
            .send()?;
        let bytes = check_status(response, "generate")?.bytes()?;
        let (waveform, sample_rate) = waveform_from_wav(&bytes, &self.device)?;
        if sample_rate != SAMPLE_RATE {
            return Err(Error::Model(format!(
                "backend returned {sample_rate} Hz audio for {}, expected {SAMPLE_RATE} Hz",
                self.id
            )));
        }
        Ok(waveform)
    }
}

impl MusicModel for RemoteModel {
    fn id(&self) -> ModelId {
        self.id
    }

    fn generate(&self, descriptions: &[String], params: &SamplingParams) -> Result<Tensor> {
        let outputs = descriptions
            .iter()
            .map(|d| self.generate_one(d, None, params))
            .collect::<Result<Vec<_>>>()?;
        stack_batch(&outputs)
    }

    fn generate_with_chroma(
        &self,
        descriptions: &[String],
        melody_wavs: &[Tensor],
        melody_sample_rate: u32,
        params: &SamplingParams,
    ) -> Result<Tensor> {
        if descriptions.len() != melody_wavs.len() {
            return Err(Error::Model(format!(
                "{} descriptions but {} melodies",
                descriptions.len(),
                melody_wavs.len()
            )));
        }
        let outputs = descriptions
            .iter()
            .zip(melody_wavs)
            .map(|(description, melody)| {
                let payload = melody_payload(melody, melody_sample_rate)?;
                self.generate_one(description, Some(payload), params)
            })
            .collect::<Result<Vec<_>>>()?;
        stack_batch(&outputs)
    }
}

fn melody_payload(waveform: &Tensor, sample_rate: u32) -> Result<MelodyPayload> {
    let (samples, channels) = interleave(waveform)?;
    let wav = encode_wav(&samples, sample_rate, channels)?;
    Ok(MelodyPayload {
        wav_base64: base64::engine::general_purpose::STANDARD.encode(wav),
        sample_rate,
    })
}

/// `[channels, time]` outputs → `[batch, channels, time]`.
fn stack_batch(outputs: &[Tensor]) -> Result<Tensor> {
    if outputs.is_empty() {
        return Err(Error::Model("no descriptions to generate from".into()));
    }
    Ok(Tensor::stack(outputs, 0)?)
}

fn check_status(response: Response, operation: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().unwrap_or_default();
    let detail = text.trim();
    Err(Error::Model(if detail.is_empty() {
        format!("{operation} failed with status {status}")
    } else {
        format!("{operation} failed with status {status}: {detail}")
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Json;
    use axum::http::{StatusCode, header};
    use axum::response::IntoResponse;
    use axum::routing::post;
    use candle_core::DType;
    use std::sync::Mutex;

    /// In-process inference server answering both routes.
    #[derive(Clone)]
    struct Backend {
        served_name: Option<&'static str>,
        load_rate: u32,
        wav_rate: u32,
        channels: u16,
        generate_error: Option<(StatusCode, &'static str)>,
        bodies: Arc<Mutex<Vec<serde_json::Value>>>,
    }

    impl Default for Backend {
        fn default() -> Self {
            Self {
                served_name: None,
                load_rate: SAMPLE_RATE,
                wav_rate: SAMPLE_RATE,
                channels: 1,
                generate_error: None,
                bodies: Arc::default(),
            }
        }
    }

    /// Serve `backend` on an ephemeral port. The runtime must outlive the test.
    fn spawn_backend(backend: Backend) -> (tokio::runtime::Runtime, String) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let listener = runtime
            .block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))
            .unwrap();
        let addr = listener.local_addr().unwrap();

        let on_load = backend.clone();
        let on_generate = backend;
        let app = axum::Router::new()
            .route(
                "/models/load",
                post(move |Json(body): Json<serde_json::Value>| {
                    let backend = on_load.clone();
                    async move {
                        let name = match backend.served_name {
                            Some(name) => name.to_string(),
                            None => body["name"].as_str().unwrap_or_default().to_string(),
                        };
                        Json(serde_json::json!({"name": name, "sample_rate": backend.load_rate}))
                    }
                }),
            )
            .route(
                "/generate",
                post(move |Json(body): Json<serde_json::Value>| {
                    let backend = on_generate.clone();
                    async move {
                        backend.bodies.lock().unwrap().push(body.clone());
                        if let Some(failure) = backend.generate_error {
                            return failure.into_response();
                        }
                        let secs = body["duration"].as_u64().unwrap_or(1) as usize;
                        let frames = secs * backend.wav_rate as usize;
                        let samples = vec![0.1f32; frames * backend.channels as usize];
                        let wav = encode_wav(&samples, backend.wav_rate, backend.channels).unwrap();
                        ([(header::CONTENT_TYPE, "audio/wav")], wav).into_response()
                    }
                }),
            );

        runtime.spawn(async move { axum::serve(listener, app).await.unwrap() });
        (runtime, format!("http://{addr}"))
    }

    fn loader(base_url: &str) -> RemoteLoader {
        RemoteLoader::new(base_url, Duration::from_secs(10))
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let loader = RemoteLoader::new("http://127.0.0.1:9000/", Duration::from_secs(5));
        assert_eq!(loader.base_url(), "http://127.0.0.1:9000");
    }

    #[test]
    fn test_generate_body_omits_absent_melody() {
        let body = GenerateBody {
            model: ModelId::Small.pretrained_name(),
            descriptions: vec!["lofi beats"],
            use_sampling: true,
            top_k: 250,
            duration: 8,
            melody: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "model": "facebook/musicgen-small",
                "descriptions": ["lofi beats"],
                "use_sampling": true,
                "top_k": 250,
                "duration": 8,
            })
        );
    }

    #[test]
    fn test_melody_payload_is_decodable_wav() {
        let melody = Tensor::new(&[[0.25f32, -0.25, 0.5, -0.5]], &Device::Cpu).unwrap();
        let payload = melody_payload(&melody, 22050).unwrap();
        assert_eq!(payload.sample_rate, 22050);

        let wav = base64::engine::general_purpose::STANDARD
            .decode(&payload.wav_base64)
            .unwrap();
        let (waveform, sample_rate) = waveform_from_wav(&wav, &Device::Cpu).unwrap();
        assert_eq!(sample_rate, 22050);
        assert_eq!(waveform.dims(), &[1, 4]);
    }

    #[test]
    fn test_stack_batch_adds_leading_dim() {
        let a = Tensor::zeros((2, 16), DType::F32, &Device::Cpu).unwrap();
        let stacked = stack_batch(&[a]).unwrap();
        assert_eq!(stacked.dims(), &[1, 2, 16]);
        assert!(stack_batch(&[]).is_err());
    }

    #[test]
    fn test_unreachable_backend_is_an_http_error() {
        // Port 9 (discard) on localhost is not expected to run an HTTP server.
        let loader = RemoteLoader::new("http://127.0.0.1:9", Duration::from_millis(500));
        let err = match loader.load(ModelId::Small, &Device::Cpu) {
            Ok(_) => panic!("load should fail without a backend"),
            Err(err) => err,
        };
        assert!(matches!(err, Error::Http(_)));
    }

    #[test]
    fn test_text_round_trip_returns_batched_output() {
        let backend = Backend::default();
        let bodies = backend.bodies.clone();
        let (_runtime, url) = spawn_backend(backend);

        let model = loader(&url).load(ModelId::Small, &Device::Cpu).unwrap();
        let output = model
            .generate(&["lofi beats".to_string()], &SamplingParams::new(1))
            .unwrap();

        assert_eq!(output.dims(), &[1, 1, 32000]);
        let bodies = bodies.lock().unwrap();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0]["model"], "facebook/musicgen-small");
        assert_eq!(bodies[0]["top_k"], 250);
        assert_eq!(bodies[0]["use_sampling"], true);
        assert!(bodies[0].get("melody").is_none());
    }

    #[test]
    fn test_chroma_round_trip_sends_melody() {
        let backend = Backend {
            channels: 2,
            ..Backend::default()
        };
        let bodies = backend.bodies.clone();
        let (_runtime, url) = spawn_backend(backend);

        let model = loader(&url).load(ModelId::Melody, &Device::Cpu).unwrap();
        let melody = Tensor::zeros((1, 4410), DType::F32, &Device::Cpu).unwrap();
        let output = model
            .generate_with_chroma(
                &["bossa nova".to_string()],
                &[melody],
                44100,
                &SamplingParams::new(1),
            )
            .unwrap();

        assert_eq!(output.dims(), &[1, 2, 32000]);
        let bodies = bodies.lock().unwrap();
        assert_eq!(bodies[0]["melody"]["sample_rate"], 44100);
        assert!(bodies[0]["melody"]["wav_base64"].as_str().unwrap().len() > 44);
    }

    #[test]
    fn test_error_status_becomes_model_error_with_text() {
        let (_runtime, url) = spawn_backend(Backend {
            generate_error: Some((StatusCode::INTERNAL_SERVER_ERROR, "CUDA out of memory")),
            ..Backend::default()
        });

        let model = loader(&url).load(ModelId::Small, &Device::Cpu).unwrap();
        let err = model
            .generate(&["trance".to_string()], &SamplingParams::new(1))
            .unwrap_err();

        match err {
            Error::Model(message) => {
                assert!(message.contains("500"), "{message}");
                assert!(message.contains("CUDA out of memory"), "{message}");
            }
            other => panic!("expected a model error, got {other:?}"),
        }
    }

    #[test]
    fn test_served_name_mismatch_is_rejected() {
        let (_runtime, url) = spawn_backend(Backend {
            served_name: Some("facebook/musicgen-large"),
            ..Backend::default()
        });

        let err = loader(&url)
            .load(ModelId::Small, &Device::Cpu)
            .err()
            .expect("mismatched model must not load");
        assert!(matches!(err, Error::Model(ref m) if m.contains("musicgen-large")));
    }

    #[test]
    fn test_load_rejects_other_sample_rates() {
        let (_runtime, url) = spawn_backend(Backend {
            load_rate: 48000,
            ..Backend::default()
        });

        let err = loader(&url)
            .load(ModelId::Small, &Device::Cpu)
            .err()
            .expect("48 kHz backend must not load");
        assert!(matches!(err, Error::Model(ref m) if m.contains("48000")));
    }

    #[test]
    fn test_generate_rejects_other_sample_rates() {
        let (_runtime, url) = spawn_backend(Backend {
            wav_rate: 48000,
            ..Backend::default()
        });

        let model = loader(&url).load(ModelId::Small, &Device::Cpu).unwrap();
        let err = model
            .generate(&["house".to_string()], &SamplingParams::new(1))
            .unwrap_err();
        assert!(matches!(err, Error::Model(ref m) if m.contains("48000")));
    }
}
