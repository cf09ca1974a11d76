//! Service entry point: `POST /generate_music`.
//!
//! Accepts either a JSON body
//!
//! ```json
//! {"description": "lofi hip hop", "duration": 10, "model": "facebook/musicgen-small"}
//! ```
//!
//! optionally with `file_base64` holding a WAV reference melody, or a
//! `multipart/form-data` body with `description`, `duration` and `model`
//! fields (or a single `request` field holding the JSON object) plus an
//! optional `file` upload. Responds with `{"audio_path": "..."}`.

use axum::extract::{Extension, Multipart, Request, State};
use axum::http::{StatusCode, header};
use axum::{Json, RequestExt};
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::decode_reference;
use super::error::ApiError;
use super::request_context::RequestContext;
use super::state::AppState;
use crate::model::ModelId;
use crate::pipeline::GenerationRequest;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerateMusicResponse {
    pub audio_path: String,
}

/// Fields as received, before validation.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawGenerateRequest {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    duration: Option<i64>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    file_base64: Option<String>,
    #[serde(skip)]
    file: Option<Vec<u8>>,
}

pub async fn generate_music(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    req: Request,
) -> Result<Json<GenerateMusicResponse>, ApiError> {
    let raw = parse_generate_request(req).await?;
    let request = raw.into_generation_request().await?;
    request.validate(state.manager.max_duration_secs())?;

    tracing::info!(
        correlation_id = %ctx.correlation_id,
        model = %request.model,
        duration_secs = request.duration_secs,
        melody = request.reference.is_some(),
        "generate_music"
    );

    let artifact = state.manager.generate(request).await?;

    Ok(Json(GenerateMusicResponse {
        audio_path: artifact.path.display().to_string(),
    }))
}

async fn parse_generate_request(req: Request) -> Result<RawGenerateRequest, ApiError> {
    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with("application/json") {
        let Json(mut raw) = req
            .extract::<Json<RawGenerateRequest>, _>()
            .await
            .map_err(|err| {
                ApiError::bad_request(format!("Invalid JSON payload: {}", err.body_text()))
            })?;
        raw.file = take_embedded_file(&mut raw)?;
        return Ok(raw);
    }

    if content_type.starts_with("multipart/form-data") {
        let multipart = req
            .extract::<Multipart, _>()
            .await
            .map_err(|err| ApiError::bad_request(format!("Invalid multipart payload: {err}")))?;
        return parse_multipart(multipart).await;
    }

    Err(ApiError {
        status: StatusCode::UNSUPPORTED_MEDIA_TYPE,
        message: "Expected `Content-Type: application/json` or `multipart/form-data`".to_string(),
    })
}

async fn parse_multipart(mut multipart: Multipart) -> Result<RawGenerateRequest, ApiError> {
    let mut out = RawGenerateRequest::default();
    let mut embedded_file = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::bad_request(format!("Failed reading multipart field: {err}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" | "melody" => {
                let bytes = field.bytes().await.map_err(|err| read_error(&name, err))?;
                if !bytes.is_empty() {
                    out.file = Some(bytes.to_vec());
                }
            }
            "request" => {
                let text = field.text().await.map_err(|err| read_error(&name, err))?;
                let mut embedded: RawGenerateRequest = serde_json::from_str(&text).map_err(|err| {
                    ApiError::bad_request(format!("Invalid JSON in `request` field: {err}"))
                })?;
                embedded_file = take_embedded_file(&mut embedded)?;
                out.description = embedded.description.or(out.description);
                out.duration = embedded.duration.or(out.duration);
                out.model = embedded.model.or(out.model);
            }
            "description" => {
                out.description = Some(field.text().await.map_err(|err| read_error(&name, err))?);
            }
            "duration" => {
                let text = field.text().await.map_err(|err| read_error(&name, err))?;
                out.duration = Some(parse_duration(&text)?);
            }
            "model" => {
                out.model = Some(field.text().await.map_err(|err| read_error(&name, err))?);
            }
            _ => {}
        }
    }

    // An uploaded `file` part takes precedence over `file_base64` in `request`.
    if out.file.is_none() {
        out.file = embedded_file;
    }
    Ok(out)
}

/// Decode `file_base64`, treating an empty payload as absent.
fn take_embedded_file(raw: &mut RawGenerateRequest) -> Result<Option<Vec<u8>>, ApiError> {
    let Some(encoded) = raw.file_base64.take() else {
        return Ok(None);
    };
    let decoded = decode_audio_base64(&encoded)?;
    Ok((!decoded.is_empty()).then_some(decoded))
}

fn read_error(name: &str, err: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::bad_request(format!("Failed reading multipart '{name}' field: {err}"))
}

pub(crate) fn parse_duration(raw: &str) -> Result<i64, ApiError> {
    raw.trim().parse::<i64>().map_err(|_| {
        ApiError::bad_request(format!(
            "duration must be a whole number of seconds, got '{}'",
            raw.trim()
        ))
    })
}

fn decode_audio_base64(input: &str) -> Result<Vec<u8>, ApiError> {
    // Accept data URLs as well as bare base64.
    let payload = input
        .split_once(',')
        .map(|(_, value)| value)
        .unwrap_or(input)
        .trim();
    if payload.is_empty() {
        return Ok(Vec::new());
    }
    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|err| ApiError::bad_request(format!("Invalid base64 audio payload: {err}")))
}

impl RawGenerateRequest {
    /// Check presence and shape of every field and decode the reference clip.
    pub(crate) async fn into_generation_request(self) -> Result<GenerationRequest, ApiError> {
        let description = self
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .ok_or_else(|| ApiError::bad_request("Missing required `description` field."))?;
        let duration = self
            .duration
            .ok_or_else(|| ApiError::bad_request("Missing required `duration` field."))?;
        let duration_secs = u32::try_from(duration)
            .ok()
            .filter(|d| *d > 0)
            .ok_or_else(|| {
                ApiError::bad_request(format!(
                    "duration must be a positive number of seconds, got {duration}"
                ))
            })?;
        let model: ModelId = self
            .model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .ok_or_else(|| ApiError::bad_request("Missing required `model` field."))?
            .parse()?;

        let mut request = GenerationRequest::new(description, duration_secs, model);
        if let Some(bytes) = self.file {
            request = request.with_reference(decode_reference(bytes).await?);
        }
        Ok(request)
    }
}
