//! Browser UI: `GET /` renders the form, `POST /` runs a generation and
//! renders the result inline with a player and a download link.
//!
//! Every failure is shown on the page; the form keeps the submitted values.

use axum::RequestExt;
use axum::extract::{Multipart, Request, State};
use axum::response::Html;
use base64::Engine;

use super::decode_reference;
use super::html::{FormValues, Outcome, render_page};
use super::state::AppState;
use crate::config::UI_MAX_DURATION_SECS;
use crate::model::ModelId;
use crate::pipeline::GenerationRequest;

pub const MISSING_INPUT_MESSAGE: &str = "Please enter a description and select a duration. \
For musicgen-melody, also upload a melody file.";

pub const MISSING_MELODY_MESSAGE: &str = "Please upload a melody file for the musicgen-melody model.";

#[derive(Debug, Default)]
struct SubmittedForm {
    model: Option<String>,
    description: String,
    duration: Option<String>,
    file: Option<Vec<u8>>,
}

pub async fn index() -> Html<String> {
    Html(render_page(&FormValues::default(), None))
}

pub async fn submit(State(state): State<AppState>, req: Request) -> Html<String> {
    let mut values = FormValues::default();
    let outcome = match run(&state, req, &mut values).await {
        Ok(outcome) => outcome,
        Err(message) => Outcome::Error(message),
    };
    Html(render_page(&values, Some(&outcome)))
}

async fn run(state: &AppState, req: Request, values: &mut FormValues) -> Result<Outcome, String> {
    let multipart = req
        .extract::<Multipart, _>()
        .await
        .map_err(|err| format!("Could not read the submitted form: {err}"))?;
    let form = read_form(multipart).await?;

    values.description = form.description.clone();
    if let Some(raw) = form.model.as_deref().filter(|m| !m.trim().is_empty()) {
        values.model = parse_ui_model(raw)?;
    }
    values.duration_secs = match form.duration.as_deref().map(str::trim) {
        None | Some("") => 0,
        Some(raw) => raw
            .parse::<u32>()
            .map_err(|_| format!("Duration must be a whole number of seconds, got '{raw}'."))?,
    };

    if values.description.trim().is_empty() || values.duration_secs == 0 {
        return Err(MISSING_INPUT_MESSAGE.to_string());
    }

    let mut request = GenerationRequest::new(
        values.description.trim(),
        values.duration_secs,
        values.model,
    );
    if values.model.supports_melody() {
        let bytes = form.file.ok_or_else(|| MISSING_MELODY_MESSAGE.to_string())?;
        let reference = decode_reference(bytes).await.map_err(|e| e.to_string())?;
        request = request.with_reference(reference);
    }
    request
        .validate(UI_MAX_DURATION_SECS)
        .map_err(|e| e.to_string())?;

    let summary = format!(
        "Generated {}s of music with {} for \"{}\"{}.",
        request.duration_secs,
        request.model.short_name(),
        request.description,
        if request.reference.is_some() {
            " following the uploaded melody"
        } else {
            ""
        },
    );

    let artifact = state.manager.generate(request).await.map_err(|e| {
        tracing::error!(error = %e, "ui generation failed");
        format!("Music generation failed: {e}")
    })?;
    let bytes = tokio::fs::read(&artifact.path)
        .await
        .map_err(|e| format!("Could not read {}: {e}", artifact.path.display()))?;

    Ok(Outcome::Generated {
        summary,
        mime_type: artifact.format.mime_type(),
        file_name: artifact.file_name(),
        audio_base64: base64::engine::general_purpose::STANDARD.encode(bytes),
    })
}

/// Only the models offered in the select box are accepted.
fn parse_ui_model(raw: &str) -> Result<ModelId, String> {
    let id = raw.parse::<ModelId>().map_err(|e| e.to_string())?;
    if ModelId::UI_CHOICES.contains(&id) {
        return Ok(id);
    }
    let offered: Vec<String> = ModelId::UI_CHOICES
        .iter()
        .map(|choice| choice.pretrained_name())
        .collect();
    Err(format!(
        "Model '{}' is not available here; choose one of: {}.",
        raw.trim(),
        offered.join(", ")
    ))
}

async fn read_form(mut multipart: Multipart) -> Result<SubmittedForm, String> {
    let mut form = SubmittedForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| format!("Could not read the submitted form: {err}"))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let bytes = field.bytes().await.map_err(|err| err.to_string())?;
                if !bytes.is_empty() {
                    form.file = Some(bytes.to_vec());
                }
            }
            "model" => form.model = Some(field.text().await.map_err(|err| err.to_string())?),
            "description" => form.description = field.text().await.map_err(|err| err.to_string())?,
            "duration" => form.duration = Some(field.text().await.map_err(|err| err.to_string())?),
            _ => {}
        }
    }
    Ok(form)
}
