//! Server-rendered markup for the browser UI.

use crate::config::{UI_DEFAULT_DURATION_SECS, UI_MAX_DURATION_SECS};
use crate::model::ModelId;

pub const PAGE_TITLE: &str = "Text and Melody to Music Generator🎵";

const EXPLANATION: &str = "Describe the music you want and pick a model. \
musicgen-small generates from the description alone. \
musicgen-melody also follows the melody of an uploaded reference clip. \
Generation runs one request at a time and can take a while on CPU.";

/// Sticky form values echoed back after a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormValues {
    pub model: ModelId,
    pub description: String,
    pub duration_secs: u32,
}

impl Default for FormValues {
    fn default() -> Self {
        Self {
            model: ModelId::Small,
            description: String::new(),
            duration_secs: UI_DEFAULT_DURATION_SECS,
        }
    }
}

/// What to show under the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Error(String),
    Generated {
        summary: String,
        mime_type: &'static str,
        file_name: String,
        audio_base64: String,
    },
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn render_page(values: &FormValues, outcome: Option<&Outcome>) -> String {
    let options: String = ModelId::UI_CHOICES
        .iter()
        .map(|id| {
            let selected = if *id == values.model { " selected" } else { "" };
            format!(
                r#"<option value="{name}"{selected}>{name}</option>"#,
                name = escape_html(&id.pretrained_name())
            )
        })
        .collect();

    let melody = values.model.supports_melody();
    let file_style = if melody { "" } else { r#" style="display:none""# };
    let file_disabled = if melody { "" } else { " disabled" };

    let result = outcome.map(render_outcome).unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
</head>
<body>
<h1>{title}</h1>
<details>
<summary>See explanation</summary>
<p>{explanation}</p>
</details>
<form method="post" action="/" enctype="multipart/form-data">
<label for="model">Select a model</label>
<select id="model" name="model" onchange="toggleMelody(this.value)">{options}</select>
<label for="description">Enter description</label>
<textarea id="description" name="description" rows="3">{description}</textarea>
<label for="duration">Select duration (in seconds): <output id="duration-value">{duration}</output></label>
<input id="duration" name="duration" type="range" min="0" max="{max}" value="{duration}" oninput="document.getElementById('duration-value').value = this.value">
<div id="melody-upload"{file_style}>
<label for="file">Upload melody file</label>
<input id="file" name="file" type="file" accept=".wav,audio/wav"{file_disabled}>
</div>
<button type="submit">Generate Music</button>
</form>
{result}
<script>
function toggleMelody(model) {{
  var melody = model.indexOf("melody") !== -1;
  document.getElementById("melody-upload").style.display = melody ? "" : "none";
  document.getElementById("file").disabled = !melody;
}}
</script>
</body>
</html>
"#,
        title = PAGE_TITLE,
        explanation = escape_html(EXPLANATION),
        description = escape_html(&values.description),
        duration = values.duration_secs,
        max = UI_MAX_DURATION_SECS,
    )
}

fn render_outcome(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Error(message) => {
            format!(r#"<p class="error" role="alert">{}</p>"#, escape_html(message))
        }
        Outcome::Generated {
            summary,
            mime_type,
            file_name,
            audio_base64,
        } => format!(
            r#"<section class="result">
<p>{summary}</p>
<audio controls src="data:{mime_type};base64,{audio_base64}"></audio>
<p><a href="data:application/octet-stream;base64,{audio_base64}" download="{file_name}">Download Audio</a></p>
</section>"#,
            summary = escape_html(summary),
            file_name = escape_html(file_name),
        ),
    }
}
