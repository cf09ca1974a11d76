//! MusicGen CLI: one generation, then exit.
//!
//! Asks the inference server to load the model, generates, and writes the
//! result to `--output`. Prints a one-line JSON summary to stdout on success:
//!
//! ```json
//! {"path":"audio_output/generated_music.wav","duration_secs":10.0,"sample_rate":32000,"channels":1}
//! ```
//!
//! Exit code 0 on success, non-zero on error.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use musicgen_rs::{
    artifact::Materializer,
    cli::init_tracing,
    config::ServiceConfig,
    model::{ModelId, ModelLoader, remote::RemoteLoader},
    pipeline::{self, GenerationRequest, ReferenceAudio},
    provider::{device_label, preferred_device},
};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(
    name = "musicgen",
    about = "MusicGen text/melody-to-music generation",
    long_about = "Generate music from a text description, optionally following a reference melody.\n\
                  Output is written to --output; a JSON summary line is printed to stdout."
)]
struct Args {
    /// Text description of the music: genre, mood, instruments.
    #[arg(long, short = 'c')]
    description: String,

    /// Duration in seconds.
    #[arg(long, short = 'd', default_value_t = 10)]
    duration: u32,

    /// Model name, e.g. `facebook/musicgen-small` or `melody`.
    #[arg(long, short = 'm', default_value = "facebook/musicgen-small")]
    model: ModelId,

    /// Reference melody (WAV). Required for the melody model.
    #[arg(long)]
    melody: Option<PathBuf>,

    /// Output file path. Format determined by extension (.wav or .ogg).
    #[arg(long, short = 'o', default_value = "audio_output/generated_music.wav")]
    output: PathBuf,

    /// Base URL of the MusicGen inference server. Overrides MUSICGEN_BACKEND_URL.
    #[arg(long)]
    backend_url: Option<String>,
}

#[derive(Serialize)]
struct Summary {
    path: String,
    duration_secs: f64,
    sample_rate: u32,
    channels: u16,
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = Args::parse();
    let mut config = ServiceConfig::from_env();
    if let Some(url) = args.backend_url {
        config.backend_url = url;
    }

    let file_name = args
        .output
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("--output must name a file, got {:?}", args.output))?;
    let dir = args.output.parent().map(PathBuf::from).unwrap_or_default();
    let materializer = Materializer::new(dir, file_name)?;

    let mut request = GenerationRequest::new(args.description, args.duration, args.model);
    if let Some(path) = &args.melody {
        let bytes = std::fs::read(path)
            .map_err(|e| anyhow::anyhow!("failed to read melody {}: {e}", path.display()))?;
        request = request.with_reference(ReferenceAudio::from_wav_bytes(&bytes)?);
    }
    request.validate(config.max_duration_secs)?;

    let device = preferred_device(config.cuda_device);
    tracing::info!("Using device: {}", device_label(&device));
    tracing::info!("Loading {}...", request.model);

    let loader = RemoteLoader::new(
        config.backend_url.clone(),
        Duration::from_secs(config.backend_timeout_secs),
    );
    let model = loader
        .load(request.model, &device)
        .map_err(|e| anyhow::anyhow!("failed to load {}: {e}", request.model))?;

    tracing::info!("Generating {}s of audio...", request.duration_secs);
    let output = pipeline::generate(model.as_ref(), &request, &device)
        .map_err(|e| anyhow::anyhow!("generation failed: {e}"))?;
    let artifact = materializer
        .save(&output)
        .map_err(|e| anyhow::anyhow!("failed to write audio: {e}"))?;

    println!(
        "{}",
        serde_json::to_string(&Summary {
            path: artifact.path.display().to_string(),
            duration_secs: artifact.duration_secs(),
            sample_rate: artifact.sample_rate,
            channels: artifact.channels,
        })?
    );

    Ok(())
}
