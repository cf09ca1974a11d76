//! MusicGen service: `POST /generate_music` over HTTP.
//!
//! Keeps models resident across requests and runs one generation at a time.
//! Each request returns the path of the written file:
//!
//! ```sh
//! curl -s localhost:8000/generate_music \
//!   -H 'content-type: application/json' \
//!   -d '{"description":"upbeat jazz","duration":10,"model":"facebook/musicgen-small"}'
//! # {"audio_path":"audio_output/generated_music.wav"}
//! ```
//!
//! Melody conditioning takes a multipart upload:
//!
//! ```sh
//! curl -s localhost:8000/generate_music \
//!   -F description="80s synthwave" -F duration=10 \
//!   -F model=facebook/musicgen-melody -F file=@tune.wav
//! ```

use std::time::Duration;

use clap::Parser;
use musicgen_rs::{
    cli::{ServeArgs, init_tracing},
    config::{DEFAULT_API_PORT, ServiceConfig},
    manager::{GenerationManager, ManagerConfig},
    model::remote::RemoteLoader,
    server::{self, AppState},
};
use tokio::net::TcpListener;

#[derive(Parser, Debug)]
#[command(name = "musicgen-api", about = "MusicGen text/melody-to-music HTTP service")]
struct Args {
    #[command(flatten)]
    serve: ServeArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = Args::parse();
    let port_from_env = std::env::var("MUSICGEN_PORT").is_ok();
    let config = args
        .serve
        .resolve(ServiceConfig::from_env(), port_from_env, DEFAULT_API_PORT)?;

    // Bind first so a port conflict fails before any model is loaded.
    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    tracing::info!(
        "Listening on http://{} (backend {})",
        listener.local_addr()?,
        config.backend_url
    );

    let loader = RemoteLoader::new(
        config.backend_url.clone(),
        Duration::from_secs(config.backend_timeout_secs),
    );
    let manager = GenerationManager::start(ManagerConfig::from(&config), loader).await?;
    tracing::info!("Generation worker ready");

    server::serve(listener, server::api_router(AppState::new(manager))).await?;
    Ok(())
}
