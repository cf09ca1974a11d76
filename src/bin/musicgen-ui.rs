//! MusicGen browser UI.
//!
//! Serves a form at `/`: pick `musicgen-small` or `musicgen-melody`, describe
//! the music, choose a duration up to 20 seconds and, for the melody model,
//! upload a reference clip. The result plays inline and can be downloaded.

use std::time::Duration;

use clap::Parser;
use musicgen_rs::{
    cli::{ServeArgs, init_tracing},
    config::{DEFAULT_UI_PORT, ServiceConfig},
    manager::{GenerationManager, ManagerConfig},
    model::remote::RemoteLoader,
    server::{self, AppState},
};
use tokio::net::TcpListener;

#[derive(Parser, Debug)]
#[command(name = "musicgen-ui", about = "Text and melody to music generator (browser UI)")]
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
        .resolve(ServiceConfig::from_env(), port_from_env, DEFAULT_UI_PORT)?;

    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    tracing::info!("Open http://{} in a browser", listener.local_addr()?);

    let loader = RemoteLoader::new(
        config.backend_url.clone(),
        Duration::from_secs(config.backend_timeout_secs),
    );
    let manager = GenerationManager::start(ManagerConfig::from(&config), loader).await?;

    server::serve(listener, server::ui_router(AppState::new(manager))).await?;
    Ok(())
}
