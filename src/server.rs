//! HTTP front-ends.
//!
//! - [`api`]: JSON/multipart service endpoint returning the artifact path
//! - [`ui`]: server-rendered browser form with inline player and download link
//!
//! Both submit work to the same [`GenerationManager`](crate::manager::GenerationManager).

pub mod api;
mod error;
mod html;
mod request_context;
mod router;
mod state;
pub mod ui;

use tokio::net::TcpListener;
use tokio::signal;

use crate::pipeline::ReferenceAudio;
use crate::{Error, Result};

pub use error::ApiError;
pub use router::{api_router, ui_router};
pub use state::AppState;

/// Decode an uploaded reference clip on the blocking pool.
pub(crate) async fn decode_reference(bytes: Vec<u8>) -> Result<ReferenceAudio> {
    tokio::task::spawn_blocking(move || ReferenceAudio::from_wav_bytes(&bytes))
        .await
        .map_err(|e| Error::Audio(format!("reference decode task failed: {e}")))?
}

/// Serve `app` until Ctrl+C or SIGTERM.
pub async fn serve(listener: TcpListener, app: axum::Router) -> std::io::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        },
    }
}
