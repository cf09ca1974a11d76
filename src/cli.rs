//! Command-line plumbing shared by the binaries.

use std::path::PathBuf;

use clap::Args;

use crate::config::ServiceConfig;

/// Flags common to `musicgen-api` and `musicgen-ui`. Each one overrides the
/// matching `MUSICGEN_*` environment variable.
#[derive(Args, Debug, Clone, Default)]
pub struct ServeArgs {
    /// Address to bind.
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on.
    #[arg(long, short = 'p')]
    pub port: Option<u16>,

    /// Base URL of the MusicGen inference server.
    #[arg(long)]
    pub backend_url: Option<String>,

    /// CUDA device ordinal (0 = first GPU).
    #[arg(long)]
    pub device: Option<usize>,

    /// Directory the generated file is written to.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Comma-separated models to load at start-up, e.g. `small,melody`.
    #[arg(long)]
    pub preload: Option<String>,
}

impl ServeArgs {
    /// Apply the flags on top of `config`, using `default_port` when neither
    /// the flag nor `MUSICGEN_PORT` is set.
    pub fn resolve(
        self,
        mut config: ServiceConfig,
        port_from_env: bool,
        default_port: u16,
    ) -> crate::Result<ServiceConfig> {
        if let Some(host) = self.host {
            config.host = host;
        }
        config.port = match self.port {
            Some(port) => port,
            None if port_from_env => config.port,
            None => default_port,
        };
        if let Some(url) = self.backend_url {
            config.backend_url = url;
        }
        if let Some(device) = self.device {
            config.cuda_device = device;
        }
        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        if let Some(list) = self.preload {
            config.preload = crate::config::parse_model_list(&list)?;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Install the `tracing` subscriber; `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
