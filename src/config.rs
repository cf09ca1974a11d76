//! Service configuration.
//!
//! Values resolve as: command-line flag (applied by the binaries) >
//! `MUSICGEN_*` environment variable > built-in default.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::audio::AudioFormat;
use crate::model::ModelId;
use crate::{Error, Result};

/// Output sample rate of every written artifact (MusicGen's native rate).
pub const SAMPLE_RATE: u32 = 32000;

/// Top-k truncation used for both unconditioned and melody-conditioned generation.
pub const DEFAULT_TOP_K: usize = 250;

/// Longest duration the UI slider offers.
pub const UI_MAX_DURATION_SECS: u32 = 20;

/// Initial position of the UI duration slider.
pub const UI_DEFAULT_DURATION_SECS: u32 = 10;

pub const DEFAULT_API_PORT: u16 = 8000;
pub const DEFAULT_UI_PORT: u16 = 8501;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,

    // --- Model backend ---
    /// Base URL of the MusicGen inference server.
    pub backend_url: String,
    pub backend_timeout_secs: u64,
    /// CUDA device ordinal used when CUDA is available.
    pub cuda_device: usize,
    /// Models loaded at start-up instead of on first request.
    pub preload: Vec<ModelId>,

    // --- Output ---
    pub output_dir: PathBuf,
    /// Fixed artifact file name; every generation overwrites it.
    pub output_file: String,

    // --- Limits ---
    pub max_duration_secs: u32,
    pub queue_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_API_PORT,
            backend_url: "http://127.0.0.1:9000".to_string(),
            backend_timeout_secs: 600,
            cuda_device: 0,
            preload: Vec::new(),
            output_dir: PathBuf::from("audio_output"),
            output_file: "generated_music.wav".to_string(),
            max_duration_secs: 300,
            queue_capacity: 64,
        }
    }
}

impl ServiceConfig {
    /// Defaults overridden by `MUSICGEN_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ServiceConfig::from_env`] with an injectable variable source.
    ///
    /// Invalid or empty values are logged and ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(host) = get("MUSICGEN_HOST") {
            config.host = host;
        }
        override_parsed(&get, "MUSICGEN_PORT", &mut config.port);
        if let Some(url) = get("MUSICGEN_BACKEND_URL") {
            config.backend_url = url;
        }
        override_parsed(&get, "MUSICGEN_BACKEND_TIMEOUT_SECS", &mut config.backend_timeout_secs);
        override_parsed(&get, "MUSICGEN_CUDA_DEVICE", &mut config.cuda_device);
        if let Some(list) = get("MUSICGEN_PRELOAD") {
            match parse_model_list(&list) {
                Ok(models) => config.preload = models,
                Err(e) => tracing::warn!("Invalid MUSICGEN_PRELOAD='{list}' ({e}), ignoring"),
            }
        }
        if let Some(dir) = get("MUSICGEN_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }
        if let Some(file) = get("MUSICGEN_OUTPUT_FILE") {
            config.output_file = file;
        }
        override_parsed(&get, "MUSICGEN_MAX_DURATION_SECS", &mut config.max_duration_secs);
        override_parsed(&get, "MUSICGEN_QUEUE_CAPACITY", &mut config.queue_capacity);

        config
    }

    /// Full path of the artifact every generation overwrites.
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(&self.output_file)
    }

    pub fn output_format(&self) -> Result<AudioFormat> {
        AudioFormat::from_path(Path::new(&self.output_file)).ok_or_else(|| {
            Error::Config(format!(
                "unsupported output file '{}'. Use .wav or .ogg",
                self.output_file
            ))
        })
    }

    /// Reject configurations the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.output_format()?;
        if self.output_file.contains('/') || self.output_file.contains('\\') {
            return Err(Error::Config(format!(
                "output_file must be a bare file name, got '{}'",
                self.output_file
            )));
        }
        if self.max_duration_secs == 0 {
            return Err(Error::Config("max_duration_secs must be positive".into()));
        }
        if self.queue_capacity == 0 {
            return Err(Error::Config("queue_capacity must be positive".into()));
        }
        if !self.backend_url.starts_with("http://") && !self.backend_url.starts_with("https://") {
            return Err(Error::Config(format!(
                "backend_url must be an http(s) URL, got '{}'",
                self.backend_url
            )));
        }
        Ok(())
    }
}

/// Parse a comma-separated list of model identifiers.
pub fn parse_model_list(raw: &str) -> Result<Vec<ModelId>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ModelId::from_str)
        .collect()
}

fn override_parsed<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut T) {
    if let Some(raw) = get(key) {
        match raw.parse::<T>() {
            Ok(value) => *slot = value,
            Err(_) => tracing::warn!("Invalid {key}='{raw}', keeping default"),
        }
    }
}
