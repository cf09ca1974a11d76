//! Error types for musicgen-rs.

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Request rejected before any model work (missing fields, unknown model, ...).
    #[error("{0}")]
    Validation(String),

    /// The model backend failed to load a model or to generate.
    #[error("model: {0}")]
    Model(String),

    /// Candle tensor error.
    #[error("candle: {0}")]
    Candle(#[from] candle_core::Error),

    /// Audio decoding/encoding error (WAV, Vorbis).
    #[error("audio: {0}")]
    Audio(String),

    /// Transport error talking to the model backend.
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid configuration.
    #[error("config: {0}")]
    Config(String),

    /// The generation worker is gone or dropped the reply.
    #[error("manager: {0}")]
    Manager(String),

    /// I/O error.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// True for errors caused by the request itself rather than by the backend or disk.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<hound::Error> for Error {
    fn from(error: hound::Error) -> Self {
        match error {
            hound::Error::IoError(io) => Error::Io(io),
            other => Error::Audio(other.to_string()),
        }
    }
}
