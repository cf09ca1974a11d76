//! MusicGen text- and melody-to-music generation in Rust.
//!
//! Two front-ends share one generation core: an HTTP service that returns
//! the path of the written file, and a browser UI that plays the result
//! inline. Model weights live behind a MusicGen inference server; this crate
//! owns validation, model residency, sequencing and audio I/O.
//!
//! ## Architecture
//!
//! ```text
//! HTTP / browser form
//!        ↓
//!  GenerationRequest::validate
//!        ↓
//!  GenerationManager (one worker thread, FIFO)
//!        ↓
//!  ModelCache ── ModelLoader ──→ inference server
//!        ↓
//!  pipeline::generate (text or melody-conditioned)
//!        ↓
//!  Materializer → audio_output/generated_music.wav (32 kHz)
//! ```
//!
//! ## Modules
//!
//! - [`model`]: model identifiers, sampling parameters, the model traits and the remote backend
//! - [`provider`]: device selection and the per-process model cache
//! - [`pipeline`]: requests, validation and generation dispatch
//! - [`artifact`]: writing the first output example to the fixed path
//! - [`manager`]: the sequential generation worker
//! - [`server`]: the API and UI routers
//! - [`audio`]: WAV/OGG I/O and tensor conversion

pub mod artifact;
pub mod audio;
pub mod cli;
pub mod config;
pub mod manager;
pub mod model;
pub mod pipeline;
pub mod provider;
pub mod server;

mod error;
#[cfg(test)]
mod testing;

pub use error::{Error, Result};
