//! Generation manager: owns the model cache and runs requests one at a time.
//!
//! A single blocking worker thread owns the [`ModelCache`] and the
//! [`Materializer`]. Callers submit [`GenerationRequest`]s over a bounded
//! channel; each is processed end-to-end (load → generate → write) before the
//! next one starts. Because only the worker touches the cache, no locking is
//! involved. Nothing is retried; a failure is returned to its caller.
//!
//! The worker publishes a [`ManagerStatus`] snapshot after every job, so
//! [`GenerationManager::status`] never waits behind queued generations.
//!
//! # Example
//!
//! ```no_run
//! use musicgen_rs::manager::{GenerationManager, ManagerConfig};
//! use musicgen_rs::model::{ModelId, remote::RemoteLoader};
//! use musicgen_rs::pipeline::GenerationRequest;
//!
//! #[tokio::main]
//! async fn main() {
//!     let loader = RemoteLoader::new("http://127.0.0.1:9000", std::time::Duration::from_secs(600));
//!     let manager = GenerationManager::start(ManagerConfig::default(), loader).await.unwrap();
//!     let request = GenerationRequest::new("lofi hip hop", 10, ModelId::Small);
//!     let artifact = manager.generate(request).await.unwrap();
//!     println!("{}", artifact.path.display());
//! }
//! ```

use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use crate::artifact::{AudioArtifact, Materializer};
use crate::config::ServiceConfig;
use crate::model::{ModelId, ModelLoader};
use crate::pipeline::{self, GenerationRequest};
use crate::provider::{ModelCache, device_label, preferred_device};
use crate::{Error, Result};

/// Configuration for the generation manager.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// CUDA device ordinal (0 = first GPU). Ignored when CUDA is unavailable.
    pub cuda_device: usize,

    /// Models to load before accepting requests. Empty = load lazily on first use.
    pub preload: Vec<ModelId>,

    pub output_dir: PathBuf,
    pub output_file: String,

    /// Upper bound on requested durations.
    pub max_duration_secs: u32,

    /// Requests that may wait behind the one being generated.
    pub queue_capacity: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self::from(&ServiceConfig::default())
    }
}

impl From<&ServiceConfig> for ManagerConfig {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            cuda_device: config.cuda_device,
            preload: config.preload.clone(),
            output_dir: config.output_dir.clone(),
            output_file: config.output_file.clone(),
            max_duration_secs: config.max_duration_secs,
            queue_capacity: config.queue_capacity,
        }
    }
}

/// Snapshot of the worker state.
#[derive(Debug, Clone, Serialize)]
pub struct ManagerStatus {
    pub device: String,
    pub loaded_models: Vec<ModelId>,
    pub load_count: usize,
    pub completed: u64,
}

struct Job {
    request: GenerationRequest,
    reply: oneshot::Sender<Result<AudioArtifact>>,
}

/// Handle for submitting generation requests to a running manager.
#[derive(Clone)]
pub struct GenerationManager {
    tx: mpsc::Sender<Job>,
    status: Arc<RwLock<ManagerStatus>>,
    max_duration_secs: u32,
}

impl GenerationManager {
    /// Start the worker and return a handle for submitting requests.
    ///
    /// Models listed in `config.preload` are loaded before this returns; a
    /// failed preload is returned as an error.
    pub async fn start(config: ManagerConfig, loader: impl ModelLoader + 'static) -> Result<Self> {
        let materializer = Materializer::new(&config.output_dir, &config.output_file)?;
        let max_duration_secs = config.max_duration_secs;
        let preload = config.preload.clone();
        let cuda_device = config.cuda_device;

        // Device probing and preloading do blocking I/O.
        let cache = tokio::task::spawn_blocking(move || -> Result<ModelCache> {
            let device = preferred_device(cuda_device);
            tracing::info!(device = ?device, "generation worker starting");
            let mut cache = ModelCache::new(Box::new(loader), device);
            for id in preload {
                cache.get_or_load(id)?;
            }
            Ok(cache)
        })
        .await
        .map_err(|join_error| Error::Manager(format!("worker start-up panicked: {join_error}")))?
        .map_err(|e| Error::Manager(format!("model preload failed: {e}")))?;

        let (tx, rx) = mpsc::channel::<Job>(config.queue_capacity.max(1));
        let worker = Worker {
            cache,
            materializer,
            max_duration_secs,
            completed: 0,
            status: Arc::new(RwLock::new(ManagerStatus {
                device: String::new(),
                loaded_models: Vec::new(),
                load_count: 0,
                completed: 0,
            })),
        };
        worker.publish();
        let status = worker.status.clone();

        tokio::task::spawn_blocking(move || worker.run(rx));

        Ok(Self {
            tx,
            status,
            max_duration_secs,
        })
    }

    /// Longest duration this manager accepts.
    pub fn max_duration_secs(&self) -> u32 {
        self.max_duration_secs
    }

    /// Submit a generation request and wait for the written artifact.
    pub async fn generate(&self, request: GenerationRequest) -> Result<AudioArtifact> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Job {
                request,
                reply: reply_tx,
            })
            .await
            .map_err(|_| Error::Manager("manager has shut down".into()))?;

        reply_rx
            .await
            .map_err(|_| Error::Manager("manager dropped reply channel".into()))?
    }

    /// Latest state published by the worker. Does not wait for queued jobs.
    pub fn status(&self) -> ManagerStatus {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// State owned by the worker thread.
struct Worker {
    cache: ModelCache,
    materializer: Materializer,
    max_duration_secs: u32,
    completed: u64,
    status: Arc<RwLock<ManagerStatus>>,
}

impl Worker {
    /// The worker loop: runs in a dedicated blocking thread until every handle is dropped.
    fn run(mut self, mut rx: mpsc::Receiver<Job>) {
        while let Some(Job { request, reply }) = rx.blocking_recv() {
            let result = self.process(request);
            self.publish();
            // Ignore send errors: caller may have gone away.
            let _ = reply.send(result);
        }
        tracing::info!("generation manager shut down");
    }

    fn process(&mut self, request: GenerationRequest) -> Result<AudioArtifact> {
        request.validate(self.max_duration_secs)?;

        let started = Instant::now();
        let model = self.cache.get_or_load(request.model)?;
        let output = pipeline::generate(model.as_ref(), &request, self.cache.device())?;
        let artifact = self.materializer.save(&output)?;
        self.completed += 1;

        tracing::info!(
            model = %request.model,
            mode = ?request.mode(),
            requested_secs = request.duration_secs,
            generated_secs = artifact.duration_secs(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "generation complete"
        );
        Ok(artifact)
    }

    fn publish(&self) {
        let snapshot = ManagerStatus {
            device: device_label(self.cache.device()),
            loaded_models: self.cache.loaded(),
            load_count: self.cache.load_count(),
            completed: self.completed,
        };
        *self.status.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }
}
