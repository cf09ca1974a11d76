//! Model provider: resolves identifiers to resident models.
//!
//! [`ModelCache`] keeps every successfully loaded model for the rest of the
//! process, so repeated requests for the same identifier skip the load step.
//! Failed loads are not cached. The cache is owned by the generation worker
//! and is never shared between threads.

use std::collections::HashMap;
use std::sync::Arc;

use candle_core::{Device, DeviceLocation};

use crate::Result;
use crate::model::{ModelId, ModelLoader, MusicModel};

pub struct ModelCache {
    loader: Box<dyn ModelLoader>,
    device: Device,
    models: HashMap<ModelId, Arc<dyn MusicModel>>,
    load_count: usize,
}

impl ModelCache {
    pub fn new(loader: Box<dyn ModelLoader>, device: Device) -> Self {
        Self {
            loader,
            device,
            models: HashMap::new(),
            load_count: 0,
        }
    }

    /// Return the resident model for `id`, loading it on first use.
    pub fn get_or_load(&mut self, id: ModelId) -> Result<Arc<dyn MusicModel>> {
        if let Some(model) = self.models.get(&id) {
            tracing::debug!(model = %id, "model cache hit");
            return Ok(Arc::clone(model));
        }

        tracing::info!(model = %id, device = ?self.device, "loading pretrained model");
        let started = std::time::Instant::now();
        let model = self.loader.load(id, &self.device)?;
        self.load_count += 1;
        tracing::info!(
            model = %id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "model loaded"
        );

        self.models.insert(id, Arc::clone(&model));
        Ok(model)
    }

    /// Device every model is placed on.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Number of loads performed so far; cache hits do not count.
    pub fn load_count(&self) -> usize {
        self.load_count
    }

    /// Identifiers currently resident, sorted.
    pub fn loaded(&self) -> Vec<ModelId> {
        let mut ids: Vec<ModelId> = self.models.keys().copied().collect();
        ids.sort();
        ids
    }
}

/// Return the preferred device: CUDA if available, otherwise CPU.
pub fn preferred_device(cuda_ordinal: usize) -> Device {
    Device::cuda_if_available(cuda_ordinal).unwrap_or(Device::Cpu)
}

/// Short device name, as reported in status output and sent to the backend.
pub fn device_label(device: &Device) -> String {
    match device.location() {
        DeviceLocation::Cpu => "cpu".to_string(),
        DeviceLocation::Cuda { gpu_id } => format!("cuda:{gpu_id}"),
        DeviceLocation::Metal { .. } => "mps".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeLoader;

    #[test]
    fn test_second_request_reuses_loaded_model() {
        let loader = FakeLoader::default();
        let recorder = loader.clone();
        let mut cache = ModelCache::new(Box::new(loader), Device::Cpu);

        let first = cache.get_or_load(ModelId::Small).unwrap();
        let second = cache.get_or_load(ModelId::Small).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.load_count(), 1);
        assert_eq!(recorder.load_count(), 1);
    }

    #[test]
    fn test_models_are_cached_per_identifier() {
        let mut cache = ModelCache::new(Box::new(FakeLoader::default()), Device::Cpu);
        cache.get_or_load(ModelId::Melody).unwrap();
        cache.get_or_load(ModelId::Small).unwrap();
        cache.get_or_load(ModelId::Melody).unwrap();

        assert_eq!(cache.load_count(), 2);
        assert_eq!(cache.loaded(), vec![ModelId::Small, ModelId::Melody]);
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        let loader = FakeLoader::default().failing_for(ModelId::Large);
        let recorder = loader.clone();
        let mut cache = ModelCache::new(Box::new(loader), Device::Cpu);

        assert!(cache.get_or_load(ModelId::Large).is_err());
        assert!(cache.get_or_load(ModelId::Large).is_err());
        assert_eq!(recorder.attempts(), 2);
        assert_eq!(cache.load_count(), 0);
        assert!(cache.loaded().is_empty());
    }

    #[test]
    fn test_cpu_device_label() {
        assert_eq!(device_label(&Device::Cpu), "cpu");
    }

    #[test]
    fn test_preferred_device_without_cuda_is_cpu() {
        if !candle_core::utils::cuda_is_available() {
            assert!(preferred_device(0).is_cpu());
        }
    }
}
