use crate::manager::GenerationManager;

/// Shared handler state; cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub manager: GenerationManager,
}

impl AppState {
    pub fn new(manager: GenerationManager) -> Self {
        Self { manager }
    }
}
