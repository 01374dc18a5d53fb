use std::sync::Arc;

use crate::registry::RegistryCoordinator;

/// Gateway shared state
#[derive(Clone)]
pub struct AppState {
    /// Every registry operation goes through the coordinator
    pub registry: Arc<RegistryCoordinator>,
    /// Build identifier reported by the health endpoint
    pub build: &'static str,
}

impl AppState {
    pub fn new(registry: Arc<RegistryCoordinator>) -> Self {
        Self {
            registry,
            build: env!("GIT_HASH"),
        }
    }
}
