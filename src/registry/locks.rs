//! Per-project write locks
//!
//! Serializes mutations of one project inside this process. Operations on
//! different projects never wait on each other. Cross-process safety comes
//! from the store's version check, not from these locks.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::core_types::ProjectId;

use super::error::RegistryError;

/// Guard held for the whole load → plan → commit cycle
pub type ProjectGuard = OwnedMutexGuard<()>;

/// Lazily created async mutex per project.
pub struct ProjectLocks {
    locks: DashMap<ProjectId, Arc<AsyncMutex<()>>>,
}

impl ProjectLocks {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Wait up to `timeout` for exclusive access to `project_id`.
    ///
    /// Returns `Conflict` when the lock stays contended past the timeout.
    pub async fn acquire(
        &self,
        project_id: ProjectId,
        timeout: Duration,
    ) -> Result<ProjectGuard, RegistryError> {
        // Clone the Arc out so the DashMap shard is not held across the await
        let lock = self
            .locks
            .entry(project_id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();

        tokio::time::timeout(timeout, lock.lock_owned())
            .await
            .map_err(|_| {
                RegistryError::Conflict(format!(
                    "timed out after {:?} waiting for project {}",
                    timeout, project_id
                ))
            })
    }
}

impl Default for ProjectLocks {
    fn default() -> Self {
        Self::new()
    }
}
