//! Registry storage seam
//!
//! One repository trait per entity plus [`RegistryStore::commit`], the only
//! write path for project-scoped state. A backend must apply a [`ChangeSet`]
//! all-or-nothing and reject it with `Conflict` when the stored inventory
//! version no longer equals `expected_version`.

mod memory;
mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

use async_trait::async_trait;

use crate::core_types::{ProjectId, UserId};

use super::error::RegistryError;
use super::state::{ChangeSet, LedgerTotals, ProjectState};
use super::types::{CreditBatch, Holding, LedgerEntry, LedgerEntryId, ProjectInventory};

#[async_trait]
pub trait InventoryRepository: Send + Sync {
    async fn get_inventory(
        &self,
        project_id: ProjectId,
    ) -> Result<Option<ProjectInventory>, RegistryError>;

    /// Insert a freshly approved project; `ProjectExists` on duplicates
    async fn insert_inventory(&self, inventory: &ProjectInventory) -> Result<(), RegistryError>;

    async fn list_project_ids(&self) -> Result<Vec<ProjectId>, RegistryError>;
}

#[async_trait]
pub trait BatchRepository: Send + Sync {
    /// Batches of one project in issuance order
    async fn list_batches(&self, project_id: ProjectId) -> Result<Vec<CreditBatch>, RegistryError>;

    /// Global serial lookup
    async fn serial_exists(&self, serial: &str) -> Result<bool, RegistryError>;
}

#[async_trait]
pub trait LedgerRepository: Send + Sync {
    /// Most recent first; returns the page and the total entry count
    async fn list_entries(
        &self,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<LedgerEntry>, u64), RegistryError>;

    async fn get_entry(&self, entry_id: LedgerEntryId)
    -> Result<Option<LedgerEntry>, RegistryError>;

    /// Confirmed quantity sums per entry type for one project
    async fn project_totals(&self, project_id: ProjectId) -> Result<LedgerTotals, RegistryError>;
}

#[async_trait]
pub trait HoldingRepository: Send + Sync {
    async fn get_holding(
        &self,
        buyer_id: UserId,
        project_id: ProjectId,
    ) -> Result<Option<Holding>, RegistryError>;

    async fn list_project_holdings(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<Holding>, RegistryError>;
}

#[async_trait]
pub trait RegistryStore:
    InventoryRepository + BatchRepository + LedgerRepository + HoldingRepository
{
    /// Read everything the invariant check needs for one project.
    ///
    /// The result must be one consistent snapshot: an inventory from one
    /// version paired with holdings from another fails the invariant check
    /// as corruption. The default composes separate entity reads and is only
    /// sound for backends with no concurrent writers; shared backends
    /// override it.
    async fn load_project(
        &self,
        project_id: ProjectId,
    ) -> Result<Option<ProjectState>, RegistryError> {
        let Some(inventory) = self.get_inventory(project_id).await? else {
            return Ok(None);
        };
        Ok(Some(ProjectState {
            batches: self.list_batches(project_id).await?,
            holdings: self.list_project_holdings(project_id).await?,
            ledger: self.project_totals(project_id).await?,
            inventory,
        }))
    }

    /// Apply `changes` atomically (compare-and-commit on the inventory version)
    async fn commit(&self, changes: &ChangeSet) -> Result<(), RegistryError>;

    async fn health_check(&self) -> Result<(), RegistryError> {
        Ok(())
    }

    /// Release backend resources at shutdown
    async fn close(&self) {}
}
