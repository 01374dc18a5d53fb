//! In-memory registry store
//!
//! Single `RwLock` around all tables: a commit validates everything first and
//! only then writes, so readers never observe a half-applied change set.
//! Used by tests and single-node development runs.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::core_types::{ProjectId, UserId};
use crate::registry::error::RegistryError;
use crate::registry::state::{ChangeSet, LedgerTotals, ProjectState};
use crate::registry::types::{CreditBatch, Holding, LedgerEntry, LedgerEntryId, ProjectInventory};

use super::{
    BatchRepository, HoldingRepository, InventoryRepository, LedgerRepository, RegistryStore,
};

#[derive(Default)]
struct Tables {
    projects: BTreeMap<ProjectId, ProjectInventory>,
    /// Issuance order per project
    batches: HashMap<ProjectId, Vec<CreditBatch>>,
    serials: HashSet<String>,
    holdings: HashMap<(UserId, ProjectId), Holding>,
    /// Append order
    ledger: Vec<LedgerEntry>,
    totals: HashMap<ProjectId, LedgerTotals>,
}

impl Tables {
    fn project_holdings(&self, project_id: ProjectId) -> Vec<Holding> {
        let mut holdings: Vec<Holding> = self
            .holdings
            .values()
            .filter(|h| h.project_id == project_id)
            .cloned()
            .collect();
        holdings.sort_by_key(|h| h.buyer_id);
        holdings
    }
}

/// Registry store held entirely in process memory
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,

    /// Commits left to reject with `Conflict` (fault injection)
    #[cfg(test)]
    injected_conflicts: std::sync::atomic::AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, RegistryError> {
        self.tables
            .read()
            .map_err(|_| RegistryError::SystemError("memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, RegistryError> {
        self.tables
            .write()
            .map_err(|_| RegistryError::SystemError("memory store lock poisoned".into()))
    }

    /// Reject the next `n` commits with `Conflict`
    #[cfg(test)]
    pub fn inject_conflicts(&self, n: u32) {
        self.injected_conflicts
            .store(n, std::sync::atomic::Ordering::SeqCst);
    }

    /// Overwrite a holding's quantity behind the coordinator's back
    #[cfg(test)]
    pub fn tamper_holding(&self, buyer_id: UserId, project_id: ProjectId, quantity: u64) {
        let mut t = self.tables.write().unwrap();
        if let Some(h) = t.holdings.get_mut(&(buyer_id, project_id)) {
            h.quantity = quantity;
        }
    }
}

#[async_trait]
impl InventoryRepository for MemoryStore {
    async fn get_inventory(
        &self,
        project_id: ProjectId,
    ) -> Result<Option<ProjectInventory>, RegistryError> {
        Ok(self.read()?.projects.get(&project_id).cloned())
    }

    async fn insert_inventory(&self, inventory: &ProjectInventory) -> Result<(), RegistryError> {
        let mut t = self.write()?;
        if t.projects.contains_key(&inventory.project_id) {
            return Err(RegistryError::ProjectExists(inventory.project_id));
        }
        t.projects.insert(inventory.project_id, inventory.clone());
        Ok(())
    }

    async fn list_project_ids(&self) -> Result<Vec<ProjectId>, RegistryError> {
        Ok(self.read()?.projects.keys().copied().collect())
    }
}

#[async_trait]
impl BatchRepository for MemoryStore {
    async fn list_batches(&self, project_id: ProjectId) -> Result<Vec<CreditBatch>, RegistryError> {
        Ok(self
            .read()?
            .batches
            .get(&project_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn serial_exists(&self, serial: &str) -> Result<bool, RegistryError> {
        Ok(self.read()?.serials.contains(serial))
    }
}

#[async_trait]
impl LedgerRepository for MemoryStore {
    async fn list_entries(
        &self,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<LedgerEntry>, u64), RegistryError> {
        let t = self.read()?;
        let entries = t
            .ledger
            .iter()
            .rev()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect();
        Ok((entries, t.ledger.len() as u64))
    }

    async fn get_entry(
        &self,
        entry_id: LedgerEntryId,
    ) -> Result<Option<LedgerEntry>, RegistryError> {
        Ok(self
            .read()?
            .ledger
            .iter()
            .find(|e| e.entry_id == entry_id)
            .cloned())
    }

    async fn project_totals(&self, project_id: ProjectId) -> Result<LedgerTotals, RegistryError> {
        Ok(self
            .read()?
            .totals
            .get(&project_id)
            .copied()
            .unwrap_or_default())
    }
}

#[async_trait]
impl HoldingRepository for MemoryStore {
    async fn get_holding(
        &self,
        buyer_id: UserId,
        project_id: ProjectId,
    ) -> Result<Option<Holding>, RegistryError> {
        Ok(self.read()?.holdings.get(&(buyer_id, project_id)).cloned())
    }

    async fn list_project_holdings(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<Holding>, RegistryError> {
        Ok(self.read()?.project_holdings(project_id))
    }
}

#[async_trait]
impl RegistryStore for MemoryStore {
    async fn load_project(
        &self,
        project_id: ProjectId,
    ) -> Result<Option<ProjectState>, RegistryError> {
        let t = self.read()?;
        let Some(inventory) = t.projects.get(&project_id).cloned() else {
            return Ok(None);
        };
        Ok(Some(ProjectState {
            inventory,
            batches: t.batches.get(&project_id).cloned().unwrap_or_default(),
            holdings: t.project_holdings(project_id),
            ledger: t.totals.get(&project_id).copied().unwrap_or_default(),
        }))
    }

    async fn commit(&self, changes: &ChangeSet) -> Result<(), RegistryError> {
        let mut guard = self.write()?;
        let t = &mut *guard;

        #[cfg(test)]
        {
            use std::sync::atomic::Ordering;
            if self
                .injected_conflicts
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(RegistryError::Conflict("injected".into()));
            }
        }

        // === Validate: nothing is written until every check passes ===
        let current = t
            .projects
            .get(&changes.project_id)
            .ok_or(RegistryError::ProjectNotFound(changes.project_id))?;
        if current.version != changes.expected_version {
            return Err(RegistryError::Conflict(format!(
                "project {} version {} != expected {}",
                changes.project_id, current.version, changes.expected_version
            )));
        }

        let mut fresh = HashSet::with_capacity(changes.new_batches.len());
        for batch in &changes.new_batches {
            if t.serials.contains(&batch.serial_number) || !fresh.insert(&batch.serial_number) {
                return Err(RegistryError::Conflict(format!(
                    "serial {} already exists",
                    batch.serial_number
                )));
            }
        }

        // === Apply ===
        t.projects
            .insert(changes.project_id, changes.inventory.clone());

        let project_batches = t.batches.entry(changes.project_id).or_default();
        for update in &changes.batch_updates {
            if let Some(slot) = project_batches
                .iter_mut()
                .find(|b| b.batch_id == update.batch_id)
            {
                *slot = update.clone();
            }
        }
        project_batches.extend(changes.new_batches.iter().cloned());
        for batch in &changes.new_batches {
            t.serials.insert(batch.serial_number.clone());
        }

        for holding in &changes.holdings {
            t.holdings
                .insert((holding.buyer_id, holding.project_id), holding.clone());
        }

        let totals = t.totals.entry(changes.project_id).or_default();
        for entry in &changes.entries {
            totals.record(entry);
        }
        t.ledger.extend(changes.entries.iter().cloned());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::types::ProjectRegistration;
    use rust_decimal::Decimal;

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        let reg = ProjectRegistration {
            project_id: 1,
            developer_id: 900,
            vintage: 2024,
            total_credits: 100,
            price_per_credit: Decimal::from(3),
            integrity_score: None,
        };
        store
            .insert_inventory(&ProjectInventory::from_registration(&reg, 0))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_duplicate_registration() {
        let store = seeded().await;
        let inv = store.get_inventory(1).await.unwrap().unwrap();
        assert!(matches!(
            store.insert_inventory(&inv).await,
            Err(RegistryError::ProjectExists(1))
        ));
    }

    #[tokio::test]
    async fn test_stale_version_rejected_without_effect() {
        let store = seeded().await;
        let state = store.load_project(1).await.unwrap().unwrap();

        let mut first = ChangeSet::begin(&state, 1);
        first.inventory.available_credits = 90;
        first.append(LedgerEntry::issuance(1, 900, 10, 1));
        store.commit(&first).await.unwrap();

        // Planned against the same (now stale) snapshot
        let mut second = ChangeSet::begin(&state, 2);
        second.inventory.available_credits = 80;
        second.append(LedgerEntry::issuance(1, 900, 10, 2));
        assert!(matches!(
            store.commit(&second).await,
            Err(RegistryError::Conflict(_))
        ));

        let inv = store.get_inventory(1).await.unwrap().unwrap();
        assert_eq!(inv.available_credits, 90);
        assert_eq!(inv.version, 2);
        assert_eq!(store.list_entries(0, 10).await.unwrap().1, 1);
    }

    #[tokio::test]
    async fn test_list_entries_most_recent_first() {
        let store = seeded().await;
        for i in 0..3u64 {
            let state = store.load_project(1).await.unwrap().unwrap();
            let mut cs = ChangeSet::begin(&state, i as i64);
            cs.append(LedgerEntry::issuance(1, 900, i + 1, i as i64));
            store.commit(&cs).await.unwrap();
        }

        let (page, total) = store.list_entries(0, 2).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.iter().map(|e| e.quantity).collect::<Vec<_>>(), vec![3, 2]);

        let (page, _) = store.list_entries(2, 2).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].quantity, 1);

        assert_eq!(store.project_totals(1).await.unwrap().issued, 6);
    }

    #[tokio::test]
    async fn test_injected_conflict_leaves_state_untouched() {
        let store = seeded().await;
        store.inject_conflicts(1);
        let state = store.load_project(1).await.unwrap().unwrap();
        let mut cs = ChangeSet::begin(&state, 1);
        cs.append(LedgerEntry::issuance(1, 900, 5, 1));

        assert!(store.commit(&cs).await.is_err());
        assert!(store.commit(&cs).await.is_ok());
        assert_eq!(store.list_entries(0, 10).await.unwrap().1, 1);
    }
}
