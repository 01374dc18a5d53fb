//! Project State Snapshot and Change Sets
//!
//! A [`ProjectState`] is everything the invariant check needs about one
//! project. Planners never mutate it; they produce a [`ChangeSet`] that the
//! coordinator validates against the post-image and hands to the store as a
//! single atomic commit.

use crate::core_types::{ProjectId, Quantity, TimestampMs, UserId};

use super::types::{CreditBatch, Holding, LedgerEntry, LedgerEntryType, ProjectInventory};

/// Per-project quantity sums recomputed from the ledger (the system of record)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerTotals {
    pub issued: Quantity,
    pub purchased: Quantity,
    pub retired: Quantity,
}

impl LedgerTotals {
    /// Fold one entry in; non-confirmed entries do not count
    pub fn record(&mut self, entry: &LedgerEntry) {
        if !entry.status.is_effective() {
            return;
        }
        let slot = match entry.entry_type {
            LedgerEntryType::Issuance => &mut self.issued,
            LedgerEntryType::Purchase => &mut self.purchased,
            LedgerEntryType::Retirement => &mut self.retired,
        };
        *slot = slot.saturating_add(entry.quantity);
    }

    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a LedgerEntry>) -> Self {
        let mut totals = Self::default();
        for entry in entries {
            totals.record(entry);
        }
        totals
    }
}

/// Consistent read of one project's inventory, batches, holdings and ledger sums
#[derive(Debug, Clone)]
pub struct ProjectState {
    pub inventory: ProjectInventory,
    /// In issuance order
    pub batches: Vec<CreditBatch>,
    pub holdings: Vec<Holding>,
    pub ledger: LedgerTotals,
}

impl ProjectState {
    /// Fresh project with nothing issued, sold or retired
    pub fn new(inventory: ProjectInventory) -> Self {
        Self {
            inventory,
            batches: Vec::new(),
            holdings: Vec::new(),
            ledger: LedgerTotals::default(),
        }
    }

    #[inline]
    pub fn project_id(&self) -> ProjectId {
        self.inventory.project_id
    }

    pub fn holding(&self, buyer_id: UserId) -> Option<&Holding> {
        self.holdings.iter().find(|h| h.buyer_id == buyer_id)
    }

    /// Sum of all minted batch quantities
    pub fn issued_credits(&self) -> Quantity {
        self.batches
            .iter()
            .fold(0u64, |acc, b| acc.saturating_add(b.quantity))
    }
}

/// Everything one logical operation writes, committed all-or-nothing
#[derive(Debug, Clone)]
pub struct ChangeSet {
    pub project_id: ProjectId,
    /// Inventory version the plan was computed against
    pub expected_version: u64,
    /// Inventory post-image (version already bumped)
    pub inventory: ProjectInventory,
    pub new_batches: Vec<CreditBatch>,
    /// Existing batches whose status advanced
    pub batch_updates: Vec<CreditBatch>,
    /// Holding post-images to upsert
    pub holdings: Vec<Holding>,
    pub entries: Vec<LedgerEntry>,
}

impl ChangeSet {
    /// Start an empty change set against `state`
    pub fn begin(state: &ProjectState, now: TimestampMs) -> Self {
        let mut inventory = state.inventory.clone();
        inventory.version = state.inventory.version + 1;
        inventory.updated_at = now;

        Self {
            project_id: state.project_id(),
            expected_version: state.inventory.version,
            inventory,
            new_batches: Vec::new(),
            batch_updates: Vec::new(),
            holdings: Vec::new(),
            entries: Vec::new(),
        }
    }

    /// Stage a holding post-image, replacing an earlier one for the same buyer
    pub fn upsert_holding(&mut self, holding: Holding) {
        match self
            .holdings
            .iter_mut()
            .find(|h| h.buyer_id == holding.buyer_id)
        {
            Some(slot) => *slot = holding,
            None => self.holdings.push(holding),
        }
    }

    pub fn append(&mut self, entry: LedgerEntry) {
        self.entries.push(entry);
    }

    /// The entry whose id is reported to the caller
    pub fn primary_entry(&self) -> Option<&LedgerEntry> {
        self.entries.first()
    }

    /// Post-image of `state` with this change set applied
    pub fn apply(&self, state: &ProjectState) -> ProjectState {
        let mut next = state.clone();
        next.inventory = self.inventory.clone();

        for update in &self.batch_updates {
            if let Some(slot) = next
                .batches
                .iter_mut()
                .find(|b| b.batch_id == update.batch_id)
            {
                *slot = update.clone();
            }
        }
        next.batches.extend(self.new_batches.iter().cloned());

        for holding in &self.holdings {
            match next
                .holdings
                .iter_mut()
                .find(|h| h.buyer_id == holding.buyer_id)
            {
                Some(slot) => *slot = holding.clone(),
                None => next.holdings.push(holding.clone()),
            }
        }

        for entry in &self.entries {
            next.ledger.record(entry);
        }

        next
    }
}
