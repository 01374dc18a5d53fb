//! Registry Coordinator
//!
//! Entry point for every registry operation. Each mutation runs as:
//!
//! ```text
//! validate args → lock project → load snapshot → plan ChangeSet
//!   → (issuance) make serials unique → check invariants on post-image
//!   → store.commit (version CAS) → release lock
//! ```
//!
//! A `Conflict` from the lock or the store restarts the whole cycle, up to
//! `max_conflict_retries` times. Invariant failures abort without retry.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{error, info, warn};

use crate::config::RegistryConfig;
use crate::core_types::{ProjectId, Quantity, UserId, now_ms};
use crate::money;

use super::directory::BuyerDirectory;
use super::error::RegistryError;
use super::invariant::{InvariantViolation, check_project};
use super::issuance::IssuanceManager;
use super::locks::ProjectLocks;
use super::retirement::plan_retirement;
use super::state::{ChangeSet, ProjectState};
use super::store::RegistryStore;
use super::transfer::plan_purchase;
use super::types::{
    CreditBatch, Holding, IssueReceipt, LedgerEntryId, LedgerPage, ProjectInventory,
    ProjectRegistration, ProjectStatus,
};

/// One project-scoped mutation, re-planned from fresh state on every attempt
#[derive(Debug, Clone)]
enum Mutation {
    Issue {
        quantity: Quantity,
    },
    Purchase {
        buyer_id: UserId,
        quantity: Quantity,
    },
    Retire {
        buyer_id: UserId,
        quantity: Quantity,
        reason: Option<String>,
    },
    SetPrice(Decimal),
    SetStatus(ProjectStatus),
}

impl Mutation {
    fn name(&self) -> &'static str {
        match self {
            Mutation::Issue { .. } => "issue",
            Mutation::Purchase { .. } => "purchase",
            Mutation::Retire { .. } => "retire",
            Mutation::SetPrice(_) => "set_price",
            Mutation::SetStatus(_) => "set_status",
        }
    }
}

pub struct RegistryCoordinator {
    store: Arc<dyn RegistryStore>,
    buyers: Arc<dyn BuyerDirectory>,
    locks: ProjectLocks,
    issuance: IssuanceManager,
    config: RegistryConfig,
}

impl RegistryCoordinator {
    pub fn new(
        store: Arc<dyn RegistryStore>,
        buyers: Arc<dyn BuyerDirectory>,
        config: RegistryConfig,
    ) -> Self {
        Self {
            store,
            buyers,
            locks: ProjectLocks::new(),
            issuance: IssuanceManager::new(&config),
            config,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    // ========================================================================
    // Write operations
    // ========================================================================

    /// Approval hook: create the inventory with `available = total`.
    pub async fn register_project(
        &self,
        reg: ProjectRegistration,
    ) -> Result<ProjectInventory, RegistryError> {
        if reg.total_credits == 0 {
            return Err(RegistryError::InvalidQuantity(
                "total credits must be positive".into(),
            ));
        }
        money::validate_price(reg.price_per_credit)
            .map_err(|e| RegistryError::InvalidPrice(e.to_string()))?;
        if reg.integrity_score.is_some_and(|s| s.is_sign_negative()) {
            return Err(RegistryError::InvalidParameter(
                "integrity score must not be negative".into(),
            ));
        }

        let _guard = self
            .locks
            .acquire(reg.project_id, self.config.lock_timeout())
            .await?;
        let inventory = ProjectInventory::from_registration(&reg, now_ms());
        check_project(&ProjectState::new(inventory.clone()))?;
        self.store.insert_inventory(&inventory).await?;

        info!(
            project_id = inventory.project_id,
            developer_id = inventory.developer_id,
            vintage = inventory.vintage,
            total_credits = inventory.total_credits,
            price = %inventory.price_per_credit,
            "Project registered"
        );
        Ok(inventory)
    }

    /// Mint `quantity` credits as serialized batches.
    pub async fn issue_credits(
        &self,
        project_id: ProjectId,
        quantity: Quantity,
    ) -> Result<IssueReceipt, RegistryError> {
        if quantity == 0 {
            return Err(RegistryError::InvalidQuantity(
                "issuance quantity must be positive".into(),
            ));
        }
        let changes = self
            .execute(project_id, Mutation::Issue { quantity })
            .await?;
        Ok(IssueReceipt {
            transaction_id: primary_entry_id(&changes)?,
            batch_serials: changes
                .new_batches
                .iter()
                .map(|b| b.serial_number.clone())
                .collect(),
        })
    }

    /// Sell `quantity` credits to `buyer_id` at the posted price.
    pub async fn purchase_credits(
        &self,
        project_id: ProjectId,
        buyer_id: UserId,
        quantity: Quantity,
    ) -> Result<LedgerEntryId, RegistryError> {
        if quantity == 0 {
            return Err(RegistryError::InvalidQuantity(
                "purchase quantity must be positive".into(),
            ));
        }
        self.ensure_buyer(buyer_id).await?;
        let changes = self
            .execute(project_id, Mutation::Purchase { buyer_id, quantity })
            .await?;
        primary_entry_id(&changes)
    }

    /// Permanently retire `quantity` of `buyer_id`'s credits.
    pub async fn retire_credits(
        &self,
        project_id: ProjectId,
        buyer_id: UserId,
        quantity: Quantity,
        reason: Option<String>,
    ) -> Result<LedgerEntryId, RegistryError> {
        if quantity == 0 {
            return Err(RegistryError::InvalidQuantity(
                "retirement quantity must be positive".into(),
            ));
        }
        self.ensure_buyer(buyer_id).await?;
        let changes = self
            .execute(
                project_id,
                Mutation::Retire {
                    buyer_id,
                    quantity,
                    reason,
                },
            )
            .await?;
        primary_entry_id(&changes)
    }

    /// Post a new price for future purchases
    pub async fn update_price(
        &self,
        project_id: ProjectId,
        price: Decimal,
    ) -> Result<ProjectInventory, RegistryError> {
        let price =
            money::validate_price(price).map_err(|e| RegistryError::InvalidPrice(e.to_string()))?;
        let changes = self.execute(project_id, Mutation::SetPrice(price)).await?;
        Ok(changes.inventory)
    }

    /// Approve or suspend a project. Unchanged status commits nothing.
    pub async fn set_project_status(
        &self,
        project_id: ProjectId,
        status: ProjectStatus,
    ) -> Result<ProjectInventory, RegistryError> {
        let current = self.get_inventory(project_id).await?;
        if current.status == status {
            return Ok(current);
        }
        let changes = self
            .execute(project_id, Mutation::SetStatus(status))
            .await?;
        Ok(changes.inventory)
    }

    // ========================================================================
    // Read operations
    // ========================================================================

    pub async fn get_inventory(
        &self,
        project_id: ProjectId,
    ) -> Result<ProjectInventory, RegistryError> {
        self.store
            .get_inventory(project_id)
            .await?
            .ok_or(RegistryError::ProjectNotFound(project_id))
    }

    pub async fn get_holding(
        &self,
        buyer_id: UserId,
        project_id: ProjectId,
    ) -> Result<Holding, RegistryError> {
        if let Some(holding) = self.store.get_holding(buyer_id, project_id).await? {
            return Ok(holding);
        }
        // Distinguish a missing project from a buyer who never bought
        self.get_inventory(project_id).await?;
        Err(RegistryError::HoldingNotFound {
            buyer_id,
            project_id,
        })
    }

    /// Most recent first. `page` is 1-based (0 is treated as 1); `page_size`
    /// is clamped to `1..=max_page_size`.
    pub async fn list_ledger(&self, page: u32, page_size: u32) -> Result<LedgerPage, RegistryError> {
        let page = u64::from(page.max(1));
        let page_size = u64::from(page_size.clamp(1, self.config.max_page_size.max(1)));
        let offset = (page - 1).saturating_mul(page_size);

        let (entries, total) = self.store.list_entries(offset, page_size).await?;
        Ok(LedgerPage { entries, total })
    }

    pub async fn list_batches(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<CreditBatch>, RegistryError> {
        self.get_inventory(project_id).await?;
        self.store.list_batches(project_id).await
    }

    /// Re-run the invariant check against stored state.
    pub async fn verify_project(&self, project_id: ProjectId) -> Result<(), RegistryError> {
        let state = self
            .store
            .load_project(project_id)
            .await?
            .ok_or(RegistryError::ProjectNotFound(project_id))?;
        check_project(&state).map_err(|violation| {
            error!(project_id, %violation, "Stored state violates registry invariants");
            RegistryError::from(violation)
        })
    }

    /// Verify every project; returns the ones that fail.
    pub async fn audit_all(&self) -> Result<Vec<(ProjectId, InvariantViolation)>, RegistryError> {
        let ids = self.store.list_project_ids().await?;
        let mut failures = Vec::new();
        for project_id in &ids {
            match self.verify_project(*project_id).await {
                Ok(()) => {}
                Err(RegistryError::ConsistencyViolation(v)) => failures.push((*project_id, v)),
                Err(e) => return Err(e),
            }
        }
        info!(
            projects = ids.len(),
            violations = failures.len(),
            "Registry audit complete"
        );
        Ok(failures)
    }

    pub async fn health_check(&self) -> Result<(), RegistryError> {
        self.store.health_check().await
    }

    /// Release store resources
    pub async fn shutdown(&self) {
        self.store.close().await;
    }

    // ========================================================================
    // Transaction cycle
    // ========================================================================

    async fn ensure_buyer(&self, buyer_id: UserId) -> Result<(), RegistryError> {
        if self.buyers.is_active_buyer(buyer_id).await? {
            Ok(())
        } else {
            Err(RegistryError::UnknownBuyer(buyer_id))
        }
    }

    async fn execute(
        &self,
        project_id: ProjectId,
        mutation: Mutation,
    ) -> Result<ChangeSet, RegistryError> {
        let mut attempt: u32 = 0;
        loop {
            match self.try_execute(project_id, &mutation).await {
                Err(e) if e.is_retryable() && attempt < self.config.max_conflict_retries => {
                    attempt += 1;
                    warn!(
                        project_id,
                        op = mutation.name(),
                        attempt,
                        error = %e,
                        "Conflict, retrying"
                    );
                    tokio::task::yield_now().await;
                }
                Err(e) if e.is_retryable() => {
                    warn!(
                        project_id,
                        op = mutation.name(),
                        attempts = attempt + 1,
                        "Giving up after repeated conflicts"
                    );
                    return Err(e);
                }
                other => return other,
            }
        }
    }

    async fn try_execute(
        &self,
        project_id: ProjectId,
        mutation: &Mutation,
    ) -> Result<ChangeSet, RegistryError> {
        let _guard = self
            .locks
            .acquire(project_id, self.config.lock_timeout())
            .await?;

        let state = self
            .store
            .load_project(project_id)
            .await?
            .ok_or(RegistryError::ProjectNotFound(project_id))?;
        let now = now_ms();

        let mut changes = match mutation {
            Mutation::Issue { quantity } => self.issuance.plan(&state, *quantity, now)?,
            Mutation::Purchase { buyer_id, quantity } => {
                plan_purchase(&state, *buyer_id, *quantity, now)?
            }
            Mutation::Retire {
                buyer_id,
                quantity,
                reason,
            } => plan_retirement(&state, *buyer_id, *quantity, reason.clone(), now)?,
            Mutation::SetPrice(price) => {
                let mut changes = ChangeSet::begin(&state, now);
                changes.inventory.price_per_credit = *price;
                changes
            }
            Mutation::SetStatus(status) => {
                let mut changes = ChangeSet::begin(&state, now);
                changes.inventory.status = *status;
                changes
            }
        };

        if !changes.new_batches.is_empty() {
            self.issuance
                .assign_unique_serials(self.store.as_ref(), &state, &mut changes.new_batches)
                .await?;
        }

        if let Err(violation) = check_project(&changes.apply(&state)) {
            error!(
                project_id,
                op = mutation.name(),
                %violation,
                "Aborting operation: post-image violates registry invariants"
            );
            return Err(violation.into());
        }

        self.store.commit(&changes).await?;

        info!(
            project_id,
            op = mutation.name(),
            version = changes.inventory.version,
            available = changes.inventory.available_credits,
            retired = changes.inventory.retired_credits,
            batches = changes.new_batches.len(),
            entry = ?changes.primary_entry().map(|e| e.entry_id.to_string()),
            "Committed"
        );
        Ok(changes)
    }
}

fn primary_entry_id(changes: &ChangeSet) -> Result<LedgerEntryId, RegistryError> {
    changes
        .primary_entry()
        .map(|e| e.entry_id)
        .ok_or_else(|| RegistryError::SystemError("committed change set has no ledger entry".into()))
}
