//! Carbon Credit Registry
//!
//! Tracks approved carbon-offset projects, the serialized credit batches
//! minted against them, per-buyer holdings, and an append-only ledger of
//! issuance, purchase and retirement transactions.
//!
//! # Architecture
//!
//! ```text
//!            RegistryCoordinator
//!   (project lock, retry on Conflict, invariant gate)
//!         │             │              │
//!   IssuanceManager  plan_purchase  plan_retirement     ← pure planners
//!         └─────────────┼──────────────┘
//!                   ChangeSet
//!                       │
//!               RegistryStore::commit                   ← all-or-nothing
//!           (MemoryStore | PgStore)
//! ```
//!
//! # Safety Invariants
//!
//! Per project, after every committed operation:
//!
//! 1. `available + Σ holding.quantity + retired == total`
//! 2. `Σ batch.quantity <= total`
//! 3. Ledger sums match: issued = Σ batches, purchased = total − available,
//!    retired = retired credits
//! 4. Serial numbers are globally unique; batch status only moves forward
//!    (issued → traded → retired)

pub mod batches;
pub mod coordinator;
pub mod directory;
pub mod error;
pub mod invariant;
pub mod issuance;
pub mod locks;
pub mod retirement;
pub mod state;
pub mod store;
pub mod transfer;
pub mod types;


// Re-exports for convenience
pub use coordinator::RegistryCoordinator;
pub use directory::{BuyerDirectory, OpenDirectory, PgBuyerDirectory, StaticDirectory};
pub use error::RegistryError;
pub use invariant::InvariantViolation;
pub use store::{MemoryStore, PgStore, RegistryStore};
pub use types::{
    BatchId, BatchStatus, CreditBatch, Holding, IssueReceipt, LedgerEntry, LedgerEntryId,
    LedgerEntryType, LedgerPage, LedgerStatus, ProjectInventory, ProjectRegistration,
    ProjectStatus,
};
