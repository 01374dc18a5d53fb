//! Registry Invariant Check
//!
//! Pure function over a [`ProjectState`]; independent of any storage backend.
//! The coordinator runs it on every post-image before commit and
//! [`check_project`] doubles as the audit used at start-up.
//!
//! Checked relations (issuance does not change available supply):
//!
//! ```text
//! total     = available + Σ holding.quantity + retired
//! retired   = Σ holding.retired_quantity
//! Σ batch   ≤ total
//! ledger    : issued = Σ batch, purchased = total - available, retired = retired
//! batches   : Σ RETIRED ≤ retired, Σ (TRADED|RETIRED) ≤ total - available
//! ```

use std::collections::HashSet;

use thiserror::Error;

use crate::core_types::{ProjectId, Quantity, UserId};

use super::state::ProjectState;
use super::types::{BatchStatus, LedgerEntryType};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum InvariantViolation {
    #[error("project {project_id}: available {available} exceeds total {total}")]
    AvailableExceedsTotal {
        project_id: ProjectId,
        available: Quantity,
        total: Quantity,
    },

    #[error(
        "project {project_id}: total {total} != available {available} + held {held} + retired {retired}"
    )]
    Conservation {
        project_id: ProjectId,
        total: Quantity,
        available: Quantity,
        held: Quantity,
        retired: Quantity,
    },

    #[error("project {project_id}: retired counter {counter} != holder retirements {holders}")]
    RetiredMismatch {
        project_id: ProjectId,
        counter: Quantity,
        holders: Quantity,
    },

    #[error("project {project_id}: issued {issued} exceeds total {total}")]
    OverIssued {
        project_id: ProjectId,
        issued: Quantity,
        total: Quantity,
    },

    #[error("project {project_id}: ledger {entry_type} sum {ledger} != {expected}")]
    LedgerMismatch {
        project_id: ProjectId,
        entry_type: LedgerEntryType,
        ledger: Quantity,
        expected: Quantity,
    },

    #[error("project {project_id}: {status} batches cover {covered}, only {limit} supported")]
    BatchStatusAhead {
        project_id: ProjectId,
        status: BatchStatus,
        covered: Quantity,
        limit: Quantity,
    },

    #[error("duplicate batch serial {0}")]
    DuplicateSerial(String),

    #[error("project {project_id}: empty batch {serial}")]
    EmptyBatch {
        project_id: ProjectId,
        serial: String,
    },

    #[error("project {project_id}: duplicate holding for buyer {buyer_id}")]
    DuplicateHolding {
        project_id: ProjectId,
        buyer_id: UserId,
    },

    #[error("project {project_id}: record belongs to project {found}")]
    ForeignRecord {
        project_id: ProjectId,
        found: ProjectId,
    },

    #[error("project {project_id}: quantity overflow")]
    Overflow { project_id: ProjectId },
}

/// Validate every cross-entity relation for one project
pub fn check_project(state: &ProjectState) -> Result<(), InvariantViolation> {
    let inv = &state.inventory;
    let project_id = inv.project_id;
    let overflow = || InvariantViolation::Overflow { project_id };

    if inv.available_credits > inv.total_credits {
        return Err(InvariantViolation::AvailableExceedsTotal {
            project_id,
            available: inv.available_credits,
            total: inv.total_credits,
        });
    }

    // Holdings
    let mut buyers = HashSet::with_capacity(state.holdings.len());
    let mut held: Quantity = 0;
    let mut holder_retired: Quantity = 0;
    for h in &state.holdings {
        if h.project_id != project_id {
            return Err(InvariantViolation::ForeignRecord {
                project_id,
                found: h.project_id,
            });
        }
        if !buyers.insert(h.buyer_id) {
            return Err(InvariantViolation::DuplicateHolding {
                project_id,
                buyer_id: h.buyer_id,
            });
        }
        held = held.checked_add(h.quantity).ok_or_else(overflow)?;
        holder_retired = holder_retired
            .checked_add(h.retired_quantity)
            .ok_or_else(overflow)?;
    }

    if inv.retired_credits != holder_retired {
        return Err(InvariantViolation::RetiredMismatch {
            project_id,
            counter: inv.retired_credits,
            holders: holder_retired,
        });
    }

    let accounted = inv
        .available_credits
        .checked_add(held)
        .and_then(|v| v.checked_add(inv.retired_credits))
        .ok_or_else(overflow)?;
    if accounted != inv.total_credits {
        return Err(InvariantViolation::Conservation {
            project_id,
            total: inv.total_credits,
            available: inv.available_credits,
            held,
            retired: inv.retired_credits,
        });
    }

    // Batches
    let mut serials = HashSet::with_capacity(state.batches.len());
    let mut issued: Quantity = 0;
    let mut traded_or_retired: Quantity = 0;
    let mut retired_batches: Quantity = 0;
    for b in &state.batches {
        if b.project_id != project_id {
            return Err(InvariantViolation::ForeignRecord {
                project_id,
                found: b.project_id,
            });
        }
        if b.quantity == 0 {
            return Err(InvariantViolation::EmptyBatch {
                project_id,
                serial: b.serial_number.clone(),
            });
        }
        if !serials.insert(b.serial_number.as_str()) {
            return Err(InvariantViolation::DuplicateSerial(b.serial_number.clone()));
        }
        issued = issued.checked_add(b.quantity).ok_or_else(overflow)?;
        match b.status {
            BatchStatus::Issued => {}
            BatchStatus::Traded => {
                traded_or_retired = traded_or_retired
                    .checked_add(b.quantity)
                    .ok_or_else(overflow)?;
            }
            BatchStatus::Retired => {
                traded_or_retired = traded_or_retired
                    .checked_add(b.quantity)
                    .ok_or_else(overflow)?;
                retired_batches = retired_batches
                    .checked_add(b.quantity)
                    .ok_or_else(overflow)?;
            }
        }
    }

    if issued > inv.total_credits {
        return Err(InvariantViolation::OverIssued {
            project_id,
            issued,
            total: inv.total_credits,
        });
    }

    let sold = inv.total_credits - inv.available_credits;
    if traded_or_retired > sold {
        return Err(InvariantViolation::BatchStatusAhead {
            project_id,
            status: BatchStatus::Traded,
            covered: traded_or_retired,
            limit: sold,
        });
    }
    if retired_batches > inv.retired_credits {
        return Err(InvariantViolation::BatchStatusAhead {
            project_id,
            status: BatchStatus::Retired,
            covered: retired_batches,
            limit: inv.retired_credits,
        });
    }

    // Ledger is the system of record: incremental aggregates must agree with it
    let ledger_checks = [
        (LedgerEntryType::Issuance, state.ledger.issued, issued),
        (LedgerEntryType::Purchase, state.ledger.purchased, sold),
        (
            LedgerEntryType::Retirement,
            state.ledger.retired,
            inv.retired_credits,
        ),
    ];
    for (entry_type, ledger, expected) in ledger_checks {
        if ledger != expected {
            return Err(InvariantViolation::LedgerMismatch {
                project_id,
                entry_type,
                ledger,
                expected,
            });
        }
    }

    Ok(())
}
