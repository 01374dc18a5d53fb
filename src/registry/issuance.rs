//! Issuance Manager
//!
//! Mints credit batches against a project's approved capacity. Issuance does
//! not touch `available_credits`: supply is fixed when the project is
//! approved, batches only make that supply traceable.

use std::collections::HashSet;

use tracing::debug;

use crate::config::RegistryConfig;
use crate::core_types::{ProjectId, Quantity, TimestampMs, Vintage};

use super::batches::promote_batches;
use super::error::RegistryError;
use super::state::{ChangeSet, ProjectState};
use super::store::BatchRepository;
use super::types::{BatchId, BatchStatus, CreditBatch, LedgerEntry};

/// Probes per batch before giving up on finding a free serial
const MAX_SERIAL_PROBES: usize = 1_000;

/// Split `total` into at most `max_batches` parts of roughly `batch_size`.
///
/// The remainder is spread one credit at a time over the leading batches,
/// so parts differ by at most one and always sum to `total`.
pub fn split_quantity(total: Quantity, batch_size: Quantity, max_batches: usize) -> Vec<Quantity> {
    if total == 0 {
        return Vec::new();
    }
    let batch_size = batch_size.max(1);
    let max_batches = max_batches.max(1) as u64;

    let wanted = total.div_ceil(batch_size);
    let count = wanted.clamp(1, max_batches);
    let base = total / count;
    let remainder = total % count;

    (0..count)
        .map(|i| if i < remainder { base + 1 } else { base })
        .collect()
}

/// `PREFIX-PPPPPP-VVVV-NNNNNN`, e.g. `CCR-000042-2023-000001`
pub fn format_serial(prefix: &str, project_id: ProjectId, vintage: Vintage, seq: u64) -> String {
    format!("{}-{:06}-{:04}-{:06}", prefix, project_id, vintage, seq)
}

/// Issuance planner
#[derive(Debug, Clone)]
pub struct IssuanceManager {
    max_batches: usize,
    batch_size: Quantity,
    serial_prefix: String,
}

impl IssuanceManager {
    pub fn new(config: &RegistryConfig) -> Self {
        Self {
            max_batches: config.max_batches_per_issuance,
            batch_size: config.batch_size,
            serial_prefix: config.serial_prefix.clone(),
        }
    }

    /// Plan the batches and ledger entry for issuing `quantity` credits.
    ///
    /// Serials are provisional (per-project sequence); run
    /// [`IssuanceManager::assign_unique_serials`] before commit.
    pub fn plan(
        &self,
        state: &ProjectState,
        quantity: Quantity,
        now: TimestampMs,
    ) -> Result<ChangeSet, RegistryError> {
        let inv = &state.inventory;
        if quantity == 0 {
            return Err(RegistryError::InvalidQuantity(
                "issuance quantity must be positive".into(),
            ));
        }
        if !inv.status.is_open() {
            return Err(RegistryError::ProjectSuspended(inv.project_id));
        }

        let remaining = inv.total_credits.saturating_sub(state.issued_credits());
        if quantity > remaining {
            return Err(RegistryError::CapacityExceeded {
                requested: quantity,
                remaining,
            });
        }

        let first_seq = state.batches.len() as u64 + 1;
        let mut changes = ChangeSet::begin(state, now);
        changes.new_batches = split_quantity(quantity, self.batch_size, self.max_batches)
            .into_iter()
            .enumerate()
            .map(|(i, qty)| CreditBatch {
                batch_id: BatchId::new(),
                project_id: inv.project_id,
                serial_number: format_serial(
                    &self.serial_prefix,
                    inv.project_id,
                    inv.vintage,
                    first_seq + i as u64,
                ),
                vintage: inv.vintage,
                quantity: qty,
                status: BatchStatus::Issued,
                owner_id: None,
                issued_at: now,
                retired_at: None,
                retired_by_id: None,
            })
            .collect();
        changes.append(LedgerEntry::issuance(
            inv.project_id,
            inv.developer_id,
            quantity,
            now,
        ));

        // Sales may already have drawn on approved supply ahead of minting
        promote_batches(&mut changes, state, None, now);

        Ok(changes)
    }

    /// Replace any provisional serial that already exists in this project or
    /// anywhere in the store with the next free sequence number.
    pub async fn assign_unique_serials<R: BatchRepository + ?Sized>(
        &self,
        repo: &R,
        state: &ProjectState,
        batches: &mut [CreditBatch],
    ) -> Result<(), RegistryError> {
        let mut taken: HashSet<String> = state
            .batches
            .iter()
            .map(|b| b.serial_number.clone())
            .collect();
        let mut next_seq = (state.batches.len() + batches.len()) as u64 + 1;

        for batch in batches.iter_mut() {
            let mut probes = 0;
            while taken.contains(&batch.serial_number)
                || repo.serial_exists(&batch.serial_number).await?
            {
                probes += 1;
                if probes > MAX_SERIAL_PROBES {
                    return Err(RegistryError::Conflict(format!(
                        "no free serial for project {}",
                        batch.project_id
                    )));
                }
                let replacement =
                    format_serial(&self.serial_prefix, batch.project_id, batch.vintage, next_seq);
                debug!(
                    project_id = batch.project_id,
                    taken = %batch.serial_number,
                    replacement = %replacement,
                    "Serial collision, re-sequencing batch"
                );
                batch.serial_number = replacement;
                next_seq += 1;
            }
            taken.insert(batch.serial_number.clone());
        }

        Ok(())
    }
}
