//! Batch status promotion
//!
//! Credits are fungible inside a project, so a batch is not tied to a buyer
//! at transfer time. Instead batches are walked in issuance order against
//! the project's cumulative sold and retired quantities: a batch whose whole
//! range is covered by sales becomes TRADED, by retirements RETIRED.

use crate::core_types::{Quantity, TimestampMs, UserId};

use super::state::{ChangeSet, ProjectState};
use super::types::{BatchStatus, CreditBatch};

/// Highest status the coverage watermarks allow for a batch ending at `end`
fn target_status(end: Quantity, sold: Quantity, retired: Quantity) -> BatchStatus {
    if end <= retired {
        BatchStatus::Retired
    } else if end <= sold {
        BatchStatus::Traded
    } else {
        BatchStatus::Issued
    }
}

/// Step `batch` forward through the transition table up to `target`.
/// Returns whether anything changed.
fn advance(
    batch: &mut CreditBatch,
    target: BatchStatus,
    actor: Option<UserId>,
    now: TimestampMs,
) -> bool {
    let mut changed = false;
    while batch.status < target {
        let next = match batch.status {
            BatchStatus::Issued => BatchStatus::Traded,
            BatchStatus::Traded => BatchStatus::Retired,
            BatchStatus::Retired => break,
        };
        debug_assert!(batch.status.can_transition_to(next));

        match next {
            BatchStatus::Traded => {
                if batch.owner_id.is_none() {
                    batch.owner_id = actor;
                }
            }
            BatchStatus::Retired => {
                batch.retired_at = Some(now);
                batch.retired_by_id = actor;
            }
            BatchStatus::Issued => {}
        }
        batch.status = next;
        changed = true;
    }
    changed
}

/// Promote existing and newly minted batches to match the change set's
/// inventory post-image. `actor` is the buyer of the current purchase or
/// retirement, if any.
pub fn promote_batches(
    changes: &mut ChangeSet,
    state: &ProjectState,
    actor: Option<UserId>,
    now: TimestampMs,
) {
    let sold = changes.inventory.sold_credits();
    let retired = changes.inventory.retired_credits;
    let mut end: Quantity = 0;

    for batch in &state.batches {
        end = end.saturating_add(batch.quantity);
        let target = target_status(end, sold, retired);
        if batch.status >= target {
            continue;
        }
        let mut updated = batch.clone();
        if advance(&mut updated, target, actor, now) {
            changes.batch_updates.push(updated);
        }
    }

    for batch in &mut changes.new_batches {
        end = end.saturating_add(batch.quantity);
        let target = target_status(end, sold, retired);
        advance(batch, target, actor, now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::types::{BatchId, ProjectInventory, ProjectRegistration};
    use rust_decimal::Decimal;

    fn batch(serial: &str, qty: Quantity) -> CreditBatch {
        CreditBatch {
            batch_id: BatchId::new(),
            project_id: 1,
            serial_number: serial.to_string(),
            vintage: 2020,
            quantity: qty,
            status: BatchStatus::Issued,
            owner_id: None,
            issued_at: 0,
            retired_at: None,
            retired_by_id: None,
        }
    }

    fn state_with(batches: Vec<CreditBatch>) -> ProjectState {
        let reg = ProjectRegistration {
            project_id: 1,
            developer_id: 900,
            vintage: 2020,
            total_credits: 1_000,
            price_per_credit: Decimal::ONE,
            integrity_score: None,
        };
        let mut s = ProjectState::new(ProjectInventory::from_registration(&reg, 0));
        s.batches = batches;
        s
    }

    #[test]
    fn test_only_fully_covered_batches_promote() {
        let s = state_with(vec![batch("A", 100), batch("B", 100)]);
        let mut cs = ChangeSet::begin(&s, 7);
        cs.inventory.available_credits = 850; // sold 150

        promote_batches(&mut cs, &s, Some(42), 7);

        assert_eq!(cs.batch_updates.len(), 1);
        assert_eq!(cs.batch_updates[0].serial_number, "A");
        assert_eq!(cs.batch_updates[0].status, BatchStatus::Traded);
        assert_eq!(cs.batch_updates[0].owner_id, Some(42));
    }

    #[test]
    fn test_retirement_steps_through_traded() {
        let mut a = batch("A", 100);
        a.status = BatchStatus::Traded;
        a.owner_id = Some(42);
        let s = state_with(vec![a]);
        let mut cs = ChangeSet::begin(&s, 9);
        cs.inventory.available_credits = 900;
        cs.inventory.retired_credits = 100;

        promote_batches(&mut cs, &s, Some(43), 9);

        let updated = &cs.batch_updates[0];
        assert_eq!(updated.status, BatchStatus::Retired);
        assert_eq!(updated.owner_id, Some(42));
        assert_eq!(updated.retired_by_id, Some(43));
        assert_eq!(updated.retired_at, Some(9));
    }

    #[test]
    fn test_new_batches_issued_after_sales_start_traded() {
        let s = state_with(vec![]);
        let mut cs = ChangeSet::begin(&s, 3);
        cs.inventory.available_credits = 700; // 300 sold before anything was minted
        cs.new_batches = vec![batch("A", 200), batch("B", 200)];

        promote_batches(&mut cs, &s, None, 3);

        assert_eq!(cs.new_batches[0].status, BatchStatus::Traded);
        assert_eq!(cs.new_batches[0].owner_id, None);
        assert_eq!(cs.new_batches[1].status, BatchStatus::Issued);
        assert!(cs.batch_updates.is_empty());
    }
}
