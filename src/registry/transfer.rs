//! Transfer (Purchase) Processor
//!
//! Moves credits from a project's available pool into a buyer's holding at
//! the currently posted price.

use crate::core_types::{Quantity, TimestampMs, UserId};
use crate::money;

use super::batches::promote_batches;
use super::error::RegistryError;
use super::state::{ChangeSet, ProjectState};
use super::types::{Holding, LedgerEntry};

/// Plan a purchase of `quantity` credits by `buyer_id`.
///
/// The supply check runs against the snapshot the coordinator loaded under
/// the project lock, and the store re-checks the inventory version at commit.
pub fn plan_purchase(
    state: &ProjectState,
    buyer_id: UserId,
    quantity: Quantity,
    now: TimestampMs,
) -> Result<ChangeSet, RegistryError> {
    let inv = &state.inventory;
    if quantity == 0 {
        return Err(RegistryError::InvalidQuantity(
            "purchase quantity must be positive".into(),
        ));
    }
    if !inv.status.is_open() {
        return Err(RegistryError::ProjectSuspended(inv.project_id));
    }
    if inv.available_credits < quantity {
        return Err(RegistryError::InsufficientSupply {
            requested: quantity,
            available: inv.available_credits,
        });
    }

    let price = inv.price_per_credit;
    let value = money::total_value(quantity, price)?;

    let mut holding = state
        .holding(buyer_id)
        .cloned()
        .unwrap_or_else(|| Holding::new(buyer_id, inv.project_id, now));
    holding.avg_price =
        money::weighted_average_price(holding.quantity, holding.avg_price, quantity, price)?;
    holding.quantity = holding
        .quantity
        .checked_add(quantity)
        .ok_or_else(|| RegistryError::InvalidQuantity("holding overflow".into()))?;
    holding.updated_at = now;

    let mut changes = ChangeSet::begin(state, now);
    changes.inventory.available_credits -= quantity;
    changes.upsert_holding(holding);
    changes.append(LedgerEntry::purchase(
        inv.project_id,
        inv.developer_id,
        buyer_id,
        quantity,
        price,
        value,
        now,
    ));
    promote_batches(&mut changes, state, Some(buyer_id), now);

    Ok(changes)
}
