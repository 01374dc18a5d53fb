//! Retirement Processor
//!
//! Permanently removes credits from a holder's position. Retired credits
//! never flow back into `available_credits` or any holding.

use crate::core_types::{Quantity, TimestampMs, UserId};

use super::batches::promote_batches;
use super::error::RegistryError;
use super::state::{ChangeSet, ProjectState};
use super::types::LedgerEntry;

/// Plan retiring `quantity` credits out of `buyer_id`'s holding.
///
/// Allowed on suspended projects: credits already owned stay claimable.
pub fn plan_retirement(
    state: &ProjectState,
    buyer_id: UserId,
    quantity: Quantity,
    reason: Option<String>,
    now: TimestampMs,
) -> Result<ChangeSet, RegistryError> {
    let project_id = state.project_id();
    if quantity == 0 {
        return Err(RegistryError::InvalidQuantity(
            "retirement quantity must be positive".into(),
        ));
    }

    let current = state
        .holding(buyer_id)
        .ok_or(RegistryError::HoldingNotFound {
            buyer_id,
            project_id,
        })?;
    if current.quantity < quantity {
        return Err(RegistryError::InsufficientHoldings {
            requested: quantity,
            held: current.quantity,
        });
    }

    let mut holding = current.clone();
    holding.quantity -= quantity;
    holding.retired_quantity = holding
        .retired_quantity
        .checked_add(quantity)
        .ok_or_else(|| RegistryError::InvalidQuantity("retired overflow".into()))?;
    holding.updated_at = now;

    let mut changes = ChangeSet::begin(state, now);
    changes.inventory.retired_credits = changes
        .inventory
        .retired_credits
        .checked_add(quantity)
        .ok_or_else(|| RegistryError::InvalidQuantity("retired overflow".into()))?;
    changes.upsert_holding(holding);

    let reason = reason.filter(|r| !r.trim().is_empty());
    changes.append(LedgerEntry::retirement(
        project_id, buyer_id, quantity, reason, now,
    ));
    promote_batches(&mut changes, state, Some(buyer_id), now);

    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::invariant::check_project;
    use crate::registry::transfer::plan_purchase;
    use crate::registry::types::{
        LedgerEntryType, ProjectInventory, ProjectRegistration, ProjectStatus,
    };
    use rust_decimal::Decimal;

    fn state_with_holding() -> ProjectState {
        let reg = ProjectRegistration {
            project_id: 5,
            developer_id: 900,
            vintage: 2022,
            total_credits: 10_000,
            price_per_credit: Decimal::from(100),
            integrity_score: None,
        };
        let s = ProjectState::new(ProjectInventory::from_registration(&reg, 0));
        plan_purchase(&s, 1, 5_000, 1).unwrap().apply(&s)
    }

    #[test]
    fn test_retire_decrements_holding_not_supply() {
        let s = state_with_holding();
        let cs = plan_retirement(&s, 1, 2_000, Some("FY24 offset".into()), 2).unwrap();

        assert_eq!(cs.holdings[0].quantity, 3_000);
        assert_eq!(cs.holdings[0].retired_quantity, 2_000);
        assert_eq!(cs.holdings[0].avg_price, Decimal::from(100));
        assert_eq!(cs.inventory.available_credits, 5_000);
        assert_eq!(cs.inventory.retired_credits, 2_000);

        let entry = cs.primary_entry().unwrap();
        assert_eq!(entry.entry_type, LedgerEntryType::Retirement);
        assert!(entry.from_user_id.is_none());
        assert_eq!(entry.reason.as_deref(), Some("FY24 offset"));

        assert_eq!(check_project(&cs.apply(&s)), Ok(()));
    }

    #[test]
    fn test_retire_more_than_held() {
        let s = state_with_holding();
        assert!(matches!(
            plan_retirement(&s, 1, 5_001, None, 2),
            Err(RegistryError::InsufficientHoldings {
                requested: 5_001,
                held: 5_000
            })
        ));
    }

    #[test]
    fn test_retire_without_holding() {
        let s = state_with_holding();
        assert!(matches!(
            plan_retirement(&s, 2, 1, None, 2),
            Err(RegistryError::HoldingNotFound {
                buyer_id: 2,
                project_id: 5
            })
        ));
    }

    #[test]
    fn test_retire_allowed_on_suspended_project() {
        let mut s = state_with_holding();
        s.inventory.status = ProjectStatus::Suspended;
        let cs = plan_retirement(&s, 1, 10, Some("   ".into()), 3).unwrap();
        assert!(cs.primary_entry().unwrap().reason.is_none());
    }
}
