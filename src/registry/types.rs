//! Registry Core Types
//!
//! Identifiers, closed status enums with their transition tables, and the
//! four persisted records: inventory, batch, ledger entry, holding.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::core_types::{ProjectId, Quantity, TimestampMs, UserId, Vintage};

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! ulid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(ulid::Ulid);

        impl $name {
            /// Generate a new unique id
            pub fn new() -> Self {
                Self(ulid::Ulid::new())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ulid::DecodeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(ulid::Ulid::from_string(s)?))
            }
        }
    };
}

ulid_id!(
    /// Ledger entry id, also the transaction id returned to callers.
    ///
    /// ULID: no coordination needed, roughly time-ordered. Listing order comes
    /// from the store's append sequence, not from the id.
    LedgerEntryId
);

ulid_id!(
    /// Credit batch primary key (the serial number is the public identifier)
    BatchId
);

// ============================================================================
// Status Enums
// ============================================================================

/// Project lifecycle as reported by the project-management collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i16)]
pub enum ProjectStatus {
    /// Accepting issuance and purchases
    Approved = 1,
    /// Frozen: no new issuance or sales; holders may still retire
    Suspended = 2,
}

impl ProjectStatus {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(ProjectStatus::Approved),
            2 => Some(ProjectStatus::Suspended),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Approved => "APPROVED",
            ProjectStatus::Suspended => "SUSPENDED",
        }
    }

    /// Whether new supply may be minted or sold
    #[inline]
    pub fn is_open(&self) -> bool {
        matches!(self, ProjectStatus::Approved)
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "APPROVED" => Ok(ProjectStatus::Approved),
            "SUSPENDED" => Ok(ProjectStatus::Suspended),
            _ => Err(format!("unknown project status: {}", s)),
        }
    }
}

/// Credit batch lifecycle
///
/// ```text
/// ISSUED ──▶ TRADED ──▶ RETIRED
/// ```
/// No status ever moves backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(i16)]
pub enum BatchStatus {
    Issued = 1,
    Traded = 2,
    Retired = 3,
}

impl BatchStatus {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(BatchStatus::Issued),
            2 => Some(BatchStatus::Traded),
            3 => Some(BatchStatus::Retired),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Issued => "ISSUED",
            BatchStatus::Traded => "TRADED",
            BatchStatus::Retired => "RETIRED",
        }
    }

    /// Transition table: only single forward steps are legal
    pub fn can_transition_to(&self, next: BatchStatus) -> bool {
        matches!(
            (self, next),
            (BatchStatus::Issued, BatchStatus::Traded) | (BatchStatus::Traded, BatchStatus::Retired)
        )
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchStatus::Retired)
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ledger event type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum LedgerEntryType {
    Issuance = 1,
    Purchase = 2,
    Retirement = 3,
}

impl LedgerEntryType {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(LedgerEntryType::Issuance),
            2 => Some(LedgerEntryType::Purchase),
            3 => Some(LedgerEntryType::Retirement),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerEntryType::Issuance => "ISSUANCE",
            LedgerEntryType::Purchase => "PURCHASE",
            LedgerEntryType::Retirement => "RETIREMENT",
        }
    }
}

impl fmt::Display for LedgerEntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ledger entry status
///
/// The coordinator only ever writes `Confirmed`: an entry is appended in the
/// same commit as the mutation it describes. `Pending`/`Failed` exist for
/// rows imported from external settlement systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i16)]
pub enum LedgerStatus {
    Pending = 0,
    Confirmed = 1,
    Failed = 2,
}

impl LedgerStatus {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(LedgerStatus::Pending),
            1 => Some(LedgerStatus::Confirmed),
            2 => Some(LedgerStatus::Failed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerStatus::Pending => "PENDING",
            LedgerStatus::Confirmed => "CONFIRMED",
            LedgerStatus::Failed => "FAILED",
        }
    }

    /// Only confirmed entries count toward aggregates
    #[inline]
    pub fn is_effective(&self) -> bool {
        matches!(self, LedgerStatus::Confirmed)
    }
}

impl fmt::Display for LedgerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Records
// ============================================================================

/// Project registration handed over by the project-management collaborator
/// once a project is approved.
#[derive(Debug, Clone)]
pub struct ProjectRegistration {
    pub project_id: ProjectId,
    pub developer_id: UserId,
    pub vintage: Vintage,
    /// Approved capacity; immutable afterwards
    pub total_credits: Quantity,
    pub price_per_credit: Decimal,
    /// Advisory metadata, never consulted by the ledger core
    pub integrity_score: Option<Decimal>,
}

/// Per-project credit inventory
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectInventory {
    pub project_id: ProjectId,
    pub developer_id: UserId,
    pub vintage: Vintage,
    pub status: ProjectStatus,
    pub total_credits: Quantity,
    pub available_credits: Quantity,
    /// Running sum of every retirement against this project
    pub retired_credits: Quantity,
    pub price_per_credit: Decimal,
    pub integrity_score: Option<Decimal>,
    /// Row version for compare-and-commit; bumped by every committed change
    pub version: u64,
    pub created_at: TimestampMs,
    pub updated_at: TimestampMs,
}

impl ProjectInventory {
    /// Inventory at approval: the whole capacity is available for sale
    pub fn from_registration(reg: &ProjectRegistration, now: TimestampMs) -> Self {
        Self {
            project_id: reg.project_id,
            developer_id: reg.developer_id,
            vintage: reg.vintage,
            status: ProjectStatus::Approved,
            total_credits: reg.total_credits,
            available_credits: reg.total_credits,
            retired_credits: 0,
            price_per_credit: reg.price_per_credit,
            integrity_score: reg.integrity_score,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Credits that have left the available pool through purchases
    #[inline]
    pub fn sold_credits(&self) -> Quantity {
        self.total_credits.saturating_sub(self.available_credits)
    }
}

/// Serialized lot of credits minted by one issuance
#[derive(Debug, Clone, PartialEq)]
pub struct CreditBatch {
    pub batch_id: BatchId,
    pub project_id: ProjectId,
    pub serial_number: String,
    pub vintage: Vintage,
    pub quantity: Quantity,
    pub status: BatchStatus,
    pub owner_id: Option<UserId>,
    pub issued_at: TimestampMs,
    pub retired_at: Option<TimestampMs>,
    pub retired_by_id: Option<UserId>,
}

/// Immutable ledger record
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub entry_id: LedgerEntryId,
    pub entry_type: LedgerEntryType,
    pub project_id: ProjectId,
    pub from_user_id: Option<UserId>,
    pub to_user_id: UserId,
    pub quantity: Quantity,
    pub price_per_credit: Option<Decimal>,
    pub total_value: Option<Decimal>,
    pub status: LedgerStatus,
    /// Retirement claim text
    pub reason: Option<String>,
    /// Opaque display value; not a verifiable hash
    pub chain_hash: String,
    pub created_at: TimestampMs,
}

impl LedgerEntry {
    fn confirmed(
        entry_type: LedgerEntryType,
        project_id: ProjectId,
        from_user_id: Option<UserId>,
        to_user_id: UserId,
        quantity: Quantity,
        now: TimestampMs,
    ) -> Self {
        Self {
            entry_id: LedgerEntryId::new(),
            entry_type,
            project_id,
            from_user_id,
            to_user_id,
            quantity,
            price_per_credit: None,
            total_value: None,
            status: LedgerStatus::Confirmed,
            reason: None,
            chain_hash: display_chain_hash(),
            created_at: now,
        }
    }

    /// Issuance to the project developer
    pub fn issuance(
        project_id: ProjectId,
        developer_id: UserId,
        quantity: Quantity,
        now: TimestampMs,
    ) -> Self {
        Self::confirmed(
            LedgerEntryType::Issuance,
            project_id,
            None,
            developer_id,
            quantity,
            now,
        )
    }

    /// Sale from the developer to a buyer at the posted price
    pub fn purchase(
        project_id: ProjectId,
        developer_id: UserId,
        buyer_id: UserId,
        quantity: Quantity,
        price: Decimal,
        total_value: Decimal,
        now: TimestampMs,
    ) -> Self {
        let mut entry = Self::confirmed(
            LedgerEntryType::Purchase,
            project_id,
            Some(developer_id),
            buyer_id,
            quantity,
            now,
        );
        entry.price_per_credit = Some(price);
        entry.total_value = Some(total_value);
        entry
    }

    /// Retirement claimed by a holder
    pub fn retirement(
        project_id: ProjectId,
        buyer_id: UserId,
        quantity: Quantity,
        reason: Option<String>,
        now: TimestampMs,
    ) -> Self {
        let mut entry = Self::confirmed(
            LedgerEntryType::Retirement,
            project_id,
            None,
            buyer_id,
            quantity,
            now,
        );
        entry.reason = reason;
        entry
    }
}

impl fmt::Display for LedgerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Ledger[{}] {} project={} from={:?} to={} qty={} status={}",
            self.entry_id,
            self.entry_type,
            self.project_id,
            self.from_user_id,
            self.to_user_id,
            self.quantity,
            self.status
        )
    }
}

/// Random display token for the `chain_hash` column
fn display_chain_hash() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Aggregated ownership of one buyer in one project
#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub buyer_id: UserId,
    pub project_id: ProjectId,
    pub quantity: Quantity,
    pub avg_price: Decimal,
    /// Cumulative credits this buyer retired from this project
    pub retired_quantity: Quantity,
    pub updated_at: TimestampMs,
}

impl Holding {
    /// Empty holding, created on first purchase
    pub fn new(buyer_id: UserId, project_id: ProjectId, now: TimestampMs) -> Self {
        Self {
            buyer_id,
            project_id,
            quantity: 0,
            avg_price: Decimal::ZERO,
            retired_quantity: 0,
            updated_at: now,
        }
    }
}

/// Result of a successful issuance
#[derive(Debug, Clone)]
pub struct IssueReceipt {
    pub transaction_id: LedgerEntryId,
    pub batch_serials: Vec<String>,
}

/// One page of the global ledger, most recent first
#[derive(Debug, Clone)]
pub struct LedgerPage {
    pub entries: Vec<LedgerEntry>,
    /// Total entries across all pages
    pub total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_id_roundtrip() {
        for s in [BatchStatus::Issued, BatchStatus::Traded, BatchStatus::Retired] {
            assert_eq!(BatchStatus::from_id(s.id()), Some(s));
        }
        for t in [
            LedgerEntryType::Issuance,
            LedgerEntryType::Purchase,
            LedgerEntryType::Retirement,
        ] {
            assert_eq!(LedgerEntryType::from_id(t.id()), Some(t));
        }
        assert_eq!(BatchStatus::from_id(0), None);
        assert_eq!(LedgerStatus::from_id(9), None);
        assert_eq!(ProjectStatus::from_id(3), None);
    }

    #[test]
    fn test_batch_transition_table_is_forward_only() {
        use BatchStatus::*;
        assert!(Issued.can_transition_to(Traded));
        assert!(Traded.can_transition_to(Retired));

        assert!(!Issued.can_transition_to(Retired)); // must pass through TRADED
        assert!(!Traded.can_transition_to(Issued));
        assert!(!Retired.can_transition_to(Traded));
        assert!(!Retired.can_transition_to(Issued));
        assert!(!Issued.can_transition_to(Issued));
        assert!(Retired.is_terminal());
    }

    #[test]
    fn test_project_status_parse() {
        assert_eq!("approved".parse::<ProjectStatus>(), Ok(ProjectStatus::Approved));
        assert_eq!("SUSPENDED".parse::<ProjectStatus>(), Ok(ProjectStatus::Suspended));
        assert!("closed".parse::<ProjectStatus>().is_err());
        assert!(ProjectStatus::Approved.is_open());
        assert!(!ProjectStatus::Suspended.is_open());
    }

    #[test]
    fn test_inventory_from_registration() {
        let reg = ProjectRegistration {
            project_id: 7,
            developer_id: 900,
            vintage: 2023,
            total_credits: 10_000,
            price_per_credit: Decimal::from(100),
            integrity_score: None,
        };
        let inv = ProjectInventory::from_registration(&reg, 1_000);
        assert_eq!(inv.available_credits, 10_000);
        assert_eq!(inv.retired_credits, 0);
        assert_eq!(inv.sold_credits(), 0);
        assert_eq!(inv.status, ProjectStatus::Approved);
        assert_eq!(inv.version, 1);
    }

    #[test]
    fn test_ledger_entry_constructors() {
        let issue = LedgerEntry::issuance(1, 900, 500, 10);
        assert_eq!(issue.entry_type, LedgerEntryType::Issuance);
        assert!(issue.from_user_id.is_none());
        assert_eq!(issue.to_user_id, 900);
        assert_eq!(issue.status, LedgerStatus::Confirmed);

        let buy = LedgerEntry::purchase(1, 900, 42, 5, Decimal::from(10), Decimal::from(50), 11);
        assert_eq!(buy.from_user_id, Some(900));
        assert_eq!(buy.total_value, Some(Decimal::from(50)));

        let retire = LedgerEntry::retirement(1, 42, 5, Some("2024 scope 1".into()), 12);
        assert!(retire.from_user_id.is_none());
        assert_eq!(retire.reason.as_deref(), Some("2024 scope 1"));

        assert_ne!(issue.entry_id, buy.entry_id);
        assert_ne!(issue.chain_hash, buy.chain_hash);
        assert_eq!(issue.chain_hash.len(), 32);
    }

    #[test]
    fn test_entry_id_parse_roundtrip() {
        let id = LedgerEntryId::new();
        let parsed: LedgerEntryId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-ulid".parse::<LedgerEntryId>().is_err());
    }
}
