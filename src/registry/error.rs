//! Registry error types

use thiserror::Error;

use crate::core_types::{ProjectId, Quantity, UserId};
use crate::money::MoneyError;

use super::invariant::InvariantViolation;

/// Every failure a registry operation can report
///
/// Precondition failures carry no partial effect. `Conflict` is transient and
/// safe to retry; `ConsistencyViolation` means stored state is corrupt.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Project not found: {0}")]
    ProjectNotFound(ProjectId),

    #[error("Holding not found: buyer={buyer_id} project={project_id}")]
    HoldingNotFound {
        buyer_id: UserId,
        project_id: ProjectId,
    },

    #[error("Unknown buyer: {0}")]
    UnknownBuyer(UserId),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Insufficient supply: requested {requested}, available {available}")]
    InsufficientSupply {
        requested: Quantity,
        available: Quantity,
    },

    #[error("Insufficient holdings: requested {requested}, held {held}")]
    InsufficientHoldings { requested: Quantity, held: Quantity },

    #[error("Issuance capacity exceeded: requested {requested}, remaining {remaining}")]
    CapacityExceeded {
        requested: Quantity,
        remaining: Quantity,
    },

    #[error("Project {0} is suspended")]
    ProjectSuspended(ProjectId),

    #[error("Project already registered: {0}")]
    ProjectExists(ProjectId),

    #[error("Consistency violation: {0}")]
    ConsistencyViolation(#[from] InvariantViolation),

    #[error("Concurrent modification conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("System error: {0}")]
    SystemError(String),
}

impl RegistryError {
    /// Transient; the whole operation may be retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, RegistryError::Conflict(_))
    }
}

impl From<MoneyError> for RegistryError {
    fn from(e: MoneyError) -> Self {
        RegistryError::InvalidQuantity(e.to_string())
    }
}
