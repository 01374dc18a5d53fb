//! Gateway request/response types
//!
//! - `ApiResponse<T>`: unified `{code, msg, data}` envelope
//! - `ApiError`: registry errors mapped to HTTP status + error code
//! - Request and response DTOs. Quantities and prices cross the wire as
//!   strings so clients never round-trip them through floats.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::core_types::{ProjectId, TimestampMs, UserId, Vintage};
use crate::money::{self, MoneyError};
use crate::registry::{
    CreditBatch, Holding, IssueReceipt, LedgerEntry, LedgerPage, ProjectInventory, RegistryError,
};

// ============================================================================
// Unified API Response Format
// ============================================================================

/// Unified API response wrapper
///
/// - code: 0 = success, non-zero = error code
/// - msg: short message description
/// - data: actual data (success) or absent (error)
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Create success response
    pub fn success(data: T) -> Self {
        Self {
            code: error_codes::SUCCESS,
            msg: "ok".to_string(),
            data: Some(data),
        }
    }

    /// Create error response
    pub fn error(code: i32, msg: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            code,
            msg: msg.into(),
            data: None,
        }
    }
}

/// Standard API error codes
pub mod error_codes {
    pub const SUCCESS: i32 = 0;

    // Client errors (1xxx)
    pub const INVALID_PARAMETER: i32 = 1001;
    pub const INVALID_QUANTITY: i32 = 1002;
    pub const INVALID_PRICE: i32 = 1003;

    // Business rule rejections (3xxx)
    pub const INSUFFICIENT_SUPPLY: i32 = 3001;
    pub const INSUFFICIENT_HOLDINGS: i32 = 3002;
    pub const CAPACITY_EXCEEDED: i32 = 3003;
    pub const PROJECT_SUSPENDED: i32 = 3004;
    pub const PROJECT_EXISTS: i32 = 3005;

    // Resource errors (4xxx)
    pub const PROJECT_NOT_FOUND: i32 = 4001;
    pub const HOLDING_NOT_FOUND: i32 = 4002;
    pub const BUYER_NOT_FOUND: i32 = 4003;

    // Server errors (5xxx)
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const SERVICE_UNAVAILABLE: i32 = 5001;
    pub const CONSISTENCY_VIOLATION: i32 = 5002;
}

// ============================================================================
// Errors
// ============================================================================

/// Handler error: rendered as `ApiResponse<()>` with an HTTP status
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: i32,
    pub msg: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: i32, msg: impl Into<String>) -> Self {
        Self {
            status,
            code,
            msg: msg.into(),
        }
    }

    pub fn bad_request(code: i32, msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, msg)
    }

    pub fn invalid_quantity(e: MoneyError) -> Self {
        Self::bad_request(error_codes::INVALID_QUANTITY, e.to_string())
    }

    pub fn invalid_price(e: MoneyError) -> Self {
        Self::bad_request(error_codes::INVALID_PRICE, e.to_string())
    }

    pub fn into_err<T>(self) -> Result<T, ApiError> {
        Err(self)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ApiResponse::<()>::error(self.code, self.msg)),
        )
            .into_response()
    }
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        use error_codes::*;

        let msg = e.to_string();
        match e {
            RegistryError::ProjectNotFound(_) => {
                Self::new(StatusCode::NOT_FOUND, PROJECT_NOT_FOUND, msg)
            }
            RegistryError::HoldingNotFound { .. } => {
                Self::new(StatusCode::NOT_FOUND, HOLDING_NOT_FOUND, msg)
            }
            RegistryError::UnknownBuyer(_) => Self::new(StatusCode::NOT_FOUND, BUYER_NOT_FOUND, msg),
            RegistryError::InvalidParameter(_) => Self::bad_request(INVALID_PARAMETER, msg),
            RegistryError::InvalidQuantity(_) => Self::bad_request(INVALID_QUANTITY, msg),
            RegistryError::InvalidPrice(_) => Self::bad_request(INVALID_PRICE, msg),
            RegistryError::InsufficientSupply { .. } => Self::bad_request(INSUFFICIENT_SUPPLY, msg),
            RegistryError::InsufficientHoldings { .. } => {
                Self::bad_request(INSUFFICIENT_HOLDINGS, msg)
            }
            RegistryError::CapacityExceeded { .. } => Self::bad_request(CAPACITY_EXCEEDED, msg),
            RegistryError::ProjectSuspended(_) => Self::bad_request(PROJECT_SUSPENDED, msg),
            RegistryError::ProjectExists(_) => Self::bad_request(PROJECT_EXISTS, msg),
            RegistryError::Conflict(_) => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                SERVICE_UNAVAILABLE,
                "registry busy, retry later",
            ),
            RegistryError::ConsistencyViolation(_) => {
                tracing::error!(error = %msg, "Request aborted by consistency check");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    CONSISTENCY_VIOLATION,
                    "consistency violation",
                )
            }
            RegistryError::Database(_) | RegistryError::SystemError(_) => {
                tracing::error!(error = %msg, "Request failed with internal error");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    INTERNAL_ERROR,
                    "internal error",
                )
            }
        }
    }
}

pub type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

/// 200 with `data`
pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok((StatusCode::OK, Json(ApiResponse::success(data))))
}

/// 201 with `data`
pub fn created<T>(data: T) -> ApiResult<T> {
    Ok((StatusCode::CREATED, Json(ApiResponse::success(data))))
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterProjectRequest {
    pub project_id: ProjectId,
    pub developer_id: UserId,
    pub vintage: Vintage,
    pub total_credits: String,
    pub price_per_credit: String,
    #[serde(default)]
    pub integrity_score: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IssueRequest {
    pub quantity: String,
}

#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    pub buyer_id: UserId,
    pub quantity: String,
}

#[derive(Debug, Deserialize)]
pub struct RetireRequest {
    pub buyer_id: UserId,
    pub quantity: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePriceRequest {
    pub price_per_credit: String,
}

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    /// `approved` or `suspended`
    pub status: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct LedgerQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub timestamp_ms: TimestampMs,
    pub build: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InventoryData {
    pub project_id: ProjectId,
    pub developer_id: UserId,
    pub vintage: Vintage,
    pub status: String,
    pub total_credits: String,
    pub available_credits: String,
    pub retired_credits: String,
    pub price_per_credit: String,
    pub integrity_score: Option<String>,
    pub updated_at: TimestampMs,
}

impl From<&ProjectInventory> for InventoryData {
    fn from(inv: &ProjectInventory) -> Self {
        Self {
            project_id: inv.project_id,
            developer_id: inv.developer_id,
            vintage: inv.vintage,
            status: inv.status.as_str().to_string(),
            total_credits: inv.total_credits.to_string(),
            available_credits: inv.available_credits.to_string(),
            retired_credits: inv.retired_credits.to_string(),
            price_per_credit: money::format_price(inv.price_per_credit),
            integrity_score: inv.integrity_score.map(|s| s.normalize().to_string()),
            updated_at: inv.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IssueData {
    pub transaction_id: String,
    pub batch_serials: Vec<String>,
}

impl From<IssueReceipt> for IssueData {
    fn from(receipt: IssueReceipt) -> Self {
        Self {
            transaction_id: receipt.transaction_id.to_string(),
            batch_serials: receipt.batch_serials,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionData {
    pub transaction_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HoldingData {
    pub buyer_id: UserId,
    pub project_id: ProjectId,
    pub quantity: String,
    pub avg_price: String,
    pub retired_quantity: String,
}

impl From<&Holding> for HoldingData {
    fn from(h: &Holding) -> Self {
        Self {
            buyer_id: h.buyer_id,
            project_id: h.project_id,
            quantity: h.quantity.to_string(),
            avg_price: money::format_price(h.avg_price),
            retired_quantity: h.retired_quantity.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchData {
    pub serial_number: String,
    pub vintage: Vintage,
    pub quantity: String,
    pub status: String,
    pub owner_id: Option<UserId>,
    pub issued_at: TimestampMs,
    pub retired_at: Option<TimestampMs>,
    pub retired_by_id: Option<UserId>,
}

impl From<&CreditBatch> for BatchData {
    fn from(b: &CreditBatch) -> Self {
        Self {
            serial_number: b.serial_number.clone(),
            vintage: b.vintage,
            quantity: b.quantity.to_string(),
            status: b.status.as_str().to_string(),
            owner_id: b.owner_id,
            issued_at: b.issued_at,
            retired_at: b.retired_at,
            retired_by_id: b.retired_by_id,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LedgerEntryData {
    pub transaction_id: String,
    pub entry_type: String,
    pub project_id: ProjectId,
    pub from_user_id: Option<UserId>,
    pub to_user_id: UserId,
    pub quantity: String,
    pub price_per_credit: Option<String>,
    pub total_value: Option<String>,
    pub status: String,
    pub reason: Option<String>,
    pub chain_hash: String,
    pub created_at: TimestampMs,
}

impl From<&LedgerEntry> for LedgerEntryData {
    fn from(e: &LedgerEntry) -> Self {
        Self {
            transaction_id: e.entry_id.to_string(),
            entry_type: e.entry_type.as_str().to_string(),
            project_id: e.project_id,
            from_user_id: e.from_user_id,
            to_user_id: e.to_user_id,
            quantity: e.quantity.to_string(),
            price_per_credit: e.price_per_credit.map(money::format_price),
            total_value: e.total_value.map(money::format_price),
            status: e.status.as_str().to_string(),
            reason: e.reason.clone(),
            chain_hash: e.chain_hash.clone(),
            created_at: e.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LedgerPageData {
    pub entries: Vec<LedgerEntryData>,
    pub total: u64,
}

impl From<&LedgerPage> for LedgerPageData {
    fn from(page: &LedgerPage) -> Self {
        Self {
            entries: page.entries.iter().map(LedgerEntryData::from).collect(),
            total: page.total,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyData {
    pub project_id: ProjectId,
    pub consistent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub violation: Option<String>,
}
