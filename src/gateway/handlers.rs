//! Registry HTTP handlers
//!
//! Handlers parse wire strings, call the coordinator and wrap the result.
//! All business validation stays in the registry.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::core_types::{ProjectId, UserId, now_ms};
use crate::money;
use crate::registry::{ProjectRegistration, ProjectStatus, RegistryError};

use super::state::AppState;
use super::types::{
    ApiError, ApiResponse, ApiResult, BatchData, HealthResponse, HoldingData, InventoryData,
    IssueData, IssueRequest, LedgerPageData, LedgerQuery, PurchaseRequest,
    RegisterProjectRequest, RetireRequest, SetStatusRequest, TransactionData, UpdatePriceRequest,
    VerifyData, created, error_codes, ok,
};

/// Default ledger page size when the query omits one
const DEFAULT_PAGE_SIZE: u32 = 20;

/// GET /api/v1/health
///
/// - Healthy: 200 OK + {code: 0, data: {timestamp_ms, build}}
/// - Unhealthy: 503 + {code: 5001, msg: "unavailable"}
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<ApiResponse<HealthResponse>>) {
    match state.registry.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::success(HealthResponse {
                timestamp_ms: now_ms(),
                build: state.build.to_string(),
            })),
        ),
        Err(e) => {
            tracing::error!("[HEALTH] store check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    code: error_codes::SERVICE_UNAVAILABLE,
                    msg: "unavailable".to_string(),
                    data: None,
                }),
            )
        }
    }
}

/// POST /api/v1/projects
pub async fn register_project(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterProjectRequest>,
) -> ApiResult<InventoryData> {
    let total_credits = money::parse_quantity(&req.total_credits).map_err(ApiError::invalid_quantity)?;
    let price_per_credit =
        money::parse_price(&req.price_per_credit).map_err(ApiError::invalid_price)?;
    let integrity_score = req
        .integrity_score
        .as_deref()
        .map(|s| {
            s.trim().parse::<rust_decimal::Decimal>().map_err(|_| {
                ApiError::bad_request(
                    error_codes::INVALID_PARAMETER,
                    format!("invalid integrity score: {}", s),
                )
            })
        })
        .transpose()?;

    let inventory = state
        .registry
        .register_project(ProjectRegistration {
            project_id: req.project_id,
            developer_id: req.developer_id,
            vintage: req.vintage,
            total_credits,
            price_per_credit,
            integrity_score,
        })
        .await?;
    created(InventoryData::from(&inventory))
}

/// GET /api/v1/projects/{project_id}
pub async fn get_project(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<ProjectId>,
) -> ApiResult<InventoryData> {
    let inventory = state.registry.get_inventory(project_id).await?;
    ok(InventoryData::from(&inventory))
}

/// GET /api/v1/projects/{project_id}/batches
pub async fn list_batches(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<ProjectId>,
) -> ApiResult<Vec<BatchData>> {
    let batches = state.registry.list_batches(project_id).await?;
    ok(batches.iter().map(BatchData::from).collect())
}

/// POST /api/v1/projects/{project_id}/issue
pub async fn issue_credits(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<ProjectId>,
    Json(req): Json<IssueRequest>,
) -> ApiResult<IssueData> {
    let quantity = money::parse_quantity(&req.quantity).map_err(ApiError::invalid_quantity)?;
    let receipt = state.registry.issue_credits(project_id, quantity).await?;
    ok(IssueData::from(receipt))
}

/// POST /api/v1/projects/{project_id}/purchase
pub async fn purchase_credits(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<ProjectId>,
    Json(req): Json<PurchaseRequest>,
) -> ApiResult<TransactionData> {
    let quantity = money::parse_quantity(&req.quantity).map_err(ApiError::invalid_quantity)?;
    let entry_id = state
        .registry
        .purchase_credits(project_id, req.buyer_id, quantity)
        .await?;
    ok(TransactionData {
        transaction_id: entry_id.to_string(),
    })
}

/// POST /api/v1/projects/{project_id}/retire
pub async fn retire_credits(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<ProjectId>,
    Json(req): Json<RetireRequest>,
) -> ApiResult<TransactionData> {
    let quantity = money::parse_quantity(&req.quantity).map_err(ApiError::invalid_quantity)?;
    let entry_id = state
        .registry
        .retire_credits(project_id, req.buyer_id, quantity, req.reason)
        .await?;
    ok(TransactionData {
        transaction_id: entry_id.to_string(),
    })
}

/// PUT /api/v1/projects/{project_id}/price
pub async fn update_price(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<ProjectId>,
    Json(req): Json<UpdatePriceRequest>,
) -> ApiResult<InventoryData> {
    let price = money::parse_price(&req.price_per_credit).map_err(ApiError::invalid_price)?;
    let inventory = state.registry.update_price(project_id, price).await?;
    ok(InventoryData::from(&inventory))
}

/// PUT /api/v1/projects/{project_id}/status
pub async fn set_project_status(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<ProjectId>,
    Json(req): Json<SetStatusRequest>,
) -> ApiResult<InventoryData> {
    let status: ProjectStatus = req
        .status
        .parse()
        .map_err(|e: String| ApiError::bad_request(error_codes::INVALID_PARAMETER, e))?;
    let inventory = state
        .registry
        .set_project_status(project_id, status)
        .await?;
    ok(InventoryData::from(&inventory))
}

/// GET /api/v1/projects/{project_id}/verify
pub async fn verify_project(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<ProjectId>,
) -> ApiResult<VerifyData> {
    match state.registry.verify_project(project_id).await {
        Ok(()) => ok(VerifyData {
            project_id,
            consistent: true,
            violation: None,
        }),
        Err(RegistryError::ConsistencyViolation(v)) => ok(VerifyData {
            project_id,
            consistent: false,
            violation: Some(v.to_string()),
        }),
        Err(e) => ApiError::from(e).into_err(),
    }
}

/// GET /api/v1/holdings/{buyer_id}/{project_id}
pub async fn get_holding(
    State(state): State<Arc<AppState>>,
    Path((buyer_id, project_id)): Path<(UserId, ProjectId)>,
) -> ApiResult<HoldingData> {
    let holding = state.registry.get_holding(buyer_id, project_id).await?;
    ok(HoldingData::from(&holding))
}

/// GET /api/v1/ledger?page=&page_size=
pub async fn list_ledger(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LedgerQuery>,
) -> ApiResult<LedgerPageData> {
    let page = state
        .registry
        .list_ledger(
            query.page.unwrap_or(1),
            query.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        )
        .await?;
    ok(LedgerPageData::from(&page))
}
