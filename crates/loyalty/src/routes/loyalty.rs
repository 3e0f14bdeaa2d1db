//! Customer-facing loyalty endpoints.

use axum::{Json, extract::State};
use serde::Deserialize;

use evolv_core::{CustomerId, HistoryEntry, LoyaltySummary, TierBenefits, program_benefits};

use crate::error::{AppError, Result};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::services::HistoryQuery;
use crate::state::AppState;

const DEFAULT_REDEMPTION_DESCRIPTION: &str = "Points redemption";
const MAX_DESCRIPTION_LEN: usize = 200;

/// Request body for a redemption.
#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    pub points: u64,
    pub description: Option<String>,
}

/// Tier thresholds and earn rules.
///
/// GET /api/loyalty/program
pub async fn program() -> Json<Vec<TierBenefits>> {
    Json(program_benefits())
}

/// GET /api/loyalty/{customer_id}
pub async fn summary(
    State(state): State<AppState>,
    ApiPath(customer_id): ApiPath<CustomerId>,
) -> Result<Json<LoyaltySummary>> {
    Ok(Json(state.loyalty().summary(customer_id).await?))
}

/// Most recent history entries, oldest first.
///
/// GET /api/loyalty/{customer_id}/history?kind=earned&limit=20
pub async fn history(
    State(state): State<AppState>,
    ApiPath(customer_id): ApiPath<CustomerId>,
    ApiQuery(query): ApiQuery<HistoryQuery>,
) -> Result<Json<Vec<HistoryEntry>>> {
    Ok(Json(state.loyalty().history(customer_id, query).await?))
}

/// Create the account if needed. Safe to repeat.
///
/// POST /api/loyalty/{customer_id}/enroll
pub async fn enroll(
    State(state): State<AppState>,
    ApiPath(customer_id): ApiPath<CustomerId>,
) -> Result<Json<LoyaltySummary>> {
    Ok(Json(state.loyalty().enroll(customer_id).await?))
}

/// Spend points. Lifetime points and tier are unaffected.
///
/// POST /api/loyalty/{customer_id}/redeem
pub async fn redeem(
    State(state): State<AppState>,
    ApiPath(customer_id): ApiPath<CustomerId>,
    ApiJson(request): ApiJson<RedeemRequest>,
) -> Result<Json<LoyaltySummary>> {
    let description = request
        .description
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_REDEMPTION_DESCRIPTION.to_string());
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(AppError::BadRequest(format!(
            "description must be at most {MAX_DESCRIPTION_LEN} characters"
        )));
    }

    let summary = state
        .loyalty()
        .redeem(customer_id, request.points, description)
        .await?;
    Ok(Json(summary))
}
