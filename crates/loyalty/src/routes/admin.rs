//! Admin dashboard aggregates.

use axum::{Json, extract::State};

use evolv_core::ProgramStats;

use crate::error::Result;
use crate::state::AppState;

/// GET /api/admin/loyalty/stats
pub async fn stats(State(state): State<AppState>) -> Result<Json<ProgramStats>> {
    Ok(Json(state.loyalty().stats().await?))
}
