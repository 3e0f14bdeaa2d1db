//! Order event ingestion.

use axum::{Json, extract::State};

use evolv_core::OrderEvent;

use crate::error::Result;
use crate::extract::ApiJson;
use crate::services::TriggerOutcome;
use crate::state::AppState;

/// Apply an order lifecycle event to the customer's loyalty account.
///
/// POST /api/orders/events
///
/// Redelivering an event is safe: the response is `{"outcome": "duplicate"}`
/// and nothing changes.
pub async fn ingest_event(
    State(state): State<AppState>,
    ApiJson(event): ApiJson<OrderEvent>,
) -> Result<Json<TriggerOutcome>> {
    let outcome = state.loyalty().handle_order_event(event).await?;
    Ok(Json(outcome))
}
