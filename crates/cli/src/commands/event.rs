//! Order event replay.
//!
//! Useful for backfilling orders the service missed: events go through the
//! same idempotent trigger as the HTTP endpoint, so replaying an already
//! applied event prints a `duplicate` outcome and changes nothing.

use evolv_core::OrderEvent;

use super::{CommandError, print_json, service};

/// Apply one order event and print the outcome.
///
/// # Errors
///
/// Returns an error if the loyalty service rejects the event.
pub async fn apply(event: OrderEvent) -> Result<(), CommandError> {
    tracing::info!(
        order_id = %event.order_id,
        customer_id = %event.customer_id,
        event_type = %event.event_type,
        "Applying order event"
    );
    let outcome = service().await?.handle_order_event(event).await?;
    print_json(&outcome)
}
