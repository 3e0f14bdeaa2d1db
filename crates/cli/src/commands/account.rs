//! Account inspection commands.

use evolv_core::CustomerId;

use super::{CommandError, print_json, service};

/// Print a customer's loyalty summary.
///
/// # Errors
///
/// Returns an error if the account does not exist or the database fails.
pub async fn show(customer_id: CustomerId) -> Result<(), CommandError> {
    let summary = service().await?.summary(customer_id).await?;
    print_json(&summary)
}
