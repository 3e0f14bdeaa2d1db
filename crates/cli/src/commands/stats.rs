//! Program statistics.

use super::{CommandError, print_json, service};

/// Print program-wide loyalty aggregates.
///
/// # Errors
///
/// Returns an error if the database fails.
pub async fn show() -> Result<(), CommandError> {
    let stats = service().await?.stats().await?;
    print_json(&stats)
}
