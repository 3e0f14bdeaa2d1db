//! Application state shared across handlers.

use std::sync::Arc;

use crate::services::LoyaltyService;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    loyalty: LoyaltyService,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(loyalty: LoyaltyService) -> Self {
        Self {
            inner: Arc::new(AppStateInner { loyalty }),
        }
    }

    /// Get a reference to the loyalty service.
    #[must_use]
    pub fn loyalty(&self) -> &LoyaltyService {
        &self.inner.loyalty
    }
}
