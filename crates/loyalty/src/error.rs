//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use evolv_core::LedgerError;

use crate::services::LoyaltyError;

/// Application-level error type for the loyalty API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Loyalty operation failed.
    #[error(transparent)]
    Loyalty(#[from] LoyaltyError),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Loyalty(err) => match err {
                LoyaltyError::AccountNotFound(_) => StatusCode::NOT_FOUND,
                LoyaltyError::OrderNotPayable { .. }
                | LoyaltyError::Ledger(
                    LedgerError::InsufficientPoints { .. } | LedgerError::ZeroRedemption,
                ) => StatusCode::UNPROCESSABLE_ENTITY,
                LoyaltyError::InvalidAmount(_) => StatusCode::BAD_REQUEST,
                LoyaltyError::ConcurrentUpdateConflict { .. } => StatusCode::CONFLICT,
                LoyaltyError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose internal error details to clients
        let error = if status.is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(ErrorBody { error })).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use evolv_core::{AmountError, CustomerId, FinancialStatus, OrderId};
    use rust_decimal::Decimal;

    use super::*;
    use crate::db::RepositoryError;

    fn get_status(err: impl Into<AppError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(LoyaltyError::AccountNotFound(CustomerId::new(1))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(LoyaltyError::OrderNotPayable {
                order_id: OrderId::new(1),
                status: FinancialStatus::Pending,
            }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            get_status(LoyaltyError::Ledger(LedgerError::ZeroRedemption)),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            get_status(LoyaltyError::Ledger(LedgerError::InsufficientPoints {
                requested: 10,
                available: 5,
            })),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            get_status(LoyaltyError::InvalidAmount(AmountError::Negative(
                Decimal::NEGATIVE_ONE
            ))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(LoyaltyError::ConcurrentUpdateConflict {
                customer_id: CustomerId::new(1),
                attempts: 5,
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn test_store_error_details_are_hidden() {
        let err = AppError::from(LoyaltyError::Store(RepositoryError::DataCorruption(
            "negative points: -4".to_string(),
        )));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Internal server error");
    }
}
