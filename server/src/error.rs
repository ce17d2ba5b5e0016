use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Not permitted")]
    Forbidden,

    #[error("Not found")]
    NotFound,

    #[error("Store error: {0}")]
    Store(String),

    #[error("Store timed out")]
    StoreTimeout,

    #[error("Internal error: {0}")]
    InternalError(#[from] Box<dyn std::error::Error + Send + Sync>),

    // Organization approval is two independent writes. When the second one
    // fails the organization stays approved and the founder stays pending;
    // the error names the step so the caller can re-run it.
    #[error("organization {org_id} approved, but founder member approval failed: {reason}")]
    FounderApprovalFailed { org_id: String, reason: String },
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Timeout => AppError::StoreTimeout,
            StoreError::Missing => AppError::NotFound,
            StoreError::Backend(message) | StoreError::Corrupt(message) => {
                AppError::Store(message)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Store { .. } => StatusCode::BAD_GATEWAY,
            AppError::StoreTimeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::InternalError { .. } | AppError::FounderApprovalFailed { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, self.to_string()).into_response()
    }
}
