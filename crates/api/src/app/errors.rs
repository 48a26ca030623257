use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use arledger_allocation::AllocationError;

/// Everything a handler can fail with.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Allocation(#[from] AllocationError),

    /// Malformed input caught before reaching the engine (ids, amounts, query params).
    #[error("{message}")]
    BadRequest { code: &'static str, message: String },
}

impl ApiError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Allocation(err) => allocation_error_to_response(&err),
            ApiError::BadRequest { code, message } => {
                json_error(StatusCode::BAD_REQUEST, code, message)
            }
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// | Error                                      | Status |
/// |--------------------------------------------|--------|
/// | `Validation`                               | 400    |
/// | `InvalidAmount`, `InvalidAccountRole`      | 422    |
/// | `NotFound`                                 | 404    |
/// | `InsufficientCredit`, `AlreadyReversed`    | 409    |
/// | `UnbalancedSplit`, `Store`                 | 500    |
pub fn allocation_error_to_response(err: &AllocationError) -> Response {
    let status = match err {
        AllocationError::Validation(_) => StatusCode::BAD_REQUEST,
        AllocationError::InvalidAmount(_) | AllocationError::InvalidAccountRole { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        AllocationError::NotFound(_) => StatusCode::NOT_FOUND,
        AllocationError::InsufficientCredit { .. } | AllocationError::AlreadyReversed(_) => {
            StatusCode::CONFLICT
        }
        AllocationError::UnbalancedSplit { .. } | AllocationError::Store(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    json_error(status, err.code(), err.to_string())
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
