use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::domain::aggregates::{CouponRejection, TransitionError};
use crate::StoreError;

/// Every handler error, rendered as `{"error": "<message>"}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Não autorizado")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// A fixed user-facing message; details are logged where the error
    /// is raised.
    #[error("{0}")]
    Internal(&'static str),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    pub fn invalid_data() -> Self { Self::BadRequest("Dados inválidos".into()) }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        tracing::debug!(%errors, "request failed validation");
        Self::invalid_data()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Store(e) => match e {
                StoreError::OrderNotFound
                | StoreError::ProductNotFound
                | StoreError::CouponNotFound
                | StoreError::Transition(TransitionError::NotFound)
                | StoreError::Coupon(CouponRejection::NotFound) => StatusCode::NOT_FOUND,
                StoreError::Database(err) => {
                    tracing::error!(error = %err, "database error");
                    return internal_error();
                }
                StoreError::OrderNumberCollision => {
                    tracing::error!("could not allocate an order number");
                    return internal_error();
                }
                _ => StatusCode::BAD_REQUEST,
            },
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

fn internal_error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "Erro interno do servidor" }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let status = |e: ApiError| e.into_response().status();
        assert_eq!(status(ApiError::Unauthorized), StatusCode::UNAUTHORIZED);
        assert_eq!(status(StoreError::OrderNotFound.into()), StatusCode::NOT_FOUND);
        assert_eq!(status(StoreError::Transition(TransitionError::NotFound).into()), StatusCode::NOT_FOUND);
        assert_eq!(
            status(StoreError::Transition(TransitionError::InsufficientStock { product_id: 1 }).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status(StoreError::Coupon(CouponRejection::Inactive).into()), StatusCode::BAD_REQUEST);
        assert_eq!(status(StoreError::Coupon(CouponRejection::NotFound).into()), StatusCode::NOT_FOUND);
        assert_eq!(status(StoreError::Database(sqlx::Error::RowNotFound).into()), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_business_message_is_forwarded() {
        let err: ApiError = StoreError::Transition(TransitionError::OutOfStock { product_id: 3 }).into();
        assert_eq!(err.to_string(), "Produto sem estoque");
    }

    #[test]
    fn test_unknown_coupon_message() {
        let err: ApiError = StoreError::Coupon(CouponRejection::NotFound).into();
        assert_eq!(err.to_string(), "Cupom inválido");
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }
}
