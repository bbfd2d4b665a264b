//! Unified API error responses.
//!
//! Every error surfaced to a client carries a machine-readable `error` code
//! and a human-readable `message`, encoded as JSON.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use utoipa::ToSchema;

/// JSON error body returned by every failing endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiError {
    /// HTTP status code for the response
    #[serde(skip)]
    pub status: StatusCode,
    /// Stable error code for programmatic handling
    pub error: String,
    /// Human-readable error message
    pub message: String,
    /// Product key the error relates to, when applicable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    /// Run id the error relates to, when applicable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            error: code.into(),
            message: message.into(),
            product: None,
            run_id: None,
        }
    }

    pub fn bad_request(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }

    pub fn internal(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, code, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
    }

    /// Attach the product key that triggered the error.
    pub fn with_product(mut self, product_key: impl Into<String>) -> Self {
        self.product = Some(product_key.into());
        self
    }

    /// Attach the run id that triggered the error.
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status;
        (
            status,
            [("content-type", "application/json; charset=utf-8")],
            Json(self),
        )
            .into_response()
    }
}
