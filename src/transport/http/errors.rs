use {
    crate::domain::error::PipelineError,
    axum::{
        Json,
        http::StatusCode,
        response::{IntoResponse, Response},
    },
};

/// HTTP face of [`PipelineError`].
pub struct ApiError(pub PipelineError);

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match &self.0 {
            PipelineError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            PipelineError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg.clone()),
            PipelineError::Unauthenticated(msg) => {
                (StatusCode::UNAUTHORIZED, "unauthenticated", msg.clone())
            }
            PipelineError::InvalidState(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_state", msg.clone())
            }
            err @ PipelineError::AmountTooLow { .. } => {
                (StatusCode::BAD_REQUEST, "amount_too_low", err.to_string())
            }
            err @ PipelineError::UnsupportedProvider(_) => {
                (StatusCode::BAD_REQUEST, "unsupported_provider", err.to_string())
            }
            PipelineError::Provider(msg) => {
                tracing::warn!("payment provider error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "provider_error",
                    "payment provider unavailable".to_string(),
                )
            }
            PipelineError::WebhookSignature(msg) => {
                tracing::warn!("webhook rejected: {msg}");
                (
                    StatusCode::UNAUTHORIZED,
                    "webhook_error",
                    "invalid webhook signature".to_string(),
                )
            }
            PipelineError::Validation(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                msg.clone(),
            ),
            PipelineError::Database(err) => {
                tracing::error!("database error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal error".to_string(),
                )
            }
            PipelineError::Serialization(err) => {
                tracing::error!("serialization error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal error".to_string(),
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = self.parts();

        let body = serde_json::json!({
            "error_code": error_code,
            "message": message,
        });

        (status, Json(body)).into_response()
    }
}
