use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use shard_router::CoordinationError;

/// Maps coordination failures onto HTTP responses.
///
/// The body carries the protocol error only; internal details stay in the logs.
pub(crate) struct ApiError(pub CoordinationError);

impl From<CoordinationError> for ApiError {
    fn from(err: CoordinationError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.code() {
            "invalid_key_format" | "invalid_grant" | "reuse_detected" => StatusCode::BAD_REQUEST,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            "routing_unavailable" | "actor_unavailable" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let mut response = (
            status,
            Json(json!({
                "error": self.0.protocol_error(),
                "code": self.0.code(),
            })),
        )
            .into_response();

        if let CoordinationError::RateLimited {
            retry_after_seconds,
        } = self.0
        {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_seconds));
        }
        response
    }
}
