use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use super::MURMUR_STATUS_HEADER;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("missing session id: send a `session-id` header or `session_id` query parameter")]
    MissingSessionId,

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

#[derive(serde::Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, murmur_status) = match &self {
            GatewayError::MissingSessionId => (StatusCode::BAD_REQUEST, "missing_session"),
            GatewayError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
        };

        let mut headers = HeaderMap::new();
        headers.insert(
            MURMUR_STATUS_HEADER,
            HeaderValue::from_static(murmur_status),
        );

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: status.as_u16(),
        });

        (status, headers, body).into_response()
    }
}
