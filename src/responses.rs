use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Body of every error response: `{"error": "<message>"}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Body of plain acknowledgements: `{"message": "<message>"}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageBody {
    pub message: String,
}

pub struct JsonResponse;

impl JsonResponse {
    pub fn error(status: StatusCode, msg: &str) -> Response {
        (
            status,
            Json(ErrorBody {
                error: msg.to_string(),
            }),
        )
            .into_response()
    }

    pub fn message(msg: &str) -> Response {
        (
            StatusCode::OK,
            Json(MessageBody {
                message: msg.to_string(),
            }),
        )
            .into_response()
    }

    pub fn too_many_requests(msg: &str) -> Response {
        Self::error(StatusCode::TOO_MANY_REQUESTS, msg)
    }
}
