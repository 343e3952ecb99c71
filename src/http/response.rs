//! JSON envelopes.
//!
//! Success: `{success: true, data, meta}`.
//! Failure: `{success: false, error: {code, message}, meta}` with the status
//! of the error's code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Serialize;

use crate::api::{Envelope, ErrorBody, Meta};
use crate::error::HubError;
use crate::http::request::current_request_id;

fn meta() -> Meta {
    Meta {
        at: Utc::now(),
        request_id: current_request_id(),
    }
}

/// A successful envelope with an explicit status.
pub struct ApiResponse<T>(pub StatusCode, pub T);

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self(StatusCode::OK, data)
    }

    pub fn created(data: T) -> Self {
        Self(StatusCode::CREATED, data)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let body = Envelope {
            success: true,
            data: Some(self.1),
            error: None,
            meta: meta(),
        };
        (self.0, Json(body)).into_response()
    }
}

/// Handler result type.
pub type ApiResult<T> = Result<ApiResponse<T>, HubError>;

impl IntoResponse for HubError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "Request failed");
        } else {
            tracing::debug!(code = self.code(), error = %self, "Request rejected");
        }
        let body: Envelope<()> = Envelope {
            success: false,
            data: None,
            error: Some(ErrorBody {
                code: self.code().to_string(),
                message: self.to_string(),
            }),
            meta: meta(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_error_envelope() {
        let response = HubError::unauthorized("Invalid node token").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
        assert_eq!(body["error"]["message"], "Invalid node token");
        assert!(body["meta"]["request_id"].is_string());
        assert!(body.get("data").is_none());
    }

    #[tokio::test]
    async fn test_created_envelope() {
        let response = ApiResponse::created(serde_json::json!({"id": "n1"})).into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["id"], "n1");
    }
}
