//! Request-scoped context.
//!
//! `SetRequestIdLayer` stamps every request with `x-request-id` (kept when
//! the client sent one). `request_context` lifts that id into a task-local
//! so envelopes built anywhere below the handler can report it.

use axum::{
    body::Body,
    extract::{FromRequest, Json},
    http::Request,
    middleware::Next,
    response::Response,
};
use serde::de::DeserializeOwned;
use tower_http::request_id::RequestId;

use crate::error::HubError;

pub const X_REQUEST_ID: &str = "x-request-id";

tokio::task_local! {
    static REQUEST_ID: String;
}

fn request_id_of<B>(req: &Request<B>) -> Option<String> {
    req.extensions()
        .get::<RequestId>()
        .and_then(|id| id.header_value().to_str().ok())
        .map(str::to_string)
}

/// Id of the request being served, or a fresh one outside a request.
pub fn current_request_id() -> String {
    REQUEST_ID
        .try_with(Clone::clone)
        .unwrap_or_else(|_| uuid::Uuid::new_v4().to_string())
}

/// Middleware scoping the request id to the rest of the stack.
pub async fn request_context(req: Request<Body>, next: Next) -> Response {
    let id = request_id_of(&req).unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    REQUEST_ID.scope(id, next.run(req)).await
}

/// `Json<T>` whose rejections come back as `VALIDATION` envelopes.
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = HubError;

    async fn from_request(req: Request<Body>, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(HubError::validation(rejection.body_text())),
        }
    }
}
