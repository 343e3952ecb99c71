//! Shared-secret guard for the admin API.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::api::ADMIN_KEY_HEADER;
use crate::error::{HubError, HubResult};
use crate::http::server::AppState;

/// Compare a provided key with the configured one.
pub fn check_admin_key(expected: &str, provided: &str) -> HubResult<()> {
    if expected.is_empty() {
        return Err(HubError::config("ADMIN_KEY is missing"));
    }
    if provided.is_empty() || provided != expected {
        return Err(HubError::unauthorized("Invalid admin key"));
    }
    Ok(())
}

/// Rejects requests without the configured `X-Admin-Key`.
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let provided = request
        .headers()
        .get(ADMIN_KEY_HEADER)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();

    let config = state.config.load();
    match check_admin_key(&config.admin.api_key, provided) {
        Ok(()) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}
