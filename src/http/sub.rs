//! Public subscription feed: `GET /sub/{token}?format=`.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;

use crate::error::HubError;
use crate::http::server::AppState;
use crate::subscription::SubscriptionFormat;

pub const DISABLED_BODY: &str = "# subscription disabled";

#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    pub format: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/sub/{token}", get(feed))
}

fn plain(status: StatusCode, content_type: &'static str, body: String) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, content_type), (header::CACHE_CONTROL, "no-store")],
        body,
    )
        .into_response()
}

async fn feed(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Query(query): Query<FeedQuery>,
) -> Result<Response, HubError> {
    let format = SubscriptionFormat::parse(query.format.as_deref());
    match state.subscriptions.feed(&token, format).await? {
        Some(feed) => Ok(plain(StatusCode::OK, feed.format.content_type(), feed.body)),
        None => Ok(plain(
            StatusCode::NOT_FOUND,
            SubscriptionFormat::V2ray.content_type(),
            DISABLED_BODY.to_string(),
        )),
    }
}
