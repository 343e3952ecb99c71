//! Operator API under `/api`.
//!
//! Everything except `POST /api/auth/login` sits behind the `X-Admin-Key`
//! guard in `auth.rs`.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub fn setup_admin_router(state: AppState) -> Router<AppState> {
    let guarded = Router::new()
        .route("/api/nodes", get(list_nodes).post(create_node))
        .route("/api/nodes/{id}", get(get_node).patch(update_node).delete(delete_node))
        .route("/api/nodes/{id}/install", get(install_command))
        .route("/api/templates", get(list_templates).post(create_template))
        .route("/api/templates/registry", get(template_registry))
        .route(
            "/api/templates/{id}",
            get(get_template).patch(update_template).delete(delete_template),
        )
        .route("/api/releases", get(list_releases).post(create_release))
        .route("/api/subscriptions", get(list_subscriptions).post(create_subscription))
        .route(
            "/api/subscriptions/{token}",
            get(get_subscription)
                .patch(update_subscription)
                .delete(delete_subscription),
        )
        .route("/api/system/status", get(system_status))
        .route_layer(middleware::from_fn_with_state(state, admin_auth_middleware));

    Router::new()
        .route("/api/auth/login", post(login))
        .merge(guarded)
}
