use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::admin::auth::check_admin_key;
use crate::error::HubError;
use crate::http::request::JsonBody;
use crate::http::response::{ApiResponse, ApiResult};
use crate::http::server::AppState;
use crate::inventory::{NewNode, NodePatch, NodeView};
use crate::model::{
    Deleted, NewRelease, NewSubscription, NewTemplate, NodeType, Release, Subscription, SubscriptionPatch,
    Template, TemplatePatch,
};
use crate::store::DocumentStore;
use crate::templates::builtin::TemplateOptions;

/// Heartbeat interval baked into generated install commands, in seconds.
const INSTALL_HEARTBEAT_SECS: u64 = 300;

#[derive(Serialize)]
pub struct SystemStatus {
    pub app_version: &'static str,
    pub store_available: bool,
    pub store_documents: usize,
    pub subscription_base_url: String,
    pub now: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct LoginResult {
    pub ok: bool,
}

#[derive(Serialize)]
pub struct InstallCommand {
    pub command: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct LoginRequest {
    admin_key: String,
}

/// Configured public base URL, else the origin the request came in on.
fn public_base_url(state: &AppState, headers: &HeaderMap) -> String {
    let configured = state.config.load().subscription.base_url.trim().to_string();
    if !configured.is_empty() {
        return configured.trim_end_matches('/').to_string();
    }
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost");
    format!("http://{host}")
}

fn quote_shell(value: &str) -> String {
    format!("'{}'", value.replace('\'', r#"'"'"'"#))
}

// --- auth & system ---

pub async fn login(State(state): State<AppState>, body: Bytes) -> ApiResult<LoginResult> {
    let request: LoginRequest = serde_json::from_slice(&body).unwrap_or_default();
    let config = state.config.load();
    check_admin_key(&config.admin.api_key, &request.admin_key)?;
    Ok(ApiResponse::ok(LoginResult { ok: true }))
}

pub async fn system_status(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<SystemStatus> {
    let (store_available, store_documents) = match state.store.list_keys("").await {
        Ok(keys) => (true, keys.len()),
        Err(e) => {
            tracing::warn!(error = %e, "Store unavailable");
            (false, 0)
        }
    };
    Ok(ApiResponse::ok(SystemStatus {
        app_version: env!("CARGO_PKG_VERSION"),
        store_available,
        store_documents,
        subscription_base_url: public_base_url(&state, &headers),
        now: Utc::now(),
    }))
}

// --- nodes ---

pub async fn list_nodes(State(state): State<AppState>) -> ApiResult<Vec<NodeView>> {
    Ok(ApiResponse::ok(state.inventory.list().await?))
}

pub async fn create_node(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<NewNode>,
) -> ApiResult<NodeView> {
    Ok(ApiResponse::created(state.inventory.create(input).await?))
}

pub async fn get_node(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<NodeView> {
    Ok(ApiResponse::ok(state.inventory.get(&id).await?))
}

pub async fn update_node(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<NodePatch>,
) -> ApiResult<NodeView> {
    Ok(ApiResponse::ok(state.inventory.update(&id, patch).await?))
}

pub async fn delete_node(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Deleted> {
    Ok(ApiResponse::ok(state.inventory.delete(&id).await?))
}

/// One-line shell command that starts the agent for a vps node.
pub async fn install_command(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<InstallCommand> {
    let view = state.inventory.get(&id).await?;
    let node = view.node;
    if node.node_type != NodeType::Vps {
        return Err(HubError::validation(
            "Install command is only available for vps nodes",
        ));
    }
    let base = public_base_url(&state, &headers);
    let command = format!(
        "nodehub-agent --control-plane-url {} --node-id {} --node-token {} --heartbeat-interval {}",
        quote_shell(&base),
        quote_shell(&node.id),
        quote_shell(&node.token),
        quote_shell(&INSTALL_HEARTBEAT_SECS.to_string()),
    );
    Ok(ApiResponse::ok(InstallCommand { command }))
}

// --- templates ---

pub async fn list_templates(State(state): State<AppState>) -> ApiResult<Vec<Template>> {
    Ok(ApiResponse::ok(state.templates.list().await?))
}

pub async fn template_registry(State(state): State<AppState>) -> ApiResult<&'static TemplateOptions> {
    Ok(ApiResponse::ok(state.templates.options()))
}

pub async fn create_template(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<NewTemplate>,
) -> ApiResult<Template> {
    Ok(ApiResponse::created(state.templates.create(input).await?))
}

pub async fn get_template(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Template> {
    Ok(ApiResponse::ok(state.templates.get(&id).await?))
}

pub async fn update_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<TemplatePatch>,
) -> ApiResult<Template> {
    Ok(ApiResponse::ok(state.templates.update(&id, patch).await?))
}

pub async fn delete_template(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Deleted> {
    Ok(ApiResponse::ok(state.templates.delete(&id).await?))
}

// --- releases ---

pub async fn list_releases(State(state): State<AppState>) -> ApiResult<Vec<Release>> {
    Ok(ApiResponse::ok(state.releases.list_releases().await?))
}

pub async fn create_release(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<NewRelease>,
) -> ApiResult<Release> {
    Ok(ApiResponse::created(state.releases.create_release(input).await?))
}

// --- subscriptions ---

pub async fn list_subscriptions(State(state): State<AppState>) -> ApiResult<Vec<Subscription>> {
    Ok(ApiResponse::ok(state.subscriptions.list().await?))
}

pub async fn create_subscription(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<NewSubscription>,
) -> ApiResult<Subscription> {
    Ok(ApiResponse::created(state.subscriptions.create(input).await?))
}

pub async fn get_subscription(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<Subscription> {
    Ok(ApiResponse::ok(state.subscriptions.get(&token).await?))
}

pub async fn update_subscription(
    State(state): State<AppState>,
    Path(token): Path<String>,
    JsonBody(patch): JsonBody<SubscriptionPatch>,
) -> ApiResult<Subscription> {
    Ok(ApiResponse::ok(state.subscriptions.update(&token, patch).await?))
}

pub async fn delete_subscription(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<Deleted> {
    Ok(ApiResponse::ok(state.subscriptions.delete(&token).await?))
}
