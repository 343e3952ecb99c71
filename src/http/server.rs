//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the shared `AppState` (services over one document store)
//! - Create the Axum router: agent protocol, public feeds, admin API
//! - Wire up middleware (request id, tracing, CORS, timeout, body limit, metrics)
//! - Apply hot-reloaded configuration and stop on shutdown

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::{header, HeaderName, Method, Request},
    middleware::{self, Next},
    response::Response,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin;
use crate::api::{ADMIN_KEY_HEADER, NODE_TOKEN_HEADER};
use crate::config::HubConfig;
use crate::http::request::{request_context, X_REQUEST_ID};
use crate::http::{agent, sub};
use crate::inventory::NodeInventory;
use crate::observability::metrics;
use crate::reconcile::AgentProtocol;
use crate::releases::ReleaseService;
use crate::store::SharedStore;
use crate::subscription::SubscriptionService;
use crate::templates::TemplateRegistry;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Live configuration; swapped on reload.
    pub config: Arc<ArcSwap<HubConfig>>,
    pub store: SharedStore,
    pub protocol: AgentProtocol,
    pub inventory: NodeInventory,
    pub templates: TemplateRegistry,
    pub releases: ReleaseService,
    pub subscriptions: SubscriptionService,
}

impl AppState {
    pub fn new(config: HubConfig, store: SharedStore) -> Self {
        let inventory = NodeInventory::new(store.clone());
        let templates = TemplateRegistry::new(store.clone());
        Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            protocol: AgentProtocol::new(store.clone()),
            releases: ReleaseService::new(store.clone(), templates.clone()),
            subscriptions: SubscriptionService::new(store.clone(), inventory.clone()),
            inventory,
            templates,
            store,
        }
    }
}

async fn track_metrics(req: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let response = next.run(req).await;
    metrics::record_request(method.as_str(), response.status().as_u16(), start);
    response
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(ADMIN_KEY_HEADER),
            HeaderName::from_static(NODE_TOKEN_HEADER),
        ])
}

/// Build the Axum router with all middleware layers.
///
/// Timeout and body limit are fixed at build time; reloads only affect
/// values read per request (admin key, subscription base URL).
#[allow(deprecated)]
pub fn build_router(state: AppState) -> Router {
    let config = state.config.load_full();

    let layers = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
            let request_id = req
                .headers()
                .get(X_REQUEST_ID)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            tracing::info_span!(
                "request",
                method = %req.method(),
                uri = %req.uri(),
                request_id = %request_id,
            )
        }))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(cors_layer())
        .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
        .layer(middleware::from_fn(track_metrics))
        .layer(middleware::from_fn(request_context));

    Router::new()
        .merge(agent::router())
        .merge(sub::router())
        .merge(admin::setup_admin_router(state.clone()))
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.security.max_body_size))
        .layer(layers)
}

/// HTTP server for the control plane.
pub struct HttpServer {
    state: AppState,
    router: Router,
}

impl HttpServer {
    pub fn new(config: HubConfig, store: SharedStore) -> Self {
        let state = AppState::new(config, store);
        let router = build_router(state.clone());
        Self { state, router }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// A clone of the fully layered router, for in-process requests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` fires, applying config reloads as they arrive.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<HubConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let live = self.state.config.clone();
        tokio::spawn(async move {
            while let Some(next) = config_updates.recv().await {
                let admin_key_changed = live.load().admin.api_key != next.admin.api_key;
                live.store(Arc::new(next));
                tracing::info!(admin_key_changed, "Configuration reloaded");
            }
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
