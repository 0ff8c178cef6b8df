//! REST surface for Mimir AIP (C10): a versioned router over the pipeline
//! store, engine, scheduler, job queue, and MCP tool adapter, wrapped in the
//! middleware chain named in spec §4.10.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;

pub use config::HttpConfig;
pub use error::ApiError;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use mimir_core::pipeline::Engine;
use mimir_core::registry::Registry;
use mimir_mcp::McpAdapter;
use mimir_queue::JobQueue;
use mimir_scheduler::Scheduler;
use mimir_store::Store;
use serde::Serialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// The 1 MiB request body cap input validation enforces per spec §4.10.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared state handed to every handler. Cheaply cloneable: every field is
/// `Arc`-backed or `Clone`-cheap already.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub engine: Arc<Engine>,
    pub registry: Arc<Registry>,
    pub scheduler: Arc<Scheduler>,
    pub queue: Arc<JobQueue>,
    pub mcp: Arc<McpAdapter>,
    pub config: HttpConfig,
}

/// Envelope every handler's success path is wrapped in before being handed
/// to the client, mirroring the teacher's `ApiResponse<T>`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: chrono::DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn error(message: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message.into()),
            timestamp: Utc::now(),
        }
    }
}

/// Assemble the full router: unversioned health/version/MCP endpoints, the
/// `/api/v1` pipeline/plugin/scheduler surface, and the middleware stack in
/// the order spec §4.10 names (outermost first): request logging →
/// panic-recovery → optional authentication → input validation → security
/// headers → rate limiting → per-request context injection.
pub fn build_router(state: AppState) -> Router {
    let rate_limiter = middleware::RateLimiter::new(state.config.rate_limit_per_minute);

    let v1 = Router::new()
        .route("/pipelines", post(handlers::pipelines::create).get(handlers::pipelines::list))
        .route(
            "/pipelines/execute",
            post(handlers::pipelines::execute),
        )
        .route(
            "/pipelines/:id",
            get(handlers::pipelines::get)
                .put(handlers::pipelines::update)
                .delete(handlers::pipelines::delete),
        )
        .route("/pipelines/:id/clone", post(handlers::pipelines::clone))
        .route("/pipelines/:id/validate", post(handlers::pipelines::validate))
        .route("/pipelines/:id/history", get(handlers::pipelines::history))
        .route("/plugins", get(handlers::plugins::list_all))
        .route("/plugins/:type", get(handlers::plugins::list_by_type))
        .route("/plugins/:type/:name", get(handlers::plugins::describe))
        .route("/scheduler/jobs", post(handlers::scheduler::create).get(handlers::scheduler::list))
        .route(
            "/scheduler/jobs/:id",
            get(handlers::scheduler::get).put(handlers::scheduler::update).delete(handlers::scheduler::delete),
        )
        .route("/scheduler/jobs/:id/enable", post(handlers::scheduler::enable))
        .route("/scheduler/jobs/:id/disable", post(handlers::scheduler::disable))
        .route("/scheduler/jobs/:id/logs", get(handlers::scheduler::logs));

    let router = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/version", get(handlers::health::version))
        .route("/mcp/tools", get(handlers::mcp::list_tools))
        .route("/mcp/tools/execute", post(handlers::mcp::execute_tool))
        .nest("/api/v1", v1)
        .with_state(state.clone())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES));

    let router = router.layer(axum::middleware::from_fn(middleware::request_context));
    let router = router.layer(axum::middleware::from_fn_with_state(rate_limiter, middleware::rate_limiting));
    let router = router.layer(axum::middleware::from_fn(middleware::security_headers));
    let router = router.layer(axum::middleware::from_fn(middleware::input_validation));
    let router = router.layer(axum::middleware::from_fn_with_state(state.clone(), middleware::optional_auth));
    let router = router.layer(CatchPanicLayer::new());
    let router = router.layer(axum::middleware::from_fn(middleware::request_logging));

    let router = router.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

    if state.config.frontend_url.is_some() {
        tracing::info!(target = %state.config.frontend_url.as_deref().unwrap_or(""), "non-API paths would proxy to frontend_url; proxying is left to the reverse proxy in front of this process");
    }

    router.layer(CorsLayer::permissive())
}
