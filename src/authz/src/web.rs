//! HTTP routes of the portal gateway
//!
//! ## Endpoints
//!
//! - `GET /status` - Deployment description, useful for smoke tests and ping
//!
//! Every route sits behind [`authorize_access`].

use axum::{extract::State, middleware, response::Json, routing::get, Router};
use serde::Serialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::middleware::{authorize_access, RoleGuard};
use crate::settings::Settings;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub name: &'static str,
    pub version: &'static str,
    pub environment: String,
}

impl AppState {
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: crate::VERSION,
            environment: environment.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub platform: &'static str,
}

/// Body of `GET /status`
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    pub name: &'static str,
    pub version: &'static str,
    pub env: String,
    pub timestamp: String,
    pub process: ProcessInfo,
}

/// GET /status
async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        success: true,
        name: state.name,
        version: state.version,
        env: state.environment,
        timestamp: chrono::Utc::now().to_rfc3339(),
        process: ProcessInfo {
            pid: std::process::id(),
            platform: std::env::consts::OS,
        },
    })
}

/// Create the HTTP router with all endpoints guarded by `guard`
pub fn create_router(state: AppState, guard: Arc<RoleGuard>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace = TraceLayer::new_for_http()
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/status", get(status))
        .layer(middleware::from_fn_with_state(guard, authorize_access))
        .layer(ServiceBuilder::new().layer(trace).layer(cors))
        .with_state(state)
}

/// Router for the given settings
pub fn router_from_settings(settings: &Settings) -> Router {
    create_router(
        AppState::new(settings.env.clone()),
        Arc::new(RoleGuard::from_settings(settings)),
    )
}
