//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! One websocket endpoint carries the whole drawing protocol. The two HTTP
//! endpoints exist for probes and operators: `/healthz` is a liveness check,
//! `/api/stats` asks the canvas actor for a snapshot of its counters.

pub mod ws;

use axum::extract::State;
use axum::http::{HeaderValue, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use canvas::wire::ErrorCode;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::services::canvas::CanvasStats;
use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = cors_layer(state.config.allowed_origins.as_deref());

    Router::new()
        .route("/api/ws", get(ws::handle_ws))
        .route("/api/stats", get(stats))
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(allowed_origins: Option<&[String]>) -> CorsLayer {
    let origin = match allowed_origins {
        Some(origins) => AllowOrigin::list(
            origins
                .iter()
                .filter_map(|origin| match HeaderValue::from_str(origin) {
                    Ok(value) => Some(value),
                    Err(_) => {
                        warn!(%origin, "ignoring unparseable CORS origin");
                        None
                    }
                }),
        ),
        None => AllowOrigin::from(Any),
    };
    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn stats(State(state): State<AppState>) -> Result<Json<CanvasStats>, StatusCode> {
    state.canvas.stats().await.map(Json).map_err(|e| {
        warn!(code = e.error_code(), error = %e, "stats: canvas unavailable");
        StatusCode::SERVICE_UNAVAILABLE
    })
}
