//! HTTP router.
//!
//! Returns a composable `Router` mountable on any axum server. Routes are
//! nested under `/api/`; trace and CORS layers wrap the whole surface.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::types::ApiContext;
use crate::pipeline::upstream::UpstreamClient;

/// Build the API router over a completion client.
pub fn api_router(upstream: Arc<UpstreamClient>) -> Router {
    build_router(ApiContext::new(upstream))
}

fn build_router(ctx: ApiContext) -> Router {
    let routes = Router::new()
        .route("/analyze", post(endpoints::analyze::analyze))
        .route("/health", get(endpoints::health::check))
        .with_state(ctx);

    Router::new()
        .nest("/api", routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
