//! API module for the care plan server
//!
//! Routes, extractors and error rendering.

use axum::{
    extract::{MatchedPath, Request},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use careplan_monitoring::metrics::ServerMetrics;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod attachments;
pub mod errors;
pub mod health;
pub mod identity;
pub mod plan;

use crate::server::CarePlanServer;

/// Path prefix the plan routes were first published under
pub const LEGACY_PLAN_PATH: &str = "/api/treatments/plan";

fn plan_routes() -> Router<Arc<CarePlanServer>> {
    Router::new()
        .route(
            "/",
            get(plan::get_plan_handler).post(plan::save_plan_handler),
        )
        .route("/create", post(plan::create_plan_handler))
}

/// Build the router for API endpoints
pub fn build_router(server: Arc<CarePlanServer>) -> Router {
    Router::new()
        // Treatment plans
        .route(
            "/plan",
            get(plan::get_plan_handler).post(plan::save_plan_handler),
        )
        .route("/plan/create", post(plan::create_plan_handler))
        .nest(LEGACY_PLAN_PATH, plan_routes())
        // Attachments
        .route(
            "/attachments/*name",
            get(attachments::get_attachment_handler)
                .post(attachments::upload_attachment_handler)
                .delete(attachments::delete_attachment_handler),
        )
        // Health check
        .route("/health", get(health::health_check))
        .route_layer(middleware::from_fn(track_requests))
        .layer(TraceLayer::new_for_http())
        .with_state(server)
}

/// Count every routed request by matched path, method and status
async fn track_requests(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let response = next.run(request).await;
    ServerMetrics::record_http_request(&path, &method, response.status().as_u16());
    response
}
