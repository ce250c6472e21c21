//! Health check endpoint

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use crate::server::CarePlanServer;

fn status_of<E>(result: Result<bool, E>) -> &'static str {
    match result {
        Ok(true) => "UP",
        Ok(false) => "DEGRADED",
        Err(_) => "DOWN",
    }
}

/// Health check handler
///
/// Reports the plan store and the attachment store. Any dependency that is
/// not `UP` turns the response into a 503.
pub async fn health_check(State(server): State<Arc<CarePlanServer>>) -> impl IntoResponse {
    debug!("Health check requested");

    let plan_store = status_of(server.plans().health_check().await);
    let blob_store = status_of(server.blobs().health_check().await);
    let healthy = plan_store == "UP" && blob_store == "UP";

    let body = json!({
        "status": if healthy { "UP" } else { "DEGRADED" },
        "version": env!("CARGO_PKG_VERSION"),
        "dependencies": {
            "planStore": { "status": plan_store },
            "blobStore": { "status": blob_store },
        },
    });

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(body))
}
