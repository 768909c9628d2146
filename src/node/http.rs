//! Admin HTTP API for a node
//!
//! - `GET /admin/status`: role, coordinator belief, peers, auction view
//! - `GET /health/live`: liveness probe

use crate::node::server::Node;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AdminState {
    pub node: Arc<Node>,
}

pub fn create_router(node: Arc<Node>) -> Router {
    Router::new()
        .route("/admin/status", get(admin_status))
        .route("/health/live", get(health_live))
        .layer(TraceLayer::new_for_http())
        .with_state(AdminState { node })
}

async fn admin_status(State(state): State<AdminState>) -> impl IntoResponse {
    axum::Json(state.node.status())
}

async fn health_live() -> impl IntoResponse {
    axum::Json(json!({ "live": true }))
}
