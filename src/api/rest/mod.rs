pub mod sessions;
pub mod ws;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::engine::controller::RouteSessionController;

pub type SharedController = Arc<RouteSessionController>;

pub fn router(controller: SharedController) -> Router {
    Router::new()
        .merge(sessions::router())
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/ws", get(ws::ws_handler))
        .with_state(controller)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    transporter_id: Option<String>,
    sessions: usize,
    polling: bool,
}

async fn health(State(controller): State<SharedController>) -> Json<HealthResponse> {
    let state = controller.state();
    let transporter_id = state.transporter_id().await;

    Json(HealthResponse {
        status: "ok",
        polling: transporter_id.is_some() && !state.overlay_open(),
        transporter_id,
        sessions: state.active_session_count(),
    })
}

async fn metrics(State(controller): State<SharedController>) -> impl IntoResponse {
    match controller.state().metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err).into_response(),
    }
}
