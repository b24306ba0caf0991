use super::server::ServerState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};

/// Liveness probe, answers while the server is accepting requests
pub async fn healthz_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Prometheus text exposition of every metric recorded by the process
pub async fn metrics_handler(State(state): State<ServerState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
