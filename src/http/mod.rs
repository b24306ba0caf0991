//! HTTP endpoint component: liveness and Prometheus metrics.

mod handlers;
mod server;

pub use handlers::{healthz_handler, metrics_handler};
pub use server::{router, HttpServer, ServerState};
