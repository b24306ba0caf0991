use crate::component::Component;
use crate::error::{ProcessorError, Result};
use async_trait::async_trait;
use axum::{routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::handlers::{healthz_handler, metrics_handler};

const COMPONENT_NAME: &str = "http";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared state for the Axum server
#[derive(Clone)]
pub struct ServerState {
    pub(crate) metrics: PrometheusHandle,
}

/// Build the service routes
pub fn router(metrics: PrometheusHandle) -> Router {
    Router::new()
        .route("/healthz", get(healthz_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(ServerState { metrics })
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
}

/// HTTP server exposing `/healthz` and `/metrics`.
///
/// The listener is bound in `prepare`, so a port conflict aborts startup.
/// `run` serves until the shared shutdown token or `stop` asks it to drain.
pub struct HttpServer {
    address: String,
    metrics: PrometheusHandle,
    listener: Mutex<Option<TcpListener>>,
    local_addr: Mutex<Option<SocketAddr>>,
    drain: CancellationToken,
    finished: CancellationToken,
}

impl HttpServer {
    pub fn new(address: impl Into<String>, metrics: PrometheusHandle) -> Self {
        Self {
            address: address.into(),
            metrics,
            listener: Mutex::new(None),
            local_addr: Mutex::new(None),
            drain: CancellationToken::new(),
            finished: CancellationToken::new(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Address actually bound, known once `prepare` succeeded
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    async fn bind(&self) -> Result<TcpListener> {
        let listener = TcpListener::bind(&self.address).await.map_err(|e| {
            ProcessorError::launch(
                COMPONENT_NAME,
                format!("failed to bind {}: {}", self.address, e),
            )
        })?;
        *self.local_addr.lock() = listener.local_addr().ok();
        Ok(listener)
    }
}

#[async_trait]
impl Component for HttpServer {
    fn name(&self) -> &str {
        COMPONENT_NAME
    }

    async fn prepare(&self) -> Result<()> {
        let listener = self.bind().await?;
        info!(address = ?self.local_addr(), "HTTP server listening");
        *self.listener.lock() = Some(listener);
        Ok(())
    }

    fn release(&self) {
        if self.listener.lock().take().is_some() {
            info!(address = %self.address, "HTTP listener released");
        }
    }

    async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let _finished = self.finished.clone().drop_guard();

        let prepared = self.listener.lock().take();
        let listener = match prepared {
            Some(listener) => listener,
            None => self.bind().await?,
        };

        let drain = self.drain.clone();
        let stop_requested = async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = drain.cancelled() => {}
            }
        };

        info!(address = %self.address, "HTTP server started");
        axum::serve(listener, router(self.metrics.clone()))
            .with_graceful_shutdown(stop_requested)
            .await
            .map_err(|e| ProcessorError::component(COMPONENT_NAME, format!("server error: {}", e)))?;

        info!("HTTP server stopped accepting connections");
        Ok(())
    }

    fn has_stop_path(&self) -> bool {
        true
    }

    /// Drain in-flight requests, waiting at most `deadline`
    async fn stop(&self, deadline: Duration) -> Result<()> {
        self.drain.cancel();
        timeout(deadline, self.finished.cancelled())
            .await
            .map_err(|_| ProcessorError::stop_timeout(COMPONENT_NAME, deadline))
    }
}
