use super::types::{ComponentState, LifecyclePhase};
use crate::component::Component;
use crate::config::ProcessorConfig;
use crate::http::HttpServer;
use crate::signals::ShutdownSignal;
use crate::subscriber::Subscriber;
use metrics_exporter_prometheus::PrometheusHandle;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Supervises a fixed set of components from launch to exit.
///
/// Every component runs on its own task. The first component exit or raised
/// [`ShutdownSignal`] starts one bounded shutdown sequence; nothing is retried.
pub struct Orchestrator {
    pub(super) components: Vec<Arc<dyn Component>>,
    pub(super) shutdown: ShutdownSignal,
    pub(super) shutdown_timeout: Duration,

    // Lifecycle management
    pub(super) component_states: Arc<Mutex<HashMap<String, ComponentState>>>,
    pub(super) phase: watch::Sender<LifecyclePhase>,
    pub(super) launched: AtomicBool,
}

impl Orchestrator {
    /// Create an orchestrator with its own shutdown signal and no components
    pub fn new(shutdown_timeout: Duration) -> Self {
        Self::with_signal(ShutdownSignal::new(), shutdown_timeout)
    }

    /// Create an orchestrator driven by an existing shutdown signal
    pub fn with_signal(shutdown: ShutdownSignal, shutdown_timeout: Duration) -> Self {
        let (phase, _) = watch::channel(LifecyclePhase::Starting);
        Self {
            components: Vec::new(),
            shutdown,
            shutdown_timeout,
            component_states: Arc::new(Mutex::new(HashMap::new())),
            phase,
            launched: AtomicBool::new(false),
        }
    }

    /// Assemble the service: the HTTP endpoint and the event subscriber
    pub fn for_service(
        config: &ProcessorConfig,
        shutdown: ShutdownSignal,
        metrics: PrometheusHandle,
    ) -> Self {
        let mut orchestrator = Self::with_signal(shutdown, config.shutdown_timeout());
        orchestrator.register(Arc::new(HttpServer::new(config.bind_address(), metrics)));
        orchestrator.register(Arc::new(Subscriber::new(
            config.nats_url.clone(),
            config.heartbeat_interval(),
        )));
        orchestrator
    }

    /// Add a component. Components launch in registration order.
    pub fn register(&mut self, component: Arc<dyn Component>) -> &mut Self {
        self.components.push(component);
        self
    }

    /// Builder-style variant of [`Orchestrator::register`]
    pub fn with_component(mut self, component: Arc<dyn Component>) -> Self {
        self.register(component);
        self
    }

    /// Handle to the shared shutdown signal
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    pub fn component_names(&self) -> Vec<String> {
        self.components.iter().map(|c| c.name().to_string()).collect()
    }
}
