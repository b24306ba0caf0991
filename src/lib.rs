pub mod app;
pub mod component;
pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod signals;
pub mod subscriber;
pub mod telemetry;

pub use app::{
    ComponentReport, ComponentState, ExitPolicy, ExitStatus, LifecyclePhase, Orchestrator,
    RunOutcome, ShutdownReport, ShutdownTrigger, StopOutcome,
};
pub use component::Component;
pub use config::ProcessorConfig;
pub use error::{ProcessorError, Result};
pub use http::HttpServer;
pub use signals::{RepeatSignalPolicy, ShutdownSignal, SignalSource, TerminationRequest};
pub use subscriber::Subscriber;
