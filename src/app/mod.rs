//! Component lifecycle orchestration.
//!
//! ```text
//! Starting     → prepare every component in order, spawn each run on its own task
//! Running      → select! over the next finished run and the shutdown signal
//! ShuttingDown → raise the signal, stop concurrently, drain runs until the deadline
//! Stopped      → ShutdownReport → ExitPolicy → exit status
//! ```

mod exit;
mod orchestrator;
mod runtime;
mod shutdown;
mod startup;
mod state;
mod types;


pub use exit::{ExitPolicy, ExitStatus};
pub use orchestrator::Orchestrator;
pub use types::{
    ComponentReport, ComponentState, LifecyclePhase, RunOutcome, ShutdownReport, ShutdownTrigger,
    StopOutcome,
};
