//! The lifecycle contract every supervised unit implements.

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A named unit the orchestrator launches, runs on its own task and stops.
///
/// `run` must watch `shutdown` and return promptly once it is cancelled:
/// `Ok(())` for a clean exit, `Err` for a failure. Cancellation that was
/// already raised before `run` started is treated exactly like a fresh one.
#[async_trait]
pub trait Component: Send + Sync {
    /// Identifier used in logs, metrics and the shutdown report
    fn name(&self) -> &str;

    /// Launch step executed before `run` is spawned, e.g. binding a listener.
    /// An error here aborts startup.
    async fn prepare(&self) -> Result<()> {
        Ok(())
    }

    /// Give back whatever `prepare` acquired. Called only when startup is
    /// aborted after this component prepared, so `run` never started.
    fn release(&self) {}

    /// Block until the component finishes, fails, or `shutdown` is cancelled
    async fn run(&self, shutdown: CancellationToken) -> Result<()>;

    /// Whether the orchestrator should call [`Component::stop`] during shutdown
    fn has_stop_path(&self) -> bool {
        false
    }

    /// Extra release step bounded by `deadline`. Runs concurrently with the
    /// stop calls of other components and with this component's own `run`.
    async fn stop(&self, _deadline: Duration) -> Result<()> {
        Ok(())
    }
}
