use super::startup::ComponentTasks;
use super::types::{LifecyclePhase, RunOutcome, StopOutcome};
use super::{ComponentState, Orchestrator};
use crate::component::Component;
use futures::future::join_all;
use tokio::time::{sleep_until, timeout, Instant};
use tracing::{error, info, warn};

impl Orchestrator {
    /// Drive the shutdown sequence of all components.
    ///
    /// Explicit stop steps run concurrently with each other and with the
    /// draining of the remaining `run` tasks; all of it shares one deadline.
    /// Returns the stop outcome per component and whether the shutdown was forced.
    pub(super) async fn shutdown(
        &self,
        tasks: &mut ComponentTasks,
        runs: &mut [Option<RunOutcome>],
    ) -> (Vec<Option<StopOutcome>>, bool) {
        info!("Beginning graceful shutdown");
        self.set_phase(LifecyclePhase::ShuttingDown);

        let deadline = Instant::now() + self.shutdown_timeout;

        for (component, run) in self.components.iter().zip(runs.iter()) {
            if run.is_none() {
                self.set_component_state(component.name(), ComponentState::Stopping);
            }
        }

        let (stops, ()) = tokio::join!(
            self.stop_components(deadline),
            self.drain_runs(tasks, runs, deadline)
        );

        let forced = self.shutdown.is_forced();
        info!(forced, "Graceful shutdown finished");
        (stops, forced)
    }

    /// Call `stop` on every component that has an explicit stop path
    async fn stop_components(&self, deadline: Instant) -> Vec<Option<StopOutcome>> {
        let stops = self.components.iter().map(|component| async move {
            if component.has_stop_path() {
                Some(self.stop_component(component.as_ref(), deadline).await)
            } else {
                None
            }
        });

        join_all(stops).await
    }

    /// Stop a specific component
    async fn stop_component(&self, component: &dyn Component, deadline: Instant) -> StopOutcome {
        let name = component.name();
        let budget = deadline.saturating_duration_since(Instant::now());
        info!("Stopping {} component", name);

        tokio::select! {
            result = timeout(budget, component.stop(budget)) => match result {
                Ok(Ok(())) => {
                    info!("{} component stop completed", name);
                    StopOutcome::Stopped
                }
                Ok(Err(e)) => {
                    error!("Error stopping {} component: {}", name, e);
                    StopOutcome::Failed(e.to_string())
                }
                Err(_) => {
                    error!("{} component stop timeout", name);
                    metrics::counter!("processor_stop_timeouts_total", "component" => name.to_string())
                        .increment(1);
                    StopOutcome::TimedOut
                }
            },
            _ = self.shutdown.forced() => {
                warn!("{} component stop abandoned", name);
                StopOutcome::Abandoned
            }
        }
    }

    /// Collect `run` outcomes until every task returned, the deadline passed,
    /// or the shutdown was forced. Tasks still running afterwards are aborted.
    async fn drain_runs(
        &self,
        tasks: &mut ComponentTasks,
        runs: &mut [Option<RunOutcome>],
        deadline: Instant,
    ) {
        while !tasks.set.is_empty() {
            tokio::select! {
                Some(joined) = tasks.set.join_next() => {
                    self.record_exit(joined, &tasks.indices, runs);
                }
                _ = sleep_until(deadline) => break,
                _ = self.shutdown.forced() => {
                    warn!("Shutdown forced, no longer waiting for components");
                    break;
                }
            }
        }

        if !tasks.set.is_empty() {
            for (component, run) in self.components.iter().zip(runs.iter()) {
                if run.is_none() {
                    self.set_component_state(component.name(), ComponentState::Failed);
                    error!(
                        "{} component did not return before shutdown ended, abandoning",
                        component.name()
                    );
                }
            }
            metrics::gauge!("processor_components_running").decrement(tasks.set.len() as f64);
            tasks.set.abort_all();
        }
    }
}
