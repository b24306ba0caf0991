use super::startup::{ComponentTasks, TaskExit};
use super::types::{ComponentReport, LifecyclePhase, RunOutcome, ShutdownReport, ShutdownTrigger};
use super::{ComponentState, Orchestrator};
use crate::error::ProcessorError;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::task::{self, JoinError};
use tracing::{error, info, warn};

impl Orchestrator {
    /// Launch every component, wait for the first terminal event, then shut down.
    ///
    /// Always returns a report, also when launching failed or the shutdown
    /// deadline passed. Feed it to [`super::ExitPolicy`] for the exit status.
    pub async fn run(&self) -> ShutdownReport {
        let started = Instant::now();
        info!(
            components = self.components.len(),
            shutdown_timeout_secs = self.shutdown_timeout.as_secs_f64(),
            "Async processor is starting"
        );

        let mut tasks = match self.launch().await {
            Ok(tasks) => tasks,
            Err(e) => return self.launch_failed(e, started),
        };

        let mut runs: Vec<Option<RunOutcome>> = vec![None; self.components.len()];
        self.set_phase(LifecyclePhase::Running);
        info!("Async processor is running");

        let trigger = self.wait_for_trigger(&mut tasks, &mut runs).await;
        let shutdown_started = Instant::now();
        info!(cause = %trigger, "Shutdown initiated");

        let (stops, forced) = self.shutdown(&mut tasks, &mut runs).await;

        let components = self
            .components
            .iter()
            .zip(runs)
            .zip(stops)
            .map(|((component, run), stop)| ComponentReport {
                name: component.name().to_string(),
                run: run.unwrap_or(RunOutcome::Abandoned),
                stop,
            })
            .collect();

        let report = ShutdownReport {
            trigger,
            components,
            forced,
            shutdown_duration: shutdown_started.elapsed(),
            uptime: started.elapsed(),
        };

        metrics::histogram!("processor_shutdown_duration_seconds")
            .record(report.shutdown_duration.as_secs_f64());
        self.set_phase(LifecyclePhase::Stopped);
        report
    }

    /// Block until the first component exits or the shutdown signal is raised.
    ///
    /// The cause recorded by the shutdown signal is authoritative: when a
    /// component exits at the same moment a signal arrives, whichever raised
    /// the signal first is the trigger.
    async fn wait_for_trigger(
        &self,
        tasks: &mut ComponentTasks,
        runs: &mut [Option<RunOutcome>],
    ) -> ShutdownTrigger {
        tokio::select! {
            cause = self.shutdown.triggered() => cause,
            Some(joined) = tasks.set.join_next() => {
                let candidate = self.record_exit(joined, &tasks.indices, runs);
                self.shutdown.trigger(candidate.clone());
                self.shutdown.cause().unwrap_or(candidate)
            }
        }
    }

    /// Store a finished task's outcome and describe it as a shutdown trigger
    pub(super) fn record_exit(
        &self,
        joined: Result<TaskExit, JoinError>,
        indices: &HashMap<task::Id, usize>,
        runs: &mut [Option<RunOutcome>],
    ) -> ShutdownTrigger {
        metrics::gauge!("processor_components_running").decrement(1.0);

        let TaskExit { index, outcome } = match joined {
            Ok(exit) => exit,
            // Panics are caught inside the task, so only runtime cancellation lands here
            Err(e) => match indices.get(&e.id()) {
                Some(&index) => TaskExit {
                    index,
                    outcome: RunOutcome::Failed(format!("task ended abnormally: {}", e)),
                },
                None => {
                    error!("Unknown component task ended abnormally: {}", e);
                    return ShutdownTrigger::ComponentFailed {
                        component: "unknown".to_string(),
                        error: e.to_string(),
                    };
                }
            },
        };

        let name = self.components[index].name().to_string();
        let trigger = match &outcome {
            RunOutcome::Completed => {
                self.set_component_state(&name, ComponentState::Stopped);
                if self.shutdown.is_triggered() {
                    info!("{} component stopped", name);
                } else {
                    warn!("{} component exited before shutdown was requested", name);
                }
                ShutdownTrigger::ComponentExited {
                    component: name.clone(),
                }
            }
            RunOutcome::Failed(message) | RunOutcome::Panicked(message) => {
                self.set_component_state(&name, ComponentState::Failed);
                metrics::counter!("processor_component_failures_total", "component" => name.clone())
                    .increment(1);
                error!("{} component error: {}", name, message);
                ShutdownTrigger::ComponentFailed {
                    component: name.clone(),
                    error: message.clone(),
                }
            }
            RunOutcome::NotStarted | RunOutcome::Abandoned => {
                ShutdownTrigger::ComponentExited {
                    component: name.clone(),
                }
            }
        };

        runs[index] = Some(outcome);
        trigger
    }

    fn launch_failed(&self, error: ProcessorError, started: Instant) -> ShutdownReport {
        let trigger = match error {
            ProcessorError::Launch { component, message } => ShutdownTrigger::LaunchFailed {
                component,
                error: message,
            },
            other => ShutdownTrigger::LaunchFailed {
                component: "orchestrator".to_string(),
                error: other.to_string(),
            },
        };
        error!(cause = %trigger, "Startup aborted");

        self.shutdown.trigger(trigger.clone());
        self.set_phase(LifecyclePhase::Stopped);

        ShutdownReport {
            trigger,
            components: self
                .components
                .iter()
                .map(|component| ComponentReport {
                    name: component.name().to_string(),
                    run: RunOutcome::NotStarted,
                    stop: None,
                })
                .collect(),
            forced: false,
            shutdown_duration: Duration::ZERO,
            uptime: started.elapsed(),
        }
    }
}
