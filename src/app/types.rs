use crate::signals::TerminationRequest;
use std::fmt;
use std::time::Duration;
use tracing::{error, info, warn};

/// Component lifecycle states
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed,
}

/// Orchestrator phases, in the only order they can occur
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LifecyclePhase {
    Starting,
    Running,
    ShuttingDown,
    Stopped,
}

/// The event that started the shutdown sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownTrigger {
    Signal(TerminationRequest),
    ComponentFailed { component: String, error: String },
    ComponentExited { component: String },
    LaunchFailed { component: String, error: String },
}

impl fmt::Display for ShutdownTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownTrigger::Signal(request) => write!(f, "signal {}", request),
            ShutdownTrigger::ComponentFailed { component, error } => {
                write!(f, "{} failed: {}", component, error)
            }
            ShutdownTrigger::ComponentExited { component } => write!(f, "{} exited", component),
            ShutdownTrigger::LaunchFailed { component, error } => {
                write!(f, "{} failed to launch: {}", component, error)
            }
        }
    }
}

/// How a component's `run` ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Never spawned because startup was aborted
    NotStarted,
    Completed,
    Failed(String),
    Panicked(String),
    /// Still running when the deadline passed or the shutdown was forced
    Abandoned,
}

impl RunOutcome {
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            RunOutcome::Failed(_) | RunOutcome::Panicked(_) | RunOutcome::Abandoned
        )
    }
}

/// How a component's explicit stop step ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    Failed(String),
    TimedOut,
    /// Cut short by a forced shutdown
    Abandoned,
}

impl StopOutcome {
    pub fn is_error(&self) -> bool {
        !matches!(self, StopOutcome::Stopped)
    }
}

/// Final outcome of one component
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentReport {
    pub name: String,
    pub run: RunOutcome,
    /// `None` when the component has no explicit stop path or never started
    pub stop: Option<StopOutcome>,
}

/// Aggregated result of a complete orchestrator lifecycle
#[derive(Debug, Clone)]
pub struct ShutdownReport {
    pub trigger: ShutdownTrigger,
    /// One entry per component, in registration order
    pub components: Vec<ComponentReport>,
    pub forced: bool,
    /// From the trigger until every component settled
    pub shutdown_duration: Duration,
    /// From `run` being called until the report was built
    pub uptime: Duration,
}

impl ShutdownReport {
    pub fn component(&self, name: &str) -> Option<&ComponentReport> {
        self.components.iter().find(|c| c.name == name)
    }

    /// Every error observed, the triggering one first
    pub fn errors(&self) -> Vec<String> {
        let mut errors = Vec::new();

        match &self.trigger {
            ShutdownTrigger::LaunchFailed { .. } => errors.push(self.trigger.to_string()),
            ShutdownTrigger::ComponentFailed { component, .. } => {
                if let Some(report) = self.component(component) {
                    if let Some(message) = describe_run(&report.run) {
                        errors.push(format!("{}: {}", component, message));
                    }
                }
            }
            _ => {}
        }

        for report in &self.components {
            let is_trigger = matches!(
                &self.trigger,
                ShutdownTrigger::ComponentFailed { component, .. } if *component == report.name
            );
            if !is_trigger {
                if let Some(message) = describe_run(&report.run) {
                    errors.push(format!("{}: {}", report.name, message));
                }
            }
            match &report.stop {
                Some(StopOutcome::Failed(message)) => {
                    errors.push(format!("{}: stop failed: {}", report.name, message))
                }
                Some(StopOutcome::TimedOut) => {
                    errors.push(format!("{}: stop timed out", report.name))
                }
                Some(StopOutcome::Abandoned) => {
                    errors.push(format!("{}: stop abandoned", report.name))
                }
                Some(StopOutcome::Stopped) | None => {}
            }
        }

        if self.forced {
            errors.push("shutdown forced by repeated termination request".to_string());
        }

        errors
    }

    /// Surface the outcome to the operator
    pub fn log_summary(&self) {
        let errors = self.errors();
        for message in &errors {
            error!("{}", message);
        }

        if errors.is_empty() {
            info!(
                cause = %self.trigger,
                shutdown_ms = self.shutdown_duration.as_millis() as u64,
                uptime_ms = self.uptime.as_millis() as u64,
                "shutdown complete"
            );
        } else {
            warn!(
                cause = %self.trigger,
                errors = errors.len(),
                shutdown_ms = self.shutdown_duration.as_millis() as u64,
                uptime_ms = self.uptime.as_millis() as u64,
                "shutdown complete with errors"
            );
        }
    }
}

fn describe_run(outcome: &RunOutcome) -> Option<String> {
    match outcome {
        RunOutcome::Failed(message) => Some(message.clone()),
        RunOutcome::Panicked(message) => Some(format!("panicked: {}", message)),
        RunOutcome::Abandoned => Some("abandoned after shutdown deadline".to_string()),
        RunOutcome::NotStarted | RunOutcome::Completed => None,
    }
}
