//! Mapping from the aggregated shutdown outcome to the process exit status.

use super::types::{RunOutcome, ShutdownReport, ShutdownTrigger};
use std::process::ExitCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Failure,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::Failure => 1,
        }
    }

    pub fn is_success(self) -> bool {
        self == ExitStatus::Success
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status.code())
    }
}

/// Decides the exit status from structured outcome data only
pub struct ExitPolicy;

impl ExitPolicy {
    /// Failure when startup failed, any `run` failed, panicked or was
    /// abandoned, any stop failed or timed out, or the shutdown was forced.
    /// Success otherwise, including a component that finished cleanly on its own.
    pub fn evaluate(report: &ShutdownReport) -> ExitStatus {
        if report.forced {
            return ExitStatus::Failure;
        }

        match report.trigger {
            ShutdownTrigger::LaunchFailed { .. } | ShutdownTrigger::ComponentFailed { .. } => {
                return ExitStatus::Failure
            }
            ShutdownTrigger::Signal(_) | ShutdownTrigger::ComponentExited { .. } => {}
        }

        let component_failed = report.components.iter().any(|component| {
            component.run.is_error()
                || component.stop.as_ref().is_some_and(|stop| stop.is_error())
        });

        if component_failed {
            ExitStatus::Failure
        } else {
            ExitStatus::Success
        }
    }
}

impl ShutdownReport {
    pub fn exit_status(&self) -> ExitStatus {
        ExitPolicy::evaluate(self)
    }

    /// Whether any component's `run` is still unaccounted for
    pub fn has_abandoned_runs(&self) -> bool {
        self.components
            .iter()
            .any(|component| component.run == RunOutcome::Abandoned)
    }
}
