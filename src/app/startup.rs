use super::types::RunOutcome;
use super::{ComponentState, Orchestrator};
use crate::error::{ProcessorError, Result};
use futures::FutureExt;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::task::{self, JoinSet};
use tracing::{error, info, info_span, Instrument};

/// What a component task reports when its `run` returns
pub(super) struct TaskExit {
    pub(super) index: usize,
    pub(super) outcome: RunOutcome,
}

/// Spawned `run` tasks and the component index behind each task id
pub(super) struct ComponentTasks {
    pub(super) set: JoinSet<TaskExit>,
    pub(super) indices: HashMap<task::Id, usize>,
}

impl Orchestrator {
    /// Prepare every component in registration order, then spawn each `run`.
    ///
    /// Nothing is spawned unless every component prepared successfully.
    /// Components prepared before a failure are released again.
    pub(super) async fn launch(&self) -> Result<ComponentTasks> {
        if self.launched.swap(true, Ordering::SeqCst) {
            return Err(ProcessorError::launch(
                "orchestrator",
                "components have already been launched",
            ));
        }
        self.check_components()?;

        for (prepared, component) in self.components.iter().enumerate() {
            let name = component.name();
            self.set_component_state(name, ComponentState::Starting);

            if let Err(e) = component.prepare().await {
                self.set_component_state(name, ComponentState::Failed);
                error!("Failed to launch {} component: {}", name, e);
                self.release_prepared(prepared);
                return Err(match e {
                    ProcessorError::Launch { .. } => e,
                    other => ProcessorError::launch(name, other.to_string()),
                });
            }
        }

        let mut set = JoinSet::new();
        let mut indices = HashMap::new();
        for (index, component) in self.components.iter().enumerate() {
            let name = component.name().to_string();
            let token = self.shutdown.child_token();
            let component = Arc::clone(component);
            let span = info_span!("component", name = %name);

            let handle = set.spawn(
                async move {
                    let outcome = match AssertUnwindSafe(component.run(token))
                        .catch_unwind()
                        .await
                    {
                        Ok(Ok(())) => RunOutcome::Completed,
                        Ok(Err(e)) => RunOutcome::Failed(e.to_string()),
                        Err(panic) => RunOutcome::Panicked(panic_message(panic)),
                    };
                    TaskExit { index, outcome }
                }
                .instrument(span),
            );
            indices.insert(handle.id(), index);

            self.set_component_state(&name, ComponentState::Running);
            metrics::gauge!("processor_components_running").increment(1.0);
            info!("{} component started", name);
        }

        Ok(ComponentTasks { set, indices })
    }

    /// Undo `prepare` for the first `count` components, in reverse order
    fn release_prepared(&self, count: usize) {
        for component in self.components[..count].iter().rev() {
            info!("Releasing {} component", component.name());
            component.release();
            self.set_component_state(component.name(), ComponentState::Stopped);
        }
    }

    fn check_components(&self) -> Result<()> {
        if self.components.is_empty() {
            return Err(ProcessorError::launch(
                "orchestrator",
                "no components registered",
            ));
        }

        let mut seen = HashSet::new();
        for component in &self.components {
            if !seen.insert(component.name()) {
                return Err(ProcessorError::launch(
                    component.name(),
                    "duplicate component name",
                ));
            }
        }

        Ok(())
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
