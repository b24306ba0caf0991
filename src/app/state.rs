use super::{ComponentState, LifecyclePhase, Orchestrator};
use std::collections::HashMap;
use tokio::sync::watch;
use tracing::debug;

impl Orchestrator {
    /// Update component state
    pub fn set_component_state(&self, component: &str, state: ComponentState) {
        let mut states = self.component_states.lock();
        debug!("Component '{}' state changed to: {:?}", component, state);
        states.insert(component.to_string(), state);
    }

    /// Get component state
    pub fn get_component_state(&self, component: &str) -> Option<ComponentState> {
        self.component_states.lock().get(component).cloned()
    }

    /// Get all component states
    pub fn get_all_component_states(&self) -> HashMap<String, ComponentState> {
        self.component_states.lock().clone()
    }

    pub fn phase(&self) -> LifecyclePhase {
        *self.phase.borrow()
    }

    /// Follow phase transitions, e.g. from another task while `run` is in progress
    pub fn subscribe_phase(&self) -> watch::Receiver<LifecyclePhase> {
        self.phase.subscribe()
    }

    pub(super) fn set_phase(&self, phase: LifecyclePhase) {
        debug!("Orchestrator phase changed to: {:?}", phase);
        self.phase.send_replace(phase);
    }
}
