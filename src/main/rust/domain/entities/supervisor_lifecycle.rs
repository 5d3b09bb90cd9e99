use std::time::Instant;

use crate::domain::value_objects::SupervisorState;

/// History is capped so a flapping connection cannot grow it without bound
const MAX_HISTORY: usize = 256;

/// State transition record
#[derive(Debug, Clone)]
pub struct StateTransition {
    pub from: SupervisorState,
    pub to: SupervisorState,
    pub timestamp: Instant,
    pub reason: Option<String>,
}

/// Domain entity representing the supervisor's state machine history
#[derive(Debug)]
pub struct SupervisorLifecycle {
    current_state: SupervisorState,
    state_history: Vec<StateTransition>,
    started_at: Option<Instant>,
}

impl SupervisorLifecycle {
    pub fn new() -> Self {
        Self {
            current_state: SupervisorState::Idle,
            state_history: Vec::new(),
            started_at: None,
        }
    }

    pub fn current_state(&self) -> &SupervisorState {
        &self.current_state
    }

    pub fn uptime(&self) -> Option<std::time::Duration> {
        self.started_at.map(|start| start.elapsed())
    }

    pub fn transition_count(&self) -> usize {
        self.state_history.len()
    }

    pub fn last_transition(&self) -> Option<&StateTransition> {
        self.state_history.last()
    }

    pub fn transition_to_warming(&mut self) {
        self.record_transition(SupervisorState::Warming, None);
    }

    pub fn transition_to_loading(&mut self, reason: Option<String>) {
        self.record_transition(SupervisorState::Loading, reason);
    }

    pub fn transition_to_active(&mut self) {
        self.record_transition(SupervisorState::Active, None);

        // Track start time when first becoming active
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
    }

    pub fn transition_to_retrying(&mut self, attempt: u32, reason: Option<String>) {
        self.record_transition(SupervisorState::Retrying { attempt }, reason);
    }

    pub fn transition_to_failed(&mut self, reason: Option<String>) {
        self.record_transition(SupervisorState::Failed, reason);
    }

    pub fn transition_to_idle(&mut self, reason: Option<String>) {
        self.record_transition(SupervisorState::Idle, reason);
    }

    fn record_transition(&mut self, new_state: SupervisorState, reason: Option<String>) {
        let transition = StateTransition {
            from: self.current_state,
            to: new_state,
            timestamp: Instant::now(),
            reason,
        };

        if self.state_history.len() == MAX_HISTORY {
            self.state_history.remove(0);
        }
        self.state_history.push(transition);
        self.current_state = new_state;
    }
}

impl Default for SupervisorLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
