use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Lifecycle of one session's frame loop. `Stopped` and `Error` are terminal;
/// retrying requires a new session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopState {
    Idle,
    Initializing,
    Running,
    Stopped,
    Error,
}

impl LoopState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoopState::Stopped | LoopState::Error)
    }

    pub fn can_transition_to(&self, next: LoopState) -> bool {
        use LoopState::*;
        matches!(
            (self, next),
            (Idle, Initializing)
                | (Idle, Stopped)
                | (Initializing, Running)
                | (Initializing, Stopped)
                | (Initializing, Error)
                | (Running, Stopped)
                | (Running, Error)
        )
    }
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LoopState::Idle => "idle",
            LoopState::Initializing => "initializing",
            LoopState::Running => "running",
            LoopState::Stopped => "stopped",
            LoopState::Error => "error",
        };
        write!(f, "{}", name)
    }
}

/// Shared loop state with validated transitions
#[derive(Debug)]
pub struct LoopStateCell {
    state: Mutex<LoopState>,
}

impl LoopStateCell {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LoopState::Idle),
        }
    }

    pub fn get(&self) -> LoopState {
        *self.state.lock()
    }

    /// Move to `next`, returning the previous state. An invalid transition
    /// leaves the state untouched and returns it as the error.
    pub fn transition(&self, next: LoopState) -> Result<LoopState, LoopState> {
        let mut state = self.state.lock();
        let current = *state;
        if !current.can_transition_to(next) {
            if current != next {
                warn!("Rejected loop state transition {} -> {}", current, next);
            }
            return Err(current);
        }
        *state = next;
        debug!("Loop state {} -> {}", current, next);
        Ok(current)
    }
}

impl Default for LoopStateCell {
    fn default() -> Self {
        Self::new()
    }
}
