use thiserror::Error;

/// Supervisor lifecycle states. `Stopped` and `Failed` are terminal;
/// `Failed` and `Terminating` are reachable from every non-terminal
/// state, since both an error and a shutdown request can arrive at any
/// point of the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Resolving,
    Fetching,
    Launching,
    Running,
    /// Output stream closed; waiting for the process to exit.
    Draining,
    /// Externally requested shutdown in progress.
    Terminating,
    Stopped,
    Failed,
}

impl State {
    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Stopped | State::Failed)
    }
}

#[derive(Error, Debug)]
pub enum TransitionError {
    #[error("invalid transition: {0:?} -> {1:?}")]
    InvalidTransition(State, State),
}

pub struct StateMachine {
    pub state: State,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self { state: State::Idle }
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn can_transition(&self, to: State) -> bool {
        if to == State::Failed || to == State::Terminating {
            return !self.state.is_terminal() && self.state != to;
        }
        matches!(
            (self.state, to),
            (State::Idle, State::Resolving)
                | (State::Resolving, State::Fetching)
                | (State::Fetching, State::Launching)
                | (State::Launching, State::Running)
                | (State::Running, State::Draining)
                | (State::Draining, State::Stopped)
                | (State::Terminating, State::Stopped)
        )
    }

    pub fn transition(&mut self, to: State) -> Result<(), TransitionError> {
        if self.can_transition(to) {
            tracing::info!("Supervisor state: {:?} -> {:?}", self.state, to);
            self.state = to;
            Ok(())
        } else {
            Err(TransitionError::InvalidTransition(self.state, to))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path() {
        let mut sm = StateMachine::new();
        assert_eq!(sm.state, State::Idle);
        for next in [
            State::Resolving,
            State::Fetching,
            State::Launching,
            State::Running,
            State::Draining,
            State::Stopped,
        ] {
            assert!(sm.transition(next).is_ok(), "expected {:?} to be reachable", next);
        }
        assert!(sm.state.is_terminal());
    }

    #[test]
    fn shutdown_path() {
        let mut sm = StateMachine::new();
        sm.transition(State::Resolving).unwrap();
        sm.transition(State::Fetching).unwrap();
        sm.transition(State::Launching).unwrap();
        sm.transition(State::Running).unwrap();
        sm.transition(State::Terminating).unwrap();
        sm.transition(State::Stopped).unwrap();
    }

    #[test]
    fn terminating_reachable_before_running() {
        // A shutdown request may land while we are still resolving,
        // fetching or launching; each of those aborts through
        // Terminating into Stopped.
        for start in [State::Idle, State::Resolving, State::Fetching, State::Launching] {
            let mut sm = StateMachine { state: start };
            assert!(sm.transition(State::Terminating).is_ok(), "{:?} -> Terminating", start);
            assert!(sm.transition(State::Stopped).is_ok());
        }
    }

    #[test]
    fn failed_reachable_from_any_non_terminal() {
        for start in [
            State::Idle,
            State::Resolving,
            State::Fetching,
            State::Launching,
            State::Running,
            State::Draining,
            State::Terminating,
        ] {
            let mut sm = StateMachine { state: start };
            assert!(sm.transition(State::Failed).is_ok(), "{:?} -> Failed", start);
        }
    }

    #[test]
    fn terminal_states_are_sinks() {
        for terminal in [State::Stopped, State::Failed] {
            let sm = StateMachine { state: terminal };
            for next in [State::Resolving, State::Running, State::Failed, State::Stopped] {
                assert!(!sm.can_transition(next), "{:?} -> {:?} must be rejected", terminal, next);
            }
        }
    }

    #[test]
    fn cannot_skip_states() {
        let mut sm = StateMachine::new();
        assert!(sm.transition(State::Running).is_err());
        assert!(sm.transition(State::Stopped).is_err());
    }
}
