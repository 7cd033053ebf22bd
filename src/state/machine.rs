use super::error::{StateError, StateResult};
use super::{event::StateTransition, CoreEvent, CoreState};

#[derive(Debug)]
pub struct StateMachine {
    state: CoreState,
    transition_history: Vec<StateTransition>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: CoreState::default(),
            transition_history: Vec::new(),
        }
    }

    pub fn state(&self) -> CoreState {
        self.state
    }

    pub fn can_transition(&self, event: CoreEvent) -> bool {
        self.next_state(event).is_some()
    }

    pub fn next_state(&self, event: CoreEvent) -> Option<CoreState> {
        use CoreEvent::*;
        use CoreState::*;
        match (self.state, event) {
            (Idle | Previewing, RequestGrab) => Some(GrabPending),
            (Idle | GrabPending | Previewing, OpenPreview) => Some(Previewing),
            (GrabPending, AwaitNotification) => Some(AwaitingNotification),
            (GrabPending, GrabFailed) => Some(Idle),
            (Idle | GrabPending | Previewing | AwaitingNotification, Finish) => Some(Finished),
            _ => None,
        }
    }

    pub fn transition(&mut self, event: CoreEvent) -> StateResult<CoreState> {
        tracing::debug!(from = ?self.state, event = ?event, "request state transition");
        let next = self.next_state(event).ok_or_else(|| {
            let from = self.state;
            tracing::warn!(from = ?from, event = ?event, "invalid state transition requested");
            StateError::InvalidStateTransition { from, event }
        })?;

        let record = StateTransition::new(Some(self.state), event, next);
        self.state = next;
        self.transition_history.push(record);

        Ok(self.state)
    }

    pub fn history(&self) -> &[StateTransition] {
        &self.transition_history
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for StateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CoreState::{:?}", self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_transition_tracks_valid_and_invalid_events() {
        let mut machine = StateMachine::new();
        assert!(machine.can_transition(CoreEvent::RequestGrab));
        assert!(machine.can_transition(CoreEvent::OpenPreview));
        assert!(!machine.can_transition(CoreEvent::AwaitNotification));
        assert!(!machine.can_transition(CoreEvent::GrabFailed));

        machine
            .transition(CoreEvent::RequestGrab)
            .expect("idle -> grab pending should transition");

        assert!(!machine.can_transition(CoreEvent::RequestGrab));
        assert!(machine.can_transition(CoreEvent::AwaitNotification));
        assert!(machine.can_transition(CoreEvent::GrabFailed));
    }

    #[test]
    fn transition_records_history_with_ordered_entries() {
        let mut machine = StateMachine::new();
        for event in [
            CoreEvent::RequestGrab,
            CoreEvent::OpenPreview,
            CoreEvent::RequestGrab,
            CoreEvent::AwaitNotification,
            CoreEvent::Finish,
        ] {
            machine.transition(event).expect("valid transition");
        }

        assert_eq!(machine.state(), CoreState::Finished);
        assert_eq!(
            machine.history(),
            &[
                StateTransition::new(
                    Some(CoreState::Idle),
                    CoreEvent::RequestGrab,
                    CoreState::GrabPending
                ),
                StateTransition::new(
                    Some(CoreState::GrabPending),
                    CoreEvent::OpenPreview,
                    CoreState::Previewing
                ),
                StateTransition::new(
                    Some(CoreState::Previewing),
                    CoreEvent::RequestGrab,
                    CoreState::GrabPending
                ),
                StateTransition::new(
                    Some(CoreState::GrabPending),
                    CoreEvent::AwaitNotification,
                    CoreState::AwaitingNotification
                ),
                StateTransition::new(
                    Some(CoreState::AwaitingNotification),
                    CoreEvent::Finish,
                    CoreState::Finished
                ),
            ]
        );
    }

    #[test]
    fn finished_is_terminal() {
        let mut machine = StateMachine::new();
        machine.transition(CoreEvent::Finish).expect("idle -> finished");
        assert!(machine.state().is_terminal());
        for event in [
            CoreEvent::RequestGrab,
            CoreEvent::OpenPreview,
            CoreEvent::AwaitNotification,
            CoreEvent::GrabFailed,
            CoreEvent::Finish,
        ] {
            assert!(!machine.can_transition(event), "{event:?}");
        }
    }

    #[test]
    fn invalid_transition_returns_error_without_mutating_history() {
        let mut machine = StateMachine::new();

        let err = machine
            .transition(CoreEvent::AwaitNotification)
            .expect_err("idle -> awaiting notification should fail");
        assert!(matches!(
            err,
            StateError::InvalidStateTransition {
                from: CoreState::Idle,
                event: CoreEvent::AwaitNotification
            }
        ));
        assert_eq!(machine.state(), CoreState::Idle);
        assert!(machine.history().is_empty());
    }
}
