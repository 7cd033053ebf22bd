use super::CoreState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoreEvent {
    RequestGrab,
    OpenPreview,
    AwaitNotification,
    GrabFailed,
    Finish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransition {
    pub from: Option<CoreState>,
    pub event: CoreEvent,
    pub to: CoreState,
}

impl StateTransition {
    pub const fn new(from: Option<CoreState>, event: CoreEvent, to: CoreState) -> Self {
        Self { from, event, to }
    }
}
