/// Lifecycle of one screenshot session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CoreState {
    #[default]
    Idle,
    GrabPending,
    Previewing,
    AwaitingNotification,
    Finished,
}

impl CoreState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, CoreState::Finished)
    }
}
