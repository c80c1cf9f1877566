use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Created,
    Patched,
    Launched,
    Ready,
    InUse,
    TornDown,
}

impl LifecycleState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Patched => "patched",
            Self::Launched => "launched",
            Self::Ready => "ready",
            Self::InUse => "in_use",
            Self::TornDown => "torn_down",
        }
    }

    /// A process may be live in this state.
    pub fn is_running(self) -> bool {
        matches!(self, Self::Launched | Self::Ready | Self::InUse)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Patch,
    Launch,
    AwaitReady,
    AcquireClient,
    Stop,
    TearDown,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Patch => "patch",
            Self::Launch => "launch",
            Self::AwaitReady => "await_ready",
            Self::AcquireClient => "acquire_client",
            Self::Stop => "stop",
            Self::TearDown => "tear_down",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State reached by applying `action` in `from`, or `None` when the action
/// is not allowed there.
pub fn next_state(from: LifecycleState, action: Action) -> Option<LifecycleState> {
    use Action::*;
    use LifecycleState::*;

    match (from, action) {
        (Created | Patched, Patch) => Some(Patched),
        (Created | Patched, Launch) => Some(Launched),
        (Launched, AwaitReady) => Some(Ready),
        (Ready | InUse, AwaitReady) => Some(from),
        (Ready | InUse, AcquireClient) => Some(InUse),
        (Launched | Ready | InUse, Stop) => Some(Patched),
        (_, TearDown) => Some(TornDown),
        _ => None,
    }
}
