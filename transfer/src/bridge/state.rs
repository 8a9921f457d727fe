use std::fmt;

/// Lifecycle of the loader task behind an output bridge.
///
/// Transitions only move forward: `NotStarted -> Running -> {Done, Failed}`. A bridge cancelled
/// before its first write goes straight from `NotStarted` to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoaderState {
    NotStarted,
    Running,
    Done,
    Failed,
}

impl LoaderState {
    /// Returns `true` for `Done` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, LoaderState::Done | LoaderState::Failed)
    }

    /// Returns `true` when moving from `self` to `next` is allowed.
    pub fn can_transition_to(self, next: LoaderState) -> bool {
        matches!(
            (self, next),
            (LoaderState::NotStarted, LoaderState::Running)
                | (LoaderState::NotStarted, LoaderState::Failed)
                | (LoaderState::Running, LoaderState::Done)
                | (LoaderState::Running, LoaderState::Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LoaderState::NotStarted => "not_started",
            LoaderState::Running => "running",
            LoaderState::Done => "done",
            LoaderState::Failed => "failed",
        }
    }
}

impl fmt::Display for LoaderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
