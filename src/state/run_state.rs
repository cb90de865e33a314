use crate::IndexerError;
use std::fmt;

/// Lifecycle of a crawl run
///
/// `Init -> Running -> {Drained | Cancelled | Failed} -> Terminated`, with
/// `Init -> Failed` when setup cannot complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    Init,
    Running,
    /// Frontier empty and nothing in flight
    Drained,
    /// Stop requested by the operator or a budget
    Cancelled,
    /// Unrecoverable setup error
    Failed,
    Terminated,
}

impl RunState {
    /// Returns true for the three outcomes a run can conclude with
    pub fn is_outcome(&self) -> bool {
        matches!(self, Self::Drained | Self::Cancelled | Self::Failed)
    }

    pub fn can_transition_to(&self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Init, Running)
                | (Init, Failed)
                | (Running, Drained)
                | (Running, Cancelled)
                | (Running, Failed)
                | (Drained, Terminated)
                | (Cancelled, Terminated)
                | (Failed, Terminated)
        )
    }

    /// Moves to `next`, rejecting transitions the lifecycle does not allow
    pub fn transition(self, next: RunState) -> Result<RunState, IndexerError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(IndexerError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Running => "RUNNING",
            Self::Drained => "DRAINED",
            Self::Cancelled => "CANCELLED",
            Self::Failed => "FAILED",
            Self::Terminated => "TERMINATED",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let state = RunState::Init;
        let state = state.transition(RunState::Running).unwrap();
        let state = state.transition(RunState::Drained).unwrap();
        assert!(state.is_outcome());
        let state = state.transition(RunState::Terminated).unwrap();
        assert_eq!(state, RunState::Terminated);
    }

    #[test]
    fn test_setup_failure_skips_running() {
        let state = RunState::Init.transition(RunState::Failed).unwrap();
        assert_eq!(state.transition(RunState::Terminated).unwrap(), RunState::Terminated);
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        assert!(matches!(
            RunState::Init.transition(RunState::Drained),
            Err(IndexerError::InvalidTransition {
                from: RunState::Init,
                to: RunState::Drained
            })
        ));
        assert!(RunState::Running.transition(RunState::Terminated).is_err());
        assert!(RunState::Drained.transition(RunState::Running).is_err());
        assert!(RunState::Terminated.transition(RunState::Running).is_err());
        assert!(RunState::Init.transition(RunState::Cancelled).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(RunState::Cancelled.to_string(), "CANCELLED");
    }
}
