//! Config Entry State Machine
//!
//! ```text
//! NotLoaded → SetupInProgress → Loaded
//!                            ↘ SetupError → SetupInProgress (retry)
//!
//! Loaded/SetupError → UnloadInProgress → NotLoaded
//!                                      ↘ FailedUnload (terminal)
//! ```

use crate::entry::ConfigEntryState;
use thiserror::Error;

/// Error when an invalid state transition is attempted
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Invalid state transition from {from:?} to {to:?}: {reason}")]
pub struct InvalidTransition {
    pub from: ConfigEntryState,
    pub to: ConfigEntryState,
    pub reason: &'static str,
}

impl ConfigEntryState {
    /// Attempt a transition to a new state.
    pub fn try_transition(
        self,
        to: ConfigEntryState,
    ) -> Result<ConfigEntryState, InvalidTransition> {
        use ConfigEntryState::*;

        let valid = matches!(
            (self, to),
            (NotLoaded, SetupInProgress)
                | (SetupInProgress, Loaded)
                | (SetupInProgress, SetupError)
                | (SetupError, SetupInProgress)
                | (SetupError, UnloadInProgress)
                | (Loaded, UnloadInProgress)
                | (UnloadInProgress, NotLoaded)
                | (UnloadInProgress, FailedUnload)
        );

        if valid {
            Ok(to)
        } else {
            Err(InvalidTransition {
                from: self,
                to,
                reason: Self::transition_error_reason(self, to),
            })
        }
    }

    pub fn can_transition_to(self, to: ConfigEntryState) -> bool {
        self.try_transition(to).is_ok()
    }

    fn transition_error_reason(from: ConfigEntryState, to: ConfigEntryState) -> &'static str {
        use ConfigEntryState::*;

        match (from, to) {
            (FailedUnload, _) => "FailedUnload is terminal - entry cannot recover",
            (SetupInProgress, NotLoaded) => {
                "Setup in progress - must complete before returning to NotLoaded"
            }
            (UnloadInProgress, Loaded) => "Unload in progress - cannot go back to Loaded",
            (NotLoaded, Loaded) => "Cannot jump to Loaded - must go through SetupInProgress",
            (Loaded, NotLoaded) => "Cannot jump to NotLoaded - must go through UnloadInProgress",
            (Loaded, SetupInProgress) => "Already loaded - unload first before re-setup",
            _ => "Invalid state transition",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConfigEntryState::*;

    #[test]
    fn test_reload_path() {
        // Loaded -> UnloadInProgress -> NotLoaded -> SetupInProgress -> Loaded
        let state = Loaded;
        let state = state.try_transition(UnloadInProgress).unwrap();
        let state = state.try_transition(NotLoaded).unwrap();
        let state = state.try_transition(SetupInProgress).unwrap();
        let state = state.try_transition(Loaded).unwrap();
        assert_eq!(state, Loaded);
    }

    #[test]
    fn test_setup_error_can_retry_or_unload() {
        assert!(SetupError.can_transition_to(SetupInProgress));
        assert!(SetupError.can_transition_to(UnloadInProgress));
    }

    #[test]
    fn test_loaded_cannot_skip_unload() {
        let err = Loaded.try_transition(NotLoaded).unwrap_err();
        assert_eq!(err.from, Loaded);
        assert_eq!(err.to, NotLoaded);
        assert!(err.reason.contains("UnloadInProgress"));
        assert!(!Loaded.can_transition_to(SetupInProgress));
    }

    #[test]
    fn test_failed_unload_is_terminal() {
        for to in [NotLoaded, SetupInProgress, Loaded, SetupError, UnloadInProgress] {
            let err = FailedUnload.try_transition(to).unwrap_err();
            assert!(err.reason.contains("terminal"));
        }
    }
}
