//! Server lifecycle state machine.
//!
//! ```text
//! Stopped  -> Running            (start)
//! Running  -> Stopping           (stop)
//! Stopping -> Stopped            (worker exited)
//! ```
//!
//! `start` on a running server and `stop` on a stopped server are handled as
//! no-ops by the server before a transition is attempted.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TaskServerError;

/// Lifecycle state of a [`TaskServer`](crate::TaskServer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerState {
    Stopped,
    Running,
    Stopping,
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServerState::Stopped => "stopped",
            ServerState::Running => "running",
            ServerState::Stopping => "stopping",
        };
        f.write_str(s)
    }
}

/// Validate a lifecycle transition.
///
/// Returns `Ok(())` if the transition is valid, or
/// `Err(TaskServerError::InvalidTransition)` if not.
pub fn validate_transition(from: ServerState, to: ServerState) -> Result<(), TaskServerError> {
    match (from, to) {
        (ServerState::Stopped, ServerState::Running)
        | (ServerState::Running, ServerState::Stopping)
        | (ServerState::Stopping, ServerState::Stopped) => Ok(()),
        _ => Err(TaskServerError::InvalidTransition {
            current: from,
            requested: to,
        }),
    }
}

/// Returns `true` if submissions are accepted in this state.
pub fn accepts_submissions(state: ServerState) -> bool {
    matches!(state, ServerState::Running)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ServerState; 3] = [
        ServerState::Stopped,
        ServerState::Running,
        ServerState::Stopping,
    ];

    #[test]
    fn test_valid_lifecycle_transitions() {
        assert!(validate_transition(ServerState::Stopped, ServerState::Running).is_ok());
        assert!(validate_transition(ServerState::Running, ServerState::Stopping).is_ok());
        assert!(validate_transition(ServerState::Stopping, ServerState::Stopped).is_ok());
    }

    #[test]
    fn test_invalid_transitions_rejected() {
        let valid = [
            (ServerState::Stopped, ServerState::Running),
            (ServerState::Running, ServerState::Stopping),
            (ServerState::Stopping, ServerState::Stopped),
        ];
        for from in ALL {
            for to in ALL {
                if valid.contains(&(from, to)) {
                    continue;
                }
                match validate_transition(from, to) {
                    Err(TaskServerError::InvalidTransition { current, requested }) => {
                        assert_eq!(current, from);
                        assert_eq!(requested, to);
                    }
                    other => panic!("Expected InvalidTransition for {from} -> {to}, got: {other:?}"),
                }
            }
        }
    }

    #[test]
    fn test_only_running_accepts_submissions() {
        assert!(accepts_submissions(ServerState::Running));
        assert!(!accepts_submissions(ServerState::Stopping));
        assert!(!accepts_submissions(ServerState::Stopped));
    }
}
