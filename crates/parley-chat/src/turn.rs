//! Per-turn lifecycle.
//!
//! - Idle -> Submitting (first submission)
//! - Submitting -> Succeeded (agent message appended)
//! - Submitting -> Failed (error message appended)
//! - Succeeded / Failed -> Submitting (next submission or retry)

use std::fmt;

/// Where the session is in its current turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TurnState {
    #[default]
    Idle,
    /// A request is in flight. New submissions are rejected.
    Submitting,
    Succeeded,
    Failed,
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnState::Idle => write!(f, "Idle"),
            TurnState::Submitting => write!(f, "Submitting"),
            TurnState::Succeeded => write!(f, "Succeeded"),
            TurnState::Failed => write!(f, "Failed"),
        }
    }
}

impl TurnState {
    pub fn can_transition_to(&self, target: &TurnState) -> bool {
        matches!(
            (self, target),
            (TurnState::Idle, TurnState::Submitting)
                | (TurnState::Succeeded, TurnState::Submitting)
                | (TurnState::Failed, TurnState::Submitting)
                | (TurnState::Submitting, TurnState::Succeeded)
                | (TurnState::Submitting, TurnState::Failed)
        )
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, TurnState::Submitting)
    }
}
