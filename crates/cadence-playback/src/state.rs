//! Interaction lifecycle.
//!
//! Valid transitions:
//! - Created -> Started (first utterance dispatched)
//! - Created -> Completed (end marker arrived with nothing to play)
//! - Started -> Completed (end marker arrived and the last utterance played)
//! - Created -> Cancelled, Started -> Cancelled (cancel request)
//!
//! Completed and Cancelled are terminal.

use std::fmt;

/// Lifecycle status of an interaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum InteractionStatus {
    /// Packets have arrived but nothing has been dispatched yet.
    #[default]
    Created,
    /// At least one utterance has been dispatched.
    Started,
    /// The end marker arrived and every queued utterance played.
    Completed,
    /// The interaction was cancelled; further content is discarded.
    Cancelled,
}

impl fmt::Display for InteractionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InteractionStatus::Created => write!(f, "Created"),
            InteractionStatus::Started => write!(f, "Started"),
            InteractionStatus::Completed => write!(f, "Completed"),
            InteractionStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl InteractionStatus {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &InteractionStatus) -> bool {
        matches!(
            (self, target),
            (InteractionStatus::Created, InteractionStatus::Started)
                | (InteractionStatus::Started, InteractionStatus::Completed)
                | (InteractionStatus::Created, InteractionStatus::Completed)
                // Cancel transitions
                | (InteractionStatus::Created, InteractionStatus::Cancelled)
                | (InteractionStatus::Started, InteractionStatus::Cancelled)
        )
    }

    /// No transition leaves a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InteractionStatus::Completed | InteractionStatus::Cancelled
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
