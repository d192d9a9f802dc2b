use thiserror::Error;

use cadence_core::error::CadenceError;

use crate::state::InteractionStatus;

/// Errors from the playback engine and its collaborators.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PlaybackError {
    #[error("packet feed is closed")]
    FeedClosed,

    #[error("upstream channel is closed")]
    UpstreamClosed,

    #[error("listener failed: {0}")]
    Listener(String),

    #[error("invalid interaction transition: {from} -> {to}")]
    InvalidTransition {
        from: InteractionStatus,
        to: InteractionStatus,
    },

    #[error(transparent)]
    Core(#[from] CadenceError),
}
