use serde::{Deserialize, Serialize};

use crate::types::{HistoryItem, Packet};

/// Events emitted by the playback engine to UI, animation and audio consumers.
///
/// Listeners receive them synchronously on the tick thread, in emission order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum PlaybackEvent {
    /// One pacing step: the packets of a single utterance (or a single
    /// side-channel packet) in arrival order.
    Dispatch { packets: Vec<Packet> },

    /// The character started or stopped speaking.
    SpeakingChanged { speaking: bool },

    /// The visible history changed. Items are most-recent-first.
    HistoryChanged { items: Vec<HistoryItem> },

    /// An interaction began playback.
    InteractionStarted {
        interaction_id: String,
        sequence_number: u64,
    },

    /// An interaction received its end marker and finished playing.
    InteractionCompleted { interaction_id: String },

    /// An interaction was interrupted by a cancel request.
    InteractionCancelled { interaction_id: String, hard: bool },
}

impl PlaybackEvent {
    /// Returns a short, stable name for this event type (useful for logging).
    pub fn event_name(&self) -> &'static str {
        match self {
            PlaybackEvent::Dispatch { .. } => "dispatch",
            PlaybackEvent::SpeakingChanged { .. } => "speaking_changed",
            PlaybackEvent::HistoryChanged { .. } => "history_changed",
            PlaybackEvent::InteractionStarted { .. } => "interaction_started",
            PlaybackEvent::InteractionCompleted { .. } => "interaction_completed",
            PlaybackEvent::InteractionCancelled { .. } => "interaction_cancelled",
        }
    }

    /// The dispatched packets, if this is a dispatch event.
    pub fn packets(&self) -> Option<&[Packet]> {
        match self {
            PlaybackEvent::Dispatch { packets } => Some(packets),
            _ => None,
        }
    }
}
