//! Cadence Playback crate - interaction tracking, pacing and cancellation.
//!
//! Packets from the remote character service are grouped into utterances and
//! interactions, filtered for the bound session, and paced out to listeners
//! one utterance at a time. Two pacing strategies are provided: estimated
//! reading time ([`SessionTracker`]) and media-completion signals
//! ([`PlaybackPacer`]).

pub mod container;
pub mod error;
pub mod feed;
pub mod interaction;
pub mod listener;
pub mod pacing;
pub mod state;
pub mod tracker;
pub mod utterance;

#[cfg(test)]
mod test_support;

pub use container::{Containable, OrderedContainer};
pub use error::PlaybackError;
pub use feed::{packet_feed, PacketReceiver, PacketSender};
pub use interaction::{Interaction, Placement};
pub use listener::{EventRecorder, PlaybackListener, UpstreamSink};
pub use pacing::{MediaPacing, Pace, PacingStrategy, TextPacing};
pub use state::InteractionStatus;
pub use tracker::{PlaybackPacer, SessionTracker, UtteranceRef};
pub use utterance::Utterance;
