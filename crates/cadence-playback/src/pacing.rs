//! How long an utterance holds the floor before the next one is dispatched.

use std::time::Duration;

use cadence_core::PlaybackConfig;

use crate::utterance::Utterance;

/// What the tracker waits for after dispatching an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pace {
    /// Advance once this much tick time has elapsed.
    Countdown(Duration),
    /// Advance when the presentation layer reports the media finished.
    AwaitSignal,
}

/// Pacing policy plugged into the session tracker.
pub trait PacingStrategy {
    /// Whether a prepared utterance may be queued for playback yet.
    fn is_eligible(&self, utterance: &Utterance) -> bool;

    /// Pace for an utterance that is about to be dispatched.
    fn pace(&self, utterance: &Utterance) -> Pace;
}

/// Estimates duration from content length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextPacing {
    seconds_per_character: f32,
    speed_multiplier: f32,
}

impl TextPacing {
    pub fn new(seconds_per_character: f32, speed_multiplier: f32) -> Self {
        Self {
            seconds_per_character,
            speed_multiplier,
        }
    }

    pub fn from_config(config: &PlaybackConfig) -> Self {
        Self::new(
            config.seconds_per_character,
            config.text_pace_speed_multiplier,
        )
    }

    /// Presentation time for `characters` characters. Invalid settings yield zero.
    pub fn duration_for(&self, characters: usize) -> Duration {
        let secs = characters as f32 * self.seconds_per_character / self.speed_multiplier;
        Duration::try_from_secs_f32(secs).unwrap_or(Duration::ZERO)
    }
}

impl Default for TextPacing {
    fn default() -> Self {
        Self::from_config(&PlaybackConfig::default())
    }
}

impl PacingStrategy for TextPacing {
    fn is_eligible(&self, utterance: &Utterance) -> bool {
        utterance.has_content()
    }

    fn pace(&self, utterance: &Utterance) -> Pace {
        Pace::Countdown(self.duration_for(utterance.content_length()))
    }
}

/// Holds text until its audio arrives, then waits for the audio to finish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MediaPacing;

impl PacingStrategy for MediaPacing {
    fn is_eligible(&self, utterance: &Utterance) -> bool {
        utterance.has_text() && utterance.has_audio()
    }

    fn pace(&self, utterance: &Utterance) -> Pace {
        match utterance.audio_duration() {
            Some(secs) if secs > 0.0 => Pace::AwaitSignal,
            _ => Pace::Countdown(Duration::ZERO),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
