use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{CadenceError, Result};

/// Top-level configuration for Cadence.
///
/// Loaded from `~/.cadence/config.toml` by default. Missing sections and
/// fields fall back to their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CadenceConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
}

impl CadenceConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: CadenceConfig = toml::from_str(&content)?;
        config.playback.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| CadenceError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// How the tracker decides an utterance has finished presenting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacingMode {
    /// Estimate duration from content length.
    #[default]
    Text,
    /// Wait for the presentation layer to report that the audio finished.
    Media,
}

/// Playback engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Number of interactions kept in history.
    pub max_history_size: usize,
    /// Whether the character may be interrupted with a cancel.
    pub interruptible: bool,
    /// Divides the estimated text duration. 2.0 plays twice as fast.
    pub text_pace_speed_multiplier: f32,
    /// Estimated reading time per character, in seconds.
    pub seconds_per_character: f32,
    /// Endpoint id used as the source of outbound packets.
    pub player_id: String,
    /// Pacing strategy.
    pub pacing: PacingMode,
    /// Interval between ticks when driven by the bundled runner.
    pub tick_interval_ms: u64,
    /// Start the next utterance of an interaction without waiting for the
    /// consumer to ask for it.
    pub auto_proceed: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            max_history_size: 100,
            interruptible: true,
            text_pace_speed_multiplier: 1.0,
            seconds_per_character: 0.05,
            player_id: "player".to_string(),
            pacing: PacingMode::Text,
            tick_interval_ms: 16,
            auto_proceed: true,
        }
    }
}

impl PlaybackConfig {
    /// Reject values that would stall or divide by zero in the pacing loop.
    pub fn validate(&self) -> Result<()> {
        if self.max_history_size == 0 {
            return Err(CadenceError::Config(
                "max_history_size must be at least 1".to_string(),
            ));
        }
        let multiplier = self.text_pace_speed_multiplier;
        if multiplier.is_nan() || multiplier <= 0.0 {
            return Err(CadenceError::Config(format!(
                "text_pace_speed_multiplier must be positive, got {}",
                multiplier
            )));
        }
        if self.seconds_per_character.is_nan() || self.seconds_per_character < 0.0 {
            return Err(CadenceError::Config(format!(
                "seconds_per_character must not be negative, got {}",
                self.seconds_per_character
            )));
        }
        if self.tick_interval_ms == 0 {
            return Err(CadenceError::Config(
                "tick_interval_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
