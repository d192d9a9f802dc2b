//! CLI argument definitions for the Cadence player.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use cadence_core::config::{PacingMode, PlaybackConfig};

/// Cadence - replays a recorded packet stream through the playback engine.
#[derive(Parser, Debug)]
#[command(name = "cadence", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// JSON-lines packet script to replay.
    #[arg(short = 's', long = "script")]
    pub script: PathBuf,

    /// Character id to bind as the live session.
    #[arg(long = "session", default_value = "char-1")]
    pub session: String,

    /// Pacing strategy (overrides the config file).
    #[arg(long = "pacing", value_enum)]
    pub pacing: Option<PacingArg>,

    /// Text pace speed multiplier (overrides the config file).
    #[arg(long = "speed")]
    pub speed: Option<f32>,

    /// Hard-cancel the current interaction this many milliseconds after start.
    #[arg(long = "cancel-after-ms")]
    pub cancel_after_ms: Option<u64>,

    /// Hold between utterances until Enter is pressed.
    #[arg(long = "manual")]
    pub manual: bool,

    /// Print events as JSON lines instead of text.
    #[arg(long = "json")]
    pub json: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,
}

/// Command-line spelling of [`PacingMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PacingArg {
    Text,
    Media,
}

impl From<PacingArg> for PacingMode {
    fn from(arg: PacingArg) -> Self {
        match arg {
            PacingArg::Text => PacingMode::Text,
            PacingArg::Media => PacingMode::Media,
        }
    }
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > CADENCE_CONFIG env var > platform default (~/.cadence/config.toml).
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("CADENCE_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }

    /// Apply playback overrides from the command line.
    pub fn apply_overrides(&self, playback: &mut PlaybackConfig) {
        if let Some(pacing) = self.pacing {
            playback.pacing = pacing.into();
        }
        if self.manual {
            playback.auto_proceed = false;
        }
        if let Some(speed) = self.speed {
            if speed.is_finite() && speed > 0.0 {
                playback.text_pace_speed_multiplier = speed;
            } else {
                tracing::warn!(speed, "Ignoring non-positive --speed");
            }
        }
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".cadence").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".cadence").join("config.toml");
    }
    PathBuf::from("config.toml")
}
