//! Cadence core crate - packet model, configuration, errors and playback events.

pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use config::{CadenceConfig, PacingMode, PlaybackConfig};
pub use error::{CadenceError, Result};
pub use events::PlaybackEvent;
pub use types::*;
