//! Packet scripts: one JSON packet per line, each with an optional
//! `delay_ms` to wait before it is pushed. Blank lines and lines starting
//! with `#` are ignored.

use std::path::Path;

use serde::Deserialize;

use cadence_core::error::{CadenceError, Result};
use cadence_core::Packet;

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptEntry {
    #[serde(default)]
    pub delay_ms: u64,
    #[serde(flatten)]
    pub packet: Packet,
}

pub fn parse_script(content: &str) -> Result<Vec<ScriptEntry>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(index, line)| {
            serde_json::from_str(line).map_err(|e| {
                CadenceError::Serialization(format!("line {}: {}", index + 1, e))
            })
        })
        .collect()
}

pub fn load_script(path: &Path) -> Result<Vec<ScriptEntry>> {
    let content = std::fs::read_to_string(path)?;
    let entries = parse_script(&content)?;
    tracing::info!(path = %path.display(), packets = entries.len(), "Script loaded");
    Ok(entries)
}
