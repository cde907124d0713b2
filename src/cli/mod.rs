//! CLI subcommand implementations for the jobpilot binary.

pub mod doctor;
pub mod pause_cmd;
pub mod resume_cmd;
pub mod run_cmd;
pub mod status_cmd;

use crate::config::AutomationConfig;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Resolve the config path: explicit flag, else `~/.jobpilot/config.json`.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| crate::config::data_dir().join("config.json"))
}

/// Load and validate the config for a command that needs one.
pub fn load_config(explicit: Option<&Path>) -> Result<AutomationConfig> {
    let path = config_path(explicit);
    AutomationConfig::load(&path)
        .with_context(|| format!("could not load configuration from {}", path.display()))
}
