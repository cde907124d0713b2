//! Pause scheduling via the persisted state file.

use crate::control::Controller;
use anyhow::Result;
use std::path::Path;

pub async fn run(config_path: Option<&Path>, minutes: i64) -> Result<()> {
    let config = super::load_config(config_path)?;
    Controller::new(config).pause(minutes);
    println!("Paused for {minutes} minute(s).");
    Ok(())
}
